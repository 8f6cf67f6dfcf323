/*!
 * Credential handling for batch translation.
 *
 * This module contains:
 * - Masking of credentials for every externally visible view
 * - `CredentialRotator`, the round-robin selection over one job's credentials
 * - `RetryState`, the two-counter state machine (credential attempt nested
 *   inside retry rounds) that drives one batch's retries
 */

use std::time::Duration;

use crate::errors::JobError;

const MASK: &str = "****";

/// Mask a credential for display.
///
/// Credentials longer than 12 characters keep their first 8 and last 4
/// characters; 9 to 12 characters keep 4 and 4; shorter ones keep a quarter
/// of their length on each side.
pub fn mask_credential(credential: &str) -> String {
    let chars: Vec<char> = credential.chars().collect();
    let len = chars.len();

    let (head, tail) = if len > 12 {
        (8, 4)
    } else if len > 8 {
        (4, 4)
    } else {
        (len / 4, len / 4)
    };

    let prefix: String = chars[..head].iter().collect();
    let suffix: String = chars[len - tail..].iter().collect();
    format!("{}{}{}", prefix, MASK, suffix)
}

/// Round-robin selection over the ordered credentials of one job
#[derive(Debug, Clone)]
pub struct CredentialRotator {
    credentials: Vec<String>,
    passes_per_round: usize,
}

impl CredentialRotator {
    /// Create a rotator that tries every credential `passes_per_round` times
    /// before a retry round is abandoned
    pub fn new(credentials: Vec<String>, passes_per_round: usize) -> Result<Self, JobError> {
        if credentials.is_empty() {
            return Err(JobError::Validation("No API keys provided".to_string()));
        }
        Ok(Self {
            credentials,
            passes_per_round: passes_per_round.max(1),
        })
    }

    /// Credential for the given attempt counter
    pub fn select(&self, attempt: usize) -> &str {
        &self.credentials[attempt % self.credentials.len()]
    }

    /// Position of the selected credential, 1-based, for logging
    pub fn position(&self, attempt: usize) -> usize {
        attempt % self.credentials.len() + 1
    }

    /// Number of credential attempts allowed in one retry round
    pub fn attempts_per_round(&self) -> usize {
        self.credentials.len() * self.passes_per_round
    }

    /// Whether the attempt counter has used up the current round
    pub fn round_exhausted(&self, attempt: usize) -> bool {
        attempt >= self.attempts_per_round()
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    pub fn credentials(&self) -> &[String] {
        &self.credentials
    }
}

/// What the batch loop does after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStep {
    /// Try the next credential immediately
    RotateCredential,
    /// A retry round was spent; wait before the next one
    Backoff {
        /// Rounds spent so far, starting at 1
        round: u32,
    },
}

/// Retry counters for one batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    attempt: usize,
    round: u32,
}

impl RetryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credential attempt within the current round
    pub fn attempt(&self) -> usize {
        self.attempt
    }

    /// Retry rounds spent so far
    pub fn round(&self) -> u32 {
        self.round
    }

    /// Whether another attempt is allowed under `max_retries` rounds
    pub fn can_retry(&self, max_retries: u32) -> bool {
        self.round < max_retries
    }

    /// Record a failure that another credential may not repeat.
    ///
    /// Advances to the next credential; once every credential has had its
    /// passes in this round, the round is spent and the attempt counter resets.
    pub fn credential_failed(&mut self, rotator: &CredentialRotator) -> RetryStep {
        self.attempt += 1;
        if rotator.round_exhausted(self.attempt) {
            self.attempt = 0;
            self.round += 1;
            RetryStep::Backoff { round: self.round }
        } else {
            RetryStep::RotateCredential
        }
    }

    /// Record a failure no credential can fix; spends a round directly
    pub fn request_failed(&mut self) -> RetryStep {
        self.round += 1;
        RetryStep::Backoff { round: self.round }
    }
}

/// Delay before the next retry round: `base × 2^round`
pub fn backoff_delay(base: Duration, round: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(round))
}
