/*!
 * Job models and the views handed to callers.
 *
 * A `Job` keeps raw credentials only as keys of its usage table; every view
 * built from it (`JobReport`, `JobSummary`, `CallbackPayload`) carries the
 * masked form instead.
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::credentials::mask_credential;
use crate::errors::JobError;

/// One subtitle line as submitted by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    /// Caller-assigned index, unique within a job
    pub index: i64,
    /// Text to translate
    pub text: String,
}

impl Line {
    pub fn new(index: i64, text: impl Into<String>) -> Self {
        Self { index, text: text.into() }
    }
}

/// One translated line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslatedLine {
    pub index: i64,
    pub original: String,
    pub translated: String,
}

/// Job lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Submitted; the worker has not started yet
    Pending,
    /// The worker is processing batches
    Processing,
    /// Every batch was translated
    Completed,
    /// A batch exhausted its retry rounds
    Failed,
    /// Stopped on request before finishing
    Cancelled,
}

impl JobStatus {
    /// Whether a worker may still change the job
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    /// Allowed transitions: pending -> processing -> {completed, failed},
    /// and cancellation from either active state
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Pending, Self::Cancelled)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Failed)
                | (Self::Processing, Self::Cancelled)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request counters for one credential within one job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialUsage {
    pub request_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
}

/// Usage counters of one credential, reported with the masked credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaskedUsage {
    pub masked_key: String,
    pub request_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
}

/// A translation job
#[derive(Debug, Clone)]
pub struct Job {
    /// Generation id; distinguishes records that reused a session id
    pub job_id: Uuid,
    pub session_id: String,
    pub status: JobStatus,
    pub total_lines: usize,
    pub completed_lines: usize,
    pub results: Vec<TranslatedLine>,
    pub error: Option<String>,
    pub callback_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Usage per raw credential, in first-use order
    credential_usage: Vec<(String, CredentialUsage)>,
}

impl Job {
    pub fn new(session_id: impl Into<String>, total_lines: usize, callback_url: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            job_id: Uuid::new_v4(),
            session_id: session_id.into(),
            status: JobStatus::Pending,
            total_lines,
            completed_lines: 0,
            results: Vec::new(),
            error: None,
            callback_url,
            created_at: now,
            updated_at: now,
            finished_at: None,
            credential_usage: Vec::new(),
        }
    }

    /// Completion percentage; 100 once completed
    pub fn progress(&self) -> f64 {
        if self.status == JobStatus::Completed {
            return 100.0;
        }
        if self.total_lines == 0 {
            return 0.0;
        }
        self.completed_lines as f64 / self.total_lines as f64 * 100.0
    }

    /// Move to `next`, refusing any transition out of a terminal state
    pub fn transition(&mut self, next: JobStatus) -> Result<(), JobError> {
        if !self.status.can_transition_to(next) {
            return Err(JobError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        self.touch();
        if next.is_terminal() {
            self.finished_at = Some(self.updated_at);
        }
        Ok(())
    }

    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), JobError> {
        self.transition(JobStatus::Failed)?;
        self.error = Some(error.into());
        Ok(())
    }

    /// Append the results of one successful batch
    pub fn record_batch(&mut self, results: Vec<TranslatedLine>) -> Result<(), JobError> {
        if self.status != JobStatus::Processing {
            return Err(JobError::InvalidTransition {
                from: self.status.to_string(),
                to: "processing".to_string(),
            });
        }
        self.completed_lines = (self.completed_lines + results.len()).min(self.total_lines);
        self.results.extend(results);
        self.touch();
        Ok(())
    }

    /// Counters for `credential`, created on first use
    pub fn usage_mut(&mut self, credential: &str) -> &mut CredentialUsage {
        let position = match self.credential_usage.iter().position(|(c, _)| c == credential) {
            Some(position) => position,
            None => {
                self.credential_usage.push((credential.to_string(), CredentialUsage::default()));
                self.credential_usage.len() - 1
            }
        };
        &mut self.credential_usage[position].1
    }

    /// Record the outcome of one request made with `credential`
    pub fn record_request(&mut self, credential: &str, success: bool) {
        let usage = self.usage_mut(credential);
        usage.request_count += 1;
        if success {
            usage.success_count += 1;
        } else {
            usage.failure_count += 1;
        }
        self.touch();
    }

    pub fn usage_for(&self, credential: &str) -> Option<CredentialUsage> {
        self.credential_usage
            .iter()
            .find(|(c, _)| c == credential)
            .map(|(_, usage)| *usage)
    }

    pub fn masked_usage(&self) -> Vec<MaskedUsage> {
        self.credential_usage
            .iter()
            .map(|(credential, usage)| MaskedUsage {
                masked_key: mask_credential(credential),
                request_count: usage.request_count,
                success_count: usage.success_count,
                failure_count: usage.failure_count,
            })
            .collect()
    }

    /// Totals over every credential: (requests, successes, failures)
    pub fn usage_totals(&self) -> (u64, u64, u64) {
        self.credential_usage.iter().fold((0, 0, 0), |(r, s, f), (_, u)| {
            (r + u.request_count, s + u.success_count, f + u.failure_count)
        })
    }

    /// Results sorted by index
    pub fn sorted_results(&self) -> Vec<TranslatedLine> {
        let mut results = self.results.clone();
        results.sort_by_key(|r| r.index);
        results
    }

    pub fn report(&self) -> JobReport {
        let (total_requests, total_success, total_failure) = self.usage_totals();
        JobReport {
            session_id: self.session_id.clone(),
            status: self.status,
            progress: round2(self.progress()),
            total_lines: self.total_lines,
            completed_lines: self.completed_lines,
            results: if self.status == JobStatus::Completed {
                self.sorted_results()
            } else {
                Vec::new()
            },
            error: self.error.clone(),
            api_key_usage: self.masked_usage(),
            total_requests,
            total_success,
            total_failure,
            created_at: self.created_at,
            updated_at: self.updated_at,
            finished_at: self.finished_at,
        }
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            session_id: self.session_id.clone(),
            status: self.status,
            progress: round2(self.progress()),
            total_lines: self.total_lines,
        }
    }

    pub fn callback_payload(&self) -> CallbackPayload {
        let (total_requests, total_success, total_failure) = self.usage_totals();
        CallbackPayload {
            session_id: self.session_id.clone(),
            status: self.status,
            total_lines: self.total_lines,
            completed_lines: self.completed_lines,
            error: self.error.clone(),
            api_key_usage: self.masked_usage(),
            total_requests,
            total_success,
            total_failure,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Status and results of one job as reported to pollers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReport {
    pub session_id: String,
    pub status: JobStatus,
    pub progress: f64,
    pub total_lines: usize,
    pub completed_lines: usize,
    /// Populated only once the job has completed
    pub results: Vec<TranslatedLine>,
    pub error: Option<String>,
    pub api_key_usage: Vec<MaskedUsage>,
    pub total_requests: u64,
    pub total_success: u64,
    pub total_failure: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// One entry of the job listing
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub session_id: String,
    pub status: JobStatus,
    pub progress: f64,
    pub total_lines: usize,
}

/// Listing of every job in the store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobListing {
    pub total: usize,
    pub jobs: Vec<JobSummary>,
}

/// Outcome of a bulk cleanup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub deleted: usize,
    pub remaining: usize,
}

/// Final outcome posted to a job's callback URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackPayload {
    pub session_id: String,
    pub status: JobStatus,
    pub total_lines: usize,
    pub completed_lines: usize,
    pub error: Option<String>,
    pub api_key_usage: Vec<MaskedUsage>,
    pub total_requests: u64,
    pub total_success: u64,
    pub total_failure: u64,
}

/// Live limits as shown in the service overview
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewConfig {
    pub rpm: u32,
    pub max_retries: u32,
}

/// Health summary of the relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceOverview {
    pub service: String,
    pub status: String,
    pub config: OverviewConfig,
    /// Jobs currently processing
    pub active_jobs: usize,
    pub total_jobs: usize,
}

/// A job submission
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationRequest {
    pub session_id: String,
    /// Model name; the configured default when absent
    #[serde(default)]
    pub model: Option<String>,
    pub prompt: String,
    pub system_instruction: String,
    pub lines: Vec<Line>,
    #[serde(rename = "apiKeys", alias = "credentials")]
    pub credentials: Vec<String>,
    /// Lines per API call; the configured default when absent
    #[serde(default)]
    pub batch_size: Option<usize>,
    /// Extended reasoning budget, sent only to models that support it
    #[serde(default)]
    pub thinking_budget: Option<i32>,
    #[serde(default)]
    pub callback_url: Option<String>,
}

/// Reply to an accepted submission
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReceipt {
    pub session_id: String,
    pub status: JobStatus,
    pub total_lines: usize,
    pub batch_size: usize,
    pub thinking_budget: Option<i32>,
    pub callback_url: Option<String>,
    pub message: String,
}
