/*!
 * Mock caller implementations for testing.
 *
 * This module provides a scripted `TranslationCaller`:
 * - `MockCaller::echo()` - Always succeeds, answering `index|[TRANSLATED] text`
 * - `MockCaller::failing(error)` - Always fails with the given error
 * - `MockCaller::sequence(outcomes)` - Plays outcomes in order, then repeats the last
 * - `MockCaller::new(responder)` - Delegates to a closure
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::errors::ProviderError;

use super::{BatchRequest, TranslationCaller};

type Responder = dyn Fn(&str, &BatchRequest<'_>) -> Result<String, ProviderError> + Send + Sync;

/// One recorded call
#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    /// Credential the call was made with
    pub credential: String,
    /// Line indices of the batch
    pub indices: Vec<i64>,
}

/// Scripted caller recording every call it receives
#[derive(Clone)]
pub struct MockCaller {
    responder: Arc<Responder>,
    calls: Arc<Mutex<Vec<MockCall>>>,
    delay: Option<Duration>,
}

impl fmt::Debug for MockCaller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockCaller")
            .field("calls", &self.calls.lock().len())
            .field("delay", &self.delay)
            .finish()
    }
}

impl MockCaller {
    /// Create a caller answering through `responder`
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&str, &BatchRequest<'_>) -> Result<String, ProviderError> + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(responder),
            calls: Arc::new(Mutex::new(Vec::new())),
            delay: None,
        }
    }

    /// Create a caller that translates every line as `[TRANSLATED] text`
    pub fn echo() -> Self {
        Self::new(|_, request| Ok(Self::echo_response(request)))
    }

    /// Create a caller that always fails with `error`
    pub fn failing(error: ProviderError) -> Self {
        Self::new(move |_, _| Err(error.clone()))
    }

    /// Create a caller that plays `outcomes` in order and then keeps
    /// repeating the last one
    pub fn sequence(outcomes: Vec<Result<String, ProviderError>>) -> Self {
        let position = AtomicUsize::new(0);
        Self::new(move |_, _| {
            let i = position.fetch_add(1, Ordering::SeqCst);
            outcomes
                .get(i)
                .or_else(|| outcomes.last())
                .cloned()
                .unwrap_or(Err(ProviderError::EmptyResponse))
        })
    }

    /// Sleep for `delay` before answering each call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Well-formed answer for `request`
    pub fn echo_response(request: &BatchRequest<'_>) -> String {
        request
            .lines
            .iter()
            .map(|line| format!("{}|[TRANSLATED] {}", line.index, line.text))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Every call received so far
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl TranslationCaller for MockCaller {
    async fn translate(&self, credential: &str, request: &BatchRequest<'_>) -> Result<String, ProviderError> {
        self.calls.lock().push(MockCall {
            credential: credential.to_string(),
            indices: request.lines.iter().map(|l| l.index).collect(),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        (self.responder)(credential, request)
    }
}
