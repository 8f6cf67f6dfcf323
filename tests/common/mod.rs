/*!
 * Common test utilities for the subrelay test suite
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use subrelay::jobs::{CallbackPayload, JobNotifier};
use subrelay::providers::MockCaller;
use subrelay::{Config, JobOrchestrator, JobReport, Line, TranslationRequest};

/// A credential longer than 12 characters, masked as `AIzaSyAB****7890`
pub const LONG_KEY: &str = "AIzaSyABCDEF12347890";

/// Notifier that records every delivered payload
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    deliveries: Arc<Mutex<Vec<(String, CallbackPayload)>>>,
}

impl RecordingNotifier {
    pub fn deliveries(&self) -> Vec<(String, CallbackPayload)> {
        self.deliveries.lock().clone()
    }
}

#[async_trait]
impl JobNotifier for RecordingNotifier {
    async fn notify(&self, url: &str, payload: &CallbackPayload) -> bool {
        self.deliveries.lock().push((url.to_string(), payload.clone()));
        true
    }
}

/// Build `count` lines indexed from 1
pub fn lines(count: i64) -> Vec<Line> {
    (1..=count).map(|i| Line::new(i, format!("Line {}", i))).collect()
}

/// Build a request with the given lines and credentials
pub fn request(session_id: &str, lines: Vec<Line>, credentials: &[&str]) -> TranslationRequest {
    TranslationRequest {
        session_id: session_id.to_string(),
        model: None,
        prompt: "Translate the following subtitles to French".to_string(),
        system_instruction: "You are a subtitle translator".to_string(),
        lines,
        credentials: credentials.iter().map(|c| c.to_string()).collect(),
        batch_size: Some(2),
        thinking_budget: None,
        callback_url: None,
    }
}

/// Configuration with fast limits suited to paused-time tests
pub fn test_config() -> Config {
    Config {
        requests_per_minute: 1000,
        max_retries: 3,
        retry_delay_base_ms: 100,
        ..Config::default()
    }
}

/// Build an orchestrator around a mock caller and a recording notifier
pub fn orchestrator(config: Config, caller: &MockCaller) -> (JobOrchestrator, RecordingNotifier) {
    let notifier = RecordingNotifier::default();
    let orchestrator = JobOrchestrator::new(config, Arc::new(caller.clone()), Arc::new(notifier.clone()));
    (orchestrator, notifier)
}

/// Poll until the job reaches a terminal state
pub async fn wait_for_terminal(orchestrator: &JobOrchestrator, session_id: &str) -> JobReport {
    for _ in 0..100_000 {
        let report = orchestrator.status(session_id).expect("job should exist");
        if report.status.is_terminal() {
            return report;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("job {} never reached a terminal state", session_id);
}

/// Poll until `predicate` holds for the job's report
pub async fn wait_until<F>(orchestrator: &JobOrchestrator, session_id: &str, predicate: F) -> JobReport
where
    F: Fn(&JobReport) -> bool,
{
    for _ in 0..100_000 {
        let report = orchestrator.status(session_id).expect("job should exist");
        if predicate(&report) {
            return report;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition never held for job {}", session_id);
}

/// Install a test logger; repeated calls are ignored
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
