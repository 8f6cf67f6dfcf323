/*!
 * End-to-end tests of the job lifecycle through the orchestrator
 */

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use subrelay::providers::MockCaller;
use subrelay::{ConfigUpdate, JobError, JobStatus, Line};

use crate::common::{self, LONG_KEY};

const CALLBACK: &str = "http://localhost:9000/callback";

#[tokio::test(start_paused = true)]
async fn test_submit_withThreeLines_shouldCompleteInIndexOrder() {
    common::init_logger();
    let caller = MockCaller::sequence(vec![Ok("1|X\n2|Y".to_string()), Ok("3|Z".to_string())]);
    let (orchestrator, _) = common::orchestrator(common::test_config(), &caller);

    let lines = vec![Line::new(1, "A"), Line::new(2, "B"), Line::new(3, "C")];
    let receipt = orchestrator
        .submit(common::request("movie-1", lines, &["k1-aaaaaaaaaaaa"]))
        .await
        .unwrap();
    assert_eq!(receipt.status, JobStatus::Pending);
    assert_eq!(receipt.total_lines, 3);
    assert_eq!(receipt.batch_size, 2);

    let report = common::wait_for_terminal(&orchestrator, "movie-1").await;
    assert_eq!(report.status, JobStatus::Completed);
    assert_eq!(report.progress, 100.0);
    assert_eq!(report.completed_lines, 3);

    let translated: Vec<(i64, &str)> = report
        .results
        .iter()
        .map(|r| (r.index, r.translated.as_str()))
        .collect();
    assert_eq!(translated, vec![(1, "X"), (2, "Y"), (3, "Z")]);
    assert_eq!(report.results[2].original, "C");
    assert_eq!(report.total_requests, 2);
    assert_eq!(report.total_success, 2);
}

#[tokio::test(start_paused = true)]
async fn test_submit_withNoLines_shouldCompleteEmpty() {
    let caller = MockCaller::echo();
    let (orchestrator, _) = common::orchestrator(common::test_config(), &caller);

    orchestrator
        .submit(common::request("empty", Vec::new(), &["k1"]))
        .await
        .unwrap();
    let report = common::wait_for_terminal(&orchestrator, "empty").await;

    assert_eq!(report.status, JobStatus::Completed);
    assert!(report.results.is_empty());
    assert_eq!(caller.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_status_whileProcessing_shouldReportProgressWithoutResults() {
    let caller = MockCaller::echo().with_delay(Duration::from_secs(5));
    let (orchestrator, _) = common::orchestrator(common::test_config(), &caller);

    orchestrator
        .submit(common::request("s1", common::lines(4), &["k1"]))
        .await
        .unwrap();

    let report = common::wait_until(&orchestrator, "s1", |r| r.completed_lines == 2).await;
    assert_eq!(report.status, JobStatus::Processing);
    assert_eq!(report.progress, 50.0);
    assert!(report.results.is_empty());

    let report = common::wait_for_terminal(&orchestrator, "s1").await;
    assert_eq!(report.results.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_submit_whileProcessing_shouldConflictThenAllowResubmit() {
    let caller = MockCaller::echo().with_delay(Duration::from_secs(5));
    let (orchestrator, _) = common::orchestrator(common::test_config(), &caller);

    orchestrator
        .submit(common::request("s1", common::lines(2), &["k1"]))
        .await
        .unwrap();
    common::wait_until(&orchestrator, "s1", |r| r.status == JobStatus::Processing).await;

    let second = orchestrator
        .submit(common::request("s1", common::lines(2), &["k1"]))
        .await;
    assert!(matches!(second, Err(JobError::Conflict(_))));

    common::wait_for_terminal(&orchestrator, "s1").await;
    orchestrator
        .submit(common::request("s1", common::lines(3), &["k1"]))
        .await
        .unwrap();
    let report = common::wait_for_terminal(&orchestrator, "s1").await;
    assert_eq!(report.status, JobStatus::Completed);
    assert_eq!(report.total_lines, 3);
}

#[tokio::test(start_paused = true)]
async fn test_submit_withInvalidInput_shouldFailValidation() {
    let caller = MockCaller::echo();
    let (orchestrator, _) = common::orchestrator(common::test_config(), &caller);

    let no_keys = common::request("s1", common::lines(2), &[]);
    assert!(matches!(orchestrator.submit(no_keys).await, Err(JobError::Validation(_))));

    let mut zero_batch = common::request("s1", common::lines(2), &["k1"]);
    zero_batch.batch_size = Some(0);
    assert!(matches!(orchestrator.submit(zero_batch).await, Err(JobError::Validation(_))));

    let duplicates = common::request("s1", vec![Line::new(1, "a"), Line::new(1, "b")], &["k1"]);
    assert!(matches!(orchestrator.submit(duplicates).await, Err(JobError::Validation(_))));

    assert!(orchestrator.list().jobs.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_credential_shouldNeverAppearInStatusOrCallback() {
    let caller = MockCaller::sequence(vec![
        Err(subrelay::ProviderError::RateLimitExceeded("429".to_string())),
        Ok("1|X\n2|Y".to_string()),
    ]);
    let (orchestrator, notifier) = common::orchestrator(common::test_config(), &caller);

    let mut request = common::request("secret", common::lines(2), &[LONG_KEY]);
    request.callback_url = Some(CALLBACK.to_string());
    orchestrator.submit(request).await.unwrap();

    let report = common::wait_for_terminal(&orchestrator, "secret").await;
    let status_json = serde_json::to_string(&report).unwrap();
    assert!(!status_json.contains(LONG_KEY));
    assert!(status_json.contains("AIzaSyAB****7890"));

    let deliveries = notifier.deliveries();
    assert_eq!(deliveries.len(), 1);
    let (url, payload) = &deliveries[0];
    assert_eq!(url, CALLBACK);
    assert_eq!(payload.status, JobStatus::Completed);
    assert_eq!(payload.api_key_usage[0].masked_key, "AIzaSyAB****7890");
    assert_eq!(payload.api_key_usage[0].request_count, 2);
    assert_eq!(payload.api_key_usage[0].failure_count, 1);
    assert_eq!(payload.total_requests, 2);
    assert!(!serde_json::to_string(payload).unwrap().contains(LONG_KEY));

    let overview_json = serde_json::to_string(&orchestrator.list()).unwrap();
    assert!(!overview_json.contains(LONG_KEY));
}

#[tokio::test(start_paused = true)]
async fn test_submit_withoutCallback_shouldNotNotify() {
    let caller = MockCaller::echo();
    let (orchestrator, notifier) = common::orchestrator(common::test_config(), &caller);

    orchestrator
        .submit(common::request("s1", common::lines(1), &["k1"]))
        .await
        .unwrap();
    common::wait_for_terminal(&orchestrator, "s1").await;
    assert!(notifier.deliveries().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_submit_withoutModel_shouldUseConfiguredDefault() {
    let models = Arc::new(Mutex::new(Vec::new()));
    let seen = models.clone();
    let caller = MockCaller::new(move |_, request| {
        seen.lock().push(request.model.to_string());
        Ok(MockCaller::echo_response(request))
    });
    let (orchestrator, _) = common::orchestrator(common::test_config(), &caller);

    orchestrator
        .submit(common::request("default", common::lines(1), &["k1"]))
        .await
        .unwrap();
    common::wait_for_terminal(&orchestrator, "default").await;

    let mut explicit = common::request("explicit", common::lines(1), &["k1"]);
    explicit.model = Some("gemini-2.5-pro".to_string());
    orchestrator.submit(explicit).await.unwrap();
    common::wait_for_terminal(&orchestrator, "explicit").await;

    assert_eq!(*models.lock(), vec!["gemini-2.5-flash", "gemini-2.5-pro"]);
}

#[tokio::test(start_paused = true)]
async fn test_overview_shouldCountJobsAndLiveLimits() {
    let caller = MockCaller::echo().with_delay(Duration::from_secs(5));
    let (orchestrator, _) = common::orchestrator(common::test_config(), &caller);

    orchestrator
        .submit(common::request("a", common::lines(2), &["k1"]))
        .await
        .unwrap();
    common::wait_until(&orchestrator, "a", |r| r.status == JobStatus::Processing).await;

    let report = orchestrator.update_config(&ConfigUpdate {
        rpm: Some(42),
        max_retries: None,
    });
    assert_eq!(report.changes, vec!["RPM: 1000 -> 42"]);

    let overview = orchestrator.overview();
    assert_eq!(overview.status, "running");
    assert_eq!(overview.active_jobs, 1);
    assert_eq!(overview.total_jobs, 1);
    assert_eq!(overview.config.rpm, 42);
    assert_eq!(orchestrator.config().rpm, 42);

    common::wait_for_terminal(&orchestrator, "a").await;
    assert_eq!(orchestrator.overview().active_jobs, 0);
}
