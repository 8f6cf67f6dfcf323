/*!
 * Job orchestration.
 *
 * `JobOrchestrator` validates submissions, registers jobs in the store and
 * runs each one on its own Tokio task. A worker processes batches strictly in
 * order; every API call first passes the shared rate limiter, and failures
 * drive the credential rotation and backoff rounds of `RetryState`.
 *
 * Workers stop cooperatively: a cancellation token is checked before each
 * batch and each attempt, and it interrupts limiter and backoff waits.
 */

use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::app_config::{Config, ConfigUpdate, ConfigUpdateReport, ConfigView, RuntimeConfig};
use crate::credentials::{CredentialRotator, RetryState, RetryStep, backoff_delay, mask_credential};
use crate::errors::JobError;
use crate::providers::{BatchRequest, Gemini, TranslationCaller};
use crate::translation::{Batch, RateLimiter, parse_translation_result, split_batches};

use super::models::{
    CleanupReport, JobListing, JobReport, JobStatus, Line, OverviewConfig, ServiceOverview,
    SubmitReceipt, TranslationRequest,
};
use super::notifier::{CallbackNotifier, JobNotifier};
use super::store::JobStore;

const SERVICE_NAME: &str = "Subtitle Translation Relay";

/// Everything a worker needs to run one job
#[derive(Debug)]
struct JobPlan {
    job_id: Uuid,
    session_id: String,
    model: String,
    prompt: String,
    system_instruction: String,
    lines: Vec<Line>,
    rotator: CredentialRotator,
    batch_size: usize,
    thinking_budget: Option<i32>,
}

/// How a batch ended
#[derive(Debug, PartialEq, Eq)]
enum BatchOutcome {
    /// Results were recorded in the job
    Translated,
    /// Every retry round was spent
    Exhausted { rounds: u32 },
    /// The job was cancelled while the batch was in flight
    Cancelled,
    /// The job record was deleted or replaced
    Abandoned,
}

/// Runs translation jobs against a shared store, limiter and caller
#[derive(Debug, Clone)]
pub struct JobOrchestrator {
    store: Arc<JobStore>,
    limiter: Arc<RateLimiter>,
    caller: Arc<dyn TranslationCaller>,
    notifier: Arc<dyn JobNotifier>,
    runtime: RuntimeConfig,
    config: Arc<Config>,
    /// Cancellation token of each running worker, tagged with its generation
    tokens: Arc<Mutex<HashMap<String, (Uuid, CancellationToken)>>>,
}

impl JobOrchestrator {
    /// Create an orchestrator around `caller` and `notifier`
    pub fn new(config: Config, caller: Arc<dyn TranslationCaller>, notifier: Arc<dyn JobNotifier>) -> Self {
        let runtime = RuntimeConfig::new(&config);
        let limiter = RateLimiter::new(runtime.clone(), config.rate_window(), config.rate_safety_margin());

        Self {
            store: Arc::new(JobStore::new()),
            limiter: Arc::new(limiter),
            caller,
            notifier,
            runtime,
            config: Arc::new(config),
            tokens: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Create an orchestrator talking to the Gemini API and posting HTTP callbacks
    pub fn from_config(config: Config) -> Self {
        let caller = Arc::new(Gemini::from_config(&config));
        let notifier = Arc::new(CallbackNotifier::new(config.callback_timeout()));
        Self::new(config, caller, notifier)
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn runtime(&self) -> &RuntimeConfig {
        &self.runtime
    }

    /// Validate and register a job, then start its worker.
    ///
    /// Returns as soon as the job is registered; the job is `pending` until
    /// the worker picks it up.
    pub async fn submit(&self, request: TranslationRequest) -> Result<SubmitReceipt, JobError> {
        let batch_size = request.batch_size.unwrap_or(self.config.default_batch_size);
        validate_request(&request, batch_size)?;

        let rotator = CredentialRotator::new(request.credentials, self.config.rotation_passes)?;
        let total_lines = request.lines.len();
        // Held across the insert so `cancel` always finds the new token
        let token = CancellationToken::new();
        let job = {
            let mut tokens = self.tokens.lock();
            let job = self
                .store
                .create(&request.session_id, total_lines, request.callback_url.clone())?;
            tokens.insert(request.session_id.clone(), (job.job_id, token.clone()));
            job
        };

        let plan = JobPlan {
            job_id: job.job_id,
            session_id: request.session_id.clone(),
            model: request.model.unwrap_or_else(|| self.config.default_model.clone()),
            prompt: request.prompt,
            system_instruction: request.system_instruction,
            lines: request.lines,
            rotator,
            batch_size,
            thinking_budget: request.thinking_budget,
        };

        info!(
            "Job {} accepted: {} lines, batch size {}, {} key(s), model {}",
            plan.session_id,
            total_lines,
            batch_size,
            plan.rotator.len(),
            plan.model
        );

        let orchestrator = self.clone();
        tokio::spawn(async move {
            orchestrator.run_job(plan, token).await;
        });

        Ok(SubmitReceipt {
            session_id: request.session_id,
            status: JobStatus::Pending,
            total_lines,
            batch_size,
            thinking_budget: request.thinking_budget,
            callback_url: request.callback_url,
            message: "Translation job started. Poll the status endpoint for progress.".to_string(),
        })
    }

    /// Status of one job
    pub fn status(&self, session_id: &str) -> Result<JobReport, JobError> {
        Ok(self.store.get(session_id)?.report())
    }

    /// Results of one job; populated only once it has completed
    pub fn results(&self, session_id: &str) -> Result<JobReport, JobError> {
        self.status(session_id)
    }

    /// Request cancellation of a pending or processing job
    pub fn cancel(&self, session_id: &str) -> Result<(), JobError> {
        let job = self.store.get(session_id)?;
        if job.status.is_terminal() {
            return Err(JobError::Conflict(format!(
                "Job {} is already {}",
                session_id, job.status
            )));
        }

        if let Some((job_id, token)) = self.tokens.lock().get(session_id) {
            if *job_id == job.job_id {
                token.cancel();
            }
        }
        info!("Job {}: cancellation requested", session_id);
        Ok(())
    }

    /// Remove a job that is not processing; a pending job's worker is stopped
    pub fn delete(&self, session_id: &str) -> Result<(), JobError> {
        let job = self.store.delete(session_id)?;
        let mut tokens = self.tokens.lock();
        if tokens.get(session_id).is_some_and(|(id, _)| *id == job.job_id) {
            if let Some((_, token)) = tokens.remove(session_id) {
                token.cancel();
            }
        }
        Ok(())
    }

    pub fn list(&self) -> JobListing {
        self.store.list()
    }

    /// Remove every finished job
    pub fn cleanup_terminal(&self) -> CleanupReport {
        self.store.cleanup_terminal()
    }

    /// Remove finished jobs older than the configured retention
    pub fn cleanup_expired(&self) -> CleanupReport {
        self.cleanup_older_than(self.config.job_ttl())
    }

    pub fn cleanup_older_than(&self, ttl: Duration) -> CleanupReport {
        self.store.cleanup_expired(ttl)
    }

    pub fn config(&self) -> ConfigView {
        self.runtime.view()
    }

    /// Apply a live limits update; running jobs see it on their next check
    pub fn update_config(&self, update: &ConfigUpdate) -> ConfigUpdateReport {
        self.runtime.apply(update)
    }

    pub fn overview(&self) -> ServiceOverview {
        let limits = self.runtime.limits();
        let (active_jobs, total_jobs) = self.store.counts();
        ServiceOverview {
            service: SERVICE_NAME.to_string(),
            status: "running".to_string(),
            config: OverviewConfig {
                rpm: limits.requests_per_minute,
                max_retries: limits.max_retries,
            },
            active_jobs,
            total_jobs,
        }
    }

    async fn run_job(&self, plan: JobPlan, token: CancellationToken) {
        let session_id = plan.session_id.as_str();

        if token.is_cancelled() {
            self.finish(&plan, JobStatus::Cancelled, None).await;
            return;
        }

        if let Err(e) = self
            .store
            .update(session_id, plan.job_id, |job| job.transition(JobStatus::Processing))
        {
            warn!("Job {}: not started: {}", session_id, e);
            self.release_token(&plan);
            return;
        }

        let batches = match split_batches(&plan.lines, plan.batch_size) {
            Ok(batches) => batches,
            Err(e) => {
                self.finish(&plan, JobStatus::Failed, Some(e.to_string())).await;
                return;
            }
        };
        info!(
            "Job {}: processing {} lines in {} batch(es)",
            session_id,
            plan.lines.len(),
            batches.len()
        );

        for batch in &batches {
            if token.is_cancelled() {
                self.finish(&plan, JobStatus::Cancelled, None).await;
                return;
            }

            match self.translate_batch(&plan, batch, batches.len(), &token).await {
                BatchOutcome::Translated => {
                    info!(
                        "Job {}: batch {}/{} completed",
                        session_id,
                        batch.number + 1,
                        batches.len()
                    );
                }
                BatchOutcome::Exhausted { rounds } => {
                    let message = format!(
                        "Failed to process batch {}/{} after {} retries",
                        batch.number + 1,
                        batches.len(),
                        rounds
                    );
                    error!("Job {}: {}", session_id, message);
                    self.finish(&plan, JobStatus::Failed, Some(message)).await;
                    return;
                }
                BatchOutcome::Cancelled => {
                    self.finish(&plan, JobStatus::Cancelled, None).await;
                    return;
                }
                BatchOutcome::Abandoned => {
                    warn!("Job {}: record removed, worker stopping", session_id);
                    self.release_token(&plan);
                    return;
                }
            }
        }

        self.finish(&plan, JobStatus::Completed, None).await;
    }

    /// Translate one batch, rotating credentials and backing off per round
    async fn translate_batch(
        &self,
        plan: &JobPlan,
        batch: &Batch,
        total_batches: usize,
        token: &CancellationToken,
    ) -> BatchOutcome {
        let session_id = plan.session_id.as_str();
        let request = BatchRequest {
            model: &plan.model,
            prompt: &plan.prompt,
            system_instruction: &plan.system_instruction,
            lines: &batch.lines,
            thinking_budget: plan.thinking_budget,
        };
        let mut state = RetryState::new();

        while state.can_retry(self.runtime.max_retries()) {
            if token.is_cancelled() {
                return BatchOutcome::Cancelled;
            }

            let credential = plan.rotator.select(state.attempt());

            tokio::select! {
                biased;
                _ = token.cancelled() => return BatchOutcome::Cancelled,
                _ = self.limiter.acquire() => {}
            }

            info!(
                "Job {}: batch {}/{}, key #{} ({}), retry {}",
                session_id,
                batch.number + 1,
                total_batches,
                plan.rotator.position(state.attempt()),
                mask_credential(credential),
                state.round()
            );

            let failure = match self.caller.translate(credential, &request).await {
                Ok(raw) => {
                    let results = parse_translation_result(&raw, &batch.lines);
                    let recorded = self.store.update(session_id, plan.job_id, |job| {
                        job.record_request(credential, true);
                        job.record_batch(results)
                    });
                    return match recorded {
                        Ok(()) => BatchOutcome::Translated,
                        Err(e) => {
                            debug!("Job {}: dropping batch results: {}", session_id, e);
                            BatchOutcome::Abandoned
                        }
                    };
                }
                Err(failure) => failure,
            };

            let recorded = self.store.update(session_id, plan.job_id, |job| {
                job.record_request(credential, false);
                Ok(())
            });
            if recorded.is_err() {
                return BatchOutcome::Abandoned;
            }

            warn!(
                "Job {}: batch {} failed with key {}: {}",
                session_id,
                batch.number + 1,
                mask_credential(credential),
                failure
            );

            let step = if failure.is_retryable() {
                state.credential_failed(&plan.rotator)
            } else {
                state.request_failed()
            };

            if let RetryStep::Backoff { round } = step {
                if !state.can_retry(self.runtime.max_retries()) {
                    break;
                }
                let delay = backoff_delay(self.runtime.retry_delay_base(), round);
                info!(
                    "Job {}: all keys tried, waiting {:.1}s before retry round {}",
                    session_id,
                    delay.as_secs_f64(),
                    round
                );
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return BatchOutcome::Cancelled,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        BatchOutcome::Exhausted { rounds: state.round() }
    }

    /// Move the job to a terminal state and deliver its callback
    async fn finish(&self, plan: &JobPlan, status: JobStatus, message: Option<String>) {
        let session_id = plan.session_id.as_str();
        let finished = self.store.update(session_id, plan.job_id, |job| {
            match message {
                Some(message) if status == JobStatus::Failed => job.fail(message)?,
                _ => job.transition(status)?,
            }
            Ok(job.clone())
        });
        self.release_token(plan);

        let job = match finished {
            Ok(job) => job,
            Err(e) => {
                warn!("Job {}: could not mark {}: {}", session_id, status, e);
                return;
            }
        };

        let (requests, successes, failures) = job.usage_totals();
        info!(
            "Job {} {}: {}/{} lines, {} request(s) ({} ok, {} failed)",
            session_id, status, job.completed_lines, job.total_lines, requests, successes, failures
        );

        if let Some(url) = job.callback_url.as_deref() {
            self.notifier.notify(url, &job.callback_payload()).await;
        }
    }

    fn release_token(&self, plan: &JobPlan) {
        let mut tokens = self.tokens.lock();
        if tokens
            .get(&plan.session_id)
            .is_some_and(|(job_id, _)| *job_id == plan.job_id)
        {
            tokens.remove(&plan.session_id);
        }
    }
}

fn validate_request(request: &TranslationRequest, batch_size: usize) -> Result<(), JobError> {
    if request.session_id.trim().is_empty() {
        return Err(JobError::Validation("sessionId is required".to_string()));
    }
    if request.credentials.is_empty() {
        return Err(JobError::Validation("No API keys provided".to_string()));
    }
    if request.credentials.iter().any(|c| c.trim().is_empty()) {
        return Err(JobError::Validation("API keys must not be empty".to_string()));
    }
    if batch_size == 0 {
        return Err(JobError::Validation("batchSize must be at least 1".to_string()));
    }

    let mut seen = HashSet::with_capacity(request.lines.len());
    if let Some(line) = request.lines.iter().find(|line| !seen.insert(line.index)) {
        return Err(JobError::Validation(format!(
            "Duplicate line index {}",
            line.index
        )));
    }

    if let Some(url) = request.callback_url.as_deref() {
        url::Url::parse(url)
            .map_err(|e| JobError::Validation(format!("Invalid callbackUrl {}: {}", url, e)))?;
    }
    Ok(())
}
