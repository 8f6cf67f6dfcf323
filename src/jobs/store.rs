/*!
 * In-memory job registry keyed by session id.
 *
 * Readers get cloned snapshots; writers mutate a record under the write lock
 * through [`JobStore::update`], so a poller never observes a half-applied
 * change.
 */

use chrono::Utc;
use log::{debug, info};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

use crate::errors::JobError;

use super::models::{CleanupReport, Job, JobListing, JobStatus};

/// Registry of jobs; holds at most one record per session id
#[derive(Debug, Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<String, Job>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new pending job.
    ///
    /// Fails with `Conflict` while a job for the same session is pending or
    /// processing; a finished job is replaced.
    pub fn create(
        &self,
        session_id: &str,
        total_lines: usize,
        callback_url: Option<String>,
    ) -> Result<Job, JobError> {
        let mut jobs = self.jobs.write();

        if let Some(existing) = jobs.get(session_id) {
            if existing.status.is_active() {
                return Err(JobError::Conflict(format!(
                    "Job {} is already {}",
                    session_id, existing.status
                )));
            }
            debug!("Replacing {} job {}", existing.status, session_id);
        }

        let job = Job::new(session_id, total_lines, callback_url);
        jobs.insert(session_id.to_string(), job.clone());
        Ok(job)
    }

    /// Snapshot of one job
    pub fn get(&self, session_id: &str) -> Result<Job, JobError> {
        self.jobs
            .read()
            .get(session_id)
            .cloned()
            .ok_or_else(|| JobError::NotFound(session_id.to_string()))
    }

    /// Apply `f` to the job record of generation `job_id`.
    ///
    /// Fails with `NotFound` when the session is gone or now holds a different
    /// generation, so a stale worker never touches a replacement record.
    pub fn update<F, R>(&self, session_id: &str, job_id: Uuid, f: F) -> Result<R, JobError>
    where
        F: FnOnce(&mut Job) -> Result<R, JobError>,
    {
        let mut jobs = self.jobs.write();
        match jobs.get_mut(session_id) {
            Some(job) if job.job_id == job_id => f(job),
            _ => Err(JobError::NotFound(session_id.to_string())),
        }
    }

    /// Remove a job; refused while it is processing
    pub fn delete(&self, session_id: &str) -> Result<Job, JobError> {
        let mut jobs = self.jobs.write();

        match jobs.get(session_id) {
            None => Err(JobError::NotFound(session_id.to_string())),
            Some(job) if job.status == JobStatus::Processing => Err(JobError::Conflict(
                "Cannot delete a processing job".to_string(),
            )),
            Some(_) => {
                let job = jobs.remove(session_id).ok_or_else(|| JobError::NotFound(session_id.to_string()))?;
                info!("Job {} deleted", session_id);
                Ok(job)
            }
        }
    }

    pub fn list(&self) -> JobListing {
        let jobs = self.jobs.read();
        let mut summaries: Vec<_> = jobs.values().map(|j| j.summary()).collect();
        summaries.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        JobListing {
            total: summaries.len(),
            jobs: summaries,
        }
    }

    /// Remove every finished job
    pub fn cleanup_terminal(&self) -> CleanupReport {
        self.retain(|job| job.status.is_active())
    }

    /// Remove finished jobs that finished more than `ttl` ago
    pub fn cleanup_expired(&self, ttl: Duration) -> CleanupReport {
        let threshold = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_sub_signed(ttl));
        let Some(threshold) = threshold else {
            return self.retain(|_| true);
        };
        self.retain(|job| match job.finished_at {
            Some(finished_at) if job.status.is_terminal() => finished_at >= threshold,
            _ => true,
        })
    }

    /// (active, total) job counts
    pub fn counts(&self) -> (usize, usize) {
        let jobs = self.jobs.read();
        let active = jobs.values().filter(|j| j.status == JobStatus::Processing).count();
        (active, jobs.len())
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }

    fn retain<F>(&self, keep: F) -> CleanupReport
    where
        F: Fn(&Job) -> bool,
    {
        let mut jobs = self.jobs.write();
        let before = jobs.len();
        jobs.retain(|_, job| keep(job));
        let report = CleanupReport {
            deleted: before - jobs.len(),
            remaining: jobs.len(),
        };
        if report.deleted > 0 {
            info!("Cleaned up {} job(s), {} remaining", report.deleted, report.remaining);
        }
        report
    }
}
