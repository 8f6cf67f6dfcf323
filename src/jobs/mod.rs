/*!
 * Translation jobs.
 *
 * This module contains:
 * - `models`: job records, statuses and the views handed to callers
 * - `store`: the in-memory job registry
 * - `notifier`: delivery of final outcomes to callback URLs
 * - `orchestrator`: submission, workers and cancellation
 */

pub mod models;
pub mod notifier;
pub mod orchestrator;
pub mod store;

pub use models::{
    CallbackPayload, CleanupReport, CredentialUsage, Job, JobListing, JobReport, JobStatus,
    JobSummary, Line, MaskedUsage, ServiceOverview, SubmitReceipt, TranslatedLine,
    TranslationRequest,
};
pub use notifier::{CallbackNotifier, JobNotifier};
pub use orchestrator::JobOrchestrator;
pub use store::JobStore;
