/*!
 * # subrelay - batch subtitle translation relay
 *
 * A Rust library that accepts large ordered collections of subtitle lines and
 * translates them through a rate-limited generation API, rotating across a
 * pool of interchangeable credentials.
 *
 * ## Features
 *
 * - Fixed-size batching that preserves line order
 * - A global requests-per-minute ceiling shared by every running job
 * - Credential rotation nested inside exponential-backoff retry rounds
 * - Defensive parsing of `index|text` responses with sentinel back-fill
 * - Pollable in-memory job state with at-most-one active job per session
 * - Best-effort completion callbacks with masked credential statistics
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management and live-adjustable limits
 * - `credentials`: Credential masking, rotation and the retry state machine
 * - `translation`: Batching, response parsing and the global rate limiter:
 *   - `translation::batch`: Order-preserving batch splitting
 *   - `translation::parser`: Response parsing and reconciliation
 *   - `translation::rate_limiter`: Rolling-window request limiter
 * - `providers`: Client implementations of the generation API:
 *   - `providers::gemini`: Gemini `generateContent` client
 *   - `providers::mock`: Scripted caller for tests and dry runs
 * - `jobs`: Job records, the job store, callbacks and the orchestrator
 * - `logging`: Stderr logger for the `log` facade
 * - `errors`: Custom error types for the library
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod credentials;
pub mod errors;
pub mod jobs;
pub mod logging;
pub mod providers;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::{Config, ConfigUpdate, RuntimeConfig};
pub use credentials::{CredentialRotator, RetryState, RetryStep, mask_credential};
pub use errors::{AppError, JobError, ProviderError};
pub use jobs::{
    CallbackNotifier, Job, JobNotifier, JobOrchestrator, JobReport, JobStatus, JobStore, Line,
    TranslatedLine, TranslationRequest,
};
pub use providers::{BatchRequest, TranslationCaller};
pub use translation::{RateLimiter, parse_translation_result, split_batches};
