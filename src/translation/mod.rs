/*!
 * Translation building blocks shared by every job.
 *
 * - `batch`: Order-preserving batch splitting
 * - `parser`: Reconciliation of raw API responses against a batch
 * - `rate_limiter`: Global rolling-window request limiter
 */

// Re-export main types for easier usage
pub use self::batch::{Batch, split_batches};
pub use self::parser::{PARSE_ERROR_MARKER, parse_translation_result};
pub use self::rate_limiter::RateLimiter;

// Submodules
pub mod batch;
pub mod parser;
pub mod rate_limiter;
