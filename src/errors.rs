/*!
 * Error types for the subrelay library.
 *
 * This module contains custom error types for different parts of the library,
 * using the thiserror crate for ergonomic error definitions.
 */

use thiserror::Error;

/// Errors that can occur when calling the generation API for one batch
///
/// The variants double as the outcome classification of a call: see
/// [`ProviderError::is_retryable`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// The credential hit the API's rate limit (HTTP 429)
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// The credential was rejected (HTTP 401/403, or a 400 naming the key)
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// The request did not complete within the configured timeout
    #[error("Request timeout")]
    Timeout,

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The API rejected the request itself
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// The API answered without any generated text
    #[error("No text in response")]
    EmptyResponse,
}

impl ProviderError {
    /// Whether another attempt, possibly with another credential, may succeed.
    ///
    /// Rate limits, rejected credentials, timeouts, server and transport errors
    /// are retryable. Malformed requests and responses without generated
    /// content are fatal for the attempt: rotating credentials will not help.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimitExceeded(_)
            | Self::AuthenticationError(_)
            | Self::Timeout
            | Self::ApiError { .. }
            | Self::ConnectionError(_) => true,
            Self::InvalidRequest(_) | Self::ParseError(_) | Self::EmptyResponse => false,
        }
    }
}

/// Errors surfaced synchronously by the job operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum JobError {
    /// A job with this session id is active, or is being processed
    #[error("Conflict: {0}")]
    Conflict(String),

    /// No job is registered under this session id
    #[error("Job {0} not found")]
    NotFound(String),

    /// The submission was rejected before any work started
    #[error("Validation error: {0}")]
    Validation(String),

    /// A status change that would leave a terminal state or skip a state
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        /// Current status
        from: String,
        /// Requested status
        to: String,
    },
}

/// Main library error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error in the configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error from a provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from a job operation
    #[error("Job error: {0}")]
    Job(#[from] JobError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::Config(error.to_string())
    }
}
