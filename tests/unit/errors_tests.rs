/*!
 * Tests for error types and conversions
 */

use subrelay::errors::{AppError, JobError, ProviderError};

#[test]
fn test_providerError_apiError_shouldDisplayStatusAndMessage() {
    let error = ProviderError::ApiError {
        status_code: 503,
        message: "Service unavailable".to_string(),
    };
    let display = format!("{}", error);
    assert!(display.contains("503"));
    assert!(display.contains("Service unavailable"));
}

#[test]
fn test_providerError_transientFailures_shouldBeRetryable() {
    let retryable = [
        ProviderError::RateLimitExceeded("429".to_string()),
        ProviderError::AuthenticationError("API_KEY_INVALID".to_string()),
        ProviderError::Timeout,
        ProviderError::ApiError {
            status_code: 500,
            message: "boom".to_string(),
        },
        ProviderError::ConnectionError("reset".to_string()),
    ];
    for error in retryable {
        assert!(error.is_retryable(), "{} should be retryable", error);
    }
}

#[test]
fn test_providerError_requestFaults_shouldBeFatal() {
    let fatal = [
        ProviderError::InvalidRequest("bad field".to_string()),
        ProviderError::ParseError("not json".to_string()),
        ProviderError::EmptyResponse,
    ];
    for error in fatal {
        assert!(!error.is_retryable(), "{} should be fatal", error);
    }
}

#[test]
fn test_jobError_notFound_shouldNameSession() {
    let error = JobError::NotFound("abc".to_string());
    assert_eq!(error.to_string(), "Job abc not found");
}

#[test]
fn test_appError_fromJobError_shouldWrap() {
    let error: AppError = JobError::Conflict("busy".to_string()).into();
    assert!(matches!(error, AppError::Job(JobError::Conflict(_))));
    assert!(error.to_string().contains("busy"));
}

#[test]
fn test_appError_fromIoError_shouldBecomeFileError() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
    let error: AppError = io.into();
    assert!(matches!(error, AppError::File(_)));
}
