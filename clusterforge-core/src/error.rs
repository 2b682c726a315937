///! Trust-boundary error form
///!
///! Everything that leaves the process goes through [`ErrorResponse`]: code,
///! sanitized message and allow-listed details. Causes stay in server logs.

use clusterforge_common::{Error, ErrorCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::error::Error as StdError;
use tracing::{error, warn};

/// Standard error response format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: ErrorCode,

    /// Sanitized human-readable message
    pub message: String,

    /// Allow-listed structured details
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, Value>,

    /// Whether the same request may succeed later unchanged
    #[serde(default)]
    pub retryable: bool,

    /// Timestamp when the error was converted
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: clusterforge_common::error::sanitize_message(&message.into()),
            details: BTreeMap::new(),
            retryable: code.is_transient(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        if clusterforge_common::error::PUBLIC_DETAIL_KEYS.contains(&key) {
            self.details.insert(key.to_string(), value.into());
        }
        self
    }

    /// Convert a core error, logging the full cause chain server-side
    pub fn from_error(err: &Error) -> Self {
        let safe = err.safe_message();

        if err.code().is_caller_fault() {
            warn!(code = %err.code(), message = %safe, "Request rejected");
        } else {
            error!(
                code = %err.code(),
                message = %safe,
                cause = %cause_chain(err),
                "Operation failed"
            );
        }

        Self {
            code: err.code(),
            message: safe,
            details: err.public_details(),
            retryable: err.code().is_transient(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Transport status a caller-facing layer would map this code to
    pub fn http_status(&self) -> u16 {
        match self.code {
            ErrorCode::InvalidInput | ErrorCode::ValidationFailed => 400,
            ErrorCode::ProviderValidation => 422,
            ErrorCode::Unauthorized => 401,
            ErrorCode::Forbidden => 403,
            ErrorCode::NotFound => 404,
            ErrorCode::AlreadyExists => 409,
            ErrorCode::PreconditionFailed => 412,
            ErrorCode::ResourceExhausted => 429,
            ErrorCode::Canceled => 499,
            ErrorCode::BackendApi | ErrorCode::DependencyFailure | ErrorCode::WorkloadCluster => {
                502
            }
            ErrorCode::Unavailable => 503,
            ErrorCode::Timeout => 504,
            ErrorCode::Internal => 500,
        }
    }
}

impl From<&Error> for ErrorResponse {
    fn from(err: &Error) -> Self {
        Self::from_error(err)
    }
}

impl From<Error> for ErrorResponse {
    fn from(err: Error) -> Self {
        Self::from_error(&err)
    }
}

impl std::fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Sanitized source chain for server-side logs
fn cause_chain(err: &Error) -> String {
    let mut parts = Vec::new();
    let mut source = StdError::source(err);
    while let Some(cause) = source {
        parts.push(clusterforge_common::error::sanitize_message(&cause.to_string()));
        source = StdError::source(cause);
    }
    if parts.is_empty() {
        "none".to_string()
    } else {
        parts.join(": ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_is_sanitized() {
        let err = Error::backend("upstream rejected token=abcdef123456")
            .with_detail("resource", "cluster")
            .with_detail("raw_body", "password=hunter22")
            .with_source(std::io::Error::new(std::io::ErrorKind::Other, "socket reset"));

        let response = ErrorResponse::from_error(&err);
        assert_eq!(response.code, ErrorCode::BackendApi);
        assert!(!response.message.contains("abcdef123456"));
        assert!(response.details.contains_key("resource"));
        assert!(!response.details.contains_key("raw_body"));

        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("socket reset"));
        assert!(json.contains("BACKEND_API_ERROR"));
        assert!(response.retryable);
    }

    #[test]
    fn test_caller_faults_not_retryable() {
        let response = ErrorResponse::from_error(&Error::not_found("cluster", "demo"));
        assert!(!response.retryable);
        assert!(ErrorResponse::new(ErrorCode::Timeout, "slow").retryable);
    }

    #[test]
    fn test_with_detail_allow_list() {
        let response = ErrorResponse::new(ErrorCode::InvalidInput, "bad tool arguments")
            .with_detail("field", "replicas")
            .with_detail("cluster", "demo");
        assert_eq!(response.details.len(), 1);
        assert_eq!(response.http_status(), 400);
    }

    #[test]
    fn test_status_mapping() {
        let to_status = |code| ErrorResponse::new(code, "x").http_status();
        assert_eq!(to_status(ErrorCode::NotFound), 404);
        assert_eq!(to_status(ErrorCode::AlreadyExists), 409);
        assert_eq!(to_status(ErrorCode::Unavailable), 503);
        assert_eq!(to_status(ErrorCode::Timeout), 504);
    }
}
