//! Error type for the REST boundary.
//!
//! Provides the split between network-class failures, which may be retried
//! once by the session, and answers the server gave, which never are.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Could not reach the server or the connection broke mid-request
    #[error("Network error: {message}")]
    Network { message: String },

    /// Request exceeded the configured timeout
    #[error("Request timeout after {duration}s")]
    Timeout { duration: u64 },

    /// The server answered with a non-success status
    #[error("Server rejected request: {status} - {message}")]
    Rejected { status: u16, message: String },

    /// The server answered with a body this client cannot decode
    #[error("Invalid response: {message}")]
    Decode { message: String },
}

impl GatewayError {
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        GatewayError::Rejected {
            status: 404,
            message: format!("{} not found", what),
        }
    }

    /// Network-class failures. Upstream unavailability (502/503/504) counts
    /// as network-class; every other server answer does not.
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Network { .. } | GatewayError::Timeout { .. } => true,
            GatewayError::Rejected { status, .. } => matches!(status, 502 | 503 | 504),
            GatewayError::Decode { .. } => false,
        }
    }

    /// HTTP status code, when the server produced one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            GatewayError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            GatewayError::Network { .. } => "network_error",
            GatewayError::Timeout { .. } => "request_timeout",
            GatewayError::Rejected { .. } => "rejected",
            GatewayError::Decode { .. } => "decode_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_and_timeout_are_retryable() {
        assert!(GatewayError::Network {
            message: "reset".into()
        }
        .is_retryable());
        assert!(GatewayError::Timeout { duration: 30 }.is_retryable());
    }

    #[test]
    fn server_rejections_are_not_retryable() {
        let err = GatewayError::Rejected {
            status: 422,
            message: "title required".into(),
        };
        assert!(!err.is_retryable());
        assert_eq!(err.status_code(), Some(422));
        assert_eq!(err.error_type(), "rejected");
        assert!(!GatewayError::Decode {
            message: "bad json".into()
        }
        .is_retryable());
    }

    #[test]
    fn upstream_unavailable_is_network_class() {
        let err = GatewayError::Rejected {
            status: 503,
            message: "maintenance".into(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn not_found_carries_404() {
        let err = GatewayError::not_found("article 7");
        assert_eq!(err.status_code(), Some(404));
        assert_eq!(err.to_string(), "Server rejected request: 404 - article 7 not found");
    }
}
