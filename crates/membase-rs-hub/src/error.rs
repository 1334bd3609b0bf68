//! Error types for hub transport and client operations.

use thiserror::Error;

/// Failure of a single transport attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The request exceeded its timeout and the connection was aborted.
    #[error("request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    /// Connection, TLS or body transfer failure.
    #[error("network error: {0}")]
    Network(String),
    /// The request could not be built.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Errors returned by hub client operations.
#[derive(Debug, Error)]
pub enum HubError {
    /// Transport-level failure.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The hub rejected the request (4xx); never retried.
    #[error("{operation} rejected by hub (status {status})")]
    Client { operation: String, status: u16 },
    /// Any other non-success status.
    #[error("{operation} failed (status {status})")]
    Status { operation: String, status: u16 },
    /// The hub answered with an empty or `null` body.
    #[error("{operation} returned null")]
    EmptyResponse { operation: String },
    /// The response body could not be decoded.
    #[error("{operation} returned an undecodable body: {source}")]
    Decode {
        operation: String,
        #[source]
        source: serde_json::Error,
    },
    /// Every attempt of a retried read failed.
    #[error("{operation} failed after {attempts} attempts: {last}")]
    RetryExhausted {
        operation: String,
        attempts: u32,
        #[source]
        last: Box<HubError>,
    },
}

impl HubError {
    /// Whether another attempt of the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            HubError::Client { .. }
                | HubError::RetryExhausted { .. }
                | HubError::Transport(TransportError::InvalidRequest(_))
        )
    }

    /// Classify a non-success status for the given operation.
    pub(crate) fn from_status(operation: &str, status: u16) -> Self {
        if (400..500).contains(&status) {
            HubError::Client {
                operation: operation.to_string(),
                status,
            }
        } else {
            HubError::Status {
                operation: operation.to_string(),
                status,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{HubError, TransportError};

    #[test]
    fn client_errors_are_not_retryable() {
        assert!(!HubError::from_status("get", 404).is_retryable());
        assert!(!HubError::from_status("get", 400).is_retryable());
        assert!(HubError::from_status("get", 503).is_retryable());
        assert!(HubError::from(TransportError::Timeout { timeout_ms: 5 }).is_retryable());
    }

    #[test]
    fn unbuildable_requests_are_not_retryable() {
        let err = HubError::from(TransportError::InvalidRequest("bad header".into()));
        assert!(!err.is_retryable());
        assert!(HubError::from(TransportError::Network("reset".into())).is_retryable());
    }
}
