//! Error types shared by every ChainVerify crate.

use std::time::Duration;

use thiserror::Error;

use crate::request::JsonRpcError;

/// Errors that can occur while talking to a JSON-RPC node.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed (connection refused, non-2xx status, body read).
    #[error("HTTP error: {0}")]
    Http(String),

    /// JSON-RPC protocol-level error returned by the node.
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    /// Request timed out after the configured duration.
    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// Response could not be deserialized.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// An unexpected error.
    #[error("{0}")]
    Other(String),
}

/// Errors raised by the verification flow before a status can be produced.
///
/// Callers at the HTTP boundary turn these into a status plus diagnostic
/// payload; none of them are retried server-side.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// Address is not `0x` followed by 40 hex characters.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// A required configuration value is missing or malformed.
    #[error("configuration error: {0}")]
    Config(String),

    /// `eth_getStorageAt` failed or answered with something that is not a
    /// storage word; carries the raw transport error.
    #[error("RPC read failed: {0}")]
    RpcRead(#[from] TransportError),

    /// The verifier subprocess could not be started.
    #[error("failed to spawn verifier: {0}")]
    Spawn(String),

    /// The verifier subprocess did not finish in time and was killed.
    #[error("VerificationTimeout: verifier did not finish within {}s", .0.as_secs())]
    VerificationTimeout(Duration),
}

impl VerifyError {
    /// Input problems are the caller's fault (HTTP 400).
    pub fn is_bad_request(&self) -> bool {
        matches!(self, Self::InvalidAddress(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_read_wraps_transport_error() {
        let err: VerifyError = TransportError::Http("connection refused".into()).into();
        assert!(matches!(err, VerifyError::RpcRead(_)));
        assert_eq!(err.to_string(), "RPC read failed: HTTP error: connection refused");
    }

    #[test]
    fn timeout_message_names_the_diagnostic() {
        let err = VerifyError::VerificationTimeout(Duration::from_secs(120));
        assert!(err.to_string().starts_with("VerificationTimeout"));
        assert!(err.to_string().contains("120s"));
    }

    #[test]
    fn only_address_errors_are_bad_requests() {
        assert!(VerifyError::InvalidAddress("0x12".into()).is_bad_request());
        assert!(!VerifyError::Config("RPC_URL not set".into()).is_bad_request());
        assert!(!VerifyError::Spawn("enoent".into()).is_bad_request());
        let rpc = TransportError::Rpc(JsonRpcError {
            code: -32000,
            message: "header not found".into(),
            data: None,
        });
        assert!(!VerifyError::RpcRead(rpc).is_bad_request());
    }
}
