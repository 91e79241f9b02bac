use std::time::Duration;

use thiserror::Error;

/// Local durable store failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("local storage unavailable: {0}")]
    Unavailable(String),

    #[error("local storage quota exceeded writing {key} (limit {limit_bytes} bytes)")]
    QuotaExceeded { key: String, limit_bytes: u64 },

    #[error("stored value under {key} is corrupt: {reason}")]
    Corrupt { key: String, reason: String },
}

/// Remote gateway failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("remote unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("remote call timed out after {0:?}")]
    Timeout(Duration),

    #[error("remote rejected {field}: {reason}")]
    ValidationRejected { field: String, reason: String },

    #[error("remote rejected commit: {0}")]
    ConflictRejected(String),

    #[error("remote record not found")]
    NotFound,
}

impl GatewayError {
    /// Network-class failures; the write is kept locally and may sync later.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GatewayError::RemoteUnavailable(_) | GatewayError::Timeout(_)
        )
    }
}
