//! Error types for order-sync
//!
//! This module defines the error types used throughout the engine.
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Remote order API errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SyncError {
    /// Network timeout
    #[error("Network timeout")]
    NetworkTimeout,

    /// Connection refused
    #[error("Connection refused")]
    ConnectionRefused,

    /// Generic network error
    #[error("Network error: {0}")]
    Network(String),

    /// Server-reported failure
    #[error("API error: HTTP {status}: {message}")]
    Api {
        /// HTTP status code returned by the order service
        status: u16,
        /// Response body excerpt
        message: String,
    },

    /// Invalid data received
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Persistence errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// IO error during a load or save
    #[error("Storage IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Storage serialization error: {0}")]
    Serialization(String),

    /// Stored file exists but cannot be decoded
    #[error("Corrupt state file {path}: {reason}")]
    Corrupt {
        /// Path of the unreadable file
        path: String,
        /// Decoder message
        reason: String,
    },
}

/// Failure classification reported to observers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connectivity or timeout problem that outlived the retry budget
    Network,
    /// The order service rejected the request or sent unusable data
    Api,
    /// Local persistence failed
    Storage,
    /// The run was cancelled by the caller
    Cancelled,
}

/// Engine-level error type
///
/// Aggregates all failures that can end a coordinator run.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Remote call failed
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    /// Persistence failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Cancelled at a suspension point
    #[error("Sync cancelled")]
    Cancelled,
}

impl EngineError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Sync(SyncError::NetworkTimeout)
            | EngineError::Sync(SyncError::ConnectionRefused)
            | EngineError::Sync(SyncError::Network(_)) => ErrorKind::Network,
            EngineError::Sync(SyncError::Api { .. })
            | EngineError::Sync(SyncError::InvalidData(_)) => ErrorKind::Api,
            EngineError::Storage(_) => ErrorKind::Storage,
            EngineError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Message safe to show to a user
    ///
    /// Names the failure kind (and the HTTP status for API errors) without
    /// leaking paths, response bodies or transport details.
    pub fn user_message(&self) -> String {
        match self {
            EngineError::Sync(SyncError::NetworkTimeout) => {
                "Network error: the order service did not respond in time".to_string()
            }
            EngineError::Sync(SyncError::ConnectionRefused)
            | EngineError::Sync(SyncError::Network(_)) => {
                "Network error: could not reach the order service".to_string()
            }
            EngineError::Sync(SyncError::Api { status, .. }) => match status {
                401 | 403 => format!("API error: access denied (HTTP {})", status),
                404 => "API error: order data not found (HTTP 404)".to_string(),
                429 => "API error: request quota exceeded (HTTP 429)".to_string(),
                s if *s >= 500 => format!("API error: order service unavailable (HTTP {})", s),
                s => format!("API error: request rejected (HTTP {})", s),
            },
            EngineError::Sync(SyncError::InvalidData(_)) => {
                "API error: unexpected response from the order service".to_string()
            }
            EngineError::Storage(_) => "Storage error: could not read or write local state".to_string(),
            EngineError::Cancelled => "Sync cancelled".to_string(),
        }
    }
}

/// Trait for determining if an error is retryable
pub trait RetryableError {
    /// Returns true if the error is retryable
    fn is_retryable(&self) -> bool;
}

impl RetryableError for SyncError {
    fn is_retryable(&self) -> bool {
        match self {
            // Transient
            SyncError::NetworkTimeout => true,
            SyncError::ConnectionRefused => true,
            SyncError::Network(_) => true,

            // The same request would fail again
            SyncError::Api { .. } => false,
            SyncError::InvalidData(_) => false,
        }
    }
}
