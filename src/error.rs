//! Error types for the ACP ledger.
//!
//! `StorageError` covers the sled-backed entry store, link index and revision heads.
//! `ApiError` is what every public operation returns; its first four variants are the
//! caller-facing taxonomy (validation, transition, bridge, lookup).

use crate::entry::JobPhase;
use thiserror::Error;

/// Errors raised by the persistence layer
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// A compare-and-swap lost against a concurrent writer
    #[error("conflicting write: {0}")]
    Conflict(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for StorageError {
    fn from(err: bincode::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Errors returned by coordinator, bridge and tool operations
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed input, rejected before any state change
    #[error("validation failed: {0}")]
    ValidationError(String),

    /// Phase change not allowed by the job lifecycle; the job is unchanged
    #[error("invalid transition for job {job_id}: {from} -> {to}")]
    InvalidTransition {
        job_id: String,
        from: JobPhase,
        to: JobPhase,
    },

    /// External settlement call failed, timed out or was abandoned
    #[error("bridge error: {0}")]
    BridgeError(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::SerializationError(err.to_string())
    }
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}

impl ApiError {
    /// Stable kind tag used on the tool surface
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::ValidationError(_) => "ValidationError",
            ApiError::InvalidTransition { .. } => "InvalidTransition",
            ApiError::BridgeError(_) => "BridgeError",
            ApiError::NotFound(_) => "NotFound",
            ApiError::StorageError(_) => "StorageError",
            ApiError::ConfigError(_) => "ConfigError",
            ApiError::SerializationError(_) => "SerializationError",
        }
    }
}
