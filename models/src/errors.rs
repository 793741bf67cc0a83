// models/src/errors.rs
use std::io;
pub use thiserror::Error;
use serde::{Serialize, Deserialize};
use serde_json::Error as SerdeJsonError;
use tokio::task::JoinError;
use uuid::Error as UuidError;

#[derive(Debug, Serialize, Deserialize, Error, Clone, PartialEq)]
pub enum DispatchError {
    #[error("entity with identifier {0} was not found")]
    NotFound(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Invalid data provided: {0}")]
    InvalidData(String),
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Timeout error: {0}")]
    TimeoutError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("An internal error occurred: {0}")]
    InternalError(String),
}

impl From<tokio::time::error::Elapsed> for DispatchError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        DispatchError::TimeoutError("operation timed out".into())
    }
}

impl From<SerdeJsonError> for DispatchError {
    fn from(err: SerdeJsonError) -> Self {
        DispatchError::SerializationError(format!("JSON serialization error: {}", err))
    }
}

// A sled failure means the backing store cannot serve the call.
impl From<sled::Error> for DispatchError {
    fn from(err: sled::Error) -> Self {
        DispatchError::Unavailable(format!("Sled error: {}", err))
    }
}

impl From<reqwest::Error> for DispatchError {
    fn from(err: reqwest::Error) -> Self {
        // Request URLs carry the API key.
        let err = err.without_url();
        if err.is_timeout() {
            DispatchError::TimeoutError(format!("HTTP request timed out: {}", err))
        } else {
            DispatchError::NetworkError(format!("HTTP error: {}", err))
        }
    }
}

impl From<JoinError> for DispatchError {
    fn from(err: JoinError) -> Self {
        DispatchError::InternalError(format!("Task failed to join: {}", err))
    }
}

impl From<io::Error> for DispatchError {
    fn from(err: io::Error) -> Self {
        DispatchError::StorageError(format!("IO error: {}", err))
    }
}

impl From<UuidError> for DispatchError {
    fn from(err: UuidError) -> Self {
        DispatchError::InvalidData(format!("UUID error: {}", err))
    }
}

/// A type alias for a `Result` that returns a `DispatchError` on failure.
pub type DispatchResult<T> = Result<T, DispatchError>;
