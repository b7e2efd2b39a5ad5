//! Storage error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Corrupted store at {location}: {reason}")]
    Corrupted { location: String, reason: String },

    #[error("Store location already owned by another instance: {0}")]
    PathInUse(String),

    #[error("Store has been destroyed: {0}")]
    Destroyed(String),

    #[error("Store is not initialized: {0}")]
    NotInitialized(String),

    #[error("Defaults shape must be a JSON object")]
    InvalidDefaults,
}
