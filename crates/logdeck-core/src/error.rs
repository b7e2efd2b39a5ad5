//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] logdeck_storage::StorageError),

    #[error("Tab error: {0}")]
    Tab(#[from] logdeck_tabs::TabError),

    #[error("Session error: {0}")]
    Session(#[from] logdeck_session::SessionError),

    #[error("Transport error: {0}")]
    Transport(#[from] logdeck_session::TransportError),

    #[error("Capability error: {0}")]
    Capability(#[from] logdeck_session::CapabilityError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Workspace is shut down")]
    ShutDown,
}
