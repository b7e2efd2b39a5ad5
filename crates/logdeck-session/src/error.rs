//! Session error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Entry is not a session: {0}")]
    NotASession(String),

    #[error("Session id already registered: {0}")]
    Collision(String),

    #[error("Session limit reached (max: {0})")]
    LimitReached(usize),

    #[error("Invalid session id: {0:?}")]
    InvalidId(String),

    #[error("No active session")]
    NoActiveSession,

    #[error("Backend refused to create session: {0}")]
    Backend(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Storage error: {0}")]
    Storage(#[from] logdeck_storage::StorageError),

    #[error("Tab error: {0}")]
    Tab(#[from] logdeck_tabs::TabError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Backend disconnected")]
    Disconnected,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("Capability already bound: {0}")]
    AlreadyBound(&'static str),
}
