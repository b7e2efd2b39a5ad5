//! Backend transport contract
//!
//! Only the request/response shapes the registry depends on. The worker that
//! owns stream data lives on the other side of this trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::TransportError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRequest {
    /// Suggestion only; the backend decides the final id
    #[serde(default)]
    pub proposed_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateResponse {
    pub id: String,
    #[serde(default)]
    pub error: Option<String>,
}

/// Pushed by the backend without a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendEvent {
    StreamUpdated { id: String, row_count: u64 },
    SearchUpdated { id: String, row_count: u64 },
    SourceChanged { id: String, source_id: u32, title: String },
}

impl BackendEvent {
    pub fn session_id(&self) -> &str {
        match self {
            BackendEvent::StreamUpdated { id, .. }
            | BackendEvent::SearchUpdated { id, .. }
            | BackendEvent::SourceChanged { id, .. } => id,
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn create(&self, request: CreateRequest) -> Result<CreateResponse, TransportError>;

    /// One-way switch notification; the caller never rolls back on failure
    async fn set_active(&self, id: &str) -> Result<(), TransportError>;

    /// Best-effort release of the stream
    async fn teardown(&self, id: &str) -> Result<(), TransportError>;

    fn events(&self) -> broadcast::Receiver<BackendEvent>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_shape() {
        let event: BackendEvent =
            serde_json::from_str(r#"{"type":"stream_updated","id":"s1","row_count":42}"#)
                .unwrap();
        assert_eq!(
            event,
            BackendEvent::StreamUpdated {
                id: "s1".into(),
                row_count: 42
            }
        );
        assert_eq!(event.session_id(), "s1");
    }

    #[test]
    fn test_create_response_without_error() {
        let response: CreateResponse = serde_json::from_str(r#"{"id":"abc"}"#).unwrap();
        assert_eq!(response.error, None);
    }
}
