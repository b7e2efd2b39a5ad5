//! Session Entity

use chrono::{DateTime, Utc};
use logdeck_events::{Channel, ComponentDescriptor};
use logdeck_storage::{MemoryStorage, ScratchStore};
use logdeck_tabs::TabHandle;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::deferred::Deferred;
use crate::error::{SessionError, TransportError};
use crate::transport::Transport;
use crate::Result;

/// The backend stream a session is bound to
#[derive(Clone)]
pub struct StreamRef {
    id: String,
    transport: Arc<dyn Transport>,
}

impl StreamRef {
    pub fn new(id: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            id: id.into(),
            transport,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn teardown(&self) -> std::result::Result<(), TransportError> {
        self.transport.teardown(&self.id).await
    }
}

impl std::fmt::Debug for StreamRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamRef").field("id", &self.id).finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub source_id: u32,
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewKind {
    Output,
    Search,
}

/// A component a plugin placed into one of the session's views
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputInjection {
    pub id: String,
    pub kind: ViewKind,
    pub component: ComponentDescriptor,
}

pub struct Session {
    id: String,
    stream: StreamRef,
    scope: ScratchStore,
    tab: Deferred<TabHandle>,
    source_id: RwLock<Option<u32>>,
    source_changed: Channel<SourceInfo>,
    active: AtomicBool,
    row_count: AtomicU64,
    search_count: AtomicU64,
    injections: RwLock<Vec<OutputInjection>>,
    opened_at: DateTime<Utc>,
}

impl Session {
    pub(crate) fn new(
        stream: StreamRef,
        scratch: MemoryStorage,
        tab: Deferred<TabHandle>,
    ) -> Self {
        let id = stream.id().to_string();
        Self {
            scope: ScratchStore::new(id.clone(), scratch),
            id,
            stream,
            tab,
            source_id: RwLock::new(None),
            source_changed: Channel::new("source_changed"),
            active: AtomicBool::new(false),
            row_count: AtomicU64::new(0),
            search_count: AtomicU64::new(0),
            injections: RwLock::new(Vec::new()),
            opened_at: Utc::now(),
        }
    }

    pub(crate) async fn init(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(SessionError::InvalidId(self.id.clone()));
        }
        tracing::debug!(session_id = %self.id, "Session initialized");
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn stream(&self) -> &StreamRef {
        &self.stream
    }

    /// Per-session panel state
    pub fn scope(&self) -> &ScratchStore {
        &self.scope
    }

    /// The session's tab, once the tab strip has created it
    pub fn tab(&self) -> Option<&TabHandle> {
        self.tab.get()
    }

    pub fn source_id(&self) -> Option<u32> {
        *self.source_id.read()
    }

    pub fn on_source_changed(&self) -> &Channel<SourceInfo> {
        &self.source_changed
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn row_count(&self) -> u64 {
        self.row_count.load(Ordering::SeqCst)
    }

    pub fn search_count(&self) -> u64 {
        self.search_count.load(Ordering::SeqCst)
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    pub(crate) fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }

    pub(crate) fn set_source(&self, source_id: u32, title: String) {
        *self.source_id.write() = Some(source_id);
        tracing::debug!(session_id = %self.id, source_id, "Source changed");
        self.source_changed.emit(SourceInfo { source_id, title });
    }

    pub(crate) fn set_row_count(&self, rows: u64) {
        self.row_count.store(rows, Ordering::SeqCst);
    }

    pub(crate) fn set_search_count(&self, rows: u64) {
        self.search_count.store(rows, Ordering::SeqCst);
    }

    pub fn add_output_injection(&self, kind: ViewKind, component: ComponentDescriptor) -> String {
        let id = Uuid::new_v4().to_string();
        self.injections.write().push(OutputInjection {
            id: id.clone(),
            kind,
            component,
        });
        id
    }

    pub fn remove_output_injection(&self, id: &str, kind: ViewKind) -> bool {
        let mut injections = self.injections.write();
        let before = injections.len();
        injections.retain(|injection| !(injection.id == id && injection.kind == kind));
        before != injections.len()
    }

    pub fn output_injections(&self, kind: ViewKind) -> Vec<OutputInjection> {
        self.injections
            .read()
            .iter()
            .filter(|injection| injection.kind == kind)
            .cloned()
            .collect()
    }

    /// Release the backend stream and local state. Local cleanup happens even
    /// when the teardown fails; the failure is handed back for logging.
    pub(crate) async fn destroy(&self) -> std::result::Result<(), TransportError> {
        let teardown = self.stream.teardown().await;
        self.scope.clear();
        self.injections.write().clear();
        self.set_active(false);
        teardown
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("source_id", &self.source_id())
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deferred::DeferredCell;
    use crate::testing::MockTransport;
    use logdeck_tabs::{TabKind, TabStrip};
    use parking_lot::Mutex;
    use serde_json::json;

    fn session(id: &str, transport: Arc<MockTransport>) -> (Session, DeferredCell<TabHandle>) {
        let cell = DeferredCell::new();
        let session = Session::new(
            StreamRef::new(id, transport),
            MemoryStorage::new(),
            cell.reader(),
        );
        (session, cell)
    }

    #[tokio::test]
    async fn test_init_rejects_empty_id() {
        let (session, _cell) = session("", Arc::new(MockTransport::new()));
        assert!(matches!(
            session.init().await,
            Err(SessionError::InvalidId(_))
        ));
    }

    #[tokio::test]
    async fn test_tab_handle_resolves_after_fill() {
        let (session, cell) = session("s1", Arc::new(MockTransport::new()));
        session.init().await.unwrap();
        assert!(session.tab().is_none());

        let strip = TabStrip::new();
        cell.fill(strip.add("s1", "Default", TabKind::Stream).unwrap())
            .unwrap();
        assert_eq!(session.tab().map(|tab| tab.id()), Some("s1"));
    }

    #[test]
    fn test_source_changed_notifies() {
        let (session, _cell) = session("s1", Arc::new(MockTransport::new()));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let _sub = {
            let seen = Arc::clone(&seen);
            session
                .on_source_changed()
                .subscribe(move |info| seen.lock().push(info.title.clone()))
        };

        session.set_source(3, "trace.dlt".into());
        assert_eq!(session.source_id(), Some(3));
        assert_eq!(*seen.lock(), vec!["trace.dlt".to_string()]);
    }

    #[test]
    fn test_output_injections_by_kind() {
        let (session, _cell) = session("s1", Arc::new(MockTransport::new()));
        let id = session.add_output_injection(ViewKind::Output, ComponentDescriptor::new("Marker"));

        assert_eq!(session.output_injections(ViewKind::Output).len(), 1);
        assert!(session.output_injections(ViewKind::Search).is_empty());
        assert!(!session.remove_output_injection(&id, ViewKind::Search));
        assert!(session.remove_output_injection(&id, ViewKind::Output));
    }

    #[tokio::test]
    async fn test_destroy_clears_state_even_when_teardown_fails() {
        let transport = Arc::new(MockTransport::new());
        transport.fail_teardown(true);
        let (session, _cell) = session("s1", Arc::clone(&transport));
        session.scope().set("merge", &json!(["a.log"])).unwrap();
        session.set_active(true);

        assert!(session.destroy().await.is_err());
        assert!(!session.scope().has("merge"));
        assert!(!session.is_active());
        assert_eq!(transport.calls(), vec!["teardown:s1".to_string()]);
    }
}
