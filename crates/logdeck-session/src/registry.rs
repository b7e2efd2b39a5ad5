//! Session Registry
//!
//! Authoritative `id -> entry` map plus the single active pointer.
//!
//! The pointer flips synchronously when a switch starts and stays `Pending`
//! until the backend acknowledges; the acknowledgment only promotes it to
//! `Applied` if no later switch replaced it in the meantime. A failed
//! acknowledgment is logged and never rolls the pointer back.

use logdeck_events::{EventHub, RowsUpdate, Subscription};
use logdeck_storage::{MemoryStorage, SettingsAccess};
use logdeck_tabs::{TabKind, TabStrip};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::capabilities::{Bars, CapabilityRegistry};
use crate::deferred::DeferredCell;
use crate::entry::{CustomTab, Entry};
use crate::error::SessionError;
use crate::plugin::PluginCapabilities;
use crate::session::{Session, SourceInfo, StreamRef};
use crate::transport::{BackendEvent, CreateRequest, Transport};
use crate::Result;

pub type Hub = EventHub<Arc<Session>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Upper bound on open stream-backed sessions
    pub max_sessions: usize,
    /// Tab title until the backend reports a source
    pub default_title: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_sessions: 64,
            default_title: "Default".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivePhase {
    /// Switched locally, backend not yet acknowledged
    Pending,
    Applied,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveSession {
    pub id: String,
    pub phase: ActivePhase,
}

/// Last search a session ran
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub query: String,
    pub case_sensitive: bool,
    pub regex: bool,
    pub whole_word: bool,
}

pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, Entry>>>,
    active: Arc<RwLock<Option<ActiveSession>>>,
    source_subscriptions: Arc<Mutex<HashMap<String, Subscription>>>,
    search_settings: Arc<RwLock<HashMap<String, SearchSettings>>>,
    transport: Arc<dyn Transport>,
    tabs: TabStrip,
    hub: Arc<Hub>,
    capabilities: Arc<CapabilityRegistry>,
    settings: Option<Arc<dyn SettingsAccess>>,
    scratch: MemoryStorage,
    config: RegistryConfig,
}

impl SessionRegistry {
    pub fn new(
        transport: Arc<dyn Transport>,
        tabs: TabStrip,
        hub: Arc<Hub>,
        capabilities: Arc<CapabilityRegistry>,
        config: RegistryConfig,
    ) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            active: Arc::new(RwLock::new(None)),
            source_subscriptions: Arc::new(Mutex::new(HashMap::new())),
            search_settings: Arc::new(RwLock::new(HashMap::new())),
            transport,
            tabs,
            hub,
            capabilities,
            settings: None,
            scratch: MemoryStorage::new(),
            config,
        }
    }

    /// Durable settings handed to plugins
    pub fn with_settings(mut self, settings: Arc<dyn SettingsAccess>) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Open a stream-backed session, or register `custom` when given.
    /// Either way the new entry becomes active.
    pub async fn add(&self, custom: Option<CustomTab>) -> Result<Entry> {
        match custom {
            Some(custom) => self.add_custom(custom).await,
            None => self.add_session().await,
        }
    }

    fn ensure_capacity(&self, sessions: &HashMap<String, Entry>) -> Result<()> {
        let open = sessions.values().filter(|entry| entry.is_session()).count();
        if open >= self.config.max_sessions {
            return Err(SessionError::LimitReached(self.config.max_sessions));
        }
        Ok(())
    }

    async fn add_session(&self) -> Result<Entry> {
        // Only a suggestion; the backend picks the id that gets registered
        let provisional = Uuid::new_v4().to_string();
        {
            let sessions = self.sessions.read();
            self.ensure_capacity(&sessions)?;
            if sessions.contains_key(&provisional) {
                return Err(SessionError::Collision(provisional));
            }
        }

        let response = self
            .transport
            .create(CreateRequest {
                proposed_id: Some(provisional.clone()),
            })
            .await?;
        if let Some(error) = response.error {
            tracing::warn!(proposed_id = %provisional, error = %error, "Backend refused session");
            return Err(SessionError::Backend(error));
        }

        let id = response.id;
        if id != provisional {
            tracing::debug!(proposed_id = %provisional, session_id = %id, "Backend assigned another id");
        }
        if self.sessions.read().contains_key(&id) {
            tracing::warn!(session_id = %id, "Backend returned an id already in use");
            return Err(SessionError::Collision(id));
        }

        let cell = DeferredCell::new();
        let session = Arc::new(Session::new(
            StreamRef::new(id.clone(), Arc::clone(&self.transport)),
            self.scratch.clone(),
            cell.reader(),
        ));

        if let Err(e) = session.init().await {
            self.release_stream(&session).await;
            return Err(e);
        }

        // Another add may have claimed the id or the last slot while we awaited
        let inserted = {
            let mut sessions = self.sessions.write();
            if sessions.contains_key(&id) {
                return Err(SessionError::Collision(id));
            }
            self.ensure_capacity(&sessions).map(|()| {
                sessions.insert(id.clone(), Entry::Session(Arc::clone(&session)));
            })
        };
        if let Err(e) = inserted {
            self.release_stream(&session).await;
            return Err(e);
        }

        let handle = match self.tabs.add(&id, &self.config.default_title, TabKind::Stream) {
            Ok(handle) => handle,
            Err(e) => {
                self.sessions.write().remove(&id);
                self.release_stream(&session).await;
                return Err(e.into());
            }
        };
        let _ = cell.fill(handle);

        let subscription = {
            let tabs = self.tabs.clone();
            let tab_id = id.clone();
            session
                .on_source_changed()
                .subscribe(move |info: &SourceInfo| {
                    if let Err(e) = tabs.set_title(&tab_id, info.title.clone()) {
                        tracing::debug!(session_id = %tab_id, error = %e, "Cannot retitle tab");
                    }
                })
        };
        self.source_subscriptions.lock().insert(id.clone(), subscription);

        tracing::info!(session_id = %id, "Session opened");
        self.hub.session_opened().emit(id.clone());

        if let Err(e) = self.set_active(&id).await {
            tracing::warn!(session_id = %id, error = %e, "New session closed before activation");
        }

        Ok(Entry::Session(session))
    }

    async fn release_stream(&self, session: &Session) {
        if let Err(e) = session.stream().teardown().await {
            tracing::warn!(session_id = %session.id(), error = %e, "Fail to release stream");
        }
    }

    async fn add_custom(&self, mut custom: CustomTab) -> Result<Entry> {
        let id = custom.id().to_string();
        let cell = DeferredCell::new();
        custom.bind_tab(cell.reader());
        let custom = Arc::new(custom);

        {
            let mut sessions = self.sessions.write();
            if sessions.contains_key(&id) {
                return Err(SessionError::Collision(id));
            }
            sessions.insert(id.clone(), Entry::Custom(Arc::clone(&custom)));
        }

        match self.tabs.add(&id, custom.title(), TabKind::Custom) {
            Ok(handle) => {
                let _ = cell.fill(handle);
            }
            Err(e) => {
                self.sessions.write().remove(&id);
                return Err(e.into());
            }
        }

        tracing::info!(tab_id = %id, factory = %custom.component().factory, "Custom tab opened");

        if let Err(e) = self.set_active(&id).await {
            tracing::warn!(tab_id = %id, error = %e, "Custom tab closed before activation");
        }

        Ok(Entry::Custom(custom))
    }

    /// Make `id` the active entry.
    ///
    /// Unknown ids leave the pointer untouched. For sessions the backend is
    /// told about the switch and `session_changed` fires once it answers.
    /// An answer that arrives after the session was closed, or after another
    /// `set_active` moved the pointer on, emits nothing: the newer switch
    /// reports for itself.
    pub async fn set_active(&self, id: &str) -> Result<()> {
        if self.active_id().as_deref() == Some(id) {
            return Ok(());
        }

        let Some(entry) = self.get(id) else {
            tracing::warn!(session_id = %id, "Cannot activate unknown session");
            return Err(SessionError::NotFound(id.to_string()));
        };

        let previous = {
            let mut active = self.active.write();
            if active.as_ref().is_some_and(|current| current.id == id) {
                return Ok(());
            }
            active.replace(ActiveSession {
                id: id.to_string(),
                phase: ActivePhase::Pending,
            })
        };

        if let Some(Entry::Session(previous)) =
            previous.and_then(|previous| self.get(&previous.id))
        {
            previous.set_active(false);
        }

        if let Err(e) = self.tabs.set_active(id) {
            tracing::warn!(session_id = %id, error = %e, "Cannot show tab");
        }

        match entry {
            Entry::Session(session) => {
                self.tabs.set_layout_locked(false);
                session.set_active(true);

                let ack = self.transport.set_active(id).await;
                if let Err(e) = &ack {
                    tracing::warn!(session_id = %id, error = %e, "Backend did not acknowledge switch");
                }

                // The session may have been closed, or replaced as active,
                // while the backend was answering
                if !self.sessions.read().contains_key(id) {
                    tracing::debug!(session_id = %id, "Switch acknowledged for a closed session");
                    return Ok(());
                }
                if !self.mark_applied(id, ack.is_ok()) {
                    tracing::debug!(session_id = %id, "Switch superseded before acknowledgment");
                    return Ok(());
                }

                tracing::info!(session_id = %id, "Session activated");
                self.hub.session_changed().emit(Some(session));
            }
            Entry::Custom(_) => {
                self.tabs.set_layout_locked(true);
                self.mark_applied(id, true);
                tracing::info!(tab_id = %id, "Custom tab activated");
                self.hub.session_changed().emit(None);
            }
        }

        Ok(())
    }

    /// Returns whether the pointer still names `id`
    fn mark_applied(&self, id: &str, acknowledged: bool) -> bool {
        let mut active = self.active.write();
        match active.as_mut() {
            Some(current) if current.id == id => {
                if acknowledged {
                    current.phase = ActivePhase::Applied;
                }
                true
            }
            _ => false,
        }
    }

    /// Close an entry. The backend teardown is best-effort: the entry goes
    /// away whether or not it succeeds.
    pub async fn destroy(&self, id: &str) -> Result<()> {
        let Some(entry) = self.get(id) else {
            tracing::warn!(session_id = %id, "Cannot destroy unknown session");
            return Err(SessionError::NotFound(id.to_string()));
        };

        if let Entry::Session(session) = &entry {
            if let Err(e) = session.destroy().await {
                tracing::warn!(session_id = %id, error = %e, "Stream teardown failed, removing session anyway");
            }
        }

        let subscription = self.source_subscriptions.lock().remove(id);
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
        }

        let (removed, now_empty) = {
            let mut sessions = self.sessions.write();
            let removed = sessions.remove(id);
            (removed, sessions.is_empty())
        };
        if removed.is_none() {
            tracing::debug!(session_id = %id, "Session already destroyed");
            return Ok(());
        }

        self.search_settings.write().remove(id);
        {
            let mut active = self.active.write();
            if active.as_ref().is_some_and(|current| current.id == id) {
                *active = None;
            }
        }
        if self.tabs.contains(id) {
            if let Err(e) = self.tabs.remove(id) {
                tracing::debug!(session_id = %id, error = %e, "Tab already gone");
            }
        }

        tracing::info!(session_id = %id, "Session closed");

        if now_empty {
            self.hub.session_changed().emit(None);
        }
        self.hub.session_closed().emit(id.to_string());

        Ok(())
    }

    /// Destroy every entry, in tab order
    pub async fn close_all(&self) -> usize {
        let ids: Vec<String> = self.list().iter().map(|entry| entry.id().to_string()).collect();
        let mut closed = 0;
        for id in ids {
            match self.destroy(&id).await {
                Ok(()) => closed += 1,
                Err(e) => tracing::warn!(session_id = %id, error = %e, "Fail to close session"),
            }
        }
        closed
    }

    pub fn get_active(&self) -> Option<Entry> {
        let id = self.active_id()?;
        self.get(&id)
    }

    pub fn active_id(&self) -> Option<String> {
        self.active.read().as_ref().map(|active| active.id.clone())
    }

    pub fn active_state(&self) -> Option<ActiveSession> {
        self.active.read().clone()
    }

    pub fn get(&self, id: &str) -> Option<Entry> {
        self.sessions.read().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.read().contains_key(id)
    }

    /// The stream-backed session registered under `id`
    pub fn get_session_controller(&self, id: &str) -> Result<Arc<Session>> {
        match self.get(id) {
            Some(Entry::Session(session)) => Ok(session),
            Some(Entry::Custom(_)) => Err(SessionError::NotASession(id.to_string())),
            None => Err(SessionError::NotFound(id.to_string())),
        }
    }

    /// Entries in tab order
    pub fn list(&self) -> Vec<Entry> {
        let order: Vec<String> = self.tabs.tabs().into_iter().map(|tab| tab.id).collect();
        let sessions = self.sessions.read();
        let mut entries: Vec<Entry> = order
            .iter()
            .filter_map(|id| sessions.get(id).cloned())
            .collect();
        // Registered but tab not built yet
        entries.extend(
            sessions
                .iter()
                .filter(|(id, _)| !order.contains(id))
                .map(|(_, entry)| entry.clone()),
        );
        entries
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    pub fn set_search_settings(&self, id: &str, settings: SearchSettings) -> Result<()> {
        if !self.contains(id) {
            return Err(SessionError::NotFound(id.to_string()));
        }
        self.search_settings.write().insert(id.to_string(), settings);
        Ok(())
    }

    pub fn search_settings(&self, id: &str) -> Option<SearchSettings> {
        self.search_settings.read().get(id).cloned()
    }

    pub fn bars(&self) -> Bars {
        Bars::new(Arc::clone(&self.capabilities))
    }

    /// Capability surface for one plugin instance
    pub fn plugin_capabilities(&self, plugin_id: u32) -> PluginCapabilities {
        PluginCapabilities::new(plugin_id, self.clone())
    }

    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    pub fn tabs(&self) -> &TabStrip {
        &self.tabs
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport)
    }

    pub fn capabilities(&self) -> &Arc<CapabilityRegistry> {
        &self.capabilities
    }

    pub fn settings(&self) -> Option<Arc<dyn SettingsAccess>> {
        self.settings.clone()
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Route one backend push. Events for sessions no longer registered are
    /// dropped.
    pub fn handle_backend_event(&self, event: BackendEvent) {
        let Some(session) = self
            .get(event.session_id())
            .and_then(|entry| entry.as_session().cloned())
        else {
            tracing::debug!(session_id = %event.session_id(), "Dropping event for unknown session");
            return;
        };

        match event {
            BackendEvent::StreamUpdated { id, row_count } => {
                session.set_row_count(row_count);
                self.hub.stream_updated().emit(RowsUpdate {
                    session_id: id,
                    row_count,
                });
            }
            BackendEvent::SearchUpdated { id, row_count } => {
                session.set_search_count(row_count);
                self.hub.search_updated().emit(RowsUpdate {
                    session_id: id,
                    row_count,
                });
            }
            BackendEvent::SourceChanged {
                source_id, title, ..
            } => session.set_source(source_id, title),
        }
    }

    /// Forward backend pushes into the registry until the transport closes
    pub fn spawn_event_pump(&self) -> JoinHandle<()> {
        let registry = self.clone();
        let mut events = self.transport.events();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => registry.handle_backend_event(event),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Backend event pump lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            tracing::debug!("Backend event pump stopped");
        })
    }
}

impl Clone for SessionRegistry {
    fn clone(&self) -> Self {
        Self {
            sessions: Arc::clone(&self.sessions),
            active: Arc::clone(&self.active),
            source_subscriptions: Arc::clone(&self.source_subscriptions),
            search_settings: Arc::clone(&self.search_settings),
            transport: Arc::clone(&self.transport),
            tabs: self.tabs.clone(),
            hub: Arc::clone(&self.hub),
            capabilities: Arc::clone(&self.capabilities),
            settings: self.settings.clone(),
            scratch: self.scratch.clone(),
            config: self.config.clone(),
        }
    }
}
