//! Application state container
//!
//! Wires the durable stores, the stream worker, the event hub, the capability
//! providers and the session registry together, in dependency order.

use logdeck_session::{
    CapabilityRegistry, CustomTab, Entry, Hub, SearchSettings, Session, SessionError,
    SessionRegistry, Transport,
};
use logdeck_tabs::TabStrip;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::error::CoreError;
use crate::notifications::NotificationCenter;
use crate::panels::PanelApps;
use crate::settings::{self, AppSettings, DurableStore, WindowState};
use crate::worker::WorkerTransport;
use crate::Result;

pub struct Workspace {
    config: Config,
    settings: Arc<DurableStore>,
    window: Arc<DurableStore>,
    worker: Arc<WorkerTransport>,
    worker_task: Mutex<Option<JoinHandle<()>>>,
    event_pump: Mutex<Option<JoinHandle<()>>>,
    registry: SessionRegistry,
    panels: PanelApps,
    notifications: NotificationCenter,
    shut_down: AtomicBool,
}

impl Workspace {
    pub async fn open(config: Config) -> Result<Self> {
        tokio::fs::create_dir_all(&config.data_dir).await?;

        let settings = Arc::new(
            settings::open_store::<AppSettings>(&config.settings_path, config.settings_options())
                .await?,
        );
        let window = Arc::new(
            settings::open_store::<WindowState>(&config.window_path, config.window_options())
                .await?,
        );

        let (worker, worker_task) = WorkerTransport::spawn(config.worker.clone());
        let worker = Arc::new(worker);

        let hub = Arc::new(Hub::new());
        let capabilities = Arc::new(CapabilityRegistry::new());
        let panels = PanelApps::attach(&hub, &capabilities)?;
        let notifications = NotificationCenter::attach(&capabilities, config.notification_history)?;

        let transport: Arc<dyn Transport> = worker.clone();
        let registry = SessionRegistry::new(
            transport,
            TabStrip::new(),
            hub,
            capabilities,
            config.registry.clone(),
        )
        .with_settings(settings.clone());
        let event_pump = registry.spawn_event_pump();

        tracing::info!(data_dir = %config.data_dir.display(), "Workspace ready");

        Ok(Self {
            config,
            settings,
            window,
            worker,
            worker_task: Mutex::new(Some(worker_task)),
            event_pump: Mutex::new(Some(event_pump)),
            registry,
            panels,
            notifications,
            shut_down: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<()> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(CoreError::ShutDown);
        }
        Ok(())
    }

    // === Sessions ===

    /// Open an empty stream-backed session and make it active
    pub async fn open_session(&self) -> Result<Arc<Session>> {
        self.ensure_open()?;
        let sidebar_app = match self.settings.get_as::<AppSettings>() {
            Ok(app_settings) => app_settings.default_sidebar_app,
            Err(e) => {
                tracing::warn!(error = %e, "Cannot read settings, no default sidebar app");
                None
            }
        };

        let entry = self.registry.add(None).await?;
        let session = entry
            .as_session()
            .cloned()
            .ok_or_else(|| SessionError::NotASession(entry.id().to_string()))?;

        if let Some(app) = sidebar_app.as_deref() {
            self.registry.bars().open_sidebar_app(app, true);
        }

        Ok(session)
    }

    /// Open a session over one named source and feed it `rows`.
    /// The session is closed again when the worker refuses the source.
    pub async fn open_source(&self, title: &str, rows: Vec<String>) -> Result<Arc<Session>> {
        let session = self.open_session().await?;
        if let Err(e) = self.feed(session.id(), title, rows).await {
            tracing::warn!(session_id = %session.id(), error = %e, "Fail to load source");
            if let Err(e) = self.close_tab(session.id()).await {
                tracing::warn!(session_id = %session.id(), error = %e, "Fail to close session");
            }
            return Err(e);
        }

        if let Err(e) = settings::push_recent_file(&self.settings, title).await {
            tracing::warn!(title, error = %e, "Cannot remember recent file");
        }
        Ok(session)
    }

    async fn feed(&self, id: &str, title: &str, rows: Vec<String>) -> Result<()> {
        self.worker.attach_source(id, title).await?;
        if !rows.is_empty() {
            self.worker.append_rows(id, rows).await?;
        }
        Ok(())
    }

    pub async fn open_custom(&self, custom: CustomTab) -> Result<Entry> {
        self.ensure_open()?;
        Ok(self.registry.add(Some(custom)).await?)
    }

    /// Close a tab and show its neighbour when it was the shown one.
    /// Returns the id that became active.
    pub async fn close_tab(&self, id: &str) -> Result<Option<String>> {
        if !self.registry.contains(id) {
            return Err(SessionError::NotFound(id.to_string()).into());
        }

        let tabs = self.registry.tabs();
        let successor = if tabs.contains(id) { tabs.remove(id)? } else { None };

        self.registry.destroy(id).await?;

        if let Some(next) = successor.as_deref() {
            self.registry.set_active(next).await?;
        }
        Ok(successor)
    }

    /// Remember the search for `id` and run it on the worker
    pub async fn search(&self, id: &str, search: SearchSettings) -> Result<u64> {
        self.registry.set_search_settings(id, search.clone())?;
        let query = Some(search.query.as_str()).filter(|q| !q.is_empty());
        Ok(self.worker.search(id, query).await?)
    }

    // === Accessors ===

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &Arc<DurableStore> {
        &self.settings
    }

    pub fn window_state(&self) -> &Arc<DurableStore> {
        &self.window
    }

    pub fn worker(&self) -> &Arc<WorkerTransport> {
        &self.worker
    }

    pub fn panels(&self) -> &PanelApps {
        &self.panels
    }

    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    /// Close every session, stop the worker and flush the durable stores
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }

        let closed = self.registry.close_all().await;

        if let Some(pump) = self.event_pump.lock().take() {
            pump.abort();
        }
        self.worker.shutdown().await;
        let worker_task = self.worker_task.lock().take();
        if let Some(task) = worker_task {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Stream worker ended abnormally");
            }
        }

        self.settings.destroy().await;
        self.window.destroy().await;

        tracing::info!(closed, "Workspace shut down");
    }
}
