//! Logdeck Core
//!
//! Bootstrap and coordination layer: configuration, durable settings, the
//! in-process stream worker and the providers that fill the capability slots.

mod config;
mod error;
mod notifications;
mod panels;
mod settings;
mod worker;
mod workspace;

pub use config::{Config, DATA_DIR_ENV};
pub use error::CoreError;
pub use notifications::NotificationCenter;
pub use panels::{Bar, BarState, PanelApps};
pub use settings::{open_store, push_recent_file, AppSettings, DurableStore, SearchDefaults, WindowState};
pub use worker::{WorkerConfig, WorkerTransport};
pub use workspace::Workspace;

// Re-export the layers below
pub use logdeck_events::{Channel, ComponentDescriptor, RowsUpdate, Subscription};
pub use logdeck_session::{
    ActivePhase, ActiveSession, CustomTab, Entry, Hub, Notification, NotificationLevel,
    PluginCapabilities, Popup, RegistryConfig, SearchSettings, Session, SessionError,
    SessionRegistry, ViewKind,
};
pub use logdeck_storage::{KeyedStore, SettingsAccess, StorageError, StoreOptions};
pub use logdeck_tabs::{Tab, TabError, TabKind, TabState};

pub type Result<T> = std::result::Result<T, CoreError>;

/// Initialize logging. `RUST_LOG` wins over `directive`; both absent means `info`.
pub fn init_logging(directive: Option<&str>) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = match (EnvFilter::try_from_default_env(), directive) {
        (Ok(filter), _) => filter,
        (Err(_), Some(directive)) => EnvFilter::try_new(directive)
            .map_err(|e| CoreError::Config(format!("invalid log filter {directive:?}: {e}")))?,
        (Err(_), None) => EnvFilter::new("info"),
    };

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| CoreError::Config(format!("logging already initialized: {e}")))
}
