//! Logdeck Session Orchestration
//!
//! - A Session is a workspace bound to one backend stream, identified by the id
//!   the backend assigned
//! - At most one session or custom page is active at a time
//! - Lifecycle changes fan out through the event hub; nothing here knows its
//!   subscribers
//! - Higher layers (sidebar, toolbar, notifications) plug in through
//!   capability slots bound once at startup

mod capabilities;
mod deferred;
mod entry;
mod error;
mod plugin;
mod registry;
mod session;
mod transport;

#[cfg(test)]
mod testing;

pub use capabilities::{Bars, CapabilityRegistry, Notification, NotificationLevel, Popup};
pub use deferred::{Deferred, DeferredCell};
pub use entry::{CustomTab, Entry};
pub use error::{CapabilityError, SessionError, TransportError};
pub use plugin::PluginCapabilities;
pub use registry::{
    ActivePhase, ActiveSession, Hub, RegistryConfig, SearchSettings, SessionRegistry,
};
pub use session::{OutputInjection, Session, SourceInfo, StreamRef, ViewKind};
pub use transport::{BackendEvent, CreateRequest, CreateResponse, Transport};

pub type Result<T> = std::result::Result<T, SessionError>;
