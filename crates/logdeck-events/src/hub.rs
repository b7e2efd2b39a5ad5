//! The application-wide set of lifecycle channels
//!
//! Generic over the session payload so this crate sits below the session layer.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::channel::Channel;

/// Reference to a UI component by factory name plus its inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDescriptor {
    pub factory: String,
    #[serde(default)]
    pub inputs: Map<String, Value>,
}

impl ComponentDescriptor {
    pub fn new(factory: impl Into<String>) -> Self {
        Self {
            factory: factory.into(),
            inputs: Map::new(),
        }
    }

    pub fn with_input(mut self, key: impl Into<String>, value: Value) -> Self {
        self.inputs.insert(key.into(), value);
        self
    }

    /// Same factory and same number of inputs
    fn is_equivalent(&self, other: &ComponentDescriptor) -> bool {
        self.factory == other.factory && self.inputs.len() == other.inputs.len()
    }
}

/// Row count pushed by the backend for one session's stream or search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowsUpdate {
    pub session_id: String,
    pub row_count: u64,
}

pub struct EventHub<S> {
    session_changed: Channel<Option<S>>,
    session_opened: Channel<String>,
    session_closed: Channel<String>,
    title_injection: Channel<Option<ComponentDescriptor>>,
    stream_updated: Channel<RowsUpdate>,
    search_updated: Channel<RowsUpdate>,
    injected: RwLock<Option<ComponentDescriptor>>,
}

impl<S: 'static> EventHub<S> {
    pub fn new() -> Self {
        Self {
            session_changed: Channel::new("session_changed"),
            session_opened: Channel::new("session_opened"),
            session_closed: Channel::new("session_closed"),
            title_injection: Channel::new("title_injection"),
            stream_updated: Channel::new("stream_updated"),
            search_updated: Channel::new("search_updated"),
            injected: RwLock::new(None),
        }
    }

    /// Active session changed; `None` when nothing stream-backed is active
    pub fn session_changed(&self) -> &Channel<Option<S>> {
        &self.session_changed
    }

    pub fn session_opened(&self) -> &Channel<String> {
        &self.session_opened
    }

    pub fn session_closed(&self) -> &Channel<String> {
        &self.session_closed
    }

    pub fn title_injection(&self) -> &Channel<Option<ComponentDescriptor>> {
        &self.title_injection
    }

    pub fn stream_updated(&self) -> &Channel<RowsUpdate> {
        &self.stream_updated
    }

    /// Match count of a session's active search
    pub fn search_updated(&self) -> &Channel<RowsUpdate> {
        &self.search_updated
    }

    /// Replace the sidebar title injection.
    ///
    /// Skipped when nothing changes: both absent, or the same factory with the
    /// same number of inputs. Returns whether an emission happened.
    pub fn set_title_injection(&self, component: Option<ComponentDescriptor>) -> bool {
        {
            let mut injected = self.injected.write();
            let unchanged = match (&component, injected.as_ref()) {
                (None, None) => true,
                (Some(next), Some(current)) => next.is_equivalent(current),
                _ => false,
            };
            if unchanged {
                return false;
            }
            *injected = component.clone();
        }
        self.title_injection.emit(component);
        true
    }

    pub fn title_injection_current(&self) -> Option<ComponentDescriptor> {
        self.injected.read().clone()
    }
}

impl<S: 'static> Default for EventHub<S> {
    fn default() -> Self {
        Self::new()
    }
}
