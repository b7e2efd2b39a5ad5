//! Plugin capability surface
//!
//! Everything a plugin may touch, and nothing else. Plugins never see the
//! registry itself.

use logdeck_events::ComponentDescriptor;
use logdeck_storage::SettingsAccess;
use std::sync::Arc;

use crate::capabilities::{Notification, Popup};
use crate::error::SessionError;
use crate::registry::{Hub, SessionRegistry};
use crate::session::ViewKind;
use crate::transport::Transport;
use crate::Result;

pub struct PluginCapabilities {
    plugin_id: u32,
    registry: SessionRegistry,
}

impl PluginCapabilities {
    pub(crate) fn new(plugin_id: u32, registry: SessionRegistry) -> Self {
        tracing::debug!(plugin_id, "Plugin capabilities issued");
        Self {
            plugin_id,
            registry,
        }
    }

    pub fn plugin_id(&self) -> u32 {
        self.plugin_id
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        self.registry.transport()
    }

    pub fn settings(&self) -> Option<Arc<dyn SettingsAccess>> {
        self.registry.settings()
    }

    pub fn active_session_id(&self) -> Option<String> {
        self.registry.active_id()
    }

    /// Inject into the active session's view
    pub fn add_output_injection(
        &self,
        kind: ViewKind,
        component: ComponentDescriptor,
    ) -> Result<String> {
        let id = self
            .registry
            .active_id()
            .ok_or(SessionError::NoActiveSession)?;
        let session = self.registry.get_session_controller(&id)?;
        Ok(session.add_output_injection(kind, component))
    }

    pub fn remove_output_injection(&self, injection_id: &str, kind: ViewKind) -> Result<bool> {
        let id = self
            .registry
            .active_id()
            .ok_or(SessionError::NoActiveSession)?;
        let session = self.registry.get_session_controller(&id)?;
        Ok(session.remove_output_injection(injection_id, kind))
    }

    pub fn event_hub(&self) -> Arc<Hub> {
        Arc::clone(self.registry.hub())
    }

    pub fn add_popup(&self, popup: Popup) -> String {
        self.registry.capabilities().add_popup(popup)
    }

    pub fn remove_popup(&self, id: &str) -> bool {
        self.registry.capabilities().remove_popup(id)
    }

    pub fn set_title_injection(&self, component: Option<ComponentDescriptor>) -> bool {
        self.registry.hub().set_title_injection(component)
    }

    pub fn open_sidebar_app(&self, app_id: &str, tab_only: bool) {
        self.registry.bars().open_sidebar_app(app_id, tab_only);
    }

    pub fn open_toolbar_app(&self, app_id: &str, tab_only: bool) {
        self.registry.bars().open_toolbar_app(app_id, tab_only);
    }

    /// Tagged with this plugin and the active session
    pub fn add_notification(&self, mut notification: Notification) {
        notification.source = Some(format!("plugin:{}", self.plugin_id));
        if notification.session_id.is_none() {
            notification.session_id = self.registry.active_id();
        }
        self.registry.capabilities().notify(notification);
    }
}
