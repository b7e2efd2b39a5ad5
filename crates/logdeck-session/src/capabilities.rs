//! Capability Registry
//!
//! The session layer calls into the sidebar, the toolbar and the notification
//! area without depending on them. Each of those binds its opener into a slot
//! once at startup. Until then every call through the slot does nothing.

use chrono::{DateTime, Utc};
use logdeck_events::ComponentDescriptor;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use uuid::Uuid;

use crate::error::CapabilityError;

/// `(app id, tab only)`
pub type PanelOpener = Arc<dyn Fn(&str, bool) + Send + Sync>;
pub type NotificationOpener = Arc<dyn Fn(Notification) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub caption: String,
    pub message: String,
    pub level: NotificationLevel,
    /// Who raised it, e.g. `plugin:3`
    pub source: Option<String>,
    pub session_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(level: NotificationLevel, caption: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            caption: caption.into(),
            message: message.into(),
            level,
            source: None,
            session_id: None,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Popup {
    pub id: String,
    pub caption: String,
    pub component: ComponentDescriptor,
    pub closable: bool,
}

impl Popup {
    pub fn new(caption: impl Into<String>, component: ComponentDescriptor) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            caption: caption.into(),
            component,
            closable: true,
        }
    }
}

struct Slot<F> {
    name: &'static str,
    cell: OnceLock<F>,
}

impl<F: Clone> Slot<F> {
    const fn new(name: &'static str) -> Self {
        Self {
            name,
            cell: OnceLock::new(),
        }
    }

    fn bind(&self, opener: F) -> Result<(), CapabilityError> {
        self.cell
            .set(opener)
            .map_err(|_| CapabilityError::AlreadyBound(self.name))?;
        tracing::debug!(slot = self.name, "Capability bound");
        Ok(())
    }

    fn get(&self) -> Option<F> {
        self.cell.get().cloned()
    }

    fn is_bound(&self) -> bool {
        self.cell.get().is_some()
    }
}

pub struct CapabilityRegistry {
    sidebar: Slot<PanelOpener>,
    toolbar: Slot<PanelOpener>,
    notification: Slot<NotificationOpener>,
    popups: RwLock<Vec<Popup>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self {
            sidebar: Slot::new("sidebar"),
            toolbar: Slot::new("toolbar"),
            notification: Slot::new("notification"),
            popups: RwLock::new(Vec::new()),
        }
    }

    pub fn bind_sidebar_opener<F>(&self, opener: F) -> Result<(), CapabilityError>
    where
        F: Fn(&str, bool) + Send + Sync + 'static,
    {
        self.sidebar.bind(Arc::new(opener))
    }

    pub fn bind_toolbar_opener<F>(&self, opener: F) -> Result<(), CapabilityError>
    where
        F: Fn(&str, bool) + Send + Sync + 'static,
    {
        self.toolbar.bind(Arc::new(opener))
    }

    pub fn bind_notification_opener<F>(&self, opener: F) -> Result<(), CapabilityError>
    where
        F: Fn(Notification) + Send + Sync + 'static,
    {
        self.notification.bind(Arc::new(opener))
    }

    pub fn open_sidebar_app(&self, app_id: &str, tab_only: bool) {
        if let Some(opener) = self.sidebar.get() {
            opener(app_id, tab_only);
        }
    }

    pub fn open_toolbar_app(&self, app_id: &str, tab_only: bool) {
        if let Some(opener) = self.toolbar.get() {
            opener(app_id, tab_only);
        }
    }

    pub fn notify(&self, notification: Notification) {
        if let Some(opener) = self.notification.get() {
            opener(notification);
        }
    }

    pub fn is_sidebar_bound(&self) -> bool {
        self.sidebar.is_bound()
    }

    pub fn is_toolbar_bound(&self) -> bool {
        self.toolbar.is_bound()
    }

    pub fn is_notification_bound(&self) -> bool {
        self.notification.is_bound()
    }

    pub fn add_popup(&self, popup: Popup) -> String {
        let id = popup.id.clone();
        tracing::debug!(popup_id = %id, caption = %popup.caption, "Popup added");
        self.popups.write().push(popup);
        id
    }

    pub fn remove_popup(&self, id: &str) -> bool {
        let mut popups = self.popups.write();
        let before = popups.len();
        popups.retain(|popup| popup.id != id);
        before != popups.len()
    }

    /// Open popups, oldest first
    pub fn popups(&self) -> Vec<Popup> {
        self.popups.read().clone()
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Sidebar and toolbar openers as seen by the session layer
#[derive(Clone)]
pub struct Bars {
    capabilities: Arc<CapabilityRegistry>,
}

impl Bars {
    pub(crate) fn new(capabilities: Arc<CapabilityRegistry>) -> Self {
        Self { capabilities }
    }

    pub fn open_sidebar_app(&self, app_id: &str, tab_only: bool) {
        self.capabilities.open_sidebar_app(app_id, tab_only);
    }

    pub fn open_toolbar_app(&self, app_id: &str, tab_only: bool) {
        self.capabilities.open_toolbar_app(app_id, tab_only);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_unbound_slots_are_noops() {
        let capabilities = CapabilityRegistry::new();
        capabilities.open_sidebar_app("search", false);
        capabilities.open_toolbar_app("charts", true);
        capabilities.notify(Notification::new(NotificationLevel::Info, "x", "y"));
        assert!(!capabilities.is_sidebar_bound());
    }

    #[test]
    fn test_bound_slot_forwards() {
        let capabilities = Arc::new(CapabilityRegistry::new());
        let opened = Arc::new(Mutex::new(Vec::new()));
        {
            let opened = Arc::clone(&opened);
            capabilities
                .bind_sidebar_opener(move |app, tab_only| {
                    opened.lock().push((app.to_string(), tab_only))
                })
                .unwrap();
        }

        let bars = Bars::new(Arc::clone(&capabilities));
        bars.open_sidebar_app("merging", true);
        // Toolbar still unbound
        bars.open_toolbar_app("charts", false);

        assert_eq!(*opened.lock(), vec![("merging".to_string(), true)]);
    }

    #[test]
    fn test_rebind_is_rejected() {
        let capabilities = CapabilityRegistry::new();
        capabilities.bind_toolbar_opener(|_, _| {}).unwrap();
        assert_eq!(
            capabilities.bind_toolbar_opener(|_, _| {}),
            Err(CapabilityError::AlreadyBound("toolbar"))
        );
    }

    #[test]
    fn test_popups() {
        let capabilities = CapabilityRegistry::new();
        let id = capabilities.add_popup(Popup::new(
            "Export",
            ComponentDescriptor::new("ExportDialog"),
        ));
        assert_eq!(capabilities.popups().len(), 1);
        assert!(capabilities.remove_popup(&id));
        assert!(!capabilities.remove_popup(&id));
    }
}
