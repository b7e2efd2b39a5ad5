//! Registry entries: stream-backed sessions and custom pages

use logdeck_events::ComponentDescriptor;
use logdeck_tabs::TabHandle;
use std::sync::Arc;
use uuid::Uuid;

use crate::deferred::Deferred;
use crate::session::Session;

/// A tab without a backend stream, e.g. the settings page
pub struct CustomTab {
    id: String,
    title: String,
    component: ComponentDescriptor,
    tab: Deferred<TabHandle>,
}

impl CustomTab {
    pub fn new(title: impl Into<String>, component: ComponentDescriptor) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), title, component)
    }

    pub fn with_id(
        id: impl Into<String>,
        title: impl Into<String>,
        component: ComponentDescriptor,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            component,
            tab: Deferred::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn component(&self) -> &ComponentDescriptor {
        &self.component
    }

    pub fn tab(&self) -> Option<&TabHandle> {
        self.tab.get()
    }

    pub(crate) fn bind_tab(&mut self, tab: Deferred<TabHandle>) {
        self.tab = tab;
    }
}

impl std::fmt::Debug for CustomTab {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomTab")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("factory", &self.component.factory)
            .finish()
    }
}

#[derive(Clone, Debug)]
pub enum Entry {
    Session(Arc<Session>),
    Custom(Arc<CustomTab>),
}

impl Entry {
    pub fn id(&self) -> &str {
        match self {
            Entry::Session(session) => session.id(),
            Entry::Custom(custom) => custom.id(),
        }
    }

    pub fn as_session(&self) -> Option<&Arc<Session>> {
        match self {
            Entry::Session(session) => Some(session),
            Entry::Custom(_) => None,
        }
    }

    pub fn is_session(&self) -> bool {
        matches!(self, Entry::Session(_))
    }

    pub fn tab(&self) -> Option<&TabHandle> {
        match self {
            Entry::Session(session) => session.tab(),
            Entry::Custom(custom) => custom.tab(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_tab_ids() {
        let a = CustomTab::new("Settings", ComponentDescriptor::new("SettingsPage"));
        let b = CustomTab::new("Settings", ComponentDescriptor::new("SettingsPage"));
        assert_ne!(a.id(), b.id());

        let fixed = CustomTab::with_id("settings", "Settings", ComponentDescriptor::new("SettingsPage"));
        let entry = Entry::Custom(Arc::new(fixed));
        assert_eq!(entry.id(), "settings");
        assert!(!entry.is_session());
        assert!(entry.as_session().is_none());
        assert!(entry.tab().is_none());
    }
}
