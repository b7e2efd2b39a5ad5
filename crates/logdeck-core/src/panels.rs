//! Sidebar and toolbar apps per session
//!
//! Binds itself into the capability slots at startup, so the session layer can
//! open panel apps without knowing this module exists. Follows the active
//! session through the event hub.

use logdeck_events::Subscription;
use logdeck_session::{CapabilityRegistry, Hub};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bar {
    Sidebar,
    Toolbar,
}

/// Apps open in one bar of one session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarState {
    /// Tab order
    pub apps: Vec<String>,
    pub selected: Option<String>,
}

#[derive(Default)]
struct PanelState {
    active: Option<String>,
    bars: HashMap<(String, Bar), BarState>,
}

impl PanelState {
    fn open(&mut self, bar: Bar, app_id: &str, tab_only: bool) {
        let Some(session_id) = self.active.clone() else {
            tracing::debug!(app_id, ?bar, "No active session, panel app not opened");
            return;
        };

        let state = self.bars.entry((session_id.clone(), bar)).or_default();
        if !state.apps.iter().any(|app| app == app_id) {
            state.apps.push(app_id.to_string());
        }
        if !tab_only {
            state.selected = Some(app_id.to_string());
        }

        tracing::debug!(session_id = %session_id, app_id, ?bar, tab_only, "Panel app opened");
    }
}

pub struct PanelApps {
    state: Arc<RwLock<PanelState>>,
    _subscriptions: Vec<Subscription>,
}

impl PanelApps {
    /// Bind the sidebar and toolbar openers and start following the hub
    pub fn attach(hub: &Hub, capabilities: &CapabilityRegistry) -> Result<Self> {
        let state = Arc::new(RwLock::new(PanelState::default()));

        let changed = {
            let state = Arc::clone(&state);
            hub.session_changed().subscribe(move |session| {
                state.write().active = session.as_ref().map(|s| s.id().to_string());
            })
        };
        let closed = {
            let state = Arc::clone(&state);
            hub.session_closed().subscribe(move |id| {
                let mut state = state.write();
                state.bars.retain(|(session_id, _), _| session_id != id);
                if state.active.as_deref() == Some(id.as_str()) {
                    state.active = None;
                }
            })
        };

        {
            let state = Arc::clone(&state);
            capabilities.bind_sidebar_opener(move |app_id, tab_only| {
                state.write().open(Bar::Sidebar, app_id, tab_only)
            })?;
        }
        {
            let state = Arc::clone(&state);
            capabilities.bind_toolbar_opener(move |app_id, tab_only| {
                state.write().open(Bar::Toolbar, app_id, tab_only)
            })?;
        }

        Ok(Self {
            state,
            _subscriptions: vec![changed, closed],
        })
    }

    /// Session the next opened app goes to
    pub fn active_session(&self) -> Option<String> {
        self.state.read().active.clone()
    }

    pub fn bar(&self, session_id: &str, bar: Bar) -> BarState {
        self.state
            .read()
            .bars
            .get(&(session_id.to_string(), bar))
            .cloned()
            .unwrap_or_default()
    }

    pub fn close_app(&self, session_id: &str, bar: Bar, app_id: &str) -> bool {
        let mut state = self.state.write();
        let Some(bar_state) = state.bars.get_mut(&(session_id.to_string(), bar)) else {
            return false;
        };
        let before = bar_state.apps.len();
        bar_state.apps.retain(|app| app != app_id);
        if bar_state.selected.as_deref() == Some(app_id) {
            bar_state.selected = bar_state.apps.last().cloned();
        }
        before != bar_state.apps.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_follows_active_session() {
        let mut state = PanelState::default();
        state.open(Bar::Sidebar, "search", false);
        assert!(state.bars.is_empty());

        state.active = Some("s1".into());
        state.open(Bar::Sidebar, "search", false);
        state.open(Bar::Sidebar, "merge", true);
        state.open(Bar::Sidebar, "search", false);

        let sidebar = &state.bars[&("s1".to_string(), Bar::Sidebar)];
        assert_eq!(sidebar.apps, vec!["search", "merge"]);
        assert_eq!(sidebar.selected.as_deref(), Some("search"));
    }

    #[test]
    fn test_attach_binds_both_bars_once() {
        let hub = Hub::new();
        let capabilities = CapabilityRegistry::new();
        let _apps = PanelApps::attach(&hub, &capabilities).unwrap();

        assert!(capabilities.is_sidebar_bound());
        assert!(capabilities.is_toolbar_bound());
        assert!(PanelApps::attach(&hub, &capabilities).is_err());
    }

    #[test]
    fn test_close_session_forgets_its_bars() {
        let hub = Hub::new();
        let capabilities = CapabilityRegistry::new();
        let apps = PanelApps::attach(&hub, &capabilities).unwrap();
        apps.state.write().active = Some("s1".into());

        capabilities.open_toolbar_app("charts", false);
        capabilities.open_toolbar_app("details", true);
        assert_eq!(apps.bar("s1", Bar::Toolbar).apps.len(), 2);

        assert!(apps.close_app("s1", Bar::Toolbar, "charts"));
        assert_eq!(apps.bar("s1", Bar::Toolbar).selected.as_deref(), Some("details"));

        hub.session_closed().emit("s1".into());
        assert_eq!(apps.bar("s1", Bar::Toolbar), BarState::default());
        assert_eq!(apps.active_session(), None);
    }
}
