//! Tab Strip
//!
//! In-memory, ordered set of open tabs. Cloning shares the strip.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::TabError;
use crate::tab::{Tab, TabKind};
use crate::Result;

#[derive(Default)]
struct StripState {
    tabs: HashMap<String, Tab>,
    order: Vec<String>,
    active: Option<String>,
    layout_locked: bool,
}

#[derive(Clone, Default)]
pub struct TabStrip {
    state: Arc<RwLock<StripState>>,
}

impl TabStrip {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a background tab
    pub fn add(&self, id: &str, title: &str, kind: TabKind) -> Result<TabHandle> {
        {
            let mut state = self.state.write();
            if state.tabs.contains_key(id) {
                return Err(TabError::Duplicate(id.to_string()));
            }
            state.tabs.insert(
                id.to_string(),
                Tab::new(id.to_string(), title.to_string(), kind),
            );
            state.order.push(id.to_string());
        }

        tracing::debug!(tab_id = %id, title = %title, "Added tab");

        Ok(TabHandle {
            id: id.to_string(),
            strip: self.clone(),
        })
    }

    pub fn get(&self, id: &str) -> Result<Tab> {
        self.state
            .read()
            .tabs
            .get(id)
            .cloned()
            .ok_or_else(|| TabError::NotFound(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.state.read().tabs.contains_key(id)
    }

    /// Show `id`; the previously shown tab goes to the background
    pub fn set_active(&self, id: &str) -> Result<Tab> {
        let mut state = self.state.write();
        if !state.tabs.contains_key(id) {
            return Err(TabError::NotFound(id.to_string()));
        }

        if let Some(previous) = state.active.take() {
            if previous != id {
                if let Some(tab) = state.tabs.get_mut(&previous) {
                    tab.blur()?;
                }
            }
        }

        let tab = state
            .tabs
            .get_mut(id)
            .ok_or_else(|| TabError::NotFound(id.to_string()))?;
        tab.activate()?;
        let tab = tab.clone();
        state.active = Some(id.to_string());

        Ok(tab)
    }

    pub fn active_id(&self) -> Option<String> {
        self.state.read().active.clone()
    }

    /// Remove a tab. When it was the shown one, returns the neighbour that
    /// should be shown next (the tab now at its position, else the one before).
    pub fn remove(&self, id: &str) -> Result<Option<String>> {
        let mut state = self.state.write();
        let mut tab = state
            .tabs
            .remove(id)
            .ok_or_else(|| TabError::NotFound(id.to_string()))?;
        tab.close()?;

        let index = state.order.iter().position(|t| t == id).unwrap_or(0);
        state.order.retain(|t| t != id);

        let successor = if state.active.as_deref() == Some(id) {
            state.active = None;
            state
                .order
                .get(index)
                .or_else(|| state.order.last())
                .cloned()
        } else {
            None
        };

        tracing::debug!(tab_id = %id, successor = ?successor, "Removed tab");

        Ok(successor)
    }

    pub fn set_title(&self, id: &str, title: String) -> Result<Tab> {
        let mut state = self.state.write();
        let tab = state
            .tabs
            .get_mut(id)
            .ok_or_else(|| TabError::NotFound(id.to_string()))?;
        tab.set_title(title);
        Ok(tab.clone())
    }

    /// Reorder a tab; indexes past the end move it last
    pub fn move_tab(&self, id: &str, new_index: usize) -> Result<()> {
        let mut state = self.state.write();
        let current = state
            .order
            .iter()
            .position(|t| t == id)
            .ok_or_else(|| TabError::NotFound(id.to_string()))?;
        let moved = state.order.remove(current);
        let index = new_index.min(state.order.len());
        state.order.insert(index, moved);
        Ok(())
    }

    /// Lock or unlock the docking layout of the content area
    pub fn set_layout_locked(&self, locked: bool) {
        self.state.write().layout_locked = locked;
    }

    pub fn is_layout_locked(&self) -> bool {
        self.state.read().layout_locked
    }

    /// Tabs in display order
    pub fn tabs(&self) -> Vec<Tab> {
        let state = self.state.read();
        state
            .order
            .iter()
            .filter_map(|id| state.tabs.get(id).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state.read().tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().tabs.is_empty()
    }
}

/// A session's handle to its own tab
#[derive(Clone)]
pub struct TabHandle {
    id: String,
    strip: TabStrip,
}

impl TabHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current title, or `None` once the tab is gone
    pub fn title(&self) -> Option<String> {
        self.strip.get(&self.id).ok().map(|tab| tab.title)
    }

    pub fn set_title(&self, title: impl Into<String>) -> Result<()> {
        self.strip.set_title(&self.id, title.into()).map(|_| ())
    }

    pub fn is_active(&self) -> bool {
        self.strip.active_id().as_deref() == Some(self.id.as_str())
    }

    pub fn is_open(&self) -> bool {
        self.strip.contains(&self.id)
    }
}

impl std::fmt::Debug for TabHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TabHandle").field("id", &self.id).finish()
    }
}
