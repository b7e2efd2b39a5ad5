//! Tab data structure

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TabError;
use crate::state::TabState;
use crate::Result;

/// What a tab hosts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabKind {
    /// Analysis session bound to a backend stream
    Stream,
    /// Page without a stream, e.g. settings
    Custom,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tab {
    /// Same id as the session or custom page it hosts
    pub id: String,
    pub title: String,
    pub kind: TabKind,
    pub state: TabState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}

impl Tab {
    pub fn new(id: String, title: String, kind: TabKind) -> Self {
        let now = Utc::now();

        Self {
            id,
            title,
            kind,
            state: TabState::Background,
            created_at: now,
            updated_at: now,
            last_accessed_at: now,
        }
    }

    /// Attempt to transition to a new state
    pub fn transition_to(&mut self, new_state: TabState) -> Result<()> {
        if !self.state.can_transition_to(new_state) {
            return Err(TabError::InvalidTransition {
                from: self.state.to_string(),
                to: new_state.to_string(),
            });
        }

        tracing::trace!(
            tab_id = %self.id,
            from = %self.state,
            to = %new_state,
            "Tab state transition"
        );

        self.state = new_state;
        self.updated_at = Utc::now();

        if new_state == TabState::Active {
            self.last_accessed_at = self.updated_at;
        }

        Ok(())
    }

    pub fn activate(&mut self) -> Result<()> {
        self.transition_to(TabState::Active)
    }

    pub fn blur(&mut self) -> Result<()> {
        if self.state == TabState::Active {
            self.transition_to(TabState::Background)
        } else {
            Ok(())
        }
    }

    pub fn close(&mut self) -> Result<()> {
        self.transition_to(TabState::Closed)
    }

    pub fn set_title(&mut self, title: String) {
        self.title = title;
        self.updated_at = Utc::now();
    }

    /// Title with a fallback to the id
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            &self.id
        } else {
            &self.title
        }
    }
}
