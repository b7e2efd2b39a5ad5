//! Tab State Machine
//!
//! ```text
//! Active ⇄ Background
//!    ↘       ↙
//!     Closed
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabState {
    /// Tab is the one shown in the strip
    Active,
    /// Tab is open but another one is shown
    Background,
    /// Tab was removed; terminal
    Closed,
}

impl TabState {
    pub fn can_transition_to(&self, target: TabState) -> bool {
        match (self, target) {
            (TabState::Active, TabState::Background) => true,
            (TabState::Background, TabState::Active) => true,
            (TabState::Active | TabState::Background, TabState::Closed) => true,
            (TabState::Closed, _) => false,
            // Same state is a no-op
            (a, b) => *a == b,
        }
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, TabState::Closed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TabState::Active => "active",
            TabState::Background => "background",
            TabState::Closed => "closed",
        }
    }
}

impl std::fmt::Display for TabState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TabState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(TabState::Active),
            "background" => Ok(TabState::Background),
            "closed" => Ok(TabState::Closed),
            _ => Err(format!("Unknown tab state: {}", s)),
        }
    }
}
