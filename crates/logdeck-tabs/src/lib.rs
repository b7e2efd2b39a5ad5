//! Logdeck Tab Strip
//!
//! The visual tab layer the session registry drives: one tab per session or
//! custom page, exactly one of them shown as active, plus the layout lock that
//! custom pages put on the docking area.

mod error;
mod state;
mod strip;
mod tab;

pub use error::TabError;
pub use state::TabState;
pub use strip::{TabHandle, TabStrip};
pub use tab::{Tab, TabKind};

pub type Result<T> = std::result::Result<T, TabError>;
