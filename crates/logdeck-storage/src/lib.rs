//! Logdeck Storage Layer
//!
//! One validated keyed store, parameterized over where the bytes live:
//! - [`FileBackend`] for durable application and window settings
//! - [`MemoryBackend`] for per-session scratch state that never leaves the process
//!
//! Every store is created with a frozen defaults shape. Reads back-fill missing
//! fields and reset fields that no longer fit their type; writes deep-merge and are
//! serialized per backing location.

mod backend;
mod error;
mod queue;
mod scratch;
mod shape;
mod store;

pub use backend::{FileBackend, MemoryBackend, MemoryStorage, StorageBackend};
pub use error::StorageError;
pub use scratch::ScratchStore;
pub use shape::{deep_merge, heal, heal_typed, Kind};
pub use store::{KeyedStore, SettingsAccess, StoreOptions, StorePhase};

pub type Result<T> = std::result::Result<T, StorageError>;
