//! Fill-once slot for values that exist only after their consumer
//!
//! A tab's content needs a handle to its own tab before the tab is built:
//! allocate the cell, hand the reader out, fill the cell once the tab exists.

use std::sync::{Arc, OnceLock};

pub struct DeferredCell<T> {
    slot: Arc<OnceLock<T>>,
}

impl<T> DeferredCell<T> {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(OnceLock::new()),
        }
    }

    pub fn reader(&self) -> Deferred<T> {
        Deferred {
            slot: Arc::clone(&self.slot),
        }
    }

    /// Fill the slot. A second fill hands the value back untouched.
    pub fn fill(&self, value: T) -> Result<(), T> {
        self.slot.set(value)
    }

    pub fn is_filled(&self) -> bool {
        self.slot.get().is_some()
    }
}

impl<T> Default for DeferredCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Read side of a [`DeferredCell`]
pub struct Deferred<T> {
    slot: Arc<OnceLock<T>>,
}

impl<T> Deferred<T> {
    /// `None` until the cell is filled
    pub fn get(&self) -> Option<&T> {
        self.slot.get()
    }

    pub fn is_resolved(&self) -> bool {
        self.slot.get().is_some()
    }
}

/// A reader no cell will ever fill
impl<T> Default for Deferred<T> {
    fn default() -> Self {
        Self {
            slot: Arc::new(OnceLock::new()),
        }
    }
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}
