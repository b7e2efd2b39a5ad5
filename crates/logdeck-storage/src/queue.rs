//! Per-location write queue
//!
//! Writes to one location run one at a time in arrival order (tokio's mutex is
//! FIFO). Different locations never wait on each other. Exclusive locations are
//! claimed process-wide so two stores cannot target the same file.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::OnceLock;
use tokio::sync::MutexGuard;

use crate::error::StorageError;
use crate::Result;

static CLAIMED: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();

fn claimed() -> &'static Mutex<HashSet<String>> {
    CLAIMED.get_or_init(|| Mutex::new(HashSet::new()))
}

pub(crate) struct WriteQueue {
    location: String,
    exclusive: bool,
    lock: tokio::sync::Mutex<()>,
}

impl WriteQueue {
    pub(crate) fn new(location: &str, exclusive: bool) -> Result<Self> {
        if exclusive && !claimed().lock().insert(location.to_string()) {
            return Err(StorageError::PathInUse(location.to_string()));
        }

        Ok(Self {
            location: location.to_string(),
            exclusive,
            lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Wait for the writes queued before us, then hold the slot
    pub(crate) async fn acquire(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().await
    }
}

impl Drop for WriteQueue {
    fn drop(&mut self) {
        if self.exclusive {
            claimed().lock().remove(&self.location);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exclusive_claim() {
        let location = "/tmp/logdeck-queue-test/claim.json";
        let first = WriteQueue::new(location, true).unwrap();
        assert!(matches!(
            WriteQueue::new(location, true),
            Err(StorageError::PathInUse(_))
        ));

        drop(first);
        assert!(WriteQueue::new(location, true).is_ok());
    }

    #[test]
    fn test_shared_locations_are_not_claimed() {
        let _a = WriteQueue::new("memory/a", false).unwrap();
        let _b = WriteQueue::new("memory/a", false).unwrap();
    }
}
