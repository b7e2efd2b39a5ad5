//! Owner-scoped scratch store
//!
//! Keeps UI state such as "files queued for merge" per `(owner, key)` for as
//! long as the owner lives. Panels save right before their tab goes away and
//! restore with [`ScratchStore::apply_state_to`] when they mount again.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::backend::{MemoryBackend, MemoryStorage};
use crate::shape::deep_merge;
use crate::store::{KeyedStore, StoreOptions};
use crate::Result;

#[derive(Clone)]
pub struct ScratchStore {
    owner: String,
    storage: MemoryStorage,
}

impl ScratchStore {
    pub fn new(owner: impl Into<String>, storage: MemoryStorage) -> Self {
        Self {
            owner: owner.into(),
            storage,
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    fn location(&self, key: &str) -> String {
        format!("{}/{}", self.owner, key)
    }

    /// Store `value` under `key`, replacing whatever was there
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let content = serde_json::to_string(value)?;
        self.storage.insert(self.location(key), content);
        Ok(())
    }

    /// Typed read. A stored value of a different shape reads as absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let content = self.storage.get(&self.location(key))?;
        match serde_json::from_str(&content) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(owner = %self.owner, key, error = %e, "Scratch entry has another shape");
                None
            }
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.storage.get(&self.location(key)).is_some()
    }

    pub fn drop(&self, key: &str) -> bool {
        self.storage.remove(&self.location(key))
    }

    /// Copy the stored fields of `key` onto `target`.
    ///
    /// Fields the entry does not carry keep their live values. Returns false
    /// when there is no entry or it cannot be applied to `T`.
    pub fn apply_state_to<T>(&self, key: &str, target: &mut T) -> bool
    where
        T: Serialize + DeserializeOwned,
    {
        let Some(content) = self.storage.get(&self.location(key)) else {
            return false;
        };

        let applied = serde_json::from_str::<Value>(&content).and_then(|stored| {
            let mut live = serde_json::to_value(&*target)?;
            deep_merge(&mut live, &stored);
            serde_json::from_value::<T>(live)
        });

        match applied {
            Ok(value) => {
                *target = value;
                true
            }
            Err(e) => {
                tracing::warn!(owner = %self.owner, key, error = %e, "Fail to restore scratch state");
                false
            }
        }
    }

    /// Validated store for one feature key, sharing this owner's memory
    pub fn keyed(&self, key: &str, defaults: Value) -> Result<KeyedStore<MemoryBackend>> {
        KeyedStore::new(
            self.storage.backend(self.location(key)),
            defaults,
            StoreOptions::default(),
        )
    }

    /// Forget every entry of this owner
    pub fn clear(&self) -> usize {
        self.storage.remove_prefix(&format!("{}/", self.owner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
    struct MergeQueue {
        files: Vec<String>,
        tolerant: bool,
    }

    #[test]
    fn test_set_get_drop() {
        let scratch = ScratchStore::new("session-1", MemoryStorage::new());
        let queue = MergeQueue {
            files: vec!["a.log".into(), "b.log".into()],
            tolerant: true,
        };

        scratch.set("merge", &queue).unwrap();
        assert_eq!(scratch.get::<MergeQueue>("merge"), Some(queue));
        assert_eq!(scratch.get::<u32>("merge"), None);

        assert!(scratch.drop("merge"));
        assert!(!scratch.drop("merge"));
        assert_eq!(scratch.get::<MergeQueue>("merge"), None);
    }

    #[test]
    fn test_owners_are_isolated() {
        let storage = MemoryStorage::new();
        let s1 = ScratchStore::new("s1", storage.clone());
        let s2 = ScratchStore::new("s2", storage.clone());

        s1.set("filters", &json!(["error"])).unwrap();
        assert!(s1.has("filters"));
        assert!(!s2.has("filters"));

        s2.set("filters", &json!(["warn"])).unwrap();
        assert_eq!(s1.clear(), 1);
        assert!(s2.has("filters"));
    }

    #[test]
    fn test_apply_state_to() {
        let scratch = ScratchStore::new("s1", MemoryStorage::new());
        let mut panel = MergeQueue::default();
        assert!(!scratch.apply_state_to("merge", &mut panel));

        scratch
            .set("merge", &json!({ "files": ["x.log"] }))
            .unwrap();
        panel.tolerant = true;
        assert!(scratch.apply_state_to("merge", &mut panel));
        assert_eq!(
            panel,
            MergeQueue {
                files: vec!["x.log".into()],
                tolerant: true,
            }
        );
    }

    #[test]
    fn test_apply_state_to_rejects_wrong_shape() {
        let scratch = ScratchStore::new("s1", MemoryStorage::new());
        scratch.set("merge", &json!({ "files": 42 })).unwrap();

        let mut panel = MergeQueue::default();
        assert!(!scratch.apply_state_to("merge", &mut panel));
        assert_eq!(panel, MergeQueue::default());
    }

    #[tokio::test]
    async fn test_keyed_feature_store() {
        let scratch = ScratchStore::new("s1", MemoryStorage::new());
        let store = scratch
            .keyed("timestamps", json!({ "format": "hh:mm:ss", "ranges": [] }))
            .unwrap();
        store.init().await.unwrap();
        store.set(json!({ "format": "iso" })).await.unwrap();

        assert!(scratch.has("timestamps"));
        assert_eq!(scratch.get::<Value>("timestamps").unwrap()["format"], "iso");
    }
}
