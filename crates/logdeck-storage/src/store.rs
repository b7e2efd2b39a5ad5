//! Validated keyed store
//!
//! Lifecycle per instance:
//! ```text
//! Uninitialized
//!   ↓ init (no document yet: write defaults)
//! Defaulted
//!   ↓ read + validate
//! Loaded
//!   ↓ state installed
//! Ready
//!   ↓ destroy (drains queued writes)
//! Destroyed
//! ```

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::backend::StorageBackend;
use crate::error::StorageError;
use crate::queue::WriteQueue;
use crate::shape::{deep_merge, heal, heal_typed};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorePhase {
    Uninitialized,
    Defaulted,
    Loaded,
    Ready,
    Destroyed,
}

#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    /// Overwrite an unparsable document with the defaults instead of failing init
    pub reset_on_corruption: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            reset_on_corruption: true,
        }
    }
}

/// Whether a whole document is acceptable as the store's Rust type
type DocumentCheck = fn(&Value) -> bool;

struct StoreState {
    phase: StorePhase,
    current: Option<Value>,
}

pub struct KeyedStore<B: StorageBackend> {
    backend: B,
    defaults: Value,
    options: StoreOptions,
    check: Option<DocumentCheck>,
    state: RwLock<StoreState>,
    queue: WriteQueue,
}

impl<B: StorageBackend> KeyedStore<B> {
    pub fn new(backend: B, defaults: Value, options: StoreOptions) -> Result<Self> {
        if !defaults.is_object() {
            return Err(StorageError::InvalidDefaults);
        }
        let queue = WriteQueue::new(backend.location(), backend.exclusive())?;

        Ok(Self {
            backend,
            defaults,
            options,
            check: None,
            state: RwLock::new(StoreState {
                phase: StorePhase::Uninitialized,
                current: None,
            }),
            queue,
        })
    }

    /// Build the defaults shape from a typed value (usually `T::default()`).
    ///
    /// Fields are then validated against `T` itself, so optional fields keep
    /// values of their inner type and numbers must fit the field.
    pub fn with_defaults<T>(backend: B, defaults: &T, options: StoreOptions) -> Result<Self>
    where
        T: Serialize + DeserializeOwned,
    {
        let mut store = Self::new(backend, serde_json::to_value(defaults)?, options)?;
        store.check = Some(accepts::<T>);
        Ok(store)
    }

    pub fn phase(&self) -> StorePhase {
        self.state.read().phase
    }

    pub fn location(&self) -> &str {
        self.backend.location()
    }

    pub fn defaults(&self) -> Value {
        self.defaults.clone()
    }

    /// Load the document, creating it from the defaults when absent
    pub async fn init(&self) -> Result<Value> {
        if self.phase() == StorePhase::Destroyed {
            return Err(StorageError::Destroyed(self.location().to_string()));
        }

        if !self.backend.exists().await? {
            let _slot = self.queue.acquire().await;
            self.backend.write(&self.serialize(&self.defaults)?).await?;
            self.state.write().phase = StorePhase::Defaulted;
            tracing::debug!(location = %self.location(), "Wrote defaults for new store");
        }

        let content = self.backend.read().await?;
        let value = self.validate(&content).await?;

        {
            let mut state = self.state.write();
            state.phase = StorePhase::Loaded;
            state.current = Some(value.clone());
            state.phase = StorePhase::Ready;
        }

        tracing::debug!(location = %self.location(), "Store ready");

        Ok(value)
    }

    async fn validate(&self, content: &str) -> Result<Value> {
        let reason = match serde_json::from_str::<Value>(content) {
            Ok(mut value) if value.is_object() => {
                let repaired = self.repair(&mut value);
                if repaired > 0 {
                    tracing::debug!(
                        location = %self.location(),
                        repaired,
                        "Repaired fields against defaults"
                    );
                }
                return Ok(value);
            }
            Ok(_) => "document is not a JSON object".to_string(),
            Err(e) => e.to_string(),
        };

        if !self.options.reset_on_corruption {
            return Err(StorageError::Corrupted {
                location: self.location().to_string(),
                reason,
            });
        }

        tracing::warn!(
            location = %self.location(),
            reason = %reason,
            "Store document corrupted, resetting to defaults"
        );
        let _slot = self.queue.acquire().await;
        self.backend.write(&self.serialize(&self.defaults)?).await?;
        Ok(self.defaults.clone())
    }

    /// Deep copy of the current state, or of the defaults if nothing is loaded
    pub fn get(&self) -> Value {
        self.state
            .read()
            .current
            .clone()
            .unwrap_or_else(|| self.defaults.clone())
    }

    pub fn get_as<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.get())?)
    }

    /// Merge `partial` over the current state and persist the result.
    ///
    /// The in-memory state is updated before the write. A failed write is
    /// returned to the caller but not rolled back; the next successful write
    /// persists the latest state and reconciles the document.
    pub async fn set(&self, partial: Value) -> Result<Value> {
        {
            let mut state = self.state.write();
            match state.phase {
                StorePhase::Destroyed => {
                    return Err(StorageError::Destroyed(self.location().to_string()))
                }
                StorePhase::Uninitialized => {
                    return Err(StorageError::NotInitialized(self.location().to_string()))
                }
                _ => {}
            }
            let current = state
                .current
                .get_or_insert_with(|| self.defaults.clone());
            deep_merge(current, &partial);
            let repaired = self.repair(current);
            if repaired > 0 {
                tracing::debug!(location = %self.location(), repaired, "Rejected patched fields");
            }
        }

        self.flush().await?;
        Ok(self.get())
    }

    pub async fn set_as<T: Serialize>(&self, value: &T) -> Result<Value> {
        self.set(serde_json::to_value(value)?).await
    }

    /// Replace the whole state with the defaults
    pub async fn reset(&self) -> Result<Value> {
        {
            let mut state = self.state.write();
            if state.phase == StorePhase::Destroyed {
                return Err(StorageError::Destroyed(self.location().to_string()));
            }
            state.current = Some(self.defaults.clone());
        }
        self.flush().await?;
        Ok(self.get())
    }

    /// Write the latest state once every earlier write for this location is done
    async fn flush(&self) -> Result<()> {
        let _slot = self.queue.acquire().await;
        let content = self.serialize(&self.get())?;
        if let Err(e) = self.backend.write(&content).await {
            tracing::warn!(location = %self.location(), error = %e, "Failed to persist store");
            return Err(e);
        }
        Ok(())
    }

    /// Reject further writes and wait for the queued ones to land
    pub async fn destroy(&self) {
        self.state.write().phase = StorePhase::Destroyed;
        let _slot = self.queue.acquire().await;
        tracing::debug!(location = %self.location(), "Store destroyed");
    }

    fn repair(&self, value: &mut Value) -> usize {
        match self.check {
            Some(check) => heal_typed(value, &self.defaults, check),
            None => heal(value, &self.defaults),
        }
    }

    fn serialize(&self, value: &Value) -> Result<String> {
        Ok(serde_json::to_string_pretty(value)?)
    }
}

fn accepts<T: DeserializeOwned>(document: &Value) -> bool {
    T::deserialize(document).is_ok()
}

/// Object-safe view of a store, handed to code that should read and patch
/// settings without knowing where they live.
#[async_trait]
pub trait SettingsAccess: Send + Sync {
    fn snapshot(&self) -> Value;

    async fn update(&self, partial: Value) -> Result<Value>;
}

#[async_trait]
impl<B: StorageBackend> SettingsAccess for KeyedStore<B> {
    fn snapshot(&self) -> Value {
        self.get()
    }

    async fn update(&self, partial: Value) -> Result<Value> {
        self.set(partial).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{FileBackend, MemoryStorage};
    use serde_json::json;
    use std::sync::Arc;

    fn defaults() -> Value {
        json!({ "a": 1, "b": "x" })
    }

    #[tokio::test]
    async fn test_init_writes_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = KeyedStore::new(FileBackend::new(&path), defaults(), StoreOptions::default())
            .unwrap();

        assert_eq!(store.phase(), StorePhase::Uninitialized);
        assert_eq!(store.init().await.unwrap(), defaults());
        assert_eq!(store.phase(), StorePhase::Ready);

        let on_disk: Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk, defaults());
    }

    #[tokio::test]
    async fn test_get_returns_deep_copies() {
        let storage = MemoryStorage::new();
        let store =
            KeyedStore::new(storage.backend("app"), defaults(), StoreOptions::default()).unwrap();
        store.init().await.unwrap();

        let mut first = store.get();
        first["a"] = json!(99);
        first["b"] = json!("mutated");

        assert_eq!(store.get(), defaults());
    }

    #[tokio::test]
    async fn test_get_before_init_returns_defaults() {
        let storage = MemoryStorage::new();
        let store =
            KeyedStore::new(storage.backend("app"), defaults(), StoreOptions::default()).unwrap();
        assert_eq!(store.get(), defaults());
        assert!(matches!(
            store.set(json!({ "a": 2 })).await,
            Err(StorageError::NotInitialized(_))
        ));
    }

    #[tokio::test]
    async fn test_merge_round_trip() {
        let storage = MemoryStorage::new();
        let store =
            KeyedStore::new(storage.backend("app"), defaults(), StoreOptions::default()).unwrap();
        store.init().await.unwrap();

        store.set(json!({ "b": "y" })).await.unwrap();
        assert_eq!(store.get(), json!({ "a": 1, "b": "y" }));

        let persisted: Value = serde_json::from_str(&storage.get("app").unwrap()).unwrap();
        assert_eq!(persisted, json!({ "a": 1, "b": "y" }));
    }

    #[tokio::test]
    async fn test_typed_self_heal_on_init() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"a":"oops"}"#).unwrap();

        let store = KeyedStore::new(FileBackend::new(&path), defaults(), StoreOptions::default())
            .unwrap();
        store.init().await.unwrap();

        assert_eq!(store.get(), json!({ "a": 1, "b": "x" }));
    }

    #[tokio::test]
    async fn test_unknown_keys_survive() {
        let storage = MemoryStorage::new();
        storage.insert("app", r#"{"a":5,"b":"z","legacy":[1]}"#);
        let store =
            KeyedStore::new(storage.backend("app"), defaults(), StoreOptions::default()).unwrap();

        assert_eq!(
            store.init().await.unwrap(),
            json!({ "a": 5, "b": "z", "legacy": [1] })
        );
    }

    #[tokio::test]
    async fn test_corruption_resets_when_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = KeyedStore::new(FileBackend::new(&path), defaults(), StoreOptions::default())
            .unwrap();
        assert_eq!(store.init().await.unwrap(), defaults());

        let on_disk: Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk, defaults());
    }

    #[tokio::test]
    async fn test_corruption_fails_when_disallowed() {
        let storage = MemoryStorage::new();
        storage.insert("window", "[1, 2, 3]");
        let store = KeyedStore::new(
            storage.backend("window"),
            defaults(),
            StoreOptions {
                reset_on_corruption: false,
            },
        )
        .unwrap();

        assert!(matches!(
            store.init().await,
            Err(StorageError::Corrupted { .. })
        ));
        // Left untouched for inspection
        assert_eq!(storage.get("window").unwrap(), "[1, 2, 3]");
    }

    #[tokio::test]
    async fn test_rapid_sets_are_serialized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = Arc::new(
            KeyedStore::new(FileBackend::new(&path), defaults(), StoreOptions::default()).unwrap(),
        );
        store.init().await.unwrap();

        let first = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.set(json!({ "a": 2 })).await })
        };
        let second = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.set(json!({ "b": "y" })).await })
        };
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        let on_disk: Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk, json!({ "a": 2, "b": "y" }));
        assert_eq!(store.get(), on_disk);
    }

    #[tokio::test]
    async fn test_set_heals_wrong_types() {
        let storage = MemoryStorage::new();
        let store =
            KeyedStore::new(storage.backend("app"), defaults(), StoreOptions::default()).unwrap();
        store.init().await.unwrap();

        store.set(json!({ "a": "two", "b": "y" })).await.unwrap();
        assert_eq!(store.get(), json!({ "a": 1, "b": "y" }));
    }

    #[derive(Debug, Default, PartialEq, Serialize, serde::Deserialize)]
    #[serde(default)]
    struct Prefs {
        size: u32,
        label: Option<String>,
    }

    #[tokio::test]
    async fn test_typed_store_heals_against_the_rust_type() {
        let storage = MemoryStorage::new();
        storage.insert("prefs", r#"{"size":12.5,"label":42}"#);
        let store = KeyedStore::with_defaults(
            storage.backend("prefs"),
            &Prefs::default(),
            StoreOptions::default(),
        )
        .unwrap();

        store.init().await.unwrap();
        assert_eq!(store.get(), json!({ "size": 0, "label": null }));

        store.set(json!({ "label": "main", "size": -3 })).await.unwrap();
        assert_eq!(
            store.get_as::<Prefs>().unwrap(),
            Prefs {
                size: 0,
                label: Some("main".into())
            }
        );
    }

    #[tokio::test]
    async fn test_destroy_rejects_writes() {
        let storage = MemoryStorage::new();
        let store =
            KeyedStore::new(storage.backend("app"), defaults(), StoreOptions::default()).unwrap();
        store.init().await.unwrap();
        store.destroy().await;

        assert_eq!(store.phase(), StorePhase::Destroyed);
        assert!(matches!(
            store.set(json!({ "a": 3 })).await,
            Err(StorageError::Destroyed(_))
        ));
        assert!(store.init().await.is_err());
    }

    #[tokio::test]
    async fn test_same_file_cannot_be_opened_twice() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let _first =
            KeyedStore::new(FileBackend::new(&path), defaults(), StoreOptions::default()).unwrap();

        assert!(matches!(
            KeyedStore::new(FileBackend::new(&path), defaults(), StoreOptions::default()),
            Err(StorageError::PathInUse(_))
        ));
    }

    #[tokio::test]
    async fn test_settings_access_trait_object() {
        let storage = MemoryStorage::new();
        let store =
            KeyedStore::new(storage.backend("app"), defaults(), StoreOptions::default()).unwrap();
        store.init().await.unwrap();

        let access: Arc<dyn SettingsAccess> = Arc::new(store);
        access.update(json!({ "a": 7 })).await.unwrap();
        assert_eq!(access.snapshot(), json!({ "a": 7, "b": "x" }));
    }
}
