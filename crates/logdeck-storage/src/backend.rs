//! Storage backends
//!
//! A backend only moves whole documents; validation and merging live in
//! [`crate::KeyedStore`].

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::Result;

#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Stable name of the backing location, used in logs and for ownership claims
    fn location(&self) -> &str;

    /// Whether the location must be owned by a single store instance
    fn exclusive(&self) -> bool {
        false
    }

    async fn exists(&self) -> Result<bool>;

    async fn read(&self) -> Result<String>;

    async fn write(&self, content: &str) -> Result<()>;

    async fn remove(&self) -> Result<()>;
}

/// JSON file on disk. Writes go through a sibling temp file and a rename so a
/// reader never observes a half-written document.
pub struct FileBackend {
    path: PathBuf,
    location: String,
}

impl FileBackend {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let location = std::path::absolute(&path)
            .unwrap_or_else(|_| path.clone())
            .to_string_lossy()
            .to_string();
        Self { path, location }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl StorageBackend for FileBackend {
    fn location(&self) -> &str {
        &self.location
    }

    fn exclusive(&self) -> bool {
        true
    }

    async fn exists(&self) -> Result<bool> {
        Ok(tokio::fs::try_exists(&self.path).await?)
    }

    async fn read(&self) -> Result<String> {
        Ok(tokio::fs::read_to_string(&self.path).await?)
    }

    async fn write(&self, content: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let temp = self.temp_path();
        tokio::fs::write(&temp, content).await?;
        tokio::fs::rename(&temp, &self.path).await?;
        Ok(())
    }

    async fn remove(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Process-local document map shared by every [`MemoryBackend`] cut from it.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn backend(&self, location: impl Into<String>) -> MemoryBackend {
        MemoryBackend {
            storage: self.clone(),
            location: location.into(),
        }
    }

    pub fn get(&self, location: &str) -> Option<String> {
        self.entries.read().get(location).cloned()
    }

    pub fn insert(&self, location: impl Into<String>, content: impl Into<String>) {
        self.entries.write().insert(location.into(), content.into());
    }

    pub fn remove(&self, location: &str) -> bool {
        self.entries.write().remove(location).is_some()
    }

    /// Remove every document whose location starts with `prefix`
    pub fn remove_prefix(&self, prefix: &str) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|location, _| !location.starts_with(prefix));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

pub struct MemoryBackend {
    storage: MemoryStorage,
    location: String,
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    fn location(&self) -> &str {
        &self.location
    }

    async fn exists(&self) -> Result<bool> {
        Ok(self.storage.entries.read().contains_key(&self.location))
    }

    async fn read(&self) -> Result<String> {
        self.storage.get(&self.location).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no document at {}", self.location),
            )
            .into()
        })
    }

    async fn write(&self, content: &str) -> Result<()> {
        self.storage.insert(self.location.clone(), content);
        Ok(())
    }

    async fn remove(&self) -> Result<()> {
        self.storage.remove(&self.location);
        Ok(())
    }
}
