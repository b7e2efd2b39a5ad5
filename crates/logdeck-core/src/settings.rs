//! Durable settings
//!
//! Both documents are plain JSON objects whose top-level keys follow the
//! `Default` impls below. Fields that go missing are back-filled and fields
//! that no longer fit their Rust type are reset, on load and on every patch.

use logdeck_storage::{FileBackend, KeyedStore, StoreOptions};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::Result;

pub type DurableStore = KeyedStore<FileBackend>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub theme: String,
    pub font_size: u32,
    pub timestamp_format: String,
    pub search: SearchDefaults,
    pub recent_files: Vec<String>,
    pub max_recent_files: usize,
    /// Sidebar app opened for every new session
    pub default_sidebar_app: Option<String>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            theme: "dark".to_string(),
            font_size: 12,
            timestamp_format: "hh:mm:ss.sss".to_string(),
            search: SearchDefaults::default(),
            recent_files: Vec::new(),
            max_recent_files: 20,
            default_sidebar_app: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchDefaults {
    pub case_sensitive: bool,
    pub regex: bool,
    pub whole_word: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowState {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub maximized: bool,
    pub sidebar_visible: bool,
    pub sidebar_width: u32,
    pub toolbar_height: u32,
}

impl Default for WindowState {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            width: 1280,
            height: 800,
            maximized: false,
            sidebar_visible: true,
            sidebar_width: 280,
            toolbar_height: 240,
        }
    }
}

/// Open and load a durable store shaped like `T::default()`
pub async fn open_store<T>(path: &Path, options: StoreOptions) -> Result<DurableStore>
where
    T: Serialize + DeserializeOwned + Default,
{
    let store = KeyedStore::with_defaults(FileBackend::new(path), &T::default(), options)?;
    store.init().await?;
    tracing::debug!(path = %path.display(), "Durable store loaded");
    Ok(store)
}

/// Remember a file in the recent list, most recent first
pub async fn push_recent_file(store: &DurableStore, file: &str) -> Result<AppSettings> {
    let mut settings: AppSettings = store.get_as()?;
    settings.recent_files.retain(|f| f != file);
    settings.recent_files.insert(0, file.to_string());
    settings.recent_files.truncate(settings.max_recent_files);

    store
        .set(serde_json::json!({ "recent_files": settings.recent_files }))
        .await?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_settings_file_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/settings.json");
        let store = open_store::<AppSettings>(&path, StoreOptions::default())
            .await
            .unwrap();

        assert!(path.exists());
        assert_eq!(store.get_as::<AppSettings>().unwrap(), AppSettings::default());
    }

    #[tokio::test]
    async fn test_drifted_settings_heal_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"theme":"light","font_size":"huge","plugin_x":true}"#).unwrap();

        let store = open_store::<AppSettings>(&path, StoreOptions::default())
            .await
            .unwrap();
        let raw = store.get();
        assert_eq!(raw["theme"], "light");
        assert_eq!(raw["font_size"], 12);
        assert_eq!(raw["plugin_x"], true);
        assert_eq!(raw["search"], json!({ "case_sensitive": false, "regex": false, "whole_word": false }));
    }

    #[tokio::test]
    async fn test_values_that_do_not_fit_the_field_type_reset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"font_size":12.5,"max_recent_files":-1,"default_sidebar_app":42,"theme":"light"}"#,
        )
        .unwrap();

        let store = open_store::<AppSettings>(&path, StoreOptions::default())
            .await
            .unwrap();
        let settings: AppSettings = store.get_as().unwrap();
        assert_eq!(settings.font_size, 12);
        assert_eq!(settings.max_recent_files, 20);
        assert_eq!(settings.default_sidebar_app, None);
        assert_eq!(settings.theme, "light");

        store.set(json!({ "default_sidebar_app": "filters" })).await.unwrap();
        let settings: AppSettings = store.get_as().unwrap();
        assert_eq!(settings.default_sidebar_app.as_deref(), Some("filters"));
    }

    #[tokio::test]
    async fn test_corrupt_window_state_resets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("window.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = open_store::<WindowState>(&path, StoreOptions::default())
            .await
            .unwrap();
        assert_eq!(store.get_as::<WindowState>().unwrap(), WindowState::default());

        let strict = dir.path().join("strict.json");
        std::fs::write(&strict, "[]]").unwrap();
        assert!(open_store::<WindowState>(
            &strict,
            StoreOptions {
                reset_on_corruption: false
            }
        )
        .await
        .is_err());
    }

    #[tokio::test]
    async fn test_recent_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = open_store::<AppSettings>(&path, StoreOptions::default())
            .await
            .unwrap();
        store.set(json!({ "max_recent_files": 2 })).await.unwrap();

        push_recent_file(&store, "a.log").await.unwrap();
        push_recent_file(&store, "b.log").await.unwrap();
        let settings = push_recent_file(&store, "a.log").await.unwrap();
        assert_eq!(settings.recent_files, vec!["a.log", "b.log"]);

        push_recent_file(&store, "c.dlt").await.unwrap();
        let on_disk: AppSettings =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk.recent_files, vec!["c.dlt", "a.log"]);
    }
}
