//! Application configuration

use logdeck_session::RegistryConfig;
use logdeck_storage::StoreOptions;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::worker::WorkerConfig;

/// Overrides the platform data directory
pub const DATA_DIR_ENV: &str = "LOGDECK_DATA_DIR";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root for everything written to disk
    pub data_dir: PathBuf,
    /// Durable application settings
    pub settings_path: PathBuf,
    /// Window geometry and sidebar layout
    pub window_path: PathBuf,
    /// Reset unreadable settings to defaults instead of refusing to start
    pub reset_settings_on_corruption: bool,
    /// Window state is cheap to lose
    pub reset_window_on_corruption: bool,
    /// `EnvFilter` directive; `RUST_LOG` wins when set
    pub log_filter: Option<String>,
    /// Notifications kept for the notification area
    pub notification_history: usize,
    pub registry: RegistryConfig,
    pub worker: WorkerConfig,
}

impl Config {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            settings_path: data_dir.join("settings.json"),
            window_path: data_dir.join("window.json"),
            data_dir,
            reset_settings_on_corruption: true,
            reset_window_on_corruption: true,
            log_filter: None,
            notification_history: 50,
            registry: RegistryConfig::default(),
            worker: WorkerConfig::default(),
        }
    }

    pub fn data_dir() -> PathBuf {
        if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|dir| !dir.is_empty()) {
            return PathBuf::from(dir);
        }
        dirs::data_local_dir()
            .map(|d| d.join("Logdeck"))
            .unwrap_or_else(|| PathBuf::from(".logdeck"))
    }

    pub fn settings_options(&self) -> StoreOptions {
        StoreOptions {
            reset_on_corruption: self.reset_settings_on_corruption,
        }
    }

    pub fn window_options(&self) -> StoreOptions {
        StoreOptions {
            reset_on_corruption: self.reset_window_on_corruption,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Self::data_dir())
    }
}

mod dirs {
    use std::path::PathBuf;

    pub fn data_local_dir() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var("LOCALAPPDATA").ok().map(PathBuf::from)
        }
        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library/Application Support"))
        }
        #[cfg(target_os = "linux")]
        {
            std::env::var("XDG_DATA_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|h| PathBuf::from(h).join(".local/share"))
                })
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
        {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_follow_data_dir() {
        let config = Config::new(PathBuf::from("/var/lib/logdeck"));
        assert_eq!(config.settings_path, PathBuf::from("/var/lib/logdeck/settings.json"));
        assert_eq!(config.window_path, PathBuf::from("/var/lib/logdeck/window.json"));
        assert!(config.settings_options().reset_on_corruption);
        assert_eq!(config.registry.max_sessions, 64);
    }
}
