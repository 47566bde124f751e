pub mod settings;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DATA_FILE: &str = "deskflow_data.json";
pub const SORT_FOLDER: &str = "DeskFlow Sorted";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    pub desktop_directory: PathBuf,
    pub sort_directory: PathBuf,
    pub data_file: Option<PathBuf>,
    pub monitoring_enabled: bool,
    pub auto_sort_on_create: bool,
    pub debounce_ms: u64,
    pub watcher_backoff_ms: u64,
    pub create_settle_ms: u64,
    pub sort_history_cap: usize,
    pub ignore_patterns: HashSet<String>,
}

impl AppConfig {
    /// A default config watching `desktop`, with its sort folder inside it.
    pub fn for_directory(desktop: &Path) -> Self {
        Self {
            desktop_directory: desktop.to_path_buf(),
            sort_directory: desktop.join(SORT_FOLDER),
            ..Self::default()
        }
    }

    /// Where the persisted state lives: the override if set, otherwise the
    /// platform data directory.
    pub fn data_file_path(&self) -> PathBuf {
        self.data_file.clone().unwrap_or_else(|| {
            settings::get_data_directory()
                .unwrap_or_else(|| self.desktop_directory.clone())
                .join(DATA_FILE)
        })
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn watcher_backoff(&self) -> Duration {
        Duration::from_millis(self.watcher_backoff_ms)
    }

    pub fn create_settle(&self) -> Duration {
        Duration::from_millis(self.create_settle_ms)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let ignore_patterns = ["desktop.ini", "Thumbs.db", "~$*", "*.tmp"]
            .into_iter()
            .map(String::from)
            .collect();

        let desktop_directory = dirs::desktop_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));

        Self {
            sort_directory: desktop_directory.join(SORT_FOLDER),
            desktop_directory,
            data_file: None,
            monitoring_enabled: true,
            auto_sort_on_create: false,
            debounce_ms: 500,
            watcher_backoff_ms: 500,
            create_settle_ms: 100,
            sort_history_cap: crate::core::sort::DEFAULT_HISTORY_CAP,
            ignore_patterns,
        }
    }
}
