pub mod catalog;
pub mod classifier;
pub mod debounce;
pub mod error;
pub mod organizer;
pub mod profiles;
pub mod reconciler;
pub mod scanner;
pub mod sort;
pub mod store;
pub mod tasks;
pub mod watcher;

use serde::{Deserialize, Serialize};
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::utils::file_detection::format_size;
use classifier::{classify_path, Category, ColorTag};

/// One cataloged file.
///
/// `id` is assigned on first insertion and never changes; `path` changes on
/// rename or move. Classification fields are always derived from `path`,
/// so stored values are written but never read back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    pub path: PathBuf,
    #[serde(default)]
    pub size: String,
    #[serde(skip_deserializing, default = "default_category")]
    pub category: Category,
    #[serde(skip_deserializing)]
    pub icon: String,
    #[serde(skip_deserializing, default = "default_color")]
    pub color: ColorTag,
}

fn default_category() -> Category {
    Category::Other
}

fn default_color() -> ColorTag {
    Category::Other.color()
}

impl FileEntry {
    /// Builds a fresh entry with a new id for a file observed on disk.
    pub fn from_metadata(path: &Path, metadata: &Metadata) -> Self {
        let mut entry = Self {
            id: Uuid::new_v4(),
            name: display_name(path),
            path: path.to_path_buf(),
            size: format_size(metadata.len()),
            category: Category::Other,
            icon: String::new(),
            color: default_color(),
        };
        entry.reclassify();
        entry
    }

    /// Recomputes category, icon and color from the current path.
    pub fn reclassify(&mut self) {
        let c = classify_path(&self.path);
        self.category = c.category;
        self.icon = c.icon.to_string();
        self.color = c.color;
    }

    /// Refreshes the name and size from fresh metadata.
    pub fn refresh(&mut self, metadata: &Metadata) {
        self.name = display_name(&self.path);
        self.size = format_size(metadata.len());
    }

    /// Moves the entry to a new path, keeping its id.
    pub fn relocate(&mut self, new_path: &Path) {
        self.path = new_path.to_path_buf();
        self.name = display_name(new_path);
        self.reclassify();
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// What happened to a path, as reported by the change source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Deleted,
    Renamed { from: PathBuf },
}

/// A raw change notification waiting to be reconciled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

impl PendingEvent {
    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: ChangeKind::Created,
        }
    }

    pub fn deleted(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: ChangeKind::Deleted,
        }
    }

    pub fn renamed(from: impl Into<PathBuf>, to: impl Into<PathBuf>) -> Self {
        Self {
            path: to.into(),
            kind: ChangeKind::Renamed { from: from.into() },
        }
    }
}

pub use catalog::Catalog;
pub use classifier::{classify, Classification};
pub use debounce::Debouncer;
pub use error::CoreError;
pub use profiles::{Profile, ProfileList};
pub use reconciler::{ReconcileReport, Reconciler};
pub use scanner::DesktopScanner;
pub use sort::SortHistory;
pub use store::{PersistedState, Store};
pub use tasks::{TaskItem, TaskList};
pub use watcher::{WatchMode, WatcherSupervisor};
