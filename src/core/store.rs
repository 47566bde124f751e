//! Reads and writes the persisted state document.
//!
//! The whole state (files, profiles, tasks) is written on every save; there
//! is no incremental format and no version field. Unknown fields are
//! ignored and missing ones take their defaults.

use super::error::{CoreError, Result};
use super::profiles::Profile;
use super::tasks::TaskItem;
use super::FileEntry;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const NOTES_FILE: &str = "notes.txt";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default)]
    pub files: Vec<FileEntry>,
    #[serde(default)]
    pub profiles: Vec<Profile>,
    #[serde(default)]
    pub tasks: Vec<TaskItem>,
}

impl PersistedState {
    /// Recomputes classification of every file entry, including those held
    /// inside profiles.
    pub fn reclassify(&mut self) {
        self.files.iter_mut().for_each(FileEntry::reclassify);
        for profile in &mut self.profiles {
            profile.files.iter_mut().for_each(FileEntry::reclassify);
        }
    }
}

/// The result of [`Store::load`]. `state` is always usable; `error` carries
/// the reason it fell back to the default.
#[derive(Debug)]
pub struct LoadOutcome {
    pub state: PersistedState,
    pub error: Option<CoreError>,
}

/// A state document at a fixed path.
#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Overwrites the document with `state`. Not atomic against a crash.
    pub fn save(&self, state: &PersistedState) -> Result<()> {
        write_document(&self.path, state)?;
        tracing::debug!(
            "Saved {} files, {} profiles, {} tasks to {:?}",
            state.files.len(),
            state.profiles.len(),
            state.tasks.len(),
            self.path
        );
        Ok(())
    }

    /// Loads the document, never failing hard. Entries whose file no longer
    /// exists are dropped silently.
    pub fn load(&self) -> LoadOutcome {
        match read_document(&self.path) {
            Ok(mut state) => {
                let before = state.files.len();
                state.files.retain(|e| e.path.exists());
                state.reclassify();
                if state.files.len() != before {
                    tracing::debug!(
                        "Dropped {} stale entries while loading {:?}",
                        before - state.files.len(),
                        self.path
                    );
                }
                LoadOutcome { state, error: None }
            }
            Err(e) => {
                tracing::warn!("{}. Falling back to an empty state.", e);
                LoadOutcome {
                    state: PersistedState::default(),
                    error: Some(e),
                }
            }
        }
    }

    pub fn notes_path(&self) -> PathBuf {
        self.path.with_file_name(NOTES_FILE)
    }

    /// Returns the saved notes, or an empty string if none were saved yet.
    pub fn load_notes(&self) -> Result<String> {
        let path = self.notes_path();
        match fs::read_to_string(&path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(CoreError::Io(e, path)),
        }
    }

    pub fn save_notes(&self, text: &str) -> Result<()> {
        let path = self.notes_path();
        ensure_parent(&path).map_err(|e| CoreError::Io(e, path.clone()))?;
        fs::write(&path, text).map_err(|e| CoreError::Io(e, path))
    }
}

/// Writes `state` to a user-chosen file in the same document format.
pub fn export_to(path: &Path, state: &PersistedState) -> Result<()> {
    write_document(path, state)?;
    tracing::info!("Exported state to {:?}", path);
    Ok(())
}

/// Reads a user-chosen document. Classification is recomputed for every
/// file entry; stored categories are not trusted.
pub fn import_from(path: &Path) -> Result<PersistedState> {
    let mut state = read_document(path)?;
    state.reclassify();
    tracing::info!(
        "Imported {} files, {} profiles, {} tasks from {:?}",
        state.files.len(),
        state.profiles.len(),
        state.tasks.len(),
        path
    );
    Ok(state)
}

fn read_document(path: &Path) -> Result<PersistedState> {
    let read_err = |reason: String| CoreError::PersistenceRead {
        path: path.to_path_buf(),
        reason,
    };
    let content = fs::read_to_string(path).map_err(|e| read_err(e.to_string()))?;
    serde_json::from_str(&content).map_err(|e| read_err(e.to_string()))
}

fn write_document(path: &Path, state: &PersistedState) -> Result<()> {
    let write_err = |reason: String| CoreError::PersistenceWrite {
        path: path.to_path_buf(),
        reason,
    };
    ensure_parent(path).map_err(|e| write_err(e.to_string()))?;
    let json = serde_json::to_string_pretty(state).map_err(|e| write_err(e.to_string()))?;
    fs::write(path, json).map_err(|e| write_err(e.to_string()))
}

fn ensure_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
            fs::create_dir_all(parent)
        }
        _ => Ok(()),
    }
}
