//! Responsible for transforming the `SessionState` into a `UiState` view model.
//!
//! The view model is a detached copy: the receiver can hold it without the
//! catalog lock.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use uuid::Uuid;

use super::state::{SessionState, Stats};
use crate::core::classifier::{Category, ColorTag};
use crate::core::watcher::WatchMode;

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct UiState {
    pub files: Vec<FileRow>,
    pub profiles: Vec<ProfileRow>,
    pub tasks: Vec<TaskRow>,
    pub stats: Stats,
    pub watch_mode: WatchMode,
    pub auto_sort: bool,
    pub can_undo: bool,
    pub status_message: String,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct FileRow {
    pub id: Uuid,
    pub name: String,
    pub path: PathBuf,
    pub size: String,
    pub category: Category,
    pub icon: String,
    pub color: String,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ProfileRow {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub files_count: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct TaskRow {
    pub id: Uuid,
    pub text: String,
    pub completed: bool,
}

fn hex(color: ColorTag) -> String {
    format!("#{:02X}{:02X}{:02X}", color.0, color.1, color.2)
}

/// Creates the complete `UiState` from the current `SessionState`.
pub fn generate_ui_state(state: &SessionState) -> UiState {
    let files = state
        .catalog
        .entries()
        .iter()
        .map(|e| FileRow {
            id: e.id,
            name: e.name.clone(),
            path: e.path.clone(),
            size: e.size.clone(),
            category: e.category,
            icon: e.icon.clone(),
            color: hex(e.color),
        })
        .collect();

    let profiles = state
        .profiles
        .as_slice()
        .iter()
        .map(|p| ProfileRow {
            id: p.id,
            name: p.name.clone(),
            description: p.description.clone(),
            files_count: p.files_count(),
            created_at: p.created_at,
        })
        .collect();

    let tasks = state
        .tasks
        .as_slice()
        .iter()
        .map(|t| TaskRow {
            id: t.id,
            text: t.text.clone(),
            completed: t.completed,
        })
        .collect();

    let status_message = match state.watch_mode {
        WatchMode::Enabled => format!("Watching {}", state.config.desktop_directory.display()),
        WatchMode::Disabled => "Monitoring off".to_string(),
        WatchMode::ErrorBackoff => "Monitoring paused after an error, retrying".to_string(),
    };

    UiState {
        files,
        profiles,
        tasks,
        stats: state.stats,
        watch_mode: state.watch_mode,
        auto_sort: state.config.auto_sort_on_create,
        can_undo: !state.history.is_empty(),
        status_message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::core::store::PersistedState;
    use tempfile::tempdir;

    #[test]
    fn test_color_is_rendered_as_hex() {
        assert_eq!(hex(Category::Documents.color()), "#3B82F6");
    }

    #[test]
    fn test_empty_session_view() {
        let dir = tempdir().unwrap();
        let state = SessionState::new(AppConfig::for_directory(dir.path()), PersistedState::default());
        let ui = generate_ui_state(&state);
        assert!(ui.files.is_empty());
        assert!(!ui.can_undo);
        assert_eq!(ui.watch_mode, WatchMode::Disabled);
        assert_eq!(ui.status_message, "Monitoring off");
    }
}
