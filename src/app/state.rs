//! Defines the central, mutable state of a DeskFlow session.

use crate::config::AppConfig;
use crate::core::store::PersistedState;
use crate::core::watcher::WatchMode;
use crate::core::{Catalog, DesktopScanner, ProfileList, SortHistory, TaskList};
use serde::Serialize;
use std::sync::Arc;

/// Derived counters shown next to the lists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub files: usize,
    pub profiles: usize,
    pub tasks_total: usize,
    pub tasks_completed: usize,
}

/// Holds everything the catalog lock protects.
///
/// Wrapped in an `Arc<Mutex<...>>`; the reconcile task, the sort/undo and
/// profile commands all go through that one lock.
pub struct SessionState {
    pub config: AppConfig,
    pub catalog: Catalog,
    pub history: SortHistory,
    pub profiles: ProfileList,
    pub tasks: TaskList,
    /// Built from `config.ignore_patterns`; rebuilt when they change.
    pub scanner: Arc<DesktopScanner>,
    /// Last mode reported by the watcher supervisor.
    pub watch_mode: WatchMode,
    pub stats: Stats,
}

impl SessionState {
    pub fn new(config: AppConfig, persisted: PersistedState) -> Self {
        let scanner = Arc::new(DesktopScanner::new(
            &config.desktop_directory,
            &config.ignore_patterns,
        ));
        let mut state = Self {
            history: SortHistory::with_cap(config.sort_history_cap),
            catalog: Catalog::from_entries(persisted.files),
            profiles: ProfileList::new(persisted.profiles),
            tasks: TaskList::new(persisted.tasks),
            scanner,
            watch_mode: WatchMode::Disabled,
            stats: Stats::default(),
            config,
        };
        state.refresh_stats();
        state
    }

    pub fn refresh_stats(&mut self) {
        self.stats = Stats {
            files: self.catalog.len(),
            profiles: self.profiles.len(),
            tasks_total: self.tasks.len(),
            tasks_completed: self.tasks.completed_count(),
        };
    }

    /// The full document written on every save.
    pub fn persisted(&self) -> PersistedState {
        PersistedState {
            files: self.catalog.snapshot(),
            profiles: self.profiles.as_slice().to_vec(),
            tasks: self.tasks.as_slice().to_vec(),
        }
    }

    pub fn rebuild_scanner(&mut self) {
        self.scanner = Arc::new(DesktopScanner::new(
            &self.config.desktop_directory,
            &self.config.ignore_patterns,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_helpers::write_file;
    use tempfile::tempdir;

    #[test]
    fn test_stats_follow_the_lists() {
        let dir = tempdir().unwrap();
        let mut state = SessionState::new(AppConfig::for_directory(dir.path()), PersistedState::default());
        let path = write_file(dir.path(), "a.txt", "a");
        let entry = crate::core::FileEntry::from_metadata(&path, &std::fs::metadata(&path).unwrap());
        state.catalog.insert(entry).unwrap();
        let id = state.tasks.add("one").unwrap().id;
        state.tasks.add("two").unwrap();
        state.tasks.set_completed(id, true).unwrap();
        state.refresh_stats();

        assert_eq!(
            state.stats,
            Stats {
                files: 1,
                profiles: 0,
                tasks_total: 2,
                tasks_completed: 1
            }
        );
        assert_eq!(state.persisted().files.len(), 1);
    }
}
