//! Applies a batch of change notifications to the catalog.
//!
//! Events are processed in arrival order. Replaying the same batch converges
//! to the same catalog: a known path is refreshed rather than inserted again,
//! and deleting an unknown path is a no-op.

use super::catalog::Catalog;
use super::scanner::{DesktopScanner, Probe};
use super::sort::{self, SortHistory};
use super::{ChangeKind, FileEntry, PendingEvent};
use std::path::Path;

/// What a reconcile pass changed, used for notifications and counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub added: Vec<String>,
    pub refreshed: usize,
    pub removed: Vec<String>,
    pub renamed: Vec<(String, String)>,
    pub ignored: usize,
    pub sorted: bool,
}

impl ReconcileReport {
    /// True if the catalog content or order changed.
    pub fn changed(&self) -> bool {
        !self.added.is_empty()
            || self.refreshed > 0
            || !self.removed.is_empty()
            || !self.renamed.is_empty()
            || self.sorted
    }

    /// One line per user-visible change.
    pub fn messages(&self) -> Vec<String> {
        let mut out = Vec::new();
        out.extend(self.added.iter().map(|n| format!("➕ New file: {}", n)));
        out.extend(self.removed.iter().map(|n| format!("➖ Removed: {}", n)));
        out.extend(
            self.renamed
                .iter()
                .map(|(from, to)| format!("✏️ Renamed: {} → {}", from, to)),
        );
        if self.sorted {
            out.push("✓ Files sorted".to_string());
        }
        out
    }
}

pub struct Reconciler<'a> {
    scanner: &'a DesktopScanner,
    auto_sort: bool,
}

impl<'a> Reconciler<'a> {
    pub fn new(scanner: &'a DesktopScanner, auto_sort: bool) -> Self {
        Self { scanner, auto_sort }
    }

    /// Applies `batch` to `catalog`. If auto-sort is on and anything was
    /// inserted, the catalog is sorted once at the end of the batch.
    pub fn reconcile(
        &self,
        batch: &[PendingEvent],
        catalog: &mut Catalog,
        history: &mut SortHistory,
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        for event in batch {
            match &event.kind {
                ChangeKind::Created => self.apply_created(&event.path, catalog, &mut report),
                ChangeKind::Deleted => {
                    if let Some(removed) = catalog.remove_by_path(&event.path) {
                        tracing::debug!("Removed {:?}", removed.path);
                        report.removed.push(removed.name);
                    }
                }
                ChangeKind::Renamed { from } => {
                    self.apply_renamed(from, &event.path, catalog, &mut report)
                }
            }
        }

        if self.auto_sort && !report.added.is_empty() {
            sort::sort_catalog(catalog, history);
            report.sorted = true;
        }

        report
    }

    fn apply_created(&self, path: &Path, catalog: &mut Catalog, report: &mut ReconcileReport) {
        match self.scanner.probe(path) {
            Probe::Missing => {
                // Gone before we got to it; drop a stale entry if we had one.
                if let Some(removed) = catalog.remove_by_path(path) {
                    report.removed.push(removed.name);
                }
            }
            Probe::Skipped => {
                tracing::debug!("Skipping {:?} (directory, hidden or ignored)", path);
                report.ignored += 1;
            }
            Probe::File(metadata) => {
                if catalog.contains_path(path) {
                    if catalog
                        .update_by_path(path, |e| e.refresh(&metadata))
                        .is_ok()
                    {
                        report.refreshed += 1;
                    }
                    return;
                }
                let entry = FileEntry::from_metadata(path, &metadata);
                let name = entry.name.clone();
                if catalog.insert(entry).is_ok() {
                    tracing::debug!("Cataloged {:?}", path);
                    report.added.push(name);
                }
            }
        }
    }

    fn apply_renamed(
        &self,
        from: &Path,
        to: &Path,
        catalog: &mut Catalog,
        report: &mut ReconcileReport,
    ) {
        let Some(old_name) = catalog.get_by_path(from).map(|e| e.name.clone()) else {
            // The source was never tracked; the new path may still be new to us.
            self.apply_created(to, catalog, report);
            return;
        };
        if catalog.update_by_path(from, |e| e.relocate(to)).is_ok() {
            let new_name = catalog
                .get_by_path(to)
                .map(|e| e.name.clone())
                .unwrap_or_default();
            tracing::debug!("Renamed {:?} -> {:?}", from, to);
            report.renamed.push((old_name, new_name));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::classifier::Category;
    use crate::utils::test_helpers::write_file;
    use std::collections::HashSet;
    use tempfile::tempdir;

    fn reconcile(batch: &[PendingEvent], catalog: &mut Catalog, auto_sort: bool) -> ReconcileReport {
        let scanner = DesktopScanner::without_patterns();
        let mut history = SortHistory::default();
        Reconciler::new(&scanner, auto_sort).reconcile(batch, catalog, &mut history)
    }

    #[test]
    fn test_created_batch_is_idempotent() {
        let dir = tempdir().unwrap();
        let a = write_file(dir.path(), "a.txt", "aaa");
        let b = write_file(dir.path(), "b.png", "b");
        let batch = vec![
            PendingEvent::created(&a),
            PendingEvent::created(&b),
            PendingEvent::created(&a),
        ];
        let mut catalog = Catalog::new();

        let first = reconcile(&batch, &mut catalog, false);
        let after_first = catalog.snapshot();
        let second = reconcile(&batch, &mut catalog, false);

        assert_eq!(first.added, vec!["a.txt".to_string(), "b.png".to_string()]);
        assert_eq!(first.refreshed, 1);
        assert!(second.added.is_empty());
        assert_eq!(catalog.snapshot(), after_first);
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn test_created_refreshes_size_of_known_file() {
        let dir = tempdir().unwrap();
        let a = write_file(dir.path(), "a.txt", "a");
        let mut catalog = Catalog::new();
        reconcile(&[PendingEvent::created(&a)], &mut catalog, false);
        let id = catalog.entries()[0].id;

        std::fs::write(&a, vec![b'x'; 2048]).unwrap();
        reconcile(&[PendingEvent::created(&a)], &mut catalog, false);

        assert_eq!(catalog.entries()[0].id, id);
        assert_eq!(catalog.entries()[0].size, "2.00 KB");
    }

    #[test]
    fn test_created_for_vanished_file_is_noop() {
        let dir = tempdir().unwrap();
        let mut catalog = Catalog::new();
        let report = reconcile(
            &[PendingEvent::created(dir.path().join("ghost.txt"))],
            &mut catalog,
            false,
        );
        assert!(catalog.is_empty());
        assert!(!report.changed());
    }

    #[test]
    fn test_created_skips_hidden_and_directories() {
        let dir = tempdir().unwrap();
        let hidden = write_file(dir.path(), ".cache", "x");
        let sub = dir.path().join("folder");
        std::fs::create_dir(&sub).unwrap();
        let mut catalog = Catalog::new();

        let report = reconcile(
            &[PendingEvent::created(&hidden), PendingEvent::created(&sub)],
            &mut catalog,
            false,
        );
        assert!(catalog.is_empty());
        assert_eq!(report.ignored, 2);
    }

    #[test]
    fn test_ignore_patterns_apply_to_created_events() {
        let dir = tempdir().unwrap();
        let tmp = write_file(dir.path(), "download.tmp", "x");
        let patterns: HashSet<String> = ["*.tmp".to_string()].into_iter().collect();
        let scanner = DesktopScanner::new(dir.path(), &patterns);
        let mut catalog = Catalog::new();
        let mut history = SortHistory::default();

        Reconciler::new(&scanner, false).reconcile(
            &[PendingEvent::created(&tmp)],
            &mut catalog,
            &mut history,
        );
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_redundant_deletes_are_noops() {
        let dir = tempdir().unwrap();
        let a = write_file(dir.path(), "a.txt", "a");
        let mut catalog = Catalog::new();
        reconcile(&[PendingEvent::created(&a)], &mut catalog, false);
        std::fs::remove_file(&a).unwrap();

        let batch = vec![PendingEvent::deleted(&a), PendingEvent::deleted(&a)];
        let report = reconcile(&batch, &mut catalog, false);
        assert_eq!(report.removed, vec!["a.txt".to_string()]);
        let report = reconcile(&batch, &mut catalog, false);
        assert!(report.removed.is_empty());
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_rename_keeps_id_and_reclassifies() {
        let dir = tempdir().unwrap();
        let old = write_file(dir.path(), "draft.txt", "a");
        let mut catalog = Catalog::new();
        reconcile(&[PendingEvent::created(&old)], &mut catalog, false);
        let id = catalog.entries()[0].id;

        let new = dir.path().join("final.pdf");
        std::fs::rename(&old, &new).unwrap();
        let report = reconcile(&[PendingEvent::renamed(&old, &new)], &mut catalog, false);

        let entry = &catalog.entries()[0];
        assert_eq!(entry.id, id);
        assert_eq!(entry.path, new);
        assert_eq!(entry.name, "final.pdf");
        assert_eq!(entry.category, Category::Documents);
        assert_eq!(
            report.renamed,
            vec![("draft.txt".to_string(), "final.pdf".to_string())]
        );
    }

    #[test]
    fn test_rename_of_untracked_source_is_a_create() {
        let dir = tempdir().unwrap();
        let new = write_file(dir.path(), "arrived.zip", "z");
        let mut catalog = Catalog::new();

        let report = reconcile(
            &[PendingEvent::renamed(dir.path().join("partial.crdownload"), &new)],
            &mut catalog,
            false,
        );
        assert_eq!(report.added, vec!["arrived.zip".to_string()]);
        assert_eq!(catalog.entries()[0].category, Category::Archives);
    }

    #[test]
    fn test_auto_sort_runs_once_per_batch_with_inserts() {
        let dir = tempdir().unwrap();
        let z = write_file(dir.path(), "z.txt", "z");
        let m = write_file(dir.path(), "m.mp3", "m");
        let a = write_file(dir.path(), "a.txt", "a");
        let scanner = DesktopScanner::without_patterns();
        let mut catalog = Catalog::new();
        let mut history = SortHistory::default();
        let reconciler = Reconciler::new(&scanner, true);

        let report = reconciler.reconcile(
            &[
                PendingEvent::created(&z),
                PendingEvent::created(&m),
                PendingEvent::created(&a),
            ],
            &mut catalog,
            &mut history,
        );
        assert!(report.sorted);
        assert_eq!(history.len(), 1);
        let names: Vec<_> = catalog.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["a.txt", "z.txt", "m.mp3"]);

        let report = reconciler.reconcile(&[PendingEvent::deleted(&m)], &mut catalog, &mut history);
        assert!(!report.sorted);
        assert_eq!(history.len(), 1);
    }
}
