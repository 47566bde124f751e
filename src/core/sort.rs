//! Category-then-name ordering of the catalog, with a bounded undo stack.

use super::catalog::Catalog;
use super::error::{CoreError, Result};
use super::FileEntry;
use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};
use uuid::Uuid;

pub const DEFAULT_HISTORY_CAP: usize = 50;

/// Compares two entries by category rank, then case-insensitive name, with
/// the exact name as a final tie breaker.
pub fn compare_entries(a: &FileEntry, b: &FileEntry) -> Ordering {
    a.category
        .rank()
        .cmp(&b.category.rank())
        .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        .then_with(|| a.name.cmp(&b.name))
}

/// Returns the entries in sorted order. Stable for equal keys.
pub fn sorted(entries: &[FileEntry]) -> Vec<FileEntry> {
    let mut out = entries.to_vec();
    out.sort_by(compare_entries);
    out
}

/// Bounded stack of prior catalog orderings, kept as entry ids. The oldest
/// ordering is evicted once `cap` is exceeded.
#[derive(Debug, Clone)]
pub struct SortHistory {
    snapshots: VecDeque<Vec<Uuid>>,
    cap: usize,
}

impl Default for SortHistory {
    fn default() -> Self {
        Self::with_cap(DEFAULT_HISTORY_CAP)
    }
}

impl SortHistory {
    pub fn with_cap(cap: usize) -> Self {
        Self {
            snapshots: VecDeque::new(),
            cap: cap.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn push(&mut self, snapshot: Vec<Uuid>) {
        self.snapshots.push_back(snapshot);
        while self.snapshots.len() > self.cap {
            self.snapshots.pop_front();
        }
    }

    pub fn pop(&mut self) -> Option<Vec<Uuid>> {
        self.snapshots.pop_back()
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }

    /// Iterates snapshots from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Vec<Uuid>> {
        self.snapshots.iter()
    }
}

/// Records the current order, then sorts the catalog in place.
pub fn sort_catalog(catalog: &mut Catalog, history: &mut SortHistory) {
    history.push(catalog.entries().iter().map(|e| e.id).collect());
    let ordered = sorted(catalog.entries());
    catalog.replace_all(ordered);
}

/// Restores the most recent recorded order of the current entries.
///
/// Entries keep their current path and size. Entries removed since the
/// sort stay removed; entries added since follow in their current order.
pub fn undo(catalog: &mut Catalog, history: &mut SortHistory) -> Result<()> {
    let previous = history.pop().ok_or(CoreError::NothingToUndo)?;
    let position: HashMap<Uuid, usize> = previous
        .into_iter()
        .enumerate()
        .map(|(i, id)| (id, i))
        .collect();
    let mut entries = catalog.snapshot();
    // Stable, so later additions keep their relative order at the end.
    entries.sort_by_key(|e| position.get(&e.id).copied().unwrap_or(usize::MAX));
    catalog.replace_all(entries);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::classifier::Category;
    use proptest::prelude::*;
    use std::path::PathBuf;

    fn entry(name: &str) -> FileEntry {
        let mut e = FileEntry {
            id: Uuid::new_v4(),
            name: name.to_string(),
            path: PathBuf::from("/desk").join(name),
            size: "0 B".into(),
            category: Category::Other,
            icon: String::new(),
            color: Category::Other.color(),
        };
        e.reclassify();
        e
    }

    fn names(catalog: &Catalog) -> Vec<&str> {
        catalog.entries().iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn test_sort_orders_by_rank_then_name() {
        let mut catalog = Catalog::from_entries(vec![
            entry("zeta.txt"),
            entry("song.mp3"),
            entry("Readme"),
            entry("alpha.PDF"),
            entry("clip.mp4"),
            entry("pic.png"),
            entry("app.lnk"),
        ]);
        let mut history = SortHistory::default();
        sort_catalog(&mut catalog, &mut history);

        assert_eq!(
            names(&catalog),
            ["alpha.PDF", "zeta.txt", "pic.png", "clip.mp4", "song.mp3", "app.lnk", "Readme"]
        );
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_sort_then_undo_restores_exact_order() {
        let original = vec![entry("b.txt"), entry("a.zip"), entry("c.txt"), entry("a.txt")];
        let mut catalog = Catalog::from_entries(original.clone());
        let mut history = SortHistory::default();

        sort_catalog(&mut catalog, &mut history);
        assert_ne!(catalog.entries(), original.as_slice());
        undo(&mut catalog, &mut history).unwrap();
        assert_eq!(catalog.entries(), original.as_slice());
        assert!(history.is_empty());
    }

    #[test]
    fn test_undo_reorders_current_entries_only() {
        let mut catalog = Catalog::from_entries(vec![
            entry("b.txt"),
            entry("gone.zip"),
            entry("a.txt"),
        ]);
        let mut history = SortHistory::default();
        sort_catalog(&mut catalog, &mut history);

        let gone = catalog.get_by_path(&PathBuf::from("/desk/gone.zip")).unwrap().id;
        catalog.remove_by_id(gone);
        catalog.insert(entry("new.png")).unwrap();
        catalog
            .update_by_path(&PathBuf::from("/desk/a.txt"), |e| e.size = "9 B".into())
            .unwrap();

        undo(&mut catalog, &mut history).unwrap();
        assert_eq!(names(&catalog), ["b.txt", "a.txt", "new.png"]);
        assert_eq!(catalog.entries()[1].size, "9 B");
    }

    #[test]
    fn test_undo_on_empty_history_fails() {
        let mut catalog = Catalog::new();
        let mut history = SortHistory::default();
        assert!(matches!(
            undo(&mut catalog, &mut history),
            Err(CoreError::NothingToUndo)
        ));
    }

    #[test]
    fn test_history_is_capped_and_evicts_oldest_first() {
        let mut history = SortHistory::default();
        let ids: Vec<Uuid> = (0..60).map(|_| Uuid::new_v4()).collect();
        for id in &ids {
            history.push(vec![*id]);
        }
        assert_eq!(history.len(), 50);
        let oldest = history.iter().next().unwrap();
        assert_eq!(oldest[0], ids[10]);
        let newest = history.pop().unwrap();
        assert_eq!(newest[0], ids[59]);
    }

    #[test]
    fn test_sixty_sorts_leave_fifty_snapshots() {
        let mut catalog = Catalog::from_entries(vec![entry("b.txt"), entry("a.txt")]);
        let mut history = SortHistory::default();
        for _ in 0..60 {
            sort_catalog(&mut catalog, &mut history);
        }
        assert_eq!(history.len(), DEFAULT_HISTORY_CAP);
    }

    proptest! {
        #[test]
        fn prop_sort_is_ordered_and_a_permutation(
            raw in proptest::collection::vec(("[a-cA-C]{1,3}", prop::sample::select(vec!["txt", "png", "zip", "mp3", "bin"])), 0..20)
        ) {
            let entries: Vec<FileEntry> = raw
                .iter()
                .enumerate()
                .map(|(i, (stem, ext))| entry(&format!("{stem}{i}.{ext}")))
                .collect();
            let out = sorted(&entries);
            prop_assert_eq!(out.len(), entries.len());
            for pair in out.windows(2) {
                prop_assert_ne!(compare_entries(&pair[0], &pair[1]), Ordering::Greater);
            }
            let mut before: Vec<_> = entries.iter().map(|e| e.id).collect();
            let mut after: Vec<_> = out.iter().map(|e| e.id).collect();
            before.sort();
            after.sort();
            prop_assert_eq!(before, after);
        }
    }
}
