//! The in-memory, ordered catalog of files in the watched directory.

use super::error::{CoreError, Result};
use super::FileEntry;
use std::path::Path;
use uuid::Uuid;

/// Ordered collection of [`FileEntry`]. Order is display order.
///
/// Paths are unique within a catalog. Every mutation sets the dirty flag;
/// the owning session clears it once the state has been persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    entries: Vec<FileEntry>,
    dirty: bool,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<FileEntry>) -> Self {
        let mut catalog = Self::new();
        catalog.replace_all(entries);
        catalog.dirty = false;
        catalog
    }

    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn contains_path(&self, path: &Path) -> bool {
        self.position_by_path(path).is_some()
    }

    pub fn get_by_path(&self, path: &Path) -> Option<&FileEntry> {
        self.entries.iter().find(|e| e.path == path)
    }

    pub fn get_by_id(&self, id: Uuid) -> Option<&FileEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    fn position_by_path(&self, path: &Path) -> Option<usize> {
        self.entries.iter().position(|e| e.path == path)
    }

    /// Appends an entry. Fails if its path is already cataloged.
    pub fn insert(&mut self, entry: FileEntry) -> Result<()> {
        if self.contains_path(&entry.path) {
            return Err(CoreError::DuplicatePath(entry.path));
        }
        self.entries.push(entry);
        self.dirty = true;
        Ok(())
    }

    /// Applies `mutator` to the entry at `path` in place.
    ///
    /// The mutator may change the path itself (rename), but not onto a path
    /// owned by another entry; in that case the other entry is dropped so
    /// paths stay unique.
    pub fn update_by_path<F>(&mut self, path: &Path, mutator: F) -> Result<()>
    where
        F: FnOnce(&mut FileEntry),
    {
        let idx = self
            .position_by_path(path)
            .ok_or_else(|| CoreError::NotFound(path.to_path_buf()))?;
        mutator(&mut self.entries[idx]);
        let id = self.entries[idx].id;
        let new_path = self.entries[idx].path.clone();
        if new_path != path {
            self.entries.retain(|e| e.id == id || e.path != new_path);
        }
        self.dirty = true;
        Ok(())
    }

    pub fn remove_by_path(&mut self, path: &Path) -> Option<FileEntry> {
        let idx = self.position_by_path(path)?;
        self.dirty = true;
        Some(self.entries.remove(idx))
    }

    pub fn remove_by_id(&mut self, id: Uuid) -> Option<FileEntry> {
        let idx = self.entries.iter().position(|e| e.id == id)?;
        self.dirty = true;
        Some(self.entries.remove(idx))
    }

    /// Replaces the whole content and order. Later duplicates of a path are
    /// dropped.
    pub fn replace_all(&mut self, entries: Vec<FileEntry>) {
        let mut seen = std::collections::HashSet::new();
        self.entries = entries
            .into_iter()
            .filter(|e| seen.insert(e.path.clone()))
            .collect();
        self.dirty = true;
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.dirty = true;
    }

    /// A deep, independent copy of the current entries.
    pub fn snapshot(&self) -> Vec<FileEntry> {
        self.entries.clone()
    }
}
