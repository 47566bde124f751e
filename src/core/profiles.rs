//! Named snapshots of the catalog.

use super::catalog::Catalog;
use super::error::{CoreError, Result};
use super::FileEntry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub files: Vec<FileEntry>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Profile {
    /// Label shown next to the profile, e.g. `Files: 3`.
    pub fn files_count(&self) -> String {
        format!("Files: {}", self.files.len())
    }
}

/// The list of saved profiles, in creation order.
///
/// Names are not unique; profiles are addressed by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileList {
    profiles: Vec<Profile>,
}

impl ProfileList {
    pub fn new(profiles: Vec<Profile>) -> Self {
        Self { profiles }
    }

    pub fn as_slice(&self) -> &[Profile] {
        &self.profiles
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.id == id)
    }

    /// Stores an independent copy of `snapshot` under a new profile.
    pub fn create(
        &mut self,
        name: &str,
        description: &str,
        snapshot: Vec<FileEntry>,
    ) -> Result<&Profile> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::EmptyName);
        }
        self.profiles.push(Profile {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: description.to_string(),
            files: snapshot,
            created_at: Utc::now(),
        });
        Ok(&self.profiles[self.profiles.len() - 1])
    }

    /// Edits the name and/or description of an existing profile.
    pub fn edit(
        &mut self,
        id: Uuid,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<&Profile> {
        if name.is_some_and(|n| n.trim().is_empty()) {
            return Err(CoreError::EmptyName);
        }
        let profile = self
            .profiles
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(CoreError::UnknownId(id))?;
        if let Some(name) = name {
            profile.name = name.trim().to_string();
        }
        if let Some(description) = description {
            profile.description = description.to_string();
        }
        Ok(profile)
    }

    pub fn delete(&mut self, id: Uuid) -> Result<Profile> {
        let idx = self
            .profiles
            .iter()
            .position(|p| p.id == id)
            .ok_or(CoreError::UnknownId(id))?;
        Ok(self.profiles.remove(idx))
    }

    pub fn replace_all(&mut self, profiles: Vec<Profile>) {
        self.profiles = profiles;
    }
}

/// Replaces the catalog with the profile's snapshot, keeping only entries
/// whose file still exists. Classification is recomputed for each kept
/// entry. Returns the number of entries kept.
pub fn apply(profile: &Profile, catalog: &mut Catalog) -> usize {
    let kept: Vec<FileEntry> = profile
        .files
        .iter()
        .filter(|e| e.path.exists())
        .cloned()
        .map(|mut e| {
            e.reclassify();
            e
        })
        .collect();
    catalog.replace_all(kept);
    catalog.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_helpers::write_file;
    use std::path::Path;

    fn observed(path: &Path) -> FileEntry {
        FileEntry::from_metadata(path, &std::fs::metadata(path).unwrap())
    }

    #[test]
    fn test_create_rejects_blank_name() {
        let mut list = ProfileList::default();
        assert!(matches!(list.create("   ", "", vec![]), Err(CoreError::EmptyName)));
        assert!(list.is_empty());
    }

    #[test]
    fn test_create_allows_duplicate_names() {
        let mut list = ProfileList::default();
        let a = list.create("Work", "", vec![]).unwrap().id;
        let b = list.create("Work", "", vec![]).unwrap().id;
        assert_ne!(a, b);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_snapshot_is_independent_of_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(dir.path(), "a.txt", "a");
        let mut catalog = Catalog::from_entries(vec![observed(&a)]);
        let mut list = ProfileList::default();
        let id = list.create("Snap", "desc", catalog.snapshot()).unwrap().id;

        catalog.clear();
        assert_eq!(list.get(id).unwrap().files.len(), 1);
        assert_eq!(list.get(id).unwrap().files_count(), "Files: 1");
    }

    #[test]
    fn test_apply_drops_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(dir.path(), "a.txt", "a");
        let b = write_file(dir.path(), "b.png", "b");
        let c = write_file(dir.path(), "c.zip", "c");
        let snapshot = vec![observed(&a), observed(&b), observed(&c)];

        let mut list = ProfileList::default();
        let id = list.create("Three", "", snapshot).unwrap().id;
        std::fs::remove_file(&b).unwrap();

        let mut catalog = Catalog::new();
        let kept = apply(list.get(id).unwrap(), &mut catalog);
        assert_eq!(kept, 2);
        let paths: Vec<_> = catalog.entries().iter().map(|e| e.path.clone()).collect();
        assert_eq!(paths, vec![a, c]);
    }

    #[test]
    fn test_edit_and_delete_by_id() {
        let mut list = ProfileList::default();
        let id = list.create("Old", "first", vec![]).unwrap().id;

        let edited = list.edit(id, Some("New"), None).unwrap();
        assert_eq!(edited.name, "New");
        assert_eq!(edited.description, "first");
        assert!(matches!(list.edit(id, Some(""), None), Err(CoreError::EmptyName)));

        list.delete(id).unwrap();
        assert!(matches!(list.delete(id), Err(CoreError::UnknownId(_))));
    }
}
