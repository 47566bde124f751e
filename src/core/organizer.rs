//! Filesystem operations that act on cataloged files: moving them into
//! category folders, deleting them, and copying new files in.
//!
//! These functions only touch the disk. The session applies the returned
//! outcomes to the catalog under its lock.

use super::error::{CoreError, Result};
use super::FileEntry;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// What happened to one entry during [`move_to_category_folders`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    Moved { id: Uuid, to: PathBuf },
    /// The file was already gone; its entry should be dropped.
    Vanished { id: Uuid },
    Failed { name: String, reason: String },
}

impl MoveOutcome {
    pub fn is_moved(&self) -> bool {
        matches!(self, MoveOutcome::Moved { .. })
    }
}

/// Returns `dir/name`, or the first free `dir/stem (n).ext` if taken.
pub fn unique_destination(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }
    let as_path = Path::new(name);
    let stem = as_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());
    let ext = as_path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    (1..)
        .map(|n| dir.join(format!("{stem} ({n}){ext}")))
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

/// Moves every entry's file into `<sort_root>/<category label>`.
///
/// A failure on one file is reported in its outcome and does not stop the
/// rest of the batch.
pub fn move_to_category_folders(entries: &[FileEntry], sort_root: &Path) -> Vec<MoveOutcome> {
    entries
        .iter()
        .map(|entry| {
            if !entry.path.is_file() {
                return MoveOutcome::Vanished { id: entry.id };
            }
            let folder = sort_root.join(entry.category.label());
            match move_one(&entry.path, &folder, &entry.name) {
                Ok(to) => {
                    tracing::debug!("Moved {:?} -> {:?}", entry.path, to);
                    MoveOutcome::Moved { id: entry.id, to }
                }
                Err(e) => {
                    tracing::warn!("Failed to move {:?}: {}", entry.path, e);
                    MoveOutcome::Failed {
                        name: entry.name.clone(),
                        reason: e.to_string(),
                    }
                }
            }
        })
        .collect()
}

fn move_one(from: &Path, folder: &Path, name: &str) -> Result<PathBuf> {
    fs::create_dir_all(folder).map_err(|e| CoreError::Io(e, folder.to_path_buf()))?;
    let to = unique_destination(folder, name);
    if fs::rename(from, &to).is_err() {
        // Crossing filesystems: copy, then drop the source.
        fs::copy(from, &to).map_err(|e| CoreError::Io(e, to.clone()))?;
        fs::remove_file(from).map_err(|e| CoreError::Io(e, from.to_path_buf()))?;
    }
    Ok(to)
}

pub fn delete_file(path: &Path) -> Result<()> {
    fs::remove_file(path).map_err(|e| CoreError::Io(e, path.to_path_buf()))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClearReport {
    pub deleted: usize,
    pub failed: Vec<(String, String)>,
}

/// Deletes the files of `entries` that live inside `root`. Files outside
/// `root` are left alone.
pub fn clear_directory(entries: &[FileEntry], root: &Path) -> ClearReport {
    let mut report = ClearReport::default();
    for entry in entries.iter().filter(|e| e.path.starts_with(root)) {
        match delete_file(&entry.path) {
            Ok(()) => report.deleted += 1,
            Err(CoreError::Io(e, _)) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!("Failed to delete {:?}: {}", entry.path, e);
                report.failed.push((entry.name.clone(), e.to_string()));
            }
        }
    }
    report
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddReport {
    pub copied: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

/// Copies `sources` into `dest_dir` under their own names. A name that is
/// already taken in `dest_dir` is skipped, never overwritten.
pub fn add_files(sources: &[PathBuf], dest_dir: &Path) -> AddReport {
    let mut report = AddReport::default();
    for source in sources {
        let Some(name) = source.file_name() else {
            report
                .failed
                .push((source.clone(), "path has no file name".to_string()));
            continue;
        };
        let dest = dest_dir.join(name);
        if dest.exists() {
            report.skipped.push(source.clone());
            continue;
        }
        match fs::copy(source, &dest) {
            Ok(_) => report.copied.push(dest),
            Err(e) => {
                tracing::warn!("Failed to copy {:?}: {}", source, e);
                report.failed.push((source.clone(), e.to_string()));
            }
        }
    }
    report
}
