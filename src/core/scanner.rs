//! One-shot enumeration of the watched directory, and the per-path probe
//! the reconciler uses for created files.

use super::error::{CoreError, Result};
use super::FileEntry;
use crate::utils::file_detection::is_hidden_or_system;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use ignore::WalkBuilder;
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs::Metadata;
use std::path::{Path, PathBuf};

/// What a path looks like on disk right now.
#[derive(Debug)]
pub enum Probe {
    /// The path is gone (or unreadable); nothing to catalog.
    Missing,
    /// The path exists but must not be cataloged (directory, hidden,
    /// system, or matched by an ignore pattern).
    Skipped,
    /// A regular, catalogable file.
    File(Metadata),
}

/// Applies the same filter and classification to a full scan and to single
/// paths reported by the watcher.
pub struct DesktopScanner {
    matcher: Gitignore,
}

impl DesktopScanner {
    pub fn new(root: &Path, ignore_patterns: &HashSet<String>) -> Self {
        let mut builder = GitignoreBuilder::new(root);
        for pattern in ignore_patterns {
            if let Err(e) = builder.add_line(None, pattern) {
                tracing::warn!("Ignoring invalid pattern {:?}: {}", pattern, e);
            }
        }
        let matcher = builder.build().unwrap_or_else(|e| {
            tracing::error!("Failed to build ignore matcher: {}", e);
            Gitignore::empty()
        });
        Self { matcher }
    }

    /// A scanner that filters nothing but hidden/system files.
    pub fn without_patterns() -> Self {
        Self {
            matcher: Gitignore::empty(),
        }
    }

    fn is_ignored(&self, path: &Path) -> bool {
        self.matcher.matched(path, false).is_ignore()
    }

    pub fn probe(&self, path: &Path) -> Probe {
        let metadata = match std::fs::metadata(path) {
            Ok(md) => md,
            Err(_) => return Probe::Missing,
        };
        if !metadata.is_file() || is_hidden_or_system(path, &metadata) || self.is_ignored(path) {
            return Probe::Skipped;
        }
        Probe::File(metadata)
    }

    /// Lists the files directly inside `dir` (no recursion) as fresh
    /// entries, ordered by file name.
    pub fn scan(&self, dir: &Path) -> Result<Vec<FileEntry>> {
        if !dir.is_dir() {
            return Err(CoreError::Io(
                std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
                dir.to_path_buf(),
            ));
        }

        let paths: Vec<PathBuf> = WalkBuilder::new(dir)
            .max_depth(Some(1))
            .standard_filters(false)
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry during scan: {}", e);
                    None
                }
            })
            .filter(|entry| entry.depth() == 1)
            .map(|entry| entry.into_path())
            .collect();

        let entries: Vec<FileEntry> = paths
            .par_iter()
            .filter_map(|path| match self.probe(path) {
                Probe::File(md) => Some(FileEntry::from_metadata(path, &md)),
                Probe::Missing | Probe::Skipped => None,
            })
            .collect();

        tracing::info!("Scanned {:?}: {} files cataloged", dir, entries.len());
        Ok(entries)
    }
}
