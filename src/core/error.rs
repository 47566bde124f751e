//! Defines the custom error type for the `core` module.

use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// The primary error type for the `core` module.
///
/// None of these variants is fatal to the process: callers either absorb
/// them, log them, or surface them as a one-line notification.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An operation referenced a path that is not in the catalog.
    #[error("No catalog entry for path {0}")]
    NotFound(PathBuf),

    /// An operation referenced an id (file, profile or task) that is not known.
    #[error("No item with id {0}")]
    UnknownId(Uuid),

    /// An insert collided with an entry that already owns the path.
    #[error("Path is already cataloged: {0}")]
    DuplicatePath(PathBuf),

    /// `undo` was requested with an empty sort history.
    #[error("Nothing to undo")]
    NothingToUndo,

    /// A profile or task was created with a blank name/text.
    #[error("Name must not be empty")]
    EmptyName,

    /// The persisted state could not be read or parsed.
    #[error("Failed to read state from {path}: {reason}")]
    PersistenceRead { path: PathBuf, reason: String },

    /// The persisted state could not be written.
    #[error("Failed to write state to {path}: {reason}")]
    PersistenceWrite { path: PathBuf, reason: String },

    /// The OS change source overflowed or reported a driver error.
    #[error("Watcher fault: {0}")]
    WatcherFault(String),

    /// Represents an I/O error, typically from file system operations.
    #[error("I/O error for path {1}: {0}")]
    Io(#[source] std::io::Error, PathBuf),

    /// Represents an error that occurred when a Tokio task was joined.
    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
