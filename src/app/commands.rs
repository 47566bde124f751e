//! Contains the operations a collaborating UI calls on a session.
//!
//! Every catalog, profile or task mutation goes through
//! [`with_state_and_persist`], so it runs under the catalog lock and is
//! followed by one save. Filesystem work (scan, move, delete, copy) runs
//! with the lock released.

use super::events::UserEvent;
use super::helpers::{with_config_and_save, with_state_and_persist};
use super::proxy::EventProxy;
use super::Session;
use crate::core::error::{CoreError, Result};
use crate::core::organizer::{self, MoveOutcome};
use crate::core::reconciler::ReconcileReport;
use crate::core::{profiles, sort, store, PendingEvent, Reconciler};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Enumerates the watched directory and replaces the catalog with the
/// result. Returns the number of files found.
pub async fn scan_desktop<P: EventProxy>(session: &Session<P>) -> Result<usize> {
    let (scanner, dir) = {
        let s = session.lock_state();
        (s.scanner.clone(), s.config.desktop_directory.clone())
    };

    let scanned = tokio::task::spawn_blocking(move || scanner.scan(&dir)).await?;
    let entries = match scanned {
        Ok(entries) => entries,
        Err(e) => {
            tracing::error!("Scan failed: {}", e);
            session.notify_error(format!("Scan failed: {}", e));
            return Err(e);
        }
    };

    let count = with_state_and_persist(session, |s| {
        s.catalog.replace_all(entries);
        Ok(s.catalog.len())
    })?;
    session.notify(format!("✓ Found {} files", count));
    Ok(count)
}

/// Applies one debounced batch. Called by the reconcile task only, one
/// batch at a time.
pub fn apply_batch<P: EventProxy>(session: &Session<P>, batch: &[PendingEvent]) -> ReconcileReport {
    let report = with_state_and_persist(session, |s| {
        let scanner = s.scanner.clone();
        let reconciler = Reconciler::new(&scanner, s.config.auto_sort_on_create);
        Ok(reconciler.reconcile(batch, &mut s.catalog, &mut s.history))
    })
    .unwrap_or_default();

    tracing::debug!(
        "Reconciled {} events: +{} ~{} -{} renamed {}",
        batch.len(),
        report.added.len(),
        report.refreshed,
        report.removed.len(),
        report.renamed.len()
    );
    for message in report.messages() {
        session.notify(message);
    }
    report
}

/// Feeds one change notification from the OS source into the supervisor.
/// Dropped when monitoring is not running.
pub fn on_external_change<P: EventProxy>(session: &Session<P>, event: PendingEvent) {
    match session.supervisor() {
        Some(supervisor) => supervisor.on_external_change(event),
        None => tracing::trace!("No watcher attached, dropping {:?}", event),
    }
}

/// Queues a catalog/disk diff through the watcher, so it is reconciled like
/// any other batch. Used after the change source recovered from a fault,
/// when notifications may have been lost.
pub fn resync<P: EventProxy>(session: &Session<P>) -> Result<usize> {
    let (scanner, dir, known) = {
        let s = session.lock_state();
        let known: Vec<PathBuf> = s.catalog.entries().iter().map(|e| e.path.clone()).collect();
        (s.scanner.clone(), s.config.desktop_directory.clone(), known)
    };
    let on_disk = scanner.scan(&dir)?;
    let on_disk_paths: HashSet<&Path> = on_disk.iter().map(|e| e.path.as_path()).collect();

    let events: Vec<PendingEvent> = known
        .iter()
        .filter(|p| p.starts_with(&dir) && !on_disk_paths.contains(p.as_path()))
        .map(PendingEvent::deleted)
        .chain(on_disk.iter().map(|e| PendingEvent::created(&e.path)))
        .collect();

    let count = events.len();
    for event in events {
        on_external_change(session, event);
    }
    tracing::info!("Resync queued {} events", count);
    Ok(count)
}

pub fn sort_files<P: EventProxy>(session: &Session<P>) -> Result<()> {
    with_state_and_persist(session, |s| {
        sort::sort_catalog(&mut s.catalog, &mut s.history);
        Ok(())
    })?;
    session.notify("✓ Files sorted");
    Ok(())
}

pub fn undo_sort<P: EventProxy>(session: &Session<P>) -> Result<()> {
    with_state_and_persist(session, |s| sort::undo(&mut s.catalog, &mut s.history))?;
    session.notify("✓ Sort undone");
    Ok(())
}

/// Saves the current catalog as a new profile and returns its id.
pub fn create_profile<P: EventProxy>(
    session: &Session<P>,
    name: &str,
    description: &str,
) -> Result<Uuid> {
    let (id, name) = with_state_and_persist(session, |s| {
        let snapshot = s.catalog.snapshot();
        let profile = s.profiles.create(name, description, snapshot)?;
        Ok((profile.id, profile.name.clone()))
    })?;
    session.notify(format!("✓ Profile created: {}", name));
    Ok(id)
}

/// Replaces the catalog with the profile's files that still exist. Returns
/// how many were kept.
pub fn apply_profile<P: EventProxy>(session: &Session<P>, id: Uuid) -> Result<usize> {
    let (kept, name) = with_state_and_persist(session, |s| {
        let profile = s.profiles.get(id).cloned().ok_or(CoreError::UnknownId(id))?;
        Ok((profiles::apply(&profile, &mut s.catalog), profile.name))
    })?;
    session.notify(format!("✓ Profile applied: {}", name));
    Ok(kept)
}

pub fn edit_profile<P: EventProxy>(
    session: &Session<P>,
    id: Uuid,
    name: Option<&str>,
    description: Option<&str>,
) -> Result<()> {
    let name = with_state_and_persist(session, |s| {
        Ok(s.profiles.edit(id, name, description)?.name.clone())
    })?;
    session.notify(format!("✓ Profile updated: {}", name));
    Ok(())
}

pub fn delete_profile<P: EventProxy>(session: &Session<P>, id: Uuid) -> Result<()> {
    let removed = with_state_and_persist(session, |s| s.profiles.delete(id))?;
    session.notify(format!("✓ Profile deleted: {}", removed.name));
    Ok(())
}

pub fn export_state<P: EventProxy>(session: &Session<P>, path: &Path) -> Result<()> {
    let snapshot = session.lock_state().persisted();
    match store::export_to(path, &snapshot) {
        Ok(()) => {
            session.notify("✓ Data exported");
            Ok(())
        }
        Err(e) => {
            session.notify_error(e.to_string());
            Err(e)
        }
    }
}

/// Replaces the catalog, profile list and task list with the content of
/// `path`.
pub fn import_state<P: EventProxy>(session: &Session<P>, path: &Path) -> Result<()> {
    let imported = match store::import_from(path) {
        Ok(state) => state,
        Err(e) => {
            session.notify_error(e.to_string());
            return Err(e);
        }
    };
    with_state_and_persist(session, |s| {
        s.catalog.replace_all(imported.files);
        s.profiles.replace_all(imported.profiles);
        s.tasks.replace_all(imported.tasks);
        Ok(())
    })?;
    session.notify("✓ Data imported");
    Ok(())
}

/// Deletes the file from disk and drops its entry.
pub fn delete_file<P: EventProxy>(session: &Session<P>, id: Uuid) -> Result<()> {
    let path = session.lock_state().catalog.get_by_id(id).map(|e| e.path.clone());
    let Some(path) = path else {
        let e = CoreError::UnknownId(id);
        session.notify_error(e.to_string());
        return Err(e);
    };

    if let Err(e) = organizer::delete_file(&path) {
        session.notify_error(format!("Error: {}", e));
        return Err(e);
    }

    let removed = with_state_and_persist(session, |s| Ok(s.catalog.remove_by_id(id)))?;
    if let Some(entry) = removed {
        session.notify(format!("✓ Deleted: {}", entry.name));
    }
    Ok(())
}

/// Deletes every cataloged file inside the watched directory and empties
/// the catalog. Returns the number of files deleted.
pub fn clear_desktop<P: EventProxy>(session: &Session<P>) -> Result<usize> {
    let (entries, root) = {
        let s = session.lock_state();
        (s.catalog.snapshot(), s.config.desktop_directory.clone())
    };
    if entries.is_empty() {
        return Ok(0);
    }

    let report = organizer::clear_directory(&entries, &root);
    for (name, reason) in &report.failed {
        tracing::warn!("Could not delete {}: {}", name, reason);
    }
    with_state_and_persist(session, |s| {
        s.catalog.clear();
        Ok(())
    })?;
    session.notify("✓ Desktop cleared");
    Ok(report.deleted)
}

/// Moves every cataloged file into a folder named after its category under
/// the configured sort directory. Returns the number of files moved.
pub fn move_to_category_folders<P: EventProxy>(session: &Session<P>) -> Result<usize> {
    let (entries, sort_root) = {
        let s = session.lock_state();
        (s.catalog.snapshot(), s.config.sort_directory.clone())
    };
    if entries.is_empty() {
        session.notify_error("No files to move");
        return Ok(0);
    }

    let outcomes = organizer::move_to_category_folders(&entries, &sort_root);
    let moved = outcomes.iter().filter(|o| o.is_moved()).count();

    with_state_and_persist(session, |s| {
        for outcome in &outcomes {
            match outcome {
                MoveOutcome::Moved { id, to } => {
                    let Some(from) = s.catalog.get_by_id(*id).map(|e| e.path.clone()) else {
                        continue;
                    };
                    if let Err(e) = s.catalog.update_by_path(&from, |e| e.relocate(to)) {
                        tracing::warn!("Could not update moved entry: {}", e);
                    }
                }
                MoveOutcome::Vanished { id } => {
                    s.catalog.remove_by_id(*id);
                }
                MoveOutcome::Failed { .. } => {}
            }
        }
        Ok(())
    })?;

    for outcome in &outcomes {
        if let MoveOutcome::Failed { name, reason } = outcome {
            session.notify_error(format!("Error moving {}: {}", name, reason));
        }
    }
    session.notify(format!(
        "✓ Moved {} files to {}",
        moved,
        sort_root.display()
    ));
    Ok(moved)
}

/// Copies files into the watched directory. Their entries arrive through
/// the watcher like any other new file. Returns the copied destinations.
pub fn add_files<P: EventProxy>(session: &Session<P>, sources: &[PathBuf]) -> Vec<PathBuf> {
    let dir = session.lock_state().config.desktop_directory.clone();
    let report = organizer::add_files(sources, &dir);
    for (source, reason) in &report.failed {
        session.notify_error(format!("Error adding {}: {}", source.display(), reason));
    }
    if !report.skipped.is_empty() {
        tracing::info!("Skipped {} files that already exist", report.skipped.len());
    }
    report.copied
}

/// Turns monitoring on or off. Without an attached watcher only the
/// configured preference changes.
pub fn set_monitoring<P: EventProxy>(session: &Session<P>, enabled: bool) -> Result<()> {
    if let Some(supervisor) = session.supervisor() {
        if let Err(e) = supervisor.set_enabled(enabled) {
            session.notify_error(e.to_string());
            return Err(e);
        }
    }
    with_config_and_save(session, |s| {
        s.config.monitoring_enabled = enabled;
    });
    session.notify(if enabled {
        "✓ Monitoring enabled"
    } else {
        "Monitoring disabled"
    });
    Ok(())
}

pub fn set_auto_sort<P: EventProxy>(session: &Session<P>, enabled: bool) {
    with_config_and_save(session, |s| {
        s.config.auto_sort_on_create = enabled;
    });
    tracing::info!("Auto-sort on create: {}", enabled);
}

/// Changes where [`move_to_category_folders`] puts files. The folder is
/// created on the next move.
pub fn set_sort_directory<P: EventProxy>(session: &Session<P>, dir: &Path) {
    with_config_and_save(session, |s| {
        s.config.sort_directory = dir.to_path_buf();
    });
    tracing::info!("Sort directory set to {:?}", dir);
    session.notify(format!("✓ Sort folder: {}", dir.display()));
}

/// Replaces the ignore patterns. They apply to the next scan and to every
/// change reconciled from now on.
pub fn set_ignore_patterns<P: EventProxy>(session: &Session<P>, patterns: &[&str]) {
    with_config_and_save(session, |s| {
        s.config.ignore_patterns = patterns.iter().map(|p| p.to_string()).collect();
        s.rebuild_scanner();
    });
    tracing::info!("Ignore patterns set to {:?}", patterns);
}

pub fn add_task<P: EventProxy>(session: &Session<P>, text: &str) -> Result<Uuid> {
    with_state_and_persist(session, |s| Ok(s.tasks.add(text)?.id))
}

pub fn set_task_completed<P: EventProxy>(
    session: &Session<P>,
    id: Uuid,
    completed: bool,
) -> Result<()> {
    with_state_and_persist(session, |s| s.tasks.set_completed(id, completed))
}

pub fn delete_task<P: EventProxy>(session: &Session<P>, id: Uuid) -> Result<()> {
    with_state_and_persist(session, |s| s.tasks.remove(id).map(|_| ()))
}

pub fn load_notes<P: EventProxy>(session: &Session<P>) -> String {
    session.store().load_notes().unwrap_or_else(|e| {
        tracing::warn!("Failed to load notes: {}", e);
        String::new()
    })
}

pub fn save_notes<P: EventProxy>(session: &Session<P>, text: &str) -> Result<()> {
    session.store().save_notes(text).inspect_err(|e| {
        tracing::error!("Failed to save notes: {}", e);
        session
            .proxy()
            .send_event(UserEvent::error(format!("Failed to save notes: {}", e)));
    })
}
