//! Background tasks: wires the change source, supervisor, debouncer and
//! reconcile loop together for a session.
//!
//! ```text
//! notify thread -> signals -> pump -> supervisor -> debouncer -> batches -> reconcile
//!                                          \-> status -> session notifications
//! ```
//!
//! Besides the quiet period and the backoff there is one more timed wait:
//! a batch that creates or changes files waits `create_settle` before it
//! is applied, so a file still being written is probed once it is complete.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::commands::{apply_batch, resync};
use super::helpers::with_state_and_notify;
use super::proxy::EventProxy;
use super::Session;
use crate::core::error::Result;
use crate::core::watcher::{
    ChangeSource, NotifySource, SourceSignal, SupervisorEvent, WatchMode,
};
use crate::core::{ChangeKind, Debouncer, PendingEvent, WatcherSupervisor};

/// Handles to a running pipeline. Dropping it leaves the tasks running;
/// call [`Pipeline::shutdown`] to stop them.
pub struct Pipeline {
    pub supervisor: WatcherSupervisor,
    handles: Vec<JoinHandle<()>>,
}

impl Pipeline {
    pub fn shutdown(self) {
        if let Err(e) = self.supervisor.set_enabled(false) {
            tracing::warn!("Failed to disable watcher on shutdown: {}", e);
        }
        for handle in self.handles {
            handle.abort();
        }
        tracing::info!("Pipeline stopped");
    }
}

/// Starts monitoring the session's watched directory with the OS change
/// source.
pub fn spawn_pipeline<P: EventProxy>(session: &Session<P>) -> Result<Pipeline> {
    let dir = session.lock_state().config.desktop_directory.clone();
    let (signal_tx, signal_rx) = mpsc::unbounded_channel();
    let source = NotifySource::new(&dir, signal_tx)?;
    spawn_pipeline_with(session, Box::new(source), signal_rx)
}

/// Starts the pipeline on any change source. `signals` is the channel the
/// source reports into.
pub fn spawn_pipeline_with<P: EventProxy>(
    session: &Session<P>,
    source: Box<dyn ChangeSource>,
    signals: mpsc::UnboundedReceiver<SourceSignal>,
) -> Result<Pipeline> {
    let (quiet, backoff, settle, enabled) = {
        let s = session.lock_state();
        (
            s.config.debounce(),
            s.config.watcher_backoff(),
            s.config.create_settle(),
            s.config.monitoring_enabled,
        )
    };

    let (raw_tx, raw_rx) = mpsc::unbounded_channel();
    let (batch_tx, batch_rx) = mpsc::unbounded_channel();
    let (status_tx, status_rx) = mpsc::unbounded_channel();

    let supervisor = WatcherSupervisor::new(source, raw_tx, status_tx, backoff);
    session.attach_supervisor(supervisor.clone());

    let handles = vec![
        supervisor.spawn_pump(signals),
        Debouncer::new(quiet).spawn(raw_rx, batch_tx),
        spawn_reconcile_loop(session.clone(), batch_rx, settle),
        spawn_status_loop(session.clone(), status_rx),
    ];

    if enabled {
        supervisor.set_enabled(true)?;
    }
    tracing::info!("Pipeline started (quiet period {:?}, backoff {:?})", quiet, backoff);

    Ok(Pipeline {
        supervisor,
        handles,
    })
}

/// Applies batches strictly one after another. A batch containing a
/// creation waits `settle` first so the writer can finish the file.
fn spawn_reconcile_loop<P: EventProxy>(
    session: Session<P>,
    mut batches: mpsc::UnboundedReceiver<Vec<PendingEvent>>,
    settle: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(batch) = batches.recv().await {
            let has_creates = batch
                .iter()
                .any(|e| !matches!(e.kind, ChangeKind::Deleted));
            if has_creates && !settle.is_zero() {
                tokio::time::sleep(settle).await;
            }
            let session = session.clone();
            let applied =
                tokio::task::spawn_blocking(move || apply_batch(&session, &batch)).await;
            if let Err(e) = applied {
                tracing::error!("Reconcile task failed: {}", e);
            }
        }
        tracing::debug!("Batch channel closed, reconcile loop stopping");
    })
}

/// Mirrors supervisor status into the session and resynchronizes after a
/// recovery.
fn spawn_status_loop<P: EventProxy>(
    session: Session<P>,
    mut status: mpsc::UnboundedReceiver<SupervisorEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = status.recv().await {
            let mode = match &event {
                SupervisorEvent::Enabled | SupervisorEvent::Recovered => WatchMode::Enabled,
                SupervisorEvent::Disabled => WatchMode::Disabled,
                SupervisorEvent::Fault(_) => WatchMode::ErrorBackoff,
            };
            with_state_and_notify(&session, |s| s.watch_mode = mode);

            match event {
                SupervisorEvent::Fault(reason) => {
                    session.notify_error(format!("Watcher error: {}. Restarting...", reason));
                }
                SupervisorEvent::Recovered => {
                    session.notify("✓ Monitoring resumed");
                    let session = session.clone();
                    let queued = tokio::task::spawn_blocking(move || resync(&session)).await;
                    match queued {
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => tracing::warn!("Resync after recovery failed: {}", e),
                        Err(e) => tracing::error!("Resync task failed: {}", e),
                    }
                }
                SupervisorEvent::Enabled | SupervisorEvent::Disabled => {}
            }
        }
    })
}
