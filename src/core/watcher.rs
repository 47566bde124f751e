//! Supervises the OS change subscription for the watched directory.
//!
//! The supervisor is in one of three modes:
//!
//! - `Disabled`: no subscription; notifications are dropped.
//! - `Enabled`: subscribed; every notification is forwarded to the debouncer.
//! - `ErrorBackoff`: the source overflowed or failed. The subscription is
//!   dropped, and after a fixed delay it is re-established if monitoring is
//!   still wanted. Notifications are dropped meanwhile.
//!
//! `notify` delivers events on its own thread. They are bridged into a
//! tokio channel as [`SourceSignal`]s and pumped into the supervisor, so
//! the OS callback never touches supervisor state directly. The pump owns
//! the [`EventNormalizer`] and its rename timer.

use super::error::{CoreError, Result};
use super::PendingEvent;
use notify::event::{Flag, ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WatchMode {
    Disabled,
    Enabled,
    ErrorBackoff,
}

/// A signal from the change source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSignal {
    Change(PendingEvent),
    Fault(String),
    /// An event straight from `notify`, normalized by the pump.
    Raw(notify::Event),
}

/// Status changes the supervisor reports to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorEvent {
    Enabled,
    Disabled,
    Fault(String),
    Recovered,
}

/// The OS-level subscription the supervisor switches on and off.
pub trait ChangeSource: Send {
    fn subscribe(&mut self) -> Result<()>;
    fn unsubscribe(&mut self);
}

struct Inner {
    mode: WatchMode,
    desired: bool,
    source: Box<dyn ChangeSource>,
    forward: mpsc::UnboundedSender<PendingEvent>,
    status: mpsc::UnboundedSender<SupervisorEvent>,
    backoff_cycles: u64,
}

#[derive(Clone)]
pub struct WatcherSupervisor {
    inner: Arc<Mutex<Inner>>,
    backoff: Duration,
}

impl std::fmt::Debug for WatcherSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherSupervisor")
            .field("mode", &self.mode())
            .field("backoff", &self.backoff)
            .finish()
    }
}

impl WatcherSupervisor {
    /// Creates a supervisor in `Disabled` mode.
    pub fn new(
        source: Box<dyn ChangeSource>,
        forward: mpsc::UnboundedSender<PendingEvent>,
        status: mpsc::UnboundedSender<SupervisorEvent>,
        backoff: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                mode: WatchMode::Disabled,
                desired: false,
                source,
                forward,
                status,
                backoff_cycles: 0,
            })),
            backoff,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .expect("Mutex was poisoned. This should not happen.")
    }

    pub fn mode(&self) -> WatchMode {
        self.lock().mode
    }

    pub fn backoff_cycles(&self) -> u64 {
        self.lock().backoff_cycles
    }

    /// Switches monitoring on or off on behalf of the user.
    ///
    /// During a backoff only the desired mode changes; the pending recovery
    /// honours it.
    pub fn set_enabled(&self, enabled: bool) -> Result<()> {
        let mut inner = self.lock();
        inner.desired = enabled;
        match (inner.mode, enabled) {
            (WatchMode::Disabled, true) => {
                inner.source.subscribe()?;
                inner.mode = WatchMode::Enabled;
                let _ = inner.status.send(SupervisorEvent::Enabled);
                tracing::info!("Monitoring enabled");
            }
            (WatchMode::Enabled, false) => {
                inner.source.unsubscribe();
                inner.mode = WatchMode::Disabled;
                let _ = inner.status.send(SupervisorEvent::Disabled);
                tracing::info!("Monitoring disabled");
            }
            (WatchMode::ErrorBackoff, _) => {
                tracing::debug!("Desired monitoring set to {} during backoff", enabled);
            }
            _ => {}
        }
        Ok(())
    }

    /// Feed from the OS change source. Dropped unless `Enabled`.
    pub fn on_external_change(&self, event: PendingEvent) {
        let inner = self.lock();
        if inner.mode != WatchMode::Enabled {
            tracing::trace!("Dropping {:?} while {:?}", event, inner.mode);
            return;
        }
        if inner.forward.send(event).is_err() {
            tracing::debug!("Debouncer is gone, dropping change");
        }
    }

    /// Enters `ErrorBackoff` and schedules a recovery. Faults while already
    /// backing off (or disabled) are absorbed. Must be called inside a
    /// tokio runtime.
    pub fn on_fault(&self, reason: &str) {
        {
            let mut inner = self.lock();
            if inner.mode != WatchMode::Enabled {
                tracing::debug!("Ignoring fault while {:?}: {}", inner.mode, reason);
                return;
            }
            tracing::error!("{}", CoreError::WatcherFault(reason.to_string()));
            inner.mode = WatchMode::ErrorBackoff;
            inner.backoff_cycles += 1;
            inner.source.unsubscribe();
            let _ = inner.status.send(SupervisorEvent::Fault(reason.to_string()));
        }
        self.schedule_recovery();
    }

    fn schedule_recovery(&self) {
        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(this.backoff).await;
            this.recover();
        });
    }

    fn recover(&self) {
        let mut inner = self.lock();
        if inner.mode != WatchMode::ErrorBackoff {
            return;
        }
        if !inner.desired {
            inner.mode = WatchMode::Disabled;
            let _ = inner.status.send(SupervisorEvent::Disabled);
            tracing::info!("Monitoring stays disabled after backoff");
            return;
        }
        match inner.source.subscribe() {
            Ok(()) => {
                inner.mode = WatchMode::Enabled;
                let _ = inner.status.send(SupervisorEvent::Recovered);
                tracing::info!("Monitoring resumed after backoff");
            }
            Err(e) => {
                tracing::warn!("Resubscribe failed, backing off again: {}", e);
                inner.backoff_cycles += 1;
                drop(inner);
                self.schedule_recovery();
            }
        }
    }

    /// Dispatches one signal. A raw notify event is normalized on its own,
    /// so a lone rename source counts as a deletion; [`Self::spawn_pump`]
    /// joins split renames across events.
    pub fn handle_signal(&self, signal: SourceSignal) {
        match signal {
            SourceSignal::Change(event) => self.on_external_change(event),
            SourceSignal::Fault(reason) => self.on_fault(&reason),
            SourceSignal::Raw(event) => {
                let mut normalizer = EventNormalizer::default();
                let mut out = normalizer.push(event, Instant::now());
                out.extend(normalizer.flush_all());
                for signal in out {
                    self.handle_signal(signal);
                }
            }
        }
    }

    /// Pumps bridged source signals into the supervisor until the channel
    /// closes. A rename source that gets no matching target within
    /// [`EventNormalizer::MAX_AGE`] is reported as a deletion.
    pub fn spawn_pump(&self, mut signals: mpsc::UnboundedReceiver<SourceSignal>) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let mut normalizer = EventNormalizer::default();
            loop {
                let next = match normalizer.next_deadline() {
                    Some(deadline) => {
                        match tokio::time::timeout_at(deadline, signals.recv()).await {
                            Ok(next) => next,
                            Err(_) => {
                                this.dispatch(normalizer.flush(Instant::now()));
                                continue;
                            }
                        }
                    }
                    None => signals.recv().await,
                };
                let Some(signal) = next else { break };
                this.dispatch(normalizer.accept(signal, Instant::now()));
            }
            this.dispatch(normalizer.flush_all());
            tracing::debug!("Change source closed, supervisor pump stopping");
        })
    }

    fn dispatch(&self, signals: Vec<SourceSignal>) {
        for signal in signals {
            self.handle_signal(signal);
        }
    }
}

/// Turns `notify` events into [`SourceSignal`]s.
///
/// Some backends report a rename as a `From` event followed by a `To`
/// event; the pair is joined into one rename. A `From` whose `To` never
/// arrives (the file left the watched directory) is reported as a deletion
/// once it is older than [`Self::MAX_AGE`].
#[derive(Debug, Default)]
pub struct EventNormalizer {
    pending_from: VecDeque<(Instant, PathBuf)>,
}

impl EventNormalizer {
    pub const MAX_AGE: Duration = Duration::from_millis(100);
    const MAX_PENDING: usize = 256;

    /// Normalizes a signal from the source. Already normalized signals pass
    /// through after any expired rename sources.
    pub fn accept(&mut self, signal: SourceSignal, now: Instant) -> Vec<SourceSignal> {
        match signal {
            SourceSignal::Raw(event) => self.push(event, now),
            other => {
                let mut out = self.flush(now);
                out.push(other);
                out
            }
        }
    }

    pub fn push(&mut self, event: notify::Event, now: Instant) -> Vec<SourceSignal> {
        if requests_rescan(&event) {
            let mut out = self.flush_all();
            out.push(SourceSignal::Fault(
                "change notifications overflowed".to_string(),
            ));
            return out;
        }

        let mut out = self.flush(now);
        match event.kind {
            EventKind::Create(_)
            | EventKind::Modify(ModifyKind::Data(_))
            | EventKind::Modify(ModifyKind::Metadata(_))
            | EventKind::Modify(ModifyKind::Any)
            | EventKind::Modify(ModifyKind::Other) => out.extend(
                event
                    .paths
                    .into_iter()
                    .map(|p| SourceSignal::Change(PendingEvent::created(p))),
            ),
            EventKind::Remove(_) => out.extend(
                event
                    .paths
                    .into_iter()
                    .map(|p| SourceSignal::Change(PendingEvent::deleted(p))),
            ),
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                let mut paths = event.paths.into_iter();
                while let Some(from) = paths.next() {
                    let signal = match paths.next() {
                        Some(to) => PendingEvent::renamed(from, to),
                        None => PendingEvent::created(from),
                    };
                    out.push(SourceSignal::Change(signal));
                }
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
                self.pending_from
                    .extend(event.paths.into_iter().map(|p| (now, p)));
                while self.pending_from.len() > Self::MAX_PENDING {
                    if let Some((_, from)) = self.pending_from.pop_front() {
                        out.push(SourceSignal::Change(PendingEvent::deleted(from)));
                    }
                }
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                for to in event.paths {
                    let signal = match self.pending_from.pop_front() {
                        Some((_, from)) => PendingEvent::renamed(from, to),
                        None => PendingEvent::created(to),
                    };
                    out.push(SourceSignal::Change(signal));
                }
            }
            EventKind::Modify(ModifyKind::Name(_)) => {
                // Unknown rename flavour: let the reconciler look at the disk.
                out.extend(event.paths.into_iter().map(|p| {
                    let event = if p.exists() {
                        PendingEvent::created(p)
                    } else {
                        PendingEvent::deleted(p)
                    };
                    SourceSignal::Change(event)
                }))
            }
            EventKind::Access(_) | EventKind::Any | EventKind::Other => {}
        }
        out
    }

    /// When the oldest pending rename source expires, if there is one.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending_from.front().map(|(t, _)| *t + Self::MAX_AGE)
    }

    /// Reports rename sources older than [`Self::MAX_AGE`] as deletions.
    pub fn flush(&mut self, now: Instant) -> Vec<SourceSignal> {
        let mut out = Vec::new();
        while let Some((t, _)) = self.pending_from.front() {
            if now.saturating_duration_since(*t) < Self::MAX_AGE {
                break;
            }
            if let Some((_, from)) = self.pending_from.pop_front() {
                out.push(SourceSignal::Change(PendingEvent::deleted(from)));
            }
        }
        out
    }

    /// Reports every pending rename source as a deletion.
    pub fn flush_all(&mut self) -> Vec<SourceSignal> {
        self.pending_from
            .drain(..)
            .map(|(_, from)| SourceSignal::Change(PendingEvent::deleted(from)))
            .collect()
    }
}

fn requests_rescan(event: &notify::Event) -> bool {
    matches!(event.attrs.flag(), Some(Flag::Rescan))
        || (matches!(event.kind, EventKind::Other) && event.paths.is_empty())
}

/// The production [`ChangeSource`], a non-recursive `notify` watch on one
/// directory.
pub struct NotifySource {
    watcher: RecommendedWatcher,
    dir: PathBuf,
    active: bool,
}

impl NotifySource {
    pub fn new(dir: &Path, signals: mpsc::UnboundedSender<SourceSignal>) -> Result<Self> {
        let watcher = notify::recommended_watcher(
            move |res: std::result::Result<notify::Event, notify::Error>| {
                let signal = match res {
                    Ok(event) => SourceSignal::Raw(event),
                    Err(e) => SourceSignal::Fault(e.to_string()),
                };
                let _ = signals.send(signal);
            },
        )
        .map_err(|e| CoreError::WatcherFault(format!("failed to create watcher: {e}")))?;

        Ok(Self {
            watcher,
            dir: dir.to_path_buf(),
            active: false,
        })
    }
}

impl ChangeSource for NotifySource {
    fn subscribe(&mut self) -> Result<()> {
        if self.active {
            return Ok(());
        }
        self.watcher
            .watch(&self.dir, RecursiveMode::NonRecursive)
            .map_err(|e| CoreError::WatcherFault(format!("failed to watch {:?}: {e}", self.dir)))?;
        self.active = true;
        Ok(())
    }

    fn unsubscribe(&mut self) {
        if !self.active {
            return;
        }
        if let Err(e) = self.watcher.unwatch(&self.dir) {
            tracing::warn!("Failed to unwatch {:?}: {}", self.dir, e);
        }
        self.active = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, EventAttributes, RemoveKind};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts subscriptions and fails loudly on a duplicate subscribe.
    #[derive(Clone, Default)]
    struct FakeSource {
        subscribes: Arc<AtomicUsize>,
        active: Arc<AtomicUsize>,
    }

    impl ChangeSource for FakeSource {
        fn subscribe(&mut self) -> Result<()> {
            assert_eq!(self.active.load(Ordering::SeqCst), 0, "duplicate subscription");
            self.subscribes.fetch_add(1, Ordering::SeqCst);
            self.active.store(1, Ordering::SeqCst);
            Ok(())
        }

        fn unsubscribe(&mut self) {
            self.active.store(0, Ordering::SeqCst);
        }
    }

    struct Harness {
        supervisor: WatcherSupervisor,
        source: FakeSource,
        forwarded: mpsc::UnboundedReceiver<PendingEvent>,
        status: mpsc::UnboundedReceiver<SupervisorEvent>,
    }

    fn harness() -> Harness {
        let source = FakeSource::default();
        let (fwd_tx, forwarded) = mpsc::unbounded_channel();
        let (status_tx, status) = mpsc::unbounded_channel();
        let supervisor = WatcherSupervisor::new(
            Box::new(source.clone()),
            fwd_tx,
            status_tx,
            Duration::from_millis(500),
        );
        Harness {
            supervisor,
            source,
            forwarded,
            status,
        }
    }

    fn event(kind: EventKind, paths: &[&str]) -> notify::Event {
        notify::Event {
            kind,
            paths: paths.iter().map(PathBuf::from).collect(),
            attrs: EventAttributes::new(),
        }
    }

    #[tokio::test]
    async fn test_forwards_only_while_enabled() {
        let mut h = harness();
        h.supervisor.on_external_change(PendingEvent::created("/d/early"));
        h.supervisor.set_enabled(true).unwrap();
        h.supervisor.on_external_change(PendingEvent::created("/d/a"));
        h.supervisor.set_enabled(false).unwrap();
        h.supervisor.on_external_change(PendingEvent::created("/d/late"));

        assert_eq!(h.forwarded.try_recv().unwrap(), PendingEvent::created("/d/a"));
        assert!(h.forwarded.try_recv().is_err());
        assert_eq!(h.status.try_recv().unwrap(), SupervisorEvent::Enabled);
        assert_eq!(h.status.try_recv().unwrap(), SupervisorEvent::Disabled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fault_runs_one_backoff_cycle_then_recovers() {
        let mut h = harness();
        h.supervisor.set_enabled(true).unwrap();
        h.supervisor.on_fault("overflow");
        h.supervisor.on_fault("overflow again");
        assert_eq!(h.supervisor.mode(), WatchMode::ErrorBackoff);

        h.supervisor.on_external_change(PendingEvent::created("/d/dropped"));
        assert!(h.forwarded.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(h.supervisor.mode(), WatchMode::Enabled);
        assert_eq!(h.supervisor.backoff_cycles(), 1);
        assert_eq!(h.source.subscribes.load(Ordering::SeqCst), 2);
        assert_eq!(h.source.active.load(Ordering::SeqCst), 1);

        let events: Vec<_> = std::iter::from_fn(|| h.status.try_recv().ok()).collect();
        assert_eq!(
            events,
            vec![
                SupervisorEvent::Enabled,
                SupervisorEvent::Fault("overflow".into()),
                SupervisorEvent::Recovered,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_disable_during_backoff_stays_disabled() {
        let h = harness();
        h.supervisor.set_enabled(true).unwrap();
        h.supervisor.on_fault("driver error");
        h.supervisor.set_enabled(false).unwrap();
        assert_eq!(h.supervisor.mode(), WatchMode::ErrorBackoff);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(h.supervisor.mode(), WatchMode::Disabled);
        assert_eq!(h.source.subscribes.load(Ordering::SeqCst), 1);
        assert_eq!(h.source.active.load(Ordering::SeqCst), 0);

        h.supervisor.set_enabled(true).unwrap();
        assert_eq!(h.supervisor.mode(), WatchMode::Enabled);
    }

    #[tokio::test]
    async fn test_fault_while_disabled_is_ignored() {
        let h = harness();
        h.supervisor.on_fault("spurious");
        assert_eq!(h.supervisor.mode(), WatchMode::Disabled);
        assert_eq!(h.supervisor.backoff_cycles(), 0);
    }

    #[tokio::test]
    async fn test_pump_routes_signals() {
        let mut h = harness();
        h.supervisor.set_enabled(true).unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let pump = h.supervisor.spawn_pump(rx);

        tx.send(SourceSignal::Change(PendingEvent::deleted("/d/x"))).unwrap();
        drop(tx);
        pump.await.unwrap();
        assert_eq!(h.forwarded.try_recv().unwrap(), PendingEvent::deleted("/d/x"));
    }

    #[test]
    fn test_normalizer_maps_basic_kinds() {
        let mut n = EventNormalizer::default();
        let now = Instant::now();
        assert_eq!(
            n.push(event(EventKind::Create(CreateKind::File), &["/d/a"]), now),
            vec![SourceSignal::Change(PendingEvent::created("/d/a"))]
        );
        assert_eq!(
            n.push(event(EventKind::Remove(RemoveKind::File), &["/d/a"]), now),
            vec![SourceSignal::Change(PendingEvent::deleted("/d/a"))]
        );
        assert_eq!(
            n.push(
                event(
                    EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
                    &["/d/a", "/d/b"]
                ),
                now
            ),
            vec![SourceSignal::Change(PendingEvent::renamed("/d/a", "/d/b"))]
        );
        assert!(n
            .push(event(EventKind::Access(notify::event::AccessKind::Any), &["/d/a"]), now)
            .is_empty());
    }

    #[test]
    fn test_normalizer_pairs_split_renames() {
        let mut n = EventNormalizer::default();
        let now = Instant::now();
        assert!(n
            .push(event(EventKind::Modify(ModifyKind::Name(RenameMode::From)), &["/d/old"]), now)
            .is_empty());
        assert_eq!(n.next_deadline(), Some(now + EventNormalizer::MAX_AGE));
        assert_eq!(
            n.push(
                event(EventKind::Modify(ModifyKind::Name(RenameMode::To)), &["/d/new"]),
                now + Duration::from_millis(10)
            ),
            vec![SourceSignal::Change(PendingEvent::renamed("/d/old", "/d/new"))]
        );
        assert_eq!(n.next_deadline(), None);
    }

    #[test]
    fn test_normalizer_expires_unmatched_rename_source() {
        let mut n = EventNormalizer::default();
        let now = Instant::now();
        n.push(event(EventKind::Modify(ModifyKind::Name(RenameMode::From)), &["/d/gone"]), now);

        assert!(n.flush(now + Duration::from_millis(50)).is_empty());
        assert_eq!(
            n.push(
                event(EventKind::Create(CreateKind::File), &["/d/c"]),
                now + EventNormalizer::MAX_AGE
            ),
            vec![
                SourceSignal::Change(PendingEvent::deleted("/d/gone")),
                SourceSignal::Change(PendingEvent::created("/d/c")),
            ]
        );
        assert!(n.flush_all().is_empty());
    }

    #[test]
    fn test_normalizer_reports_overflow_as_fault() {
        let mut n = EventNormalizer::default();
        let now = Instant::now();
        n.push(event(EventKind::Modify(ModifyKind::Name(RenameMode::From)), &["/d/x"]), now);
        let overflow = notify::Event::new(EventKind::Other).set_flag(Flag::Rescan);
        assert_eq!(
            n.push(overflow, now),
            vec![
                SourceSignal::Change(PendingEvent::deleted("/d/x")),
                SourceSignal::Fault("change notifications overflowed".into()),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_pump_reports_moved_out_file_as_deleted() {
        let mut h = harness();
        h.supervisor.set_enabled(true).unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let _pump = h.supervisor.spawn_pump(rx);

        tx.send(SourceSignal::Raw(event(
            EventKind::Modify(ModifyKind::Name(RenameMode::From)),
            &["/d/leaving.txt"],
        )))
        .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(h.forwarded.try_recv().is_err());

        tokio::time::sleep(EventNormalizer::MAX_AGE).await;
        assert_eq!(
            h.forwarded.try_recv().unwrap(),
            PendingEvent::deleted("/d/leaving.txt")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_pump_joins_rename_pair() {
        let mut h = harness();
        h.supervisor.set_enabled(true).unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let pump = h.supervisor.spawn_pump(rx);

        tx.send(SourceSignal::Raw(event(
            EventKind::Modify(ModifyKind::Name(RenameMode::From)),
            &["/d/a.txt"],
        )))
        .unwrap();
        tx.send(SourceSignal::Raw(event(
            EventKind::Modify(ModifyKind::Name(RenameMode::To)),
            &["/d/b.txt"],
        )))
        .unwrap();
        drop(tx);
        pump.await.unwrap();

        assert_eq!(
            h.forwarded.try_recv().unwrap(),
            PendingEvent::renamed("/d/a.txt", "/d/b.txt")
        );
        assert!(h.forwarded.try_recv().is_err());
    }
}
