//! Collapses bursts of raw change notifications into ordered batches.
//!
//! The debouncer is a two-state machine:
//!
//! - `Idle`: the buffer is empty and no timer is armed.
//! - `Pending`: at least one event is buffered and the quiet-period
//!   deadline is armed. Every new event restarts the deadline, so a burst
//!   keeps extending the window until traffic stops.
//!
//! When the deadline passes, the whole buffer is flushed as one batch in
//! arrival order and the machine returns to `Idle`.

use super::PendingEvent;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    Idle,
    Pending { deadline: Instant },
}

#[derive(Debug)]
pub struct Debouncer {
    quiet_period: Duration,
    state: DebounceState,
    buffer: Vec<PendingEvent>,
}

impl Debouncer {
    pub fn new(quiet_period: Duration) -> Self {
        Self {
            quiet_period,
            state: DebounceState::Idle,
            buffer: Vec::new(),
        }
    }

    pub fn state(&self) -> DebounceState {
        self.state
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Buffers an event and (re)arms the quiet-period deadline.
    pub fn push(&mut self, event: PendingEvent, now: Instant) {
        self.buffer.push(event);
        self.state = DebounceState::Pending {
            deadline: now + self.quiet_period,
        };
    }

    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            DebounceState::Idle => None,
            DebounceState::Pending { deadline } => Some(deadline),
        }
    }

    /// Returns the buffered batch if the deadline has passed.
    pub fn poll_expired(&mut self, now: Instant) -> Option<Vec<PendingEvent>> {
        match self.state {
            DebounceState::Pending { deadline } if now >= deadline => Some(self.take()),
            _ => None,
        }
    }

    /// Flushes whatever is buffered regardless of the deadline.
    pub fn take(&mut self) -> Vec<PendingEvent> {
        self.state = DebounceState::Idle;
        std::mem::take(&mut self.buffer)
    }

    /// Runs the machine as a task: reads raw events from `events`, sends
    /// flushed batches to `batches`. On shutdown of the input channel any
    /// buffered events are flushed immediately.
    pub fn spawn(
        self,
        events: mpsc::UnboundedReceiver<PendingEvent>,
        batches: mpsc::UnboundedSender<Vec<PendingEvent>>,
    ) -> JoinHandle<()> {
        tokio::spawn(self.run(events, batches))
    }

    async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<PendingEvent>,
        batches: mpsc::UnboundedSender<Vec<PendingEvent>>,
    ) {
        loop {
            let deadline = self.deadline();
            tokio::select! {
                received = events.recv() => match received {
                    Some(event) => {
                        tracing::trace!("Buffered {:?}", event);
                        self.push(event, Instant::now());
                    }
                    None => {
                        let rest = self.take();
                        if !rest.is_empty() {
                            let _ = batches.send(rest);
                        }
                        tracing::debug!("Debouncer input closed, stopping");
                        return;
                    }
                },
                _ = sleep_until_or_forever(deadline) => {
                    if let Some(batch) = self.poll_expired(Instant::now()) {
                        tracing::debug!("Flushing batch of {} events", batch.len());
                        if batches.send(batch).is_err() {
                            tracing::debug!("Batch receiver dropped, stopping debouncer");
                            return;
                        }
                    }
                }
            }
        }
    }
}

async fn sleep_until_or_forever(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}
