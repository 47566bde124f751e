//! Defines an abstraction over the event sending mechanism.

use super::events::UserEvent;
use tokio::sync::mpsc::UnboundedSender;

/// A trait that abstracts the sending of user events.
/// This is "fire-and-forget" and doesn't return a result, simplifying its use.
pub trait EventProxy: Send + Sync + Clone + 'static {
    fn send_event(&self, event: UserEvent);
}

/// A channel-backed proxy; the receiving end drives a UI or a test.
impl EventProxy for UnboundedSender<UserEvent> {
    fn send_event(&self, event: UserEvent) {
        if let Err(e) = self.send(event) {
            tracing::warn!("Failed to send event, receiver is gone: {:?}", e.0);
        }
    }
}

/// Writes notifications to the log and discards state snapshots. Used by
/// the headless runner.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProxy;

impl EventProxy for LogProxy {
    fn send_event(&self, event: UserEvent) {
        match event {
            UserEvent::Notify {
                message,
                is_error: false,
            } => tracing::info!("{}", message),
            UserEvent::Notify {
                message,
                is_error: true,
            } => tracing::error!("{}", message),
            UserEvent::StateUpdate(ui) => tracing::debug!(
                "State: {} files, {} profiles, {}/{} tasks",
                ui.stats.files,
                ui.stats.profiles,
                ui.stats.tasks_completed,
                ui.stats.tasks_total
            ),
        }
    }
}
