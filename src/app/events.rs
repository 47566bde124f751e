//! Defines the events the session raises on its collaborator (a UI, or the
//! headless runner's log).

use super::view_model::UiState;

#[derive(Debug, Clone, PartialEq)]
pub enum UserEvent {
    /// A complete state snapshot to re-render from.
    StateUpdate(Box<UiState>),
    /// A one-line, user-visible notification. The receiver owns display
    /// and timeout policy.
    Notify { message: String, is_error: bool },
}

impl UserEvent {
    pub fn info(message: impl Into<String>) -> Self {
        UserEvent::Notify {
            message: message.into(),
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        UserEvent::Notify {
            message: message.into(),
            is_error: true,
        }
    }
}
