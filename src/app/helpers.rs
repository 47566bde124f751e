//! Contains helper functions to reduce boilerplate code in other `app` modules.

use super::events::UserEvent;
use super::proxy::EventProxy;
use super::state::SessionState;
use super::view_model::generate_ui_state;
use super::Session;
use crate::config::settings;
use crate::core::error::Result;

/// Locks the session state, performs a mutation that does not need to be
/// persisted, then sends a `StateUpdate` event.
pub fn with_state_and_notify<P, F, R>(session: &Session<P>, update_fn: F) -> R
where
    P: EventProxy,
    F: FnOnce(&mut SessionState) -> R,
{
    let mut state_guard = session.lock_state();
    let result = update_fn(&mut state_guard);
    state_guard.refresh_stats();
    let event = UserEvent::StateUpdate(Box::new(generate_ui_state(&state_guard)));
    session.proxy().send_event(event);
    result
}

/// Locks the session state and performs a mutation. On success the stats
/// are refreshed, a `StateUpdate` is sent and the full state is saved once
/// the state lock is released. A failed mutation is reported as an error
/// notification and nothing is saved.
///
/// A failed save is reported too, but the in-memory change stays.
pub fn with_state_and_persist<P, F, R>(session: &Session<P>, update_fn: F) -> Result<R>
where
    P: EventProxy,
    F: FnOnce(&mut SessionState) -> Result<R>,
{
    let (result, snapshot, save_guard) = {
        let mut state_guard = session.lock_state();
        let result = match update_fn(&mut state_guard) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("Operation failed: {}", e);
                session.notify_error(e.to_string());
                return Err(e);
            }
        };
        state_guard.refresh_stats();
        state_guard.catalog.mark_clean();
        let snapshot = state_guard.persisted();
        // Taken before the state lock is released, so saves land in
        // mutation order.
        let save_guard = session.lock_saves();
        let event = UserEvent::StateUpdate(Box::new(generate_ui_state(&state_guard)));
        session.proxy().send_event(event);
        (result, snapshot, save_guard)
    };

    if let Err(e) = session.store().save(&snapshot) {
        tracing::error!("{}", e);
        session.notify_error(e.to_string());
    }
    drop(save_guard);
    Ok(result)
}

/// Mutates the settings in `session.config` like [`with_state_and_notify`],
/// then writes the config file. Writes are ordered by the save lock. A
/// failed write is reported, but the in-memory settings stay.
pub fn with_config_and_save<P, F, R>(session: &Session<P>, update_fn: F) -> R
where
    P: EventProxy,
    F: FnOnce(&mut SessionState) -> R,
{
    let mut state_guard = session.lock_state();
    let result = update_fn(&mut state_guard);
    let config = state_guard.config.clone();
    let event = UserEvent::StateUpdate(Box::new(generate_ui_state(&state_guard)));
    let _save_guard = session.lock_saves();
    drop(state_guard);
    session.proxy().send_event(event);

    let saved = match session.config_file() {
        Some(path) => settings::save_config_to(&config, path),
        None => settings::save_config(&config),
    };
    if let Err(e) = saved {
        tracing::warn!("Failed to save settings: {:#}", e);
        session.notify_error(format!("Failed to save settings: {}", e));
    }
    result
}
