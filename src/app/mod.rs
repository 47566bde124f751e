//! The running session: owns the catalog lock and exposes the operations a
//! UI (or the headless runner) calls.

pub mod commands;
pub mod events;
pub mod helpers;
pub mod proxy;
pub mod state;
pub mod tasks;
pub mod view_model;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::AppConfig;
use crate::core::store::PersistedState;
use crate::core::{Store, WatcherSupervisor};
use events::UserEvent;
use proxy::EventProxy;
use state::SessionState;

/// Cheap to clone; every clone shares the same state, store and lock.
#[derive(Clone)]
pub struct Session<P: EventProxy> {
    state: Arc<Mutex<SessionState>>,
    store: Store,
    /// Serializes state-file writes in mutation order. Always taken while
    /// the state lock is held, released after the write.
    save_lock: Arc<Mutex<()>>,
    supervisor: Arc<Mutex<Option<WatcherSupervisor>>>,
    /// Where settings changes are written; the platform location if unset.
    config_file: Option<PathBuf>,
    proxy: P,
}

impl<P: EventProxy> Session<P> {
    /// Opens a session on the state file named by `config`. A missing file
    /// is a first run; an unreadable one is reported and replaced by an
    /// empty state.
    pub fn open(config: AppConfig, proxy: P) -> Self {
        let store = Store::new(config.data_file_path());
        let persisted = if store.exists() {
            let outcome = store.load();
            if let Some(e) = outcome.error {
                proxy.send_event(UserEvent::error(format!("Failed to load data: {}", e)));
            }
            outcome.state
        } else {
            tracing::info!("No state file at {:?}, starting empty", store.path());
            PersistedState::default()
        };

        let state = SessionState::new(config, persisted);
        tracing::info!(
            "Session opened: {} files, {} profiles, {} tasks",
            state.stats.files,
            state.stats.profiles,
            state.stats.tasks_total
        );

        Self {
            state: Arc::new(Mutex::new(state)),
            store,
            save_lock: Arc::new(Mutex::new(())),
            supervisor: Arc::new(Mutex::new(None)),
            config_file: None,
            proxy,
        }
    }

    /// Writes settings changes to `path` instead of the platform location.
    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    pub fn config_file(&self) -> Option<&Path> {
        self.config_file.as_deref()
    }

    pub fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state
            .lock()
            .expect("Mutex was poisoned. This should not happen.")
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn proxy(&self) -> &P {
        &self.proxy
    }

    pub fn supervisor(&self) -> Option<WatcherSupervisor> {
        self.supervisor
            .lock()
            .expect("Mutex was poisoned. This should not happen.")
            .clone()
    }

    pub(crate) fn attach_supervisor(&self, supervisor: WatcherSupervisor) {
        *self
            .supervisor
            .lock()
            .expect("Mutex was poisoned. This should not happen.") = Some(supervisor);
    }

    pub(crate) fn lock_saves(&self) -> MutexGuard<'_, ()> {
        self.save_lock
            .lock()
            .expect("Mutex was poisoned. This should not happen.")
    }

    pub fn notify(&self, message: impl Into<String>) {
        self.proxy.send_event(UserEvent::info(message));
    }

    pub fn notify_error(&self, message: impl Into<String>) {
        self.proxy.send_event(UserEvent::error(message));
    }
}
