//! Entry point tying records to their store, scheduler and clock.

use std::sync::Arc;

use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::config::SessionConfig;
use crate::error::Result;
use crate::session::{Session, SessionSnapshot};
use crate::store::{MemorySessionStore, SessionStore};
use crate::wheel::{Scheduler, TimingWheel};

/// Creates and looks up session records.
///
/// The store and the scheduler are explicit dependencies rather than
/// process-wide state, so tests can substitute a fake scheduler that fires
/// on demand. Records keep only a weak reference back to the manager.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    scheduler: Arc<dyn Scheduler>,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
}

impl SessionManager {
    /// Create a manager using the system clock.
    pub fn new(
        config: SessionConfig,
        store: Arc<dyn SessionStore>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Arc<Self> {
        Self::with_clock(config, store, scheduler, Arc::new(SystemClock))
    }

    /// Create a manager with an explicit clock.
    pub fn with_clock(
        config: SessionConfig,
        store: Arc<dyn SessionStore>,
        scheduler: Arc<dyn Scheduler>,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            scheduler,
            clock,
            config,
        })
    }

    /// Create a manager over a [`MemorySessionStore`] and a [`TimingWheel`]
    /// sized from `config`.
    ///
    /// The wheel is returned so the caller can drive it, typically with
    /// [`TimingWheel::spawn`].
    pub fn in_memory(config: SessionConfig) -> (Arc<Self>, Arc<TimingWheel>) {
        let store = Arc::new(MemorySessionStore::new(config.max_sessions));
        let wheel = Arc::new(TimingWheel::new(config.wheel_slots));
        let manager = Self::new(config, store, wheel.clone());
        (manager, wheel)
    }

    /// Configuration records are created with.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The backing session store.
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// The scheduler expiration tasks are armed on.
    pub fn scheduler(&self) -> &Arc<dyn Scheduler> {
        &self.scheduler
    }

    /// The clock records read access times from.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Create a fresh record. It is not stored until first saved.
    pub fn create_session(self: &Arc<Self>) -> Arc<Session> {
        let session = Arc::new(Session::new(self));
        debug!(session_id = %session.id(), "Session created");
        session
    }

    /// Look up a record and bind it to this manager.
    pub fn get_session(self: &Arc<Self>, id: &str) -> Result<Option<Arc<Session>>> {
        let session = self.store.get_session(id)?;
        if let Some(session) = &session {
            session.bind_manager(self);
        }
        Ok(session)
    }

    /// Rebuild a record from a snapshot held by a persistent store.
    ///
    /// The record counts as already persisted and clean; its next effective
    /// save arms expiry watching in this process.
    pub fn adopt(self: &Arc<Self>, snapshot: SessionSnapshot) -> Arc<Session> {
        Arc::new(Session::from_snapshot(snapshot, self))
    }

    /// Remove a record from the store by id.
    pub fn remove_session(&self, id: &str) -> Result<()> {
        self.store.remove_session(id)
    }
}
