//! Expiration task that evicts a stale session from its store.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use tracing::{debug, trace};

use crate::error::Result;
use crate::store::SessionStore;
use crate::wheel::WheelTask;

/// Watches one session id and removes the record once it goes stale.
///
/// Each firing looks the record up again, so refreshes made since arming
/// are honored. A missing record is treated like an expired one. After a
/// removal the task cancels itself and every later firing is ignored.
pub struct ExpirationTask {
    session_id: String,
    store: Weak<dyn SessionStore>,
    cancelled: AtomicBool,
}

impl ExpirationTask {
    /// Create a task bound to `session_id` in `store`.
    pub fn new(session_id: impl Into<String>, store: &Arc<dyn SessionStore>) -> Self {
        Self {
            session_id: session_id.into(),
            store: Arc::downgrade(store),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Id of the watched session.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl WheelTask for ExpirationTask {
    fn run(&self) -> Result<()> {
        if self.is_cancelled() {
            return Ok(());
        }

        let Some(store) = self.store.upgrade() else {
            debug!(session_id = %self.session_id, "Session store dropped, retiring expiration task");
            self.cancel();
            return Ok(());
        };

        let expired = match store.peek_session(&self.session_id)? {
            Some(session) => session.is_expired(),
            None => true,
        };

        if expired {
            debug!(session_id = %self.session_id, "Session expired, removing from store");
            store.remove_session(&self.session_id)?;
            self.cancel();
        } else {
            trace!(session_id = %self.session_id, "Session still live");
        }

        Ok(())
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for ExpirationTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpirationTask")
            .field("session_id", &self.session_id)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::SessionConfig;
    use crate::error::Error;
    use crate::manager::SessionManager;
    use crate::session::Session;
    use crate::store::MemorySessionStore;
    use crate::wheel::TimingWheel;
    use parking_lot::Mutex;

    fn setup() -> (Arc<MemorySessionStore>, Arc<SessionManager>, Arc<ManualClock>) {
        let store = Arc::new(MemorySessionStore::new(16));
        let clock = Arc::new(ManualClock::new(0));
        let manager = SessionManager::with_clock(
            SessionConfig::new(),
            store.clone(),
            Arc::new(TimingWheel::new(4)),
            clock.clone(),
        );
        (store, manager, clock)
    }

    #[test]
    fn test_live_session_is_kept() {
        let (store, manager, _clock) = setup();
        let session = manager.create_session();
        store.save_session(&session).unwrap();

        let dyn_store: Arc<dyn SessionStore> = store.clone();
        let task = ExpirationTask::new(session.id(), &dyn_store);
        task.run().unwrap();

        assert!(!task.is_cancelled());
        assert!(store.contains(session.id()));
    }

    #[test]
    fn test_expired_session_is_removed() {
        let (store, manager, clock) = setup();
        let session = manager.create_session();
        session.set_max_inactive_interval(1_000);
        store.save_session(&session).unwrap();

        let dyn_store: Arc<dyn SessionStore> = store.clone();
        let task = ExpirationTask::new(session.id(), &dyn_store);

        clock.advance(1_001);
        task.run().unwrap();

        assert!(task.is_cancelled());
        assert!(!store.contains(session.id()));
    }

    #[test]
    fn test_missing_session_retires_task() {
        let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new(4));
        let task = ExpirationTask::new("gone", &store);

        task.run().unwrap();
        assert!(task.is_cancelled());
    }

    #[test]
    fn test_dropped_store_retires_task() {
        let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new(4));
        let task = ExpirationTask::new("orphan", &store);
        drop(store);

        task.run().unwrap();
        assert!(task.is_cancelled());
    }

    struct FailingRemoveStore {
        removes: Mutex<usize>,
    }

    impl SessionStore for FailingRemoveStore {
        fn get_session(&self, _id: &str) -> Result<Option<Arc<Session>>> {
            Ok(None)
        }

        fn save_session(&self, _session: &Arc<Session>) -> Result<()> {
            Ok(())
        }

        fn remove_session(&self, _id: &str) -> Result<()> {
            *self.removes.lock() += 1;
            Err(Error::Store("backend offline".to_string()))
        }
    }

    #[test]
    fn test_store_failure_propagates_and_keeps_task_armed() {
        let failing = Arc::new(FailingRemoveStore {
            removes: Mutex::new(0),
        });
        let store: Arc<dyn SessionStore> = failing.clone();
        let task = ExpirationTask::new("s", &store);

        let result = task.run();
        assert!(matches!(result, Err(Error::Store(_))));
        assert!(!task.is_cancelled());
        assert_eq!(*failing.removes.lock(), 1);
    }

    #[test]
    fn test_cancelled_task_is_inert() {
        let failing = Arc::new(FailingRemoveStore {
            removes: Mutex::new(0),
        });
        let store: Arc<dyn SessionStore> = failing.clone();
        let task = ExpirationTask::new("s", &store);

        task.cancel();
        task.cancel();
        task.run().unwrap();
        assert_eq!(*failing.removes.lock(), 0);
    }
}
