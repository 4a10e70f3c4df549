//! Session storage backends.
//!
//! This module defines the [`SessionStore`] trait that decouples session
//! records from where they live. Durability is entirely the store's
//! concern; the records only ask it to look up, save and remove.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::config::DEFAULT_MAX_SESSIONS;
use crate::error::Result;
use crate::session::Session;

/// Trait for session storage backends.
///
/// Implement this trait to connect session records to your storage. Failures
/// are reported as [`Error::Store`](crate::Error::Store) and propagated to the
/// caller unchanged.
pub trait SessionStore: Send + Sync {
    /// Look up a record by id. Returns `Ok(None)` if it doesn't exist.
    fn get_session(&self, id: &str) -> Result<Option<Arc<Session>>>;

    /// Look up a record without counting it as a client access.
    ///
    /// Background checks use this so they don't affect recency-based
    /// eviction. Defaults to [`get_session`](Self::get_session).
    fn peek_session(&self, id: &str) -> Result<Option<Arc<Session>>> {
        self.get_session(id)
    }

    /// Insert or overwrite a record.
    fn save_session(&self, session: &Arc<Session>) -> Result<()>;

    /// Remove a record by id. Removing a missing id is not an error.
    fn remove_session(&self, id: &str) -> Result<()>;

    /// Whether the store evicts stale records on its own.
    ///
    /// When `true`, records never arm an expiration task.
    fn auto_expire(&self) -> bool {
        false
    }
}

/// In-memory store with LRU eviction.
///
/// Holds records by reference; not self-expiring, so records saved here are
/// watched by the timing wheel. When full, the least recently used record
/// is dropped, and its expiration task later finds it missing and retires.
pub struct MemorySessionStore {
    sessions: Mutex<LruCache<String, Arc<Session>>>,
}

impl MemorySessionStore {
    /// Create a store holding at most `max_sessions` records.
    pub fn new(max_sessions: usize) -> Self {
        let cap = NonZeroUsize::new(max_sessions).unwrap_or(NonZeroUsize::MIN);
        Self {
            sessions: Mutex::new(LruCache::new(cap)),
        }
    }

    /// Number of records currently held.
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Check if the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    /// Check for a record without updating LRU order.
    pub fn contains(&self, id: &str) -> bool {
        self.sessions.lock().contains(id)
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SESSIONS)
    }
}

impl SessionStore for MemorySessionStore {
    fn get_session(&self, id: &str) -> Result<Option<Arc<Session>>> {
        Ok(self.sessions.lock().get(id).cloned())
    }

    fn peek_session(&self, id: &str) -> Result<Option<Arc<Session>>> {
        Ok(self.sessions.lock().peek(id).cloned())
    }

    fn save_session(&self, session: &Arc<Session>) -> Result<()> {
        let mut sessions = self.sessions.lock();
        if let Some((evicted_id, _)) = sessions.push(session.id().to_string(), Arc::clone(session))
            && evicted_id != session.id()
        {
            debug!(session_id = %evicted_id, "Evicting LRU session to make room");
        }
        trace!(session_id = %session.id(), size = sessions.len(), "Session saved");
        Ok(())
    }

    fn remove_session(&self, id: &str) -> Result<()> {
        if self.sessions.lock().pop(id).is_some() {
            debug!(session_id = %id, "Session removed from store");
        }
        Ok(())
    }
}
