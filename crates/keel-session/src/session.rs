//! Session record and its lifecycle.
//!
//! A record moves `NEW -> ACTIVE -> (EXPIRED | RELEASED)`. It becomes active
//! on its first [`save`](Session::save), which also arms a single
//! [`ExpirationTask`] unless the store expires records on its own. It ends
//! when that task finds it stale, when it is [released](Session::release),
//! or when [`attach`](Session::attach) finds it holds nothing worth keeping.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace};

use crate::clock::Clock;
use crate::connection::Connection;
use crate::cookie::{RequestContext, ResponseContext, SessionCookie};
use crate::error::Result;
use crate::expiration::ExpirationTask;
use crate::manager::SessionManager;
use crate::wheel::WheelTask;

/// Serializable state of a record, for stores that persist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub id: String,
    pub attributes: HashMap<String, Value>,
    pub last_access_millis: i64,
    pub max_inactive_interval_millis: u64,
}

/// In-memory state for one logical client across requests.
///
/// Shared as `Arc<Session>` between the request path, the store and the
/// expiration task. The last-access timestamp is a plain atomic: a refresh
/// racing an expiry check may be seen one firing late, never torn.
pub struct Session {
    id: String,
    attributes: RwLock<HashMap<String, Value>>,
    last_access: AtomicI64,
    max_inactive_interval: AtomicU64,
    /// Unsaved attribute or TTL changes.
    dirty: AtomicBool,
    /// Set once on first save; never cleared.
    auto_clean_armed: AtomicBool,
    /// Saved through the store at least once.
    persisted: AtomicBool,
    expiration_task: OnceLock<Arc<ExpirationTask>>,
    manager: RwLock<Weak<SessionManager>>,
    connection: RwLock<Option<Weak<dyn Connection>>>,
    clock: Arc<dyn Clock>,
}

impl Session {
    /// Largest inactivity limit; keeps elapsed-time comparisons in range.
    pub const MAX_INACTIVE_INTERVAL_MILLIS: u64 = i64::MAX as u64;

    pub(crate) fn new(manager: &Arc<SessionManager>) -> Self {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let max_inactive = manager.config().max_inactive_interval_millis();
        Self::build(id, HashMap::new(), max_inactive, manager)
    }

    pub(crate) fn from_snapshot(snapshot: SessionSnapshot, manager: &Arc<SessionManager>) -> Self {
        let session = Self::build(
            snapshot.id,
            snapshot.attributes,
            snapshot.max_inactive_interval_millis,
            manager,
        );
        session
            .last_access
            .store(snapshot.last_access_millis, Ordering::Relaxed);
        session.persisted.store(true, Ordering::SeqCst);
        session
    }

    fn build(
        id: String,
        attributes: HashMap<String, Value>,
        max_inactive: u64,
        manager: &Arc<SessionManager>,
    ) -> Self {
        let clock = Arc::clone(manager.clock());
        Self {
            id,
            attributes: RwLock::new(attributes),
            last_access: AtomicI64::new(clock.now_millis()),
            max_inactive_interval: AtomicU64::new(clamp_interval(max_inactive)),
            dirty: AtomicBool::new(false),
            auto_clean_armed: AtomicBool::new(false),
            persisted: AtomicBool::new(false),
            expiration_task: OnceLock::new(),
            manager: RwLock::new(Arc::downgrade(manager)),
            connection: RwLock::new(None),
            clock,
        }
    }

    /// Get the session id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Mark the session as accessed now. Does not mark it dirty.
    pub fn refresh(&self) -> &Self {
        let now = self.clock.now_millis();
        self.last_access.store(now, Ordering::Relaxed);
        trace!(session_id = %self.id, "Session refreshed");
        self
    }

    /// Last access time in milliseconds since the Unix epoch.
    pub fn last_access_millis(&self) -> i64 {
        self.last_access.load(Ordering::Relaxed)
    }

    /// Inactivity limit in milliseconds.
    pub fn max_inactive_interval(&self) -> u64 {
        self.max_inactive_interval.load(Ordering::SeqCst)
    }

    /// Change the inactivity limit. Marks the session dirty.
    ///
    /// The limit is always positive; zero is raised to one millisecond and
    /// values above [`MAX_INACTIVE_INTERVAL_MILLIS`](Self::MAX_INACTIVE_INTERVAL_MILLIS)
    /// are capped. An expiration task that is already armed keeps its
    /// original cadence.
    pub fn set_max_inactive_interval(&self, millis: u64) {
        self.max_inactive_interval
            .store(clamp_interval(millis), Ordering::SeqCst);
        self.dirty.store(true, Ordering::SeqCst);
    }

    /// Whether more than the inactivity limit has passed since last access.
    pub fn is_expired(&self) -> bool {
        let elapsed = self
            .clock
            .now_millis()
            .saturating_sub(self.last_access_millis());
        u64::try_from(elapsed).is_ok_and(|elapsed| elapsed > self.max_inactive_interval())
    }

    /// Get an attribute value.
    pub fn attribute(&self, name: &str) -> Option<Value> {
        self.attributes.read().get(name).cloned()
    }

    /// Check whether an attribute is set.
    pub fn contains_attribute(&self, name: &str) -> bool {
        self.attributes.read().contains_key(name)
    }

    /// Copy of every attribute.
    pub fn attributes(&self) -> HashMap<String, Value> {
        self.attributes.read().clone()
    }

    /// Number of attributes held.
    pub fn attribute_count(&self) -> usize {
        self.attributes.read().len()
    }

    /// Set an attribute. Always marks the session dirty, even if unchanged.
    pub fn set_attribute(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.attributes.write().insert(name.into(), value.into());
        self.dirty.store(true, Ordering::SeqCst);
    }

    /// Remove an attribute. Always marks the session dirty.
    pub fn remove_attribute(&self, name: &str) -> Option<Value> {
        let removed = self.attributes.write().remove(name);
        self.dirty.store(true, Ordering::SeqCst);
        removed
    }

    /// Whether there are unsaved changes.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Whether expiry watching has been set up for this record.
    pub fn is_auto_clean_armed(&self) -> bool {
        self.auto_clean_armed.load(Ordering::SeqCst)
    }

    /// The armed expiration task, if one was scheduled.
    pub fn expiration_task(&self) -> Option<&Arc<ExpirationTask>> {
        self.expiration_task.get()
    }

    /// Serializable copy of the record's state.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id.clone(),
            attributes: self.attributes(),
            last_access_millis: self.last_access_millis(),
            max_inactive_interval_millis: self.max_inactive_interval(),
        }
    }

    /// Rebind to a manager, e.g. after being loaded from a persistent store.
    pub fn bind_manager(&self, manager: &Arc<SessionManager>) {
        *self.manager.write() = Arc::downgrade(manager);
    }

    fn manager(&self) -> Option<Arc<SessionManager>> {
        self.manager.read().upgrade()
    }

    /// Associate the connection currently serving this session.
    pub fn bind_connection(&self, connection: &Arc<dyn Connection>) {
        *self.connection.write() = Some(Arc::downgrade(connection));
    }

    /// The associated connection, if it is still alive.
    pub fn connection(&self) -> Option<Arc<dyn Connection>> {
        self.connection.read().as_ref().and_then(Weak::upgrade)
    }

    /// Persist unsaved changes through the store.
    ///
    /// Does nothing unless the session is dirty. The first effective save
    /// arms the expiration task; later saves never arm another.
    pub fn save(self: &Arc<Self>) -> Result<()> {
        let Some(manager) = self.manager() else {
            return Ok(());
        };
        if !self.dirty.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        let saved = manager
            .store()
            .save_session(self)
            .and_then(|()| {
                self.persisted.store(true, Ordering::SeqCst);
                self.auto_clean(&manager)
            });
        if saved.is_err() {
            self.dirty.store(true, Ordering::SeqCst);
        }
        saved?;

        debug!(session_id = %self.id, "Session saved");
        Ok(())
    }

    fn auto_clean(&self, manager: &SessionManager) -> Result<()> {
        if self
            .auto_clean_armed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(());
        }

        if manager.store().auto_expire() {
            debug!(session_id = %self.id, "Store expires sessions itself, not arming task");
            return Ok(());
        }

        let task = Arc::new(ExpirationTask::new(self.id.clone(), manager.store()));
        let delay_ticks = (self.max_inactive_interval() / 1000).max(1);
        if let Err(e) = manager.scheduler().add_task(task.clone(), delay_ticks) {
            self.auto_clean_armed.store(false, Ordering::SeqCst);
            return Err(e);
        }
        // The compare-exchange above admits a single arming per record
        let armed = self.expiration_task.set(task);
        debug_assert!(armed.is_ok(), "expiration task armed twice");

        debug!(session_id = %self.id, delay_ticks = delay_ticks, "Expiration task armed");
        Ok(())
    }

    /// Cancel expiry watching and remove the record from the store.
    ///
    /// Only takes effect for a record the store may know about: one with
    /// unsaved changes or one saved at least once.
    pub fn release(&self) -> Result<()> {
        let Some(manager) = self.manager() else {
            return Ok(());
        };
        if !self.is_dirty() && !self.persisted.load(Ordering::SeqCst) {
            return Ok(());
        }

        if let Some(task) = self.expiration_task.get() {
            task.cancel();
        }
        manager.store().remove_session(&self.id)?;

        debug!(session_id = %self.id, "Session released");
        Ok(())
    }

    /// Bind this session to one request/response cycle.
    ///
    /// A session holding attributes makes sure the client carries its id,
    /// issuing a cookie if the request has none or a different one, then
    /// refreshes and saves. An empty session is removed from the store
    /// instead.
    pub fn attach<Req, Resp>(self: &Arc<Self>, request: &Req, response: &mut Resp) -> Result<()>
    where
        Req: RequestContext + ?Sized,
        Resp: ResponseContext + ?Sized,
    {
        let Some(manager) = self.manager() else {
            return Ok(());
        };

        if self.attributes.read().is_empty() {
            debug!(session_id = %self.id, "Session has no attributes, removing");
            return manager.store().remove_session(&self.id);
        }

        let cookie_name = &manager.config().cookie_name;
        if request.cookie(cookie_name).as_deref() != Some(self.id.as_str()) {
            let max_age = self.max_inactive_interval() / 1000;
            response.add_cookie(SessionCookie::new(cookie_name, &self.id, max_age));
            debug!(session_id = %self.id, "Session cookie issued");
        }

        self.refresh();
        self.save()
    }

    /// Close the associated connection. No-op if none is alive.
    pub fn close(&self) -> Result<()> {
        match self.connection() {
            Some(connection) => connection.close(),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("attributes", &self.attribute_count())
            .field("last_access", &self.last_access_millis())
            .field("max_inactive_interval", &self.max_inactive_interval())
            .field("dirty", &self.is_dirty())
            .field("auto_clean_armed", &self.is_auto_clean_armed())
            .finish()
    }
}

fn clamp_interval(millis: u64) -> u64 {
    millis.clamp(1, Session::MAX_INACTIVE_INTERVAL_MILLIS)
}

impl From<&Session> for SessionSnapshot {
    fn from(session: &Session) -> Self {
        session.snapshot()
    }
}
