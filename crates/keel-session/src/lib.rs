//! Session records with TTL expiry.
//!
//! This crate provides the session state layer of a connection-oriented
//! server:
//! - [`Session`] records with attributes, a dirty flag and an inactivity limit
//! - A single [`ExpirationTask`] per record, armed on first save
//! - A hashed [`TimingWheel`] that fires expiration tasks once per second
//! - A pluggable [`SessionStore`], with an LRU-bounded in-memory default
//!
//! # Example
//!
//! ```rust,ignore
//! use keel_session::{SessionConfig, SessionManager};
//!
//! let (manager, wheel) = SessionManager::in_memory(
//!     SessionConfig::new().with_session_timeout_minutes(10),
//! );
//! let _driver = wheel.spawn();
//!
//! let session = manager.create_session();
//! session.set_attribute("user", "alice");
//! session.attach(&request_cookies, &mut response_cookies)?;
//! ```

mod clock;
mod config;
mod connection;
mod cookie;
mod error;
mod expiration;
mod manager;
mod session;
mod store;
mod wheel;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    DEFAULT_COOKIE_NAME, DEFAULT_MAX_SESSIONS, DEFAULT_SESSION_TIMEOUT_MINUTES,
    DEFAULT_WHEEL_SLOTS, SessionConfig,
};
pub use connection::Connection;
pub use cookie::{RequestContext, ResponseContext, SessionCookie};
pub use error::{ConfigError, Error, Result};
pub use expiration::ExpirationTask;
pub use manager::SessionManager;
pub use session::{Session, SessionSnapshot};
pub use store::{MemorySessionStore, SessionStore};
pub use wheel::{Scheduler, TICK, TimingWheel, WheelTask};
