//! Handle to the network connection a session is currently served on.

use crate::error::Result;

/// A live connection that a session record may be associated with.
///
/// Records hold connections weakly: a record outlives any single
/// connection, and closing is owned by the transport.
pub trait Connection: Send + Sync {
    fn close(&self) -> Result<()>;
}
