//! Single-use capacity leases.

use crate::error::{Error, Result};
use crate::pool::SlotId;

/// A single-use borrow of one unit of a slot's capacity.
///
/// The lease shares the slot's connection (connections are clonable
/// handles) and returns its capacity unit on the first [`recycle`],
/// or on drop if never recycled explicitly. Recycling a second time is a
/// programming error and fails fast. If the slot was removed from the pool
/// in the meantime, recycling has no effect beyond consuming the lease.
///
/// [`recycle`]: Lease::recycle
pub struct Lease<C> {
    connection: C,
    slot: SlotId,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl<C> Lease<C> {
    pub(crate) fn new(connection: C, slot: SlotId, release: Box<dyn FnOnce() + Send>) -> Self {
        Self {
            connection,
            slot,
            release: Some(release),
        }
    }

    /// The leased connection. Must not be retained beyond recycle.
    pub fn connection(&self) -> &C {
        &self.connection
    }

    /// Identity of the slot this lease was taken on.
    pub fn slot_id(&self) -> SlotId {
        self.slot
    }

    /// Return the capacity unit to the pool.
    ///
    /// # Errors
    /// Returns [`Error::AlreadyRecycled`] if the lease was recycled before.
    pub fn recycle(&mut self) -> Result<()> {
        match self.release.take() {
            Some(release) => {
                release();
                Ok(())
            }
            None => Err(Error::AlreadyRecycled),
        }
    }
}

impl<C> std::ops::Deref for Lease<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.connection
    }
}

impl<C> Drop for Lease<C> {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl<C: std::fmt::Debug> std::fmt::Debug for Lease<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lease")
            .field("slot", &self.slot)
            .field("connection", &self.connection)
            .field("recycled", &self.release.is_none())
            .finish()
    }
}
