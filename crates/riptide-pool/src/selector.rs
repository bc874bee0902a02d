//! Slot selection policy.

use crate::context::Context;
use crate::pool::SlotId;
use crate::waiter::WaiterRef;

/// Snapshot of one candidate slot offered to an installed selector.
///
/// The snapshot is stable for the duration of the selector call; it is
/// taken on the pool's executor turn.
#[derive(Debug)]
pub struct PooledConnection<C> {
    slot: SlotId,
    connection: C,
    capacity: usize,
    max_capacity: usize,
    context: Context,
}

impl<C> PooledConnection<C> {
    pub(crate) fn new(
        slot: SlotId,
        connection: C,
        capacity: usize,
        max_capacity: usize,
        context: Context,
    ) -> Self {
        Self {
            slot,
            connection,
            capacity,
            max_capacity,
            context,
        }
    }

    /// Identity of the slot, returned from a selector to pick it.
    pub fn slot_id(&self) -> SlotId {
        self.slot
    }

    /// The underlying connection.
    pub fn connection(&self) -> &C {
        &self.connection
    }

    /// Free capacity right now.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total concurrent capacity of the connection.
    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    /// The context the connection was opened on.
    pub fn context(&self) -> &Context {
        &self.context
    }
}

/// Installed selection policy. Runs synchronously on the executor; must not
/// block or suspend. Returning `None` (or an id outside the candidate list)
/// makes the pool fall through to opening a new connection.
pub(crate) type Selector<C> =
    Box<dyn FnMut(&WaiterRef, &[PooledConnection<C>]) -> Option<SlotId> + Send>;
