//! Pending-acquisition identity and lifecycle hooks.

use crate::context::Context;

/// Identity of one pending acquisition.
///
/// Obtained through an [`AcquireListener`] hook and usable with
/// [`Pool::cancel`](crate::Pool::cancel) while the acquisition is still
/// queued. Cloning is cheap.
#[derive(Clone, Debug)]
pub struct WaiterRef {
    id: u64,
    context: Context,
}

impl WaiterRef {
    pub(crate) fn new(id: u64, context: Context) -> Self {
        Self { id, context }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// The execution context the acquisition is bound to.
    pub fn context(&self) -> &Context {
        &self.context
    }
}

impl PartialEq for WaiterRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for WaiterRef {}

/// Observer for a pending acquisition's progress.
///
/// Hooks run on the pool's executor turn; keep them light and do not block.
/// Both hooks default to no-ops, so implementations override only what they
/// need.
pub trait AcquireListener: Send + Sync {
    /// The acquisition could not be served immediately and joined the queue.
    fn on_enqueue(&self, waiter: &WaiterRef) {
        let _ = waiter;
    }

    /// A connect attempt was started on the acquisition's behalf.
    fn on_connect(&self, waiter: &WaiterRef) {
        let _ = waiter;
    }
}
