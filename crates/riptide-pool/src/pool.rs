//! Connection pool core.
//!
//! `Pool<C>` coordinates a bounded set of reusable, multi-capacity
//! connections. Every mutation runs as an action on a single-writer
//! combiner, so the state machine below is never entered concurrently;
//! user callbacks are dispatched on the context captured with each
//! operation, never on the pool's own turn.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use crate::connector::{ConnectCallback, ConnectResult, Connector};
use crate::context::Context;
use crate::error::{BoxError, Error, Result};
use crate::executor::{Completions, Executor};
use crate::lease::Lease;
use crate::selector::{PooledConnection, Selector};
use crate::waiter::{AcquireListener, WaiterRef};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// PoolOptions
// ---------------------------------------------------------------------------

/// Configuration for a connection pool.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PoolOptions {
    /// Maximum number of concurrent slots, connecting or established.
    /// A pool of size 0 never opens connections; every acquisition queues.
    pub max_size: usize,
    /// Budget for the sum of slot weights.
    pub max_weight: usize,
    /// Waiter queue depth limit. `None` leaves the queue unbounded;
    /// `Some(0)` disables queuing entirely.
    pub max_waiters: Option<usize>,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_size: 10,
            max_weight: 10,
            max_waiters: None,
        }
    }
}

impl PoolOptions {
    /// Options with the given slot and weight budgets and an unbounded
    /// waiter queue.
    pub fn new(max_size: usize, max_weight: usize) -> Self {
        Self {
            max_size,
            max_weight,
            max_waiters: None,
        }
    }

    /// Bound the waiter queue.
    #[must_use]
    pub fn with_max_waiters(mut self, max_waiters: usize) -> Self {
        self.max_waiters = Some(max_waiters);
        self
    }

    /// Validate the pool options, returning an error if inconsistent.
    ///
    /// A size-0 pool is legal (it only queues), but a pool allowed to open
    /// connections needs a weight budget: every acquisition weighs at
    /// least 1, so `max_size > 0` with `max_weight == 0` could never admit
    /// a connect attempt.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] for such an inconsistent combination.
    pub fn validate(&self) -> Result<()> {
        if self.max_size > 0 && self.max_weight == 0 {
            return Err(Error::configuration(
                "max_weight must be at least 1 when max_size is nonzero",
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Slot and waiter records
// ---------------------------------------------------------------------------

/// Identity of one connection slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotId(u64);

impl SlotId {
    #[cfg(test)]
    pub(crate) fn test(id: u64) -> Self {
        Self(id)
    }
}

struct Slot<C> {
    /// Context the connection was (or is being) opened on.
    context: Context,
    /// This slot's share of the weight budget. Provisional while
    /// connecting, replaced by the connector's reported weight on success.
    weight: usize,
    phase: Phase<C>,
}

enum Phase<C> {
    /// Connect attempt in flight on behalf of the bound waiter.
    Connecting { waiter: Option<Waiter<C>> },
    Available {
        connection: C,
        capacity: usize,
        max_capacity: usize,
    },
}

impl<C> Slot<C> {
    fn is_available(&self) -> bool {
        matches!(self.phase, Phase::Available { .. })
    }
}

type AcquireCallback<C> = Box<dyn FnOnce(Result<Lease<C>>) + Send>;

struct Waiter<C> {
    handle: WaiterRef,
    weight: usize,
    callback: AcquireCallback<C>,
    listener: Option<Arc<dyn AcquireListener>>,
}

/// Snapshot of one slot reported by [`Pool::close`].
#[derive(Debug)]
pub enum ClosedConnection<C> {
    /// An established connection the caller is now responsible for.
    Established(C),
    /// A connect attempt still in flight; its eventual outcome is
    /// discarded by the pool.
    InFlight,
}

impl<C> ClosedConnection<C> {
    /// The established connection, if any.
    pub fn established(self) -> Option<C> {
        match self {
            Self::Established(connection) => Some(connection),
            Self::InFlight => None,
        }
    }

    /// Whether the slot was still connecting at close time.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::InFlight)
    }
}

// ---------------------------------------------------------------------------
// Membership
// ---------------------------------------------------------------------------

/// Handle the connector keeps for each connection it opens for the pool.
///
/// The connector uses it to report remote-initiated changes: the
/// connection going away, or its concurrency budget changing. Both signals
/// are safe to deliver from any thread, at any time, more than once; a
/// signal for a slot the pool no longer knows is ignored.
pub struct Membership<C> {
    core: Weak<Core<C>>,
    slot: SlotId,
}

impl<C> Clone for Membership<C> {
    fn clone(&self) -> Self {
        Self {
            core: Weak::clone(&self.core),
            slot: self.slot,
        }
    }
}

impl<C> std::fmt::Debug for Membership<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Membership").field("slot", &self.slot).finish()
    }
}

impl<C: Clone + Send + 'static> Membership<C> {
    /// Identity of the slot this membership refers to.
    pub fn slot_id(&self) -> SlotId {
        self.slot
    }

    /// The connection is gone. Its weight is released, it leaves selection,
    /// and outstanding leases on it recycle as no-ops. If freed budget
    /// admits the next queued waiter, a new connect attempt starts.
    pub fn remove(&self) {
        let Some(core) = self.core.upgrade() else { return };
        let slot_id = self.slot;
        core.submit(move |core, state, completions| {
            let established = state.slots.get(&slot_id).is_some_and(Slot::is_available);
            if !established {
                // In-flight attempts settle through their own callback.
                return;
            }
            if let Some(slot) = state.slots.remove(&slot_id) {
                state.weight -= slot.weight;
                state.recycle_order.retain(|id| *id != slot_id);
                #[cfg(feature = "tracing")]
                tracing::debug!(slot = ?slot_id, "connection removed from pool");
            }
            pump(core, state, completions);
        });
    }

    /// The connection's concurrency budget changed. Free capacity becomes
    /// `max_capacity` minus the leases still outstanding, clamped at zero;
    /// outstanding leases are never revoked. Growth serves queued waiters.
    pub fn concurrency_changed(&self, max_capacity: usize) {
        let Some(core) = self.core.upgrade() else { return };
        let slot_id = self.slot;
        core.submit(move |core, state, completions| {
            let Some(slot) = state.slots.get_mut(&slot_id) else { return };
            let Phase::Available {
                capacity,
                max_capacity: max,
                ..
            } = &mut slot.phase
            else {
                return;
            };
            let outstanding = *max - *capacity;
            *max = max_capacity;
            *capacity = max_capacity.saturating_sub(outstanding);
            pump(core, state, completions);
        });
    }
}

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

/// Generic connection pool.
///
/// Cloning is cheap; clones share the same pool.
pub struct Pool<C> {
    core: Arc<Core<C>>,
}

impl<C> Clone for Pool<C> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<C> std::fmt::Debug for Pool<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("size", &self.core.size.load(Ordering::Acquire))
            .field("weight", &self.core.weight.load(Ordering::Acquire))
            .field("waiters", &self.core.waiters.load(Ordering::Acquire))
            .finish()
    }
}

pub(crate) struct Core<C> {
    executor: Executor<PoolState<C>>,
    connector: Arc<dyn Connector<C>>,
    size: AtomicUsize,
    weight: AtomicUsize,
    waiters: AtomicUsize,
}

struct PoolState<C> {
    options: PoolOptions,
    slots: BTreeMap<SlotId, Slot<C>>,
    /// Front is the most recently recycled slot; eviction scans in this
    /// order. Invariant: every `Available` slot at full capacity appears
    /// here. A settling slot immediately grants one unit to its bound
    /// waiter, so capacity can only climb back to `max_capacity` through
    /// `recycle`, which inserts the slot at the front.
    recycle_order: VecDeque<SlotId>,
    queue: VecDeque<Waiter<C>>,
    selector: Option<Selector<C>>,
    /// Sum of slot weights, connecting and established.
    weight: usize,
    closed: bool,
    next_slot: u64,
    next_waiter: u64,
}

impl<C: Clone + Send + 'static> Pool<C> {
    /// Create a pool driving the given connector.
    ///
    /// # Errors
    /// Returns an error if `options` fails [`PoolOptions::validate`].
    pub fn new(connector: Arc<dyn Connector<C>>, options: PoolOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            core: Arc::new(Core {
                executor: Executor::new(PoolState {
                    options,
                    slots: BTreeMap::new(),
                    recycle_order: VecDeque::new(),
                    queue: VecDeque::new(),
                    selector: None,
                    weight: 0,
                    closed: false,
                    next_slot: 0,
                    next_waiter: 0,
                }),
                connector,
                size: AtomicUsize::new(0),
                weight: AtomicUsize::new(0),
                waiters: AtomicUsize::new(0),
            }),
        })
    }

    /// Acquire a lease of one capacity unit.
    ///
    /// `weight` is the provisional weight charged against the pool's budget
    /// if a new connection has to be opened for this acquisition; it must
    /// be at least 1. `callback` is dispatched on `context` with either the
    /// lease or the failure.
    ///
    /// # Panics
    /// Panics if `weight` is 0.
    pub fn acquire(
        &self,
        context: &Context,
        weight: usize,
        callback: impl FnOnce(Result<Lease<C>>) + Send + 'static,
    ) {
        self.acquire_inner(context, None, weight, Box::new(callback));
    }

    /// [`acquire`](Pool::acquire) with a listener observing the
    /// acquisition's progress. The listener's hooks hand out the
    /// [`WaiterRef`] needed for [`cancel`](Pool::cancel).
    pub fn acquire_with_listener(
        &self,
        context: &Context,
        listener: Arc<dyn AcquireListener>,
        weight: usize,
        callback: impl FnOnce(Result<Lease<C>>) + Send + 'static,
    ) {
        self.acquire_inner(context, Some(listener), weight, Box::new(callback));
    }

    fn acquire_inner(
        &self,
        context: &Context,
        listener: Option<Arc<dyn AcquireListener>>,
        weight: usize,
        callback: AcquireCallback<C>,
    ) {
        assert!(weight >= 1, "acquire weight must be at least 1");
        let context = context.clone();
        self.core.submit(move |core, state, completions| {
            if state.closed {
                dispatch(completions, &context, callback, Err(Error::Closed));
                return;
            }
            let id = state.next_waiter;
            state.next_waiter += 1;
            let waiter = Waiter {
                handle: WaiterRef::new(id, context),
                weight,
                callback,
                listener,
            };
            let Some(waiter) = try_serve(core, state, completions, waiter) else {
                return;
            };
            // Neither capacity nor budget: queue if there is room.
            let room = state
                .options
                .max_waiters
                .map_or(true, |max| state.queue.len() < max);
            if room {
                if let Some(listener) = waiter.listener.clone() {
                    let handle = waiter.handle.clone();
                    completions.defer(move || listener.on_enqueue(&handle));
                }
                state.queue.push_back(waiter);
            } else {
                let max_waiters = state.options.max_waiters.unwrap_or(0);
                let context = waiter.handle.context().clone();
                dispatch(
                    completions,
                    &context,
                    waiter.callback,
                    Err(Error::TooBusy { max_waiters }),
                );
            }
        });
    }

    /// Install a selection policy choosing which established slot serves
    /// the next acquisition. See [`PooledConnection`] for what the policy
    /// observes. Replaces any previously installed policy.
    pub fn connection_selector(
        &self,
        selector: impl FnMut(&WaiterRef, &[PooledConnection<C>]) -> Option<SlotId> + Send + 'static,
    ) {
        self.core.submit(move |_core, state, _completions| {
            state.selector = Some(Box::new(selector));
        });
    }

    /// Remove established, fully recycled connections matching `predicate`.
    ///
    /// Slots with outstanding leases and connect attempts in flight are
    /// not offered to the predicate. The callback receives the evicted
    /// connections, most recently recycled first, dispatched on `context`.
    /// The predicate runs synchronously on the pool's executor turn; it
    /// must not block.
    pub fn evict(
        &self,
        context: &Context,
        predicate: impl Fn(&C) -> bool + Send + 'static,
        callback: impl FnOnce(Result<Vec<C>>) + Send + 'static,
    ) {
        let context = context.clone();
        self.core.submit(move |core, state, completions| {
            if state.closed {
                dispatch(completions, &context, callback, Err(Error::Closed));
                return;
            }
            let mut victims = Vec::new();
            // Scanning recycle_order covers every evictable slot: a slot
            // only returns to full capacity through recycle, which links
            // it there (see the field invariant).
            for id in state.recycle_order.iter().copied() {
                let Some(slot) = state.slots.get(&id) else { continue };
                if let Phase::Available {
                    connection,
                    capacity,
                    max_capacity,
                } = &slot.phase
                {
                    if *capacity == *max_capacity && predicate(connection) {
                        victims.push(id);
                    }
                }
            }
            let mut evicted = Vec::with_capacity(victims.len());
            for id in victims {
                if let Some(slot) = state.slots.remove(&id) {
                    state.weight -= slot.weight;
                    if let Phase::Available { connection, .. } = slot.phase {
                        evicted.push(connection);
                    }
                }
            }
            let slots = &state.slots;
            state.recycle_order.retain(|id| slots.contains_key(id));
            #[cfg(feature = "tracing")]
            tracing::debug!(count = evicted.len(), "evicted connections");
            // Freed budget may admit queued waiters to new connect attempts.
            pump(core, state, completions);
            dispatch(completions, &context, callback, Ok(evicted));
        });
    }

    /// Cancel a pending acquisition.
    ///
    /// Effective only while the waiter is still queued: its acquire
    /// callback is dropped unfired and the callback receives `true`. Once
    /// a connect attempt has started on the waiter's behalf, or the waiter
    /// has already completed, the callback receives `false`.
    pub fn cancel(
        &self,
        context: &Context,
        waiter: &WaiterRef,
        callback: impl FnOnce(Result<bool>) + Send + 'static,
    ) {
        let context = context.clone();
        let waiter_id = waiter.id();
        self.core.submit(move |_core, state, completions| {
            if state.closed {
                dispatch(completions, &context, callback, Err(Error::Closed));
                return;
            }
            let position = state
                .queue
                .iter()
                .position(|waiter| waiter.handle.id() == waiter_id);
            let removed = match position {
                Some(position) => {
                    // The abandoned acquire callback is dropped unfired.
                    drop(state.queue.remove(position));
                    true
                }
                None => false,
            };
            dispatch(completions, &context, callback, Ok(removed));
        });
    }

    /// Close the pool.
    ///
    /// Every queued waiter and every waiter bound to an in-flight connect
    /// attempt fails with [`Error::Closed`]. The callback receives a
    /// snapshot of all slots, established and in flight; in-flight
    /// attempts settle into the void. All further operations fail with
    /// [`Error::Closed`].
    pub fn close(
        &self,
        context: &Context,
        callback: impl FnOnce(Result<Vec<ClosedConnection<C>>>) + Send + 'static,
    ) {
        let context = context.clone();
        self.core.submit(move |_core, state, completions| {
            if state.closed {
                dispatch(completions, &context, callback, Err(Error::Closed));
                return;
            }
            state.closed = true;
            let mut connections = Vec::new();
            for (_, slot) in std::mem::take(&mut state.slots) {
                match slot.phase {
                    Phase::Available { connection, .. } => {
                        connections.push(ClosedConnection::Established(connection));
                    }
                    Phase::Connecting { waiter } => {
                        if let Some(waiter) = waiter {
                            let waiter_context = waiter.handle.context().clone();
                            dispatch(
                                completions,
                                &waiter_context,
                                waiter.callback,
                                Err(Error::Closed),
                            );
                        }
                        connections.push(ClosedConnection::InFlight);
                    }
                }
            }
            for waiter in std::mem::take(&mut state.queue) {
                let waiter_context = waiter.handle.context().clone();
                dispatch(
                    completions,
                    &waiter_context,
                    waiter.callback,
                    Err(Error::Closed),
                );
            }
            state.recycle_order.clear();
            state.weight = 0;
            state.selector = None;
            #[cfg(feature = "tracing")]
            tracing::debug!(connections = connections.len(), "pool closed");
            dispatch(completions, &context, callback, Ok(connections));
        });
    }

    /// Number of established connections.
    pub fn size(&self) -> usize {
        self.core.size.load(Ordering::Acquire)
    }

    /// Sum of slot weights, connecting and established.
    pub fn weight(&self) -> usize {
        self.core.weight.load(Ordering::Acquire)
    }

    /// Number of queued waiters.
    pub fn waiters(&self) -> usize {
        self.core.waiters.load(Ordering::Acquire)
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

impl<C: Clone + Send + 'static> Core<C> {
    /// Run `action` on the executor and republish the observable counters
    /// afterwards.
    fn submit(
        self: &Arc<Self>,
        action: impl FnOnce(&Arc<Core<C>>, &mut PoolState<C>, &mut Completions) + Send + 'static,
    ) {
        let core = Arc::clone(self);
        self.executor.submit(move |state, completions| {
            action(&core, state, completions);
            core.publish(state);
        });
    }

    fn publish(&self, state: &PoolState<C>) {
        let size = state.slots.values().filter(|slot| slot.is_available()).count();
        self.size.store(size, Ordering::Release);
        self.weight.store(state.weight, Ordering::Release);
        self.waiters.store(state.queue.len(), Ordering::Release);
    }

    fn recycle(self: &Arc<Self>, slot_id: SlotId) {
        self.submit(move |core, state, completions| {
            let Some(slot) = state.slots.get_mut(&slot_id) else {
                // The slot was removed while the lease was out; the
                // capacity unit has nowhere to return to.
                return;
            };
            let Phase::Available {
                capacity,
                max_capacity,
                ..
            } = &mut slot.phase
            else {
                return;
            };
            if *capacity < *max_capacity {
                *capacity += 1;
            }
            state.recycle_order.retain(|id| *id != slot_id);
            state.recycle_order.push_front(slot_id);
            pump(core, state, completions);
        });
    }
}

/// Dispatch `callback(value)` on `context` once the current action's state
/// mutation is done.
fn dispatch<T, F>(completions: &mut Completions, context: &Context, callback: F, value: T)
where
    T: Send + 'static,
    F: FnOnce(T) + Send + 'static,
{
    let context = context.clone();
    completions.defer(move || context.run(move || callback(value)));
}

/// Try to serve `waiter` from existing capacity or a new connect attempt.
/// Returns the waiter unchanged when neither applies.
fn try_serve<C: Clone + Send + 'static>(
    core: &Arc<Core<C>>,
    state: &mut PoolState<C>,
    completions: &mut Completions,
    waiter: Waiter<C>,
) -> Option<Waiter<C>> {
    if let Some(slot_id) = select_slot(core, state, &waiter.handle) {
        grant(core, state, completions, slot_id, waiter);
        return None;
    }
    let admits_connect = state.slots.len() < state.options.max_size
        && state.weight + waiter.weight <= state.options.max_weight;
    if admits_connect {
        open_slot(core, state, completions, waiter);
        return None;
    }
    Some(waiter)
}

/// Pick an established slot with free capacity for `waiter`, honoring an
/// installed selector.
fn select_slot<C: Clone + Send + 'static>(
    core: &Arc<Core<C>>,
    state: &mut PoolState<C>,
    waiter: &WaiterRef,
) -> Option<SlotId> {
    let usable = |slot: &Slot<C>| match &slot.phase {
        Phase::Available {
            connection,
            capacity,
            ..
        } => *capacity >= 1 && core.connector.is_valid(connection),
        Phase::Connecting { .. } => false,
    };
    if state.selector.is_none() {
        // Default policy: first slot in id order with free capacity.
        return state
            .slots
            .iter()
            .find(|&(_, slot)| usable(slot))
            .map(|(id, _)| *id);
    }
    let candidates: Vec<PooledConnection<C>> = state
        .slots
        .iter()
        .filter_map(|(id, slot)| match &slot.phase {
            Phase::Available {
                connection,
                capacity,
                max_capacity,
            } if *capacity >= 1 && core.connector.is_valid(connection) => {
                Some(PooledConnection::new(
                    *id,
                    connection.clone(),
                    *capacity,
                    *max_capacity,
                    slot.context.clone(),
                ))
            }
            _ => None,
        })
        .collect();
    if candidates.is_empty() {
        return None;
    }
    let selector = state.selector.as_mut()?;
    let chosen = selector(waiter, &candidates)?;
    candidates
        .iter()
        .any(|candidate| candidate.slot_id() == chosen)
        .then_some(chosen)
}

/// Take one capacity unit from an established slot and complete `waiter`
/// with a lease, on the waiter's context.
fn grant<C: Clone + Send + 'static>(
    core: &Arc<Core<C>>,
    state: &mut PoolState<C>,
    completions: &mut Completions,
    slot_id: SlotId,
    waiter: Waiter<C>,
) {
    let Some(slot) = state.slots.get_mut(&slot_id) else {
        return;
    };
    let Phase::Available {
        connection,
        capacity,
        ..
    } = &mut slot.phase
    else {
        return;
    };
    debug_assert!(*capacity >= 1, "granting from a slot without capacity");
    *capacity -= 1;
    let connection = connection.clone();
    let weak = Arc::downgrade(core);
    let release = Box::new(move || {
        if let Some(core) = weak.upgrade() {
            core.recycle(slot_id);
        }
    });
    let lease = Lease::new(connection, slot_id, release);
    let context = waiter.handle.context().clone();
    dispatch(completions, &context, waiter.callback, Ok(lease));
}

/// Open a new slot and start a connect attempt on `waiter`'s behalf.
fn open_slot<C: Clone + Send + 'static>(
    core: &Arc<Core<C>>,
    state: &mut PoolState<C>,
    completions: &mut Completions,
    waiter: Waiter<C>,
) {
    let slot_id = SlotId(state.next_slot);
    state.next_slot += 1;
    state.weight += waiter.weight;
    let context = waiter.handle.context().clone();
    if let Some(listener) = waiter.listener.clone() {
        let handle = waiter.handle.clone();
        completions.defer(move || listener.on_connect(&handle));
    }
    state.slots.insert(
        slot_id,
        Slot {
            context: context.clone(),
            weight: waiter.weight,
            phase: Phase::Connecting {
                waiter: Some(waiter),
            },
        },
    );
    #[cfg(feature = "tracing")]
    tracing::debug!(slot = ?slot_id, "starting connect attempt");
    let core = Arc::clone(core);
    completions.defer(move || {
        let membership = Membership {
            core: Arc::downgrade(&core),
            slot: slot_id,
        };
        let weak = Arc::downgrade(&core);
        let callback: ConnectCallback<C> = Box::new(move |result| {
            let Some(core) = weak.upgrade() else { return };
            core.submit(move |core, state, completions| {
                settle(core, state, completions, slot_id, result);
            });
        });
        core.connector.connect(&context, membership, callback);
    });
}

/// Apply a connect attempt's outcome to its slot.
fn settle<C: Clone + Send + 'static>(
    core: &Arc<Core<C>>,
    state: &mut PoolState<C>,
    completions: &mut Completions,
    slot_id: SlotId,
    result: std::result::Result<ConnectResult<C>, BoxError>,
) {
    match result {
        Ok(outcome) => {
            let Some(slot) = state.slots.get_mut(&slot_id) else {
                // The pool closed while the attempt was in flight; the
                // bound waiter already failed, the connection is dropped.
                return;
            };
            let Phase::Connecting { waiter } = &mut slot.phase else {
                return;
            };
            let waiter = waiter.take();
            let max_capacity = outcome.concurrency.max(1);
            state.weight = state.weight - slot.weight + outcome.weight;
            slot.weight = outcome.weight;
            slot.phase = Phase::Available {
                connection: outcome.connection,
                capacity: max_capacity,
                max_capacity,
            };
            #[cfg(feature = "tracing")]
            tracing::debug!(slot = ?slot_id, capacity = max_capacity, "connection established");
            if let Some(waiter) = waiter {
                grant(core, state, completions, slot_id, waiter);
            }
            // Remaining capacity, and any weight freed by the actual
            // weight, go to queued waiters in FIFO order.
            pump(core, state, completions);
        }
        Err(cause) => {
            let Some(slot) = state.slots.remove(&slot_id) else {
                return;
            };
            state.weight -= slot.weight;
            #[cfg(feature = "tracing")]
            tracing::debug!(slot = ?slot_id, "connect attempt failed");
            if let Phase::Connecting {
                waiter: Some(waiter),
            } = slot.phase
            {
                let context = waiter.handle.context().clone();
                dispatch(
                    completions,
                    &context,
                    waiter.callback,
                    Err(Error::Connect { cause }),
                );
            }
            pump(core, state, completions);
        }
    }
}

/// Serve queued waiters in FIFO order for as long as capacity or connect
/// budget allows.
fn pump<C: Clone + Send + 'static>(
    core: &Arc<Core<C>>,
    state: &mut PoolState<C>,
    completions: &mut Completions,
) {
    while let Some(waiter) = state.queue.pop_front() {
        match try_serve(core, state, completions, waiter) {
            None => continue,
            Some(waiter) => {
                state.queue.push_front(waiter);
                break;
            }
        }
    }
}
