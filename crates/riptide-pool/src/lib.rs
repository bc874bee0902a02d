//! # Riptide connection pool
//!
//! Generic connection pooling for the riptide network client. A
//! [`Pool`] coordinates a bounded set of reusable, multi-capacity
//! connections shared by many concurrent callers; each caller borrows a
//! [`Lease`] granting temporary exclusive use of one unit of a
//! connection's capacity.
//!
//! Opening connections is delegated to a [`Connector`], which reports
//! each connection's concurrency and weight and later signals
//! remote-initiated removal through its [`Membership`] handle. Excess
//! acquisitions queue FIFO up to a configurable limit; freed capacity,
//! freed weight and extra concurrency all flow back to queued waiters.
//!
//! All pool state transitions are serialized on an internal single-writer
//! combiner. The pool itself never blocks and never awaits; completions
//! are dispatched on the [`Context`] captured with each operation.

pub mod connector;
pub mod context;
pub mod error;
mod executor;
pub mod lease;
pub mod pool;
pub mod selector;
pub mod testing;
pub mod waiter;

pub use connector::{ConnectCallback, ConnectResult, Connector};
pub use context::{Context, Dispatch, Task};
pub use error::{BoxError, Error, Result};
pub use lease::Lease;
pub use pool::{ClosedConnection, Membership, Pool, PoolOptions, SlotId};
pub use selector::PooledConnection;
pub use waiter::{AcquireListener, WaiterRef};
