//! Connector interface consumed by the pool.
//!
//! The pool never opens sockets itself. It hands every connect attempt to a
//! [`Connector`], which must eventually settle the attempt exactly once via
//! the provided callback. Transport bytes, protocol negotiation, validity
//! heuristics and close mechanics all live behind this interface.

use crate::context::Context;
use crate::error::BoxError;
use crate::pool::Membership;

/// Outcome of a successful connect attempt.
#[derive(Debug)]
pub struct ConnectResult<C> {
    /// The established connection.
    pub connection: C,
    /// How many leases the connection can serve concurrently. Must be at
    /// least 1; a connection that can serve nothing is treated as capacity 1.
    pub concurrency: usize,
    /// The connection's actual share of the pool's weight budget, replacing
    /// the provisional weight of the acquisition that opened it.
    pub weight: usize,
}

impl<C> ConnectResult<C> {
    /// Bundle a settled connection with its reported capacity and weight.
    pub fn new(connection: C, concurrency: usize, weight: usize) -> Self {
        Self {
            connection,
            concurrency,
            weight,
        }
    }
}

/// Completion callback for a connect attempt. Must be invoked exactly once.
pub type ConnectCallback<C> = Box<dyn FnOnce(Result<ConnectResult<C>, BoxError>) + Send>;

/// Opens connections on the pool's behalf.
pub trait Connector<C>: Send + Sync {
    /// Start opening a connection on `context`.
    ///
    /// The connector keeps `membership` for the connection's lifetime and
    /// uses it to signal remote-initiated removal or concurrency changes.
    /// `callback` must eventually be invoked exactly once, with either the
    /// settled connection or the failure cause.
    fn connect(&self, context: &Context, membership: Membership<C>, callback: ConnectCallback<C>);

    /// Whether `connection` is still usable. Consulted defensively before a
    /// pooled connection is handed to a new lease; must be pure and cheap.
    fn is_valid(&self, connection: &C) -> bool {
        let _ = connection;
        true
    }
}
