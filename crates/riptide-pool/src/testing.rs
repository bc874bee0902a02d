//! Testing utilities: scripted connectors and fake connections.
//!
//! `TestConnector` captures every connect attempt the pool starts instead
//! of opening anything, letting a test settle attempts manually and in any
//! order. Combined with [`Context::inline`](crate::Context::inline) this
//! makes pool behavior fully deterministic and synchronous.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::connector::{ConnectCallback, ConnectResult, Connector};
use crate::context::Context;
use crate::error::BoxError;
use crate::pool::Membership;

static NEXT_CONNECTION_ID: AtomicUsize = AtomicUsize::new(0);

/// Identity-comparable fake connection with a declared concurrency.
#[derive(Debug, Clone)]
pub struct TestConnection {
    id: usize,
    concurrency: usize,
}

impl TestConnection {
    /// A connection serving one lease at a time.
    pub fn new() -> Self {
        Self::with_concurrency(1)
    }

    /// A connection serving up to `concurrency` leases at a time.
    pub fn with_concurrency(concurrency: usize) -> Self {
        Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            concurrency,
        }
    }

    /// Unique identity; clones compare equal to the original.
    pub fn id(&self) -> usize {
        self.id
    }

    /// The concurrency this connection reports when it settles.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }
}

impl Default for TestConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for TestConnection {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TestConnection {}

/// Failure cause with a recognizable message, for scripting connect
/// failures.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct TestFailure(pub &'static str);

/// One captured connect attempt, settled manually by the test.
pub struct ConnectRequest {
    context: Context,
    membership: Membership<TestConnection>,
    callback: ConnectCallback<TestConnection>,
}

impl ConnectRequest {
    /// The context the pool asked to open the connection on.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// The membership handle the connector would keep for the connection.
    pub fn membership(&self) -> &Membership<TestConnection> {
        &self.membership
    }

    /// Settle the attempt successfully. The connection's declared
    /// concurrency becomes the slot's capacity.
    pub fn complete(self, connection: TestConnection, weight: usize) {
        let concurrency = connection.concurrency();
        (self.callback)(Ok(ConnectResult::new(connection, concurrency, weight)));
    }

    /// Settle the attempt with a failure cause.
    pub fn fail(self, cause: impl Into<BoxError>) {
        (self.callback)(Err(cause.into()));
    }
}

/// Connector that captures connect attempts for scripted settlement.
///
/// Clones share the same capture queue, so a test can keep one clone and
/// hand the other to the pool.
#[derive(Clone, Default)]
pub struct TestConnector {
    requests: Arc<Mutex<VecDeque<ConnectRequest>>>,
}

impl TestConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// The oldest captured attempt not yet taken.
    ///
    /// # Panics
    /// Panics if the pool has not started a connect attempt.
    pub fn next_request(&self) -> ConnectRequest {
        self.requests
            .lock()
            .pop_front()
            .expect("no connect attempt was started")
    }

    /// Number of captured attempts not yet taken.
    pub fn pending(&self) -> usize {
        self.requests.lock().len()
    }
}

impl Connector<TestConnection> for TestConnector {
    fn connect(
        &self,
        context: &Context,
        membership: Membership<TestConnection>,
        callback: ConnectCallback<TestConnection>,
    ) {
        self.requests.lock().push_back(ConnectRequest {
            context: context.clone(),
            membership,
            callback,
        });
    }
}
