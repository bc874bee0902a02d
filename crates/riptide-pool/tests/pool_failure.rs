//! Connect failures and recovery

use std::sync::{Arc, Mutex};

use riptide_pool::testing::{TestConnection, TestConnector, TestFailure};
use riptide_pool::{Context, Error, Pool, PoolOptions};

fn pool(max_size: usize, max_weight: usize) -> (Pool<TestConnection>, TestConnector) {
    let connector = TestConnector::new();
    let pool = Pool::new(
        Arc::new(connector.clone()),
        PoolOptions::new(max_size, max_weight),
    )
    .unwrap();
    (pool, connector)
}

#[test]
fn failure_fails_the_bound_waiter_and_admits_the_next() {
    let (pool, connector) = pool(2, 2);
    let ctx = Context::inline();

    let failure = Arc::new(Mutex::new(None));
    let failure_c = Arc::clone(&failure);
    pool.acquire(&ctx, 2, move |result| {
        *failure_c.lock().unwrap() = Some(result.err().expect("expected failure"));
    });
    let got = Arc::new(Mutex::new(None));
    let got_c = Arc::clone(&got);
    pool.acquire(&ctx, 1, move |result| {
        *got_c.lock().unwrap() = Some(result.unwrap());
    });
    assert_eq!(pool.weight(), 2);
    assert_eq!(pool.waiters(), 1);

    connector.next_request().fail(TestFailure("boom"));

    let failure = failure.lock().unwrap().take().expect("first waiter failed");
    assert_eq!(failure.to_string(), "boom");
    assert_eq!(
        pool.weight(),
        1,
        "failed attempt's weight is released, next attempt is provisional"
    );

    let connection = TestConnection::new();
    connector.next_request().complete(connection.clone(), 1);
    let lease = got.lock().unwrap().take().expect("second waiter served");
    assert_eq!(*lease.connection(), connection);
}

#[test]
fn failure_cause_is_propagated_verbatim() {
    let (pool, connector) = pool(1, 1);
    let ctx = Context::inline();
    let failure = Arc::new(Mutex::new(None));
    let failure_c = Arc::clone(&failure);
    pool.acquire(&ctx, 1, move |result| {
        *failure_c.lock().unwrap() = Some(result.err().expect("expected failure"));
    });
    connector.next_request().fail(TestFailure("kaput"));

    let failure = failure.lock().unwrap().take().expect("callback fired");
    match failure {
        Error::Connect { cause } => {
            assert_eq!(cause.downcast_ref(), Some(&TestFailure("kaput")));
        }
        other => panic!("expected connect failure, got: {other:?}"),
    }
}

#[test]
fn failed_attempt_frees_the_slot_and_budget() {
    let (pool, connector) = pool(1, 1);
    let ctx = Context::inline();
    pool.acquire(&ctx, 1, |result| {
        assert!(result.is_err());
    });
    connector.next_request().fail(TestFailure("down"));
    assert_eq!(pool.weight(), 0);
    assert_eq!(pool.size(), 0);

    let got = Arc::new(Mutex::new(None));
    let got_c = Arc::clone(&got);
    pool.acquire(&ctx, 1, move |result| {
        *got_c.lock().unwrap() = Some(result.unwrap());
    });
    let connection = TestConnection::new();
    connector.next_request().complete(connection.clone(), 1);
    let lease = got.lock().unwrap().take().expect("pool recovered");
    assert_eq!(*lease.connection(), connection);
}
