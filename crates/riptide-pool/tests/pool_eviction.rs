//! Eviction of idle connections

use std::sync::{Arc, Mutex};

use riptide_pool::testing::{TestConnection, TestConnector};
use riptide_pool::{Context, Lease, Pool, PoolOptions};

/// Open `num` connections, recycle the leases at `recycled` in that order,
/// then evict everything evictable. Returns the evicted connections as
/// indices into the opened set.
fn expire(num: usize, max: usize, recycled: &[usize]) -> Vec<usize> {
    let connector = TestConnector::new();
    let pool: Pool<TestConnection> =
        Pool::new(Arc::new(connector.clone()), PoolOptions::new(max, max)).unwrap();
    let ctx = Context::inline();

    let mut leases: Vec<Lease<TestConnection>> = Vec::new();
    let mut connections = Vec::new();
    for _ in 0..num {
        let got = Arc::new(Mutex::new(None));
        let got_c = Arc::clone(&got);
        pool.acquire(&ctx, 1, move |result| {
            *got_c.lock().unwrap() = Some(result.unwrap());
        });
        let connection = TestConnection::new();
        connector.next_request().complete(connection.clone(), 1);
        leases.push(got.lock().unwrap().take().expect("lease delivered"));
        connections.push(connection);
    }
    for &index in recycled {
        leases[index].recycle().unwrap();
    }

    let evicted = Arc::new(Mutex::new(None));
    let evicted_c = Arc::clone(&evicted);
    pool.evict(&ctx, |_| true, move |result| {
        *evicted_c.lock().unwrap() = Some(result.unwrap());
    });
    assert_eq!(
        pool.weight(),
        num - recycled.len(),
        "only fully recycled connections leave the pool"
    );
    let evicted = evicted.lock().unwrap().take().expect("evict completed");
    evicted
        .into_iter()
        .map(|connection| {
            connections
                .iter()
                .position(|candidate| *candidate == connection)
                .expect("evicted connection was opened here")
        })
        .collect()
}

#[test]
fn evicts_the_first_recycled() {
    assert_eq!(expire(1, 10, &[0]), vec![0]);
    assert_eq!(expire(2, 10, &[0]), vec![0]);
    assert_eq!(expire(3, 10, &[0]), vec![0]);
}

#[test]
fn evicts_the_last_recycled() {
    assert_eq!(expire(2, 10, &[1]), vec![1]);
    assert_eq!(expire(3, 10, &[2]), vec![2]);
}

#[test]
fn evicts_the_middle_recycled() {
    assert_eq!(expire(3, 10, &[1]), vec![1]);
}

#[test]
fn eviction_order_is_most_recently_recycled_first() {
    assert_eq!(expire(3, 10, &[1, 2]), vec![2, 1]);
    assert_eq!(expire(3, 10, &[0, 1, 2]), vec![2, 1, 0]);
    assert_eq!(expire(3, 10, &[0, 1]), vec![1, 0]);
}

#[test]
fn connecting_slots_are_invisible_to_the_predicate() {
    let connector = TestConnector::new();
    let pool: Pool<TestConnection> = Pool::new(
        Arc::new(connector.clone()),
        PoolOptions::new(1, 1).with_max_waiters(5),
    )
    .unwrap();
    let ctx = Context::inline();
    pool.acquire(&ctx, 1, |_| {});
    assert_eq!(connector.pending(), 1);

    let evicted = Arc::new(Mutex::new(None));
    let evicted_c = Arc::clone(&evicted);
    pool.evict(
        &ctx,
        |_| panic!("predicate must not see connecting slots"),
        move |result| {
            *evicted_c.lock().unwrap() = Some(result.unwrap());
        },
    );
    let evicted = evicted.lock().unwrap().take().expect("evict completed");
    assert!(evicted.is_empty());
}

#[test]
fn leased_connections_are_not_evicted() {
    let connector = TestConnector::new();
    let pool: Pool<TestConnection> =
        Pool::new(Arc::new(connector.clone()), PoolOptions::new(1, 1)).unwrap();
    let ctx = Context::inline();
    let got = Arc::new(Mutex::new(None));
    let got_c = Arc::clone(&got);
    pool.acquire(&ctx, 1, move |result| {
        *got_c.lock().unwrap() = Some(result.unwrap());
    });
    let connection = TestConnection::new();
    connector.next_request().complete(connection.clone(), 1);
    let mut lease = got.lock().unwrap().take().unwrap();

    let evicted = Arc::new(Mutex::new(None));
    let evicted_c = Arc::clone(&evicted);
    pool.evict(&ctx, |_| true, move |result| {
        *evicted_c.lock().unwrap() = Some(result.unwrap());
    });
    assert!(
        evicted.lock().unwrap().take().unwrap().is_empty(),
        "a connection with an outstanding lease stays"
    );

    lease.recycle().unwrap();
    let evicted_c = Arc::clone(&evicted);
    pool.evict(&ctx, |_| true, move |result| {
        *evicted_c.lock().unwrap() = Some(result.unwrap());
    });
    assert_eq!(
        evicted.lock().unwrap().take().unwrap(),
        vec![connection],
        "fully recycled connection is evictable"
    );
    assert_eq!(pool.size(), 0);
    assert_eq!(pool.weight(), 0);
}
