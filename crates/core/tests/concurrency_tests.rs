//! Concurrent resolution against a frozen graph
//!
//! Values must be built at most once per scope no matter how many threads
//! race to resolve them.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use graft_core::{Container, ProvideOptions};

struct Pool {
    size: usize,
}

struct Session {
    pool: Arc<Pool>,
}

struct Plugin(usize);

const THREADS: usize = 8;

#[test]
fn test_concurrent_get_builds_once() {
    let container = Container::new();
    let built = Arc::new(AtomicUsize::new(0));

    let counter = built.clone();
    container
        .provide(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(10));
            Pool { size: 4 }
        })
        .unwrap();

    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let container = container.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                container.get::<Pool>().unwrap()
            })
        })
        .collect();

    let pools: Vec<Arc<Pool>> = handles.into_iter().map(|handle| handle.join().unwrap()).collect();

    assert_eq!(built.load(Ordering::SeqCst), 1);
    assert!(pools.iter().all(|pool| Arc::ptr_eq(pool, &pools[0])));
    assert_eq!(pools[0].size, 4);
}

#[test]
fn test_request_scopes_share_warmed_root_singletons() {
    let container = Container::new();
    let pools = Arc::new(AtomicUsize::new(0));
    let sessions = Arc::new(AtomicUsize::new(0));

    let counter = pools.clone();
    container
        .provide(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Pool { size: 2 }
        })
        .unwrap();
    let singleton = container.get::<Pool>().unwrap();

    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|index| {
            let container = container.clone();
            let barrier = barrier.clone();
            let sessions = sessions.clone();
            thread::spawn(move || {
                let request = container.scope(format!("request-{index}")).unwrap();
                request
                    .provide(move |pool: Arc<Pool>| {
                        sessions.fetch_add(1, Ordering::SeqCst);
                        Session { pool }
                    })
                    .unwrap();
                barrier.wait();

                let first = request.get::<Session>().unwrap();
                let second = request.get::<Session>().unwrap();
                assert!(Arc::ptr_eq(&first, &second));
                first.pool.clone()
            })
        })
        .collect();

    for handle in handles {
        let pool = handle.join().unwrap();
        assert!(Arc::ptr_eq(&pool, &singleton));
    }
    assert_eq!(pools.load(Ordering::SeqCst), 1);
    assert_eq!(sessions.load(Ordering::SeqCst), THREADS);
}

#[test]
fn test_concurrent_group_resolution() {
    let container = Container::new();
    let built = Arc::new(AtomicUsize::new(0));

    for index in 0..4 {
        let counter = built.clone();
        container
            .provide_with(ProvideOptions::new().group("plugins"), move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Plugin(index)
            })
            .unwrap();
    }

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let container = container.clone();
            thread::spawn(move || container.get_group::<Plugin>("plugins").unwrap())
        })
        .collect();

    for handle in handles {
        let plugins = handle.join().unwrap();
        let order: Vec<usize> = plugins.iter().map(|plugin| plugin.0).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
    }
    assert_eq!(built.load(Ordering::SeqCst), 4);
}

#[test]
fn test_unwarmed_request_scopes_build_their_own_instances() {
    let container = Container::new();
    let built = Arc::new(AtomicUsize::new(0));

    let counter = built.clone();
    container
        .provide(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Pool { size: 1 }
        })
        .unwrap();

    let barrier = Arc::new(Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|index| {
            let container = container.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                let request = container.scope(format!("request-{index}")).unwrap();
                barrier.wait();
                let first = request.get::<Pool>().unwrap();
                assert!(Arc::ptr_eq(&first, &request.get::<Pool>().unwrap()));
                first
            })
        })
        .collect();
    let pools: Vec<Arc<Pool>> = handles.into_iter().map(|handle| handle.join().unwrap()).collect();

    // Request scopes never write into the root, so each one built its own pool
    assert_eq!(built.load(Ordering::SeqCst), THREADS);
    assert!(!Arc::ptr_eq(&pools[0], &pools[1]));

    let root = container.get::<Pool>().unwrap();
    assert!(pools.iter().all(|pool| !Arc::ptr_eq(pool, &root)));
    assert_eq!(built.load(Ordering::SeqCst), THREADS + 1);
}
