use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use crossbeam_channel as channel;
use rive_gpu_workers::{PoolConfig, PoolError, ThreadPool};

const WAIT: Duration = Duration::from_secs(5);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn log_pool() -> ThreadPool<Vec<u32>> {
    init_tracing();
    ThreadPool::new(PoolConfig::default(), |_| Vec::new())
}

#[test]
fn tasks_on_one_handle_run_in_submission_order() {
    let pool = log_pool();
    let handle = pool.acquire("fifo", |log| log.clear()).unwrap();
    for i in 0..200 {
        pool.queue(handle, move |log| log.push(i)).unwrap();
    }
    let log = pool
        .submit(handle, |log| log.clone())
        .unwrap()
        .wait_timeout(WAIT)
        .unwrap();
    assert_eq!(log, (0..200).collect::<Vec<_>>());
}

#[test]
fn acquire_on_an_empty_pool_does_not_wait_for_busy_workers() {
    let pool = log_pool();
    let (unblock_tx, unblock_rx) = channel::bounded::<()>(0);
    let busy = pool
        .acquire("busy", move |_| {
            let _ = unblock_rx.recv();
        })
        .unwrap();

    let (started_tx, started_rx) = channel::bounded(1);
    let fresh = pool
        .acquire("fresh", move |_| {
            let _ = started_tx.send(thread::current().id());
        })
        .unwrap();
    let fresh_thread = started_rx.recv_timeout(WAIT).unwrap();

    assert_ne!(pool.identity(busy).unwrap().thread_id, fresh_thread);
    unblock_tx.send(()).unwrap();
}

#[test]
fn released_worker_is_reused_with_its_state() {
    let pool = log_pool();
    let first = pool.acquire("draw-1", |_| {}).unwrap();
    let first_identity = pool.identity(first).unwrap();
    for tick in 1..=3 {
        pool.queue(first, move |log| log.push(tick)).unwrap();
    }
    pool.release(first, |_| {}).unwrap();
    assert_eq!(pool.stats().idle, 1);

    let second = pool.acquire("draw-2", |_| {}).unwrap();
    let second_identity = pool.identity(second).unwrap();
    assert_eq!(second_identity.thread_id, first_identity.thread_id);
    assert_eq!(second_identity.ordinal, first_identity.ordinal);
    assert_eq!(second_identity.name, "draw-1");

    let log = pool
        .submit(second, |log| log.clone())
        .unwrap()
        .wait_timeout(WAIT)
        .unwrap();
    assert_eq!(log, vec![1, 2, 3]);
}

#[test]
fn fifty_concurrent_acquirers_get_distinct_workers() {
    init_tracing();
    let pool = Arc::new(ThreadPool::new(PoolConfig::default(), |_| ()));
    let barrier = Arc::new(Barrier::new(50));

    let joins: Vec<_> = (0..50)
        .map(|i| {
            let pool = pool.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                pool.acquire(&format!("surface-{i}"), |_| {})
            })
        })
        .collect();

    let handles: Vec<_> = joins
        .into_iter()
        .map(|join| join.join().unwrap().unwrap())
        .collect();
    let threads: HashSet<_> = handles
        .iter()
        .map(|handle| pool.identity(*handle).unwrap().thread_id)
        .collect();
    assert_eq!(threads.len(), 50);

    let stats = pool.stats();
    assert_eq!((stats.leased, stats.idle), (50, 0));
    assert_eq!((stats.even, stats.odd), (25, 25));
}

#[test]
fn concurrent_lease_cycles_never_share_a_worker() {
    init_tracing();
    let pool = Arc::new(ThreadPool::new(PoolConfig::default(), |_| 0u32));

    let joins: Vec<_> = (0..8)
        .map(|i| {
            let pool = pool.clone();
            thread::spawn(move || {
                for round in 0..50 {
                    let handle = pool.acquire(&format!("cycle-{i}-{round}"), |_| {}).unwrap();
                    // Leased workers must be exclusively ours: the counter is only touched here.
                    let seen = pool
                        .submit(handle, |owners| {
                            *owners += 1;
                            let now = *owners;
                            *owners -= 1;
                            now
                        })
                        .unwrap()
                        .wait_timeout(WAIT)
                        .unwrap();
                    assert_eq!(seen, 1);
                    pool.release(handle, |_| {}).unwrap();
                }
            })
        })
        .collect();
    for join in joins {
        join.join().unwrap();
    }
    assert!(pool.stats().live() <= 8);
    assert_eq!(pool.stats().leased, 0);
}

#[test]
fn stale_and_double_release_are_rejected() {
    let pool = log_pool();
    let handle = pool.acquire("a", |_| {}).unwrap();
    pool.release(handle, |_| {}).unwrap();

    let again = pool.release(handle, |_| {});
    assert!(matches!(again, Err(PoolError::NotLeased { .. })));

    let next = pool.acquire("b", |_| {}).unwrap();
    assert_eq!(next.index(), handle.index());
    assert!(matches!(
        pool.queue(handle, |log| log.push(99)),
        Err(PoolError::NotLeased { .. })
    ));
    let log = pool
        .submit(next, |log| log.clone())
        .unwrap()
        .wait_timeout(WAIT)
        .unwrap();
    assert!(!log.contains(&99));
}

#[test]
fn panicking_task_leaves_the_worker_usable() {
    let pool = log_pool();
    let handle = pool.acquire("panics", |_| {}).unwrap();
    pool.queue(handle, |_| panic!("task failure")).unwrap();

    let failed = pool
        .submit(handle, |_| -> u32 { panic!("no result") })
        .unwrap()
        .wait_timeout(WAIT);
    assert!(matches!(failed, Err(PoolError::Disconnected)));

    let len = pool
        .submit(handle, |log| {
            log.push(1);
            log.len()
        })
        .unwrap()
        .wait_timeout(WAIT)
        .unwrap();
    assert_eq!(len, 1);
}

#[test]
fn shutdown_drains_queued_tasks() {
    let pool = log_pool();
    let handle = pool.acquire("drain", |_| {}).unwrap();
    let (tx, rx) = channel::unbounded();
    for i in 0..10 {
        let tx = tx.clone();
        pool.queue(handle, move |_| {
            thread::sleep(Duration::from_millis(2));
            let _ = tx.send(i);
        })
        .unwrap();
    }

    pool.shutdown();
    let drained: Vec<i32> = rx.try_iter().collect();
    assert_eq!(drained, (0..10).collect::<Vec<_>>());
    assert!(matches!(pool.acquire("late", |_| {}), Err(PoolError::ShutDown)));
}

#[test]
fn worker_threads_carry_the_configured_name() {
    init_tracing();
    let pool = ThreadPool::new(
        PoolConfig::default().with_thread_name_prefix("rive-render"),
        |_| (),
    );
    let handle = pool.acquire("named", |_| {}).unwrap();
    let name = pool
        .submit(handle, |_| thread::current().name().map(str::to_string))
        .unwrap()
        .wait_timeout(WAIT)
        .unwrap();
    assert_eq!(name.as_deref(), Some("rive-render-0"));
}
