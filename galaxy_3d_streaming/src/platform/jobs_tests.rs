use super::*;
use std::sync::atomic::AtomicU32;

#[test]
fn test_immediate_runs_inline() {
    let counter = Arc::new(AtomicU32::new(0));
    let c = counter.clone();
    ImmediateJobQueue.submit(Box::new(move || {
        c.fetch_add(1, Ordering::SeqCst);
    }));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn test_immediate_survives_panicking_job() {
    ImmediateJobQueue.submit(Box::new(|| panic!("decoder exploded")));
}

#[test]
fn test_deferred_holds_until_run() {
    let queue = DeferredJobQueue::new();
    let counter = Arc::new(AtomicU32::new(0));
    for _ in 0..3 {
        let c = counter.clone();
        queue.submit(Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
    }

    assert_eq!(queue.pending(), 3);
    assert_eq!(counter.load(Ordering::SeqCst), 0);

    assert_eq!(queue.run_pending(), 3);
    assert_eq!(queue.pending(), 0);
    assert_eq!(counter.load(Ordering::SeqCst), 3);
}

#[test]
fn test_deferred_runs_jobs_submitted_by_jobs() {
    let queue = Arc::new(DeferredJobQueue::new());
    let counter = Arc::new(AtomicU32::new(0));

    let inner_queue = queue.clone();
    let c = counter.clone();
    queue.submit(Box::new(move || {
        let c2 = c.clone();
        inner_queue.submit(Box::new(move || {
            c2.fetch_add(10, Ordering::SeqCst);
        }));
        c.fetch_add(1, Ordering::SeqCst);
    }));

    assert_eq!(queue.run_pending(), 2);
    assert_eq!(counter.load(Ordering::SeqCst), 11);
}

#[test]
fn test_thread_pool_zero_workers_rejected() {
    assert!(ThreadPool::new(0).is_err());
}

#[test]
fn test_thread_pool_runs_all_jobs() {
    let pool = ThreadPool::new(4).unwrap();
    assert_eq!(pool.worker_count(), 4);

    let counter = Arc::new(AtomicU32::new(0));
    for _ in 0..100 {
        let c = counter.clone();
        pool.submit(Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
    }
    pool.wait_idle();

    assert_eq!(counter.load(Ordering::SeqCst), 100);
    assert_eq!(pool.pending(), 0);
}

#[test]
fn test_thread_pool_worker_survives_panic() {
    let pool = ThreadPool::new(1).unwrap();
    pool.submit(Box::new(|| panic!("bad block")));

    let counter = Arc::new(AtomicU32::new(0));
    let c = counter.clone();
    pool.submit(Box::new(move || {
        c.fetch_add(1, Ordering::SeqCst);
    }));
    pool.wait_idle();

    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn test_thread_pool_drop_drains_backlog() {
    let counter = Arc::new(AtomicU32::new(0));
    {
        let pool = ThreadPool::new(2).unwrap();
        for _ in 0..20 {
            let c = counter.clone();
            pool.submit(Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }));
        }
    }
    assert_eq!(counter.load(Ordering::SeqCst), 20);
}
