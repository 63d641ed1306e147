//! End-to-end pool scenarios: mixed workloads, resizing under load, pause
//! semantics, and handle consumption.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use taskmill::pool::{PoolError, Task, TaskError, ThreadPool};

#[test]
fn mixed_workload_resolves_every_handle() {
    let pool = ThreadPool::new(2).unwrap();

    // A void task that sleeps briefly.
    let sleeper = pool.submit(|| thread::sleep(Duration::from_micros(100)));
    // A task producing an integer.
    let ten = pool.submit(|| 10i32);
    // A void task over two owned strings.
    let alpha = String::from("alpha");
    let beta = String::from("beta");
    let join = pool.submit(move || {
        let joined = format!("{alpha}-{beta}");
        assert_eq!(joined.len(), 10);
    });

    assert!(sleeper.wait().unwrap().is_empty());
    assert_eq!(ten.wait().unwrap().downcast::<i32>().unwrap(), 10);
    assert!(join.wait().unwrap().is_empty());
}

#[test]
fn resize_preserves_all_work() {
    let mut pool = ThreadPool::new(5).unwrap();
    let input = Arc::new(10i32);

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let p = Arc::clone(&input);
            pool.submit(move || Arc::new(100 * *p))
        })
        .collect();

    pool.reset(2).unwrap();
    assert_eq!(pool.worker_count(), 2);

    for handle in handles {
        let value = handle.wait().unwrap();
        let result = value.downcast::<Arc<i32>>().unwrap();
        assert_eq!(*result, 1000);
    }

    // Work submitted after the resize runs on the new worker set.
    let after: Vec<_> = (0..4usize).map(|i| pool.submit(move || i + 1)).collect();
    for (i, handle) in after.into_iter().enumerate() {
        assert_eq!(handle.wait().unwrap().downcast::<usize>().unwrap(), i + 1);
    }
}

#[test]
fn handle_is_consumed_exactly_once() {
    let mut task = Task::from_fn(|| 7i32);
    let handle = task.take_handle().expect("first take succeeds");
    assert_eq!(task.take_handle().unwrap_err(), TaskError::HandleAlreadyTaken);

    let pool = ThreadPool::new(1).unwrap();
    pool.submit_task(task);
    assert_eq!(handle.wait().unwrap().downcast::<i32>().unwrap(), 7);
}

#[test]
fn pause_gates_execution_but_not_submission() {
    let pool = ThreadPool::new(3).unwrap();
    pool.pause();

    let ran = Arc::new(AtomicUsize::new(0));
    let handles: Vec<_> = (0..5)
        .map(|_| {
            let ran = Arc::clone(&ran);
            pool.submit(move || {
                ran.fetch_add(1, Ordering::Relaxed);
            })
        })
        .collect();

    thread::sleep(Duration::from_millis(30));
    assert_eq!(ran.load(Ordering::Relaxed), 0, "paused pool ran a task");
    assert_eq!(pool.total_outstanding(), 5);
    assert_eq!(pool.queued(), 5);

    pool.resume();
    for handle in handles {
        handle.wait().unwrap();
    }
    assert_eq!(ran.load(Ordering::Relaxed), 5);
}

#[test]
fn invalid_resize_reports_and_preserves_state() {
    let mut pool = ThreadPool::new(4).unwrap();
    assert_eq!(pool.reset(0).unwrap_err(), PoolError::InvalidSize);
    assert_eq!(pool.worker_count(), 4);

    // The pool still schedules.
    let handle = pool.submit(|| "alive");
    assert_eq!(handle.wait().unwrap().downcast::<&str>().unwrap(), "alive");
}

#[test]
fn concurrent_submitters_are_all_served() {
    let pool = Arc::new(ThreadPool::new(4).unwrap());
    let total = Arc::new(AtomicUsize::new(0));

    thread::scope(|s| {
        for _ in 0..8 {
            let pool = Arc::clone(&pool);
            let total = Arc::clone(&total);
            s.spawn(move || {
                let handles: Vec<_> = (0..50)
                    .map(|_| {
                        let total = Arc::clone(&total);
                        pool.submit(move || {
                            total.fetch_add(1, Ordering::Relaxed);
                        })
                    })
                    .collect();
                for handle in handles {
                    handle.wait().unwrap();
                }
            });
        }
    });

    assert_eq!(total.load(Ordering::Relaxed), 8 * 50);
    pool.wait_for_tasks();
    assert_eq!(pool.total_outstanding(), 0);
}

#[test]
fn outstanding_accounting_balances() {
    let pool = ThreadPool::new(2).unwrap();
    let handles: Vec<_> = (0..20)
        .map(|_| pool.submit(|| thread::sleep(Duration::from_micros(200))))
        .collect();

    // queued + running never exceeds what was submitted.
    let outstanding = pool.total_outstanding();
    assert!(outstanding <= 20);
    assert!(pool.running() <= outstanding);

    for handle in handles {
        handle.wait().unwrap();
    }
    pool.wait_for_tasks();
    assert_eq!(pool.total_outstanding(), 0);
    assert_eq!(pool.queued(), 0);
    assert_eq!(pool.running(), 0);
}
