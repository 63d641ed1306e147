//! Fixed-size worker pool over one shared FIFO queue.
//!
//! # Architecture
//!
//! ```text
//!  Submitters ──► Mutex<VecDeque<QueuedTask>> ──► Worker 0..N-1
//!                      │                              │
//!                      │  outstanding (AtomicU64)     │ pop → invoke → decrement
//!                      │  running / paused (flags)    │ idle: sleep(µs) or yield
//! ```
//!
//! - N OS threads, created eagerly, each running the dequeue-and-invoke loop
//! - One shared FIFO protected by a mutex; submitters push, workers pop
//! - `outstanding` counts queued + in-progress; "running" is the difference
//!   between it and the queue length (no separate in-progress counter —
//!   a second counter would double-account around a paused dispatch)
//!
//! # Correctness Invariants
//!
//! - **Exactly-once dispatch**: the pop happens under the queue lock; one
//!   worker takes any given task.
//! - **Fulfil-before-decrement**: a worker decrements `outstanding` only
//!   after the task closure has resolved its handle.
//! - **Lock never held across an invocation**: the guard is dropped before
//!   the task runs.
//! - **Resize from quiescence only**: `reset` drains in-flight work before
//!   touching the worker set.
//!
//! # Ordering
//!
//! FIFO into the queue, no FIFO guarantee on completion with N > 1.

use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::debug;

use super::error::PoolError;
use super::task::{Task, TaskId};
use super::value::TaskHandle;

/// A task ready for a worker: the erased run closure plus its id for
/// diagnostics.
struct QueuedTask {
    run: Box<dyn FnOnce() + Send>,
    id: TaskId,
}

struct PoolShared {
    /// Shared FIFO of ready tasks. Submitters push, workers pop.
    queue: Mutex<VecDeque<QueuedTask>>,
    /// Tasks queued + tasks currently executing.
    outstanding: AtomicU64,
    /// Workers exit their loop once this clears.
    running: AtomicBool,
    /// Workers stop dequeuing while set; in-hand tasks continue.
    paused: AtomicBool,
    /// Idle back-off in microseconds; 0 means yield the scheduler.
    idle_backoff_us: AtomicU64,
}

impl PoolShared {
    /// Non-blocking pop. Pause is re-checked under the lock so a pause
    /// issued between the fast check and acquisition still wins.
    fn pop(&self) -> Option<QueuedTask> {
        if self.paused.load(Ordering::Acquire) {
            return None;
        }
        let mut queue = self.queue.lock().expect("task queue poisoned");
        if self.paused.load(Ordering::Acquire) {
            return None;
        }
        queue.pop_front()
    }

    /// Sleep the configured µs, or yield when none is configured.
    fn idle_backoff(&self) {
        let us = self.idle_backoff_us.load(Ordering::Relaxed);
        if us > 0 {
            thread::sleep(Duration::from_micros(us));
        } else {
            thread::yield_now();
        }
    }

    fn queued(&self) -> usize {
        self.queue.lock().expect("task queue poisoned").len()
    }
}

/// Dequeue-and-invoke loop run by every worker thread.
fn worker_loop(shared: Arc<PoolShared>) {
    while shared.running.load(Ordering::Acquire) {
        if shared.paused.load(Ordering::Acquire) {
            shared.idle_backoff();
            continue;
        }
        match shared.pop() {
            Some(task) => {
                debug!(task = %task.id, "task picked up");
                // The closure resolves the task's handle internally and
                // contains any panic; the worker survives every thunk.
                (task.run)();
                shared.outstanding.fetch_sub(1, Ordering::AcqRel);
                debug!(task = %task.id, "task completed");
            }
            None => shared.idle_backoff(),
        }
    }
}

/// Fixed-size worker pool with a shared FIFO queue and lifecycle control.
///
/// Dropping the pool waits for quiescence, stops the workers, and joins
/// them; no task is abandoned in flight.
pub struct ThreadPool {
    shared: Arc<PoolShared>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    /// Creates a pool of `workers` threads, started eagerly and idle.
    ///
    /// Fails with [`PoolError::InvalidSize`] for zero workers.
    pub fn new(workers: usize) -> Result<Self, PoolError> {
        if workers == 0 {
            return Err(PoolError::InvalidSize);
        }
        let shared = Arc::new(PoolShared {
            queue: Mutex::new(VecDeque::new()),
            outstanding: AtomicU64::new(0),
            running: AtomicBool::new(true),
            paused: AtomicBool::new(false),
            idle_backoff_us: AtomicU64::new(0),
        });
        let mut pool = Self {
            shared,
            workers: Vec::new(),
        };
        pool.spawn_workers(workers);
        Ok(pool)
    }

    /// Creates a pool sized to the host's reported hardware concurrency.
    pub fn with_default_workers() -> Self {
        let workers = thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        Self::new(workers).expect("hardware concurrency is non-zero")
    }

    fn spawn_workers(&mut self, count: usize) {
        debug_assert!(self.workers.is_empty());
        self.workers.reserve(count);
        for worker_id in 0..count {
            let shared = Arc::clone(&self.shared);
            let handle = thread::Builder::new()
                .name(format!("taskmill-worker-{worker_id}"))
                .spawn(move || worker_loop(shared))
                .expect("failed to spawn worker thread");
            self.workers.push(handle);
        }
    }

    /// Number of worker threads currently owned by the pool.
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Builds a task from `f`, enqueues it, and returns its result handle.
    ///
    /// Never blocks on worker availability; the queue is unbounded. Safe to
    /// call from any number of threads concurrently.
    pub fn submit<F, R>(&self, f: F) -> TaskHandle
    where
        F: FnOnce() -> R + Send + 'static,
        R: std::any::Any + Send,
    {
        let mut task = Task::from_fn(f);
        let handle = task
            .take_handle()
            .expect("freshly armed task owns its handle");
        self.enqueue(task);
        handle
    }

    /// Enqueues a pre-built task. The caller is responsible for having taken
    /// the handle first (the DAG hand-off path); an unarmed task is refused
    /// by its own closure as a no-op.
    pub fn submit_task(&self, task: Task) {
        self.enqueue(task);
    }

    fn enqueue(&self, task: Task) {
        let id = task.id();
        let queued = QueuedTask {
            run: task.into_closure(),
            id,
        };
        // Count first, then publish: `outstanding` may transiently exceed
        // queue length + in-progress, never undershoot it.
        self.shared.outstanding.fetch_add(1, Ordering::AcqRel);
        self.shared
            .queue
            .lock()
            .expect("task queue poisoned")
            .push_back(queued);
        debug!(task = %id, "task queued");
    }

    /// Suspends dequeuing. Tasks already in a worker's hands continue.
    pub fn pause(&self) {
        self.shared.paused.store(true, Ordering::Release);
    }

    /// Resumes dequeuing.
    pub fn resume(&self) {
        self.shared.paused.store(false, Ordering::Release);
    }

    pub fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::Acquire)
    }

    /// Sets the idle back-off; `Duration::ZERO` selects a scheduler yield.
    pub fn set_idle_backoff(&self, backoff: Duration) {
        self.shared
            .idle_backoff_us
            .store(backoff.as_micros() as u64, Ordering::Relaxed);
    }

    /// Tasks queued + tasks currently executing.
    pub fn total_outstanding(&self) -> u64 {
        self.shared.outstanding.load(Ordering::Acquire)
    }

    /// Length of the ready queue.
    pub fn queued(&self) -> usize {
        self.shared.queued()
    }

    /// Tasks currently executing (outstanding minus queued).
    pub fn running(&self) -> u64 {
        // Sample outstanding first: it is incremented before the push and
        // decremented after the pop, so this difference never undershoots.
        let outstanding = self.total_outstanding();
        outstanding.saturating_sub(self.queued() as u64)
    }

    /// Blocks until the pool is quiescent: no outstanding work, or — while
    /// paused — no in-progress work (queued tasks may remain).
    pub fn wait_for_tasks(&self) {
        loop {
            let quiescent = if self.is_paused() {
                self.running() == 0
            } else {
                self.total_outstanding() == 0
            };
            if quiescent {
                return;
            }
            self.shared.idle_backoff();
        }
    }

    /// Replaces the worker set with `workers` fresh threads.
    ///
    /// Waits for quiescence first; no in-flight task is cancelled. The pause
    /// flag is restored to its prior value afterwards, so queued work held
    /// back by a pause stays held back across the resize.
    ///
    /// Fails with [`PoolError::InvalidSize`] for zero workers, leaving the
    /// pool untouched.
    pub fn reset(&mut self, workers: usize) -> Result<(), PoolError> {
        if workers == 0 {
            return Err(PoolError::InvalidSize);
        }
        self.wait_for_tasks();

        let was_paused = self.shared.paused.swap(true, Ordering::AcqRel);
        self.shared.running.store(false, Ordering::Release);
        self.join_workers();

        self.shared.running.store(true, Ordering::Release);
        self.spawn_workers(workers);
        self.shared.paused.store(was_paused, Ordering::Release);
        debug!(workers, "pool resized");
        Ok(())
    }

    fn join_workers(&mut self) {
        for handle in self.workers.drain(..) {
            // Workers never panic: every thunk is invoked behind
            // catch_unwind inside the task closure.
            handle.join().expect("worker thread panicked");
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.wait_for_tasks();
        self.shared.running.store(false, Ordering::Release);
        self.join_workers();
    }
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("workers", &self.workers.len())
            .field("outstanding", &self.total_outstanding())
            .field("paused", &self.is_paused())
            .finish()
    }
}
