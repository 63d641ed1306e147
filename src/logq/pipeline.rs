//! Asynchronous producer/consumer path between record producers and a
//! terminal sink writer.
//!
//! # Data path
//!
//! ```text
//!  Producers ──► chunk ──► Mutex<VecDeque<Box<str>>> ──► drain thread ──► SinkWriter
//!                              │                             │
//!                              │ signal at 256 chunks        │ batch = whole queue
//!                              │ (data_ready + unpark)       │ errors → ledger
//! ```
//!
//! One background drain thread parks until producers signal data-ready (or
//! shutdown). On wake it takes the entire queue as one batch — the swap
//! happens under the lock, the sink write after releasing it — and hands the
//! batch to the [`SinkWriter`]. The Parker/Unparker pair cannot lose a
//! wakeup: an unpark issued while the drain thread is running is consumed by
//! its next park.
//!
//! # Flush barrier
//!
//! `flush()` is a real barrier, not a hint: it wakes the drain thread and
//! blocks until every chunk pushed before the call has been handed through
//! the sink writer (pushed/written counters + condvar).
//!
//! # Failure containment
//!
//! A failed batch write is frozen into the ledger as a [`CapturedError`];
//! producers never observe it and the stream continues. On drop the ledger
//! is appended to `LoggingExceptionsList.txt` in the current directory.

use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write as _;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use crossbeam_utils::sync::{Parker, Unparker};
use tracing::warn;

use super::error::{CapturedError, SinkError};
use super::record::{chunk_record, BATCH_SIGNAL_LEN};
use super::sink::SinkWriter;

/// Fixed name of the ledger file written at shutdown.
pub const ERROR_LEDGER_FILE: &str = "LoggingExceptionsList.txt";

/// Serialises ledger-file appends across every pipeline in the process.
static LEDGER_FILE_LOCK: Mutex<()> = Mutex::new(());

struct PipelineShared {
    /// FIFO of record chunks. Producers push, the drain thread swaps it out.
    queue: Mutex<VecDeque<Box<str>>>,
    data_ready: AtomicBool,
    shutdown: AtomicBool,
    unparker: Unparker,
    /// Chunks ever pushed / chunks handed through the sink writer.
    pushed: AtomicU64,
    written: Mutex<u64>,
    written_cv: Condvar,
    errors: Mutex<Vec<CapturedError>>,
    writer: Arc<dyn SinkWriter>,
}

impl PipelineShared {
    fn capture(&self, err: SinkError) {
        warn!(%err, "sink write failed; captured");
        self.errors
            .lock()
            .expect("error ledger poisoned")
            .push(CapturedError::now(&err));
    }
}

/// Drain loop: park → take batch → write → account → repeat until shutdown
/// finds the queue empty.
fn drain_loop(shared: Arc<PipelineShared>, parker: Parker) {
    loop {
        let batch = {
            let mut queue = shared.queue.lock().expect("pipeline queue poisoned");
            shared.data_ready.store(false, Ordering::Release);
            std::mem::take(&mut *queue)
        };
        let n = batch.len() as u64;
        if n > 0 {
            // Queue lock released: producers keep pushing while the sink
            // writes. A failure is recorded, never propagated.
            if let Err(err) = shared.writer.write_batch(batch) {
                shared.capture(err);
            }
            let mut written = shared.written.lock().expect("written counter poisoned");
            *written += n;
            shared.written_cv.notify_all();
        }

        if shared.shutdown.load(Ordering::Acquire) {
            let empty = shared
                .queue
                .lock()
                .expect("pipeline queue poisoned")
                .is_empty();
            if empty {
                return;
            }
            continue; // residue to drain before exiting
        }
        if n == 0 && !shared.data_ready.load(Ordering::Acquire) {
            parker.park();
        }
    }
}

/// Buffered pipeline between producers and one terminal sink writer.
pub struct Pipeline {
    shared: Arc<PipelineShared>,
    drain: Option<JoinHandle<()>>,
}

impl Pipeline {
    /// Spawns the drain thread for `writer`.
    pub fn new(writer: Arc<dyn SinkWriter>) -> Self {
        let parker = Parker::new();
        let shared = Arc::new(PipelineShared {
            queue: Mutex::new(VecDeque::new()),
            data_ready: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            unparker: parker.unparker().clone(),
            pushed: AtomicU64::new(0),
            written: Mutex::new(0),
            written_cv: Condvar::new(),
            errors: Mutex::new(Vec::new()),
            writer,
        });
        let drain = {
            let shared = Arc::clone(&shared);
            std::thread::Builder::new()
                .name("logq-drain".into())
                .spawn(move || drain_loop(shared, parker))
                .expect("failed to spawn drain thread")
        };
        Self {
            shared,
            drain: Some(drain),
        }
    }

    /// Enqueues a record, split into 4 KiB chunks. Signals the drain thread
    /// once the queue reaches the batch threshold. Never blocks on the sink.
    pub fn push(&self, record: &str) {
        if record.is_empty() {
            return;
        }
        let signal = {
            let mut queue = self.shared.queue.lock().expect("pipeline queue poisoned");
            let before = queue.len();
            chunk_record(record, &mut queue);
            self.shared
                .pushed
                .fetch_add((queue.len() - before) as u64, Ordering::AcqRel);
            queue.len() >= BATCH_SIGNAL_LEN
        };
        if signal {
            self.shared.data_ready.store(true, Ordering::Release);
            self.shared.unparker.unpark();
        }
    }

    /// Barrier flush: returns once every chunk pushed before this call has
    /// been handed through the sink writer.
    pub fn flush(&self) {
        let target = self.shared.pushed.load(Ordering::Acquire);
        self.shared.data_ready.store(true, Ordering::Release);
        self.shared.unparker.unpark();

        let mut written = self
            .shared
            .written
            .lock()
            .expect("written counter poisoned");
        while *written < target {
            written = self
                .shared
                .written_cv
                .wait(written)
                .expect("written counter poisoned");
        }
    }

    /// Chunks currently queued (diagnostic).
    pub fn queued(&self) -> usize {
        self.shared
            .queue
            .lock()
            .expect("pipeline queue poisoned")
            .len()
    }

    /// Snapshot of captured sink errors, oldest first.
    pub fn errors(&self) -> Vec<CapturedError> {
        self.shared
            .errors
            .lock()
            .expect("error ledger poisoned")
            .clone()
    }

    /// Records a producer-side failure (rotation, range checks) in the same
    /// ledger as drain-side write failures.
    pub(crate) fn capture_error(&self, err: SinkError) {
        self.shared.capture(err);
    }

    /// Appends every captured error to the fixed-name ledger file.
    fn flush_error_ledger(&self) {
        let errors = self.errors();
        if errors.is_empty() {
            return;
        }
        let _guard = LEDGER_FILE_LOCK.lock().expect("ledger file lock poisoned");
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(ERROR_LEDGER_FILE);
        match file {
            Ok(mut file) => {
                for captured in &errors {
                    if let Err(err) = file.write_all(captured.ledger_line().as_bytes()) {
                        warn!(%err, "could not append to the error ledger file");
                        break;
                    }
                }
            }
            Err(err) => warn!(%err, "could not open the error ledger file"),
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        self.shared.unparker.unpark();
        if let Some(drain) = self.drain.take() {
            if drain.join().is_err() {
                warn!("drain thread panicked during shutdown");
            }
        }
        self.flush_error_ledger();
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("queued", &self.queued())
            .field("errors", &self.errors().len())
            .finish()
    }
}
