//! In-process task execution engine with bounded observability plumbing.
//!
//! Two cooperating subsystems:
//!
//! - A **worker pool** ([`pool`]): one-shot tasks with type-erased results,
//!   a fixed-size OS-thread worker set over a single shared FIFO, and a
//!   dependency DAG that releases tasks into the pool as their predecessors
//!   complete.
//! - A **sink pipeline** ([`logq`]): producers push text records into a
//!   buffered queue; one background drain thread batches them into a
//!   terminal sink — a size-rotating file or standard output. Write
//!   failures are captured, never thrown at producers.
//!
//! High-level flow (pool):
//! 1) `submit` builds a task and enqueues it; the caller keeps the handle.
//! 2) A worker pops the task, invokes it with panic isolation, and resolves
//!    the handle.
//! 3) `reset`/`pause`/drop manage the worker set from quiescent states only.
//!
//! High-level flow (pipeline):
//! Record -> 4 KiB chunks -> queue -> drain thread -> sink writer -> file
//! rotation / stdout, with a barrier `flush()` and an error ledger.
//!
//! No async runtime anywhere: workers and the drain thread are plain OS
//! threads coordinated by mutexes, condvars, atomics, and a parker.
//!
//! ```
//! use taskmill::pool::ThreadPool;
//!
//! let pool = ThreadPool::new(2).unwrap();
//! let handle = pool.submit(|| 6 * 7);
//! assert_eq!(handle.wait().unwrap().downcast::<i32>().unwrap(), 42);
//! ```

pub mod clock;
pub mod config;
pub mod format;
pub mod logq;
pub mod pool;

pub use config::{build_sink, default_sink, init_default, LogConfig, LogSink};
pub use logq::{ConsoleSink, FileSink, Pipeline, RecordWrite, SinkError, SinkWriter};
pub use pool::{
    DagError, PoolError, Task, TaskDag, TaskError, TaskHandle, TaskId, TaskValue, ThreadPool,
};
