//! Task execution engine: one-shot tasks, the fixed-size worker pool, and
//! the dependency DAG that gates readiness.
//!
//! Flow: build a [`Task`] (or let [`ThreadPool::submit`] build one), the
//! pool dispatches it to a worker, the worker resolves its [`TaskHandle`].
//! A [`TaskDag`] sits above the pool for workloads with inter-task ordering:
//! zero-indegree tasks drain into the pool, completions retire vertices and
//! release their successors.

pub mod core;
pub mod dag;
pub mod error;
pub mod task;
pub mod value;

pub use self::core::ThreadPool;
pub use self::dag::TaskDag;
pub use self::error::{DagError, PoolError, TaskError};
pub use self::task::{Task, TaskId};
pub use self::value::{TaskHandle, TaskValue};
