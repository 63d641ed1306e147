//! Error types for the pool, task, and DAG stages.
//!
//! Errors are stage-specific rather than one monolithic enum, and all enums
//! are `#[non_exhaustive]` so variants can be added without breaking
//! callers; consumers should include a fallback match arm.
//!
//! # Design Notes
//! - A failure inside a thunk never crosses a worker's stack frame: it is
//!   converted to [`TaskError::ThunkPanicked`] and terminates in the task's
//!   result handle.
//! - DAG duplicate insertions are diagnostics, not errors, so they have no
//!   variant here; missing vertices and cycles do.

use std::fmt;

use super::task::TaskId;

/// Errors from pool construction and reconfiguration.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum PoolError {
    /// The pool was asked for zero workers.
    InvalidSize,
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSize => write!(f, "worker count must be > 0"),
        }
    }
}

impl std::error::Error for PoolError {}

/// Errors from task execution and handle retrieval.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum TaskError {
    /// `run()` was called with no thunk pending.
    EmptyTask,
    /// `take_handle()` was called a second time.
    HandleAlreadyTaken,
    /// The thunk panicked; the payload's message, if any.
    ThunkPanicked { detail: String },
    /// The handle was orphaned by a re-submit that replaced the thunk.
    Invalidated,
}

impl TaskError {
    /// Converts a caught panic payload into a `ThunkPanicked` variant.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let detail = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_owned()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            String::from("non-string panic payload")
        };
        Self::ThunkPanicked { detail }
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyTask => write!(f, "no thunk pending"),
            Self::HandleAlreadyTaken => write!(f, "result handle already taken"),
            Self::ThunkPanicked { detail } => write!(f, "thunk panicked: {detail}"),
            Self::Invalidated => write!(f, "handle invalidated by a later submit"),
        }
    }
}

impl std::error::Error for TaskError {}

/// Errors from DAG mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum DagError {
    /// The operation names a vertex or edge that is not in the graph.
    Missing { id: TaskId, detail: &'static str },
    /// Adding the edge would make the graph cyclic.
    Cycle { pred: TaskId, succ: TaskId },
    /// The vertex/edge maps disagree; the graph is in an inconsistent state.
    RemovalInconsistent { id: TaskId, detail: &'static str },
}

impl fmt::Display for DagError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing { id, detail } => {
                write!(f, "task {}: {detail}", id.as_u32())
            }
            Self::Cycle { pred, succ } => {
                write!(
                    f,
                    "edge {} -> {} would create a cycle",
                    pred.as_u32(),
                    succ.as_u32()
                )
            }
            Self::RemovalInconsistent { id, detail } => {
                write!(f, "graph inconsistent at task {}: {detail}", id.as_u32())
            }
        }
    }
}

impl std::error::Error for DagError {}
