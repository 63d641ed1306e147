//! One-shot task: an erased thunk, a process-wide identity, and a
//! single-consumer result slot.
//!
//! A task is built empty, armed with [`submit`](Task::submit), and consumed
//! exactly once — by a worker through [`into_closure`](Task::into_closure),
//! or synchronously through [`run`](Task::run) / [`run_and_forget`](Task::run_and_forget).
//!
//! # Identity
//!
//! Identifiers come from one process-wide `AtomicU32` fetch-add starting at
//! 1; id 0 ([`TaskId::INVALID`]) is reserved for "not yet submitted".
//!
//! # Panic isolation
//!
//! The thunk runs under `catch_unwind`. A panic becomes
//! [`TaskError::ThunkPanicked`] in the result slot and never unwinds into
//! the invoking worker.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU32, Ordering};

use tracing::debug;

use super::error::TaskError;
use super::value::{self, Promise, TaskHandle, TaskValue};

static NEXT_TASK_ID: AtomicU32 = AtomicU32::new(1);

/// Process-wide task identifier. Zero is reserved for "invalid".
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u32);

impl TaskId {
    /// The reserved not-a-task id.
    pub const INVALID: TaskId = TaskId(0);

    /// Allocates a fresh identifier.
    pub(crate) fn next() -> TaskId {
        TaskId(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[cfg(test)]
    pub(crate) fn from_u32(raw: u32) -> TaskId {
        TaskId(raw)
    }

    /// Raw numeric form, for diagnostics.
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// True unless this is [`TaskId::INVALID`].
    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for TaskId {
    fn default() -> Self {
        TaskId::INVALID
    }
}

type Thunk = Box<dyn FnOnce() -> TaskValue + Send>;

/// Runs a thunk with panic isolation.
fn run_thunk(thunk: Thunk) -> Result<TaskValue, TaskError> {
    panic::catch_unwind(AssertUnwindSafe(thunk)).map_err(TaskError::from_panic)
}

/// A one-shot unit of work with identity and a result channel.
#[derive(Default)]
pub struct Task {
    id: TaskId,
    name: Option<Box<str>>,
    thunk: Option<Thunk>,
    promise: Option<Promise>,
    handle: Option<TaskHandle>,
}

impl Task {
    /// Creates an empty task. It has no thunk and the invalid id until
    /// [`submit`](Self::submit) arms it.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds and arms a task in one step.
    pub fn from_fn<F, R>(f: F) -> Self
    where
        F: FnOnce() -> R + Send + 'static,
        R: Any + Send,
    {
        let mut task = Self::new();
        task.submit(f);
        task
    }

    /// Arms the task with a thunk and assigns a fresh identifier.
    ///
    /// Arguments are whatever the closure captures; `FnOnce` is deliberate —
    /// the thunk is moved to its worker and invoked once, so nothing needs
    /// to be copyable. A `()`-returning closure fulfils the slot with the
    /// empty [`TaskValue`].
    ///
    /// Calling `submit` on an already-armed task replaces the thunk and
    /// invalidates any outstanding handle (its consumer observes
    /// [`TaskError::Invalidated`]).
    pub fn submit<F, R>(&mut self, f: F)
    where
        F: FnOnce() -> R + Send + 'static,
        R: Any + Send,
    {
        self.id = TaskId::next();
        // Dropping a prior unfulfilled promise resolves the orphaned handle.
        let (promise, handle) = value::slot(self.id);
        self.thunk = Some(Box::new(move || TaskValue::from_output(f())));
        self.promise = Some(promise);
        self.handle = Some(handle);
    }

    /// Attaches a human-readable name.
    pub fn with_name(mut self, name: impl Into<Box<str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn set_name(&mut self, name: impl Into<Box<str>>) {
        self.name = Some(name.into());
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    /// True while a thunk is pending.
    pub fn is_armed(&self) -> bool {
        self.thunk.is_some()
    }

    /// Invokes the thunk on the caller's thread and returns the value
    /// synchronously, fulfilling the result slot on the way.
    ///
    /// When the handle has already been taken by another consumer, the value
    /// is routed there and the caller receives the empty value (or a copy of
    /// the error). When the task still owns its handle, `run` consumes it —
    /// a later [`take_handle`](Self::take_handle) fails `HandleAlreadyTaken`.
    pub fn run(&mut self) -> Result<TaskValue, TaskError> {
        let thunk = self.thunk.take().ok_or(TaskError::EmptyTask)?;
        let outcome = run_thunk(thunk);
        let promise = self
            .promise
            .take()
            .expect("armed task without a promise");

        match self.handle.take() {
            Some(handle) => {
                promise.fulfil(outcome);
                handle.wait()
            }
            None => {
                let err = outcome.as_ref().err().cloned();
                promise.fulfil(outcome);
                match err {
                    Some(e) => Err(e),
                    None => Ok(TaskValue::empty()),
                }
            }
        }
    }

    /// Invokes the thunk and fulfils the slot without yielding the value to
    /// the caller. No-op when nothing is pending.
    pub fn run_and_forget(&mut self) {
        let Some(thunk) = self.thunk.take() else {
            debug!(task = %self.id, "run_and_forget on an empty task");
            return;
        };
        let outcome = run_thunk(thunk);
        self.promise
            .take()
            .expect("armed task without a promise")
            .fulfil(outcome);
    }

    /// Takes the result handle. Callable at most once per submit.
    pub fn take_handle(&mut self) -> Result<TaskHandle, TaskError> {
        self.handle.take().ok_or(TaskError::HandleAlreadyTaken)
    }

    /// Adapts the task to a nullary callable that invokes
    /// [`run_and_forget`](Self::run_and_forget). This is the shape the pool's
    /// worker loop consumes.
    pub fn into_closure(mut self) -> Box<dyn FnOnce() + Send> {
        Box::new(move || self.run_and_forget())
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("armed", &self.is_armed())
            .finish()
    }
}
