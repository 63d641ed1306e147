//! Dynamic result values and the single-consumer result slot.
//!
//! # Value erasure
//!
//! A thunk's return type is erased behind [`TaskValue`], a thin wrapper over
//! `Box<dyn Any + Send>` queried by expected runtime type. A `()`-returning
//! thunk fulfils the slot with the *empty* value so "ran to completion" and
//! "produced a unit" are indistinguishable, which is what every consumer of
//! a void task wants.
//!
//! # Slot protocol
//!
//! `slot()` returns a linked `Promise`/`TaskHandle` pair. The promise is
//! fulfilled exactly once (by the worker, or by `Task::run` on the caller's
//! thread); the handle blocks until fulfilment and yields the value at most
//! once. The mutex/condvar pair inside the slot is the only worker→consumer
//! ordering edge, so fulfilment happens-before the consumer's wake-up.
//!
//! A promise dropped without fulfilment (its task was re-submitted and the
//! old thunk discarded) resolves the handle with [`TaskError::Invalidated`]
//! instead of leaving a consumer blocked forever.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use super::error::TaskError;
use super::task::TaskId;

// ============================================================================
// TaskValue
// ============================================================================

/// Type-erased container for a task's result.
pub struct TaskValue(Option<Box<dyn Any + Send>>);

impl TaskValue {
    /// The empty value produced by void thunks.
    pub fn empty() -> Self {
        Self(None)
    }

    /// Wraps a concrete payload.
    pub fn new<T: Any + Send>(value: T) -> Self {
        Self(Some(Box::new(value)))
    }

    /// Wraps a thunk's output, mapping `()` to the empty value.
    pub(crate) fn from_output<R: Any + Send>(output: R) -> Self {
        if TypeId::of::<R>() == TypeId::of::<()>() {
            Self::empty()
        } else {
            Self::new(output)
        }
    }

    /// True for the empty value.
    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    /// Consumes the container, yielding the payload if it has the expected
    /// type. On mismatch the container is handed back unchanged.
    pub fn downcast<T: Any>(self) -> Result<T, TaskValue> {
        match self.0 {
            Some(boxed) => match boxed.downcast::<T>() {
                Ok(v) => Ok(*v),
                Err(boxed) => Err(Self(Some(boxed))),
            },
            None => Err(Self(None)),
        }
    }

    /// Borrows the payload if it has the expected type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.as_deref().and_then(|b| b.downcast_ref::<T>())
    }
}

impl fmt::Debug for TaskValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "TaskValue(empty)")
        } else {
            write!(f, "TaskValue(..)")
        }
    }
}

// ============================================================================
// Result slot
// ============================================================================

enum SlotState {
    Pending,
    Ready(Result<TaskValue, TaskError>),
    Taken,
}

struct Slot {
    state: Mutex<SlotState>,
    ready: Condvar,
}

/// Producer half of the slot. Fulfilled exactly once.
pub(crate) struct Promise {
    slot: Arc<Slot>,
    fulfilled: bool,
}

impl Promise {
    /// Stores the outcome and wakes the waiting consumer, if any.
    pub(crate) fn fulfil(mut self, outcome: Result<TaskValue, TaskError>) {
        self.store(outcome);
        self.fulfilled = true;
    }

    fn store(&self, outcome: Result<TaskValue, TaskError>) {
        let mut state = self.slot.state.lock().expect("result slot poisoned");
        debug_assert!(
            matches!(*state, SlotState::Pending),
            "result slot fulfilled twice"
        );
        *state = SlotState::Ready(outcome);
        self.slot.ready.notify_all();
    }
}

impl Drop for Promise {
    fn drop(&mut self) {
        // An unfulfilled promise means the thunk was discarded (re-submit).
        // Resolve the orphaned handle rather than stranding its consumer.
        if !self.fulfilled {
            self.store(Err(TaskError::Invalidated));
        }
    }
}

/// Future-like handle yielding a task's result at most once.
///
/// Retrieval blocks until the task has run. Single consumption is enforced
/// by `wait(self)` taking the handle by value.
pub struct TaskHandle {
    slot: Arc<Slot>,
    task_id: TaskId,
}

impl TaskHandle {
    /// Identifier of the task this handle belongs to.
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Blocks until the task has run, then yields its outcome.
    pub fn wait(self) -> Result<TaskValue, TaskError> {
        let mut state = self.slot.state.lock().expect("result slot poisoned");
        loop {
            match std::mem::replace(&mut *state, SlotState::Taken) {
                SlotState::Ready(outcome) => return outcome,
                SlotState::Pending => {
                    *state = SlotState::Pending;
                    state = self
                        .slot
                        .ready
                        .wait(state)
                        .expect("result slot poisoned");
                }
                SlotState::Taken => unreachable!("slot consumed twice"),
            }
        }
    }

    /// Like [`wait`](Self::wait), but gives up after `timeout`.
    ///
    /// On timeout the handle is returned so the consumer can retry.
    pub fn wait_timeout(self, timeout: Duration) -> Result<Result<TaskValue, TaskError>, Self> {
        let deadline = std::time::Instant::now() + timeout;
        let mut state = self.slot.state.lock().expect("result slot poisoned");
        loop {
            match std::mem::replace(&mut *state, SlotState::Taken) {
                SlotState::Ready(outcome) => return Ok(outcome),
                SlotState::Pending => {
                    *state = SlotState::Pending;
                    let now = std::time::Instant::now();
                    if now >= deadline {
                        drop(state);
                        return Err(self);
                    }
                    let (guard, _) = self
                        .slot
                        .ready
                        .wait_timeout(state, deadline - now)
                        .expect("result slot poisoned");
                    state = guard;
                }
                SlotState::Taken => unreachable!("slot consumed twice"),
            }
        }
    }

    /// True once the task has run and the outcome is waiting.
    pub fn is_ready(&self) -> bool {
        matches!(
            *self.slot.state.lock().expect("result slot poisoned"),
            SlotState::Ready(_)
        )
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("task_id", &self.task_id)
            .field("ready", &self.is_ready())
            .finish()
    }
}

/// Creates a linked promise/handle pair for `task_id`.
pub(crate) fn slot(task_id: TaskId) -> (Promise, TaskHandle) {
    let slot = Arc::new(Slot {
        state: Mutex::new(SlotState::Pending),
        ready: Condvar::new(),
    });
    (
        Promise {
            slot: Arc::clone(&slot),
            fulfilled: false,
        },
        TaskHandle { slot, task_id },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn empty_value_reports_empty() {
        assert!(TaskValue::empty().is_empty());
        assert!(!TaskValue::new(1u8).is_empty());
        assert!(TaskValue::from_output(()).is_empty());
    }

    #[test]
    fn downcast_succeeds_on_matching_type() {
        let v = TaskValue::new(41i32);
        assert_eq!(v.downcast_ref::<i32>(), Some(&41));
        assert_eq!(v.downcast::<i32>().unwrap(), 41);
    }

    #[test]
    fn downcast_mismatch_returns_value_unchanged() {
        let v = TaskValue::new(String::from("kept"));
        let v = v.downcast::<i32>().unwrap_err();
        assert_eq!(v.downcast::<String>().unwrap(), "kept");
    }

    #[test]
    fn handle_observes_fulfilment_across_threads() {
        let (promise, handle) = slot(TaskId::from_u32(1));
        let producer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            promise.fulfil(Ok(TaskValue::new(7u64)));
        });
        let value = handle.wait().unwrap();
        assert_eq!(value.downcast::<u64>().unwrap(), 7);
        producer.join().unwrap();
    }

    #[test]
    fn dropped_promise_invalidates_handle() {
        let (promise, handle) = slot(TaskId::from_u32(2));
        drop(promise);
        assert_eq!(handle.wait().unwrap_err(), TaskError::Invalidated);
    }

    #[test]
    fn wait_timeout_returns_handle_when_pending() {
        let (promise, handle) = slot(TaskId::from_u32(3));
        let handle = handle
            .wait_timeout(Duration::from_millis(5))
            .expect_err("slot should still be pending");
        promise.fulfil(Ok(TaskValue::empty()));
        assert!(handle.wait().unwrap().is_empty());
    }
}
