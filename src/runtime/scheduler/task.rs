//! Task descriptors.
//!
//! A [`Task`] binds an entry point to its packed [`Params`]. It is created by
//! `spawn`, claimed by exactly one worker at a time, and discarded once its
//! body completes. While its body is parked on an empty cell the task is
//! held by that cell's waiter list and by its pool's task registry; shutdown
//! empties the registry and drops whatever is left there.

use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::task::Wake;

use parking_lot::Mutex;

use super::run::TaskFuture;
use crate::runtime::error::RuntimeResult;
use crate::runtime::value::Params;

/// Unique task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub usize);

impl TaskId {
    /// Get the inner value.
    #[inline]
    pub fn inner(&self) -> usize {
        self.0
    }
}

impl From<usize> for TaskId {
    fn from(val: usize) -> Self {
        Self(val)
    }
}

impl From<TaskId> for usize {
    fn from(val: TaskId) -> Self {
        val.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "Task({})", self.0)
    }
}

/// Task state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Waiting in a ready queue.
    Queued,
    /// Being polled by a worker.
    Running,
    /// Parked on an empty cell; not in any queue.
    Suspended,
    /// Running, and woken while running. Re-queued once the poll returns.
    Notified,
    /// Body returned successfully.
    Completed,
    /// Body returned an error or panicked.
    Failed,
}

impl TaskState {
    /// Convert from u8 (for atomic storage).
    #[inline]
    pub fn from_u8(val: u8) -> Self {
        match val {
            0 => TaskState::Queued,
            1 => TaskState::Running,
            2 => TaskState::Suspended,
            3 => TaskState::Notified,
            4 => TaskState::Completed,
            5 => TaskState::Failed,
            _ => TaskState::Queued,
        }
    }

    /// Convert to u8 (for atomic storage).
    #[inline]
    pub fn as_u8(&self) -> u8 {
        match self {
            TaskState::Queued => 0,
            TaskState::Running => 1,
            TaskState::Suspended => 2,
            TaskState::Notified => 3,
            TaskState::Completed => 4,
            TaskState::Failed => 5,
        }
    }

    /// Check if the task will never run again.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed)
    }
}

/// Boxed entry point: turns the packed arguments into the task's future.
pub(crate) type BoxedEntry = Box<dyn FnOnce(Params) -> RuntimeResult<TaskFuture> + Send>;

/// Where the task's work currently lives.
pub(crate) enum Stage {
    /// Not yet claimed; arguments still packed.
    Unclaimed { entry: BoxedEntry, params: Params },
    /// Claimed at least once; the continuation.
    Started(TaskFuture),
    /// Finished; nothing left to run.
    Consumed,
}

/// Hook through which a woken task re-enters its pool.
pub(crate) trait Schedule: Send + Sync {
    /// Put a task whose state is already `Queued` back into a ready queue.
    fn reschedule(
        &self,
        task: Arc<Task>,
    );
}

/// A task that can be scheduled for execution.
pub struct Task {
    /// Unique task ID.
    id: TaskId,
    /// Task name for logging.
    name: String,
    /// Current state (atomic for thread-safe access).
    state: AtomicU8,
    /// Only touched by the worker holding the task in `Running`.
    stage: Mutex<Stage>,
    /// Owning pool; dangling after the pool is gone.
    scheduler: Weak<dyn Schedule>,
}

impl fmt::Debug for Task {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}

impl Task {
    /// Create a queued task.
    pub(crate) fn new(
        id: TaskId,
        name: String,
        entry: BoxedEntry,
        params: Params,
        scheduler: Weak<dyn Schedule>,
    ) -> Self {
        Self {
            id,
            name,
            state: AtomicU8::new(TaskState::Queued.as_u8()),
            stage: Mutex::new(Stage::Unclaimed { entry, params }),
            scheduler,
        }
    }

    /// Get the task ID.
    #[inline]
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Get the task name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the current state.
    #[inline]
    pub fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Set the task state unconditionally.
    #[inline]
    pub(crate) fn set_state(
        &self,
        state: TaskState,
    ) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    /// Atomically move from `from` to `to`; returns the observed state on failure.
    #[inline]
    pub(crate) fn transition(
        &self,
        from: TaskState,
        to: TaskState,
    ) -> Result<(), TaskState> {
        self.state
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(TaskState::from_u8)
    }

    /// Lock the stage for polling.
    #[inline]
    pub(crate) fn stage(&self) -> parking_lot::MutexGuard<'_, Stage> {
        self.stage.lock()
    }

    /// Check if the task has finished.
    #[inline]
    pub fn is_finished(&self) -> bool {
        self.state().is_terminal()
    }
}

impl Wake for Task {
    fn wake(self: Arc<Self>) {
        loop {
            match self.state() {
                TaskState::Suspended => {
                    if self.transition(TaskState::Suspended, TaskState::Queued).is_ok() {
                        match self.scheduler.upgrade() {
                            Some(scheduler) => scheduler.reschedule(self),
                            None => tracing::debug!(task = %self.id, "woken after its pool was dropped"),
                        }
                        return;
                    }
                }
                TaskState::Running => {
                    if self.transition(TaskState::Running, TaskState::Notified).is_ok() {
                        return;
                    }
                }
                // Already queued, already notified, or done.
                _ => return,
            }
        }
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.clone().wake();
    }
}

/// Thread-safe task ID generator.
#[derive(Debug, Default)]
pub struct TaskIdGenerator {
    next_id: AtomicUsize,
}

impl TaskIdGenerator {
    /// Create a new task ID generator.
    #[inline]
    pub fn new() -> Self {
        Self {
            next_id: AtomicUsize::new(0),
        }
    }

    /// Generate the next task ID.
    #[inline]
    #[allow(clippy::should_implement_trait)]
    pub fn next(&self) -> TaskId {
        TaskId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}
