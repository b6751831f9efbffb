//! Task queue for the scheduler
//!
//! Per-worker ready queue. The owner pops from the front, thieves take from
//! the back.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use super::task::Task;

/// A thread-safe task queue supporting multiple producers and consumers.
#[derive(Debug, Default)]
pub struct TaskQueue {
    /// Inner deque protected by mutex
    inner: Mutex<VecDeque<Arc<Task>>>,
}

impl TaskQueue {
    /// Create a new empty task queue.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a task to the back of the queue.
    #[inline]
    pub fn push(
        &self,
        task: Arc<Task>,
    ) {
        self.inner.lock().push_back(task);
    }

    /// Push a batch of tasks to the back of the queue.
    #[inline]
    pub fn extend(
        &self,
        tasks: impl IntoIterator<Item = Arc<Task>>,
    ) {
        self.inner.lock().extend(tasks);
    }

    /// Pop a task from the front of the queue.
    #[inline]
    pub fn pop_front(&self) -> Option<Arc<Task>> {
        self.inner.lock().pop_front()
    }

    /// Take up to `max` tasks from the back, preserving their order.
    pub fn steal_back(
        &self,
        max: usize,
    ) -> Vec<Arc<Task>> {
        let mut inner = self.inner.lock();
        // Never more than half of the victim's work, rounded up.
        let count = max.min(inner.len().div_ceil(2));
        let at = inner.len() - count;
        inner.split_off(at).into()
    }

    /// Remove every queued task.
    #[inline]
    pub fn drain(&self) -> Vec<Arc<Task>> {
        self.inner.lock().drain(..).collect()
    }

    /// Get the number of tasks in the queue.
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Check if the queue is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
