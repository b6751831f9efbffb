//! Work stealing for load balancing across worker threads.
//!
//! Each worker owns a [`TaskQueue`]. Tasks spawned or woken on a worker land
//! in its own queue; idle workers take batches from the back of a randomly
//! chosen victim.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rand::Rng;
use tracing::trace;

use super::queue::TaskQueue;
use super::task::Task;

/// Statistics about work stealing operations.
#[derive(Debug, Default)]
pub struct StealStats {
    /// Number of successful steals.
    pub steal_successes: AtomicUsize,
    /// Number of failed steal attempts.
    pub steal_failures: AtomicUsize,
    /// Total number of steal attempts.
    pub total_attempts: AtomicUsize,
    /// Total tasks stolen.
    pub tasks_stolen: AtomicUsize,
}

impl StealStats {
    /// Record a successful steal.
    #[inline]
    pub fn record_success(
        &self,
        count: usize,
    ) {
        self.steal_successes.fetch_add(1, Ordering::Relaxed);
        self.tasks_stolen.fetch_add(count, Ordering::Relaxed);
        self.total_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed steal attempt.
    #[inline]
    pub fn record_failure(&self) {
        self.steal_failures.fetch_add(1, Ordering::Relaxed);
        self.total_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Get success rate as a fraction.
    pub fn success_rate(&self) -> f64 {
        let total = self.total_attempts.load(Ordering::Relaxed);
        if total == 0 {
            return 1.0;
        }
        let successes = self.steal_successes.load(Ordering::Relaxed);
        successes as f64 / total as f64
    }
}

/// Per-worker queues plus the stealing policy over them.
#[derive(Debug)]
pub struct WorkStealer {
    /// All worker queues, indexed by worker id.
    queues: Vec<Arc<TaskQueue>>,
    /// Statistics.
    stats: Arc<StealStats>,
}

impl WorkStealer {
    /// Create a new work stealer with the given number of workers.
    pub fn new(num_workers: usize) -> Self {
        Self {
            queues: (0..num_workers).map(|_| Arc::new(TaskQueue::new())).collect(),
            stats: Arc::new(StealStats::default()),
        }
    }

    /// Get the number of workers.
    #[inline]
    pub fn num_workers(&self) -> usize {
        self.queues.len()
    }

    /// Get a worker's local queue.
    #[inline]
    pub fn queue(
        &self,
        worker_id: usize,
    ) -> Option<&Arc<TaskQueue>> {
        self.queues.get(worker_id)
    }

    /// Push onto a worker's local queue. Returns the task if the id is unknown.
    #[inline]
    pub fn push(
        &self,
        worker_id: usize,
        task: Arc<Task>,
    ) -> Result<(), Arc<Task>> {
        match self.queues.get(worker_id) {
            Some(queue) => {
                queue.push(task);
                Ok(())
            }
            None => Err(task),
        }
    }

    /// Try to get a task from a worker's own queue.
    #[inline]
    pub fn try_local(
        &self,
        worker_id: usize,
    ) -> Option<Arc<Task>> {
        self.queues.get(worker_id)?.pop_front()
    }

    /// Steal up to `max_count` tasks for `thief` from random victims.
    ///
    /// Visits every other worker at most once, starting at a random offset.
    pub fn steal_batch(
        &self,
        thief: usize,
        max_count: usize,
    ) -> Vec<Arc<Task>> {
        let num_workers = self.num_workers();
        if num_workers < 2 || max_count == 0 {
            return Vec::new();
        }

        let start = rand::rng().random_range(0..num_workers);
        for offset in 0..num_workers {
            let victim = (start + offset) % num_workers;
            if victim == thief {
                continue;
            }

            let stolen = self.steal_from(victim, max_count);
            if !stolen.is_empty() {
                trace!(thief, victim, count = stolen.len(), "stole tasks");
                self.stats.record_success(stolen.len());
                return stolen;
            }
        }

        self.stats.record_failure();
        Vec::new()
    }

    /// Steal from the back of a specific victim's queue.
    fn steal_from(
        &self,
        victim: usize,
        max_count: usize,
    ) -> Vec<Arc<Task>> {
        match self.queues.get(victim) {
            Some(queue) => queue.steal_back(max_count),
            None => Vec::new(),
        }
    }

    /// Total number of tasks across all local queues.
    pub fn total_len(&self) -> usize {
        self.queues.iter().map(|q| q.len()).sum()
    }

    /// Remove every task from every local queue.
    pub fn drain_all(&self) -> Vec<Arc<Task>> {
        self.queues.iter().flat_map(|q| q.drain()).collect()
    }

    /// Get steal statistics.
    #[inline]
    pub fn stats(&self) -> &Arc<StealStats> {
        &self.stats
    }
}
