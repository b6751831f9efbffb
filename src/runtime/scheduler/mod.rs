//! Task pool for dataflow task graphs
//!
//! This module provides the [`TaskPool`], a work-stealing pool of worker
//! threads that runs spawned tasks to completion. A task body is a future;
//! awaiting an empty [`IVar`](crate::runtime::ivar::IVar) parks the task
//! without occupying its worker, and filling the cell re-queues it.

pub mod queue;
pub mod run;
pub mod task;
pub mod work_stealer;

pub use queue::TaskQueue;
pub use run::{run, TaskEntry, TaskFn, TaskFuture, TaskOutput};
pub use task::{Task, TaskId, TaskIdGenerator, TaskState};
pub use work_stealer::{StealStats, WorkStealer};

use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll, Waker};
use std::thread;
use std::time::Duration;

use crossbeam::deque::{Injector, Steal};
use crossbeam::utils::Backoff;
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span, error, info, warn};

use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::value::{FromParams, Params};
use task::{BoxedEntry, Schedule, Stage};

/// What happens when a task body breaks a cell or typing contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultPolicy {
    /// Log the error and drop the offending task; the pool keeps going.
    #[default]
    AbortTask,
    /// Log the error and abort the process.
    AbortProcess,
}

/// Pool configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of worker threads.
    pub num_workers: usize,
    /// Maximum number of spawned tasks waiting for their first run.
    /// Zero means unbounded.
    pub max_queue_size: usize,
    /// Work stealing batch size.
    pub steal_batch: usize,
    /// Whether to use work stealing.
    pub use_work_stealing: bool,
    /// How long an idle worker parks before rechecking the queues.
    pub idle_timeout_ms: u64,
    /// Worker thread stack size in bytes.
    pub stack_size: usize,
    /// Prefix for worker thread names.
    pub thread_name_prefix: String,
    /// Handling of contract violations escaping a task body.
    pub fault_policy: FaultPolicy,
}

impl Default for PoolConfig {
    fn default() -> Self {
        let num_cpus = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);

        Self {
            num_workers: num_cpus,
            max_queue_size: 1024,
            steal_batch: 4,
            use_work_stealing: true,
            idle_timeout_ms: 1,
            stack_size: 2 * 1024 * 1024,
            thread_name_prefix: "ivarpool-worker".to_string(),
            fault_policy: FaultPolicy::AbortTask,
        }
    }
}

impl PoolConfig {
    /// Idle parking timeout.
    #[inline]
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    /// Reject configurations the pool cannot run with.
    pub fn validate(&self) -> RuntimeResult<()> {
        if self.num_workers == 0 {
            return Err(RuntimeError::InvalidConfig(
                "num_workers must be at least 1".to_string(),
            ));
        }
        if self.steal_batch == 0 {
            return Err(RuntimeError::InvalidConfig(
                "steal_batch must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Pool statistics.
#[derive(Debug, Default)]
pub struct PoolStats {
    /// Total tasks accepted by spawn.
    pub tasks_spawned: AtomicUsize,
    /// Total tasks whose body finished successfully.
    pub tasks_completed: AtomicUsize,
    /// Total tasks aborted by an error or a panic.
    pub tasks_failed: AtomicUsize,
    /// Total times a task parked on an empty cell.
    pub tasks_suspended: AtomicUsize,
    /// Total times a parked task was re-queued.
    pub tasks_resumed: AtomicUsize,
    /// Total spawns refused for backpressure.
    pub tasks_rejected: AtomicUsize,
    /// Tasks currently being polled.
    pub running: AtomicUsize,
    /// Peak number of simultaneously polled tasks.
    pub peak_parallelism: AtomicUsize,
}

impl PoolStats {
    /// Update parallelism.
    #[inline]
    fn update_parallelism(
        &self,
        current: usize,
    ) {
        self.peak_parallelism.fetch_max(current, Ordering::Relaxed);
    }

    /// Take a plain copy of every counter.
    pub fn snapshot(&self) -> PoolStatsSnapshot {
        PoolStatsSnapshot {
            tasks_spawned: self.tasks_spawned.load(Ordering::Relaxed),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            tasks_suspended: self.tasks_suspended.load(Ordering::Relaxed),
            tasks_resumed: self.tasks_resumed.load(Ordering::Relaxed),
            tasks_rejected: self.tasks_rejected.load(Ordering::Relaxed),
            peak_parallelism: self.peak_parallelism.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`PoolStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PoolStatsSnapshot {
    pub tasks_spawned: usize,
    pub tasks_completed: usize,
    pub tasks_failed: usize,
    pub tasks_suspended: usize,
    pub tasks_resumed: usize,
    pub tasks_rejected: usize,
    pub peak_parallelism: usize,
}

static NEXT_POOL_ID: AtomicUsize = AtomicUsize::new(0);

/// Identity of a worker thread.
struct WorkerContext {
    pool_id: usize,
    worker_id: usize,
    shared: Weak<Shared>,
}

thread_local! {
    static CURRENT: RefCell<Option<WorkerContext>> = const { RefCell::new(None) };
}

/// Check if the calling thread is a worker of any pool.
pub(crate) fn on_worker_thread() -> bool {
    CURRENT.with(|current| current.borrow().is_some())
}

/// Worker id of the calling thread within the pool `pool_id`.
fn current_worker(pool_id: usize) -> Option<usize> {
    CURRENT.with(|current| {
        current
            .borrow()
            .as_ref()
            .filter(|ctx| ctx.pool_id == pool_id)
            .map(|ctx| ctx.worker_id)
    })
}

/// State shared between the pool handle, its workers and its tasks.
struct Shared {
    id: usize,
    config: PoolConfig,
    /// Ready queue for tasks submitted from outside the pool.
    injector: Injector<Arc<Task>>,
    /// Per-worker local queues.
    work_stealer: WorkStealer,
    /// Workers keep polling while set.
    running: AtomicBool,
    /// Fresh spawns not yet claimed; bounded by `max_queue_size`.
    queued: AtomicUsize,
    /// Tasks queued or being polled. Parked tasks are not counted.
    active: AtomicUsize,
    /// Tasks spawned and not yet finished, parked ones included.
    live: AtomicUsize,
    /// Owning registry of unfinished tasks. A parked task is otherwise held
    /// only by the waker list of the cell its future captures.
    tasks: Mutex<HashMap<TaskId, Arc<Task>>>,
    /// Idle workers park here.
    idle_lock: Mutex<()>,
    idle_cond: Condvar,
    /// `wait_idle` parks here.
    drain_lock: Mutex<()>,
    drain_cond: Condvar,
    stats: PoolStats,
    ids: TaskIdGenerator,
}

impl Shared {
    /// Admit and enqueue a fresh task.
    fn spawn(
        self: &Arc<Self>,
        name: Option<String>,
        entry: BoxedEntry,
        params: Params,
    ) -> RuntimeResult<TaskId> {
        if !self.running.load(Ordering::Acquire) {
            return Err(RuntimeError::PoolShutDown);
        }

        let capacity = self.config.max_queue_size;
        if capacity > 0 {
            let admitted = self
                .queued
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |queued| {
                    (queued < capacity).then_some(queued + 1)
                });
            if admitted.is_err() {
                self.stats.tasks_rejected.fetch_add(1, Ordering::Relaxed);
                debug!(capacity, "spawn rejected by backpressure");
                return Err(RuntimeError::SpawnBackpressure { capacity });
            }
        } else {
            self.queued.fetch_add(1, Ordering::AcqRel);
        }

        let id = self.ids.next();
        let name = name.unwrap_or_else(|| id.to_string());
        let scheduler: Weak<dyn Schedule> = Arc::downgrade(self) as Weak<dyn Schedule>;
        let task = Arc::new(Task::new(id, name, entry, params, scheduler));

        self.active.fetch_add(1, Ordering::AcqRel);
        self.live.fetch_add(1, Ordering::AcqRel);
        self.tasks.lock().insert(id, task.clone());
        self.stats.tasks_spawned.fetch_add(1, Ordering::Relaxed);
        debug!(task = %id, name = task.name(), "spawned");

        self.enqueue(task);
        Ok(id)
    }

    /// Push a queued task: onto the local queue when called from one of our
    /// workers, onto the injector otherwise.
    fn enqueue(
        &self,
        task: Arc<Task>,
    ) {
        let task = match current_worker(self.id) {
            Some(worker_id) => match self.work_stealer.push(worker_id, task) {
                Ok(()) => None,
                Err(task) => Some(task),
            },
            None => Some(task),
        };
        if let Some(task) = task {
            self.injector.push(task);
        }
        self.idle_cond.notify_one();
    }

    /// Next task for `worker_id`: local queue, then injector, then theft.
    fn find_task(
        &self,
        worker_id: usize,
    ) -> Option<Arc<Task>> {
        if let Some(task) = self.work_stealer.try_local(worker_id) {
            return Some(task);
        }

        loop {
            match self.injector.steal() {
                Steal::Success(task) => return Some(task),
                Steal::Empty => break,
                Steal::Retry => continue,
            }
        }

        if self.config.use_work_stealing {
            let mut stolen = self
                .work_stealer
                .steal_batch(worker_id, self.config.steal_batch)
                .into_iter();
            let first = stolen.next();
            if let Some(queue) = self.work_stealer.queue(worker_id) {
                queue.extend(stolen);
            }
            return first;
        }

        None
    }

    fn notify_if_drained(&self) {
        if self.active.load(Ordering::Acquire) == 0 {
            let _guard = self.drain_lock.lock();
            self.drain_cond.notify_all();
        }
    }

    /// Claim and poll one task.
    fn run_task(
        self: &Arc<Self>,
        task: Arc<Task>,
    ) {
        if let Err(state) = task.transition(TaskState::Queued, TaskState::Running) {
            warn!(task = %task.id(), ?state, "claimed a task that was not queued");
            return;
        }

        let running = self.stats.running.fetch_add(1, Ordering::Relaxed) + 1;
        self.stats.update_parallelism(running);

        let waker = Waker::from(task.clone());
        let mut cx = Context::from_waker(&waker);

        let polled = {
            let mut stage = task.stage();
            if let Stage::Unclaimed { .. } = &*stage {
                self.queued.fetch_sub(1, Ordering::AcqRel);
            }

            let polled = panic::catch_unwind(AssertUnwindSafe(|| {
                let mut future = match std::mem::replace(&mut *stage, Stage::Consumed) {
                    Stage::Unclaimed { entry, params } => {
                        debug!(task = %task.id(), args = params.len(), "unpacking");
                        match entry(params) {
                            Ok(future) => future,
                            Err(err) => return Poll::Ready(Err(err)),
                        }
                    }
                    Stage::Started(future) => future,
                    Stage::Consumed => return Poll::Ready(Ok(())),
                };

                let poll = future.as_mut().poll(&mut cx);
                if poll.is_pending() {
                    *stage = Stage::Started(future);
                }
                poll
            }));
            polled
        };

        self.stats.running.fetch_sub(1, Ordering::Relaxed);

        match polled {
            Ok(Poll::Pending) => self.park(task),
            Ok(Poll::Ready(Ok(()))) => {
                task.set_state(TaskState::Completed);
                self.stats.tasks_completed.fetch_add(1, Ordering::Relaxed);
                debug!(task = %task.id(), "completed");
                self.finish(task.id());
            }
            Ok(Poll::Ready(Err(err))) => {
                task.set_state(TaskState::Failed);
                self.stats.tasks_failed.fetch_add(1, Ordering::Relaxed);
                error!(task = %task.id(), name = task.name(), error = %err, "task aborted");
                if err.is_contract_violation() && self.config.fault_policy == FaultPolicy::AbortProcess {
                    error!("aborting process on contract violation");
                    std::process::abort();
                }
                self.finish(task.id());
            }
            Err(payload) => {
                task.set_state(TaskState::Failed);
                self.stats.tasks_failed.fetch_add(1, Ordering::Relaxed);
                let err = RuntimeError::TaskPanicked(panic_message(payload.as_ref()));
                error!(task = %task.id(), name = task.name(), error = %err, "task aborted");
                self.finish(task.id());
            }
        }
    }

    /// The body returned `Pending`: park it unless it was woken meanwhile.
    fn park(
        self: &Arc<Self>,
        task: Arc<Task>,
    ) {
        match task.transition(TaskState::Running, TaskState::Suspended) {
            Ok(()) => {
                self.stats.tasks_suspended.fetch_add(1, Ordering::Relaxed);
                debug!(task = %task.id(), "suspended");
                // From here on the task waits in the registry and in the
                // waker list of whatever cell will wake it.
                drop(task);
                self.active.fetch_sub(1, Ordering::AcqRel);
                self.notify_if_drained();
            }
            Err(_) => {
                // Notified while running: straight back into the queue.
                task.set_state(TaskState::Queued);
                self.enqueue(task);
            }
        }
    }

    fn finish(
        &self,
        id: TaskId,
    ) {
        self.tasks.lock().remove(&id);
        self.live.fetch_sub(1, Ordering::AcqRel);
        self.active.fetch_sub(1, Ordering::AcqRel);
        self.notify_if_drained();
    }

    /// Worker thread main loop.
    fn worker_loop(
        self: &Arc<Self>,
        worker_id: usize,
    ) {
        let span = debug_span!("worker", id = worker_id);
        let _entered = span.enter();

        CURRENT.with(|current| {
            *current.borrow_mut() = Some(WorkerContext {
                pool_id: self.id,
                worker_id,
                shared: Arc::downgrade(self),
            });
        });
        debug!("worker started");

        let backoff = Backoff::new();
        while self.running.load(Ordering::Acquire) {
            if let Some(task) = self.find_task(worker_id) {
                backoff.reset();
                self.run_task(task);
                continue;
            }

            // Spin briefly before parking.
            if !backoff.is_completed() {
                backoff.snooze();
                continue;
            }

            let mut guard = self.idle_lock.lock();
            if self.running.load(Ordering::Acquire) && self.injector.is_empty() {
                self.idle_cond.wait_for(&mut guard, self.config.idle_timeout());
            }
        }

        CURRENT.with(|current| current.borrow_mut().take());
        debug!("worker stopped");
    }

    /// Drop the continuation of every task still registered.
    ///
    /// Only called once the workers are joined. Dropping a future releases
    /// its cell registrations and with them the wakers holding the task.
    fn release_unfinished(&self) -> usize {
        let tasks: Vec<Arc<Task>> = self.tasks.lock().drain().map(|(_, task)| task).collect();
        for task in &tasks {
            task.set_state(TaskState::Failed);
            let stage = std::mem::replace(&mut *task.stage(), Stage::Consumed);
            drop(stage);
            debug!(task = %task.id(), "released at shutdown");
        }
        self.live.fetch_sub(tasks.len(), Ordering::AcqRel);
        tasks.len()
    }

    /// Block until nothing is queued or running.
    fn wait_idle(&self) {
        let mut guard = self.drain_lock.lock();
        while self.active.load(Ordering::Acquire) > 0 {
            self.drain_cond.wait_for(&mut guard, Duration::from_millis(10));
        }
    }
}

impl Schedule for Shared {
    fn reschedule(
        &self,
        task: Arc<Task>,
    ) {
        if !self.running.load(Ordering::Acquire) {
            debug!(task = %task.id(), "woken after shutdown; dropping");
            return;
        }
        self.active.fetch_add(1, Ordering::AcqRel);
        self.stats.tasks_resumed.fetch_add(1, Ordering::Relaxed);
        debug!(task = %task.id(), "resumed");
        self.enqueue(task);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Cloneable spawning handle onto a [`TaskPool`].
///
/// Can be moved into task bodies (it is an opaque task argument) so tasks
/// can spawn further tasks.
#[derive(Clone)]
pub struct PoolHandle {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for PoolHandle {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("PoolHandle")
            .field("id", &self.shared.id)
            .field("running", &self.is_running())
            .finish()
    }
}

crate::opaque_arg!(PoolHandle);

impl PoolHandle {
    /// Spawn a task: fire-and-forget.
    ///
    /// `entry` is called on the worker that claims the task, with `params`
    /// exactly as packed here. The returned id is for logging only; the
    /// task's outcome is observable solely through the cells it writes.
    pub fn spawn(
        &self,
        entry: TaskEntry,
        params: Params,
    ) -> RuntimeResult<TaskId> {
        self.shared.spawn(None, Box::new(entry), params)
    }

    /// Spawn a task with a name used in logs.
    pub fn spawn_named(
        &self,
        name: impl Into<String>,
        entry: TaskEntry,
        params: Params,
    ) -> RuntimeResult<TaskId> {
        self.shared.spawn(Some(name.into()), Box::new(entry), params)
    }

    /// Spawn a typed core function directly, without a hand-written entry
    /// wrapper. Arguments are still packed now and unpacked on the worker.
    pub fn spawn_core<F, Args>(
        &self,
        core: F,
        params: Params,
    ) -> RuntimeResult<TaskId>
    where
        F: TaskFn<Args>,
        Args: FromParams + 'static,
    {
        self.shared
            .spawn(None, Box::new(move |params| run::<F, Args>(core, params)), params)
    }

    /// Check if the pool still accepts work.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Get statistics.
    #[inline]
    pub fn stats(&self) -> &PoolStats {
        &self.shared.stats
    }

    /// Number of spawned tasks waiting for their first run.
    #[inline]
    pub fn queued(&self) -> usize {
        self.shared.queued.load(Ordering::Acquire)
    }

    /// Number of unfinished tasks, parked ones included.
    #[inline]
    pub fn live_tasks(&self) -> usize {
        self.shared.live.load(Ordering::Acquire)
    }

    /// Number of tasks parked on empty cells.
    #[inline]
    pub fn parked_tasks(&self) -> usize {
        let live = self.shared.live.load(Ordering::Acquire);
        live.saturating_sub(self.shared.active.load(Ordering::Acquire))
    }

    /// Block until no task is queued or running.
    ///
    /// Parked tasks do not count: a graph stuck on a cell nobody will fill
    /// is idle.
    pub fn wait_idle(&self) {
        self.shared.wait_idle();
    }
}

/// Spawn onto the pool that owns the calling worker thread.
///
/// Fails with [`RuntimeError::NoCurrentPool`] outside a pool worker.
pub fn spawn(
    entry: TaskEntry,
    params: Params,
) -> RuntimeResult<TaskId> {
    current().ok_or(RuntimeError::NoCurrentPool)?.spawn(entry, params)
}

/// Handle onto the pool that owns the calling worker thread.
pub fn current() -> Option<PoolHandle> {
    CURRENT.with(|current| {
        current
            .borrow()
            .as_ref()
            .and_then(|ctx| ctx.shared.upgrade())
            .map(|shared| PoolHandle { shared })
    })
}

/// Builder for a [`TaskPool`].
#[derive(Debug, Default)]
pub struct PoolBuilder {
    config: PoolConfig,
}

impl PoolBuilder {
    /// Create a new builder with the default configuration.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    #[inline]
    pub fn from_config(config: PoolConfig) -> Self {
        Self { config }
    }

    /// Set the number of workers.
    #[inline]
    pub fn num_workers(
        mut self,
        n: usize,
    ) -> Self {
        self.config.num_workers = n;
        self
    }

    /// Set the queue capacity (zero: unbounded).
    #[inline]
    pub fn max_queue_size(
        mut self,
        n: usize,
    ) -> Self {
        self.config.max_queue_size = n;
        self
    }

    /// Enable or disable work stealing.
    #[inline]
    pub fn work_stealing(
        mut self,
        enabled: bool,
    ) -> Self {
        self.config.use_work_stealing = enabled;
        self
    }

    /// Set the fault policy.
    #[inline]
    pub fn fault_policy(
        mut self,
        policy: FaultPolicy,
    ) -> Self {
        self.config.fault_policy = policy;
        self
    }

    /// Set the worker thread name prefix.
    #[inline]
    pub fn thread_name_prefix(
        mut self,
        prefix: impl Into<String>,
    ) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    /// Start the pool.
    pub fn build(self) -> RuntimeResult<TaskPool> {
        TaskPool::new(self.config)
    }
}

/// A work-stealing pool of worker threads.
///
/// Dropping the pool shuts it down, draining queued and running tasks first.
pub struct TaskPool {
    handle: PoolHandle,
    workers: Vec<thread::JoinHandle<()>>,
}

impl std::fmt::Debug for TaskPool {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("TaskPool")
            .field("id", &self.handle.shared.id)
            .field("num_workers", &self.num_workers())
            .field("running", &self.is_running())
            .finish()
    }
}

impl TaskPool {
    /// Start a pool with the given configuration.
    pub fn new(config: PoolConfig) -> RuntimeResult<Self> {
        config.validate()?;

        let shared = Arc::new(Shared {
            id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            work_stealer: WorkStealer::new(config.num_workers),
            injector: Injector::new(),
            running: AtomicBool::new(true),
            queued: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            live: AtomicUsize::new(0),
            tasks: Mutex::new(HashMap::new()),
            idle_lock: Mutex::new(()),
            idle_cond: Condvar::new(),
            drain_lock: Mutex::new(()),
            drain_cond: Condvar::new(),
            stats: PoolStats::default(),
            ids: TaskIdGenerator::new(),
            config,
        });

        let mut workers = Vec::with_capacity(shared.config.num_workers);
        for worker_id in 0..shared.config.num_workers {
            let worker_shared = shared.clone();
            let spawned = thread::Builder::new()
                .name(format!("{}-{}", shared.config.thread_name_prefix, worker_id))
                .stack_size(shared.config.stack_size)
                .spawn(move || worker_shared.worker_loop(worker_id));

            match spawned {
                Ok(worker) => workers.push(worker),
                Err(err) => {
                    shared.running.store(false, Ordering::Release);
                    shared.idle_cond.notify_all();
                    for worker in workers {
                        let _ = worker.join();
                    }
                    return Err(RuntimeError::InvalidConfig(format!(
                        "failed to spawn worker thread: {}",
                        err
                    )));
                }
            }
        }

        info!(
            pool = shared.id,
            workers = shared.config.num_workers,
            capacity = shared.config.max_queue_size,
            "task pool started"
        );

        Ok(Self {
            handle: PoolHandle { shared },
            workers,
        })
    }

    /// Start a pool with the default configuration.
    #[inline]
    pub fn with_defaults() -> RuntimeResult<Self> {
        Self::new(PoolConfig::default())
    }

    /// Create a builder.
    #[inline]
    pub fn builder() -> PoolBuilder {
        PoolBuilder::new()
    }

    /// Get a cloneable spawning handle.
    #[inline]
    pub fn handle(&self) -> PoolHandle {
        self.handle.clone()
    }

    /// See [`PoolHandle::spawn`].
    #[inline]
    pub fn spawn(
        &self,
        entry: TaskEntry,
        params: Params,
    ) -> RuntimeResult<TaskId> {
        self.handle.spawn(entry, params)
    }

    /// See [`PoolHandle::spawn_named`].
    #[inline]
    pub fn spawn_named(
        &self,
        name: impl Into<String>,
        entry: TaskEntry,
        params: Params,
    ) -> RuntimeResult<TaskId> {
        self.handle.spawn_named(name, entry, params)
    }

    /// See [`PoolHandle::spawn_core`].
    #[inline]
    pub fn spawn_core<F, Args>(
        &self,
        core: F,
        params: Params,
    ) -> RuntimeResult<TaskId>
    where
        F: TaskFn<Args>,
        Args: FromParams + 'static,
    {
        self.handle.spawn_core(core, params)
    }

    /// Get the configuration.
    #[inline]
    pub fn config(&self) -> &PoolConfig {
        &self.handle.shared.config
    }

    /// Get the number of workers.
    #[inline]
    pub fn num_workers(&self) -> usize {
        self.handle.shared.config.num_workers
    }

    /// Get statistics.
    #[inline]
    pub fn stats(&self) -> &PoolStats {
        self.handle.stats()
    }

    /// Get work stealing statistics.
    #[inline]
    pub fn steal_stats(&self) -> &StealStats {
        self.handle.shared.work_stealer.stats()
    }

    /// Check if the pool is running.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.handle.is_running()
    }

    /// See [`PoolHandle::wait_idle`].
    #[inline]
    pub fn wait_idle(&self) {
        self.handle.wait_idle();
    }

    /// Drain queued and running tasks, then stop and join the workers.
    ///
    /// Tasks still parked on empty cells at that point can never run again.
    /// Their futures, and the arguments and cells they hold, are dropped.
    pub fn shutdown(&mut self) {
        let shared = &self.handle.shared;
        if !shared.running.load(Ordering::Acquire) {
            return;
        }

        shared.wait_idle();

        let parked = self.handle.parked_tasks();
        if parked > 0 {
            warn!(parked, "shutting down with tasks parked on empty cells");
        }

        shared.running.store(false, Ordering::Release);
        {
            let _guard = shared.idle_lock.lock();
            shared.idle_cond.notify_all();
        }

        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                error!("worker thread panicked");
            }
        }

        // Anything woken between the drain and the stop.
        let mut stranded = shared.work_stealer.drain_all().len();
        loop {
            match shared.injector.steal() {
                Steal::Success(_) => stranded += 1,
                Steal::Retry => continue,
                Steal::Empty => break,
            }
        }
        if stranded > 0 {
            warn!(stranded, "dropped tasks queued after drain");
        }

        let released = shared.release_unfinished();
        if released > 0 {
            warn!(released, "dropped unfinished tasks");
        }

        info!(pool = shared.id, "task pool shut down");
    }
}

impl Drop for TaskPool {
    fn drop(&mut self) {
        if self.is_running() {
            self.shutdown();
        }
    }
}

#[cfg(test)]
mod tests;
