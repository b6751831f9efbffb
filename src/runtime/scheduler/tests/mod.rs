//! Scheduler 单元测试
//!
//! 测试任务状态、队列、参数适配器和任务池的调度行为


use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::scheduler::task::{Schedule, Task};
use crate::runtime::scheduler::{PoolConfig, TaskFuture, TaskId, TaskIdGenerator, TaskState};
use crate::runtime::value::Params;

/// Scheduler that records every task handed back to it.
#[derive(Default)]
pub(super) struct RecordingSchedule {
    pub(super) woken: Mutex<Vec<TaskId>>,
}

impl Schedule for RecordingSchedule {
    fn reschedule(
        &self,
        task: Arc<Task>,
    ) {
        self.woken.lock().push(task.id());
    }
}

/// A task with a trivial body, owned by `scheduler`.
pub(super) fn make_task(
    id: usize,
    scheduler: Weak<dyn Schedule>,
) -> Arc<Task> {
    Arc::new(Task::new(
        TaskId(id),
        format!("task-{}", id),
        Box::new(|_params: Params| -> RuntimeResult<TaskFuture> {
            Ok(Box::pin(async { Ok::<(), RuntimeError>(()) }))
        }),
        Params::new(),
        scheduler,
    ))
}

/// A task whose pool is already gone.
pub(super) fn detached_task(id: usize) -> Arc<Task> {
    make_task(id, Weak::<RecordingSchedule>::new())
}

#[cfg(test)]
mod task_id_tests {
    use super::*;

    #[test]
    fn test_task_id_conversions() {
        let id = TaskId::from(7);
        assert_eq!(id.inner(), 7);
        assert_eq!(usize::from(id), 7);
        assert_eq!(id.to_string(), "Task(7)");
    }

    #[test]
    fn test_task_id_generator_unique() {
        let ids = TaskIdGenerator::new();
        let a = ids.next();
        let b = ids.next();
        assert_ne!(a, b);
        assert_eq!(b.inner(), a.inner() + 1);
    }
}

#[cfg(test)]
mod task_state_tests {
    use super::*;

    #[test]
    fn test_state_u8_roundtrip() {
        for state in [
            TaskState::Queued,
            TaskState::Running,
            TaskState::Suspended,
            TaskState::Notified,
            TaskState::Completed,
            TaskState::Failed,
        ] {
            assert_eq!(TaskState::from_u8(state.as_u8()), state);
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(TaskState::Completed.is_terminal());
        assert!(TaskState::Failed.is_terminal());
        assert!(!TaskState::Suspended.is_terminal());
        assert!(!TaskState::Queued.is_terminal());
    }

    #[test]
    fn test_new_task_is_queued() {
        let task = detached_task(1);
        assert_eq!(task.state(), TaskState::Queued);
        assert_eq!(task.name(), "task-1");
        assert!(!task.is_finished());
    }

    #[test]
    fn test_transition() {
        let task = detached_task(1);
        assert!(task.transition(TaskState::Queued, TaskState::Running).is_ok());
        assert_eq!(
            task.transition(TaskState::Queued, TaskState::Running),
            Err(TaskState::Running)
        );
    }
}

#[cfg(test)]
mod wake_tests {
    use std::task::Waker;

    use super::*;

    fn setup() -> (Arc<RecordingSchedule>, Arc<Task>) {
        let scheduler = Arc::new(RecordingSchedule::default());
        let weak: Weak<dyn Schedule> = Arc::downgrade(&scheduler) as Weak<dyn Schedule>;
        let task = make_task(3, weak);
        (scheduler, task)
    }

    #[test]
    fn test_wake_suspended_requeues() {
        let (scheduler, task) = setup();
        task.set_state(TaskState::Suspended);

        Waker::from(task.clone()).wake();

        assert_eq!(task.state(), TaskState::Queued);
        assert_eq!(*scheduler.woken.lock(), vec![TaskId(3)]);
    }

    #[test]
    fn test_wake_running_marks_notified() {
        let (scheduler, task) = setup();
        task.set_state(TaskState::Running);

        Waker::from(task.clone()).wake_by_ref();

        assert_eq!(task.state(), TaskState::Notified);
        assert!(scheduler.woken.lock().is_empty());
    }

    #[test]
    fn test_wake_is_idempotent() {
        let (scheduler, task) = setup();
        task.set_state(TaskState::Suspended);

        let waker = Waker::from(task.clone());
        waker.wake_by_ref();
        waker.wake_by_ref();

        assert_eq!(scheduler.woken.lock().len(), 1);
    }

    #[test]
    fn test_wake_finished_is_ignored() {
        let (scheduler, task) = setup();
        task.set_state(TaskState::Completed);

        Waker::from(task.clone()).wake();

        assert_eq!(task.state(), TaskState::Completed);
        assert!(scheduler.woken.lock().is_empty());
    }

    #[test]
    fn test_wake_after_pool_dropped() {
        let task = detached_task(9);
        task.set_state(TaskState::Suspended);
        Waker::from(task.clone()).wake();
        assert_eq!(task.state(), TaskState::Queued);
    }
}

#[cfg(test)]
mod config_tests {
    use super::*;
    use crate::runtime::scheduler::FaultPolicy;

    #[test]
    fn test_default_config() {
        let config = PoolConfig::default();
        assert!(config.num_workers >= 1);
        assert_eq!(config.max_queue_size, 1024);
        assert!(config.use_work_stealing);
        assert_eq!(config.fault_policy, FaultPolicy::AbortTask);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = PoolConfig {
            num_workers: 0,
            ..PoolConfig::default()
        };
        assert!(matches!(config.validate(), Err(RuntimeError::InvalidConfig(_))));
    }

    #[test]
    fn test_zero_steal_batch_rejected() {
        let config = PoolConfig {
            steal_batch: 0,
            ..PoolConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unbounded_queue_is_valid() {
        let config = PoolConfig {
            max_queue_size: 0,
            ..PoolConfig::default()
        };
        assert!(config.validate().is_ok());
    }
}
