//! Runtime errors

use thiserror::Error;

use crate::runtime::value::ArgType;

/// Runtime result
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors raised by cells, the task pool and the argument adapter.
///
/// `SpawnBackpressure` and `PoolShutDown` are recoverable and handed back to
/// the caller of `spawn`. Everything else is a contract violation by the
/// calling code and is fatal to the task that raised it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("Cell written twice")]
    DoubleWrite,

    #[error("Cell used after destroy")]
    UseAfterDestroy,

    #[error("Cell destroyed with {waiters} pending waiter(s)")]
    DestroyWithWaiters {
        /// Number of readers still parked on the cell
        waiters: usize,
    },

    #[error("Spawn rejected: ready queue at capacity ({capacity})")]
    SpawnBackpressure {
        /// Configured queue capacity
        capacity: usize,
    },

    #[error("Argument {index}: expected {expected}, found {found}")]
    TypeMismatch {
        /// Position of the offending argument
        index: usize,
        /// Type the entry point declares
        expected: ArgType,
        /// Tag carried by the argument slot
        found: ArgType,
    },

    #[error("Arity mismatch: entry takes {expected} argument(s), {found} packed")]
    ArityMismatch { expected: usize, found: usize },

    #[error("Task pool has shut down")]
    PoolShutDown,

    #[error("No task pool is running on this thread")]
    NoCurrentPool,

    #[error("Task panicked: {0}")]
    TaskPanicked(String),

    #[error("Invalid pool configuration: {0}")]
    InvalidConfig(String),
}

impl RuntimeError {
    /// Whether this error breaks a single-assignment or typing contract.
    ///
    /// These never resolve by retrying.
    #[inline]
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            RuntimeError::DoubleWrite
                | RuntimeError::UseAfterDestroy
                | RuntimeError::DestroyWithWaiters { .. }
                | RuntimeError::TypeMismatch { .. }
                | RuntimeError::ArityMismatch { .. }
        )
    }

    /// Whether the caller may retry the operation later.
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, RuntimeError::SpawnBackpressure { .. })
    }
}
