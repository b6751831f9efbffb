//! ivarpool
//!
//! Single-assignment cells ("ivars") and a work-stealing task pool for
//! building dataflow task graphs.
//!
//! A driver creates cells, spawns tasks that receive those cells as
//! arguments, and reads the final cell with a blocking get. Tasks read their
//! inputs with a suspending get, which parks the task instead of the worker.
//!
//! # Example
//!
//! ```no_run
//! use ivarpool::{params, run, IVar, Params, RuntimeResult, TaskFuture, TaskPool};
//!
//! async fn increment(v: u32, out: IVar<u32>) -> RuntimeResult<()> {
//!     out.put(v + 1)
//! }
//!
//! fn increment_task(params: Params) -> RuntimeResult<TaskFuture> {
//!     run(increment, params)
//! }
//!
//! fn main() -> RuntimeResult<()> {
//!     let pool = TaskPool::with_defaults()?;
//!     let cell: IVar<u32> = IVar::new();
//!     pool.spawn(increment_task, params![5u32, cell.clone()])?;
//!     assert_eq!(cell.get_blocking()? << 1, 12);
//!     cell.destroy()
//! }
//! ```

#![warn(rust_2018_idioms)]

pub mod runtime;

// Utility modules
pub mod util;

// Re-exports
pub use runtime::error::{RuntimeError, RuntimeResult};
pub use runtime::ivar::{CellState, Get, IVar};
pub use runtime::scheduler::{
    current, run, spawn, FaultPolicy, PoolBuilder, PoolConfig, PoolHandle, PoolStats,
    PoolStatsSnapshot, TaskEntry, TaskFn, TaskFuture, TaskId, TaskOutput, TaskPool,
};
pub use runtime::value::{ArgType, ArgValue, FromParams, Params, TaskArg};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = "ivarpool";
