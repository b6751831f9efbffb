//! Unmarshalling adapter.
//!
//! A task entry point has the uniform signature [`TaskEntry`]: it receives
//! the packed [`Params`] and produces the task's future. Entry wrappers are
//! usually one line long and hand the work to [`run`], which unpacks the
//! arguments against the static parameter types of a typed core function
//! and calls it:
//!
//! ```
//! use ivarpool::{run, IVar, Params, RuntimeResult, TaskFuture};
//!
//! async fn add_one(v: u32, out: IVar<u32>) -> RuntimeResult<()> {
//!     out.put(v + 1)
//! }
//!
//! fn add_one_task(params: Params) -> RuntimeResult<TaskFuture> {
//!     run(add_one, params)
//! }
//! ```

use std::future::Future;
use std::pin::Pin;

use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::value::{FromParams, Params};

/// The continuation of a spawned task.
pub type TaskFuture = Pin<Box<dyn Future<Output = RuntimeResult<()>> + Send + 'static>>;

/// Uniform task entry point.
pub type TaskEntry = fn(Params) -> RuntimeResult<TaskFuture>;

/// Values a task body may finish with.
pub trait TaskOutput {
    /// Normalise into the pool's result type.
    fn into_result(self) -> RuntimeResult<()>;
}

impl TaskOutput for () {
    #[inline]
    fn into_result(self) -> RuntimeResult<()> {
        Ok(())
    }
}

impl<E: Into<RuntimeError>> TaskOutput for Result<(), E> {
    #[inline]
    fn into_result(self) -> RuntimeResult<()> {
        self.map_err(Into::into)
    }
}

/// A typed task body callable with an argument tuple.
///
/// Implemented for every `FnOnce(A1, .., An) -> impl Future` up to eight
/// parameters, so ordinary `async fn` items qualify.
pub trait TaskFn<Args>: Send + 'static {
    /// Result of the body.
    type Output: TaskOutput;
    /// Future returned by the body.
    type Future: Future<Output = Self::Output> + Send + 'static;

    /// Invoke the body.
    fn call(
        self,
        args: Args,
    ) -> Self::Future;
}

macro_rules! impl_task_fn {
    ($($arg:ident),*) => {
        impl<Func, Fut, $($arg,)*> TaskFn<($($arg,)*)> for Func
        where
            Func: FnOnce($($arg),*) -> Fut + Send + 'static,
            Fut: Future + Send + 'static,
            Fut::Output: TaskOutput,
        {
            type Output = Fut::Output;
            type Future = Fut;

            #[allow(non_snake_case)]
            fn call(
                self,
                ($($arg,)*): ($($arg,)*),
            ) -> Fut {
                self($($arg),*)
            }
        }
    };
}

impl_task_fn!();
impl_task_fn!(A1);
impl_task_fn!(A1, A2);
impl_task_fn!(A1, A2, A3);
impl_task_fn!(A1, A2, A3, A4);
impl_task_fn!(A1, A2, A3, A4, A5);
impl_task_fn!(A1, A2, A3, A4, A5, A6);
impl_task_fn!(A1, A2, A3, A4, A5, A6, A7);
impl_task_fn!(A1, A2, A3, A4, A5, A6, A7, A8);

/// Unpack `params` against the parameter types of `core` and call it.
///
/// Runs on the worker that claimed the task, once per task. A tag or arity
/// mismatch is returned as an error, which the worker treats as fatal for
/// the task.
pub fn run<F, Args>(
    core: F,
    params: Params,
) -> RuntimeResult<TaskFuture>
where
    F: TaskFn<Args>,
    Args: FromParams,
{
    let args = Args::from_params(params)?;
    let body = core.call(args);
    Ok(Box::pin(async move { body.await.into_result() }))
}
