//! Single-assignment cells
//!
//! An [`IVar`] is written at most once and read any number of times. Reads
//! come in two flavours:
//!
//! - [`IVar::get`] returns a future. Awaited inside a pool task it parks the
//!   task and frees the worker until the cell is filled.
//! - [`IVar::get_blocking`] blocks the calling OS thread on a condition
//!   variable. Meant for driver code running outside the pool.
//!
//! Every cell carries its own lock; unrelated cells never contend.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{trace, warn};

use crate::runtime::error::{RuntimeError, RuntimeResult};
use crate::runtime::scheduler;
use crate::runtime::value::{ArgType, ArgValue, TaskArg};

/// Observable state of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
    /// Not yet written.
    Empty,
    /// Written exactly once.
    Full,
    /// Released by its owner.
    Destroyed,
}

enum Payload<T> {
    Empty,
    Full(T),
    Destroyed,
}

struct Slot<T> {
    payload: Payload<T>,
    /// Registered `Get` futures, keyed so each can deregister itself.
    /// An entry survives `put` and is removed once its future completes or
    /// is dropped, so a woken reader still counts as a waiter.
    wakers: Vec<(u64, Waker)>,
    next_key: u64,
    /// Threads parked in `get_blocking`.
    blocked: usize,
}

impl<T> Slot<T> {
    #[inline]
    fn waiters(&self) -> usize {
        self.wakers.len() + self.blocked
    }

    #[inline]
    fn state(&self) -> CellState {
        match self.payload {
            Payload::Empty => CellState::Empty,
            Payload::Full(_) => CellState::Full,
            Payload::Destroyed => CellState::Destroyed,
        }
    }
}

struct Inner<T> {
    slot: Mutex<Slot<T>>,
    filled: Condvar,
}

/// A single-assignment synchronization cell.
///
/// Cloning an `IVar` clones the handle, not the payload: all clones refer to
/// the same cell. This is how a cell is handed to the task that fills it.
pub struct IVar<T> {
    inner: Arc<Inner<T>>,
}

impl<T> IVar<T> {
    /// Create an empty cell.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                slot: Mutex::new(Slot {
                    payload: Payload::Empty,
                    wakers: Vec::new(),
                    next_key: 0,
                    blocked: 0,
                }),
                filled: Condvar::new(),
            }),
        }
    }

    /// Commit `value` and wake every waiter.
    ///
    /// Fails with [`RuntimeError::DoubleWrite`] if the cell is already full
    /// or destroyed; the existing payload is never overwritten.
    pub fn put(
        &self,
        value: T,
    ) -> RuntimeResult<()> {
        let (wakers, blocked) = {
            let mut slot = self.inner.slot.lock();
            match slot.payload {
                Payload::Empty => {}
                Payload::Full(_) | Payload::Destroyed => return Err(RuntimeError::DoubleWrite),
            }
            slot.payload = Payload::Full(value);
            let wakers: Vec<Waker> = slot.wakers.iter().map(|(_, waker)| waker.clone()).collect();
            (wakers, slot.blocked)
        };

        trace!(tasks = wakers.len(), threads = blocked, "cell filled");

        if blocked > 0 {
            self.inner.filled.notify_all();
        }
        for waker in wakers {
            waker.wake();
        }
        Ok(())
    }

    /// Release the cell.
    ///
    /// Refuses with [`RuntimeError::DestroyWithWaiters`] while any reader is
    /// still waiting on it, including readers already woken by `put` that
    /// have not yet taken the value. Destroying twice is a use after destroy.
    pub fn destroy(&self) -> RuntimeResult<()> {
        let mut slot = self.inner.slot.lock();
        if let Payload::Destroyed = slot.payload {
            return Err(RuntimeError::UseAfterDestroy);
        }

        let waiters = slot.waiters();
        if waiters > 0 {
            return Err(RuntimeError::DestroyWithWaiters { waiters });
        }

        slot.payload = Payload::Destroyed;
        Ok(())
    }

    /// Get the current state.
    #[inline]
    pub fn state(&self) -> CellState {
        self.inner.slot.lock().state()
    }

    /// Check if the cell has been written.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.state() == CellState::Full
    }

    /// Number of tasks and threads currently waiting on the cell.
    #[inline]
    pub fn waiters(&self) -> usize {
        self.inner.slot.lock().waiters()
    }

    /// Check if two handles refer to the same cell.
    #[inline]
    pub fn same_cell(
        &self,
        other: &IVar<T>,
    ) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: Clone> IVar<T> {
    /// Suspending read.
    ///
    /// The returned future resolves once the cell is full. While the cell is
    /// empty the awaiting task is parked and its worker moves on.
    #[inline]
    pub fn get(&self) -> Get<'_, T> {
        Get {
            cell: self,
            key: None,
        }
    }

    /// Blocking read for callers outside the pool.
    ///
    /// Blocks the calling thread until some `put` commits.
    pub fn get_blocking(&self) -> RuntimeResult<T> {
        if scheduler::on_worker_thread() {
            warn!("blocking cell read on a pool worker; use `get().await` inside tasks");
        }

        let mut slot = self.inner.slot.lock();
        loop {
            match &slot.payload {
                Payload::Full(value) => return Ok(value.clone()),
                Payload::Destroyed => return Err(RuntimeError::UseAfterDestroy),
                Payload::Empty => {
                    slot.blocked += 1;
                    self.inner.filled.wait(&mut slot);
                    slot.blocked -= 1;
                }
            }
        }
    }

    /// Blocking read with an upper bound on the wait.
    ///
    /// Returns `Ok(None)` if the cell is still empty after `timeout`.
    pub fn get_blocking_timeout(
        &self,
        timeout: Duration,
    ) -> RuntimeResult<Option<T>> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.inner.slot.lock();
        loop {
            match &slot.payload {
                Payload::Full(value) => return Ok(Some(value.clone())),
                Payload::Destroyed => return Err(RuntimeError::UseAfterDestroy),
                Payload::Empty => {
                    slot.blocked += 1;
                    let timed_out = self.inner.filled.wait_until(&mut slot, deadline).timed_out();
                    slot.blocked -= 1;
                    if timed_out {
                        return match &slot.payload {
                            Payload::Full(value) => Ok(Some(value.clone())),
                            Payload::Destroyed => Err(RuntimeError::UseAfterDestroy),
                            Payload::Empty => Ok(None),
                        };
                    }
                }
            }
        }
    }

    /// Non-waiting read: `Ok(None)` while the cell is empty.
    pub fn try_get(&self) -> RuntimeResult<Option<T>> {
        let slot = self.inner.slot.lock();
        match &slot.payload {
            Payload::Full(value) => Ok(Some(value.clone())),
            Payload::Empty => Ok(None),
            Payload::Destroyed => Err(RuntimeError::UseAfterDestroy),
        }
    }
}

impl<T> Clone for IVar<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for IVar<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for IVar<T> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let slot = self.inner.slot.lock();
        f.debug_struct("IVar")
            .field("state", &slot.state())
            .field("waiters", &slot.waiters())
            .finish()
    }
}

impl<T: TaskArg> TaskArg for IVar<T> {
    fn arg_type() -> ArgType {
        ArgType::IVar(Box::new(T::arg_type()))
    }

    fn into_value(self) -> ArgValue {
        ArgValue::boxed(self)
    }

    fn from_value(value: ArgValue) -> Option<Self> {
        value.downcast::<IVar<T>>()
    }
}

/// Future returned by [`IVar::get`].
///
/// Registers the polling task's waker while the cell is empty and removes it
/// again if dropped before completion.
#[must_use = "futures do nothing unless polled"]
pub struct Get<'a, T> {
    cell: &'a IVar<T>,
    key: Option<u64>,
}

impl<T: Clone> Future for Get<'_, T> {
    type Output = RuntimeResult<T>;

    fn poll(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Self::Output> {
        let cell = self.cell;
        let mut slot = cell.inner.slot.lock();
        match &slot.payload {
            Payload::Full(value) => {
                let value = value.clone();
                if let Some(key) = self.key.take() {
                    slot.wakers.retain(|(k, _)| *k != key);
                }
                Poll::Ready(Ok(value))
            }
            Payload::Destroyed => {
                if let Some(key) = self.key.take() {
                    slot.wakers.retain(|(k, _)| *k != key);
                }
                Poll::Ready(Err(RuntimeError::UseAfterDestroy))
            }
            Payload::Empty => {
                match self.key {
                    Some(key) => {
                        if let Some((_, waker)) = slot.wakers.iter_mut().find(|(k, _)| *k == key) {
                            if !waker.will_wake(cx.waker()) {
                                *waker = cx.waker().clone();
                            }
                        } else {
                            slot.wakers.push((key, cx.waker().clone()));
                        }
                    }
                    None => {
                        let key = slot.next_key;
                        slot.next_key += 1;
                        slot.wakers.push((key, cx.waker().clone()));
                        drop(slot);
                        self.key = Some(key);
                    }
                }
                Poll::Pending
            }
        }
    }
}

impl<T> Drop for Get<'_, T> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            let mut slot = self.cell.inner.slot.lock();
            slot.wakers.retain(|(k, _)| *k != key);
        }
    }
}

#[cfg(test)]
mod tests;
