//! IVar 单元测试
//!
//! 测试单赋值单元的写入、读取、等待与销毁

use std::future::Future;
use std::pin::pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};
use std::thread;
use std::time::Duration;

use proptest::prelude::*;

use crate::runtime::error::RuntimeError;
use crate::runtime::ivar::{CellState, IVar};

/// Waker that counts how often it fired.
#[derive(Default)]
struct CountingWaker {
    wakes: AtomicUsize,
}

impl CountingWaker {
    fn wakes(&self) -> usize {
        self.wakes.load(Ordering::SeqCst)
    }
}

impl Wake for CountingWaker {
    fn wake(self: Arc<Self>) {
        self.wakes.fetch_add(1, Ordering::SeqCst);
    }
}

fn counting_waker() -> (Arc<CountingWaker>, Waker) {
    let counter = Arc::new(CountingWaker::default());
    let waker = Waker::from(counter.clone());
    (counter, waker)
}

#[cfg(test)]
mod put_tests {
    use super::*;

    #[test]
    fn test_new_cell_is_empty() {
        let cell: IVar<u32> = IVar::new();
        assert_eq!(cell.state(), CellState::Empty);
        assert!(!cell.is_full());
        assert_eq!(cell.waiters(), 0);
        assert_eq!(cell.try_get().unwrap(), None);
    }

    #[test]
    fn test_put_then_get() {
        let cell = IVar::new();
        cell.put(6u32).unwrap();

        assert_eq!(cell.state(), CellState::Full);
        assert_eq!(cell.try_get().unwrap(), Some(6));
        assert_eq!(cell.get_blocking().unwrap(), 6);
        // Reads do not consume the value.
        assert_eq!(cell.get_blocking().unwrap(), 6);
    }

    #[test]
    fn test_double_write_keeps_first_value() {
        let cell = IVar::new();
        cell.put(1u32).unwrap();

        assert_eq!(cell.put(2), Err(RuntimeError::DoubleWrite));
        assert_eq!(cell.try_get().unwrap(), Some(1));
    }

    #[test]
    fn test_put_after_destroy() {
        let cell: IVar<u32> = IVar::new();
        cell.destroy().unwrap();
        assert_eq!(cell.put(1), Err(RuntimeError::DoubleWrite));
    }

    #[test]
    fn test_clones_share_the_cell() {
        let a: IVar<String> = IVar::new();
        let b = a.clone();
        let c: IVar<String> = IVar::new();

        assert!(a.same_cell(&b));
        assert!(!a.same_cell(&c));

        b.put("shared".to_string()).unwrap();
        assert_eq!(a.try_get().unwrap().as_deref(), Some("shared"));
        assert!(c.try_get().unwrap().is_none());
    }

    #[test]
    fn test_debug_output() {
        let cell: IVar<u8> = IVar::default();
        let debug = format!("{:?}", cell);
        assert!(debug.contains("Empty"));
    }
}

#[cfg(test)]
mod blocking_tests {
    use super::*;

    #[test]
    fn test_get_blocking_across_threads() {
        let cell: IVar<u64> = IVar::new();
        let writer = cell.clone();

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            writer.put(42).unwrap();
        });

        assert_eq!(cell.get_blocking().unwrap(), 42);
        handle.join().unwrap();
    }

    #[test]
    fn test_many_blocked_readers() {
        let cell: IVar<u32> = IVar::new();
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cell = cell.clone();
                thread::spawn(move || cell.get_blocking().unwrap())
            })
            .collect();

        while cell.waiters() < 4 {
            thread::yield_now();
        }
        cell.put(9).unwrap();

        for reader in readers {
            assert_eq!(reader.join().unwrap(), 9);
        }
        assert_eq!(cell.waiters(), 0);
    }

    #[test]
    fn test_get_blocking_timeout_empty() {
        let cell: IVar<u32> = IVar::new();
        let got = cell.get_blocking_timeout(Duration::from_millis(10)).unwrap();
        assert_eq!(got, None);
        assert_eq!(cell.waiters(), 0);
    }

    #[test]
    fn test_get_blocking_timeout_filled() {
        let cell: IVar<u32> = IVar::new();
        let writer = cell.clone();
        let handle = thread::spawn(move || writer.put(3).unwrap());

        let got = cell.get_blocking_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(got, Some(3));
        handle.join().unwrap();
    }

    #[test]
    fn test_get_after_destroy() {
        let cell: IVar<u32> = IVar::new();
        cell.put(1).unwrap();
        cell.destroy().unwrap();

        assert_eq!(cell.get_blocking(), Err(RuntimeError::UseAfterDestroy));
        assert_eq!(cell.try_get(), Err(RuntimeError::UseAfterDestroy));
        assert_eq!(
            cell.get_blocking_timeout(Duration::from_millis(1)),
            Err(RuntimeError::UseAfterDestroy)
        );
    }
}

#[cfg(test)]
mod suspending_tests {
    use super::*;

    #[test]
    fn test_get_ready_when_full() {
        let cell = IVar::new();
        cell.put(5u32).unwrap();

        let (counter, waker) = counting_waker();
        let mut cx = Context::from_waker(&waker);
        let mut get = pin!(cell.get());

        assert_eq!(get.as_mut().poll(&mut cx), Poll::Ready(Ok(5)));
        assert_eq!(counter.wakes(), 0);
    }

    #[test]
    fn test_get_parks_and_is_woken_once() {
        let cell: IVar<u32> = IVar::new();
        let (counter, waker) = counting_waker();
        let mut cx = Context::from_waker(&waker);

        let mut get = pin!(cell.get());
        assert!(get.as_mut().poll(&mut cx).is_pending());
        // Re-polling while empty must not register twice.
        assert!(get.as_mut().poll(&mut cx).is_pending());
        assert_eq!(cell.waiters(), 1);

        cell.put(11).unwrap();
        assert_eq!(counter.wakes(), 1);
        // Woken but not yet resumed: still waiting.
        assert_eq!(cell.waiters(), 1);

        assert_eq!(get.as_mut().poll(&mut cx), Poll::Ready(Ok(11)));
        assert_eq!(cell.waiters(), 0);
    }

    #[test]
    fn test_dropped_get_deregisters() {
        let cell: IVar<u32> = IVar::new();
        let (counter, waker) = counting_waker();
        let mut cx = Context::from_waker(&waker);

        {
            let mut get = pin!(cell.get());
            assert!(get.as_mut().poll(&mut cx).is_pending());
            assert_eq!(cell.waiters(), 1);
        }

        assert_eq!(cell.waiters(), 0);
        cell.put(1).unwrap();
        assert_eq!(counter.wakes(), 0);
    }

    #[test]
    fn test_every_waiter_woken() {
        let cell: IVar<u32> = IVar::new();
        let (first, first_waker) = counting_waker();
        let (second, second_waker) = counting_waker();

        let mut a = pin!(cell.get());
        let mut b = pin!(cell.get());
        assert!(a.as_mut().poll(&mut Context::from_waker(&first_waker)).is_pending());
        assert!(b.as_mut().poll(&mut Context::from_waker(&second_waker)).is_pending());
        assert_eq!(cell.waiters(), 2);

        cell.put(4).unwrap();
        assert_eq!(first.wakes(), 1);
        assert_eq!(second.wakes(), 1);
    }
}

#[cfg(test)]
mod destroy_tests {
    use super::*;

    #[test]
    fn test_destroy_full_cell() {
        let cell = IVar::new();
        cell.put(1u32).unwrap();
        cell.destroy().unwrap();
        assert_eq!(cell.state(), CellState::Destroyed);
    }

    #[test]
    fn test_destroy_empty_cell() {
        let cell: IVar<u32> = IVar::new();
        cell.destroy().unwrap();
        assert_eq!(cell.state(), CellState::Destroyed);
    }

    #[test]
    fn test_destroy_twice() {
        let cell: IVar<u32> = IVar::new();
        cell.destroy().unwrap();
        assert_eq!(cell.destroy(), Err(RuntimeError::UseAfterDestroy));
    }

    #[test]
    fn test_destroy_with_parked_task() {
        let cell: IVar<u32> = IVar::new();
        let (_counter, waker) = counting_waker();
        let mut cx = Context::from_waker(&waker);

        let mut get = pin!(cell.get());
        assert!(get.as_mut().poll(&mut cx).is_pending());

        let err = cell.destroy().unwrap_err();
        assert_eq!(err, RuntimeError::DestroyWithWaiters { waiters: 1 });
        assert!(err.is_contract_violation());
        assert_eq!(cell.state(), CellState::Empty);

        cell.put(2).unwrap();
        assert_eq!(get.as_mut().poll(&mut cx), Poll::Ready(Ok(2)));
        cell.destroy().unwrap();
    }

    #[test]
    fn test_destroy_between_put_and_resume() {
        let cell: IVar<u32> = IVar::new();
        let (counter, waker) = counting_waker();
        let mut cx = Context::from_waker(&waker);

        let mut get = pin!(cell.get());
        assert!(get.as_mut().poll(&mut cx).is_pending());

        cell.put(7).unwrap();
        assert_eq!(counter.wakes(), 1);
        assert_eq!(
            cell.destroy(),
            Err(RuntimeError::DestroyWithWaiters { waiters: 1 })
        );

        assert_eq!(get.as_mut().poll(&mut cx), Poll::Ready(Ok(7)));
        cell.destroy().unwrap();
        assert_eq!(cell.state(), CellState::Destroyed);
    }

    #[test]
    fn test_destroy_with_blocked_thread() {
        let cell: IVar<u32> = IVar::new();
        let reader = {
            let cell = cell.clone();
            thread::spawn(move || cell.get_blocking())
        };

        while cell.waiters() == 0 {
            thread::yield_now();
        }
        assert!(matches!(
            cell.destroy(),
            Err(RuntimeError::DestroyWithWaiters { waiters: 1 })
        ));

        cell.put(8).unwrap();
        assert_eq!(reader.join().unwrap(), Ok(8));
    }

    #[test]
    fn test_pending_get_sees_destroy() {
        let cell: IVar<u32> = IVar::new();
        let (_counter, waker) = counting_waker();
        let mut cx = Context::from_waker(&waker);

        let mut get = Box::pin(cell.get());
        assert!(get.as_mut().poll(&mut cx).is_pending());
        drop(get);

        cell.destroy().unwrap();
        let mut late = pin!(cell.get());
        assert_eq!(late.as_mut().poll(&mut cx), Poll::Ready(Err(RuntimeError::UseAfterDestroy)));
    }
}

proptest! {
    #[test]
    fn proptest_first_put_wins(values in prop::collection::vec(any::<u32>(), 1..16)) {
        let cell = IVar::new();
        for (i, value) in values.iter().enumerate() {
            let result = cell.put(*value);
            prop_assert_eq!(result.is_ok(), i == 0);
        }
        prop_assert_eq!(cell.try_get().unwrap(), Some(values[0]));
    }
}
