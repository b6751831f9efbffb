//! End-to-end driver scenarios: create cells, spawn, block on the result.

use ivarpool::{params, run, CellState, IVar, Params, RuntimeError, RuntimeResult, TaskFuture, TaskPool};

async fn increment(
    v0: u32,
    out: IVar<u32>,
) -> RuntimeResult<()> {
    out.put(v0 + 1)
}

fn increment_task(params: Params) -> RuntimeResult<TaskFuture> {
    run(increment, params)
}

fn pool(workers: usize) -> TaskPool {
    TaskPool::builder().num_workers(workers).build().unwrap()
}

#[test]
fn test_increment_then_double() {
    let pool = pool(2);

    let e1: IVar<u32> = IVar::new();
    pool.spawn(increment_task, params![5u32, e1.clone()]).unwrap();
    let v1 = e1.get_blocking().unwrap();
    e1.destroy().unwrap();

    assert_eq!(v1, 6);
    assert_eq!(v1 << 1, 12);
    assert_eq!(e1.state(), CellState::Destroyed);
}

#[test]
fn test_independent_cells_any_read_order() {
    let pool = pool(4);
    let cells: Vec<IVar<u32>> = (0..64).map(|_| IVar::new()).collect();

    for (i, cell) in cells.iter().enumerate() {
        pool.spawn(increment_task, params![i as u32 * 10, cell.clone()]).unwrap();
    }

    // Odd indices first, then even, each in reverse.
    let order = (0..64).rev().filter(|i| i % 2 == 1).chain((0..64).rev().filter(|i| i % 2 == 0));
    for i in order {
        assert_eq!(cells[i].get_blocking().unwrap(), i as u32 * 10 + 1);
    }

    for cell in &cells {
        cell.destroy().unwrap();
    }
}

#[test]
fn test_destroy_after_read() {
    let pool = pool(1);
    let cell: IVar<u32> = IVar::new();

    pool.spawn(increment_task, params![0u32, cell.clone()]).unwrap();
    assert_eq!(cell.get_blocking().unwrap(), 1);

    cell.destroy().unwrap();
    assert_eq!(cell.get_blocking(), Err(RuntimeError::UseAfterDestroy));
    assert_eq!(cell.destroy(), Err(RuntimeError::UseAfterDestroy));
}

#[test]
fn test_spawn_core_without_wrapper() {
    let pool = pool(2);
    let out: IVar<u32> = IVar::new();

    pool.spawn_core(increment, params![99u32, out.clone()]).unwrap();
    assert_eq!(out.get_blocking().unwrap(), 100);
}
