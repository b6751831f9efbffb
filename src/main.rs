//! ivarpool - CLI
//!
//! Runs small dataflow graphs on a task pool, the way generated driver code
//! would: create cells, spawn the graph, block on the result.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ivarpool::util::config::load_config_or_default;
use ivarpool::util::logger::{self, LogLevel};
use ivarpool::{params, run, IVar, Params, RuntimeResult, TaskFuture, TaskPool, NAME, VERSION};
use tracing::info;

/// Single-assignment cells and a work-stealing task pool
#[derive(Parser, Debug)]
#[command(name = "ivarpool")]
#[command(version = VERSION)]
#[command(about = NAME, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Number of worker threads (overrides config)
    #[arg(short, long, global = true)]
    workers: Option<usize>,

    /// Configuration file (TOML)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Upper bound for `fanout --tasks`.
const MAX_FANOUT_TASKS: u64 = 1_000_000;

#[derive(Subcommand, Debug)]
enum Commands {
    /// Increment a value in a task, then double it in the driver
    Increment {
        /// Input value
        #[arg(long, default_value_t = 5)]
        value: u32,
    },

    /// Spawn independent tasks, each filling its own cell
    Fanout {
        /// Number of tasks (the sum of their squares must fit in a u64)
        #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(..=MAX_FANOUT_TASKS))]
        tasks: u64,
    },

    /// Build a chain of tasks, each waiting on its predecessor's cell
    Chain {
        /// Chain length
        #[arg(long, default_value_t = 10_000)]
        depth: u64,
    },

    /// Print version information
    Version,
}

async fn increment_core(
    v0: u32,
    out: IVar<u32>,
) -> RuntimeResult<()> {
    out.put(v0 + 1)
}

fn increment_task(params: Params) -> RuntimeResult<TaskFuture> {
    run(increment_core, params)
}

async fn square_core(
    i: u64,
    out: IVar<u64>,
) -> RuntimeResult<()> {
    out.put(i * i)
}

fn square_task(params: Params) -> RuntimeResult<TaskFuture> {
    run(square_core, params)
}

async fn link_core(
    input: IVar<u64>,
    output: IVar<u64>,
) -> RuntimeResult<()> {
    let v = input.get().await?;
    output.put(v + 1)
}

fn link_task(params: Params) -> RuntimeResult<TaskFuture> {
    run(link_core, params)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config =
        load_config_or_default(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(workers) = args.workers {
        config.pool.num_workers = workers;
    }

    let level = if args.verbose {
        LogLevel::Debug
    } else {
        config.log.level
    };
    logger::init_with_level(level);

    if let Commands::Version = args.command {
        println!("{} {}", NAME, VERSION);
        return Ok(());
    }

    let mut pool = TaskPool::new(config.pool.clone()).context("Failed to start task pool")?;
    let start = Instant::now();

    match args.command {
        Commands::Increment { value } => {
            let cell: IVar<u32> = IVar::new();
            pool.spawn_named("increment", increment_task, params![value, cell.clone()])?;
            let e1 = cell.get_blocking()?;
            cell.destroy()?;
            println!("{}", e1 << 1);
        }
        Commands::Fanout { tasks } => {
            // Bounded queue: wait for the pool to catch up when full.
            let mut cells = Vec::with_capacity(tasks as usize);
            for i in 0..tasks {
                let cell: IVar<u64> = IVar::new();
                loop {
                    match pool.spawn(square_task, params![i, cell.clone()]) {
                        Ok(_) => break,
                        Err(err) if err.is_recoverable() => pool.wait_idle(),
                        Err(err) => return Err(err).context("Failed to spawn task"),
                    }
                }
                cells.push(cell);
            }

            let mut sum = 0u64;
            for cell in cells.iter().rev() {
                sum += cell.get_blocking()?;
            }
            println!("{}", sum);
        }
        Commands::Chain { depth } => {
            let head: IVar<u64> = IVar::new();
            let mut input = head.clone();
            for _ in 0..depth {
                let output: IVar<u64> = IVar::new();
                loop {
                    match pool.spawn(link_task, params![input.clone(), output.clone()]) {
                        Ok(_) => break,
                        Err(err) if err.is_recoverable() => pool.wait_idle(),
                        Err(err) => return Err(err).context("Failed to spawn task"),
                    }
                }
                input = output;
            }

            head.put(0)?;
            println!("{}", input.get_blocking()?);
        }
        Commands::Version => {}
    }

    let stats = pool.stats().snapshot();
    info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        spawned = stats.tasks_spawned,
        suspended = stats.tasks_suspended,
        resumed = stats.tasks_resumed,
        peak = stats.peak_parallelism,
        "done"
    );

    pool.shutdown();
    Ok(())
}
