//! Fan-out of independent create/destroy tasks

use rayon::prelude::*;
use rayon::ThreadPool;

/// Run `task` once per item and return the results in input order.
///
/// Serial mode finishes each task before starting the next. Parallel mode
/// starts every task at once on a dedicated pool with one thread per item and
/// joins them all. Each task owns its result; the caller merges them.
///
/// If the pool cannot be built the tasks run serially, so every item is
/// still attempted.
pub fn fan_out<T, R, F>(items: Vec<T>, parallel: bool, task: F) -> Vec<R>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Send + Sync,
{
    let pool = if parallel && items.len() > 1 {
        build_pool(items.len())
    } else {
        None
    };
    run_tasks(items, pool, task)
}

fn build_pool(threads: usize) -> Option<ThreadPool> {
    match rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|index| format!("zfstools-task-{}", index))
        .build()
    {
        Ok(pool) => Some(pool),
        Err(e) => {
            log::warn!("Could not start {} worker threads, running serially: {}", threads, e);
            None
        }
    }
}

fn run_tasks<T, R, F>(items: Vec<T>, pool: Option<ThreadPool>, task: F) -> Vec<R>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Send + Sync,
{
    match pool {
        Some(pool) => pool.install(|| items.into_par_iter().map(&task).collect()),
        None => items.into_iter().map(task).collect(),
    }
}
