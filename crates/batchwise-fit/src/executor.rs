use batchwise_core::{BatchError, BatchResult};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

/// Runs a set of independent tasks and returns their results in input order.
///
/// Selected by worker count: 1 runs on the calling thread, anything else
/// uses a dedicated rayon pool (0 = one thread per available core).
#[derive(Debug)]
pub enum Executor {
    Sequential,
    Pool(ThreadPool),
}

impl Executor {
    pub fn new(n_jobs: usize) -> BatchResult<Self> {
        if n_jobs == 1 {
            return Ok(Executor::Sequential);
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(n_jobs)
            .thread_name(|i| format!("batchwise-worker-{}", i))
            .build()
            .map_err(|e| BatchError::InvalidConfig(format!("cannot start worker pool: {}", e)))?;
        Ok(Executor::Pool(pool))
    }

    pub fn workers(&self) -> usize {
        match self {
            Executor::Sequential => 1,
            Executor::Pool(pool) => pool.current_num_threads(),
        }
    }

    /// Apply `f` to every item. Blocks until all have finished.
    pub fn map<I, O, F>(&self, items: Vec<I>, f: F) -> Vec<O>
    where
        I: Send,
        O: Send,
        F: Fn(I) -> O + Sync + Send,
    {
        match self {
            Executor::Sequential => items.into_iter().map(f).collect(),
            Executor::Pool(pool) => pool.install(|| items.into_par_iter().map(&f).collect()),
        }
    }
}
