use crate::workers::{Pending, WorkerPool};

/// Where evaluation work runs: inline on the caller, or fanned out across
/// a fixed worker pool.
pub enum Executor {
    Serial,
    WorkerPool(WorkerPool),
}

impl Executor {
    pub fn serial() -> Self {
        Executor::Serial
    }

    pub fn worker_pool(num_workers: usize) -> Self {
        Executor::WorkerPool(WorkerPool::new(num_workers))
    }

    pub fn num_workers(&self) -> usize {
        match self {
            Executor::Serial => 1,
            Executor::WorkerPool(pool) => pool.num_workers(),
        }
    }

    /// Run every job and return their results in submission order.
    pub fn execute_batch<F, R>(&self, jobs: Vec<F>) -> Vec<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        match self {
            Executor::Serial => jobs.into_iter().map(|job| job()).collect(),
            Executor::WorkerPool(pool) => {
                let pending = jobs.into_iter().map(|job| pool.run(job)).collect::<Vec<_>>();
                pending.into_iter().map(Pending::wait).collect()
            }
        }
    }
}
