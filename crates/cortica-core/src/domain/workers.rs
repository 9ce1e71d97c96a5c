use std::sync::mpsc::{Receiver, Sender, channel, sync_channel};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Receipt for a job handed to a [WorkerPool]. `wait` blocks until a
/// worker has run the job and panics if the job itself panicked.
pub struct Pending<T> {
    result: Receiver<T>,
}

impl<T> Pending<T> {
    pub fn wait(self) -> T {
        self.result.recv().unwrap()
    }
}

/// A fixed set of worker threads draining one shared job queue.
///
/// Shutdown works by closing the queue: `Drop` drops the sender, each
/// worker's `recv` then errors once the queue drains, and the threads are
/// joined. Pools are owned by whoever needs one (the evaluator); there is
/// no process-wide instance.
pub struct WorkerPool {
    queue: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let (queue, jobs) = channel::<Job>();
        let jobs = Arc::new(Mutex::new(jobs));

        let workers = (0..size.max(1))
            .map(|_| {
                let jobs = Arc::clone(&jobs);
                std::thread::spawn(move || {
                    loop {
                        // Lock covers only the dequeue, never the job.
                        let job = jobs.lock().unwrap().recv();
                        match job {
                            Ok(job) => job(),
                            Err(_) => break,
                        }
                    }
                })
            })
            .collect();

        WorkerPool {
            queue: Some(queue),
            workers,
        }
    }

    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    /// Queue a job and hand back the receipt for its result. The job runs
    /// even if the receipt is dropped.
    pub fn run<F, T>(&self, job: F) -> Pending<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (sender, result) = sync_channel(1);
        let boxed: Job = Box::new(move || {
            let _ = sender.send(job());
        });

        if let Some(queue) = &self.queue {
            // The queue outlives every submission; send only fails after
            // Drop has already closed it.
            let _ = queue.send(boxed);
        }

        Pending { result }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.queue.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn pool_reports_its_size() {
        assert_eq!(WorkerPool::new(3).num_workers(), 3);
        assert_eq!(WorkerPool::new(0).num_workers(), 1);
    }

    #[test]
    fn results_arrive_in_submission_order() {
        let pool = WorkerPool::new(4);

        let pending = (0..16)
            .map(|i| pool.run(move || i * i))
            .collect::<Vec<_>>();
        let results = pending.into_iter().map(Pending::wait).collect::<Vec<_>>();

        assert_eq!(results, (0..16).map(|i| i * i).collect::<Vec<_>>());
    }

    #[test]
    fn drop_drains_fire_and_forget_work() {
        let counter = Arc::new(AtomicUsize::new(0));

        {
            let pool = WorkerPool::new(2);
            for _ in 0..8 {
                let counter = Arc::clone(&counter);
                let _ = pool.run(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                });
            }
        }

        assert_eq!(counter.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn dropped_receipt_does_not_stall_the_pool() {
        let pool = WorkerPool::new(1);
        drop(pool.run(|| 1));
        assert_eq!(pool.run(|| 2).wait(), 2);
    }
}
