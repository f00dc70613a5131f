use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::error;

/// Fixed-capacity worker pool.
///
/// A job only starts once one of the `capacity` slots is free, so the number
/// of jobs in flight never exceeds the capacity however many are submitted.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    slots: Arc<Semaphore>,
    capacity: usize,
}

impl WorkerPool {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Runs every job and waits for all of them to finish.
    ///
    /// Results come back in completion order. A job that panics is logged and
    /// left out of the results without affecting the others.
    pub async fn run_all<I, F, T>(&self, jobs: I) -> Vec<T>
    where
        I: IntoIterator<Item = F>,
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let mut join_set = JoinSet::new();

        for job in jobs {
            let permit = match Arc::clone(&self.slots).acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    error!("Worker pool closed: {}", e);
                    break;
                }
            };
            join_set.spawn(async move {
                let _permit = permit;
                job.await
            });
        }

        let mut results = Vec::new();
        while let Some(task_result) = join_set.join_next().await {
            match task_result {
                Ok(result) => results.push(result),
                Err(e) => error!("Worker task failed to complete: {}", e),
            }
        }
        results
    }
}
