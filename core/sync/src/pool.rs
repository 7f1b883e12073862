//! Fixed-size worker pool draining the task queue.

use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, error, info};

use syncwarden_common::SyncResult;

use crate::queue::TaskQueue;
use crate::retry::RetryEngine;

/// Runs `worker_count` workers until the queue is empty.
pub struct WorkerPool {
    queue: Arc<TaskQueue>,
    engine: Arc<RetryEngine>,
    worker_count: usize,
}

impl WorkerPool {
    /// Create a pool; a worker count of zero is raised to one.
    pub fn new(queue: Arc<TaskQueue>, engine: Arc<RetryEngine>, worker_count: usize) -> Self {
        Self {
            queue,
            engine,
            worker_count: worker_count.max(1),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Start the workers and wait for all of them to finish.
    ///
    /// Returns the result of every task that was processed, in completion
    /// order per worker.
    pub async fn run(self) -> Vec<SyncResult> {
        info!(
            "Starting {} worker(s) for {} task(s)",
            self.worker_count,
            self.queue.len()
        );

        let handles: Vec<_> = (0..self.worker_count)
            .map(|worker_id| {
                let queue = self.queue.clone();
                let engine = self.engine.clone();
                tokio::spawn(worker_loop(worker_id, queue, engine))
            })
            .collect();

        let mut results = Vec::new();
        for (worker_id, joined) in join_all(handles).await.into_iter().enumerate() {
            match joined {
                Ok(worker_results) => results.extend(worker_results),
                Err(e) => error!("Worker {} stopped abnormally: {}", worker_id, e),
            }
        }

        info!("All workers finished, {} task(s) processed", results.len());
        results
    }
}

async fn worker_loop(
    worker_id: usize,
    queue: Arc<TaskQueue>,
    engine: Arc<RetryEngine>,
) -> Vec<SyncResult> {
    let mut results = Vec::new();

    while let Some(task) = queue.try_pop() {
        info!("Starting synchronization for JSON file '{}'...", task.id);
        let result = engine.run(&task).await;
        info!("Synchronization finished for JSON file '{}'.", task.id);
        results.push(result);
    }

    debug!("Worker {} found the queue empty", worker_id);
    results
}
