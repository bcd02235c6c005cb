//! Fixed-size worker pool over a shared FIFO queue.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use super::types::{PoolError, PoolStats, PoolStatus};

type Task<T> = BoxFuture<'static, T>;
type Queue<T> = Arc<Mutex<mpsc::UnboundedReceiver<Task<T>>>>;

/// A fixed set of tokio tasks draining one queue.
///
/// `submit` never blocks: tasks wait in the queue until a worker is free.
/// `join` is a full barrier over everything submitted.
///
/// Pools created with `with_limit` also hold a permit from a shared
/// semaphore while a task runs, so several pools can share one global bound.
pub struct WorkerPool<T: Send + 'static> {
    name: String,
    size: usize,
    queue: mpsc::UnboundedSender<Task<T>>,
    results: mpsc::UnboundedReceiver<T>,
    workers: Vec<JoinHandle<()>>,
    stats: Arc<PoolStats>,
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Creates a pool with its own statistics.
    pub fn new(name: impl Into<String>, size: usize) -> Self {
        Self::with_stats(name, size, Arc::new(PoolStats::new()))
    }

    /// Creates a pool reporting into shared statistics.
    ///
    /// A size of zero is raised to one.
    pub fn with_stats(name: impl Into<String>, size: usize, stats: Arc<PoolStats>) -> Self {
        Self::build(name.into(), size, stats, None)
    }

    /// Creates a pool whose tasks also need a permit from `limit` to run.
    pub fn with_limit(
        name: impl Into<String>,
        size: usize,
        stats: Arc<PoolStats>,
        limit: Arc<Semaphore>,
    ) -> Self {
        Self::build(name.into(), size, stats, Some(limit))
    }

    fn build(
        name: String,
        size: usize,
        stats: Arc<PoolStats>,
        limit: Option<Arc<Semaphore>>,
    ) -> Self {
        let size = size.max(1);

        let (queue_tx, queue_rx) = mpsc::unbounded_channel::<Task<T>>();
        let (results_tx, results_rx) = mpsc::unbounded_channel::<T>();
        let queue: Queue<T> = Arc::new(Mutex::new(queue_rx));

        let workers = (0..size)
            .map(|worker_id| {
                tokio::spawn(run_worker(
                    name.clone(),
                    worker_id,
                    Arc::clone(&queue),
                    results_tx.clone(),
                    Arc::clone(&stats),
                    limit.clone(),
                ))
            })
            .collect();

        debug!(pool = %name, size, "Worker pool started");

        Self {
            name,
            size,
            queue: queue_tx,
            results: results_rx,
            workers,
            stats,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Queues a task for execution.
    pub fn submit<F>(&self, task: F) -> Result<(), PoolError>
    where
        F: Future<Output = T> + Send + 'static,
    {
        self.stats.task_queued();
        self.queue.send(task.boxed()).map_err(|_| {
            self.stats.task_dequeued();
            PoolError::Closed(self.name.clone())
        })
    }

    pub fn status(&self) -> PoolStatus {
        self.stats.to_status(&self.name, self.size)
    }

    /// Closes the queue and waits for every queued and running task.
    ///
    /// Outputs are returned in completion order. A task that panicked has
    /// no output.
    pub async fn join(self) -> Vec<T> {
        let Self {
            name,
            queue,
            mut results,
            workers,
            ..
        } = self;

        drop(queue);

        for handle in workers {
            if let Err(e) = handle.await {
                error!(pool = %name, error = %e, "Worker task terminated abnormally");
            }
        }

        let mut outputs = Vec::new();
        while let Some(output) = results.recv().await {
            outputs.push(output);
        }

        debug!(pool = %name, completed = outputs.len(), "Worker pool joined");
        outputs
    }
}

async fn run_worker<T: Send + 'static>(
    pool: String,
    worker_id: usize,
    queue: Queue<T>,
    results: mpsc::UnboundedSender<T>,
    stats: Arc<PoolStats>,
    limit: Option<Arc<Semaphore>>,
) {
    loop {
        // The lock is only held while waiting for the next task.
        let task = { queue.lock().await.recv().await };
        let Some(task) = task else {
            break;
        };

        // Still counted as queued until a permit is granted.
        let _permit = match &limit {
            Some(limit) => limit.acquire().await.ok(),
            None => None,
        };

        stats.task_started();
        let outcome = AssertUnwindSafe(task).catch_unwind().await;
        stats.task_finished();

        match outcome {
            Ok(output) => {
                // The receiver lives until join has drained it.
                let _ = results.send(output);
            }
            Err(payload) => {
                stats.record_failure();
                error!(
                    pool = %pool,
                    worker_id,
                    panic = %panic_message(payload.as_ref()),
                    "Task panicked"
                );
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
