//! Shared worker pool that runs every asynchronous pipeline stage.
//!
//! The pool is a thin layer over a tokio runtime handle plus a semaphore that
//! bounds how many stages run at once. It is created by the driver and passed
//! into the pipeline explicitly; stages only ever enqueue work through
//! [`WorkerPool::spawn`].

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::Semaphore;

use crate::error::{PipelineError, PrismError};

/// Bounded executor for pipeline stages. Cloning shares the same pool.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    handle: Handle,
    permits: Arc<Semaphore>,
    workers: usize,
    closed: AtomicBool,
}

impl WorkerPool {
    /// Create a pool on the runtime the caller is running in.
    pub fn current(workers: usize) -> Result<Self, PrismError> {
        let handle = Handle::try_current()
            .map_err(|e| PrismError::Pool(format!("no tokio runtime available: {e}")))?;
        Ok(Self::with_handle(handle, workers))
    }

    /// Create a pool that spawns onto the given runtime handle.
    ///
    /// `workers` is clamped to at least one.
    pub fn with_handle(handle: Handle, workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            inner: Arc::new(PoolInner {
                handle,
                permits: Arc::new(Semaphore::new(workers)),
                workers,
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Enqueue a task. The task starts once a worker permit is free.
    ///
    /// Fails with [`PipelineError::PoolClosed`] once the pool is closed; the
    /// task is dropped without running in that case.
    pub fn spawn<F>(&self, task: F) -> Result<(), PipelineError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.is_closed() {
            return Err(PipelineError::PoolClosed);
        }
        let permits = Arc::clone(&self.inner.permits);
        self.inner.handle.spawn(async move {
            // Semaphore closes together with the pool; queued tasks are dropped.
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            task.await;
        });
        Ok(())
    }

    /// Stop accepting work. Queued tasks that have not started are dropped.
    pub fn close(&self) {
        if !self.inner.closed.swap(true, Ordering::SeqCst) {
            tracing::debug!("Worker pool closed");
        }
        self.inner.permits.close();
    }

    /// Whether the pool has been closed.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Configured parallelism.
    pub fn workers(&self) -> usize {
        self.inner.workers
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.inner.workers)
            .field("available", &self.inner.permits.available_permits())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_spawn_runs_task() {
        let pool = WorkerPool::current(2).unwrap();
        let (tx, rx) = oneshot::channel();
        pool.spawn(async move {
            tx.send(7).unwrap();
        })
        .unwrap();
        assert_eq!(rx.await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_closed_pool_rejects_work() {
        let pool = WorkerPool::current(1).unwrap();
        pool.close();
        assert!(pool.is_closed());
        let err = pool.spawn(async {}).unwrap_err();
        assert_eq!(err, PipelineError::PoolClosed);
    }

    #[test]
    fn test_workers_clamped_to_one() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let pool = WorkerPool::with_handle(rt.handle().clone(), 0);
        assert_eq!(pool.workers(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_pool_bounds_parallelism() {
        let pool = WorkerPool::current(2).unwrap();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let mut done = Vec::new();

        for _ in 0..6 {
            let in_flight = Arc::clone(&in_flight);
            let max_seen = Arc::clone(&max_seen);
            let (tx, rx) = oneshot::channel::<()>();
            done.push(rx);
            pool.spawn(async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                let _ = tx.send(());
            })
            .unwrap();
        }
        for rx in done {
            rx.await.unwrap();
        }
        assert!(max_seen.load(Ordering::SeqCst) <= 2);
    }
}
