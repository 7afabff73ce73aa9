//! Single-resolution asynchronous result handles.
//!
//! A [`Promise`] is the only way to resolve a value and is consumed when it
//! does, so a handle can never transition twice. Any number of
//! [`PendingResult`] observers may attach continuations before or after the
//! value arrives; each continuation runs exactly once, on the worker pool.
//!
//! ```text
//! supply_async ──► PendingResult<T> ──then/then_async/then_compose──► PendingResult<U>
//!                        │
//!                        └── attach_continuation(FnOnce(PipelineResult<T>))
//! ```
//!
//! A stage that panics fails its own handle with [`PipelineError::Panicked`];
//! the panic never reaches the pool.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::FutureExt;
use tokio::sync::oneshot;

use crate::error::{PipelineError, PipelineResult};
use crate::pool::WorkerPool;

type Continuation<T> = Box<dyn FnOnce(PipelineResult<T>) + Send + 'static>;

enum State<T> {
    Pending(Vec<Continuation<T>>),
    Resolved(PipelineResult<T>),
}

struct Shared<T> {
    state: Mutex<State<T>>,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The resolving side of a [`PendingResult`].
///
/// Dropping an unresolved promise fails its handle with
/// [`PipelineError::Abandoned`] (or [`PipelineError::PoolClosed`] when the
/// pool has been closed), so observers are never left waiting.
pub struct Promise<T: Clone + Send + 'static> {
    shared: Arc<Shared<T>>,
    pool: WorkerPool,
    settled: bool,
}

impl<T: Clone + Send + 'static> Promise<T> {
    /// Create an unresolved promise and its observer handle.
    pub fn new(pool: &WorkerPool) -> (Self, PendingResult<T>) {
        let shared = Arc::new(Shared {
            state: Mutex::new(State::Pending(Vec::new())),
        });
        let promise = Self {
            shared: Arc::clone(&shared),
            pool: pool.clone(),
            settled: false,
        };
        let pending = PendingResult {
            shared,
            pool: pool.clone(),
        };
        (promise, pending)
    }

    /// Resolve with a success value.
    pub fn resolve(self, value: T) {
        self.complete(Ok(value));
    }

    /// Resolve with a failure.
    pub fn fail(self, error: PipelineError) {
        self.complete(Err(error));
    }

    /// Resolve with either outcome.
    pub fn complete(mut self, result: PipelineResult<T>) {
        self.settle(result);
    }

    fn settle(&mut self, result: PipelineResult<T>) {
        if self.settled {
            return;
        }
        self.settled = true;

        let continuations = {
            let mut state = self.shared.lock();
            match std::mem::replace(&mut *state, State::Resolved(result.clone())) {
                State::Pending(continuations) => continuations,
                State::Resolved(previous) => {
                    *state = State::Resolved(previous);
                    return;
                }
            }
        };

        for continuation in continuations {
            schedule(&self.pool, continuation, result.clone());
        }
    }
}

impl<T: Clone + Send + 'static> Drop for Promise<T> {
    fn drop(&mut self) {
        if !self.settled {
            let cause = if self.pool.is_closed() {
                PipelineError::PoolClosed
            } else {
                PipelineError::Abandoned
            };
            self.settle(Err(cause));
        }
    }
}

/// A continuation bound to its input, runnable exactly once.
///
/// If the pool drops the task before it runs, the continuation still runs
/// from `Drop` so downstream handles always settle.
struct Scheduled<T> {
    job: Option<(Continuation<T>, PipelineResult<T>)>,
}

impl<T> Scheduled<T> {
    fn run(mut self) {
        if let Some((continuation, result)) = self.job.take() {
            continuation(result);
        }
    }
}

impl<T> Drop for Scheduled<T> {
    fn drop(&mut self) {
        if let Some((continuation, result)) = self.job.take() {
            continuation(result);
        }
    }
}

fn schedule<T: Send + 'static>(
    pool: &WorkerPool,
    continuation: Continuation<T>,
    result: PipelineResult<T>,
) {
    let scheduled = Scheduled {
        job: Some((continuation, result)),
    };
    if let Err(e) = pool.spawn(async move { scheduled.run() }) {
        tracing::debug!("Continuation ran inline: {e}");
    }
}

/// Drive `future` to completion, returning the panic message if it panics.
pub(crate) async fn catch_panic<F: Future>(future: F) -> Result<F::Output, String> {
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .map_err(panic_message)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn panicked(payload: Box<dyn Any + Send>) -> PipelineError {
    PipelineError::Panicked {
        message: panic_message(payload),
    }
}

fn settle_caught<T>(result: Result<PipelineResult<T>, String>) -> PipelineResult<T> {
    result.unwrap_or_else(|message| Err(PipelineError::Panicked { message }))
}

/// Observer handle for a value that becomes available exactly once.
///
/// Cloning is cheap; all clones observe the same resolution.
pub struct PendingResult<T> {
    shared: Arc<Shared<T>>,
    pool: WorkerPool,
}

impl<T> Clone for PendingResult<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            pool: self.pool.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> PendingResult<T> {
    /// A handle that is already resolved with `value`.
    pub fn completed(pool: &WorkerPool, value: T) -> Self {
        let (promise, pending) = Promise::new(pool);
        promise.resolve(value);
        pending
    }

    /// A handle that is already failed with `error`.
    pub fn failed(pool: &WorkerPool, error: PipelineError) -> Self {
        let (promise, pending) = Promise::new(pool);
        promise.fail(error);
        pending
    }

    /// Run `f` on the pool and resolve with its output.
    pub fn supply_async<F, Fut>(pool: &WorkerPool, f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = PipelineResult<T>> + Send + 'static,
    {
        let (promise, pending) = Promise::new(pool);
        // A rejected task drops the promise, which fails the handle.
        let _ = pool.spawn(async move {
            let result = catch_panic(async move { f().await }).await;
            promise.complete(settle_caught(result));
        });
        pending
    }

    /// Register `f` to receive the outcome. Runs exactly once, on the pool.
    pub fn attach_continuation<F>(&self, f: F)
    where
        F: FnOnce(PipelineResult<T>) + Send + 'static,
    {
        let resolved = {
            let mut state = self.shared.lock();
            match &mut *state {
                State::Pending(continuations) => {
                    continuations.push(Box::new(f));
                    return;
                }
                State::Resolved(result) => result.clone(),
            }
        };
        schedule(&self.pool, Box::new(f), resolved);
    }

    /// Whether the handle has resolved (either way).
    pub fn is_resolved(&self) -> bool {
        matches!(&*self.shared.lock(), State::Resolved(_))
    }

    /// The outcome, if already resolved.
    pub fn try_result(&self) -> Option<PipelineResult<T>> {
        match &*self.shared.lock() {
            State::Resolved(result) => Some(result.clone()),
            State::Pending(_) => None,
        }
    }

    /// Map a success value synchronously. Failures pass through unchanged.
    pub fn then<U, F>(&self, f: F) -> PendingResult<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let (promise, pending) = Promise::new(&self.pool);
        self.attach_continuation(move |result| {
            let mapped = result.and_then(|value| {
                std::panic::catch_unwind(AssertUnwindSafe(|| f(value))).map_err(panicked)
            });
            promise.complete(mapped);
        });
        pending
    }

    /// Chain an asynchronous stage that runs on the pool once this resolves.
    pub fn then_async<U, F, Fut>(&self, f: F) -> PendingResult<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Fut + Send + 'static,
        Fut: Future<Output = PipelineResult<U>> + Send + 'static,
    {
        let (promise, pending) = Promise::new(&self.pool);
        let pool = self.pool.clone();
        self.attach_continuation(move |result| match result {
            Ok(value) => {
                let _ = pool.spawn(async move {
                    let result = catch_panic(async move { f(value).await }).await;
                    promise.complete(settle_caught(result));
                });
            }
            Err(e) => promise.fail(e),
        });
        pending
    }

    /// Chain a stage that itself returns a handle, flattening the result.
    pub fn then_compose<U, F>(&self, f: F) -> PendingResult<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> PendingResult<U> + Send + 'static,
    {
        let (promise, pending) = Promise::new(&self.pool);
        self.attach_continuation(move |result| match result {
            Ok(value) => match std::panic::catch_unwind(AssertUnwindSafe(|| f(value))) {
                Ok(next) => next.attach_continuation(move |inner| promise.complete(inner)),
                Err(payload) => promise.fail(panicked(payload)),
            },
            Err(e) => promise.fail(e),
        });
        pending
    }

    /// Wait for the outcome without blocking a worker thread.
    pub async fn wait(&self) -> PipelineResult<T> {
        let (tx, rx) = oneshot::channel();
        self.attach_continuation(move |result| {
            let _ = tx.send(result);
        });
        rx.await.unwrap_or(Err(PipelineError::Abandoned))
    }
}

impl<T> std::fmt::Debug for PendingResult<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let resolved = matches!(&*self.shared.lock(), State::Resolved(_));
        f.debug_struct("PendingResult")
            .field("resolved", &resolved)
            .finish()
    }
}
