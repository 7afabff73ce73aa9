//! Fan-in barrier over many pending results.
//!
//! [`join_all`] waits for every input handle, successful or not, and reports
//! both sides. It never short-circuits on the first failure, so work that is
//! already in flight always gets to finish and be counted.

use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{PipelineError, PipelineResult};
use crate::pending::{PendingResult, Promise};
use crate::pool::WorkerPool;

/// Aggregate outcome of a join.
#[derive(Debug, Clone, PartialEq)]
pub struct Joined<T> {
    /// Successful values in submission order
    pub successes: Vec<T>,
    /// Failures with the index of the handle that produced them, in submission order
    pub failures: Vec<(usize, PipelineError)>,
}

impl<T> Default for Joined<T> {
    fn default() -> Self {
        Self {
            successes: Vec::new(),
            failures: Vec::new(),
        }
    }
}

impl<T> Joined<T> {
    fn from_slots(slots: Vec<Option<PipelineResult<T>>>) -> Self {
        let mut joined = Self::default();
        for (index, slot) in slots.into_iter().enumerate() {
            match slot {
                Some(Ok(value)) => joined.successes.push(value),
                Some(Err(e)) => joined.failures.push((index, e)),
                None => joined.failures.push((index, PipelineError::Abandoned)),
            }
        }
        joined
    }

    /// Number of handles that were joined.
    pub fn len(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    /// Whether no handles were joined.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether every joined handle succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

struct JoinState<T: Clone + Send + 'static> {
    slots: Vec<Option<PipelineResult<T>>>,
    remaining: usize,
    promise: Option<Promise<Joined<T>>>,
}

/// Combine `handles` into one handle that resolves after all of them have.
///
/// The returned handle only fails if it is abandoned (e.g. the pool is torn
/// down mid-join); constituent failures are reported inside [`Joined`].
pub fn join_all<T>(pool: &WorkerPool, handles: Vec<PendingResult<T>>) -> PendingResult<Joined<T>>
where
    T: Clone + Send + 'static,
{
    let (promise, joined) = Promise::new(pool);
    if handles.is_empty() {
        promise.resolve(Joined::default());
        return joined;
    }

    let state = Arc::new(Mutex::new(JoinState {
        slots: (0..handles.len()).map(|_| None).collect(),
        remaining: handles.len(),
        promise: Some(promise),
    }));

    for (index, handle) in handles.into_iter().enumerate() {
        let state = Arc::clone(&state);
        handle.attach_continuation(move |result| {
            let finished = {
                let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
                state.slots[index] = Some(result);
                state.remaining -= 1;
                if state.remaining == 0 {
                    Some((std::mem::take(&mut state.slots), state.promise.take()))
                } else {
                    None
                }
            };
            if let Some((slots, Some(promise))) = finished {
                promise.resolve(Joined::from_slots(slots));
            }
        });
    }

    joined
}
