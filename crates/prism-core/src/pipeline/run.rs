//! Filter runner: executes one task on the worker pool.

use std::time::Duration;

use crate::error::{FailureKind, PipelineError};
use crate::pending::{catch_panic, PendingResult};
use crate::pool::WorkerPool;
use crate::types::PersistedOutput;

use super::bind::FilterTask;

/// Runs filter tasks independently of each other.
#[derive(Debug, Clone)]
pub struct FilterRunner {
    pool: WorkerPool,
    timeout: Option<Duration>,
}

impl FilterRunner {
    /// Create a runner. `timeout` bounds each filter's `apply`.
    pub fn new(pool: WorkerPool, timeout: Option<Duration>) -> Self {
        Self { pool, timeout }
    }

    /// Start `task`. Failures are reported as filter failures for that task only.
    pub fn run(&self, task: FilterTask) -> PendingResult<PersistedOutput> {
        let limit = self.timeout;
        PendingResult::supply_async(&self.pool, move || async move {
            let FilterTask { filter, image } = task;
            let url = image.url.to_string();
            let name = filter.name().to_string();

            let apply = async {
                match limit {
                    Some(limit) => tokio::time::timeout(limit, filter.apply(image))
                        .await
                        .unwrap_or_else(|_| {
                            Err(PipelineError::Timeout {
                                url: url.clone(),
                                stage: "filter".to_string(),
                                filter: Some(name.clone()),
                                timeout_ms: limit.as_millis() as u64,
                            })
                        }),
                    None => filter.apply(image).await,
                }
            };
            let result = catch_panic(apply).await.unwrap_or_else(|message| {
                Err(PipelineError::Filter {
                    url: url.clone(),
                    filter: name.clone(),
                    message: format!("panicked: {message}"),
                })
            });

            result.map_err(|e| match e.kind() {
                FailureKind::Filter => e,
                _ => PipelineError::Filter {
                    url,
                    filter: name,
                    message: e.to_string(),
                },
            })
        })
    }
}
