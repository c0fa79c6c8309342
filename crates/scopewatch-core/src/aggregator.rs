//! Fan-out/fan-in aggregation of enrichment results
//!
//! Each enrichment task returns its whole contribution as one batch instead
//! of mutating a shared accumulator. Batches are appended when tasks are
//! joined, which gives the two guarantees both pipelines rely on:
//!
//! - a task's contribution is observed atomically, in the order the task
//!   produced it
//! - nothing is counted until every task launched for the cycle has
//!   returned ([`Aggregator::collect`] is the barrier)
//!
//! Order *across* tasks is completion order and therefore unspecified.

use std::future::Future;
use tokio::task::JoinSet;
use tracing::{debug, error};

use crate::error::{Error, Result};

/// Frozen result of one fan-out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregate<T> {
    /// Every item contributed by every task
    pub items: Vec<T>,
    /// Number of tasks joined, including ones that contributed nothing
    pub tasks: usize,
}

/// Collector for per-cycle enrichment tasks
pub struct Aggregator<T> {
    tasks: JoinSet<(String, Vec<T>)>,
    launched: usize,
}

impl<T: Send + 'static> Aggregator<T> {
    /// Create an empty aggregator
    pub fn new() -> Self {
        Self {
            tasks: JoinSet::new(),
            launched: 0,
        }
    }

    /// Launch one enrichment task
    ///
    /// `label` identifies the task in logs (program name, root domain).
    pub fn spawn<F>(&mut self, label: impl Into<String>, task: F)
    where
        F: Future<Output = Vec<T>> + Send + 'static,
    {
        let label = label.into();
        self.launched += 1;
        self.tasks.spawn(async move { (label, task.await) });
    }

    /// Number of tasks launched so far
    pub fn launched(&self) -> usize {
        self.launched
    }

    /// Wait for every launched task and freeze the result
    ///
    /// # Errors
    ///
    /// [`Error::Task`] if any task panicked or was cancelled. Its
    /// contribution is unknown, so the whole aggregate is rejected rather
    /// than silently short.
    pub async fn collect(mut self) -> Result<Aggregate<T>> {
        let mut items = Vec::new();
        let mut joined = 0;

        while let Some(outcome) = self.tasks.join_next().await {
            match outcome {
                Ok((label, batch)) => {
                    debug!("Task {} contributed {} item(s)", label, batch.len());
                    items.extend(batch);
                    joined += 1;
                }
                Err(e) => {
                    error!("Enrichment task failed: {}", e);
                    self.tasks.abort_all();
                    return Err(Error::Task(e.to_string()));
                }
            }
        }

        debug_assert_eq!(joined, self.launched);
        Ok(Aggregate {
            items,
            tasks: joined,
        })
    }

    /// Launch one task per input and collect
    ///
    /// # Parameters
    ///
    /// - `inputs`: `(label, input)` pairs, one task each
    /// - `task`: builds the task future for one input
    pub async fn fan_out<I, F, Fut>(
        inputs: impl IntoIterator<Item = (String, I)>,
        task: F,
    ) -> Result<Aggregate<T>>
    where
        F: Fn(I) -> Fut,
        Fut: Future<Output = Vec<T>> + Send + 'static,
    {
        let mut aggregator = Self::new();
        for (label, input) in inputs {
            aggregator.spawn(label, task(input));
        }
        aggregator.collect().await
    }
}

impl<T: Send + 'static> Default for Aggregator<T> {
    fn default() -> Self {
        Self::new()
    }
}
