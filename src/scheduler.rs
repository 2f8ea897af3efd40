//! Batch scheduler for outbound fetches
//!
//! Open-loop rate limiting: work is split into fixed-size batches, each batch
//! runs concurrently and must fully settle before the next one starts, and a
//! fixed delay separates consecutive batches. Response headers are never
//! inspected; an error from any member stops the run after its batch settles.

use std::future::Future;
use std::time::Duration;

use futures::future::join_all;
use tracing::info;

use crate::config::SyncConfig;

/// Outcome of driving a work set through the scheduler
#[derive(Debug)]
pub struct BatchRun<O, E> {
    /// Outputs of every fully successful batch, in batch order
    pub completed: Vec<O>,
    /// Number of batches started
    pub batches: usize,
    /// Number of inter-batch delays awaited
    pub delays: usize,
    /// First error of the batch that stopped the run. Outputs of that batch
    /// are not part of `completed`.
    pub aborted: Option<E>,
}

/// Runs work in bounded, spaced batches
#[derive(Debug, Clone)]
pub struct BatchScheduler {
    batch_size: usize,
    delay: Duration,
}

impl BatchScheduler {
    /// Creates a scheduler; a batch size of zero is treated as one
    pub fn new(batch_size: usize, delay: Duration) -> Self {
        Self {
            batch_size: batch_size.max(1),
            delay,
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.batch_size, config.inter_batch_delay)
    }

    /// Number of batches needed for `items` pending entries
    pub fn batch_count(&self, items: usize) -> usize {
        items.div_ceil(self.batch_size)
    }

    /// Applies `work` to every item, one batch at a time
    ///
    /// All members of a batch are polled concurrently and joined before the
    /// next batch begins, which caps in-flight requests at the batch size.
    pub async fn run<'a, I, O, E, F, Fut>(&self, items: &'a [I], work: F) -> BatchRun<O, E>
    where
        F: Fn(&'a I) -> Fut,
        Fut: Future<Output = Result<O, E>>,
    {
        let total = self.batch_count(items.len());
        let mut run = BatchRun {
            completed: Vec::with_capacity(items.len()),
            batches: 0,
            delays: 0,
            aborted: None,
        };

        for (index, batch) in items.chunks(self.batch_size).enumerate() {
            if index > 0 {
                tokio::time::sleep(self.delay).await;
                run.delays += 1;
            }

            info!(batch = index + 1, total, size = batch.len(), "starting batch");
            run.batches += 1;

            let results = join_all(batch.iter().map(&work)).await;

            let mut outputs = Vec::with_capacity(results.len());
            for result in results {
                match result {
                    Ok(output) => outputs.push(output),
                    Err(e) => {
                        run.aborted.get_or_insert(e);
                    }
                }
            }
            if run.aborted.is_some() {
                return run;
            }
            run.completed.extend(outputs);
        }

        run
    }
}
