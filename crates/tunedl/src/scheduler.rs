//! # Batch Scheduler
//!
//! Runs planned streams in fixed-size batches. Items of one batch are polled
//! concurrently on the calling task; the next batch starts only after every
//! item of the current one has settled, so at most `batch_size` items are in
//! flight at any time. A new processor is built for each batch.
//!
//! Outcomes are returned in input order regardless of completion order.

use futures::future::{join_all, try_join_all};
use futures::{TryStreamExt, stream};
use tracing::{error, info};

use crate::config::{FailurePolicy, SchedulerConfig};
use crate::model::{ItemOutcome, SelectedStream};
use crate::traits::ItemProcessor;
use crate::{PipelineError, Result};

#[derive(Debug, Clone)]
pub struct BatchScheduler {
    config: SchedulerConfig,
}

impl BatchScheduler {
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        if config.batch_size == 0 {
            return Err(PipelineError::configuration(
                "batch size must be at least 1",
            ));
        }
        Ok(Self { config })
    }

    pub fn batch_size(&self) -> usize {
        self.config.batch_size
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.config.failure_policy
    }

    /// Process `items` batch by batch, calling `make_processor` once per batch.
    ///
    /// With [`FailurePolicy::Isolate`] failures are reported in the returned
    /// outcomes. With [`FailurePolicy::FailFast`] the first failure is returned
    /// and no further batch is started.
    pub async fn run<P, M>(&self, items: &[SelectedStream], mut make_processor: M) -> Result<Vec<ItemOutcome>>
    where
        P: ItemProcessor,
        M: FnMut() -> Result<P>,
    {
        let batch_size = self.config.batch_size;
        let batches = items.len().div_ceil(batch_size);

        stream::iter(items.chunks(batch_size).enumerate().map(Ok))
            .try_fold(Vec::with_capacity(items.len()), |mut acc, (index, batch)| {
                let processor = make_processor();
                async move {
                    let processor = processor?;
                    info!(
                        batch = index + 1,
                        batches,
                        items = batch.len(),
                        "Starting batch"
                    );
                    acc.extend(self.run_batch(&processor, batch).await?);
                    Ok::<_, PipelineError>(acc)
                }
            })
            .await
    }

    async fn run_batch<P: ItemProcessor>(
        &self,
        processor: &P,
        batch: &[SelectedStream],
    ) -> Result<Vec<ItemOutcome>> {
        match self.config.failure_policy {
            FailurePolicy::Isolate => {
                let results = join_all(batch.iter().map(|stream| processor.process(stream))).await;
                Ok(batch
                    .iter()
                    .zip(results)
                    .map(|(stream, result)| {
                        report(stream, &result);
                        ItemOutcome {
                            title: stream.title.clone(),
                            result,
                        }
                    })
                    .collect())
            }
            FailurePolicy::FailFast => {
                let paths = try_join_all(batch.iter().map(|stream| async move {
                    let result = processor.process(stream).await;
                    report(stream, &result);
                    result
                }))
                .await?;
                Ok(batch
                    .iter()
                    .zip(paths)
                    .map(|(stream, path)| ItemOutcome {
                        title: stream.title.clone(),
                        result: Ok(path),
                    })
                    .collect())
            }
        }
    }
}

fn report(stream: &SelectedStream, result: &Result<std::path::PathBuf>) {
    match result {
        Ok(path) => info!(title = %stream.title, "Finished {}", path.display()),
        Err(e) => error!(
            title = %stream.title,
            stage = e.stage(),
            "Failed to process {}: {}",
            stream.title,
            e
        ),
    }
}
