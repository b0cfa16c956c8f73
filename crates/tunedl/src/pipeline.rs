//! Per-item pipeline and the top-level run entry point.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use crate::config::PipelineConfig;
use crate::downloader::{Downloader, ProgressCallback};
use crate::files::{output_path, prepare_output_dir, raw_download_path};
use crate::model::{ItemOutcome, SelectedStream};
use crate::scheduler::BatchScheduler;
use crate::traits::{AudioTranscoder, ItemProcessor, StreamFetcher};
use crate::transcoder::Transcoder;
use crate::Result;

/// Download followed by transcode for a single item.
pub struct ItemPipeline<F, T> {
    fetcher: F,
    transcoder: T,
    output_dir: PathBuf,
}

impl<F, T> ItemPipeline<F, T>
where
    F: StreamFetcher,
    T: AudioTranscoder,
{
    pub fn new(fetcher: F, transcoder: T, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            fetcher,
            transcoder,
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

impl ItemPipeline<Downloader, Transcoder> {
    /// Build the production pipeline. Each call opens a new HTTP session.
    pub fn from_config(
        config: &PipelineConfig,
        on_progress: Option<ProgressCallback>,
    ) -> Result<Self> {
        let mut downloader = Downloader::with_config(config.downloader.clone())?;
        if let Some(on_progress) = on_progress {
            downloader = downloader.with_progress(on_progress);
        }
        let transcoder = Transcoder::with_config(config.transcoder.clone());
        Ok(Self::new(downloader, transcoder, config.output_dir.clone()))
    }
}

#[async_trait]
impl<F, T> ItemProcessor for ItemPipeline<F, T>
where
    F: StreamFetcher,
    T: AudioTranscoder,
{
    async fn process(&self, stream: &SelectedStream) -> Result<PathBuf> {
        let target_ext = self.transcoder.target_extension();
        let raw = raw_download_path(
            &self.output_dir,
            &stream.file_stem,
            stream.extension(),
            target_ext,
        );
        let output = output_path(&self.output_dir, &stream.file_stem, target_ext);

        let downloaded = self.fetcher.fetch(stream, &raw).await?;
        self.transcoder.transcode(&downloaded.path, &output).await
    }
}

/// Prepare the output directory and run every planned stream through the pipeline.
///
/// Returns one outcome per stream, in the order given.
pub async fn run_pipeline(
    config: &PipelineConfig,
    streams: &[SelectedStream],
    on_progress: Option<ProgressCallback>,
) -> Result<Vec<ItemOutcome>> {
    prepare_output_dir(&config.output_dir).await?;

    let scheduler = BatchScheduler::new(config.scheduler.clone())?;
    info!(
        items = streams.len(),
        batch_size = scheduler.batch_size(),
        output_dir = %config.output_dir.display(),
        "Starting pipeline"
    );

    scheduler
        .run(streams, || ItemPipeline::from_config(config, on_progress.clone()))
        .await
}
