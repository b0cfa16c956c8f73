//! Seams between the pipeline stages.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::Result;
use crate::model::{DownloadedFile, MediaItem, SelectedStream};

/// Fetches a selected stream into a local file.
#[async_trait]
pub trait StreamFetcher: Send + Sync {
    async fn fetch(&self, stream: &SelectedStream, destination: &Path) -> Result<DownloadedFile>;
}

/// Converts a raw download into the target audio format.
#[async_trait]
pub trait AudioTranscoder: Send + Sync {
    /// Extension of the files this transcoder produces.
    fn target_extension(&self) -> &str;

    /// Convert `input` into `output`. On success the input is gone.
    async fn transcode(&self, input: &Path, output: &Path) -> Result<PathBuf>;
}

/// Runs the whole per-item pipeline.
#[async_trait]
pub trait ItemProcessor: Send + Sync {
    async fn process(&self, stream: &SelectedStream) -> Result<PathBuf>;
}

/// Resolves a source URL into media items.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn resolve(&self, url: &str) -> Result<Vec<MediaItem>>;
}
