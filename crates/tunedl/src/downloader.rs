//! # Audio Downloader
//!
//! Streams a selected audio stream to disk. The response body is re-chunked
//! into fixed-size pieces; each piece is written to the destination file and
//! reported as progress, both through an optional callback and through the
//! progress bar attached to the current tracing span.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::BytesMut;
use futures::StreamExt;
use humansize::{BINARY, format_size};
use indicatif::ProgressStyle;
use reqwest::{Client, redirect};
use tokio::io::AsyncWriteExt;
use tracing::{Span, debug, info, instrument};
use tracing_indicatif::span_ext::IndicatifSpanExt;

use crate::config::DownloaderConfig;
use crate::model::{DownloadProgress, DownloadedFile, SelectedStream};
use crate::traits::StreamFetcher;
use crate::{PipelineError, Result};

/// Callback invoked after every chunk written to disk.
pub type ProgressCallback = Arc<dyn Fn(DownloadProgress) + Send + Sync + 'static>;

/// Build the HTTP client shared by every download of a batch.
pub fn create_client(config: &DownloaderConfig) -> Result<Client> {
    let redirect_policy = if config.follow_redirects {
        redirect::Policy::limited(10)
    } else {
        redirect::Policy::none()
    };

    let mut builder = Client::builder()
        .user_agent(config.user_agent.clone())
        .default_headers(config.headers.clone())
        .redirect(redirect_policy);

    if let Some(timeout) = config.connect_timeout {
        builder = builder.connect_timeout(timeout);
    }

    Ok(builder.build()?)
}

fn progress_message(title: &str, received: u64, total: Option<u64>) -> String {
    let total = total
        .map(|t| format_size(t, BINARY))
        .unwrap_or_else(|| "unknown".to_string());
    format!(
        "Download {}: {} from {}",
        title,
        format_size(received, BINARY),
        total
    )
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{span_child_prefix}{spinner:.green} [{bar:20.green/white}] {msg}")
        .map(|style| style.progress_chars("=> "))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

/// HTTP downloader for selected audio streams
pub struct Downloader {
    client: Client,
    config: DownloaderConfig,
    on_progress: Option<ProgressCallback>,
}

impl Downloader {
    /// Create a new Downloader with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(DownloaderConfig::default())
    }

    /// Create a new Downloader with custom configuration
    pub fn with_config(config: DownloaderConfig) -> Result<Self> {
        if config.chunk_size == 0 {
            return Err(PipelineError::configuration(
                "chunk size must be at least 1 byte",
            ));
        }
        let client = create_client(&config)?;
        Ok(Self {
            client,
            config,
            on_progress: None,
        })
    }

    pub fn with_progress(mut self, on_progress: ProgressCallback) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    /// Download `stream` into `<output_dir>/<file_stem>.<extension>`.
    pub async fn download_to_dir(
        &self,
        stream: &SelectedStream,
        output_dir: &Path,
    ) -> Result<DownloadedFile> {
        let destination = output_dir.join(format!("{}.{}", stream.file_stem, stream.extension()));
        self.download(stream, &destination).await
    }

    /// Download `stream` into `destination`.
    ///
    /// A partially written file is left in place when the transfer fails.
    #[instrument(skip(self, stream), fields(title = %stream.title))]
    pub async fn download(
        &self,
        stream: &SelectedStream,
        destination: &Path,
    ) -> Result<DownloadedFile> {
        let span = Span::current();
        let url = stream.url();

        info!(title = %stream.title, "start downloading {}", stream.title);
        debug!(url = %url, destination = %destination.display(), "Sending download request");

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(PipelineError::http_status(response.status(), url));
        }

        let total = stream.size_bytes().or(response.content_length());
        span.pb_set_style(&bar_style());
        if let Some(total) = total {
            span.pb_set_length(total);
        }
        span.pb_set_message(&progress_message(&stream.title, 0, total));

        let mut file = tokio::fs::File::create(destination).await?;
        let mut body = response.bytes_stream();
        let chunk_size = self.config.chunk_size;
        let mut pending = BytesMut::with_capacity(chunk_size);
        let mut received: u64 = 0;

        while let Some(next) = body.next().await {
            pending.extend_from_slice(&next?);
            while pending.len() >= chunk_size {
                let chunk = pending.split_to(chunk_size);
                received += chunk.len() as u64;
                file.write_all(&chunk).await?;
                self.report(&span, &stream.title, received, total);
            }
        }

        if !pending.is_empty() {
            received += pending.len() as u64;
            file.write_all(&pending).await?;
            self.report(&span, &stream.title, received, total);
        }

        file.flush().await?;

        span.pb_set_finish_message(&progress_message(&stream.title, received, total));
        info!(
            title = %stream.title,
            size = %format_size(received, BINARY),
            "successfully downloaded {}",
            stream.title
        );

        Ok(DownloadedFile {
            path: destination.to_path_buf(),
            bytes_written: received,
            expected_bytes: total,
        })
    }

    fn report(&self, span: &Span, title: &str, received: u64, total: Option<u64>) {
        span.pb_set_position(received);
        span.pb_set_message(&progress_message(title, received, total));
        if let Some(on_progress) = &self.on_progress {
            on_progress(DownloadProgress {
                title: title.to_string(),
                received,
                total,
            });
        }
    }
}

#[async_trait]
impl StreamFetcher for Downloader {
    async fn fetch(&self, stream: &SelectedStream, destination: &Path) -> Result<DownloadedFile> {
        self.download(stream, destination).await
    }
}
