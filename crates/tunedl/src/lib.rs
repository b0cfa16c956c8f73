//! # tunedl engine
//!
//! Batched download and transcode of audio streams.
//!
//! ## Features
//!
//! - Best audio-only stream selection per media item
//! - Chunked HTTP downloads with progress reporting
//! - ffmpeg transcoding with raw-file cleanup on success
//! - Fixed-size batches with bounded concurrency and ordered results
//! - yt-dlp metadata resolution
//!
//! ## License
//!
//! MIT License
//!
//! ## Authors
//!
//! - hua0512
//!

pub mod builder;
pub mod config;
pub mod downloader;
pub mod error;
pub mod files;
pub mod metadata;
pub mod model;
pub mod pipeline;
mod planner;
pub mod scheduler;
pub mod selector;
pub mod traits;
pub mod transcoder;

pub use builder::PipelineConfigBuilder;
pub use config::{
    DownloaderConfig, FailurePolicy, PipelineConfig, SchedulerConfig, SelectionConfig,
    TargetFormat, TranscoderConfig,
};
pub use downloader::{Downloader, ProgressCallback};
pub use error::{PipelineError, Result};
pub use metadata::{YtDlpOptions, YtDlpProvider};
pub use model::{
    DownloadProgress, DownloadedFile, ItemOutcome, MediaItem, MetadataResponse, SelectedStream,
    StreamDescriptor,
};
pub use pipeline::{ItemPipeline, run_pipeline};
pub use planner::plan_downloads;
pub use scheduler::BatchScheduler;
pub use selector::StreamSelector;
pub use traits::{AudioTranscoder, ItemProcessor, MetadataProvider, StreamFetcher};
pub use transcoder::Transcoder;
