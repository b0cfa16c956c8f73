use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::PipelineError;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/142.0.0.0 Safari/537.36";

/// Size of the chunks written to disk and reported as progress.
pub const DEFAULT_CHUNK_SIZE: usize = 100 * 1024;

/// Number of items processed concurrently.
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Configurable options for the HTTP downloader
#[derive(Debug, Clone)]
pub struct DownloaderConfig {
    /// Bytes per chunk written to the destination file
    pub chunk_size: usize,

    /// Connection timeout. There is deliberately no request or read timeout:
    /// large or slow transfers run until the server closes the body.
    pub connect_timeout: Option<Duration>,

    /// Whether to follow redirects
    pub follow_redirects: bool,

    /// User agent string
    pub user_agent: String,

    /// Custom HTTP headers for requests
    pub headers: HeaderMap,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            connect_timeout: None,
            follow_redirects: true,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            headers: DownloaderConfig::get_default_headers(),
        }
    }
}

impl DownloaderConfig {
    pub fn get_default_headers() -> HeaderMap {
        let mut default_headers = HeaderMap::new();

        default_headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static("*/*"),
        );

        default_headers.insert(
            reqwest::header::CONNECTION,
            HeaderValue::from_static("keep-alive"),
        );

        default_headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.5"),
        );
        default_headers
    }
}

/// Audio output format produced by the transcoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    /// MP3 using libmp3lame.
    #[default]
    Mp3,
    /// AAC in an MP4 container.
    M4a,
    /// FLAC (lossless).
    Flac,
    /// Opus using libopus.
    Opus,
    /// 16-bit PCM WAV.
    Wav,
}

impl TargetFormat {
    /// Get the ffmpeg codec argument for this format.
    pub fn codec_arg(&self) -> &'static str {
        match self {
            Self::Mp3 => "libmp3lame",
            Self::M4a => "aac",
            Self::Flac => "flac",
            Self::Opus => "libopus",
            Self::Wav => "pcm_s16le",
        }
    }

    /// File extension of the final output.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::M4a => "m4a",
            Self::Flac => "flac",
            Self::Opus => "opus",
            Self::Wav => "wav",
        }
    }

    /// Whether a bitrate setting is meaningful for the codec.
    pub fn is_lossy(&self) -> bool {
        matches!(self, Self::Mp3 | Self::M4a | Self::Opus)
    }
}

impl FromStr for TargetFormat {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mp3" => Ok(Self::Mp3),
            "m4a" | "aac" => Ok(Self::M4a),
            "flac" => Ok(Self::Flac),
            "opus" => Ok(Self::Opus),
            "wav" => Ok(Self::Wav),
            other => Err(PipelineError::configuration(format!(
                "unsupported target format `{other}`"
            ))),
        }
    }
}

impl std::fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Configuration for the external transcoder.
#[derive(Debug, Clone)]
pub struct TranscoderConfig {
    /// Path to the ffmpeg binary.
    pub ffmpeg_path: PathBuf,

    /// Arguments placed before every generated argument.
    pub global_args: Vec<String>,

    /// Output format.
    pub format: TargetFormat,

    /// Audio bitrate (e.g. "192k"). Ignored for lossless formats.
    pub bitrate: Option<String>,

    /// Number of trailing stderr lines kept for failure reports.
    pub stderr_tail: usize,
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: std::env::var_os("FFMPEG_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("ffmpeg")),
            global_args: Vec::new(),
            format: TargetFormat::default(),
            bitrate: None,
            stderr_tail: process_utils::DEFAULT_STDERR_TAIL,
        }
    }
}

/// Preferences used to pick the stream of each item.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Substring of the stream's format description that marks audio-only streams.
    pub audio_only_marker: String,
    /// Required container extension, compared case-insensitively.
    pub container: String,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            audio_only_marker: "audio only".to_string(),
            container: "webm".to_string(),
        }
    }
}

/// What the scheduler does when an item fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Let every item finish and record failures per item.
    #[default]
    Isolate,
    /// Drop the rest of the batch and abort the run on the first failure.
    FailFast,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub batch_size: usize,
    pub failure_policy: FailurePolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            failure_policy: FailurePolicy::default(),
        }
    }
}

/// Everything needed to run the download-and-transcode pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub output_dir: PathBuf,
    pub downloader: DownloaderConfig,
    pub transcoder: TranscoderConfig,
    pub selection: SelectionConfig,
    pub scheduler: SchedulerConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            downloader: DownloaderConfig::default(),
            transcoder: TranscoderConfig::default(),
            selection: SelectionConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn builder() -> crate::builder::PipelineConfigBuilder {
        crate::builder::PipelineConfigBuilder::new()
    }
}
