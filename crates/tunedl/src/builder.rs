use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::{HeaderName, HeaderValue};

use crate::config::{FailurePolicy, PipelineConfig, TargetFormat};
use crate::PipelineError;

/// Builder for [`PipelineConfig`].
///
/// Validation happens in [`build`](Self::build) so every setter stays infallible.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.scheduler.batch_size = size;
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.config.scheduler.failure_policy = policy;
        self
    }

    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.downloader.chunk_size = size;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.downloader.connect_timeout = Some(timeout);
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.downloader.user_agent = user_agent.into();
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.config.downloader.headers.insert(name, value);
        self
    }

    pub fn ffmpeg_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.transcoder.ffmpeg_path = path.into();
        self
    }

    pub fn ffmpeg_global_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.transcoder.global_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn target_format(mut self, format: TargetFormat) -> Self {
        self.config.transcoder.format = format;
        self
    }

    pub fn bitrate(mut self, bitrate: impl Into<String>) -> Self {
        self.config.transcoder.bitrate = Some(bitrate.into());
        self
    }

    pub fn container(mut self, extension: impl Into<String>) -> Self {
        self.config.selection.container = extension.into();
        self
    }

    pub fn audio_only_marker(mut self, marker: impl Into<String>) -> Self {
        self.config.selection.audio_only_marker = marker.into();
        self
    }

    pub fn build(self) -> Result<PipelineConfig, PipelineError> {
        let config = self.config;
        if config.scheduler.batch_size == 0 {
            return Err(PipelineError::configuration(
                "batch size must be at least 1",
            ));
        }
        if config.downloader.chunk_size == 0 {
            return Err(PipelineError::configuration(
                "chunk size must be at least 1 byte",
            ));
        }
        if config.selection.container.trim().is_empty() {
            return Err(PipelineError::configuration(
                "container extension must not be empty",
            ));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = PipelineConfig::builder()
            .output_dir("/tmp/music")
            .batch_size(3)
            .failure_policy(FailurePolicy::FailFast)
            .target_format(TargetFormat::Opus)
            .bitrate("128k")
            .container("m4a")
            .build()
            .unwrap();

        assert_eq!(config.output_dir, PathBuf::from("/tmp/music"));
        assert_eq!(config.scheduler.batch_size, 3);
        assert_eq!(config.scheduler.failure_policy, FailurePolicy::FailFast);
        assert_eq!(config.transcoder.format, TargetFormat::Opus);
        assert_eq!(config.transcoder.bitrate.as_deref(), Some("128k"));
        assert_eq!(config.selection.container, "m4a");
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let err = PipelineConfig::builder().batch_size(0).build().unwrap_err();
        assert!(err.to_string().contains("batch size"));
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        assert!(PipelineConfig::builder().chunk_size(0).build().is_err());
    }
}
