use std::path::PathBuf;
use std::process::ExitStatus;

use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("HTTP request failed: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    #[error("request failed with HTTP {status} for {url}")]
    HttpStatus { status: StatusCode, url: String },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("cannot prepare output directory {}: {source}", path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to launch `{program}`: {source}")]
    TranscodeLaunch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("transcoding {} failed ({status}): {stderr}", input.display())]
    Transcode {
        input: PathBuf,
        status: ExitStatus,
        stderr: String,
    },

    #[error("metadata provider failed: {reason}")]
    Metadata { reason: String },

    #[error("invalid metadata JSON: {source}")]
    MetadataParse {
        #[from]
        source: serde_json::Error,
    },

    #[error("configuration error: {reason}")]
    Configuration { reason: String },
}

impl PipelineError {
    pub fn http_status(status: StatusCode, url: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            url: url.into(),
        }
    }

    pub fn metadata(reason: impl Into<String>) -> Self {
        Self::Metadata {
            reason: reason.into(),
        }
    }

    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Stage that produced the error, for user-facing diagnostics.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Network { .. } | Self::HttpStatus { .. } | Self::Io { .. } => "download",
            Self::Transcode { .. } | Self::TranscodeLaunch { .. } => "transcode",
            Self::OutputDir { .. } => "output",
            Self::Metadata { .. } | Self::MetadataParse { .. } => "metadata",
            Self::Configuration { .. } => "configuration",
        }
    }

    /// Whether the failure stops the whole run rather than a single item.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::OutputDir { .. }
                | Self::Metadata { .. }
                | Self::MetadataParse { .. }
                | Self::Configuration { .. }
        )
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
