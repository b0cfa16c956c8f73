//! Data types flowing through the pipeline.
//!
//! The stream and item types deserialize directly from the JSON emitted by
//! `yt-dlp --dump-single-json`, so the field names follow that format.

use std::path::PathBuf;

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;

use crate::PipelineError;

/// One fetchable encoding of an item's media.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StreamDescriptor {
    #[serde(default)]
    pub title: Option<String>,

    /// Fetch location.
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,

    /// Container extension, e.g. `webm`.
    #[serde(rename = "ext", default, deserialize_with = "null_as_default")]
    pub extension: String,

    /// Format description, e.g. `251 - audio only (medium)`.
    #[serde(rename = "format", default, deserialize_with = "null_as_default")]
    pub mime_class: String,

    /// Size in bytes when the provider knows it.
    #[serde(rename = "filesize", default, deserialize_with = "lenient_size")]
    pub size_bytes: Option<u64>,
}

/// Accept integers, floats and numeric strings; anything else is an unknown size.
fn lenient_size<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }))
}

/// yt-dlp writes `null` for fields it could not extract.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

const UNKNOWN_TITLE: &str = "Unknown";

fn default_title() -> String {
    UNKNOWN_TITLE.to_string()
}

fn title_or_unknown<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(default_title))
}

/// One media entry to download.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MediaItem {
    #[serde(default = "default_title", deserialize_with = "title_or_unknown")]
    pub title: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub formats: Vec<StreamDescriptor>,
}

/// Top-level shape returned by the metadata provider.
///
/// A document with an `entries` key is always a playlist, even when some of
/// its entries are malformed.
#[derive(Debug, Clone)]
pub enum MetadataResponse {
    Playlist { entries: Vec<Option<MediaItem>> },
    Single(MediaItem),
}

impl MetadataResponse {
    pub fn from_json(bytes: &[u8]) -> Result<Self, PipelineError> {
        Self::from_value(serde_json::from_slice(bytes)?)
    }

    pub fn from_value(mut value: Value) -> Result<Self, PipelineError> {
        let Some(entries) = value.as_object_mut().and_then(|doc| doc.remove("entries")) else {
            return Ok(Self::Single(serde_json::from_value(value)?));
        };

        let entries = match entries {
            Value::Array(entries) => entries,
            Value::Null => Vec::new(),
            other => {
                return Err(PipelineError::metadata(format!(
                    "playlist entries must be a list, got {other}"
                )));
            }
        };

        let entries = entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| {
                if entry.is_null() {
                    return None;
                }
                serde_json::from_value::<MediaItem>(entry)
                    .inspect_err(|e| warn!(index, "Skipping malformed playlist entry: {}", e))
                    .ok()
            })
            .collect();
        Ok(Self::Playlist { entries })
    }

    /// Flatten into a list of items; unavailable playlist entries (`null`) are dropped.
    pub fn into_items(self) -> Vec<MediaItem> {
        match self {
            Self::Playlist { entries } => entries.into_iter().flatten().collect(),
            Self::Single(item) => vec![item],
        }
    }
}

/// The stream chosen for an item, ready to be downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedStream {
    /// Display title of the parent item.
    pub title: String,
    /// Filesystem-safe base name shared by the raw and the final file.
    pub file_stem: String,
    pub stream: StreamDescriptor,
}

impl SelectedStream {
    pub fn new(title: impl Into<String>, stream: StreamDescriptor) -> Self {
        let title = title.into();
        let file_stem = crate::files::sanitize_filename(&title);
        Self {
            title,
            file_stem,
            stream,
        }
    }

    pub fn url(&self) -> &str {
        &self.stream.url
    }

    pub fn extension(&self) -> &str {
        &self.stream.extension
    }

    pub fn size_bytes(&self) -> Option<u64> {
        self.stream.size_bytes
    }
}

/// A raw download on disk, owned by the pipeline until the transcoder consumes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub path: PathBuf,
    pub bytes_written: u64,
    pub expected_bytes: Option<u64>,
}

/// Progress of one in-flight download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadProgress {
    pub title: String,
    pub received: u64,
    pub total: Option<u64>,
}

/// Result of processing one item.
#[derive(Debug)]
pub struct ItemOutcome {
    pub title: String,
    pub result: Result<PathBuf, PipelineError>,
}

impl ItemOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn output_path(&self) -> Option<&PathBuf> {
        self.result.as_ref().ok()
    }
}
