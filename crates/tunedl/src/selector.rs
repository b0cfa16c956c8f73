//! Stream selector for choosing the best audio stream of an item.
//!
//! Candidates are filtered to audio-only streams in the configured container,
//! then reduced to one winner by size. Sizes may be unknown; the comparison
//! between the current best (the incumbent) and the next candidate is:
//!
//! | incumbent           | candidate | candidate wins when                       |
//! |---------------------|-----------|-------------------------------------------|
//! | known `b`           | known `s` | `s > b` (ties: lower URL wins)            |
//! | known `b`           | unknown   | always                                    |
//! | unknown, floor `f`  | known `s` | `f` is known and `s > f`                  |
//! | unknown             | unknown   | never                                     |
//!
//! An unknown-size winner remembers the known size it displaced as its
//! floor, so only a strictly larger known stream can take its place.

use std::cmp::Ordering;

use tracing::{debug, warn};

use crate::config::SelectionConfig;
use crate::model::{MediaItem, SelectedStream, StreamDescriptor};

/// Comparable size of the current winner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rank {
    Known(u64),
    /// Unknown size; carries the known size it displaced, if any.
    Unknown { floor: Option<u64> },
}

impl Rank {
    fn of(stream: &StreamDescriptor, displaced: Option<Rank>) -> Self {
        match stream.size_bytes {
            Some(size) => Rank::Known(size),
            None => Rank::Unknown {
                floor: match displaced {
                    Some(Rank::Known(size)) => Some(size),
                    Some(Rank::Unknown { floor }) => floor,
                    None => None,
                },
            },
        }
    }
}

fn supersedes(
    candidate: &StreamDescriptor,
    incumbent: &StreamDescriptor,
    incumbent_rank: Rank,
) -> bool {
    match (candidate.size_bytes, incumbent_rank) {
        (Some(size), Rank::Known(best)) => match size.cmp(&best) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => candidate.url < incumbent.url,
        },
        (None, Rank::Known(_)) => true,
        (Some(size), Rank::Unknown { floor }) => floor.is_some_and(|floor| size > floor),
        (None, Rank::Unknown { .. }) => false,
    }
}

/// Stream selector for choosing the best stream.
#[derive(Debug, Clone, Default)]
pub struct StreamSelector {
    config: SelectionConfig,
}

impl StreamSelector {
    /// Create a new stream selector with default configuration.
    pub fn new() -> Self {
        Self::with_config(SelectionConfig::default())
    }

    /// Create a new stream selector with custom configuration.
    pub fn with_config(config: SelectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    /// Whether a stream is an audio-only stream in the required container.
    pub fn is_eligible(&self, stream: &StreamDescriptor) -> bool {
        !stream.url.is_empty()
            && stream.mime_class.contains(&self.config.audio_only_marker)
            && stream
                .extension
                .eq_ignore_ascii_case(&self.config.container)
    }

    /// Pick the best eligible stream among `streams`.
    pub fn select_best<'a>(&self, streams: &'a [StreamDescriptor]) -> Option<&'a StreamDescriptor> {
        streams
            .iter()
            .filter(|s| self.is_eligible(s))
            .fold(None::<(&StreamDescriptor, Rank)>, |best, candidate| match best {
                None => Some((candidate, Rank::of(candidate, None))),
                Some((incumbent, rank)) if supersedes(candidate, incumbent, rank) => {
                    Some((candidate, Rank::of(candidate, Some(rank))))
                }
                keep => keep,
            })
            .map(|(stream, _)| stream)
    }

    /// Select the stream for one item, annotated with the item's title.
    ///
    /// Returns `None` and logs a warning naming the item when nothing is eligible.
    pub fn select(&self, item: &MediaItem) -> Option<SelectedStream> {
        match self.select_best(&item.formats) {
            Some(stream) => {
                debug!(
                    title = %item.title,
                    format = %stream.mime_class,
                    size = ?stream.size_bytes,
                    "Selected audio stream"
                );
                Some(SelectedStream::new(item.title.clone(), stream.clone()))
            }
            None => {
                warn!(
                    title = %item.title,
                    container = %self.config.container,
                    "Cannot download {}: audio url not found",
                    item.title
                );
                None
            }
        }
    }
}
