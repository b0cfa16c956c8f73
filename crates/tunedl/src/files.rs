//! Filename sanitizing and the on-disk layout of a run.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::PipelineError;

const DEFAULT_FILENAME: &str = "output";
const MAX_STEM_CHARS: usize = 200;

/// Sanitize a title for use as a file stem.
///
/// Path separators, characters reserved on Windows and control characters
/// become `_`; leading and trailing dots and spaces are removed.
pub fn sanitize_filename(input: &str) -> String {
    const INVALID: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

    let replaced: String = input
        .chars()
        .map(|c| {
            if INVALID.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    let trimmed = replaced.trim_matches(|c| c == '.' || c == ' ');
    if trimmed.is_empty() {
        return DEFAULT_FILENAME.to_string();
    }

    if trimmed.chars().count() > MAX_STEM_CHARS {
        trimmed.chars().take(MAX_STEM_CHARS).collect()
    } else {
        trimmed.to_string()
    }
}

/// Rewrite `stems` in place so no two are equal (case-insensitively, for
/// case-folding filesystems). Later duplicates get ` (2)`, ` (3)`, ...
pub fn dedupe_stems<'a>(stems: impl IntoIterator<Item = &'a mut String>) {
    let mut seen: HashMap<String, usize> = HashMap::new();
    for stem in stems {
        let key = stem.to_lowercase();
        let count = seen.entry(key).or_insert(0);
        *count += 1;
        if *count == 1 {
            continue;
        }
        let mut n = *count;
        let mut candidate = format!("{stem} ({n})");
        while seen.contains_key(&candidate.to_lowercase()) {
            n += 1;
            candidate = format!("{stem} ({n})");
        }
        debug!(original = %stem, renamed = %candidate, "Duplicate file stem renamed");
        seen.insert(candidate.to_lowercase(), 1);
        *stem = candidate;
    }
}

/// Path of the raw download for `stem`.
///
/// When the source extension equals the target extension the raw file gets a
/// trailing `.part`. Outputs always end in the target extension, so no raw
/// file can alias any item's output whatever its stem.
pub fn raw_download_path(dir: &Path, stem: &str, source_ext: &str, target_ext: &str) -> PathBuf {
    if source_ext.eq_ignore_ascii_case(target_ext) {
        dir.join(format!("{stem}.{source_ext}.part"))
    } else {
        dir.join(format!("{stem}.{source_ext}"))
    }
}

/// Path of the transcoded output for `stem`.
pub fn output_path(dir: &Path, stem: &str, target_ext: &str) -> PathBuf {
    dir.join(format!("{stem}.{target_ext}"))
}

/// Create the output directory (and parents) if it does not exist yet.
pub async fn prepare_output_dir(dir: &Path) -> Result<PathBuf, PipelineError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| PipelineError::OutputDir {
            path: dir.to_path_buf(),
            source,
        })?;

    let metadata = tokio::fs::metadata(dir)
        .await
        .map_err(|source| PipelineError::OutputDir {
            path: dir.to_path_buf(),
            source,
        })?;
    if metadata.permissions().readonly() {
        return Err(PipelineError::OutputDir {
            path: dir.to_path_buf(),
            source: std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "directory is read-only",
            ),
        });
    }

    Ok(dir.to_path_buf())
}
