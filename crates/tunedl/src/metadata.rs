//! yt-dlp backed metadata provider.

use std::ffi::OsString;
use std::path::PathBuf;

use async_trait::async_trait;
use process_utils::{DEFAULT_STDERR_TAIL, run_captured, tokio_command};
use tracing::{debug, info, instrument};

use crate::model::{MediaItem, MetadataResponse};
use crate::traits::MetadataProvider;
use crate::{PipelineError, Result};

/// Options passed to every yt-dlp invocation.
#[derive(Debug, Clone)]
pub struct YtDlpOptions {
    /// Program to run, `yt-dlp` unless `YTDLP_PATH` is set.
    pub binary_path: PathBuf,
    /// Arguments placed before the yt-dlp arguments, e.g. `["-m", "yt_dlp"]`
    /// when `binary_path` is a Python interpreter.
    pub launcher_args: Vec<String>,
    pub quiet: bool,
    pub extra_args: Vec<String>,
}

impl Default for YtDlpOptions {
    fn default() -> Self {
        Self {
            binary_path: std::env::var_os("YTDLP_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("yt-dlp")),
            launcher_args: Vec::new(),
            quiet: true,
            extra_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct YtDlpProvider {
    options: YtDlpOptions,
}

impl YtDlpProvider {
    pub fn new(options: YtDlpOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &YtDlpOptions {
        &self.options
    }

    pub fn build_args(&self, url: &str) -> Vec<OsString> {
        let mut args: Vec<OsString> = self
            .options
            .launcher_args
            .iter()
            .map(OsString::from)
            .collect();
        args.push("--dump-single-json".into());
        args.push("--no-warnings".into());
        if self.options.quiet {
            args.push("--quiet".into());
        }
        args.extend(self.options.extra_args.iter().map(OsString::from));
        // Keep URLs starting with '-' from being read as options.
        args.push("--".into());
        args.push(url.into());
        args
    }
}

#[async_trait]
impl MetadataProvider for YtDlpProvider {
    #[instrument(skip(self))]
    async fn resolve(&self, url: &str) -> Result<Vec<MediaItem>> {
        let args = self.build_args(url);
        debug!("yt-dlp args: {:?}", args);

        let mut cmd = tokio_command(&self.options.binary_path);
        cmd.args(&args);

        let captured = run_captured(&mut cmd, DEFAULT_STDERR_TAIL)
            .await
            .map_err(|e| PipelineError::metadata(e.to_string()))?;

        if !captured.success() {
            return Err(PipelineError::metadata(format!(
                "yt-dlp exited with {}: {}",
                captured.status,
                captured.stderr_text()
            )));
        }

        let items = MetadataResponse::from_json(&captured.stdout)?.into_items();
        info!(items = items.len(), "Resolved {}", url);
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_end_with_separator_and_url() {
        let provider = YtDlpProvider::new(YtDlpOptions {
            binary_path: PathBuf::from("python3"),
            launcher_args: vec!["-m".to_string(), "yt_dlp".to_string()],
            quiet: false,
            extra_args: vec!["--flat-playlist".to_string()],
        });

        let args = provider.build_args("https://example.com/v");
        let args: Vec<_> = args.iter().map(|a| a.to_str().unwrap()).collect();
        assert_eq!(
            args,
            [
                "-m",
                "yt_dlp",
                "--dump-single-json",
                "--no-warnings",
                "--flat-playlist",
                "--",
                "https://example.com/v"
            ]
        );
    }

    #[test]
    fn quiet_by_default() {
        let provider = YtDlpProvider::new(YtDlpOptions {
            binary_path: PathBuf::from("yt-dlp"),
            ..Default::default()
        });
        assert!(provider.build_args("u").iter().any(|a| a == "--quiet"));
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use std::path::Path;

        fn scripted(dir: &Path, script: &str) -> YtDlpProvider {
            let path = dir.join("yt-dlp.sh");
            std::fs::write(&path, script).unwrap();
            YtDlpProvider::new(YtDlpOptions {
                binary_path: PathBuf::from("sh"),
                launcher_args: vec![path.to_string_lossy().into_owned()],
                ..Default::default()
            })
        }

        #[tokio::test]
        async fn resolves_playlist_from_stdout() {
            let tmp = tempfile::tempdir().unwrap();
            let provider = scripted(
                tmp.path(),
                r#"cat <<'EOF'
{"title": "Mix", "entries": [
  {"title": "One", "formats": [{"format": "251 - audio only", "ext": "webm", "url": "http://h/1", "filesize": 10}]},
  {"title": "Two", "formats": []}
]}
EOF
"#,
            );

            let items = provider.resolve("https://example.com/list").await.unwrap();
            assert_eq!(items.len(), 2);
            assert_eq!(items[0].formats[0].size_bytes, Some(10));
            assert_eq!(items[1].title, "Two");
        }

        #[tokio::test]
        async fn nonzero_exit_is_a_metadata_error() {
            let tmp = tempfile::tempdir().unwrap();
            let provider = scripted(tmp.path(), "echo 'ERROR: Unsupported URL' >&2\nexit 1\n");

            let err = provider.resolve("nope").await.unwrap_err();
            assert!(matches!(err, PipelineError::Metadata { .. }));
            assert!(err.to_string().contains("Unsupported URL"));
            assert!(err.is_fatal());
        }

        #[tokio::test]
        async fn garbage_output_is_a_parse_error() {
            let tmp = tempfile::tempdir().unwrap();
            let provider = scripted(tmp.path(), "echo 'not json'\n");

            let err = provider.resolve("u").await.unwrap_err();
            assert!(matches!(err, PipelineError::MetadataParse { .. }));
        }
    }
}
