//! FFmpeg transcoder for completed downloads.
//!
//! The raw download is converted into the configured [`TargetFormat`] and
//! removed once ffmpeg exits successfully; a failed removal is only logged.
//! On failure the raw file stays on disk so it can be inspected or converted
//! again by hand.
//!
//! [`TargetFormat`]: crate::config::TargetFormat

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use process_utils::{ProcessError, run_captured, tokio_command};
use tracing::{debug, error, info, instrument, warn};

use crate::config::TranscoderConfig;
use crate::traits::AudioTranscoder;
use crate::{PipelineError, Result};

/// Runs ffmpeg on raw downloads.
#[derive(Debug, Clone, Default)]
pub struct Transcoder {
    config: TranscoderConfig,
}

impl Transcoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: TranscoderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TranscoderConfig {
        &self.config
    }

    /// Build FFmpeg command arguments for converting `input` into `output`.
    pub fn build_args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let format = self.config.format;
        let mut args: Vec<OsString> = self.config.global_args.iter().map(OsString::from).collect();

        // Overwrite without asking, keep the terminal clean
        args.extend(["-y", "-hide_banner", "-nostdin", "-loglevel", "error"].map(OsString::from));

        args.push("-i".into());
        args.push(input.as_os_str().to_owned());

        // No video output
        args.push("-vn".into());
        args.push("-c:a".into());
        args.push(format.codec_arg().into());

        if format.is_lossy()
            && let Some(bitrate) = &self.config.bitrate
        {
            args.push("-b:a".into());
            args.push(bitrate.into());
        }

        args.push(output.as_os_str().to_owned());
        args
    }

    /// Convert `input` into `output`, suspending until ffmpeg exits.
    #[instrument(skip(self), fields(format = %self.config.format))]
    pub async fn transcode(&self, input: &Path, output: &Path) -> Result<PathBuf> {
        info!("start converting {}", input.display());

        let args = self.build_args(input, output);
        debug!("FFmpeg args: {:?}", args);

        let mut cmd = tokio_command(&self.config.ffmpeg_path);
        cmd.args(&args).env("LC_ALL", "C");

        let captured = run_captured(&mut cmd, self.config.stderr_tail)
            .await
            .map_err(|e| match e {
                ProcessError::Spawn { program, source }
                | ProcessError::Wait { program, source }
                | ProcessError::Output { program, source } => {
                    PipelineError::TranscodeLaunch { program, source }
                }
            })?;

        if !captured.success() {
            let stderr = captured.stderr_text();
            error!(
                input = %input.display(),
                status = %captured.status,
                "ffmpeg failed, keeping raw download: {}",
                stderr
            );
            return Err(PipelineError::Transcode {
                input: input.to_path_buf(),
                status: captured.status,
                stderr,
            });
        }

        // The output exists at this point; a leftover raw file does not fail the item.
        if let Err(e) = tokio::fs::remove_file(input).await {
            warn!(input = %input.display(), "Could not remove raw download: {}", e);
        }
        info!(
            duration = ?captured.duration,
            "successfully converted {} to {}",
            input.display(),
            output.display()
        );
        Ok(output.to_path_buf())
    }
}

#[async_trait]
impl AudioTranscoder for Transcoder {
    fn target_extension(&self) -> &str {
        self.config.format.extension()
    }

    async fn transcode(&self, input: &Path, output: &Path) -> Result<PathBuf> {
        Transcoder::transcode(self, input, output).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TargetFormat;

    fn has(args: &[OsString], value: &str) -> bool {
        args.iter().any(|a| a == value)
    }

    #[test]
    fn test_build_args_mp3() {
        let transcoder = Transcoder::with_config(TranscoderConfig {
            bitrate: Some("192k".to_string()),
            ..Default::default()
        });

        let args = transcoder.build_args(Path::new("/in.webm"), Path::new("/out.mp3"));

        assert_eq!(args.first().unwrap(), "-y");
        assert!(has(&args, "-nostdin"));
        assert!(has(&args, "-vn"));
        assert!(has(&args, "libmp3lame"));
        assert!(has(&args, "192k"));
        let input_at = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[input_at + 1], "/in.webm");
        assert_eq!(args.last().unwrap(), "/out.mp3");
    }

    #[test]
    fn test_build_args_bitrate_ignored_for_lossless() {
        let transcoder = Transcoder::with_config(TranscoderConfig {
            format: TargetFormat::Flac,
            bitrate: Some("320k".to_string()),
            ..Default::default()
        });

        let args = transcoder.build_args(Path::new("/in.webm"), Path::new("/out.flac"));

        assert!(has(&args, "flac"));
        assert!(!has(&args, "-b:a"));
    }

    #[test]
    fn test_global_args_come_first() {
        let transcoder = Transcoder::with_config(TranscoderConfig {
            global_args: vec!["-threads".to_string(), "2".to_string()],
            ..Default::default()
        });

        let args = transcoder.build_args(Path::new("a"), Path::new("b"));
        assert_eq!(args[0], "-threads");
        assert_eq!(args[1], "2");
        assert_eq!(args[2], "-y");
    }

    #[cfg(unix)]
    mod process {
        use super::*;

        /// Stand-in for ffmpeg: copies the `-i` argument to the last argument.
        const COPY_SCRIPT: &str = r#"
in=""
out=""
while [ $# -gt 0 ]; do
  case "$1" in
    -i) in="$2"; shift 2 ;;
    *) out="$1"; shift ;;
  esac
done
cp "$in" "$out"
"#;

        /// Converts, then removes its own input before the transcoder can.
        const CONSUMING_SCRIPT: &str = r#"
in=""
out=""
while [ $# -gt 0 ]; do
  case "$1" in
    -i) in="$2"; shift 2 ;;
    *) out="$1"; shift ;;
  esac
done
cp "$in" "$out" && rm "$in"
"#;

        const FAIL_SCRIPT: &str = "echo 'Invalid data found when processing input' >&2\nexit 1\n";

        fn fake_ffmpeg(dir: &Path, script: &str) -> Transcoder {
            let path = dir.join("ffmpeg.sh");
            std::fs::write(&path, script).unwrap();
            Transcoder::with_config(TranscoderConfig {
                ffmpeg_path: PathBuf::from("sh"),
                global_args: vec![path.to_string_lossy().into_owned()],
                ..Default::default()
            })
        }

        #[tokio::test]
        async fn success_removes_raw_file() {
            let tmp = tempfile::tempdir().unwrap();
            let raw = tmp.path().join("song.webm");
            let out = tmp.path().join("song.mp3");
            std::fs::write(&raw, b"raw audio").unwrap();

            let transcoder = fake_ffmpeg(tmp.path(), COPY_SCRIPT);
            let result = transcoder.transcode(&raw, &out).await.unwrap();

            assert_eq!(result, out);
            assert!(!raw.exists());
            assert_eq!(std::fs::read(&out).unwrap(), b"raw audio");
        }

        #[tokio::test]
        async fn failed_raw_cleanup_still_counts_as_converted() {
            let tmp = tempfile::tempdir().unwrap();
            let raw = tmp.path().join("song.webm");
            let out = tmp.path().join("song.mp3");
            std::fs::write(&raw, b"raw audio").unwrap();

            let transcoder = fake_ffmpeg(tmp.path(), CONSUMING_SCRIPT);
            let result = transcoder.transcode(&raw, &out).await.unwrap();

            assert_eq!(result, out);
            assert!(!raw.exists());
            assert_eq!(std::fs::read(&out).unwrap(), b"raw audio");
        }

        #[tokio::test]
        async fn existing_output_is_overwritten() {
            let tmp = tempfile::tempdir().unwrap();
            let raw = tmp.path().join("song.webm");
            let out = tmp.path().join("song.mp3");
            std::fs::write(&raw, b"new").unwrap();
            std::fs::write(&out, b"old").unwrap();

            let transcoder = fake_ffmpeg(tmp.path(), COPY_SCRIPT);
            transcoder.transcode(&raw, &out).await.unwrap();
            assert_eq!(std::fs::read(&out).unwrap(), b"new");
        }

        #[tokio::test]
        async fn failure_keeps_raw_file_and_reports_stderr() {
            let tmp = tempfile::tempdir().unwrap();
            let raw = tmp.path().join("song.webm");
            let out = tmp.path().join("song.mp3");
            std::fs::write(&raw, b"raw audio").unwrap();

            let transcoder = fake_ffmpeg(tmp.path(), FAIL_SCRIPT);
            let err = transcoder.transcode(&raw, &out).await.unwrap_err();

            match &err {
                PipelineError::Transcode { input, status, stderr } => {
                    assert_eq!(input, &raw);
                    assert_eq!(status.code(), Some(1));
                    assert!(stderr.contains("Invalid data"));
                }
                other => panic!("unexpected error: {other}"),
            }
            assert_eq!(err.stage(), "transcode");
            assert!(raw.exists());
            assert!(!out.exists());
        }

        #[tokio::test]
        async fn missing_binary_keeps_raw_file() {
            let tmp = tempfile::tempdir().unwrap();
            let raw = tmp.path().join("song.webm");
            std::fs::write(&raw, b"raw audio").unwrap();

            let transcoder = Transcoder::with_config(TranscoderConfig {
                ffmpeg_path: tmp.path().join("no-such-ffmpeg"),
                ..Default::default()
            });
            let err = transcoder
                .transcode(&raw, &tmp.path().join("song.mp3"))
                .await
                .unwrap_err();

            assert!(matches!(err, PipelineError::TranscodeLaunch { .. }));
            assert!(raw.exists());
        }
    }
}
