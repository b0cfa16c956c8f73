use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tunedl_engine::config::DEFAULT_BATCH_SIZE;
use tunedl_engine::{FailurePolicy, PipelineConfig, TargetFormat, YtDlpOptions};

use crate::error::Result;

#[derive(Parser, Debug)]
#[command(
    name = "tunedl",
    author,
    version,
    about = "Download the audio of a video or playlist and convert it with ffmpeg"
)]
pub struct Args {
    /// Video or playlist URL
    #[arg(short, long)]
    pub url: Option<String>,

    /// Directory for the converted files
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Number of items downloaded concurrently
    #[arg(short, long, default_value_t = DEFAULT_BATCH_SIZE, value_parser = parse_batch_size)]
    pub batch_size: usize,

    /// Output audio format (mp3, m4a, flac, opus, wav)
    #[arg(short, long, default_value = "mp3", value_parser = parse_format)]
    pub format: TargetFormat,

    /// Audio bitrate for lossy formats, e.g. 192k
    #[arg(long)]
    pub bitrate: Option<String>,

    /// Container of the audio streams to download
    #[arg(long, default_value = "webm")]
    pub container: String,

    /// Abort the whole run on the first failed item
    #[arg(long)]
    pub fail_fast: bool,

    /// Connection timeout in seconds
    #[arg(long, value_name = "SECONDS")]
    pub connect_timeout: Option<u64>,

    /// Path to ffmpeg (defaults to $FFMPEG_PATH, then ffmpeg)
    #[arg(long, value_name = "PATH")]
    pub ffmpeg: Option<PathBuf>,

    /// Path to yt-dlp (defaults to $YTDLP_PATH, then yt-dlp)
    #[arg(long = "yt-dlp", value_name = "PATH")]
    pub yt_dlp: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,
}

fn parse_batch_size(s: &str) -> std::result::Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("batch size must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

fn parse_format(s: &str) -> std::result::Result<TargetFormat, String> {
    s.parse().map_err(|e: tunedl_engine::PipelineError| e.to_string())
}

impl Args {
    pub fn pipeline_config(&self) -> Result<PipelineConfig> {
        let policy = if self.fail_fast {
            FailurePolicy::FailFast
        } else {
            FailurePolicy::Isolate
        };

        let mut builder = PipelineConfig::builder()
            .output_dir(&self.output_dir)
            .batch_size(self.batch_size)
            .failure_policy(policy)
            .target_format(self.format)
            .container(&self.container);

        if let Some(bitrate) = &self.bitrate {
            builder = builder.bitrate(bitrate);
        }
        if let Some(ffmpeg) = &self.ffmpeg {
            builder = builder.ffmpeg_path(ffmpeg);
        }
        if let Some(secs) = self.connect_timeout {
            builder = builder.connect_timeout(Duration::from_secs(secs));
        }

        Ok(builder.build()?)
    }

    pub fn ytdlp_options(&self) -> YtDlpOptions {
        let mut options = YtDlpOptions {
            quiet: !self.verbose,
            ..Default::default()
        };
        if let Some(path) = &self.yt_dlp {
            options.binary_path = path.clone();
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["tunedl", "--url", "https://example.com/v"]).unwrap();
        assert_eq!(args.url.as_deref(), Some("https://example.com/v"));
        assert_eq!(args.output_dir, PathBuf::from("."));
        assert_eq!(args.batch_size, 5);
        assert_eq!(args.format, TargetFormat::Mp3);

        let config = args.pipeline_config().unwrap();
        assert_eq!(config.scheduler.failure_policy, FailurePolicy::Isolate);
        assert_eq!(config.selection.container, "webm");
        assert!(args.ytdlp_options().quiet);
    }

    #[test]
    fn url_is_optional() {
        let args = Args::try_parse_from(["tunedl"]).unwrap();
        assert!(args.url.is_none());
    }

    #[test]
    fn flags_map_onto_the_pipeline_config() {
        let args = Args::try_parse_from([
            "tunedl",
            "-u",
            "https://example.com/list",
            "-o",
            "/tmp/music",
            "-b",
            "2",
            "-f",
            "opus",
            "--bitrate",
            "96k",
            "--container",
            "m4a",
            "--fail-fast",
            "--connect-timeout",
            "10",
            "--ffmpeg",
            "/opt/ffmpeg",
            "--yt-dlp",
            "/opt/yt-dlp",
            "-v",
        ])
        .unwrap();

        let config = args.pipeline_config().unwrap();
        assert_eq!(config.output_dir, PathBuf::from("/tmp/music"));
        assert_eq!(config.scheduler.batch_size, 2);
        assert_eq!(config.scheduler.failure_policy, FailurePolicy::FailFast);
        assert_eq!(config.transcoder.format, TargetFormat::Opus);
        assert_eq!(config.transcoder.bitrate.as_deref(), Some("96k"));
        assert_eq!(config.transcoder.ffmpeg_path, PathBuf::from("/opt/ffmpeg"));
        assert_eq!(config.selection.container, "m4a");
        assert_eq!(
            config.downloader.connect_timeout,
            Some(Duration::from_secs(10))
        );

        let options = args.ytdlp_options();
        assert_eq!(options.binary_path, PathBuf::from("/opt/yt-dlp"));
        assert!(!options.quiet);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(Args::try_parse_from(["tunedl", "-b", "0"]).is_err());
        assert!(Args::try_parse_from(["tunedl", "-f", "ogg"]).is_err());
        assert!(Args::try_parse_from(["tunedl", "-v", "-q"]).is_err());
    }
}
