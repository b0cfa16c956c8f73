//! Child-process helpers shared by the tunedl crates.
//!
//! Two concerns live here: building `tokio::process::Command`s that never
//! pop up a console window on Windows, and running a command to completion
//! while keeping its diagnostic stream out of the terminal.

use std::collections::VecDeque;
use std::ffi::OsStr;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tracing::{debug, warn};

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Number of trailing stderr lines kept by [`run_captured`].
pub const DEFAULT_STDERR_TAIL: usize = 32;

/// Apply the Windows `CREATE_NO_WINDOW` flag to child processes.
///
/// On non-Windows targets this is a no-op.
pub trait NoWindowExt {
    fn no_window(&mut self);
}

impl NoWindowExt for tokio::process::Command {
    fn no_window(&mut self) {
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            self.as_std_mut().creation_flags(CREATE_NO_WINDOW);
        }
    }
}

/// Create a `tokio::process::Command` with `CREATE_NO_WINDOW` applied on Windows.
pub fn tokio_command(program: impl AsRef<OsStr>) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new(program);
    cmd.no_window();
    cmd
}

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to wait for `{program}`: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read output of `{program}`: {source}")]
    Output {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result of a finished child process.
#[derive(Debug)]
pub struct CapturedOutput {
    pub status: ExitStatus,
    pub duration: Duration,
    /// Trailing stderr lines, oldest first.
    pub stderr_tail: Vec<String>,
    /// Everything the child wrote to stdout.
    pub stdout: Vec<u8>,
}

impl CapturedOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// The captured stderr tail joined with newlines.
    pub fn stderr_text(&self) -> String {
        self.stderr_tail.join("\n")
    }
}

/// Spawn `command`, collect stdout, keep the last `tail` stderr lines and wait
/// for the child to exit.
///
/// stdin is closed so tools that prompt (ffmpeg's overwrite question, for
/// one) cannot block on the terminal. stderr lines are only echoed at
/// `debug` level.
pub async fn run_captured(
    command: &mut tokio::process::Command,
    tail: usize,
) -> Result<CapturedOutput, ProcessError> {
    let program = command.as_std().get_program().to_string_lossy().into_owned();
    let start = Instant::now();

    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command.spawn().map_err(|source| ProcessError::Spawn {
        program: program.clone(),
        source,
    })?;

    let stderr_task = child.stderr.take().map(|stderr| {
        let program = program.clone();
        tokio::spawn(async move {
            // Split on raw bytes; one undecodable line must not end the capture.
            let mut lines = BufReader::new(stderr).split(b'\n');
            let mut kept = VecDeque::with_capacity(tail.min(256));
            loop {
                let line = match lines.next_segment().await {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        warn!(program = %program, "Stopped reading stderr: {}", e);
                        break;
                    }
                };
                let line = String::from_utf8_lossy(&line).trim_end_matches('\r').to_string();
                debug!(program = %program, "stderr: {}", line);
                if tail == 0 {
                    continue;
                }
                if kept.len() == tail {
                    kept.pop_front();
                }
                kept.push_back(line);
            }
            Vec::from(kept)
        })
    });

    let stdout_task = child.stdout.take().map(|mut stdout| {
        tokio::spawn(async move {
            let mut buf = Vec::new();
            stdout.read_to_end(&mut buf).await.map(|_| buf)
        })
    });

    let status = child.wait().await.map_err(|source| ProcessError::Wait {
        program: program.clone(),
        source,
    })?;

    let stderr_tail = match stderr_task {
        Some(task) => task.await.unwrap_or_else(|e| {
            warn!(program = %program, "stderr reader failed: {}", e);
            Vec::new()
        }),
        None => Vec::new(),
    };
    let stdout = match stdout_task {
        Some(task) => task
            .await
            .map_err(std::io::Error::other)
            .and_then(|read| read)
            .map_err(|source| ProcessError::Output {
                program: program.clone(),
                source,
            })?,
        None => Vec::new(),
    };

    Ok(CapturedOutput {
        status,
        duration: start.elapsed(),
        stderr_tail,
        stdout,
    })
}
