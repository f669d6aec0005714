//! Asynchronous ffmpeg execution with incremental progress and cancellation.

use crate::progress::{ProgressEvent, ProgressParser};
use crate::{Error, Result};
use futures::StreamExt;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::process::{Child, Command};
use tokio_util::codec::{AnyDelimiterCodec, FramedRead};
use tokio_util::sync::CancellationToken;

/// Number of trailing diagnostic lines kept for error reporting.
pub const DIAGNOSTIC_TAIL_LINES: usize = 20;

/// Outcome of a process that ran to completion.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Last non-progress lines of stderr, oldest first.
    pub diagnostics: Vec<String>,
    /// Input duration announced by ffmpeg, if any.
    pub media_duration: Option<Duration>,
    /// Wall-clock time the process ran for.
    pub elapsed: Duration,
}

impl RunOutput {
    /// Whether the process exited with code 0.
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Exit code, if the process was not terminated by a signal.
    pub fn exit_code(&self) -> Option<i32> {
        self.status.code()
    }
}

/// A builder for one ffmpeg invocation.
///
/// # Example
///
/// ```no_run
/// use std::path::PathBuf;
/// use tokio_util::sync::CancellationToken;
/// use vidbatch_av::TranscodeCommand;
///
/// # async fn example() -> vidbatch_av::Result<()> {
/// let mut cmd = TranscodeCommand::new(PathBuf::from("ffmpeg"));
/// cmd.args(["-y", "-i", "clip.mov", "clip.mp4"]);
/// let output = cmd.execute(|pct| tracing::info!("{pct:.1}%"), &CancellationToken::new()).await?;
/// println!("exit code {:?}", output.exit_code());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TranscodeCommand {
    program: PathBuf,
    args: Vec<String>,
}

impl TranscodeCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
        }
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Run the process to completion.
    ///
    /// `on_progress` receives a percentage in `[0, 100]` each time ffmpeg
    /// reports its position and the input duration is known. A non-zero exit
    /// is not an error here; inspect [`RunOutput::success`].
    ///
    /// # Errors
    ///
    /// - [`Error::ToolNotFound`] if the program cannot be found.
    /// - [`Error::ToolFailed`] if spawning or waiting fails.
    /// - [`Error::Cancelled`] if `cancel` fires; the child is killed first.
    pub async fn execute<F>(&self, mut on_progress: F, cancel: &CancellationToken) -> Result<RunOutput>
    where
        F: FnMut(f32) + Send,
    {
        let program_name = self.program_name();
        let started = Instant::now();

        tracing::debug!("Running {} {:?}", self.program.display(), self.args);

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::tool_not_found(program_name.clone())
                } else {
                    Error::tool_failed(program_name.clone(), format!("failed to spawn: {e}"))
                }
            })?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::tool_failed(program_name.clone(), "stderr was not captured"))?;

        // Status lines end in `\r`, everything else in `\n`.
        let mut lines = FramedRead::new(stderr, AnyDelimiterCodec::new(b"\r\n".to_vec(), Vec::new()));
        let mut parser = ProgressParser::new();
        let mut tail: VecDeque<String> = VecDeque::with_capacity(DIAGNOSTIC_TAIL_LINES);

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    kill(&mut child, &program_name).await;
                    return Err(Error::Cancelled);
                }
                frame = lines.next() => match frame {
                    Some(Ok(bytes)) => {
                        let line = String::from_utf8_lossy(&bytes);
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        match parser.feed(line) {
                            ProgressEvent::Progress { percent: Some(pct), .. } => on_progress(pct),
                            ProgressEvent::Progress { percent: None, .. } => {}
                            ProgressEvent::Duration(_) | ProgressEvent::Other => {
                                tracing::trace!("{}: {}", program_name, line);
                                if tail.len() == DIAGNOSTIC_TAIL_LINES {
                                    tail.pop_front();
                                }
                                tail.push_back(line.to_string());
                            }
                        }
                    }
                    Some(Err(e)) => {
                        tracing::warn!("Lost {} output stream: {}", program_name, e);
                        break;
                    }
                    None => break,
                },
            }
        }

        let status = tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                kill(&mut child, &program_name).await;
                return Err(Error::Cancelled);
            }
            status = child.wait() => status.map_err(|e| {
                Error::tool_failed(program_name.clone(), format!("I/O error waiting for process: {e}"))
            })?,
        };

        Ok(RunOutput {
            status,
            diagnostics: tail.into_iter().collect(),
            media_duration: parser.total(),
            elapsed: started.elapsed(),
        })
    }
}

async fn kill(child: &mut Child, program_name: &str) {
    if let Err(e) = child.kill().await {
        tracing::warn!("Failed to kill {}: {}", program_name, e);
    } else {
        tracing::info!("Killed {} after cancellation", program_name);
    }
}
