//! Supervised execution of a built candidate with a wall-clock limit.
//!
//! The child is awaited directly and raced against the deadline and the
//! sweep's cancellation token, so termination happens as soon as either
//! fires instead of at the next poll tick. A killed child is always reaped
//! before returning.

use crate::cancel::CancelToken;
use anyhow::{Context, Result};
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::warn;

/// How long to keep draining pipes after a kill. Grandchildren may still
/// hold the write ends open.
const DRAIN_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy)]
pub struct WatchdogOptions {
    pub timeout: Duration,
}

impl Default for WatchdogOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Exited with status zero. `output` is stdout, a newline, then stderr.
    Completed { output: String, elapsed: Duration },
    /// Exited non-zero, died from a signal, or could not be launched.
    Failed {
        code: Option<i32>,
        output: String,
        elapsed: Duration,
    },
    TimedOut { output: String, elapsed: Duration },
    Cancelled { elapsed: Duration },
}

enum Verdict {
    Exited(std::process::ExitStatus),
    TimedOut,
    Cancelled,
}

/// Runs candidates on a multi-threaded tokio runtime from synchronous code.
pub struct Watchdog {
    options: WatchdogOptions,
    handle: Handle,
}

impl Watchdog {
    /// `handle` must belong to a multi-threaded runtime; its workers drive
    /// the process and timer events while the caller blocks.
    pub fn new(options: WatchdogOptions, handle: Handle) -> Self {
        Self { options, handle }
    }

    pub fn options(&self) -> &WatchdogOptions {
        &self.options
    }

    pub fn run(&self, program: &Path, cancel: &CancelToken) -> Result<RunOutcome> {
        self.handle.block_on(self.supervise(program, cancel))
    }

    /// Block for up to `grace` waiting for `cancel` to fire. A build tool
    /// killed by the terminal's interrupt can exit before our own signal
    /// listener has run.
    pub fn await_cancel(&self, cancel: &CancelToken, grace: Duration) -> bool {
        self.handle
            .block_on(tokio::time::timeout(grace, cancel.cancelled()))
            .is_ok()
    }

    pub async fn supervise(&self, program: &Path, cancel: &CancelToken) -> Result<RunOutcome> {
        let start = Instant::now();
        let mut child = match Command::new(program)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(err) => {
                return Ok(RunOutcome::Failed {
                    code: None,
                    output: format!("failed to launch {}: {err}", program.display()),
                    elapsed: start.elapsed(),
                })
            }
        };

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let verdict = tokio::select! {
            status = child.wait() => {
                Verdict::Exited(status.context("failed to wait for candidate")?)
            }
            _ = tokio::time::sleep(self.options.timeout) => Verdict::TimedOut,
            _ = cancel.cancelled() => Verdict::Cancelled,
        };

        if !matches!(verdict, Verdict::Exited(_)) {
            // kill() also waits, so the process is reaped here.
            if let Err(err) = child.kill().await {
                warn!(error = %err, program = %program.display(), "failed to kill candidate");
            }
        }
        let elapsed = start.elapsed();

        let stdout = collect(stdout).await;
        let stderr = collect(stderr).await;
        let output = format!("{stdout}\n{stderr}");

        Ok(match verdict {
            Verdict::Exited(status) if status.success() => {
                RunOutcome::Completed { output, elapsed }
            }
            Verdict::Exited(status) => RunOutcome::Failed {
                code: status.code(),
                output,
                elapsed,
            },
            Verdict::TimedOut => {
                warn!(
                    timeout_secs = self.options.timeout.as_secs_f64(),
                    "watchdog timer expired"
                );
                RunOutcome::TimedOut { output, elapsed }
            }
            Verdict::Cancelled => RunOutcome::Cancelled { elapsed },
        })
    }
}

fn drain<R>(reader: Option<R>) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut reader) = reader {
            if let Err(err) = reader.read_to_end(&mut buf).await {
                warn!(error = %err, "failed to read candidate output");
            }
        }
        buf
    })
}

async fn collect(task: JoinHandle<Vec<u8>>) -> String {
    let abort = task.abort_handle();
    match tokio::time::timeout(DRAIN_GRACE, task).await {
        Ok(Ok(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
        Ok(Err(_)) => String::new(),
        Err(_) => {
            abort.abort();
            String::new()
        }
    }
}
