//! Regression suite: translate, build and run every kernel in a directory.
//!
//! Each kernel passes when all three steps succeed. The kernels themselves
//! decide correctness through their exit status.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tiletune_runner::{BuildDriver, BuildOutcome, CancelToken, RunOutcome, ScratchPaths, Watchdog};
use tracing::{info, warn};

const INTERRUPT_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct CheckSuite {
    sources: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckReport {
    pub runs: usize,
    pub passed: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
    pub cancelled: bool,
}

impl CheckSuite {
    /// Every file under `dir`, recursively, in path order. With a filter,
    /// only files whose name contains it. The `scratch` directory is never
    /// descended into, so build artifacts from a previous run are not kernels.
    pub fn discover(dir: &Path, filter: Option<&str>, scratch: &Path) -> Result<Self> {
        let scratch = fs::canonicalize(scratch).ok();
        let mut sources = Vec::new();
        let mut pending = vec![dir.to_path_buf()];
        while let Some(current) = pending.pop() {
            let entries = fs::read_dir(&current)
                .with_context(|| format!("failed to list {}", current.display()))?;
            for entry in entries {
                let path = entry?.path();
                if path.is_dir() {
                    if scratch.is_some() && fs::canonicalize(&path).ok() == scratch {
                        continue;
                    }
                    pending.push(path);
                    continue;
                }
                let matches = match (filter, path.file_name()) {
                    (None, _) => true,
                    (Some(filter), Some(name)) => name.to_string_lossy().contains(filter),
                    (Some(_), None) => false,
                };
                if matches {
                    sources.push(path);
                }
            }
        }
        sources.sort();
        Ok(Self { sources })
    }

    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    pub fn run(
        &self,
        builder: &BuildDriver,
        watchdog: &Watchdog,
        paths: &ScratchPaths,
        cancel: &CancelToken,
        out: &mut dyn Write,
    ) -> Result<CheckReport> {
        paths.prepare()?;
        let mut report = CheckReport::default();

        for source in &self.sources {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let name = source
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| source.display().to_string());
            writeln!(out, "Running \"{name}\"")?;
            out.flush()?;

            report.runs += 1;
            let passed = match builder.build(source, paths, &[])? {
                BuildOutcome::Built { executable } => {
                    match watchdog.run(&executable, cancel)? {
                        RunOutcome::Completed { .. } => true,
                        RunOutcome::Cancelled { .. } => {
                            report.runs -= 1;
                            report.cancelled = true;
                            break;
                        }
                        RunOutcome::Failed { code, output, .. } => {
                            warn!(kernel = %name, ?code, %output, "kernel failed");
                            false
                        }
                        RunOutcome::TimedOut { output, .. } => {
                            warn!(kernel = %name, %output, "kernel timed out");
                            false
                        }
                    }
                }
                BuildOutcome::Interrupted { .. }
                    if watchdog.await_cancel(cancel, INTERRUPT_GRACE) =>
                {
                    report.runs -= 1;
                    report.cancelled = true;
                    break;
                }
                BuildOutcome::TranslateFailed { diagnostics }
                | BuildOutcome::CompileFailed { diagnostics }
                | BuildOutcome::Interrupted { diagnostics, .. } => {
                    warn!(kernel = %name, %diagnostics, "kernel did not build");
                    false
                }
            };

            if passed {
                report.passed.push(source.clone());
            } else {
                report.failed.push(source.clone());
            }
        }

        info!(
            runs = report.runs,
            passed = report.passed.len(),
            failed = report.failed.len(),
            "check suite finished"
        );
        Ok(report)
    }
}

impl CheckReport {
    pub fn success(&self) -> bool {
        self.failed.is_empty() && !self.cancelled
    }

    pub fn write_summary(&self, out: &mut dyn Write) -> std::io::Result<()> {
        if self.cancelled {
            writeln!(out, "Premature ABORT!")?;
        }
        writeln!(out, "\n\nResults:")?;
        writeln!(out, "Success:  {}", self.passed.len())?;
        writeln!(out, "Failure:  {}", self.failed.len())?;
        if !self.failed.is_empty() {
            let failing: Vec<_> = self
                .failed
                .iter()
                .map(|path| path.display().to_string())
                .collect();
            writeln!(out, "Failing tests: {failing:?}")?;
        }
        out.flush()
    }
}
