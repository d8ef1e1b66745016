//! Where sweep output goes, and how the final summary reads.

use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use tiletune_autotune::{MetricKeys, SweepSummary};
use tiletune_space::ParameterTuple;

/// Routing of the two sweep streams: data rows and operator diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum OutputRouting {
    /// Rows to stdout, diagnostics to stderr.
    #[default]
    Split,
    /// Everything to stdout.
    Stdout,
    /// Everything to stderr.
    Stderr,
}

impl OutputRouting {
    /// `(data, diagnostics)` writers for this routing.
    pub fn writers(self) -> (Box<dyn Write>, Box<dyn Write>) {
        match self {
            OutputRouting::Split => (Box::new(io::stdout()), Box::new(io::stderr())),
            OutputRouting::Stdout => (Box::new(io::stdout()), Box::new(io::stdout())),
            OutputRouting::Stderr => (Box::new(io::stderr()), Box::new(io::stderr())),
        }
    }
}

/// Borrowed output streams for one sweep.
pub struct SweepOutput<'a> {
    pub data: &'a mut dyn Write,
    pub diagnostics: &'a mut dyn Write,
}

impl<'a> SweepOutput<'a> {
    pub fn new(data: &'a mut dyn Write, diagnostics: &'a mut dyn Write) -> Self {
        Self { data, diagnostics }
    }

    pub fn row(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.data, "{line}")?;
        self.data.flush()
    }

    pub fn note(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.diagnostics, "{line}")?;
        self.diagnostics.flush()
    }
}

/// Summary block printed when a sweep ends, normally or not.
pub fn write_summary(
    out: &mut dyn Write,
    summary: &SweepSummary,
    keys: &MetricKeys,
    total_work: Option<f64>,
    best: Option<&ParameterTuple>,
    cancelled: bool,
) -> io::Result<()> {
    if cancelled {
        writeln!(out, "Premature ABORT!")?;
    }
    writeln!(out, "Min Elapsed:  {:.6}", summary.min_elapsed)?;
    writeln!(out, "Max {}:   {:.6}", keys.throughput, summary.max_throughput)?;
    if let Some(work) = total_work {
        writeln!(out, "Max Total {}: {:.6}", keys.throughput, summary.total_throughput(work))?;
        writeln!(
            out,
            "Max Compute {}: {:.6}",
            keys.throughput,
            summary.compute_throughput(work)
        )?;
    }

    let mut line = format!(
        "Successes: {} of {} attempted",
        summary.succeeded, summary.attempted
    );
    if !summary.failures.is_empty() {
        let failures = summary
            .failures
            .iter()
            .map(|(status, count)| format!("{count} {status}"))
            .collect::<Vec<_>>()
            .join(", ");
        line.push_str(&format!(" ({failures})"));
    }
    writeln!(out, "{line}")?;

    match best {
        Some(tuple) => writeln!(out, "Best: {tuple}")?,
        None if !summary.has_successes() => {
            writeln!(out, "Best: none (no candidate succeeded)")?
        }
        None => {}
    }
    out.flush()
}
