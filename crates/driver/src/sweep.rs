//! Sequential sweep over a search profile: materialize, build, run, record.

use crate::output::{write_summary, SweepOutput};
use anyhow::{bail, Context, Result};
use tiletune_autotune::{
    csv_header, parse_metrics, Aggregator, CandidateResult, CandidateStatus, MetricKeys,
    SweepReport, SweepSummary,
};
use tiletune_codegen::{define_flags, Template};
use std::time::Duration;
use tiletune_runner::{
    BuildDriver, BuildOutcome, BuildStep, CancelToken, RunOutcome, ScratchPaths, Watchdog,
};
use tiletune_space::{ParameterTuple, SearchProfile};
use tracing::{debug, info, warn};

/// How long a build tool killed by SIGINT or SIGTERM waits for the cancel
/// token before the kill is blamed on the candidate.
const INTERRUPT_GRACE: Duration = Duration::from_millis(500);

/// How a tuple reaches the compiler.
#[derive(Debug, Clone)]
pub enum CandidateEncoding {
    /// Substitute tile attributes into a template and write it to the
    /// scratch source before every build.
    Template(Template),
    /// Build the fixed scratch source with one `-D{prefix}{i}=value` flag
    /// per tuple element.
    Defines { prefix: String },
}

pub struct Sweep {
    profile: SearchProfile,
    encoding: CandidateEncoding,
    builder: BuildDriver,
    watchdog: Watchdog,
    paths: ScratchPaths,
    keys: MetricKeys,
    cancel: CancelToken,
    aggregator: Aggregator,
    start_index: usize,
}

/// Everything a finished or interrupted sweep leaves behind.
#[derive(Debug, Clone)]
pub struct SweepOutcome {
    pub profile: SearchProfile,
    pub aggregator: Aggregator,
    pub cancelled: bool,
}

impl SweepOutcome {
    pub fn summary(&self) -> &SweepSummary {
        self.aggregator.summary()
    }

    pub fn report(&self) -> SweepReport {
        SweepReport::new(&self.profile, &self.aggregator, self.cancelled)
    }
}

enum Evaluation {
    Recorded(CandidateResult),
    Interrupted,
}

impl Sweep {
    pub fn new(
        profile: SearchProfile,
        encoding: CandidateEncoding,
        builder: BuildDriver,
        watchdog: Watchdog,
        keys: MetricKeys,
        cancel: CancelToken,
    ) -> Self {
        Self {
            profile,
            encoding,
            builder,
            watchdog,
            paths: ScratchPaths::default(),
            keys,
            cancel,
            aggregator: Aggregator::new(),
            start_index: 0,
        }
    }

    pub fn with_scratch(mut self, paths: ScratchPaths) -> Self {
        self.paths = paths;
        self
    }

    /// Continue after the candidates recorded in `report`.
    pub fn resume_from(mut self, report: SweepReport) -> Result<Self> {
        if report.profile.variant != self.profile.variant
            || report.profile.dimension != self.profile.dimension
        {
            bail!(
                "report was written by a {} sweep over dimension {}, not a {} sweep over dimension {}",
                report.profile.variant,
                report.profile.dimension,
                self.profile.variant,
                self.profile.dimension
            );
        }
        self.start_index = report.resume_point(&self.profile.space)?;
        self.aggregator = Aggregator::from_results(report.results);
        Ok(self)
    }

    pub fn profile(&self) -> &SearchProfile {
        &self.profile
    }

    pub fn paths(&self) -> &ScratchPaths {
        &self.paths
    }

    pub fn start_index(&self) -> usize {
        self.start_index
    }

    /// Run the remaining candidates in enumeration order.
    ///
    /// The summary is written to the diagnostics stream however the loop
    /// ends, including cancellation and mid-sweep errors.
    pub fn run(mut self, out: &mut SweepOutput<'_>) -> Result<SweepOutcome> {
        self.validate()?;
        self.paths.prepare()?;

        let total = self.profile.space.len();
        info!(
            variant = %self.profile.variant,
            dimension = self.profile.dimension,
            candidates = total,
            start = self.start_index,
            "starting sweep"
        );
        out.note(&format!("Num Configs: {total}"))?;
        if self.start_index > 0 {
            out.note(&format!(
                "Resuming at candidate {} of {total}",
                self.start_index + 1
            ))?;
        }

        out.row(&csv_header(self.profile.space.names(), self.keys.columns()))?;
        for result in self.aggregator.results() {
            if let Some(row) = result.csv_row() {
                out.row(&row)?;
            }
        }

        let swept = self.sweep_remaining(out, total);
        let cancelled = matches!(swept, Ok(true));

        let best = self.aggregator.best().map(|result| &result.tuple);
        write_summary(
            out.diagnostics,
            self.aggregator.summary(),
            &self.keys,
            self.profile.total_work,
            best,
            cancelled,
        )?;
        swept?;

        let summary = self.aggregator.summary();
        info!(
            attempted = summary.attempted,
            succeeded = summary.succeeded,
            cancelled,
            "sweep finished"
        );

        Ok(SweepOutcome {
            profile: self.profile,
            aggregator: self.aggregator,
            cancelled,
        })
    }

    /// Returns whether the sweep was interrupted.
    fn sweep_remaining(&mut self, out: &mut SweepOutput<'_>, total: usize) -> Result<bool> {
        let space = self.profile.space.clone();
        for (offset, tuple) in space.iter_from(self.start_index).enumerate() {
            let index = self.start_index + offset;
            if self.cancel.is_cancelled() {
                return Ok(true);
            }
            out.note(&format!("Running {tuple} ({} of {total})", index + 1))?;

            let result = match self.evaluate(index, tuple)? {
                Evaluation::Recorded(result) => result,
                Evaluation::Interrupted => return Ok(true),
            };
            let result = self.aggregator.record(result);
            match result.csv_row() {
                Some(row) => out.row(&row)?,
                None => out.note(&format!("Run error! ({})", result.status))?,
            }
        }
        Ok(false)
    }

    fn validate(&self) -> Result<()> {
        match &self.encoding {
            CandidateEncoding::Template(template) => {
                if let Some(first) = self.profile.space.tuple_at(0) {
                    template
                        .materialize(&first)
                        .context("template cannot encode this search space")?;
                }
            }
            CandidateEncoding::Defines { .. } => {
                if !self.paths.source.is_file() {
                    bail!("kernel source {} does not exist", self.paths.source.display());
                }
            }
        }
        Ok(())
    }

    fn evaluate(&self, index: usize, tuple: ParameterTuple) -> Result<Evaluation> {
        let flags = match &self.encoding {
            CandidateEncoding::Template(template) => {
                let source = template.materialize(&tuple)?;
                source.write_to(&self.paths.source).with_context(|| {
                    format!("failed to write candidate {}", self.paths.source.display())
                })?;
                Vec::new()
            }
            CandidateEncoding::Defines { prefix } => define_flags(prefix, &tuple),
        };

        let built = self.builder.build(&self.paths.source, &self.paths, &flags)?;
        // Build tools share our process group, so an interrupt usually
        // kills them too. Do not blame the candidate for that.
        if self.cancel.is_cancelled() {
            return Ok(Evaluation::Interrupted);
        }
        let executable = match built {
            BuildOutcome::Built { executable } => executable,
            BuildOutcome::TranslateFailed { diagnostics } => {
                warn!(index, %tuple, %diagnostics, "translation failed");
                return Ok(Evaluation::Recorded(CandidateResult::failure(
                    index,
                    tuple,
                    CandidateStatus::TranslateFailed,
                )));
            }
            BuildOutcome::CompileFailed { diagnostics } => {
                warn!(index, %tuple, %diagnostics, "compilation failed");
                return Ok(Evaluation::Recorded(CandidateResult::failure(
                    index,
                    tuple,
                    CandidateStatus::CompileFailed,
                )));
            }
            BuildOutcome::Interrupted { step, diagnostics } => {
                if self.watchdog.await_cancel(&self.cancel, INTERRUPT_GRACE) {
                    return Ok(Evaluation::Interrupted);
                }
                warn!(index, %tuple, ?step, %diagnostics, "build tool killed by a signal");
                let status = match step {
                    BuildStep::Translate => CandidateStatus::TranslateFailed,
                    BuildStep::Compile => CandidateStatus::CompileFailed,
                };
                return Ok(Evaluation::Recorded(CandidateResult::failure(index, tuple, status)));
            }
        };

        let result = match self.watchdog.run(&executable, &self.cancel)? {
            RunOutcome::Completed { output, elapsed } => {
                debug!(index, wall_secs = elapsed.as_secs_f64(), "candidate completed");
                match parse_metrics(&output, &self.keys) {
                    Ok(metrics) => CandidateResult::success(index, tuple, metrics),
                    Err(err) => {
                        warn!(index, %tuple, error = %err, %output, "unreadable candidate output");
                        CandidateResult::failure(index, tuple, CandidateStatus::ParseFailed)
                    }
                }
            }
            RunOutcome::Failed { code, output, .. } => {
                warn!(index, %tuple, ?code, %output, "candidate failed");
                CandidateResult::failure(index, tuple, CandidateStatus::RunFailed)
            }
            RunOutcome::TimedOut { output, elapsed } => {
                let wall_secs = elapsed.as_secs_f64();
                warn!(index, %tuple, wall_secs, %output, "candidate timed out");
                CandidateResult::failure(index, tuple, CandidateStatus::TimedOut)
            }
            RunOutcome::Cancelled { .. } => return Ok(Evaluation::Interrupted),
        };
        Ok(Evaluation::Recorded(result))
    }
}
