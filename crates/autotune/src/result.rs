//! Per-candidate outcome records.

use crate::metrics::Metrics;
use serde::{Deserialize, Serialize};
use std::fmt;
use tiletune_space::ParameterTuple;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CandidateStatus {
    Success,
    TranslateFailed,
    CompileFailed,
    RunFailed,
    TimedOut,
    ParseFailed,
}

impl CandidateStatus {
    pub const FAILURES: [CandidateStatus; 5] = [
        CandidateStatus::TranslateFailed,
        CandidateStatus::CompileFailed,
        CandidateStatus::RunFailed,
        CandidateStatus::TimedOut,
        CandidateStatus::ParseFailed,
    ];

    pub fn is_success(&self) -> bool {
        matches!(self, CandidateStatus::Success)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateStatus::Success => "success",
            CandidateStatus::TranslateFailed => "translate-failed",
            CandidateStatus::CompileFailed => "compile-failed",
            CandidateStatus::RunFailed => "run-failed",
            CandidateStatus::TimedOut => "timed-out",
            CandidateStatus::ParseFailed => "parse-failed",
        }
    }
}

impl fmt::Display for CandidateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one attempted tuple. `metrics` is present exactly when the
/// status is [`CandidateStatus::Success`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateResult {
    /// Position of the tuple in the sweep's enumeration order.
    pub index: usize,
    pub tuple: ParameterTuple,
    pub status: CandidateStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Metrics>,
}

impl CandidateResult {
    pub fn success(index: usize, tuple: ParameterTuple, metrics: Metrics) -> Self {
        Self {
            index,
            tuple,
            status: CandidateStatus::Success,
            metrics: Some(metrics),
        }
    }

    pub fn failure(index: usize, tuple: ParameterTuple, status: CandidateStatus) -> Self {
        debug_assert!(!status.is_success());
        Self {
            index,
            tuple,
            status,
            metrics: None,
        }
    }

    /// Successful metrics, ignoring records whose status disagrees.
    pub fn successful_metrics(&self) -> Option<&Metrics> {
        self.metrics.as_ref().filter(|_| self.status.is_success())
    }

    /// `v0,v1,...,throughput,elapsed,compute_elapsed,` for successes.
    pub fn csv_row(&self) -> Option<String> {
        let metrics = self.successful_metrics()?;
        let mut row = String::new();
        for value in self.tuple.values() {
            row.push_str(&value.to_string());
            row.push(',');
        }
        row.push_str(&format!(
            "{:.6},{:.6},{:.6},",
            metrics.throughput, metrics.elapsed, metrics.compute_elapsed
        ));
        Some(row)
    }
}

/// Header matching [`CandidateResult::csv_row`].
pub fn csv_header<'a>(
    dimensions: impl IntoIterator<Item = &'a str>,
    metric_columns: [&'a str; 3],
) -> String {
    let mut header = String::new();
    for name in dimensions.into_iter().chain(metric_columns) {
        header.push_str(name);
        header.push(',');
    }
    header
}
