//! Append-only result accumulation with an incrementally maintained summary.

use crate::result::{CandidateResult, CandidateStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reported minimum elapsed time when nothing succeeded.
pub const MIN_ELAPSED_SENTINEL: f64 = 100000.0;
/// Reported maximum throughput when nothing succeeded.
pub const MAX_THROUGHPUT_SENTINEL: f64 = 0.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failures: BTreeMap<CandidateStatus, usize>,
    pub min_elapsed: f64,
    pub min_compute_elapsed: f64,
    pub max_throughput: f64,
    /// Enumeration index of the highest-throughput success. Ties go to the
    /// lower index so the choice does not depend on arrival order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best: Option<usize>,
}

impl Default for SweepSummary {
    fn default() -> Self {
        Self {
            attempted: 0,
            succeeded: 0,
            failures: BTreeMap::new(),
            min_elapsed: MIN_ELAPSED_SENTINEL,
            min_compute_elapsed: MIN_ELAPSED_SENTINEL,
            max_throughput: MAX_THROUGHPUT_SENTINEL,
            best: None,
        }
    }
}

impl SweepSummary {
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a CandidateResult>) -> Self {
        let mut summary = Self::default();
        for result in results {
            summary.observe(result);
        }
        summary
    }

    pub fn observe(&mut self, result: &CandidateResult) {
        self.attempted += 1;

        let Some(metrics) = result.successful_metrics() else {
            let status = if result.status.is_success() {
                CandidateStatus::ParseFailed
            } else {
                result.status
            };
            *self.failures.entry(status).or_default() += 1;
            return;
        };

        self.succeeded += 1;
        self.min_elapsed = self.min_elapsed.min(metrics.elapsed);
        self.min_compute_elapsed = self.min_compute_elapsed.min(metrics.compute_elapsed);

        let improves = match self.best {
            None => true,
            Some(best) => {
                metrics.throughput > self.max_throughput
                    || (metrics.throughput == self.max_throughput && result.index < best)
            }
        };
        if improves {
            self.best = Some(result.index);
        }
        self.max_throughput = self.max_throughput.max(metrics.throughput);
    }

    pub fn has_successes(&self) -> bool {
        self.succeeded > 0
    }

    pub fn failed(&self) -> usize {
        self.failures.values().sum()
    }

    pub fn failures_of(&self, status: CandidateStatus) -> usize {
        self.failures.get(&status).copied().unwrap_or(0)
    }

    /// `total_work / min_elapsed`: best end-to-end throughput.
    pub fn total_throughput(&self, total_work: f64) -> f64 {
        total_work / self.min_elapsed
    }

    /// `total_work / min_compute_elapsed`: best kernel-only throughput.
    pub fn compute_throughput(&self, total_work: f64) -> f64 {
        total_work / self.min_compute_elapsed
    }
}

/// Owns the results of one sweep. Results are never mutated once recorded.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    results: Vec<CandidateResult>,
    summary: SweepSummary,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with results from an earlier, interrupted run of the same sweep.
    pub fn from_results(results: Vec<CandidateResult>) -> Self {
        let summary = SweepSummary::from_results(&results);
        Self { results, summary }
    }

    pub fn record(&mut self, result: CandidateResult) -> &CandidateResult {
        self.summary.observe(&result);
        self.results.push(result);
        &self.results[self.results.len() - 1]
    }

    pub fn results(&self) -> &[CandidateResult] {
        &self.results
    }

    pub fn summary(&self) -> &SweepSummary {
        &self.summary
    }

    pub fn best(&self) -> Option<&CandidateResult> {
        let best = self.summary.best?;
        self.results.iter().find(|result| result.index == best)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
