//! Persisted sweep reports, used for post-mortems and for resuming.

use crate::aggregator::{Aggregator, SweepSummary};
use crate::result::CandidateResult;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tiletune_space::{ConfigSpace, SearchProfile};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepReport {
    pub profile: SearchProfile,
    pub generated_at_unix_ms: u128,
    /// True when the sweep was interrupted before covering the whole space.
    pub cancelled: bool,
    pub results: Vec<CandidateResult>,
    pub summary: SweepSummary,
}

impl SweepReport {
    pub fn new(profile: &SearchProfile, aggregator: &Aggregator, cancelled: bool) -> Self {
        let generated_at_unix_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_else(|_| Duration::from_secs(0))
            .as_millis();

        Self {
            profile: profile.clone(),
            generated_at_unix_ms,
            cancelled,
            results: aggregator.results().to_vec(),
            summary: aggregator.summary().clone(),
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let data = fs::read(path)
            .with_context(|| format!("failed to read sweep report {}", path.display()))?;
        let report = serde_json::from_slice(&data)
            .with_context(|| format!("failed to parse sweep report {}", path.display()))?;
        Ok(report)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let blob = serde_json::to_vec_pretty(self)?;
        fs::write(path, blob)
            .with_context(|| format!("failed to write sweep report {}", path.display()))?;
        Ok(())
    }

    /// Index at which a sweep over `space` continues after this report.
    ///
    /// Fails unless the recorded tuples are exactly the first tuples `space`
    /// enumerates, in order.
    pub fn resume_point(&self, space: &ConfigSpace) -> Result<usize> {
        if self.results.len() > space.len() {
            bail!(
                "report holds {} results but the search space only has {} candidates",
                self.results.len(),
                space.len()
            );
        }
        for ((position, result), expected) in self.results.iter().enumerate().zip(space.iter()) {
            if result.index != position || result.tuple != expected {
                bail!(
                    "report does not match the search space at candidate {}: recorded {} but expected {}",
                    position,
                    result.tuple,
                    expected
                );
            }
        }
        Ok(self.results.len())
    }
}
