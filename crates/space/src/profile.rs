//! Built-in search profiles, one per sweep variant and problem class.

use crate::error::SpaceError;
use crate::range::ParamRange;
use crate::space::{ConfigSpace, Dimension};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Time steps every generated stencil executable is built for.
pub const DEFAULT_TIME_STEPS: u32 = 1000;

/// Dimension names of the tile-search space, in enumeration order.
pub const TILE_DIMENSIONS: [&str; 7] = ["x", "y", "z", "t", "ex", "ey", "ez"];

pub const TILE_SEARCH_SELECTORS: &[u32] = &[2, 3];
pub const CPU_SELECTORS: &[u32] = &[1, 2, 3];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SweepVariant {
    /// Template substitution, source-to-source translation, native build.
    TileSearch,
    /// Fixed source, parameters passed as preprocessor defines.
    Cpu,
}

impl fmt::Display for SweepVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SweepVariant::TileSearch => f.write_str("tile-search"),
            SweepVariant::Cpu => f.write_str("cpu"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchProfile {
    pub variant: SweepVariant,
    pub dimension: u32,
    pub space: ConfigSpace,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub problem_size: Option<u32>,
    pub time_steps: u32,
    /// Work per run in the throughput unit (e.g. GStencils), used to turn
    /// the best elapsed time into a sweep-wide throughput figure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_work: Option<f64>,
}

impl SearchProfile {
    /// Hand-tuned GPU tile-search ranges for 2-D and 3-D stencils.
    pub fn tile_search(dimension: u32) -> Result<Self, SpaceError> {
        let (ranges, problem_size) = match dimension {
            2 => (
                [
                    ParamRange::new(32, 128, 32)?,
                    ParamRange::new(4, 8, 2)?,
                    ParamRange::single(1),
                    ParamRange::new(1, 6, 1)?,
                    ParamRange::single(1),
                    ParamRange::new(1, 12, 1)?,
                    ParamRange::single(1),
                ],
                6000,
            ),
            3 => (
                [
                    ParamRange::new(8, 16, 4)?,
                    ParamRange::new(4, 8, 2)?,
                    ParamRange::new(4, 8, 2)?,
                    ParamRange::new(1, 3, 1)?,
                    ParamRange::single(1),
                    ParamRange::new(1, 3, 1)?,
                    ParamRange::new(1, 3, 1)?,
                ],
                500,
            ),
            selector => {
                return Err(SpaceError::UnknownDimension {
                    selector,
                    supported: TILE_SEARCH_SELECTORS,
                })
            }
        };

        let dimensions = TILE_DIMENSIONS
            .iter()
            .zip(ranges)
            .map(|(name, range)| Dimension::new(*name, range))
            .collect();

        let mut profile = Self {
            variant: SweepVariant::TileSearch,
            dimension,
            space: ConfigSpace::new(dimensions)?,
            problem_size: None,
            time_steps: DEFAULT_TIME_STEPS,
            total_work: None,
        };
        profile.set_problem_size(problem_size);
        Ok(profile)
    }

    /// CPU sweep: one time-tile dimension followed by one spatial tile
    /// dimension per problem dimension.
    pub fn cpu(dimension: u32) -> Result<Self, SpaceError> {
        if !CPU_SELECTORS.contains(&dimension) {
            return Err(SpaceError::UnknownDimension {
                selector: dimension,
                supported: CPU_SELECTORS,
            });
        }

        let mut dimensions = vec![Dimension::new("t", ParamRange::new(1, 16, 1)?)];
        for d in 1..=dimension {
            dimensions.push(Dimension::new(format!("s{d}"), ParamRange::new(4, 32, 4)?));
        }

        Ok(Self {
            variant: SweepVariant::Cpu,
            dimension,
            space: ConfigSpace::new(dimensions)?,
            problem_size: None,
            time_steps: DEFAULT_TIME_STEPS,
            total_work: None,
        })
    }

    /// Set the edge length of the problem grid and recompute total work as
    /// `size^dimension * time_steps / 1e9`.
    pub fn set_problem_size(&mut self, problem_size: u32) {
        self.problem_size = Some(problem_size);
        self.recompute_total_work();
    }

    pub fn set_time_steps(&mut self, time_steps: u32) {
        self.time_steps = time_steps;
        self.recompute_total_work();
    }

    pub fn set_total_work(&mut self, total_work: f64) {
        self.total_work = Some(total_work);
    }

    pub fn set_range(&mut self, name: &str, range: ParamRange) -> Result<(), SpaceError> {
        self.space.set_range(name, range)
    }

    fn recompute_total_work(&mut self) {
        if let Some(size) = self.problem_size {
            let cells = (size as f64).powi(self.dimension as i32);
            self.total_work = Some(cells * self.time_steps as f64 / 1e9);
        }
    }
}
