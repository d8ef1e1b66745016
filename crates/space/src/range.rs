//! Inclusive stepped value ranges for a single tunable dimension.

use crate::error::SpaceError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// `start, start + step, ...` up to and including `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RangeRepr", into = "RangeRepr")]
pub struct ParamRange {
    start: u32,
    end: u32,
    step: u32,
}

#[derive(Serialize, Deserialize)]
struct RangeRepr {
    start: u32,
    end: u32,
    step: u32,
}

impl TryFrom<RangeRepr> for ParamRange {
    type Error = SpaceError;

    fn try_from(repr: RangeRepr) -> Result<Self, Self::Error> {
        ParamRange::new(repr.start, repr.end, repr.step)
    }
}

impl From<ParamRange> for RangeRepr {
    fn from(range: ParamRange) -> Self {
        Self {
            start: range.start,
            end: range.end,
            step: range.step,
        }
    }
}

impl ParamRange {
    pub fn new(start: u32, end: u32, step: u32) -> Result<Self, SpaceError> {
        if step == 0 {
            return Err(SpaceError::ZeroStep);
        }
        if start > end {
            return Err(SpaceError::EmptyRange { start, end });
        }
        Ok(Self { start, end, step })
    }

    /// A range holding exactly one value.
    pub fn single(value: u32) -> Self {
        Self {
            start: value,
            end: value,
            step: 1,
        }
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    pub fn step(&self) -> u32 {
        self.step
    }

    pub fn cardinality(&self) -> usize {
        ((self.end - self.start) / self.step) as usize + 1
    }

    /// Value at position `index`. Callers keep `index < cardinality()`.
    pub fn value_at(&self, index: usize) -> u32 {
        debug_assert!(index < self.cardinality());
        self.start + self.step * index as u32
    }

    pub fn values(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.cardinality()).map(move |index| self.value_at(index))
    }

    pub fn contains(&self, value: u32) -> bool {
        value >= self.start && value <= self.end && (value - self.start) % self.step == 0
    }
}

impl fmt::Display for ParamRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.start, self.end, self.step)
    }
}

impl FromStr for ParamRange {
    type Err = SpaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || SpaceError::MalformedRange(s.to_string());
        let parts = s
            .trim()
            .split(':')
            .map(|part| part.trim().parse::<u32>().map_err(|_| malformed()))
            .collect::<Result<Vec<_>, _>>()?;

        match parts.as_slice() {
            [value] => Ok(Self::single(*value)),
            [start, end] => Self::new(*start, *end, 1),
            [start, end, step] => Self::new(*start, *end, *step),
            _ => Err(malformed()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cardinality_matches_values() {
        let range = ParamRange::new(32, 128, 32).unwrap();
        assert_eq!(range.cardinality(), 4);
        assert_eq!(range.values().collect::<Vec<_>>(), vec![32, 64, 96, 128]);
    }

    #[test]
    fn test_end_not_on_step_is_excluded() {
        let range = ParamRange::new(4, 9, 2).unwrap();
        assert_eq!(range.values().collect::<Vec<_>>(), vec![4, 6, 8]);
        assert!(range.contains(8));
        assert!(!range.contains(9));
        assert!(!range.contains(5));
    }

    #[test]
    fn test_parse_forms() {
        assert_eq!("4".parse::<ParamRange>().unwrap(), ParamRange::single(4));
        assert_eq!(
            "1:6".parse::<ParamRange>().unwrap(),
            ParamRange::new(1, 6, 1).unwrap()
        );
        assert_eq!(
            "8:16:4".parse::<ParamRange>().unwrap(),
            ParamRange::new(8, 16, 4).unwrap()
        );
        assert!(matches!(
            "8:x".parse::<ParamRange>(),
            Err(SpaceError::MalformedRange(_))
        ));
        assert!(matches!(
            "1:2:3:4".parse::<ParamRange>(),
            Err(SpaceError::MalformedRange(_))
        ));
    }

    #[test]
    fn test_invalid_ranges_rejected() {
        assert_eq!(ParamRange::new(1, 4, 0), Err(SpaceError::ZeroStep));
        assert_eq!(
            ParamRange::new(8, 4, 1),
            Err(SpaceError::EmptyRange { start: 8, end: 4 })
        );
    }

    #[test]
    fn test_deserialize_validates() {
        let bad = r#"{"start":1,"end":4,"step":0}"#;
        assert!(serde_json::from_str::<ParamRange>(bad).is_err());

        let good = r#"{"start":1,"end":4,"step":1}"#;
        let range: ParamRange = serde_json::from_str(good).unwrap();
        assert_eq!(range.cardinality(), 4);
    }
}
