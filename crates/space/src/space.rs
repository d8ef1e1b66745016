//! Cross-product enumeration over named dimensions.
//!
//! Tuples come out in nested lexicographic order: the first declared
//! dimension varies slowest, the last fastest. Every tuple has a stable
//! index, so a sweep interrupted at index `k` can be resumed with
//! [`ConfigSpace::iter_from`] and will see exactly the remaining tuples.

use crate::error::SpaceError;
use crate::range::ParamRange;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::FusedIterator;

/// One value per tunable dimension, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterTuple(Vec<u32>);

impl ParameterTuple {
    pub fn new(values: Vec<u32>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<u32> {
        self.0.get(index).copied()
    }
}

impl fmt::Display for ParameterTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value}")?;
        }
        f.write_str("]")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    pub range: ParamRange,
}

impl Dimension {
    pub fn new(name: impl Into<String>, range: ParamRange) -> Self {
        Self {
            name: name.into(),
            range,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Dimension>", into = "Vec<Dimension>")]
pub struct ConfigSpace {
    dimensions: Vec<Dimension>,
    len: usize,
}

impl TryFrom<Vec<Dimension>> for ConfigSpace {
    type Error = SpaceError;

    fn try_from(dimensions: Vec<Dimension>) -> Result<Self, Self::Error> {
        ConfigSpace::new(dimensions)
    }
}

impl From<ConfigSpace> for Vec<Dimension> {
    fn from(space: ConfigSpace) -> Self {
        space.dimensions
    }
}

impl ConfigSpace {
    pub fn new(dimensions: Vec<Dimension>) -> Result<Self, SpaceError> {
        if dimensions.is_empty() {
            return Err(SpaceError::NoDimensions);
        }
        for (i, dim) in dimensions.iter().enumerate() {
            if dimensions[..i].iter().any(|other| other.name == dim.name) {
                return Err(SpaceError::DuplicateDimension(dim.name.clone()));
            }
        }
        let len = checked_len(&dimensions)?;
        Ok(Self { dimensions, len })
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.dimensions.iter().map(|dim| dim.name.as_str())
    }

    /// Number of tuples: the product of every dimension's cardinality.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Replace the range of the dimension called `name`.
    pub fn set_range(&mut self, name: &str, range: ParamRange) -> Result<(), SpaceError> {
        let dim = self
            .dimensions
            .iter_mut()
            .find(|dim| dim.name == name)
            .ok_or_else(|| SpaceError::UnknownParameter(name.to_string()))?;
        let previous = std::mem::replace(&mut dim.range, range);
        match checked_len(&self.dimensions) {
            Ok(len) => {
                self.len = len;
                Ok(())
            }
            Err(err) => {
                if let Some(dim) = self.dimensions.iter_mut().find(|dim| dim.name == name) {
                    dim.range = previous;
                }
                Err(err)
            }
        }
    }

    /// Decode `index` as a mixed-radix number, last dimension least significant.
    pub fn tuple_at(&self, index: usize) -> Option<ParameterTuple> {
        if index >= self.len {
            return None;
        }
        let mut rest = index;
        let mut values = vec![0; self.dimensions.len()];
        for (slot, dim) in values.iter_mut().zip(&self.dimensions).rev() {
            let radix = dim.range.cardinality();
            *slot = dim.range.value_at(rest % radix);
            rest /= radix;
        }
        Some(ParameterTuple(values))
    }

    pub fn contains(&self, tuple: &ParameterTuple) -> bool {
        tuple.len() == self.dimensions.len()
            && self
                .dimensions
                .iter()
                .zip(tuple.values())
                .all(|(dim, value)| dim.range.contains(*value))
    }

    pub fn iter(&self) -> SpaceIter<'_> {
        self.iter_from(0)
    }

    /// Enumerate starting at tuple index `start`.
    pub fn iter_from(&self, start: usize) -> SpaceIter<'_> {
        let start = start.min(self.len);
        let mut digits = vec![0; self.dimensions.len()];
        let mut rest = start;
        for (digit, dim) in digits.iter_mut().zip(&self.dimensions).rev() {
            let radix = dim.range.cardinality();
            *digit = rest % radix;
            rest /= radix;
        }
        SpaceIter {
            space: self,
            digits,
            next_index: start,
        }
    }
}

fn checked_len(dimensions: &[Dimension]) -> Result<usize, SpaceError> {
    dimensions.iter().try_fold(1usize, |acc, dim| {
        acc.checked_mul(dim.range.cardinality())
            .ok_or(SpaceError::TooLarge)
    })
}

/// Lazy odometer over a [`ConfigSpace`].
#[derive(Debug, Clone)]
pub struct SpaceIter<'a> {
    space: &'a ConfigSpace,
    digits: Vec<usize>,
    next_index: usize,
}

impl SpaceIter<'_> {
    /// Index of the tuple the next call to `next` will return.
    pub fn next_index(&self) -> usize {
        self.next_index
    }
}

impl Iterator for SpaceIter<'_> {
    type Item = ParameterTuple;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_index >= self.space.len {
            return None;
        }

        let values = self
            .digits
            .iter()
            .zip(&self.space.dimensions)
            .map(|(digit, dim)| dim.range.value_at(*digit))
            .collect();

        for (digit, dim) in self.digits.iter_mut().zip(&self.space.dimensions).rev() {
            *digit += 1;
            if *digit < dim.range.cardinality() {
                break;
            }
            *digit = 0;
        }
        self.next_index += 1;

        Some(ParameterTuple(values))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.space.len - self.next_index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for SpaceIter<'_> {}
impl FusedIterator for SpaceIter<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn space(ranges: &[(&str, u32, u32, u32)]) -> ConfigSpace {
        ConfigSpace::new(
            ranges
                .iter()
                .map(|(name, start, end, step)| {
                    Dimension::new(*name, ParamRange::new(*start, *end, *step).unwrap())
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_length_is_product_of_cardinalities() {
        let space = space(&[("x", 32, 128, 32), ("y", 4, 8, 2), ("t", 1, 6, 1)]);
        assert_eq!(space.len(), 4 * 3 * 6);
        assert_eq!(space.iter().count(), space.len());
        assert_eq!(space.iter().len(), space.len());
    }

    #[test]
    fn test_outermost_dimension_varies_slowest() {
        let space = space(&[("x", 1, 2, 1), ("y", 10, 30, 10)]);
        let tuples: Vec<Vec<u32>> = space.iter().map(|t| t.values().to_vec()).collect();
        assert_eq!(
            tuples,
            vec![
                vec![1, 10],
                vec![1, 20],
                vec![1, 30],
                vec![2, 10],
                vec![2, 20],
                vec![2, 30],
            ]
        );
    }

    #[test]
    fn test_every_tuple_within_bounds_and_unique() {
        let space = space(&[("x", 8, 16, 4), ("y", 4, 8, 2), ("z", 4, 8, 2), ("t", 1, 3, 1)]);
        let all: Vec<_> = space.iter().collect();
        assert!(all.iter().all(|tuple| space.contains(tuple)));
        let unique: std::collections::HashSet<_> = all.iter().collect();
        assert_eq!(unique.len(), all.len());
    }

    #[test]
    fn test_reenumeration_is_identical() {
        let space = space(&[("x", 1, 5, 2), ("y", 1, 3, 1), ("z", 7, 7, 1)]);
        let first: Vec<_> = space.iter().collect();
        let second: Vec<_> = space.iter().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_resume_matches_skip() {
        let space = space(&[("x", 1, 4, 1), ("y", 2, 10, 4), ("z", 1, 2, 1)]);
        for start in 0..=space.len() {
            let resumed: Vec<_> = space.iter_from(start).collect();
            let skipped: Vec<_> = space.iter().skip(start).collect();
            assert_eq!(resumed, skipped, "resume from {start}");
        }
        assert_eq!(space.iter_from(space.len() + 5).count(), 0);
    }

    #[test]
    fn test_tuple_at_matches_iteration_order() {
        let space = space(&[("a", 1, 3, 1), ("b", 0, 20, 5)]);
        for (index, tuple) in space.iter().enumerate() {
            assert_eq!(space.tuple_at(index), Some(tuple));
        }
        assert_eq!(space.tuple_at(space.len()), None);
    }

    #[test]
    fn test_set_range_updates_length() {
        let mut space = space(&[("x", 32, 128, 32), ("y", 4, 8, 2)]);
        space.set_range("x", "32:64:32".parse().unwrap()).unwrap();
        assert_eq!(space.len(), 2 * 3);
        assert_eq!(
            space.set_range("w", ParamRange::single(1)),
            Err(SpaceError::UnknownParameter("w".into()))
        );
    }

    #[test]
    fn test_rejects_malformed_spaces() {
        assert_eq!(ConfigSpace::new(Vec::new()), Err(SpaceError::NoDimensions));
        let dup = vec![
            Dimension::new("x", ParamRange::single(1)),
            Dimension::new("x", ParamRange::single(2)),
        ];
        assert_eq!(
            ConfigSpace::new(dup),
            Err(SpaceError::DuplicateDimension("x".into()))
        );
    }

    #[test]
    fn test_tuple_display() {
        let tuple = ParameterTuple::new(vec![32, 4, 1]);
        assert_eq!(tuple.to_string(), "[32, 4, 1]");
    }
}
