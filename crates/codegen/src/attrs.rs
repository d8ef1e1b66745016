//! Role-grouped textual encoding of a tile-search tuple.
//!
//! The encoding is `block:X,Y,Z time:T tile:EX,EY,EZ`. It is spliced into
//! kernel source verbatim, so only plain decimal integers are ever emitted.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tiletune_space::ParameterTuple;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AttributeError {
    #[error("tile attributes need 7 values (x,y,z,t,ex,ey,ez), got {0}")]
    WrongArity(usize),

    #[error("expected '{expected}:' group in '{text}'")]
    MissingGroup { expected: &'static str, text: String },

    #[error("group '{group}' expects {expected} values in '{text}'")]
    GroupArity {
        group: &'static str,
        expected: usize,
        text: String,
    },

    #[error("invalid integer '{0}' in tile attributes")]
    InvalidValue(String),

    #[error("no tile attributes found in source")]
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileAttributes {
    pub block: [u32; 3],
    pub time: u32,
    pub tile: [u32; 3],
}

impl TileAttributes {
    pub fn from_tuple(tuple: &ParameterTuple) -> Result<Self, AttributeError> {
        match *tuple.values() {
            [x, y, z, t, ex, ey, ez] => Ok(Self {
                block: [x, y, z],
                time: t,
                tile: [ex, ey, ez],
            }),
            _ => Err(AttributeError::WrongArity(tuple.len())),
        }
    }

    pub fn to_tuple(&self) -> ParameterTuple {
        let [x, y, z] = self.block;
        let [ex, ey, ez] = self.tile;
        ParameterTuple::new(vec![x, y, z, self.time, ex, ey, ez])
    }

    /// Locate and decode the attribute group embedded in materialized source.
    pub fn extract(source: &str) -> Result<Self, AttributeError> {
        let start = source.find("block:").ok_or(AttributeError::NotFound)?;
        let encoded = source[start..]
            .split_whitespace()
            .take(3)
            .collect::<Vec<_>>()
            .join(" ");
        encoded.parse()
    }
}

impl fmt::Display for TileAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [x, y, z] = self.block;
        let [ex, ey, ez] = self.tile;
        write!(
            f,
            "block:{x},{y},{z} time:{} tile:{ex},{ey},{ez}",
            self.time
        )
    }
}

impl FromStr for TileAttributes {
    type Err = AttributeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut groups = s.split_whitespace();
        let block = parse_group(groups.next(), "block", s)?;
        let time = parse_group(groups.next(), "time", s)?;
        let tile = parse_group(groups.next(), "tile", s)?;

        let arity = |group: &'static str, expected: usize| AttributeError::GroupArity {
            group,
            expected,
            text: s.to_string(),
        };

        Ok(Self {
            block: block.try_into().map_err(|_| arity("block", 3))?,
            time: match time.as_slice() {
                [t] => *t,
                _ => return Err(arity("time", 1)),
            },
            tile: tile.try_into().map_err(|_| arity("tile", 3))?,
        })
    }
}

fn parse_group(
    token: Option<&str>,
    expected: &'static str,
    text: &str,
) -> Result<Vec<u32>, AttributeError> {
    let missing = || AttributeError::MissingGroup {
        expected,
        text: text.to_string(),
    };
    let values = token
        .and_then(|token| token.strip_prefix(expected))
        .and_then(|rest| rest.strip_prefix(':'))
        .ok_or_else(missing)?;

    values
        .split(',')
        .map(|value| {
            value
                .parse::<u32>()
                .map_err(|_| AttributeError::InvalidValue(value.to_string()))
        })
        .collect()
}
