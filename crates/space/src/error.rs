//! Errors raised while declaring a search space.

use thiserror::Error;

/// Configuration errors. All of these are fatal: they are detected before
/// any candidate is built.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SpaceError {
    #[error("Unknown dimensionality! {selector} is not one of {supported:?}")]
    UnknownDimension {
        selector: u32,
        supported: &'static [u32],
    },

    #[error("range {start}:{end} is empty")]
    EmptyRange { start: u32, end: u32 },

    #[error("range step must be at least 1")]
    ZeroStep,

    #[error("malformed range '{0}' (expected START[:END[:STEP]])")]
    MalformedRange(String),

    #[error("no tunable dimension named '{0}'")]
    UnknownParameter(String),

    #[error("dimension '{0}' is declared twice")]
    DuplicateDimension(String),

    #[error("search space declares no dimensions")]
    NoDimensions,

    #[error("search space has more candidates than can be indexed")]
    TooLarge,
}
