//! Search-space definitions and enumeration for tiletune sweeps.

pub mod error;
pub mod profile;
pub mod range;
pub mod space;

pub use error::*;
pub use profile::*;
pub use range::*;
pub use space::*;
