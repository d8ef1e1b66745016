//! Candidate source generation: template substitution and define flags.

pub mod attrs;
pub mod defines;
pub mod template;

pub use attrs::*;
pub use defines::*;
pub use template::*;
