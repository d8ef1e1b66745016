//! tiletune sweep driver.

#[cfg(feature = "cli")]
pub mod cli;
pub mod output;
pub mod suite;
pub mod sweep;

#[cfg(feature = "cli")]
pub use cli::*;
pub use output::*;
pub use suite::*;
pub use sweep::*;
