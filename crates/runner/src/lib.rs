//! Build and execution backends for tiletune candidates.

pub mod build;
pub mod cancel;
pub mod tool;
pub mod watchdog;

pub use build::*;
pub use cancel::*;
pub use tool::*;
pub use watchdog::*;
