//! tiletune: tile-size autotuning for generated stencil kernels.
//!
//! The workspace crates are re-exported here under short names.

pub use tiletune_autotune as autotune;
pub use tiletune_codegen as codegen;
pub use tiletune_driver as driver;
pub use tiletune_runner as runner;
pub use tiletune_space as space;
