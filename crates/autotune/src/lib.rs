//! Result bookkeeping for tiletune sweeps.

pub mod aggregator;
pub mod metrics;
pub mod report;
pub mod result;

pub use aggregator::*;
pub use metrics::*;
pub use report::*;
pub use result::*;
