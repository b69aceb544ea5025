//! Monitor Module
//!
//! Periodic crypto snapshots and price-move alerting.

mod detector;
mod job;
mod scheduler;

pub use detector::{detect, ChangeDetector, PriceChange, DEFAULT_THRESHOLD_PCT, MIN_THRESHOLD_PCT};
pub use job::{CycleReport, SnapshotJob};
pub use scheduler::SnapshotScheduler;
