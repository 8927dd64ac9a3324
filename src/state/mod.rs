//! State module for tracking scrape runs
//!
//! # Components
//!
//! - `RunTracker`: Opens a run record, accumulates per-page counters, and closes
//!   the run exactly once with a terminal status
//! - `RunSummary`: The caller-facing view of a closed run

mod run_tracker;

// Re-export main types
pub use run_tracker::{PageTally, RunSummary, RunTracker};
