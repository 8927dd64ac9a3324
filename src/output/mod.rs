//! Output module for reporting scrape runs
//!
//! This module handles:
//! - Formatting the run summary printed after each invocation
//! - Inspection reports over stored runs and items

mod history;
mod summary;

pub use history::{format_item, format_run_history};
pub use summary::{format_summary, print_summary};
