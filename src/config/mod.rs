//! Configuration module for hibid-ingest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use hibid_ingest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("ingest.toml")).unwrap();
//! println!("Searching around zip {}", config.search.zip_code);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, RateLimitConfig, RetryConfig, SearchConfig, SourceConfig, StorageConfig,
    ALLOWED_RADII,
};

// Re-export parser and validation entry points
pub use parser::{load_config, parse_config};
pub use validation::validate;
