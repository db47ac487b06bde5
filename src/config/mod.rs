//! Configuration module for Driftwatch
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use driftwatch::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("driftwatch.toml")).unwrap();
//! println!("Configured sources: {}", config.sources.len());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Category, Config, FetcherConfig, NotifyConfig, OutputConfig, ScheduleConfig, Selectors,
    SourceConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
