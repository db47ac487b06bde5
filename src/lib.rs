//! Driftwatch: change-tracking scraper for listing pages
//!
//! This crate fetches listing pages from configured sources, extracts the
//! items on each page and keeps a version history per item, recording a new
//! version only when the item's content fingerprint changes.

pub mod config;
pub mod export;
pub mod extract;
pub mod fetch;
pub mod fingerprint;
pub mod notify;
pub mod reconcile;
pub mod runner;
pub mod snapshot;
pub mod storage;

use thiserror::Error;

/// Main error type for Driftwatch operations
#[derive(Debug, Error)]
pub enum DriftError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Unknown source: {0}")]
    UnknownSource(String),

    #[error("Source is inactive: {0}")]
    InactiveSource(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid selector in config: {0}")]
    InvalidSelector(String),
}

/// Result type alias for Driftwatch operations
pub type Result<T> = std::result::Result<T, DriftError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::{Config, SourceConfig};
pub use extract::{extract, CandidateItem};
pub use fingerprint::{changed, fingerprint};
pub use runner::RunController;
pub use storage::{RunRecord, RunStatus, SqliteStorage, Storage};
