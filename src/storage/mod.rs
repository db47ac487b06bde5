//! Storage module for persisting sources, items, versions and runs
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Source synchronisation from configuration
//! - Item and version history persistence
//! - Scrape run tracking

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::config::{Category, Selectors};
use chrono::{DateTime, Utc};

/// A configured source as stored
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub category: Category,
    pub selectors: Selectors,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// An item tracked at a source, unique per (source, url)
#[derive(Debug, Clone, PartialEq)]
pub struct ItemRecord {
    pub id: i64,
    pub source_id: i64,
    pub url: String,
    pub title: Option<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub latest_version_id: Option<i64>,
}

/// One observed state of an item
#[derive(Debug, Clone, PartialEq)]
pub struct ItemVersionRecord {
    pub id: i64,
    pub item_id: i64,
    pub seen_at: DateTime<Utc>,
    pub content_text: Option<String>,
    pub content_hash: Option<String>,
    pub price_value: Option<f64>,
    pub snapshot_path: Option<String>,
}

/// Fields of a version about to be inserted
#[derive(Debug, Clone, Copy)]
pub struct NewVersion<'a> {
    pub item_id: i64,
    pub seen_at: DateTime<Utc>,
    pub content_text: Option<&'a str>,
    pub content_hash: Option<&'a str>,
    pub price_value: Option<f64>,
}

/// One execution of the pipeline for one source
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub id: i64,
    pub source_id: i64,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub error_message: Option<String>,
    pub created_items: u32,
    pub changed_items: u32,
    pub export_csv_path: Option<String>,
    pub export_json_path: Option<String>,
    pub export_md_path: Option<String>,
}

impl RunRecord {
    /// A fresh run in the `Running` state
    pub fn running(id: i64, source_id: i64, started_at: DateTime<Utc>) -> Self {
        Self {
            id,
            source_id,
            started_at,
            ended_at: None,
            status: RunStatus::Running,
            error_message: None,
            created_items: 0,
            changed_items: 0,
            export_csv_path: None,
            export_json_path: None,
            export_md_path: None,
        }
    }

    /// Moves the run to its terminal state
    ///
    /// Has no effect on a run that already ended.
    pub fn finish(&mut self, status: RunStatus, error_message: Option<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.status = status;
        self.error_message = error_message;
        self.ended_at = Some(Utc::now());
    }
}

/// Status of a scrape run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Success,
    Error,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Success => "success",
            Self::Error => "error",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "success" => Some(Self::Success),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_db_string())
    }
}
