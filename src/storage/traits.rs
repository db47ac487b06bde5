//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::config::SourceConfig;
use crate::storage::{ItemRecord, ItemVersionRecord, NewVersion, RunRecord, SourceRecord};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Source not found: {0}")]
    SourceNotFound(i64),

    #[error("Item not found: {0}")]
    ItemNotFound(i64),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// The store is the correctness boundary for concurrent runs: (source, url)
/// is unique for items and every read-modify-write of an item happens inside
/// [`Storage::transaction`]. Related rows are never loaded implicitly; callers
/// query for versions when they need them.
pub trait Storage {
    // ===== Transactions =====

    /// Starts a write transaction
    fn begin(&mut self) -> StorageResult<()>;

    /// Commits the open transaction
    fn commit(&mut self) -> StorageResult<()>;

    /// Rolls back the open transaction
    fn rollback(&mut self) -> StorageResult<()>;

    /// Runs `f` inside a write transaction, rolling back if it fails
    fn transaction<T, F>(&mut self, f: F) -> StorageResult<T>
    where
        Self: Sized,
        F: FnOnce(&mut Self) -> StorageResult<T>,
    {
        self.begin()?;
        match f(self) {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = self.rollback() {
                    tracing::error!("Rollback failed: {}", rollback);
                }
                Err(e)
            }
        }
    }

    // ===== Source Management =====

    /// Inserts or updates a source by name
    fn upsert_source(&mut self, source: &SourceConfig) -> StorageResult<SourceRecord>;

    /// Gets a source by ID
    fn get_source(&self, source_id: i64) -> StorageResult<SourceRecord>;

    /// Gets a source by name
    fn get_source_by_name(&self, name: &str) -> StorageResult<Option<SourceRecord>>;

    /// Lists all sources ordered by ID
    fn list_sources(&self) -> StorageResult<Vec<SourceRecord>>;

    // ===== Run Management =====

    /// Creates a new run in the `running` state
    fn create_run(&mut self, source_id: i64, started_at: DateTime<Utc>)
        -> StorageResult<RunRecord>;

    /// Persists the run's status, end time, error message and counts
    fn save_run(&mut self, run: &RunRecord) -> StorageResult<()>;

    /// Records the export artifacts produced after a run
    fn set_run_exports(
        &mut self,
        run_id: i64,
        csv_path: &str,
        json_path: &str,
        md_path: &str,
    ) -> StorageResult<()>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Lists the most recent runs, newest first
    fn list_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>>;

    // ===== Item Management =====

    /// Looks up an item by its identity
    fn find_item(&self, source_id: i64, url: &str) -> StorageResult<Option<ItemRecord>>;

    /// Inserts a new item with first_seen = last_seen = `seen_at`
    fn insert_item(
        &mut self,
        source_id: i64,
        url: &str,
        title: Option<&str>,
        seen_at: DateTime<Utc>,
    ) -> StorageResult<ItemRecord>;

    /// Advances last_seen and fills in the title if the item has none
    fn touch_item(
        &mut self,
        item_id: i64,
        seen_at: DateTime<Utc>,
        title: Option<&str>,
    ) -> StorageResult<()>;

    /// Points the item at a new latest version
    fn set_latest_version(&mut self, item_id: i64, version_id: i64) -> StorageResult<()>;

    /// Gets an item by ID
    fn get_item(&self, item_id: i64) -> StorageResult<ItemRecord>;

    /// Lists a source's items ordered by ID
    fn list_items(&self, source_id: i64) -> StorageResult<Vec<ItemRecord>>;

    // ===== Version History =====

    /// Appends a version to an item's history
    fn insert_version(&mut self, version: NewVersion<'_>) -> StorageResult<ItemVersionRecord>;

    /// Gets a version by ID
    fn get_version(&self, version_id: i64) -> StorageResult<Option<ItemVersionRecord>>;

    /// Attaches a snapshot reference to a version
    fn set_snapshot_path(&mut self, version_id: i64, path: &str) -> StorageResult<()>;

    /// Lists an item's versions ordered by seen_at (oldest first)
    fn list_versions(&self, item_id: i64) -> StorageResult<Vec<ItemVersionRecord>>;

    /// Gets the item's version with the greatest seen_at
    fn latest_version_for(&self, item_id: i64) -> StorageResult<Option<ItemVersionRecord>>;
}
