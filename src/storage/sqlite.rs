//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::config::{Category, Selectors, SourceConfig};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    ItemRecord, ItemVersionRecord, NewVersion, RunRecord, RunStatus, SourceRecord,
};
use crate::DriftError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::time::Duration;

const SOURCE_COLUMNS: &str = "id, name, url, category, list_selector, title_selector,
    link_selector, content_selector, price_selector, active, created_at";

const ITEM_COLUMNS: &str = "id, source_id, url, title, first_seen, last_seen, latest_version_id";

const VERSION_COLUMNS: &str =
    "id, item_id, seen_at, content_text, content_hash, price_value, snapshot_path";

const RUN_COLUMNS: &str = "id, source_id, started_at, ended_at, status, error_message,
    created_items, changed_items, export_csv_path, export_json_path, export_md_path";

/// Concurrent workers wait this long for the write lock before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens or creates the database at `path`
    ///
    /// Each worker opens its own connection; WAL mode lets readers proceed
    /// while one writer holds the lock.
    pub fn new(path: &Path) -> Result<Self, DriftError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path).map_err(StorageError::from)?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(StorageError::from)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )
        .map_err(StorageError::from)?;

        initialize_schema(&conn).map_err(StorageError::from)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, DriftError> {
        let conn = Connection::open_in_memory().map_err(StorageError::from)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(StorageError::from)?;
        initialize_schema(&conn).map_err(StorageError::from)?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn source_from_row(row: &Row<'_>) -> rusqlite::Result<SourceRecord> {
    Ok(SourceRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        url: row.get(2)?,
        category: Category::from_db_string(&row.get::<_, String>(3)?).unwrap_or_default(),
        selectors: Selectors {
            list: row.get(4)?,
            title: row.get(5)?,
            link: row.get(6)?,
            content: row.get(7)?,
            price: row.get(8)?,
        },
        active: row.get(9)?,
        created_at: row.get(10)?,
    })
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<ItemRecord> {
    Ok(ItemRecord {
        id: row.get(0)?,
        source_id: row.get(1)?,
        url: row.get(2)?,
        title: row.get(3)?,
        first_seen: row.get(4)?,
        last_seen: row.get(5)?,
        latest_version_id: row.get(6)?,
    })
}

fn version_from_row(row: &Row<'_>) -> rusqlite::Result<ItemVersionRecord> {
    Ok(ItemVersionRecord {
        id: row.get(0)?,
        item_id: row.get(1)?,
        seen_at: row.get(2)?,
        content_text: row.get(3)?,
        content_hash: row.get(4)?,
        price_value: row.get(5)?,
        snapshot_path: row.get(6)?,
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        source_id: row.get(1)?,
        started_at: row.get(2)?,
        ended_at: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?).unwrap_or(RunStatus::Error),
        error_message: row.get(5)?,
        created_items: row.get(6)?,
        changed_items: row.get(7)?,
        export_csv_path: row.get(8)?,
        export_json_path: row.get(9)?,
        export_md_path: row.get(10)?,
    })
}

impl Storage for SqliteStorage {
    // ===== Transactions =====

    fn begin(&mut self) -> StorageResult<()> {
        // IMMEDIATE takes the write lock up front so two runs cannot both
        // read "no such item" and then race to insert it
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(())
    }

    fn commit(&mut self) -> StorageResult<()> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> StorageResult<()> {
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    // ===== Source Management =====

    fn upsert_source(&mut self, source: &SourceConfig) -> StorageResult<SourceRecord> {
        let selectors = source.selectors();
        self.conn.execute(
            "INSERT INTO sources (name, url, category, list_selector, title_selector,
                link_selector, content_selector, price_selector, active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(name) DO UPDATE SET
                url = excluded.url,
                category = excluded.category,
                list_selector = excluded.list_selector,
                title_selector = excluded.title_selector,
                link_selector = excluded.link_selector,
                content_selector = excluded.content_selector,
                price_selector = excluded.price_selector,
                active = excluded.active",
            params![
                source.name,
                source.url,
                source.category.to_db_string(),
                selectors.list,
                selectors.title,
                selectors.link,
                selectors.content,
                selectors.price,
                source.active,
                Utc::now(),
            ],
        )?;

        self.get_source_by_name(&source.name)?.ok_or_else(|| {
            StorageError::Corrupt(format!("Source '{}' missing after upsert", source.name))
        })
    }

    fn get_source(&self, source_id: i64) -> StorageResult<SourceRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM sources WHERE id = ?1", SOURCE_COLUMNS),
                params![source_id],
                source_from_row,
            )
            .optional()?
            .ok_or(StorageError::SourceNotFound(source_id))
    }

    fn get_source_by_name(&self, name: &str) -> StorageResult<Option<SourceRecord>> {
        let source = self
            .conn
            .query_row(
                &format!("SELECT {} FROM sources WHERE name = ?1", SOURCE_COLUMNS),
                params![name],
                source_from_row,
            )
            .optional()?;
        Ok(source)
    }

    fn list_sources(&self) -> StorageResult<Vec<SourceRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM sources ORDER BY id", SOURCE_COLUMNS))?;
        let sources = stmt
            .query_map([], source_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sources)
    }

    // ===== Run Management =====

    fn create_run(
        &mut self,
        source_id: i64,
        started_at: DateTime<Utc>,
    ) -> StorageResult<RunRecord> {
        self.conn.execute(
            "INSERT INTO scrape_runs (source_id, started_at, status) VALUES (?1, ?2, ?3)",
            params![source_id, started_at, RunStatus::Running.to_db_string()],
        )?;
        Ok(RunRecord::running(
            self.conn.last_insert_rowid(),
            source_id,
            started_at,
        ))
    }

    fn save_run(&mut self, run: &RunRecord) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE scrape_runs SET ended_at = ?1, status = ?2, error_message = ?3,
             created_items = ?4, changed_items = ?5 WHERE id = ?6",
            params![
                run.ended_at,
                run.status.to_db_string(),
                run.error_message,
                run.created_items,
                run.changed_items,
                run.id
            ],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run.id));
        }
        Ok(())
    }

    fn set_run_exports(
        &mut self,
        run_id: i64,
        csv_path: &str,
        json_path: &str,
        md_path: &str,
    ) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE scrape_runs SET export_csv_path = ?1, export_json_path = ?2,
             export_md_path = ?3 WHERE id = ?4",
            params![csv_path, json_path, md_path, run_id],
        )?;
        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM scrape_runs WHERE id = ?1", RUN_COLUMNS),
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn list_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM scrape_runs ORDER BY started_at DESC, id DESC LIMIT ?1",
            RUN_COLUMNS
        ))?;
        let runs = stmt
            .query_map(params![limit as i64], run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }

    // ===== Item Management =====

    fn find_item(&self, source_id: i64, url: &str) -> StorageResult<Option<ItemRecord>> {
        let item = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM items WHERE source_id = ?1 AND url = ?2",
                    ITEM_COLUMNS
                ),
                params![source_id, url],
                item_from_row,
            )
            .optional()?;
        Ok(item)
    }

    fn insert_item(
        &mut self,
        source_id: i64,
        url: &str,
        title: Option<&str>,
        seen_at: DateTime<Utc>,
    ) -> StorageResult<ItemRecord> {
        self.conn.execute(
            "INSERT INTO items (source_id, url, title, first_seen, last_seen)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![source_id, url, title, seen_at],
        )?;

        Ok(ItemRecord {
            id: self.conn.last_insert_rowid(),
            source_id,
            url: url.to_string(),
            title: title.map(str::to_string),
            first_seen: seen_at,
            last_seen: seen_at,
            latest_version_id: None,
        })
    }

    fn touch_item(
        &mut self,
        item_id: i64,
        seen_at: DateTime<Utc>,
        title: Option<&str>,
    ) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE items SET last_seen = ?1, title = COALESCE(title, ?2) WHERE id = ?3",
            params![seen_at, title, item_id],
        )?;
        if updated == 0 {
            return Err(StorageError::ItemNotFound(item_id));
        }
        Ok(())
    }

    fn set_latest_version(&mut self, item_id: i64, version_id: i64) -> StorageResult<()> {
        let updated = self.conn.execute(
            "UPDATE items SET latest_version_id = ?1 WHERE id = ?2",
            params![version_id, item_id],
        )?;
        if updated == 0 {
            return Err(StorageError::ItemNotFound(item_id));
        }
        Ok(())
    }

    fn get_item(&self, item_id: i64) -> StorageResult<ItemRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM items WHERE id = ?1", ITEM_COLUMNS),
                params![item_id],
                item_from_row,
            )
            .optional()?
            .ok_or(StorageError::ItemNotFound(item_id))
    }

    fn list_items(&self, source_id: i64) -> StorageResult<Vec<ItemRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM items WHERE source_id = ?1 ORDER BY id",
            ITEM_COLUMNS
        ))?;
        let items = stmt
            .query_map(params![source_id], item_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    // ===== Version History =====

    fn insert_version(&mut self, version: NewVersion<'_>) -> StorageResult<ItemVersionRecord> {
        self.conn.execute(
            "INSERT INTO item_versions (item_id, seen_at, content_text, content_hash, price_value)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                version.item_id,
                version.seen_at,
                version.content_text,
                version.content_hash,
                version.price_value
            ],
        )?;

        Ok(ItemVersionRecord {
            id: self.conn.last_insert_rowid(),
            item_id: version.item_id,
            seen_at: version.seen_at,
            content_text: version.content_text.map(str::to_string),
            content_hash: version.content_hash.map(str::to_string),
            price_value: version.price_value,
            snapshot_path: None,
        })
    }

    fn get_version(&self, version_id: i64) -> StorageResult<Option<ItemVersionRecord>> {
        let version = self
            .conn
            .query_row(
                &format!("SELECT {} FROM item_versions WHERE id = ?1", VERSION_COLUMNS),
                params![version_id],
                version_from_row,
            )
            .optional()?;
        Ok(version)
    }

    fn set_snapshot_path(&mut self, version_id: i64, path: &str) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE item_versions SET snapshot_path = ?1 WHERE id = ?2",
            params![path, version_id],
        )?;
        Ok(())
    }

    fn list_versions(&self, item_id: i64) -> StorageResult<Vec<ItemVersionRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM item_versions WHERE item_id = ?1 ORDER BY seen_at, id",
            VERSION_COLUMNS
        ))?;
        let versions = stmt
            .query_map(params![item_id], version_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(versions)
    }

    fn latest_version_for(&self, item_id: i64) -> StorageResult<Option<ItemVersionRecord>> {
        let version = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM item_versions WHERE item_id = ?1
                     ORDER BY seen_at DESC, id DESC LIMIT 1",
                    VERSION_COLUMNS
                ),
                params![item_id],
                version_from_row,
            )
            .optional()?;
        Ok(version)
    }
}
