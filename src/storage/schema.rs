//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Driftwatch database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Configured origins, keyed by name
CREATE TABLE IF NOT EXISTS sources (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    url TEXT NOT NULL,
    category TEXT NOT NULL,
    list_selector TEXT,
    title_selector TEXT,
    link_selector TEXT,
    content_selector TEXT,
    price_selector TEXT,
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
);

-- One row per observed item
CREATE TABLE IF NOT EXISTS items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id INTEGER NOT NULL REFERENCES sources(id),
    url TEXT NOT NULL,
    title TEXT,
    first_seen TEXT NOT NULL,
    last_seen TEXT NOT NULL,
    latest_version_id INTEGER REFERENCES item_versions(id),
    UNIQUE(source_id, url)
);

CREATE INDEX IF NOT EXISTS idx_items_source ON items(source_id);

-- Append-only content history
CREATE TABLE IF NOT EXISTS item_versions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    item_id INTEGER NOT NULL REFERENCES items(id),
    seen_at TEXT NOT NULL,
    content_text TEXT,
    content_hash TEXT,
    price_value REAL,
    snapshot_path TEXT
);

CREATE INDEX IF NOT EXISTS idx_item_versions_item ON item_versions(item_id, seen_at);

-- One row per pipeline execution
CREATE TABLE IF NOT EXISTS scrape_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id INTEGER NOT NULL REFERENCES sources(id),
    started_at TEXT NOT NULL,
    ended_at TEXT,
    status TEXT NOT NULL,
    error_message TEXT,
    created_items INTEGER NOT NULL DEFAULT 0,
    changed_items INTEGER NOT NULL DEFAULT 0,
    export_csv_path TEXT,
    export_json_path TEXT,
    export_md_path TEXT
);

CREATE INDEX IF NOT EXISTS idx_scrape_runs_source ON scrape_runs(source_id);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
