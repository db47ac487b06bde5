//! Read-side exports of a source's items
//!
//! This module projects the current item set of a source into CSV, JSON
//! and Markdown artifacts after each run:
//! - Rows are built with explicit queries for each item's latest version
//! - Files land in `<exports-dir>/source_<id>/items_<YYYYmmdd_HHMMSS>.<ext>`
//! - The written paths are recorded on the run

mod csv;
mod json;
mod markdown;

pub use self::csv::render_csv;
pub use self::json::render_json;
pub use self::markdown::render_markdown;

use crate::storage::{RunRecord, Storage, StorageError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during export
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("IO error writing {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One exported item
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRow {
    pub item_id: i64,
    pub source_id: i64,
    pub title: Option<String>,
    pub url: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub latest_version_hash: Option<String>,
    pub price_value: Option<f64>,
}

/// Files produced by one export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    pub csv: PathBuf,
    pub json: PathBuf,
    pub markdown: PathBuf,
}

/// Builds the export rows for a source, ordered by item ID
pub fn collect_rows<S: Storage>(storage: &S, source_id: i64) -> Result<Vec<ExportRow>, ExportError> {
    let items = storage.list_items(source_id)?;
    let mut rows = Vec::with_capacity(items.len());

    for item in items {
        let latest = storage.latest_version_for(item.id)?;
        rows.push(ExportRow {
            item_id: item.id,
            source_id: item.source_id,
            title: item.title,
            url: item.url,
            first_seen: item.first_seen,
            last_seen: item.last_seen,
            latest_version_hash: latest.as_ref().and_then(|v| v.content_hash.clone()),
            price_value: latest.and_then(|v| v.price_value),
        });
    }

    Ok(rows)
}

/// Exports the run's source and records the artifact paths on the run
///
/// # Arguments
///
/// * `storage` - Store to read items from and to record paths in
/// * `exports_dir` - Root directory for exports
/// * `run` - The finished run; its export paths are filled in on success
pub fn export_run<S: Storage>(
    storage: &mut S,
    exports_dir: &Path,
    run: &mut RunRecord,
) -> Result<ExportPaths, ExportError> {
    let rows = collect_rows(storage, run.source_id)?;

    let dir = exports_dir.join(format!("source_{}", run.source_id));
    let stamp = run
        .ended_at
        .unwrap_or(run.started_at)
        .format("%Y%m%d_%H%M%S");
    let paths = ExportPaths {
        csv: dir.join(format!("items_{}.csv", stamp)),
        json: dir.join(format!("items_{}.json", stamp)),
        markdown: dir.join(format!("items_{}.md", stamp)),
    };

    fs::create_dir_all(&dir).map_err(|source| ExportError::Io {
        path: dir.clone(),
        source,
    })?;
    write_file(&paths.csv, &render_csv(&rows))?;
    write_file(&paths.json, &render_json(&rows)?)?;
    write_file(&paths.markdown, &render_markdown(run.source_id, &rows))?;

    let csv = paths.csv.to_string_lossy().into_owned();
    let json = paths.json.to_string_lossy().into_owned();
    let markdown = paths.markdown.to_string_lossy().into_owned();
    storage.set_run_exports(run.id, &csv, &json, &markdown)?;

    run.export_csv_path = Some(csv);
    run.export_json_path = Some(json);
    run.export_md_path = Some(markdown);

    tracing::debug!(run_id = run.id, "Exported {} items to {}", rows.len(), dir.display());
    Ok(paths)
}

fn write_file(path: &Path, contents: &str) -> Result<(), ExportError> {
    fs::write(path, contents).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })
}
