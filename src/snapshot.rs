//! Durable per-version JSON snapshots
//!
//! Each version is written once to
//! `<snapshots-dir>/item_<item_id>/v_<version_id>_<YYYYmmdd_HHMMSS>.json`.

use crate::storage::ItemVersionRecord;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while writing a snapshot
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error writing {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The snapshot artifact format
#[derive(Debug, Serialize)]
struct SnapshotPayload<'a> {
    item_id: i64,
    seen_at: DateTime<Utc>,
    content_text: Option<&'a str>,
    content_hash: Option<&'a str>,
    price_value: Option<f64>,
}

/// Writes version snapshots below a root directory
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    root: PathBuf,
}

impl SnapshotWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path a version's snapshot is written to
    pub fn path_for(&self, version: &ItemVersionRecord) -> PathBuf {
        self.root
            .join(format!("item_{}", version.item_id))
            .join(format!(
                "v_{}_{}.json",
                version.id,
                version.seen_at.format("%Y%m%d_%H%M%S")
            ))
    }

    /// Serializes the version and returns the snapshot's path
    pub fn write(&self, version: &ItemVersionRecord) -> Result<PathBuf, SnapshotError> {
        let path = self.path_for(version);
        let payload = SnapshotPayload {
            item_id: version.item_id,
            seen_at: version.seen_at,
            content_text: version.content_text.as_deref(),
            content_hash: version.content_hash.as_deref(),
            price_value: version.price_value,
        };
        let json = serde_json::to_string_pretty(&payload)?;

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|source| SnapshotError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        fs::write(&path, json).map_err(|source| SnapshotError::Io {
            path: path.clone(),
            source,
        })?;

        Ok(path)
    }
}
