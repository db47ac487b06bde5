//! Run orchestration
//!
//! This module contains the per-source run logic, including:
//! - Opening and persisting the run record before any work starts
//! - Fetching the listing page and mapping failures to run status
//! - Extracting and reconciling candidates in page order
//! - Exporting and announcing each finished run
//! - Fanning runs out to one worker per source

use crate::config::{Config, OutputConfig};
use crate::export;
use crate::extract::extract;
use crate::fetch::{FetchError, Fetcher};
use crate::notify::{self, Notifier};
use crate::reconcile::{Reconciler, Tally};
use crate::snapshot::SnapshotWriter;
use crate::storage::{
    RunRecord, RunStatus, SourceRecord, SqliteStorage, Storage, StorageError,
};
use crate::DriftError;
use chrono::Utc;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;
use url::Url;

/// Why a run ended in the error state; the message is stored on the run
#[derive(Debug, Error)]
enum RunFailure {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("HTTP {0}")]
    HttpStatus(u16),

    #[error("Invalid source URL {url}: {source}")]
    SourceUrl { url: String, source: url::ParseError },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Run panicked: {0}")]
    Panicked(String),
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Executes runs for sources against one store connection
pub struct RunController<S: Storage> {
    storage: S,
    fetcher: Fetcher,
    snapshots: SnapshotWriter,
}

impl<S: Storage> RunController<S> {
    pub fn new(storage: S, fetcher: Fetcher, snapshots: SnapshotWriter) -> Self {
        Self {
            storage,
            fetcher,
            snapshots,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    /// Runs the pipeline once for `source`
    ///
    /// The run is persisted as `running` before the fetch and always ends
    /// `success` or `error` with `ended_at` set. Failures never escape, panics
    /// included; they are recorded on the returned run. Persisting the final
    /// state is retried once. If the run cannot even be opened, an
    /// unpersisted run with ID 0 and status `error` is returned.
    pub async fn run(&mut self, source: &SourceRecord) -> RunRecord {
        let started_at = Utc::now();

        let mut run = match self.storage.create_run(source.id, started_at) {
            Ok(run) => run,
            Err(e) => {
                tracing::error!(source = %source.name, "Could not open run: {}", e);
                let mut run = RunRecord::running(0, source.id, started_at);
                run.finish(RunStatus::Error, Some(format!("Could not open run: {}", e)));
                return run;
            }
        };

        tracing::info!(source = %source.name, run_id = run.id, "Run started");

        let mut tally = Tally::default();
        let result = AssertUnwindSafe(self.execute(source, &mut tally))
            .catch_unwind()
            .await;
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(payload) => {
                // A panic inside a candidate's transaction leaves it open
                if let Err(e) = self.storage.rollback() {
                    tracing::debug!(run_id = run.id, "Nothing to roll back: {}", e);
                }
                Err(RunFailure::Panicked(panic_message(payload.as_ref())))
            }
        };

        run.created_items = tally.created;
        run.changed_items = tally.changed;
        match outcome {
            Ok(()) => run.finish(RunStatus::Success, None),
            Err(failure) => {
                tracing::warn!(source = %source.name, run_id = run.id, "Run failed: {}", failure);
                run.finish(RunStatus::Error, Some(failure.to_string()));
            }
        }

        if let Err(first) = self.storage.save_run(&run) {
            tracing::warn!(run_id = run.id, "Retrying run persist: {}", first);
            if let Err(e) = self.storage.save_run(&run) {
                tracing::error!(
                    run_id = run.id,
                    status = %run.status,
                    "Failed to persist run state; stored run is still running: {}",
                    e
                );
            }
        }

        tracing::info!(
            source = %source.name,
            run_id = run.id,
            status = %run.status,
            created = run.created_items,
            changed = run.changed_items,
            unchanged = tally.unchanged,
            "Run finished"
        );

        run
    }

    async fn execute(
        &mut self,
        source: &SourceRecord,
        tally: &mut Tally,
    ) -> Result<(), RunFailure> {
        let base_url = Url::parse(&source.url).map_err(|e| RunFailure::SourceUrl {
            url: source.url.clone(),
            source: e,
        })?;

        let response = self.fetcher.fetch(&source.url).await?;
        if response.is_error_status() {
            return Err(RunFailure::HttpStatus(response.status_code));
        }

        let candidates = extract(&source.selectors, &base_url, &response.body);
        tracing::debug!(
            source = %source.name,
            "Extracted {} candidates",
            candidates.len()
        );

        let mut reconciler = Reconciler::new(&mut self.storage, &self.snapshots, source.id);
        for candidate in &candidates {
            let outcome = reconciler.reconcile(candidate, Utc::now())?;
            tally.record(&outcome);
        }

        Ok(())
    }
}

/// Runs `source`, then exports and announces the result
///
/// Export failures are logged and leave the run's export paths unset.
pub async fn run_and_report<S: Storage>(
    controller: &mut RunController<S>,
    notifier: &dyn Notifier,
    exports_dir: &Path,
    source: &SourceRecord,
) -> RunRecord {
    let mut run = controller.run(source).await;

    if run.id != 0 {
        if let Err(e) = export::export_run(controller.storage_mut(), exports_dir, &mut run) {
            tracing::warn!(source = %source.name, run_id = run.id, "Export failed: {}", e);
        }
    }

    notify::announce(notifier, &source.name, &run).await;
    run
}

/// Upserts the configured sources by name and picks the ones to run
///
/// With `only` set, just that source is picked; naming an inactive or
/// unconfigured source is an error. Sources dropped from the config stay in
/// the store.
pub fn sync_sources<S: Storage>(
    storage: &mut S,
    config: &Config,
    only: Option<&str>,
) -> Result<Vec<SourceRecord>, DriftError> {
    let mut selected = Vec::new();

    for source_config in &config.sources {
        let record = storage.upsert_source(source_config)?;
        tracing::debug!(source = %record.name, source_id = record.id, "Source synced");

        match only {
            Some(name) if name != record.name => {}
            Some(_) if !record.active => return Err(DriftError::InactiveSource(record.name)),
            _ if record.active => selected.push(record),
            _ => tracing::debug!(source = %record.name, "Skipping inactive source"),
        }
    }

    if let Some(name) = only {
        if selected.is_empty() {
            return Err(DriftError::UnknownSource(name.to_string()));
        }
    }

    Ok(selected)
}

/// What every worker shares
#[derive(Clone)]
pub struct WorkerContext {
    pub database_path: PathBuf,
    pub snapshots_dir: PathBuf,
    pub exports_dir: PathBuf,
    pub fetcher: Fetcher,
    pub notifier: Arc<dyn Notifier>,
}

impl WorkerContext {
    pub fn new(output: &OutputConfig, fetcher: Fetcher, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            database_path: PathBuf::from(&output.database_path),
            snapshots_dir: PathBuf::from(&output.snapshots_dir),
            exports_dir: PathBuf::from(&output.exports_dir),
            fetcher,
            notifier,
        }
    }

    /// Runs one source on a fresh store connection
    pub async fn run_source(&self, source: &SourceRecord) -> RunRecord {
        let storage = match SqliteStorage::new(&self.database_path) {
            Ok(storage) => storage,
            Err(e) => {
                tracing::error!(source = %source.name, "Could not open store: {}", e);
                let mut run = RunRecord::running(0, source.id, Utc::now());
                run.finish(RunStatus::Error, Some(format!("Could not open store: {}", e)));
                notify::announce(self.notifier.as_ref(), &source.name, &run).await;
                return run;
            }
        };

        let mut controller = RunController::new(
            storage,
            self.fetcher.clone(),
            SnapshotWriter::new(&self.snapshots_dir),
        );
        run_and_report(
            &mut controller,
            self.notifier.as_ref(),
            &self.exports_dir,
            source,
        )
        .await
    }
}

/// Runs every source on its own task and waits for all of them
///
/// Results come back in completion order, paired with the source they ran.
pub async fn run_all(
    context: &WorkerContext,
    sources: Vec<SourceRecord>,
) -> Vec<(SourceRecord, RunRecord)> {
    let mut workers = JoinSet::new();
    for source in sources {
        let context = context.clone();
        workers.spawn(async move {
            let run = context.run_source(&source).await;
            (source, run)
        });
    }

    let mut finished = Vec::with_capacity(workers.len());
    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok(result) => finished.push(result),
            Err(e) => tracing::error!("Run worker panicked: {}", e),
        }
    }
    finished
}
