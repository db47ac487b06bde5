//! Candidate reconciliation
//!
//! Folds each candidate from a listing page into the store:
//! - Unseen URLs become new items with a first version
//! - Seen items whose fingerprint moved get a new version
//! - Seen, unchanged items only have last_seen advanced
//!
//! Every candidate is applied in its own write transaction before the next
//! one is looked at. Snapshots are written after the commit and a failed
//! snapshot only leaves the version without a reference.

use crate::extract::CandidateItem;
use crate::fingerprint::{changed, fingerprint};
use crate::snapshot::SnapshotWriter;
use crate::storage::{ItemVersionRecord, NewVersion, Storage, StorageResult};
use chrono::{DateTime, Utc};

/// What reconciling one candidate did to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created { item_id: i64, version_id: i64 },
    Changed { item_id: i64, version_id: i64 },
    Unchanged { item_id: i64 },
}

impl Outcome {
    pub fn item_id(&self) -> i64 {
        match self {
            Self::Created { item_id, .. }
            | Self::Changed { item_id, .. }
            | Self::Unchanged { item_id } => *item_id,
        }
    }
}

/// Running created/changed counts for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub created: u32,
    pub changed: u32,
    pub unchanged: u32,
}

impl Tally {
    pub fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Created { .. } => self.created += 1,
            Outcome::Changed { .. } => self.changed += 1,
            Outcome::Unchanged { .. } => self.unchanged += 1,
        }
    }
}

/// Applies candidates for one source to a store
pub struct Reconciler<'a, S: Storage> {
    storage: &'a mut S,
    snapshots: &'a SnapshotWriter,
    source_id: i64,
}

impl<'a, S: Storage> Reconciler<'a, S> {
    pub fn new(storage: &'a mut S, snapshots: &'a SnapshotWriter, source_id: i64) -> Self {
        Self {
            storage,
            snapshots,
            source_id,
        }
    }

    /// Reconciles one candidate observed at `now`
    ///
    /// # Returns
    ///
    /// * `Ok(Outcome)` - The candidate's effect, committed
    /// * `Err(StorageError)` - The store failed; the candidate's changes were rolled back
    pub fn reconcile(
        &mut self,
        candidate: &CandidateItem,
        now: DateTime<Utc>,
    ) -> StorageResult<Outcome> {
        let new_hash = fingerprint(Some(candidate.fingerprint_basis()));
        let source_id = self.source_id;

        let (outcome, version) = self.storage.transaction(|store| {
            apply(store, source_id, candidate, new_hash.as_deref(), now)
        })?;

        match &outcome {
            Outcome::Created { item_id, .. } => {
                tracing::debug!(item_id, url = %candidate.url, "Created item")
            }
            Outcome::Changed { item_id, .. } => {
                tracing::debug!(item_id, url = %candidate.url, "Content changed")
            }
            Outcome::Unchanged { item_id } => {
                tracing::trace!(item_id, url = %candidate.url, "Unchanged")
            }
        }

        if let Some(version) = version {
            self.attach_snapshot(&version);
        }

        Ok(outcome)
    }

    /// Writes the version's snapshot and records its path
    ///
    /// The version is already committed, so any failure here only leaves it
    /// without a snapshot reference.
    fn attach_snapshot(&mut self, version: &ItemVersionRecord) {
        let path = match self.snapshots.write(version) {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!(
                    item_id = version.item_id,
                    version_id = version.id,
                    "Snapshot not written: {}",
                    e
                );
                return;
            }
        };

        if let Err(e) = self
            .storage
            .set_snapshot_path(version.id, &path.to_string_lossy())
        {
            tracing::warn!(
                item_id = version.item_id,
                version_id = version.id,
                "Snapshot {} written but not recorded: {}",
                path.display(),
                e
            );
        }
    }
}

/// The read-modify-write for one candidate; runs inside a transaction
///
/// A missing title is only backfilled on the unchanged path; a changed item
/// keeps whatever title it had.
fn apply<S: Storage>(
    store: &mut S,
    source_id: i64,
    candidate: &CandidateItem,
    new_hash: Option<&str>,
    now: DateTime<Utc>,
) -> StorageResult<(Outcome, Option<ItemVersionRecord>)> {
    let title = candidate.title.as_deref();

    let Some(item) = store.find_item(source_id, &candidate.url)? else {
        let item = store.insert_item(source_id, &candidate.url, title, now)?;
        let version = store.insert_version(new_version(item.id, candidate, new_hash, now))?;
        store.set_latest_version(item.id, version.id)?;
        let outcome = Outcome::Created {
            item_id: item.id,
            version_id: version.id,
        };
        return Ok((outcome, Some(version)));
    };

    let latest = match item.latest_version_id {
        Some(version_id) => store.get_version(version_id)?,
        None => None,
    };

    // A missing latest version counts as changed, even if older rows exist
    let is_changed = match &latest {
        Some(latest) => changed(latest.content_hash.as_deref(), new_hash),
        None => true,
    };

    if !is_changed {
        store.touch_item(item.id, now, title)?;
        return Ok((Outcome::Unchanged { item_id: item.id }, None));
    }

    store.touch_item(item.id, now, None)?;
    let version = store.insert_version(new_version(item.id, candidate, new_hash, now))?;
    store.set_latest_version(item.id, version.id)?;
    let outcome = Outcome::Changed {
        item_id: item.id,
        version_id: version.id,
    };
    Ok((outcome, Some(version)))
}

fn new_version<'c>(
    item_id: i64,
    candidate: &'c CandidateItem,
    content_hash: Option<&'c str>,
    seen_at: DateTime<Utc>,
) -> NewVersion<'c> {
    NewVersion {
        item_id,
        seen_at,
        content_text: candidate.body_text.as_deref(),
        content_hash,
        price_value: candidate.price,
    }
}
