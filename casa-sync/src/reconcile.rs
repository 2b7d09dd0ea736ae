//! Create-or-patch reconciliation of the casa configuration record.
//!
//! ## Algorithm
//!
//! 1. Fetch the record under the family's fixed key.
//! 2. Absent: create it with the full desired blob and revision 1.
//! 3. Present: decode the stored blob and compare `oxd_config.host` and
//!    `oxd_config.port` only.
//! 4. No drift: no write.
//! 5. Drift: patch those two leaves in the stored blob and replace the blob
//!    attribute alone.
//!
//! A create rejected as a duplicate (another instance won the race) is
//! followed by one re-fetch and the patch path.

use serde_json::Value;

use casa_core::{Attributes, BackendFamily, Entry};
use casa_persistence::{Backend, FetchOptions, PersistenceError, UpdateMode};

use crate::codec::BlobCodec;
use crate::diff::{apply_drift, watched_drift, FieldDrift};
use crate::error::SyncError;
use crate::layout::{seed_attributes, storage_key, BLOB_ATTRIBUTE};

/// What a reconcile pass did (or, in dry-run mode, would do).
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// The record was absent and has been created.
    Created { key: String },
    /// Dry run: the record is absent.
    WouldCreate { key: String },
    /// The blob attribute was rewritten.
    Patched { key: String, drift: Vec<FieldDrift> },
    /// Dry run: the watched fields have drifted.
    WouldPatch { key: String, drift: Vec<FieldDrift> },
    /// Watched fields match; nothing was written.
    Unchanged { key: String },
}

impl ReconcileOutcome {
    pub fn key(&self) -> &str {
        match self {
            ReconcileOutcome::Created { key }
            | ReconcileOutcome::WouldCreate { key }
            | ReconcileOutcome::Patched { key, .. }
            | ReconcileOutcome::WouldPatch { key, .. }
            | ReconcileOutcome::Unchanged { key } => key,
        }
    }

    /// True when a write was issued.
    pub fn wrote(&self) -> bool {
        matches!(
            self,
            ReconcileOutcome::Created { .. } | ReconcileOutcome::Patched { .. }
        )
    }
}

/// The stored blob next to the blob it would be patched into.
#[derive(Debug, Clone, PartialEq)]
pub struct BlobComparison {
    pub key: String,
    /// `None` when no record exists yet.
    pub stored: Option<Value>,
    /// Stored blob with the watched fields patched, or the desired blob if
    /// nothing is stored.
    pub patched: Value,
    pub drift: Vec<FieldDrift>,
}

/// Drives one reconcile pass against a borrowed backend handle.
pub struct ConfigReconciler<'a, B: Backend + ?Sized> {
    backend: &'a mut B,
    family: BackendFamily,
    codec: BlobCodec,
    key: &'static str,
}

impl<'a, B: Backend + ?Sized> ConfigReconciler<'a, B> {
    pub fn new(backend: &'a mut B) -> Self {
        let family = backend.kind().family();
        ConfigReconciler {
            backend,
            family,
            codec: BlobCodec::for_family(family),
            key: storage_key(family),
        }
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    /// Reconcile the stored record against `desired`.
    pub fn reconcile(
        &mut self,
        desired: &Value,
        dry_run: bool,
    ) -> Result<ReconcileOutcome, SyncError> {
        let Some(entry) = self.fetch()? else {
            if dry_run {
                tracing::info!(key = self.key, "casa config absent; would create");
                return Ok(ReconcileOutcome::WouldCreate {
                    key: self.key.to_owned(),
                });
            }
            match self.create(desired) {
                Ok(outcome) => return Ok(outcome),
                Err(SyncError::Persistence(PersistenceError::AlreadyExists { .. })) => {
                    tracing::warn!(
                        key = self.key,
                        "casa config created concurrently; re-fetching"
                    );
                }
                Err(err) => return Err(err),
            }
            let entry = self.fetch()?.ok_or_else(|| {
                SyncError::Persistence(PersistenceError::Rejected {
                    backend: self.backend.kind(),
                    key: self.key.to_owned(),
                    status: "entry reported as existing but not found".to_owned(),
                })
            })?;
            return self.patch(entry, desired, dry_run);
        };
        self.patch(entry, desired, dry_run)
    }

    /// Compare without writing.
    pub fn compare(&mut self, desired: &Value) -> Result<BlobComparison, SyncError> {
        let Some(entry) = self.fetch()? else {
            return Ok(BlobComparison {
                key: self.key.to_owned(),
                stored: None,
                patched: desired.clone(),
                drift: Vec::new(),
            });
        };
        let stored = self.stored_blob(&entry)?;
        let drift = watched_drift(desired, &stored);
        let mut patched = stored.clone();
        apply_drift(&mut patched, &drift);
        Ok(BlobComparison {
            key: entry.id().to_owned(),
            stored: Some(stored),
            patched,
            drift,
        })
    }

    fn fetch(&mut self) -> Result<Option<Entry>, SyncError> {
        let entry = self.backend.fetch(self.key, &FetchOptions::default())?;
        Ok(entry)
    }

    fn create(&mut self, desired: &Value) -> Result<ReconcileOutcome, SyncError> {
        let attrs = seed_attributes(self.family, self.codec.encode(desired));
        self.backend.create(self.key, &attrs)?;
        tracing::info!(
            backend = %self.backend.kind(),
            key = self.key,
            "created casa config"
        );
        Ok(ReconcileOutcome::Created {
            key: self.key.to_owned(),
        })
    }

    fn stored_blob(&self, entry: &Entry) -> Result<Value, SyncError> {
        let raw = entry.get(BLOB_ATTRIBUTE).ok_or_else(|| SyncError::MissingBlob {
            key: entry.id().to_owned(),
            attribute: BLOB_ATTRIBUTE,
        })?;
        let blob = self.codec.decode(raw)?;
        if !blob.is_object() {
            return Err(SyncError::MalformedStoredBlob {
                reason: "not a JSON object".to_owned(),
            });
        }
        Ok(blob)
    }

    fn patch(
        &mut self,
        entry: Entry,
        desired: &Value,
        dry_run: bool,
    ) -> Result<ReconcileOutcome, SyncError> {
        let mut stored = self.stored_blob(&entry)?;
        let key = entry.id().to_owned();

        let drift = watched_drift(desired, &stored);
        if drift.is_empty() {
            tracing::info!(key = %key, "casa config up to date");
            return Ok(ReconcileOutcome::Unchanged { key });
        }
        for d in &drift {
            tracing::info!(
                key = %key,
                field = %d.path(),
                stored = ?d.stored,
                desired = %d.desired,
                "watched field drifted"
            );
        }
        if dry_run {
            return Ok(ReconcileOutcome::WouldPatch { key, drift });
        }

        apply_drift(&mut stored, &drift);
        let mut attrs = Attributes::new();
        attrs.insert(BLOB_ATTRIBUTE.to_owned(), self.codec.encode(&stored));
        self.backend.update(&key, &attrs, UpdateMode::Replace)?;
        tracing::info!(
            backend = %self.backend.kind(),
            key = %key,
            fields = drift.len(),
            "patched casa config"
        );
        Ok(ReconcileOutcome::Patched { key, drift })
    }
}
