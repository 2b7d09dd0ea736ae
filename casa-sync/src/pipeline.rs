//! Bootstrap pipeline entrypoints used by the CLI.
//!
//! Each run renders the desired blob, opens the configured backend, runs one
//! pass and closes the backend again, also when the pass fails.

use serde_json::Value;

use casa_core::Settings;
use casa_persistence::{open_backend, Backend};
use casa_renderer::{Renderer, TemplateContext};

use crate::diff::unified_blob_diff;
use crate::reconcile::{BlobComparison, ConfigReconciler, ReconcileOutcome};
use crate::SyncError;

/// Render the desired casa blob for these settings.
pub fn desired_blob(settings: &Settings) -> Result<Value, SyncError> {
    let renderer = Renderer::for_settings(settings)?;
    let blob = renderer.render_blob(&TemplateContext::from_settings(settings))?;
    Ok(blob)
}

/// Reconcile the casa record in the configured backend.
pub fn run(settings: &Settings, dry_run: bool) -> Result<ReconcileOutcome, SyncError> {
    let desired = desired_blob(settings)?;
    let mut backend = open_backend(settings)?;
    let result = reconcile_with(&mut backend, &desired, dry_run);
    finish(&mut backend, result)
}

/// Reconcile against an already opened backend. The caller closes it.
pub fn reconcile_with<B: Backend + ?Sized>(
    backend: &mut B,
    desired: &Value,
    dry_run: bool,
) -> Result<ReconcileOutcome, SyncError> {
    ConfigReconciler::new(backend).reconcile(desired, dry_run)
}

/// Result of [`diff`].
#[derive(Debug, Clone, PartialEq)]
pub struct BlobDiff {
    pub key: String,
    /// `None` when the record is absent and would be created.
    pub unified_diff: Option<String>,
    pub comparison: BlobComparison,
}

impl BlobDiff {
    pub fn is_clean(&self) -> bool {
        self.comparison.stored.is_some() && self.comparison.drift.is_empty()
    }
}

/// Compare the stored blob with what `run` would leave behind. No writes.
pub fn diff(settings: &Settings) -> Result<BlobDiff, SyncError> {
    let desired = desired_blob(settings)?;
    let mut backend = open_backend(settings)?;
    let result = diff_with(&mut backend, &desired);
    finish(&mut backend, result)
}

pub fn diff_with<B: Backend + ?Sized>(
    backend: &mut B,
    desired: &Value,
) -> Result<BlobDiff, SyncError> {
    let comparison = ConfigReconciler::new(backend).compare(desired)?;
    let unified_diff = match &comparison.stored {
        Some(stored) if !comparison.drift.is_empty() => Some(unified_blob_diff(
            &format!("a/{}", comparison.key),
            stored,
            &format!("b/{}", comparison.key),
            &comparison.patched,
        )),
        _ => None,
    };
    Ok(BlobDiff {
        key: comparison.key.clone(),
        unified_diff,
        comparison,
    })
}

/// Close the backend; a pass failure wins over a close failure.
fn finish<B: Backend + ?Sized, T>(
    backend: &mut B,
    result: Result<T, SyncError>,
) -> Result<T, SyncError> {
    let closed = backend.close();
    match (result, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(err)) => Err(err.into()),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(close_err)) => {
            tracing::warn!(error = %close_err, "closing backend failed after error");
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casa_core::BackendKind;
    use casa_persistence::MemoryBackend;
    use serde_json::json;

    #[test]
    fn finish_closes_backend_on_error() {
        let mut backend = MemoryBackend::new(BackendKind::Ldap);
        let result: Result<(), SyncError> = Err(SyncError::MalformedStoredBlob {
            reason: "x".into(),
        });
        assert!(finish(&mut backend, result).is_err());
        assert!(backend.is_closed());
    }

    #[test]
    fn diff_on_empty_backend_has_no_text() {
        let mut backend = MemoryBackend::new(BackendKind::Couchbase);
        let desired = json!({"oxd_config": {"host": "h", "port": 1}});
        let diff = diff_with(&mut backend, &desired).unwrap();
        assert_eq!(diff.key, "configuration_casa");
        assert!(diff.unified_diff.is_none());
        assert!(!diff.is_clean());
    }
}
