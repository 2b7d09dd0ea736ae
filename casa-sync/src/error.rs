//! Error types for casa-sync.

use thiserror::Error;

use casa_core::ConfigError;
use casa_persistence::PersistenceError;
use casa_renderer::RenderError;

/// All errors that can arise from a reconcile pass.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The desired blob could not be rendered.
    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// A backend call failed, including rejected mutations.
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// The stored record has no blob attribute.
    #[error("entry {key} has no {attribute} attribute")]
    MissingBlob {
        key: String,
        attribute: &'static str,
    },

    /// The stored blob is not a JSON object.
    #[error("stored configuration blob is malformed: {reason}")]
    MalformedStoredBlob { reason: String },
}
