//! Error types for casa-renderer.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while producing the desired configuration blob.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Tera template engine error (syntax error, undefined placeholder).
    #[error("template engine error: {0}")]
    Tera(#[from] tera::Error),

    /// Filesystem error while loading a template override.
    #[error("template io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The substituted template is not valid JSON.
    #[error("rendered template is not valid JSON: {0}")]
    MalformedTemplate(#[from] serde_json::Error),

    /// The rendered document lacks a field the reconciler depends on.
    #[error("rendered template is missing required field {0}")]
    MissingField(&'static str),
}
