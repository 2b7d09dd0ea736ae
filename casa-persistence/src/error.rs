//! Error types for casa-persistence.

use thiserror::Error;

use casa_core::{BackendKind, ConfigError};

/// All errors that can arise from backend operations.
///
/// "No record" is not an error: `fetch` returns `Ok(None)` for it.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// LDAP transport or protocol failure.
    #[error("LDAP error: {0}")]
    Ldap(#[from] ldap3::LdapError),

    /// HTTP transport failure or unexpected status (Couchbase, Spanner).
    #[error("HTTP error calling {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: Box<ureq::Error>,
    },

    /// SQL driver failure.
    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    /// Failure building the blocking runtime for the SQL driver.
    #[error("runtime error: {0}")]
    Runtime(#[source] std::io::Error),

    /// The store answered a mutation with a non-success status.
    #[error("{backend} rejected write to {key}: {status}")]
    Rejected {
        backend: BackendKind,
        key: String,
        status: String,
    },

    /// A create hit an existing record with the same key.
    #[error("{backend} entry {key} already exists")]
    AlreadyExists { backend: BackendKind, key: String },

    /// A response could not be interpreted.
    #[error("cannot decode {backend} response: {reason}")]
    Decode {
        backend: BackendKind,
        reason: String,
    },

    /// Credentials could not be loaded.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

pub(crate) fn http_err(url: impl Into<String>, source: ureq::Error) -> PersistenceError {
    PersistenceError::Http {
        url: url.into(),
        source: Box::new(source),
    }
}

pub(crate) fn decode_err(backend: BackendKind, reason: impl Into<String>) -> PersistenceError {
    PersistenceError::Decode {
        backend,
        reason: reason.into(),
    }
}
