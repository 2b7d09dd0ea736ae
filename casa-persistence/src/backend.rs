//! The storage contract every backend implements.

use casa_core::{Attributes, BackendKind, Entry};

use crate::error::PersistenceError;

/// Lookup options for [`Backend::fetch`].
///
/// Only the directory backend honours them; the others look up by key alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Search filter; `(objectClass=*)` when unset.
    pub filter: Option<String>,
    /// Attribute projection; empty means all attributes.
    pub attributes: Vec<String>,
}

impl FetchOptions {
    pub fn with_attributes<I, S>(attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FetchOptions {
            filter: None,
            attributes: attributes.into_iter().map(Into::into).collect(),
        }
    }
}

/// How [`Backend::update`] applies the given attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateMode {
    /// Overwrite each attribute with the given value.
    #[default]
    Replace,
    /// Remove each named attribute (or the given values of it).
    Delete,
}

/// Fetch, create and update a single record in one store technology.
///
/// Implementations never retry; transport failures surface to the caller.
/// Every mutation reports failure through its `Result`.
pub trait Backend {
    /// Which implementation this is.
    fn kind(&self) -> BackendKind;

    /// Look up the record stored under `key`. `Ok(None)` means no record.
    fn fetch(&mut self, key: &str, options: &FetchOptions)
        -> Result<Option<Entry>, PersistenceError>;

    /// Insert a new record. A duplicate key fails with
    /// [`PersistenceError::AlreadyExists`].
    fn create(&mut self, key: &str, attrs: &Attributes) -> Result<(), PersistenceError>;

    /// Modify attributes of the existing record `key`.
    fn update(
        &mut self,
        key: &str,
        attrs: &Attributes,
        mode: UpdateMode,
    ) -> Result<(), PersistenceError>;

    /// Release the connection. Called once after the reconcile pass.
    fn close(&mut self) -> Result<(), PersistenceError> {
        Ok(())
    }
}

impl<B: Backend + ?Sized> Backend for Box<B> {
    fn kind(&self) -> BackendKind {
        (**self).kind()
    }

    fn fetch(
        &mut self,
        key: &str,
        options: &FetchOptions,
    ) -> Result<Option<Entry>, PersistenceError> {
        (**self).fetch(key, options)
    }

    fn create(&mut self, key: &str, attrs: &Attributes) -> Result<(), PersistenceError> {
        (**self).create(key, attrs)
    }

    fn update(
        &mut self,
        key: &str,
        attrs: &Attributes,
        mode: UpdateMode,
    ) -> Result<(), PersistenceError> {
        (**self).update(key, attrs, mode)
    }

    fn close(&mut self) -> Result<(), PersistenceError> {
        (**self).close()
    }
}
