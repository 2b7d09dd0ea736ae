//! Relational backend shared by the SQL and Spanner stores.
//!
//! The record is a row of `oxApplicationConfiguration` keyed by `doc_id`.
//! Both targets run the same logic; only the [`RowStore`] differs.

pub mod spanner;
pub mod sql;

use serde_json::Value;

use casa_core::{AttrValue, Attributes, BackendKind, Entry};

use crate::backend::{Backend, FetchOptions, UpdateMode};
use crate::error::PersistenceError;

pub use spanner::SpannerStore;
pub use sql::SqlStore;

/// Table holding application configuration rows.
pub const TABLE: &str = "oxApplicationConfiguration";
/// Primary key column.
pub const ID_COLUMN: &str = "doc_id";

/// Row-level access to one table.
pub trait RowStore {
    /// Row with primary key `id` as column → value, or `None`.
    fn get(&mut self, table: &str, id: &str) -> Result<Option<Attributes>, PersistenceError>;

    /// Insert a row; `row` includes the primary key column.
    fn insert(&mut self, table: &str, row: &Attributes) -> Result<(), PersistenceError>;

    /// Update columns of the row `id`; returns the number of rows touched.
    fn update(
        &mut self,
        table: &str,
        id: &str,
        values: &Attributes,
    ) -> Result<u64, PersistenceError>;

    fn close(&mut self) -> Result<(), PersistenceError> {
        Ok(())
    }
}

/// Relational backend over any [`RowStore`].
pub struct RelationalBackend<S> {
    store: S,
    kind: BackendKind,
}

impl<S: RowStore> RelationalBackend<S> {
    pub fn new(store: S, kind: BackendKind) -> Self {
        RelationalBackend { store, kind }
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }
}

impl<S: RowStore> Backend for RelationalBackend<S> {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn fetch(
        &mut self,
        key: &str,
        _options: &FetchOptions,
    ) -> Result<Option<Entry>, PersistenceError> {
        let Some(mut row) = self.store.get(TABLE, key)? else {
            return Ok(None);
        };
        let id = row
            .remove(ID_COLUMN)
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_else(|| key.to_owned());
        Ok(Some(Entry::new(id, row)))
    }

    fn create(&mut self, key: &str, attrs: &Attributes) -> Result<(), PersistenceError> {
        let mut row = attrs.clone();
        row.entry(ID_COLUMN.to_owned())
            .or_insert_with(|| AttrValue::from(key));
        self.store.insert(TABLE, &row)?;
        tracing::debug!(backend = %self.kind, doc_id = key, "inserted row");
        Ok(())
    }

    fn update(
        &mut self,
        key: &str,
        attrs: &Attributes,
        mode: UpdateMode,
    ) -> Result<(), PersistenceError> {
        let values = match mode {
            UpdateMode::Replace => attrs.clone(),
            UpdateMode::Delete => attrs
                .keys()
                .map(|name| (name.clone(), AttrValue::Scalar(Value::Null)))
                .collect(),
        };
        let touched = self.store.update(TABLE, key, &values)?;
        if touched == 0 {
            return Err(PersistenceError::Rejected {
                backend: self.kind,
                key: key.to_owned(),
                status: "no row updated".to_owned(),
            });
        }
        tracing::debug!(backend = %self.kind, doc_id = key, ?mode, "updated row");
        Ok(())
    }

    fn close(&mut self) -> Result<(), PersistenceError> {
        self.store.close()
    }
}
