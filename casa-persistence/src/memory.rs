//! In-process backend that records every write.

use std::collections::BTreeMap;

use casa_core::{Attributes, BackendKind, Entry};

use crate::backend::{Backend, FetchOptions, UpdateMode};
use crate::error::PersistenceError;

/// A mutation accepted by [`MemoryBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Create { key: String, attrs: Attributes },
    Update {
        key: String,
        attrs: Attributes,
        mode: UpdateMode,
    },
}

/// Map-backed store posing as any [`BackendKind`].
///
/// Keeps the family semantics that matter to callers: duplicate creates and
/// updates of missing keys fail, and the attribute projection is honoured.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    kind: BackendKind,
    entries: BTreeMap<String, Attributes>,
    writes: Vec<WriteOp>,
    closed: bool,
}

impl MemoryBackend {
    pub fn new(kind: BackendKind) -> Self {
        MemoryBackend {
            kind,
            entries: BTreeMap::new(),
            writes: Vec::new(),
            closed: false,
        }
    }

    /// Seed an entry without recording a write.
    pub fn with_entry(mut self, key: impl Into<String>, attrs: Attributes) -> Self {
        self.entries.insert(key.into(), attrs);
        self
    }

    pub fn writes(&self) -> &[WriteOp] {
        &self.writes
    }

    pub fn entry(&self, key: &str) -> Option<&Attributes> {
        self.entries.get(key)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Backend for MemoryBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn fetch(
        &mut self,
        key: &str,
        options: &FetchOptions,
    ) -> Result<Option<Entry>, PersistenceError> {
        let Some(stored) = self.entries.get(key) else {
            return Ok(None);
        };
        let attrs = if options.attributes.is_empty() {
            stored.clone()
        } else {
            stored
                .iter()
                .filter(|(name, _)| options.attributes.iter().any(|a| a == *name))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect()
        };
        Ok(Some(Entry::new(key, attrs)))
    }

    fn create(&mut self, key: &str, attrs: &Attributes) -> Result<(), PersistenceError> {
        if self.entries.contains_key(key) {
            return Err(PersistenceError::AlreadyExists {
                backend: self.kind,
                key: key.to_owned(),
            });
        }
        self.entries.insert(key.to_owned(), attrs.clone());
        self.writes.push(WriteOp::Create {
            key: key.to_owned(),
            attrs: attrs.clone(),
        });
        Ok(())
    }

    fn update(
        &mut self,
        key: &str,
        attrs: &Attributes,
        mode: UpdateMode,
    ) -> Result<(), PersistenceError> {
        let Some(stored) = self.entries.get_mut(key) else {
            return Err(PersistenceError::Rejected {
                backend: self.kind,
                key: key.to_owned(),
                status: "no such entry".to_owned(),
            });
        };
        for (name, value) in attrs {
            match mode {
                UpdateMode::Replace => {
                    stored.insert(name.clone(), value.clone());
                }
                UpdateMode::Delete => {
                    stored.remove(name);
                }
            }
        }
        self.writes.push(WriteOp::Update {
            key: key.to_owned(),
            attrs: attrs.clone(),
            mode,
        });
        Ok(())
    }

    fn close(&mut self) -> Result<(), PersistenceError> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casa_core::AttrValue;
    use serde_json::{json, Value};

    fn attrs<I, K>(pairs: I) -> Attributes
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        pairs
            .into_iter()
            .map(|(k, v)| (k.into(), AttrValue::from(v)))
            .collect()
    }

    #[test]
    fn duplicate_create_is_already_exists() {
        let mut backend = MemoryBackend::new(BackendKind::Couchbase);
        let a = attrs([("ou", json!("casa"))]);
        backend.create("k", &a).unwrap();
        let err = backend.create("k", &a).unwrap_err();
        assert!(matches!(err, PersistenceError::AlreadyExists { .. }));
        assert_eq!(backend.writes().len(), 1);
    }

    #[test]
    fn projection_limits_attributes() {
        let mut backend = MemoryBackend::new(BackendKind::Ldap).with_entry(
            "dn",
            attrs([("ou", json!("casa")), ("oxRevision", json!("1"))]),
        );
        let entry = backend
            .fetch("dn", &FetchOptions::with_attributes(["ou"]))
            .unwrap()
            .unwrap();
        assert_eq!(entry.attrs().len(), 1);
        assert!(entry.get("ou").is_some());
        assert!(backend.writes().is_empty());
    }

    #[test]
    fn delete_mode_removes_attributes() {
        let mut backend = MemoryBackend::new(BackendKind::Ldap)
            .with_entry("dn", attrs([("ou", json!("casa")), ("x", json!(1))]));
        backend
            .update("dn", &attrs([("x", json!(1))]), UpdateMode::Delete)
            .unwrap();
        assert!(!backend.entry("dn").unwrap().contains_key("x"));
    }

    #[test]
    fn update_missing_key_is_rejected() {
        let mut backend = MemoryBackend::new(BackendKind::Sql);
        let err = backend
            .update("nope", &attrs([("ou", json!("casa"))]), UpdateMode::Replace)
            .unwrap_err();
        assert!(matches!(err, PersistenceError::Rejected { .. }));
    }
}
