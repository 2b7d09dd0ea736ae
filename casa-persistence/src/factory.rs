//! Backend selection from deployment settings.

use casa_core::{Attributes, BackendKind, BackendSettings, Entry, Settings};

use crate::backend::{Backend, FetchOptions, UpdateMode};
use crate::couchbase::CouchbaseBackend;
use crate::error::PersistenceError;
use crate::ldap::LdapBackend;
use crate::relational::{RelationalBackend, SpannerStore, SqlStore};

/// One connected backend of any kind.
pub enum AnyBackend {
    Ldap(LdapBackend),
    Couchbase(CouchbaseBackend),
    Sql(RelationalBackend<SqlStore>),
    Spanner(RelationalBackend<SpannerStore>),
}

/// Connect to the backend the settings resolve to.
///
/// The persistence mode (and hybrid mapping) has already been folded into
/// [`Settings::backend`] during settings resolution.
pub fn open_backend(settings: &Settings) -> Result<AnyBackend, PersistenceError> {
    tracing::info!(
        persistence = %settings.persistence,
        backend = %settings.backend_kind(),
        "opening backend"
    );
    let backend = match &settings.backend {
        BackendSettings::Ldap(ldap) => AnyBackend::Ldap(LdapBackend::connect(ldap)?),
        BackendSettings::Couchbase(cb) => AnyBackend::Couchbase(CouchbaseBackend::connect(cb)?),
        BackendSettings::Sql(sql) => AnyBackend::Sql(RelationalBackend::new(
            SqlStore::connect(sql)?,
            BackendKind::Sql,
        )),
        BackendSettings::Spanner(spanner) => AnyBackend::Spanner(RelationalBackend::new(
            SpannerStore::connect(spanner)?,
            BackendKind::Spanner,
        )),
    };
    Ok(backend)
}

macro_rules! dispatch {
    ($self:ident, $b:ident => $call:expr) => {
        match $self {
            AnyBackend::Ldap($b) => $call,
            AnyBackend::Couchbase($b) => $call,
            AnyBackend::Sql($b) => $call,
            AnyBackend::Spanner($b) => $call,
        }
    };
}

impl Backend for AnyBackend {
    fn kind(&self) -> BackendKind {
        dispatch!(self, b => b.kind())
    }

    fn fetch(
        &mut self,
        key: &str,
        options: &FetchOptions,
    ) -> Result<Option<Entry>, PersistenceError> {
        dispatch!(self, b => b.fetch(key, options))
    }

    fn create(&mut self, key: &str, attrs: &Attributes) -> Result<(), PersistenceError> {
        dispatch!(self, b => b.create(key, attrs))
    }

    fn update(
        &mut self,
        key: &str,
        attrs: &Attributes,
        mode: UpdateMode,
    ) -> Result<(), PersistenceError> {
        dispatch!(self, b => b.update(key, attrs, mode))
    }

    fn close(&mut self) -> Result<(), PersistenceError> {
        dispatch!(self, b => b.close())
    }
}
