//! casa persistence: one storage contract, four store technologies.
//!
//! - [`backend`]: the [`Backend`] trait, [`FetchOptions`], [`UpdateMode`]
//! - [`ldap`]: directory backend
//! - [`couchbase`]: document backend
//! - [`relational`]: SQL and Spanner backends over a shared row model
//! - [`memory`]: in-process backend
//! - [`factory`]: [`open_backend`]

pub mod backend;
pub mod couchbase;
pub mod error;
pub mod factory;
pub mod ldap;
pub mod memory;
pub mod relational;

pub use backend::{Backend, FetchOptions, UpdateMode};
pub use couchbase::CouchbaseBackend;
pub use error::PersistenceError;
pub use factory::{open_backend, AnyBackend};
pub use ldap::LdapBackend;
pub use memory::{MemoryBackend, WriteOp};
pub use relational::{RelationalBackend, RowStore, SpannerStore, SqlStore};
