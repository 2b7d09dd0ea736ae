//! casa core library: data model, persistence modes, deployment settings.
//!
//! - [`types`]: [`Entry`], [`AttrValue`] and the persistence enums
//! - [`settings`]: layered settings resolution
//! - [`error`]: [`ConfigError`]

pub mod error;
pub mod settings;
pub mod types;

pub use error::ConfigError;
pub use settings::{BackendSettings, OxdEndpoint, Secret, Settings};
pub use types::{
    AttrValue, Attributes, BackendFamily, BackendKind, Entry, LdapMapping, PersistenceMode,
    SqlDialect,
};
