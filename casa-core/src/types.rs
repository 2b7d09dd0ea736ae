//! Domain types shared by every casa crate.
//!
//! Attribute values are tagged explicitly as [`AttrValue::Scalar`] or
//! [`AttrValue::List`]; backends convert to and from their wire shapes at
//! their own boundary, never inside the reconcile logic.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Attribute values
// ---------------------------------------------------------------------------

/// A single attribute value as stored in a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    /// A multi-valued attribute.
    List(Vec<Value>),
    /// Any non-array JSON value: string, number, bool, null or object.
    Scalar(Value),
}

impl AttrValue {
    /// Returns the scalar string, if this is a string scalar.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Scalar(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Values as a list; a scalar becomes a single-element list.
    pub fn to_list(&self) -> Vec<Value> {
        match self {
            AttrValue::Scalar(v) => vec![v.clone()],
            AttrValue::List(items) => items.clone(),
        }
    }

    /// Converts back to plain JSON. Lists become arrays.
    pub fn into_json(self) -> Value {
        match self {
            AttrValue::Scalar(v) => v,
            AttrValue::List(items) => Value::Array(items),
        }
    }
}

impl From<Value> for AttrValue {
    fn from(v: Value) -> Self {
        match v {
            Value::Array(items) => AttrValue::List(items),
            other => AttrValue::Scalar(other),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Scalar(Value::String(s.to_owned()))
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Scalar(Value::String(s))
    }
}

impl From<i64> for AttrValue {
    fn from(n: i64) -> Self {
        AttrValue::Scalar(Value::from(n))
    }
}

/// Attribute mapping of an [`Entry`]. Ordered so writes are deterministic.
pub type Attributes = BTreeMap<String, AttrValue>;

// ---------------------------------------------------------------------------
// Entry
// ---------------------------------------------------------------------------

/// Immutable snapshot of a persisted record as read from a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    id: String,
    attrs: Attributes,
}

impl Entry {
    pub fn new(id: impl Into<String>, attrs: Attributes) -> Self {
        Self {
            id: id.into(),
            attrs,
        }
    }

    /// Backend identifier: DN, document key or row id.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn attrs(&self) -> &Attributes {
        &self.attrs
    }

    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.get(name)
    }

    pub fn into_parts(self) -> (String, Attributes) {
        (self.id, self.attrs)
    }
}

// ---------------------------------------------------------------------------
// Persistence modes
// ---------------------------------------------------------------------------

/// Deployment-wide persistence mode (`GLUU_PERSISTENCE_TYPE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceMode {
    #[default]
    Ldap,
    Couchbase,
    Sql,
    Spanner,
    Hybrid,
}

impl PersistenceMode {
    /// Maps the mode to the single backend that stores the casa entry.
    ///
    /// Hybrid deployments keep the default mapping in LDAP and everything
    /// else in Couchbase.
    pub fn resolve(self, mapping: LdapMapping) -> BackendKind {
        match self {
            PersistenceMode::Ldap => BackendKind::Ldap,
            PersistenceMode::Couchbase => BackendKind::Couchbase,
            PersistenceMode::Sql => BackendKind::Sql,
            PersistenceMode::Spanner => BackendKind::Spanner,
            PersistenceMode::Hybrid => match mapping {
                LdapMapping::Default => BackendKind::Ldap,
                _ => BackendKind::Couchbase,
            },
        }
    }
}

impl fmt::Display for PersistenceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceMode::Ldap => write!(f, "ldap"),
            PersistenceMode::Couchbase => write!(f, "couchbase"),
            PersistenceMode::Sql => write!(f, "sql"),
            PersistenceMode::Spanner => write!(f, "spanner"),
            PersistenceMode::Hybrid => write!(f, "hybrid"),
        }
    }
}

impl FromStr for PersistenceMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ldap" => Ok(Self::Ldap),
            "couchbase" => Ok(Self::Couchbase),
            "sql" => Ok(Self::Sql),
            "spanner" => Ok(Self::Spanner),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(ConfigError::invalid(
                "GLUU_PERSISTENCE_TYPE",
                other,
                "ldap, couchbase, sql, spanner, hybrid",
            )),
        }
    }
}

/// Which data group hybrid deployments keep in LDAP
/// (`GLUU_PERSISTENCE_LDAP_MAPPING`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LdapMapping {
    #[default]
    Default,
    User,
    Site,
    Cache,
    Token,
    Session,
}

impl FromStr for LdapMapping {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(Self::Default),
            "user" => Ok(Self::User),
            "site" => Ok(Self::Site),
            "cache" => Ok(Self::Cache),
            "token" => Ok(Self::Token),
            "session" => Ok(Self::Session),
            other => Err(ConfigError::invalid(
                "GLUU_PERSISTENCE_LDAP_MAPPING",
                other,
                "default, user, site, cache, token, session",
            )),
        }
    }
}

/// One concrete backend implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Ldap,
    Couchbase,
    Sql,
    Spanner,
}

impl BackendKind {
    pub fn family(self) -> BackendFamily {
        match self {
            BackendKind::Ldap => BackendFamily::Directory,
            BackendKind::Couchbase => BackendFamily::Document,
            BackendKind::Sql | BackendKind::Spanner => BackendFamily::Relational,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Ldap => write!(f, "ldap"),
            BackendKind::Couchbase => write!(f, "couchbase"),
            BackendKind::Sql => write!(f, "sql"),
            BackendKind::Spanner => write!(f, "spanner"),
        }
    }
}

/// Storage technology family. Decides the record key, layout and blob codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendFamily {
    Directory,
    Document,
    Relational,
}

/// SQL dialect for the relational backend (`GLUU_SQL_DB_DIALECT`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    #[default]
    Mysql,
    Pgsql,
    Sqlite,
}

impl SqlDialect {
    pub fn default_port(self) -> u16 {
        match self {
            SqlDialect::Mysql => 3306,
            SqlDialect::Pgsql => 5432,
            SqlDialect::Sqlite => 0,
        }
    }
}

impl FromStr for SqlDialect {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mysql" => Ok(Self::Mysql),
            "pgsql" | "postgresql" => Ok(Self::Pgsql),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(ConfigError::invalid(
                "GLUU_SQL_DB_DIALECT",
                other,
                "mysql, pgsql, sqlite",
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hybrid_resolves_by_mapping() {
        assert_eq!(
            PersistenceMode::Hybrid.resolve(LdapMapping::Default),
            BackendKind::Ldap
        );
        assert_eq!(
            PersistenceMode::Hybrid.resolve(LdapMapping::User),
            BackendKind::Couchbase
        );
        assert_eq!(
            PersistenceMode::Spanner.resolve(LdapMapping::User),
            BackendKind::Spanner
        );
    }

    #[test]
    fn relational_kinds_share_a_family() {
        assert_eq!(BackendKind::Sql.family(), BackendFamily::Relational);
        assert_eq!(BackendKind::Spanner.family(), BackendFamily::Relational);
        assert_eq!(BackendKind::Ldap.family(), BackendFamily::Directory);
        assert_eq!(BackendKind::Couchbase.family(), BackendFamily::Document);
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let err = "mongo".parse::<PersistenceMode>().unwrap_err();
        assert!(err.to_string().contains("GLUU_PERSISTENCE_TYPE"));
        assert!(err.to_string().contains("mongo"));
    }

    #[test]
    fn attr_value_from_json() {
        assert_eq!(
            AttrValue::from(json!(["top", "x"])),
            AttrValue::List(vec![json!("top"), json!("x")])
        );
        assert_eq!(AttrValue::from(json!({"a": 1})), AttrValue::Scalar(json!({"a": 1})));
        assert_eq!(AttrValue::from("casa").as_str(), Some("casa"));
        assert_eq!(AttrValue::from(1).as_str(), None);
    }

    #[test]
    fn entry_accessors() {
        let mut attrs = Attributes::new();
        attrs.insert("ou".into(), "casa".into());
        let entry = Entry::new("casa", attrs);
        assert_eq!(entry.id(), "casa");
        assert_eq!(entry.get("ou").and_then(AttrValue::as_str), Some("casa"));
        assert!(entry.get("missing").is_none());
    }
}
