//! Directory backend over a synchronous LDAP connection.
//!
//! Attribute values cross the boundary here: a directory value set with one
//! element is read as [`AttrValue::Scalar`], two or more as
//! [`AttrValue::List`]. On write every value becomes a set of strings.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use ldap3::{LdapConn, LdapConnSettings, LdapResult, Mod, Scope, SearchEntry, SearchResult};
use serde_json::Value;

use casa_core::settings::LdapSettings;
use casa_core::{AttrValue, Attributes, BackendKind, Entry};

use crate::backend::{Backend, FetchOptions, UpdateMode};
use crate::error::PersistenceError;

const RC_NO_SUCH_OBJECT: u32 = 32;
const RC_ENTRY_ALREADY_EXISTS: u32 = 68;
const MATCH_ALL: &str = "(objectClass=*)";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Directory backend; the record key is a distinguished name.
pub struct LdapBackend {
    conn: LdapConn,
}

impl LdapBackend {
    /// Connect and bind with the configured credentials.
    pub fn connect(settings: &LdapSettings) -> Result<Self, PersistenceError> {
        let url = settings.connection_url();
        let conn_settings = LdapConnSettings::new()
            .set_conn_timeout(CONNECT_TIMEOUT)
            .set_no_tls_verify(!settings.verify_tls);
        let mut conn = LdapConn::with_settings(conn_settings, &url)?;
        let password = settings.password.reveal()?;
        conn.simple_bind(&settings.bind_dn, &password)?.success()?;
        tracing::debug!(url = %url, bind_dn = %settings.bind_dn, "bound to directory");
        Ok(LdapBackend { conn })
    }
}

impl Backend for LdapBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Ldap
    }

    fn fetch(
        &mut self,
        key: &str,
        options: &FetchOptions,
    ) -> Result<Option<Entry>, PersistenceError> {
        let filter = options.filter.as_deref().unwrap_or(MATCH_ALL);
        let attrs: Vec<&str> = options.attributes.iter().map(String::as_str).collect();

        let SearchResult(entries, result) = self.conn.search(key, Scope::Base, filter, attrs)?;
        if !search_found(key, result)? {
            return Ok(None);
        }

        let Some(first) = entries.into_iter().next() else {
            return Ok(None);
        };
        let entry = SearchEntry::construct(first);
        Ok(Some(Entry::new(entry.dn, collapse_attrs(entry.attrs))))
    }

    fn create(&mut self, key: &str, attrs: &Attributes) -> Result<(), PersistenceError> {
        let values: Vec<(String, HashSet<String>)> = attrs
            .iter()
            .map(|(name, value)| (name.clone(), expand_values(value)))
            .collect();

        let result = self.conn.add(key, values)?;
        add_outcome(key, result)?;
        tracing::debug!(dn = key, "added entry");
        Ok(())
    }

    fn update(
        &mut self,
        key: &str,
        attrs: &Attributes,
        mode: UpdateMode,
    ) -> Result<(), PersistenceError> {
        let mods: Vec<Mod<String>> = attrs
            .iter()
            .map(|(name, value)| {
                let values = expand_values(value);
                match mode {
                    UpdateMode::Replace => Mod::Replace(name.clone(), values),
                    UpdateMode::Delete => Mod::Delete(name.clone(), values),
                }
            })
            .collect();

        self.conn.modify(key, mods)?.success()?;
        tracing::debug!(dn = key, ?mode, attributes = attrs.len(), "modified entry");
        Ok(())
    }

    fn close(&mut self) -> Result<(), PersistenceError> {
        self.conn.unbind()?;
        Ok(())
    }
}

/// `Ok(false)` when the base object does not exist.
fn search_found(dn: &str, result: LdapResult) -> Result<bool, PersistenceError> {
    if result.rc == RC_NO_SUCH_OBJECT {
        tracing::debug!(dn, "no such object");
        return Ok(false);
    }
    result.success()?;
    Ok(true)
}

fn add_outcome(dn: &str, result: LdapResult) -> Result<(), PersistenceError> {
    if result.rc == RC_ENTRY_ALREADY_EXISTS {
        return Err(PersistenceError::AlreadyExists {
            backend: BackendKind::Ldap,
            key: dn.to_owned(),
        });
    }
    result.success()?;
    Ok(())
}

/// Directory value sets to tagged values.
///
/// One element collapses to a scalar string, two or more stay a list.
/// Attributes without values are dropped.
pub fn collapse_attrs(raw: HashMap<String, Vec<String>>) -> Attributes {
    raw.into_iter()
        .filter_map(|(name, mut values)| {
            let value = match values.len() {
                0 => return None,
                1 => AttrValue::Scalar(Value::String(values.remove(0))),
                _ => AttrValue::List(values.into_iter().map(Value::String).collect()),
            };
            Some((name, value))
        })
        .collect()
}

/// A tagged value as a directory value set.
pub fn expand_values(value: &AttrValue) -> HashSet<String> {
    value.to_list().iter().map(value_to_text).collect()
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(pairs: &[(&str, &[&str])]) -> HashMap<String, Vec<String>> {
        pairs
            .iter()
            .map(|(k, vs)| (k.to_string(), vs.iter().map(|v| v.to_string()).collect()))
            .collect()
    }

    fn ldap_result(rc: u32) -> LdapResult {
        LdapResult {
            rc,
            matched: String::new(),
            text: String::new(),
            refs: Vec::new(),
            ctrls: Vec::new(),
        }
    }

    const DN: &str = "ou=casa,ou=configuration,o=gluu";

    #[test]
    fn search_result_codes() {
        assert!(search_found(DN, ldap_result(0)).unwrap());
        assert!(!search_found(DN, ldap_result(RC_NO_SUCH_OBJECT)).unwrap());
        let err = search_found(DN, ldap_result(49)).unwrap_err();
        assert!(matches!(err, PersistenceError::Ldap(_)), "got: {err}");
    }

    #[test]
    fn add_result_codes() {
        assert!(add_outcome(DN, ldap_result(0)).is_ok());
        let err = add_outcome(DN, ldap_result(RC_ENTRY_ALREADY_EXISTS)).unwrap_err();
        assert!(
            matches!(&err, PersistenceError::AlreadyExists { backend: BackendKind::Ldap, key } if key == DN),
            "got: {err}"
        );
        let err = add_outcome(DN, ldap_result(50)).unwrap_err();
        assert!(matches!(err, PersistenceError::Ldap(_)), "got: {err}");
    }

    #[test]
    fn single_value_collapses_to_scalar() {
        let attrs = collapse_attrs(raw(&[("ou", &["casa"])]));
        assert_eq!(attrs["ou"], AttrValue::Scalar(json!("casa")));
    }

    #[test]
    fn multiple_values_stay_a_list() {
        let attrs = collapse_attrs(raw(&[("objectClass", &["top", "oxApplicationConfiguration"])]));
        assert_eq!(
            attrs["objectClass"],
            AttrValue::List(vec![json!("top"), json!("oxApplicationConfiguration")])
        );
    }

    #[test]
    fn empty_value_sets_are_dropped() {
        let attrs = collapse_attrs(raw(&[("description", &[])]));
        assert!(attrs.is_empty());
    }

    #[test]
    fn values_expand_to_strings() {
        let set = expand_values(&AttrValue::Scalar(json!(1)));
        assert_eq!(set, HashSet::from(["1".to_string()]));

        let set = expand_values(&AttrValue::List(vec![json!("top"), json!("x")]));
        assert_eq!(set.len(), 2);
        assert!(set.contains("top"));

        let blob = expand_values(&AttrValue::Scalar(json!("{\"a\":1}")));
        assert_eq!(blob, HashSet::from(["{\"a\":1}".to_string()]));
    }
}
