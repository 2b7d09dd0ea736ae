//! Document backend over the Couchbase N1QL query service.
//!
//! Statements are posted as form data with basic auth. Keys and values are
//! embedded as JSON literals so quoting is handled by the serializer.

use std::time::Duration;

use base64::Engine as _;
use serde_json::{Map, Value};

use casa_core::settings::CouchbaseSettings;
use casa_core::{AttrValue, Attributes, BackendKind, Entry};

use crate::backend::{Backend, FetchOptions, UpdateMode};
use crate::error::{decode_err, http_err, PersistenceError};

/// N1QL error code for an INSERT on an existing key.
const DUPLICATE_KEY_CODE: i64 = 12009;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Document backend; the record key is a document key inside one bucket.
pub struct CouchbaseBackend {
    agent: ureq::Agent,
    query_url: String,
    authorization: String,
    bucket: String,
}

impl CouchbaseBackend {
    pub fn connect(settings: &CouchbaseSettings) -> Result<Self, PersistenceError> {
        let password = settings.password.reveal()?;
        let token = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", settings.user, password));
        let agent = ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build();
        Ok(CouchbaseBackend {
            agent,
            query_url: settings.query_url(),
            authorization: format!("Basic {token}"),
            bucket: settings.bucket_prefix.clone(),
        })
    }

    /// Run a statement. Non-2xx answers are returned with their status code
    /// and parsed body so callers decide what they mean.
    fn exec_query(&self, statement: &str) -> Result<QueryResponse, PersistenceError> {
        tracing::trace!(statement, "n1ql");
        let response = self
            .agent
            .post(&self.query_url)
            .set("Authorization", &self.authorization)
            .send_form(&[("statement", statement)]);

        let (status, response) = match response {
            Ok(resp) => (resp.status(), resp),
            Err(ureq::Error::Status(code, resp)) => (code, resp),
            Err(err) => return Err(http_err(&self.query_url, err)),
        };
        let body = match response.into_json::<Value>() {
            Ok(body) => body,
            Err(_) if !(200..300).contains(&status) => {
                serde_json::json!({ "status": format!("http {status}") })
            }
            Err(e) => return Err(decode_err(BackendKind::Couchbase, e.to_string())),
        };
        Ok(QueryResponse { status, body })
    }
}

struct QueryResponse {
    status: u16,
    body: Value,
}

impl Backend for CouchbaseBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Couchbase
    }

    fn fetch(
        &mut self,
        key: &str,
        _options: &FetchOptions,
    ) -> Result<Option<Entry>, PersistenceError> {
        let response = self.exec_query(&select_statement(&self.bucket, key))?;
        lookup_outcome(key, response.status, &response.body)
    }

    fn create(&mut self, key: &str, attrs: &Attributes) -> Result<(), PersistenceError> {
        let response = self.exec_query(&insert_statement(&self.bucket, key, attrs))?;
        check_mutation(key, &response.body)?;
        tracing::debug!(key, bucket = %self.bucket, "inserted document");
        Ok(())
    }

    fn update(
        &mut self,
        key: &str,
        attrs: &Attributes,
        mode: UpdateMode,
    ) -> Result<(), PersistenceError> {
        let response = self.exec_query(&update_statement(&self.bucket, key, attrs, mode))?;
        check_mutation(key, &response.body)?;
        tracing::debug!(key, bucket = %self.bucket, ?mode, "updated document");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

fn literal(value: &Value) -> String {
    value.to_string()
}

fn key_literal(key: &str) -> String {
    literal(&Value::String(key.to_owned()))
}

pub fn select_statement(bucket: &str, key: &str) -> String {
    format!(
        "SELECT META().id, `{bucket}`.* FROM `{bucket}` USE KEYS {}",
        key_literal(key)
    )
}

pub fn insert_statement(bucket: &str, key: &str, attrs: &Attributes) -> String {
    let document: Map<String, Value> = attrs
        .iter()
        .map(|(name, value)| (name.clone(), value.clone().into_json()))
        .collect();
    format!(
        "INSERT INTO `{bucket}` (KEY, VALUE) VALUES ({}, {})",
        key_literal(key),
        literal(&Value::Object(document))
    )
}

pub fn update_statement(bucket: &str, key: &str, attrs: &Attributes, mode: UpdateMode) -> String {
    let clause = match mode {
        UpdateMode::Replace => {
            let assignments: Vec<String> = attrs
                .iter()
                .map(|(name, value)| format!("`{name}`={}", literal(&value.clone().into_json())))
                .collect();
            format!("SET {}", assignments.join(","))
        }
        UpdateMode::Delete => {
            let names: Vec<String> = attrs.keys().map(|name| format!("`{name}`")).collect();
            format!("UNSET {}", names.join(","))
        }
    };
    format!("UPDATE `{bucket}` USE KEYS {} {clause}", key_literal(key))
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// A lookup answered with a non-2xx status counts as absent.
pub fn lookup_outcome(key: &str, status: u16, body: &Value) -> Result<Option<Entry>, PersistenceError> {
    if !(200..300).contains(&status) {
        tracing::warn!(key, status, "document lookup failed; treating as absent");
        return Ok(None);
    }
    entry_from_results(body)
}

/// First row of a `SELECT META().id, b.*` result, or `None` if empty.
pub fn entry_from_results(body: &Value) -> Result<Option<Entry>, PersistenceError> {
    let results = body
        .get("results")
        .and_then(Value::as_array)
        .ok_or_else(|| decode_err(BackendKind::Couchbase, "missing results array"))?;
    let Some(first) = results.first() else {
        return Ok(None);
    };
    let Value::Object(row) = first else {
        return Err(decode_err(BackendKind::Couchbase, "result row is not an object"));
    };

    let mut attrs = Attributes::new();
    let mut id = None;
    for (name, value) in row {
        if name == "id" {
            id = value.as_str().map(str::to_owned);
        } else {
            attrs.insert(name.clone(), AttrValue::from(value.clone()));
        }
    }
    let id = id.ok_or_else(|| decode_err(BackendKind::Couchbase, "result row has no id"))?;
    Ok(Some(Entry::new(id, attrs)))
}

/// A mutation succeeded only if the service reports `"status": "success"`.
pub fn check_mutation(key: &str, body: &Value) -> Result<(), PersistenceError> {
    let status = body.get("status").and_then(Value::as_str).unwrap_or_default();
    if status == "success" {
        return Ok(());
    }

    let errors = body.get("errors").and_then(Value::as_array);
    let duplicate = errors.is_some_and(|errs| {
        errs.iter()
            .any(|e| e.get("code").and_then(Value::as_i64) == Some(DUPLICATE_KEY_CODE))
    });
    if duplicate {
        return Err(PersistenceError::AlreadyExists {
            backend: BackendKind::Couchbase,
            key: key.to_owned(),
        });
    }

    let detail = errors
        .and_then(|errs| errs.first())
        .and_then(|e| e.get("msg"))
        .and_then(Value::as_str)
        .map(|msg| format!("{status}: {msg}"))
        .unwrap_or_else(|| status.to_owned());
    Err(PersistenceError::Rejected {
        backend: BackendKind::Couchbase,
        key: key.to_owned(),
        status: if detail.is_empty() { "no status".to_owned() } else { detail },
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn select_uses_keys() {
        assert_eq!(
            select_statement("gluu", "configuration_casa"),
            "SELECT META().id, `gluu`.* FROM `gluu` USE KEYS \"configuration_casa\""
        );
    }

    #[test]
    fn insert_embeds_native_document() {
        let mut attrs = Attributes::new();
        attrs.insert("ou".into(), "casa".into());
        attrs.insert(
            "oxConfApplication".into(),
            AttrValue::Scalar(json!({"oxd_config": {"port": 8443}})),
        );
        let stmt = insert_statement("gluu", "configuration_casa", &attrs);
        assert_eq!(
            stmt,
            "INSERT INTO `gluu` (KEY, VALUE) VALUES (\"configuration_casa\", {\"ou\":\"casa\",\"oxConfApplication\":{\"oxd_config\":{\"port\":8443}}})"
        );
    }

    #[test]
    fn update_set_and_unset() {
        let mut attrs = Attributes::new();
        attrs.insert("oxRevision".into(), 2.into());
        attrs.insert("ou".into(), "casa".into());
        assert_eq!(
            update_statement("gluu", "k", &attrs, UpdateMode::Replace),
            "UPDATE `gluu` USE KEYS \"k\" SET `ou`=\"casa\",`oxRevision`=2"
        );
        assert_eq!(
            update_statement("gluu", "k", &attrs, UpdateMode::Delete),
            "UPDATE `gluu` USE KEYS \"k\" UNSET `ou`,`oxRevision`"
        );
    }

    #[test]
    fn key_quotes_are_escaped() {
        let stmt = select_statement("gluu", "it's");
        assert!(stmt.ends_with("USE KEYS \"it's\""));
    }

    #[test]
    fn results_row_becomes_entry() {
        let body = json!({
            "results": [{"id": "configuration_casa", "ou": "casa", "objectClass": ["a", "b"]}],
            "status": "success"
        });
        let entry = entry_from_results(&body).unwrap().expect("entry");
        assert_eq!(entry.id(), "configuration_casa");
        assert!(entry.get("id").is_none());
        assert_eq!(
            entry.get("objectClass"),
            Some(&AttrValue::List(vec![json!("a"), json!("b")]))
        );
    }

    #[test]
    fn empty_results_mean_absent() {
        let body = json!({"results": [], "status": "success"});
        assert!(entry_from_results(&body).unwrap().is_none());
    }

    #[test]
    fn failed_lookup_is_absent() {
        let row = json!({"results": [{"id": "configuration_casa", "ou": "casa"}], "status": "success"});
        assert!(lookup_outcome("configuration_casa", 200, &row).unwrap().is_some());

        for status in [401, 404, 500, 503] {
            let body = json!({"status": format!("http {status}")});
            assert!(lookup_outcome("configuration_casa", status, &body).unwrap().is_none());
        }
    }

    #[test]
    fn ok_lookup_without_results_is_decode_error() {
        let err = lookup_outcome("k", 200, &json!({"status": "success"})).unwrap_err();
        assert!(matches!(err, PersistenceError::Decode { .. }));
    }

    #[test]
    fn mutation_status_is_checked() {
        assert!(check_mutation("k", &json!({"status": "success"})).is_ok());

        let err = check_mutation(
            "k",
            &json!({"status": "errors", "errors": [{"code": 5000, "msg": "boom"}]}),
        )
        .unwrap_err();
        assert!(matches!(err, PersistenceError::Rejected { .. }));
        assert!(err.to_string().contains("boom"));

        let err = check_mutation(
            "k",
            &json!({"status": "errors", "errors": [{"code": 12009, "msg": "Duplicate Key: k"}]}),
        )
        .unwrap_err();
        assert!(matches!(err, PersistenceError::AlreadyExists { .. }));
    }
}
