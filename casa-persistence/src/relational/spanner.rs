//! [`RowStore`] over the Cloud Spanner REST API.
//!
//! One session is created on connect and deleted on close. Reads use
//! `executeSql` with a bound key; writes are single-use read-write commits
//! carrying one mutation. `INT64` cells travel as JSON strings in both
//! directions.

use std::time::Duration;

use serde_json::{json, Value};

use casa_core::settings::SpannerSettings;
use casa_core::{AttrValue, Attributes, BackendKind};

use super::{RowStore, ID_COLUMN};
use crate::error::{decode_err, http_err, PersistenceError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Row store backed by one Spanner session.
pub struct SpannerStore {
    agent: ureq::Agent,
    api_root: String,
    authorization: Option<String>,
    session: String,
}

impl SpannerStore {
    pub fn connect(settings: &SpannerSettings) -> Result<Self, PersistenceError> {
        let agent = ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build();
        let authorization = match &settings.access_token {
            Some(token) => Some(format!("Bearer {}", token.reveal()?)),
            None => None,
        };
        let mut store = SpannerStore {
            agent,
            api_root: settings.api_root(),
            authorization,
            session: String::new(),
        };

        let created = store.call(
            "POST",
            &format!("{}/sessions", settings.database_path()),
            Some(&json!({})),
        )?;
        store.session = created
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| decode_err(BackendKind::Spanner, "session response has no name"))?
            .to_owned();
        tracing::debug!(session = %store.session, "opened spanner session");
        Ok(store)
    }

    fn call(
        &self,
        method: &str,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, PersistenceError> {
        let url = format!("{}/v1/{path}", self.api_root);
        let mut request = self.agent.request(method, &url);
        if let Some(auth) = &self.authorization {
            request = request.set("Authorization", auth);
        }
        let response = match body {
            Some(body) => request.send_json(body),
            None => request.call(),
        }
        .map_err(|e| http_err(&url, e))?;

        let text = response
            .into_string()
            .map_err(|e| decode_err(BackendKind::Spanner, e.to_string()))?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| decode_err(BackendKind::Spanner, e.to_string()))
    }

    fn commit(&self, mutation: Value) -> Result<(), PersistenceError> {
        let body = json!({
            "singleUseTransaction": { "readWrite": {} },
            "mutations": [mutation],
        });
        self.call("POST", &format!("{}:commit", self.session), Some(&body))?;
        Ok(())
    }
}

impl RowStore for SpannerStore {
    fn get(&mut self, table: &str, id: &str) -> Result<Option<Attributes>, PersistenceError> {
        let body = json!({
            "sql": format!("SELECT * FROM {table} WHERE {ID_COLUMN} = @id"),
            "params": { "id": id },
            "paramTypes": { "id": { "code": "STRING" } },
        });
        let result = self.call("POST", &format!("{}:executeSql", self.session), Some(&body))?;
        first_row(&result)
    }

    fn insert(&mut self, table: &str, row: &Attributes) -> Result<(), PersistenceError> {
        let key = row
            .get(ID_COLUMN)
            .and_then(AttrValue::as_str)
            .unwrap_or_default();
        let result = self.commit(json!({ "insert": write_payload(table, row) }));
        insert_outcome(key, result)
    }

    fn update(
        &mut self,
        table: &str,
        id: &str,
        values: &Attributes,
    ) -> Result<u64, PersistenceError> {
        let mut row = values.clone();
        row.insert(ID_COLUMN.to_owned(), AttrValue::from(id));
        update_outcome(self.commit(json!({ "update": write_payload(table, &row) })))
    }

    fn close(&mut self) -> Result<(), PersistenceError> {
        if self.session.is_empty() {
            return Ok(());
        }
        let session = std::mem::take(&mut self.session);
        self.call("DELETE", &session, None)?;
        tracing::debug!(session = %session, "closed spanner session");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Commit status
// ---------------------------------------------------------------------------

/// How a failed commit's HTTP status reads for a single-row write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitStatus {
    /// 409: an insert hit an existing key.
    Conflict,
    /// 404: an update named a missing row.
    NotFound,
    Failed,
}

impl CommitStatus {
    pub fn from_code(code: u16) -> Self {
        match code {
            409 => CommitStatus::Conflict,
            404 => CommitStatus::NotFound,
            _ => CommitStatus::Failed,
        }
    }

    fn of(err: &PersistenceError) -> Self {
        match err {
            PersistenceError::Http { source, .. } => match source.as_ref() {
                ureq::Error::Status(code, _) => Self::from_code(*code),
                _ => CommitStatus::Failed,
            },
            _ => CommitStatus::Failed,
        }
    }
}

fn insert_outcome(key: &str, result: Result<(), PersistenceError>) -> Result<(), PersistenceError> {
    match result {
        Err(err) if CommitStatus::of(&err) == CommitStatus::Conflict => {
            Err(PersistenceError::AlreadyExists {
                backend: BackendKind::Spanner,
                key: key.to_owned(),
            })
        }
        other => other,
    }
}

/// Rows touched by an update commit; a missing row touches none.
fn update_outcome(result: Result<(), PersistenceError>) -> Result<u64, PersistenceError> {
    match result {
        Ok(()) => Ok(1),
        Err(err) if CommitStatus::of(&err) == CommitStatus::NotFound => Ok(0),
        Err(err) => Err(err),
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// `{"table", "columns", "values": [[...]]}` for a commit mutation.
pub fn write_payload(table: &str, row: &Attributes) -> Value {
    let columns: Vec<&str> = row.keys().map(String::as_str).collect();
    let values: Vec<Value> = row.values().map(encode_cell).collect();
    json!({
        "table": table,
        "columns": columns,
        "values": [values],
    })
}

fn encode_cell(value: &AttrValue) -> Value {
    match value {
        AttrValue::List(items) => Value::Array(items.iter().map(encode_scalar).collect()),
        AttrValue::Scalar(v) => encode_scalar(v),
    }
}

fn encode_scalar(value: &Value) -> Value {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => Value::String(n.to_string()),
        Value::Object(_) | Value::Array(_) => Value::String(value.to_string()),
        other => other.clone(),
    }
}

/// First row of an `executeSql` result set keyed by column name.
pub fn first_row(result: &Value) -> Result<Option<Attributes>, PersistenceError> {
    let fields = result
        .pointer("/metadata/rowType/fields")
        .and_then(Value::as_array)
        .ok_or_else(|| decode_err(BackendKind::Spanner, "result set has no row type"))?;
    // `rows` is omitted entirely when nothing matched.
    let Some(row) = result
        .get("rows")
        .and_then(Value::as_array)
        .and_then(|rows| rows.first())
        .and_then(Value::as_array)
    else {
        return Ok(None);
    };

    let mut attrs = Attributes::new();
    for (field, cell) in fields.iter().zip(row) {
        let name = field
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| decode_err(BackendKind::Spanner, "field without name"))?;
        let ty = field.get("type").unwrap_or(&Value::Null);
        attrs.insert(name.to_owned(), AttrValue::from(decode_cell(ty, cell)?));
    }
    Ok(Some(attrs))
}

fn decode_cell(ty: &Value, cell: &Value) -> Result<Value, PersistenceError> {
    if cell.is_null() {
        return Ok(Value::Null);
    }
    let code = ty.get("code").and_then(Value::as_str).unwrap_or("STRING");
    match code {
        "INT64" => {
            let raw = cell.as_str().unwrap_or_default();
            raw.parse::<i64>()
                .map(Value::from)
                .map_err(|_| decode_err(BackendKind::Spanner, format!("bad INT64 cell {raw:?}")))
        }
        "ARRAY" => {
            let element = ty.get("arrayElementType").unwrap_or(&Value::Null);
            let items = cell
                .as_array()
                .ok_or_else(|| decode_err(BackendKind::Spanner, "ARRAY cell is not a list"))?;
            items
                .iter()
                .map(|item| decode_cell(element, item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        _ => Ok(cell.clone()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_encodes_int64_as_string() {
        let mut row = Attributes::new();
        row.insert("doc_id".into(), "casa".into());
        row.insert("oxRevision".into(), 1.into());
        row.insert(
            "objectClass".into(),
            AttrValue::List(vec![json!("top"), json!("oxApplicationConfiguration")]),
        );
        let payload = write_payload("oxApplicationConfiguration", &row);
        assert_eq!(
            payload,
            json!({
                "table": "oxApplicationConfiguration",
                "columns": ["doc_id", "objectClass", "oxRevision"],
                "values": [["casa", ["top", "oxApplicationConfiguration"], "1"]],
            })
        );
    }

    #[test]
    fn result_set_decodes_by_type() {
        let result = json!({
            "metadata": {"rowType": {"fields": [
                {"name": "doc_id", "type": {"code": "STRING"}},
                {"name": "oxRevision", "type": {"code": "INT64"}},
                {"name": "objectClass", "type": {"code": "ARRAY", "arrayElementType": {"code": "STRING"}}},
                {"name": "ou", "type": {"code": "STRING"}}
            ]}},
            "rows": [["casa", "1", ["top"], null]]
        });
        let row = first_row(&result).unwrap().expect("row");
        assert_eq!(row["doc_id"], AttrValue::from("casa"));
        assert_eq!(row["oxRevision"], AttrValue::from(1));
        assert_eq!(row["objectClass"], AttrValue::List(vec![json!("top")]));
        assert_eq!(row["ou"], AttrValue::Scalar(Value::Null));
    }

    #[test]
    fn empty_result_set_is_absent() {
        let result = json!({"metadata": {"rowType": {"fields": [{"name": "doc_id", "type": {"code": "STRING"}}]}}});
        assert!(first_row(&result).unwrap().is_none());
    }

    fn status_error(code: u16) -> PersistenceError {
        let response = ureq::Response::new(code, "status", "{}").unwrap();
        http_err("http://spanner.test/v1/commit", ureq::Error::Status(code, response))
    }

    #[test]
    fn commit_codes_classify() {
        assert_eq!(CommitStatus::from_code(409), CommitStatus::Conflict);
        assert_eq!(CommitStatus::from_code(404), CommitStatus::NotFound);
        assert_eq!(CommitStatus::from_code(500), CommitStatus::Failed);
        assert_eq!(CommitStatus::from_code(403), CommitStatus::Failed);
    }

    #[test]
    fn insert_conflict_is_already_exists() {
        let err = insert_outcome("casa", Err(status_error(409))).unwrap_err();
        assert!(
            matches!(&err, PersistenceError::AlreadyExists { backend: BackendKind::Spanner, key } if key == "casa"),
            "got: {err}"
        );
        assert!(insert_outcome("casa", Ok(())).is_ok());
    }

    #[test]
    fn insert_other_failures_pass_through() {
        let err = insert_outcome("casa", Err(status_error(500))).unwrap_err();
        assert!(matches!(err, PersistenceError::Http { .. }));
        let err = insert_outcome("casa", Err(status_error(404))).unwrap_err();
        assert!(matches!(err, PersistenceError::Http { .. }));
    }

    #[test]
    fn update_of_missing_row_touches_nothing() {
        assert_eq!(update_outcome(Ok(())).unwrap(), 1);
        assert_eq!(update_outcome(Err(status_error(404))).unwrap(), 0);
        let err = update_outcome(Err(status_error(409))).unwrap_err();
        assert!(matches!(err, PersistenceError::Http { .. }));
    }

    #[test]
    fn bad_int64_is_decode_error() {
        let err = decode_cell(&json!({"code": "INT64"}), &json!("one")).unwrap_err();
        assert!(matches!(err, PersistenceError::Decode { .. }));
    }
}
