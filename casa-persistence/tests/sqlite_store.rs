//! Relational backend against a real SQLite file.

use serde_json::json;
use tempfile::TempDir;

use casa_core::{AttrValue, Attributes, BackendKind, SqlDialect};
use casa_persistence::relational::TABLE;
use casa_persistence::{
    Backend, FetchOptions, PersistenceError, RelationalBackend, SqlStore, UpdateMode,
};

const KEY: &str = "casa";

fn open(dir: &TempDir) -> RelationalBackend<SqlStore> {
    let path = dir.path().join("casa.db");
    let url = format!("sqlite://{}?mode=rwc", path.display());
    let mut store = SqlStore::connect_url(SqlDialect::Sqlite, &url).unwrap();
    store
        .execute(&format!(
            "CREATE TABLE IF NOT EXISTS \"{TABLE}\" (\
             \"doc_id\" TEXT PRIMARY KEY, \
             \"dn\" TEXT, \
             \"ou\" TEXT, \
             \"oxConfApplication\" TEXT, \
             \"oxRevision\" INTEGER)"
        ))
        .unwrap();
    RelationalBackend::new(store, BackendKind::Sql)
}

fn seed() -> Attributes {
    let blob = json!({"oxd_config": {"host": "oxd.local", "port": 8443}}).to_string();
    let mut attrs = Attributes::new();
    attrs.insert("dn".into(), "ou=casa,ou=configuration,o=gluu".into());
    attrs.insert("ou".into(), "casa".into());
    attrs.insert("oxConfApplication".into(), blob.into());
    attrs.insert("oxRevision".into(), 1.into());
    attrs
}

#[test]
fn absent_row_is_none() {
    let dir = TempDir::new().unwrap();
    let mut backend = open(&dir);
    assert!(backend.fetch(KEY, &FetchOptions::default()).unwrap().is_none());
    backend.close().unwrap();
}

#[test]
fn create_then_fetch_round_trips_blob() {
    let dir = TempDir::new().unwrap();
    let mut backend = open(&dir);
    backend.create(KEY, &seed()).unwrap();

    let entry = backend.fetch(KEY, &FetchOptions::default()).unwrap().unwrap();
    assert_eq!(entry.id(), KEY);
    assert_eq!(entry.get("ou").and_then(AttrValue::as_str), Some("casa"));
    assert!(entry.get("oxRevision").is_some());

    let text = entry.get("oxConfApplication").and_then(AttrValue::as_str).unwrap();
    let blob: serde_json::Value = serde_json::from_str(text).unwrap();
    assert_eq!(blob["oxd_config"]["host"], "oxd.local");
    assert_eq!(blob["oxd_config"]["port"], 8443);
    backend.close().unwrap();
}

#[test]
fn second_create_is_already_exists() {
    let dir = TempDir::new().unwrap();
    let mut backend = open(&dir);
    backend.create(KEY, &seed()).unwrap();
    let err = backend.create(KEY, &seed()).unwrap_err();
    assert!(matches!(err, PersistenceError::AlreadyExists { .. }), "{err}");
}

#[test]
fn update_replaces_only_named_column() {
    let dir = TempDir::new().unwrap();
    let mut backend = open(&dir);
    backend.create(KEY, &seed()).unwrap();

    let mut patch = Attributes::new();
    patch.insert("oxConfApplication".into(), "{\"oxd_config\":{}}".into());
    backend.update(KEY, &patch, UpdateMode::Replace).unwrap();

    let entry = backend.fetch(KEY, &FetchOptions::default()).unwrap().unwrap();
    assert_eq!(
        entry.get("oxConfApplication").and_then(AttrValue::as_str),
        Some("{\"oxd_config\":{}}")
    );
    assert_eq!(entry.get("ou").and_then(AttrValue::as_str), Some("casa"));
}

#[test]
fn update_of_missing_row_fails() {
    let dir = TempDir::new().unwrap();
    let mut backend = open(&dir);
    let err = backend.update(KEY, &seed(), UpdateMode::Replace).unwrap_err();
    assert!(matches!(err, PersistenceError::Rejected { .. }));
}
