//! Narrow comparison of the two watched fields, and the unified diff shown
//! by `casa-bootstrap diff`.

use serde_json::{Map, Value};
use similar::TextDiff;

use casa_renderer::engine::OXD_SECTION;
use casa_renderer::WATCHED_FIELDS;

/// One watched field whose stored value differs from the desired one.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDrift {
    /// Leaf name under `oxd_config`.
    pub field: &'static str,
    /// `None` when the stored blob lacks the field.
    pub stored: Option<Value>,
    pub desired: Value,
}

impl FieldDrift {
    pub fn path(&self) -> String {
        format!("{OXD_SECTION}.{}", self.field)
    }
}

fn watched(blob: &Value, field: &str) -> Option<Value> {
    blob.get(OXD_SECTION).and_then(|s| s.get(field)).cloned()
}

/// Numbers compare by value, so `8443.0` equals `8443`. Everything else
/// compares as JSON.
fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => match (x.as_u64(), y.as_u64()) {
                (Some(x), Some(y)) => x == y,
                _ => x.as_f64().zip(y.as_f64()).is_some_and(|(x, y)| x == y),
            },
        },
        _ => a == b,
    }
}

/// Watched fields whose values differ. A string never equals a number, so
/// `"8443"` and `8443` differ.
pub fn watched_drift(desired: &Value, stored: &Value) -> Vec<FieldDrift> {
    WATCHED_FIELDS
        .iter()
        .filter_map(|&field| {
            let want = watched(desired, field)?;
            let have = watched(stored, field);
            let unchanged = have.as_ref().is_some_and(|have| same_value(have, &want));
            (!unchanged).then_some(FieldDrift {
                field,
                stored: have,
                desired: want,
            })
        })
        .collect()
}

/// Write the desired values into `stored`, leaving every other key alone.
///
/// A missing or non-object `oxd_config` is replaced by an object.
pub fn apply_drift(stored: &mut Value, drift: &[FieldDrift]) {
    if drift.is_empty() {
        return;
    }
    let Value::Object(root) = stored else {
        return;
    };
    let section = root
        .entry(OXD_SECTION)
        .or_insert_with(|| Value::Object(Map::new()));
    if !section.is_object() {
        *section = Value::Object(Map::new());
    }
    if let Value::Object(section) = section {
        for d in drift {
            section.insert(d.field.to_owned(), d.desired.clone());
        }
    }
}

/// Unified diff of two blobs rendered as pretty JSON.
pub fn unified_blob_diff(old_label: &str, old: &Value, new_label: &str, new: &Value) -> String {
    let old_text = pretty(old);
    let new_text = pretty(new);
    TextDiff::from_lines(&old_text, &new_text)
        .unified_diff()
        .header(old_label, new_label)
        .context_radius(3)
        .to_string()
}

fn pretty(value: &Value) -> String {
    let mut text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    text.push('\n');
    text
}
