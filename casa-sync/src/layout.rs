//! Where the casa record lives in each backend family and what it is
//! seeded with.

use serde_json::{json, Value};

use casa_core::{AttrValue, Attributes, BackendFamily};

/// Attribute carrying the configuration blob.
pub const BLOB_ATTRIBUTE: &str = "oxConfApplication";
/// Distinguished name of the record; also stored as `dn` outside the directory.
pub const CASA_DN: &str = "ou=casa,ou=configuration,o=gluu";

const OBJECT_CLASS: &str = "oxApplicationConfiguration";

/// Fixed storage key for a backend family.
pub fn storage_key(family: BackendFamily) -> &'static str {
    match family {
        BackendFamily::Directory => CASA_DN,
        BackendFamily::Document => "configuration_casa",
        BackendFamily::Relational => "casa",
    }
}

/// Attributes for a freshly created record.
///
/// `blob` must already be encoded for the family. The revision is always 1.
pub fn seed_attributes(family: BackendFamily, blob: AttrValue) -> Attributes {
    let mut attrs = Attributes::new();
    match family {
        BackendFamily::Directory => {
            attrs.insert(
                "objectClass".into(),
                AttrValue::List(vec![json!("top"), json!(OBJECT_CLASS)]),
            );
            attrs.insert("oxRevision".into(), AttrValue::from("1"));
        }
        BackendFamily::Document | BackendFamily::Relational => {
            attrs.insert("dn".into(), AttrValue::from(CASA_DN));
            attrs.insert("objectClass".into(), AttrValue::from(OBJECT_CLASS));
            attrs.insert("oxRevision".into(), AttrValue::Scalar(Value::from(1)));
        }
    }
    if family == BackendFamily::Relational {
        attrs.insert(
            "doc_id".into(),
            AttrValue::from(storage_key(BackendFamily::Relational)),
        );
    }
    attrs.insert("ou".into(), AttrValue::from("casa"));
    attrs.insert(BLOB_ATTRIBUTE.into(), blob);
    attrs
}
