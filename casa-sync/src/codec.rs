//! Blob serialization per backend family.
//!
//! Directory and relational stores hold the blob as JSON text inside one
//! attribute; the document store holds it as a nested value. Numbers keep
//! their stored text through a decode and encode, whatever their magnitude.

use serde_json::Value;

use casa_core::{AttrValue, BackendFamily};

use crate::error::SyncError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobCodec {
    /// JSON text in a string attribute.
    Text,
    /// Stored as-is.
    Native,
}

impl BlobCodec {
    pub fn for_family(family: BackendFamily) -> Self {
        match family {
            BackendFamily::Document => BlobCodec::Native,
            BackendFamily::Directory | BackendFamily::Relational => BlobCodec::Text,
        }
    }

    pub fn encode(self, blob: &Value) -> AttrValue {
        match self {
            BlobCodec::Text => AttrValue::Scalar(Value::String(blob.to_string())),
            BlobCodec::Native => AttrValue::from(blob.clone()),
        }
    }

    pub fn decode(self, stored: &AttrValue) -> Result<Value, SyncError> {
        match self {
            BlobCodec::Text => {
                let text = stored.as_str().ok_or_else(|| SyncError::MalformedStoredBlob {
                    reason: "expected a JSON string".to_owned(),
                })?;
                serde_json::from_str(text).map_err(|e| SyncError::MalformedStoredBlob {
                    reason: e.to_string(),
                })
            }
            BlobCodec::Native => Ok(stored.clone().into_json()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn family_selects_codec() {
        assert_eq!(BlobCodec::for_family(BackendFamily::Directory), BlobCodec::Text);
        assert_eq!(BlobCodec::for_family(BackendFamily::Relational), BlobCodec::Text);
        assert_eq!(BlobCodec::for_family(BackendFamily::Document), BlobCodec::Native);
    }

    #[test]
    fn text_codec_stores_string() {
        let blob = json!({"oxd_config": {"host": "h", "port": 1}});
        let encoded = BlobCodec::Text.encode(&blob);
        assert!(encoded.as_str().is_some());
        assert_eq!(BlobCodec::Text.decode(&encoded).unwrap(), blob);
    }

    #[test]
    fn native_codec_passes_through() {
        let blob = json!({"oxd_config": {"host": "h"}});
        let encoded = BlobCodec::Native.encode(&blob);
        assert_eq!(encoded, AttrValue::Scalar(blob.clone()));
        assert_eq!(BlobCodec::Native.decode(&encoded).unwrap(), blob);
    }

    #[test]
    fn text_codec_keeps_number_text() {
        let text = r#"{"issued_at":123456789012345678901234567890,"ratio":1.10,"small":-7}"#;
        let blob = BlobCodec::Text.decode(&AttrValue::from(text)).unwrap();
        assert_eq!(BlobCodec::Text.encode(&blob).as_str(), Some(text));
    }

    #[test]
    fn text_codec_rejects_garbage() {
        let err = BlobCodec::Text.decode(&AttrValue::from("{not json")).unwrap_err();
        assert!(matches!(err, SyncError::MalformedStoredBlob { .. }));
        let err = BlobCodec::Text.decode(&AttrValue::from(3)).unwrap_err();
        assert!(matches!(err, SyncError::MalformedStoredBlob { .. }));
    }
}
