use serde::{Deserialize, Serialize};

/// A `DataSchema`, kept intentionally loose.
///
/// The engine never validates values against this schema itself (no JSON
/// Schema validator is part of the consumption surface); it only reads
/// `content_media_type` to pick a default encoding and hands the raw JSON
/// object through to codecs that want schema hints (e.g. to disambiguate
/// integer vs. float encodings). Validation against `DataSchema` is a
/// concern for a layer above this crate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataSchema {
    #[serde(rename = "type", default)]
    pub schema_type: Option<String>,
    #[serde(rename = "contentMediaType", default)]
    pub content_media_type: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl DataSchema {
    /// The raw schema as a JSON value, passed to
    /// [`wot_codecs::Codec::decode`] as the `schema` hint.
    pub fn as_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
