use serde_json::Value;

use crate::{Codec, CodecError};

/// The fallback codec almost every Thing Description relies on implicitly:
/// `application/json`.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(value).map_err(|source| CodecError::Encode {
            media_type: "application/json".to_string(),
            source,
        })
    }

    fn decode(&self, bytes: &[u8], _schema: Option<&Value>) -> Result<Value, CodecError> {
        serde_json::from_slice(bytes).map_err(|source| CodecError::Decode {
            media_type: "application/json".to_string(),
            source,
        })
    }
}
