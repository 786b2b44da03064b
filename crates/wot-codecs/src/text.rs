use serde_json::Value;

use crate::{Codec, CodecError};

/// A minimal `text/plain` codec. Values are round-tripped as JSON strings;
/// encoding a non-string value falls back to its JSON textual form so
/// writes against a `text/plain` form do not require the caller to
/// pre-stringify their input.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextCodec;

impl Codec for TextCodec {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        let rendered = match value {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        };
        Ok(rendered.into_bytes())
    }

    fn decode(&self, bytes: &[u8], _schema: Option<&Value>) -> Result<Value, CodecError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|_| CodecError::InvalidUtf8("text/plain".to_string()))?;
        Ok(Value::String(text.to_string()))
    }
}
