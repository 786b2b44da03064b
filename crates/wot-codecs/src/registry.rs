use std::sync::Arc;

use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use serde_json::Value;

use crate::media_type::canonical_media_type;
use crate::{Codec, CodecError, JsonCodec, TextCodec};

/// Process-wide (or runtime-scoped) mapping from canonical media type to
/// codec.
///
/// Registration (`add_codec`) is expected to be rare — typically a handful
/// of calls during servient startup — while `encode`/`decode` are on the
/// hot path of every interaction. `codecs` is therefore a [`DashMap`] for
/// lock-free concurrent reads, and the default flag is an
/// [`ArcSwapOption`] so picking the fallback codec never blocks on a
/// registration in flight.
pub struct CodecRegistry {
    codecs: DashMap<String, Arc<dyn Codec>>,
    default: ArcSwapOption<String>,
}

impl CodecRegistry {
    /// An empty registry with no codecs and no default.
    pub fn new() -> Self {
        Self {
            codecs: DashMap::new(),
            default: ArcSwapOption::empty(),
        }
    }

    /// A registry pre-loaded with `application/json` (the default) and
    /// `text/plain`, matching what every WoT consumer needs out of the box.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.add_codec("application/json", Arc::new(JsonCodec), true);
        registry.add_codec("text/plain", Arc::new(TextCodec), false);
        registry
    }

    /// Registers `codec` under `media_type`. If `make_default` is true,
    /// it becomes the fallback used for unknown or missing media types;
    /// the most recent call with `make_default = true` wins — registration
    /// order otherwise does not matter.
    pub fn add_codec(&self, media_type: impl AsRef<str>, codec: Arc<dyn Codec>, make_default: bool) {
        let key = canonical_media_type(media_type.as_ref());
        if make_default {
            self.default.store(Some(Arc::new(key.clone())));
        }
        self.codecs.insert(key, codec);
    }

    /// Strips parameters and lowercases `type_header`, the comparison
    /// basis for `MediaTypeMismatch` checks performed above this crate.
    pub fn canonicalize(&self, type_header: &str) -> String {
        canonical_media_type(type_header)
    }

    fn resolve(&self, media_type: &str) -> Result<Arc<dyn Codec>, CodecError> {
        let key = canonical_media_type(media_type);
        if let Some(codec) = self.codecs.get(&key) {
            return Ok(Arc::clone(codec.value()));
        }
        if let Some(default_key) = self.default.load_full() {
            if let Some(codec) = self.codecs.get(default_key.as_str()) {
                return Ok(Arc::clone(codec.value()));
            }
        }
        Err(CodecError::UnsupportedMediaType(media_type.to_string()))
    }

    /// Encodes `value` as `media_type`, falling back to the default codec
    /// when no codec is registered for it.
    pub fn encode(&self, value: &Value, media_type: &str) -> Result<Vec<u8>, CodecError> {
        self.resolve(media_type)?.encode(value)
    }

    /// Decodes `bytes` declared as `media_type`. `schema` is passed through
    /// to codecs that support schema-guided decoding; the bundled JSON and
    /// text codecs ignore it.
    pub fn decode(
        &self,
        bytes: &[u8],
        media_type: &str,
        schema: Option<&Value>,
    ) -> Result<Value, CodecError> {
        self.resolve(media_type)?.decode(bytes, schema)
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_default_json_codec() {
        let registry = CodecRegistry::with_defaults();
        let value = serde_json::json!({"value": 42});
        let bytes = registry.encode(&value, "application/json").unwrap();
        let decoded = registry.decode(&bytes, "application/json", None).unwrap();
        assert_eq!(value, decoded);
    }

    #[test]
    fn unknown_media_type_falls_back_to_default() {
        let registry = CodecRegistry::with_defaults();
        let value = serde_json::json!({"value": 1});
        let bytes = registry.encode(&value, "application/senml+json").unwrap();
        let decoded = registry
            .decode(&bytes, "application/senml+json", None)
            .unwrap();
        assert_eq!(value, decoded);
    }

    #[test]
    fn no_default_and_unknown_media_type_fails() {
        let registry = CodecRegistry::new();
        registry.add_codec("application/json", Arc::new(JsonCodec), false);
        let err = registry
            .encode(&serde_json::json!(1), "application/cbor")
            .unwrap_err();
        assert!(matches!(err, CodecError::UnsupportedMediaType(_)));
    }

    #[test]
    fn most_recent_make_default_wins() {
        let registry = CodecRegistry::new();
        registry.add_codec("application/json", Arc::new(JsonCodec), true);
        registry.add_codec("text/plain", Arc::new(TextCodec), true);
        let bytes = registry
            .encode(&serde_json::json!("hi"), "application/unknown")
            .unwrap();
        assert_eq!(bytes, b"hi");
    }
}

#[cfg(test)]
mod proptests {
    use proptest::prelude::*;

    use super::CodecRegistry;

    fn json_value() -> impl Strategy<Value = serde_json::Value> {
        let leaf = prop_oneof![
            Just(serde_json::Value::Null),
            any::<bool>().prop_map(serde_json::Value::from),
            any::<i64>().prop_map(serde_json::Value::from),
            ".*".prop_map(serde_json::Value::from),
        ];
        leaf.prop_recursive(4, 32, 8, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..8).prop_map(serde_json::Value::from),
                prop::collection::btree_map(".*", inner, 0..8)
                    .prop_map(|m| serde_json::Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn json_codec_round_trips_any_value(value in json_value()) {
            let registry = CodecRegistry::with_defaults();
            let bytes = registry.encode(&value, "application/json").unwrap();
            let decoded = registry.decode(&bytes, "application/json", None).unwrap();
            prop_assert_eq!(value, decoded);
        }
    }
}
