use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use serde_json::Value;

use crate::content::Content;
use crate::error::{Result, WotError};
use crate::td::DataSchema;
use wot_codecs::CodecRegistry;

/// What a caller supplies to `writeProperty`, `writeMultipleProperties` or
/// `invokeAction`.
///
/// `Value` is the common case — most callers think in JSON values, not
/// bytes, and the engine picks the codec from the target form's
/// `contentType`. `Raw` exists for callers who already hold pre-encoded
/// bytes for a specific media type (e.g. forwarding a body received
/// elsewhere) and want to bypass re-encoding.
#[derive(Debug, Clone)]
pub enum InteractionInput {
    Value(Value),
    Raw(Content),
}

impl InteractionInput {
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }

    pub fn raw(media_type: impl Into<String>, body: impl Into<bytes::Bytes>) -> Self {
        Self::Raw(Content::new(media_type, body))
    }

    /// Produces the bytes to send on the wire, encoding `Value` variants
    /// with `codecs` and passing `Raw` variants through unchanged.
    pub fn encode(&self, codecs: &CodecRegistry, media_type: &str) -> Result<bytes::Bytes> {
        match self {
            InteractionInput::Value(v) => Ok(bytes::Bytes::from(codecs.encode(v, media_type)?)),
            InteractionInput::Raw(content) => Ok(content.body.clone()),
        }
    }
}

/// The result of a read, observation tick, event notification or action
/// invocation response.
///
/// Decoding is deferred until [`InteractionOutput::value`] is called, and
/// memoized after the first call — re-reading a large body as a
/// [`Value`] twice does not re-run the codec. `array_buffer` bypasses
/// decoding entirely and is always available, even after `value` has
/// been called.
pub struct InteractionOutput {
    content: Content,
    schema: Option<DataSchema>,
    codecs: Arc<CodecRegistry>,
    decoded: OnceLock<std::result::Result<Value, String>>,
    data_used: AtomicBool,
}

impl std::fmt::Debug for InteractionOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractionOutput")
            .field("content", &self.content)
            .field("schema", &self.schema)
            .field("decoded", &self.decoded.get())
            .field("data_used", &self.data_used.load(Ordering::Relaxed))
            .finish()
    }
}

impl InteractionOutput {
    pub fn new(content: Content, schema: Option<DataSchema>, codecs: Arc<CodecRegistry>) -> Self {
        Self {
            content,
            schema,
            codecs,
            decoded: OnceLock::new(),
            data_used: AtomicBool::new(false),
        }
    }

    pub fn content_type(&self) -> &str {
        &self.content.media_type
    }

    /// The raw response bytes, untouched by codec decoding.
    pub fn array_buffer(&self) -> &bytes::Bytes {
        &self.content.body
    }

    /// Decodes the body as a [`Value`] using the registered codec for
    /// `content_type`, caching the result. Safe to call more than once;
    /// later calls return the memoized outcome instead of re-decoding.
    pub fn value(&self) -> Result<Value> {
        self.data_used.store(true, Ordering::Relaxed);
        let schema_json = self.schema.as_ref().map(DataSchema::as_json);
        let result = self.decoded.get_or_init(|| {
            self.codecs
                .decode(&self.content.body, &self.content.media_type, schema_json.as_ref())
                .map_err(|e| e.to_string())
        });
        result.clone().map_err(WotError::DecodeFailed)
    }

    /// Whether [`InteractionOutput::value`] has ever been called on this
    /// instance. `readAllProperties`/`readMultipleProperties` use this to
    /// decide whether a property that failed to decode should be silently
    /// dropped or surfaced — a property no caller ever inspected is not
    /// worth failing the whole read for.
    pub fn data_used(&self) -> bool {
        self.data_used.load(Ordering::Relaxed)
    }
}
