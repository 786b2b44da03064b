//! Content Codec Registry.
//!
//! Thing Description forms describe interaction payloads by media type, not
//! by Rust type — a property might be read as `application/json` today and
//! re-exposed as `application/cbor` tomorrow without touching the
//! consumption engine. This crate is the seam that isolates that choice: a
//! [`Codec`] turns a [`serde_json::Value`] into bytes and back for one
//! media type, and a [`CodecRegistry`] picks the right codec by the
//! canonicalized `Content-Type` string, falling back to a configured
//! default when a form's media type has no dedicated codec.
//!
//! `wot-codecs` intentionally knows nothing about Thing Descriptions or
//! `DataSchema` — the optional `schema` parameter on [`Codec::decode`] is a
//! bare `serde_json::Value` so this crate stays a leaf dependency instead
//! of cycling back through the TD model.

mod error;
mod json;
mod media_type;
mod registry;
mod text;

pub use error::CodecError;
pub use json::JsonCodec;
pub use media_type::canonical_media_type;
pub use registry::CodecRegistry;
pub use text::TextCodec;

use serde_json::Value;

/// Converts a value to and from the bytes carried on the wire for one
/// media type.
///
/// Implementations must be stateless with respect to individual
/// encode/decode calls — a single codec instance is shared across every
/// interaction that uses its media type, so any per-call state belongs in
/// the call, not the codec.
pub trait Codec: Send + Sync {
    /// Serializes `value` into the wire representation for this codec's
    /// media type.
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError>;

    /// Parses `bytes` back into a [`Value`]. `schema` is an optional
    /// `DataSchema`-shaped hint from the Thing Description; most codecs
    /// ignore it, but schema-aware codecs (e.g. one disambiguating CBOR
    /// integer/float encodings) may use it to pick a representation.
    fn decode(&self, bytes: &[u8], schema: Option<&Value>) -> Result<Value, CodecError>;
}
