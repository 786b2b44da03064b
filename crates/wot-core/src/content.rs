use bytes::Bytes;

/// The wire-level payload exchanged with a [`crate::protocol_client::ProtocolClient`]:
/// a declared media type plus the raw bytes, with no assumption yet made
/// about how those bytes decode.
///
/// This is the boundary type between the transport-agnostic dispatch layer
/// and individual protocol clients — an HTTP client produces one from a
/// response body and its `Content-Type` header, a CoAP client from a
/// payload and its Content-Format option, and so on.
#[derive(Debug, Clone)]
pub struct Content {
    pub media_type: String,
    pub body: Bytes,
}

impl Content {
    pub fn new(media_type: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            media_type: media_type.into(),
            body: body.into(),
        }
    }

    pub fn canonical_media_type(&self) -> String {
        wot_codecs::canonical_media_type(&self.media_type)
    }
}
