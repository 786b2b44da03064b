use thiserror::Error;

/// Failure modes of the [`crate::CodecRegistry`].
#[derive(Debug, Error)]
pub enum CodecError {
    /// No codec is registered for the requested media type and no codec
    /// is flagged as the registry default.
    #[error("no codec registered for media type \"{0}\" and no default codec is set")]
    UnsupportedMediaType(String),

    /// A codec's `encode` implementation failed.
    #[error("failed to encode value as \"{media_type}\": {source}")]
    Encode {
        media_type: String,
        #[source]
        source: serde_json::Error,
    },

    /// A codec's `decode` implementation failed.
    #[error("failed to decode bytes as \"{media_type}\": {source}")]
    Decode {
        media_type: String,
        #[source]
        source: serde_json::Error,
    },

    /// A text-oriented codec received bytes that are not valid UTF-8.
    #[error("bytes are not valid UTF-8 for media type \"{0}\"")]
    InvalidUtf8(String),
}
