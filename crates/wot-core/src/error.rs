use thiserror::Error;

use wot_codecs::CodecError;

/// The stable error taxonomy surfaced by every operation on a
/// [`crate::consumed_thing::ConsumedThing`].
///
/// # Why
/// Callers branch on failure mode far more often than on failure text —
/// "is this retryable", "did I misconfigure credentials", "does this
/// affordance even exist" are different decisions. A flat enum with
/// `#[source]` chains keeps that branching exhaustive while still
/// preserving the underlying protocol-client or codec error for logging.
#[derive(Debug, Error)]
pub enum WotError {
    /// The Thing Description has no property, action or event with this
    /// name.
    #[error("thing has no affordance named \"{0}\"")]
    MissingAffordance(String),

    /// The affordance exists, but none of its forms support the
    /// requested operation (e.g. `writeproperty` on a read-only
    /// property).
    #[error("affordance \"{affordance}\" has no form for operation \"{op}\"")]
    NoFormForInteraction { affordance: String, op: String },

    /// None of the schemes named in a form's `href` have a registered
    /// [`crate::protocol_client::ProtocolClientFactory`].
    #[error("no protocol client factory registered for scheme(s): {0:?}")]
    NoClientFactoryForSchemes(Vec<String>),

    /// The underlying `ProtocolClient` reported a transport-level
    /// failure (connection refused, timeout, non-2xx status, ...).
    #[error("protocol client error while {operation} on \"{affordance}\": {source}")]
    ProtocolClientError {
        affordance: String,
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A response declared a `Content-Type` that does not match what the
    /// form's `contentType` promised, and no codec registered for the
    /// declared type could make sense of it either.
    #[error("response media type \"{got}\" does not match form contentType \"{expected}\"")]
    MediaTypeMismatch { expected: String, got: String },

    /// The codec registry has no codec for a media type and no default
    /// codec is configured.
    #[error(transparent)]
    UnsupportedMediaType(#[from] CodecError),

    /// A codec was found for the response's media type, but decoding the
    /// body into a value still failed (malformed JSON, the wrong shape
    /// for the declared schema, ...).
    #[error("failed to decode response body: {0}")]
    DecodeFailed(String),

    /// The caller supplied an [`crate::interaction::InteractionInput`]
    /// whose declared content cannot be produced for this affordance
    /// (e.g. a raw byte body for an action with no matching form).
    #[error("unsupported interaction input for \"{0}\"")]
    UnsupportedInput(String),

    /// `observeProperty`/`subscribeEvent` was called for an affordance
    /// that already has an active subscription.
    #[error("affordance \"{0}\" already has an active subscription")]
    DuplicateSubscription(String),

    /// A form declared a security scheme, but no
    /// [`crate::credentials::CredentialsProvider`] returned credentials
    /// matching it — either because no href matched at all, or because a
    /// matching href held credentials of the wrong kind (in which case
    /// the message reads "Expected <SchemeKind> but found <ActualKind>").
    #[error("no credentials found for security scheme(s) required by \"{0}\"")]
    NoCredentialsFound(String),

    /// The Thing Description itself is structurally invalid in a way
    /// that prevents dispatch (e.g. a form with an unparsable `href`).
    #[error("invalid thing description: {0}")]
    InvalidThingDescription(String),
}

pub type Result<T> = std::result::Result<T, WotError>;
