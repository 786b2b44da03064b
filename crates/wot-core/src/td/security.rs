use serde::{Deserialize, Serialize};

/// The `scheme` discriminant of a WoT security scheme definition
/// (`securityDefinitions` entries), as consumed by [`crate::credentials`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecuritySchemeKind {
    Nosec,
    Basic,
    Digest,
    Bearer,
    Psk,
    Apikey,
    Oauth2,
    Pop,
    Cert,
    Public,
}

/// One named entry from a Thing Description's `securityDefinitions` map.
///
/// Only the fields the consumption engine actually inspects are modeled;
/// unknown fields are preserved in `extra` so a form can be re-serialized
/// without losing scheme-specific detail it doesn't need to interpret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityScheme {
    pub scheme: SecuritySchemeKind,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "in", default)]
    pub location: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SecurityScheme {
    pub fn requires_credentials(&self) -> bool {
        !matches!(self.scheme, SecuritySchemeKind::Nosec)
    }
}
