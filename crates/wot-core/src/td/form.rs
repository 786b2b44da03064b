use serde::{Deserialize, Serialize};

/// The `op` values a [`Form`] can declare, restricted to the ones the
/// consumption engine dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Readproperty,
    Writeproperty,
    Observeproperty,
    Unobserveproperty,
    Invokeaction,
    Subscribeevent,
    Unsubscribeevent,
    Readallproperties,
    Writeallproperties,
    Readmultipleproperties,
    Writemultipleproperties,
}

/// One element of a Thing Description `forms` array.
///
/// `op` defaults per affordance type are *not* filled in here — callers
/// consult the owning [`super::Property`]/[`super::Action`]/[`super::Event`]
/// for the implicit default when a form omits `op`, matching the TD 1.1
/// rule that the default depends on which affordance the form sits under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Form {
    pub href: String,
    #[serde(default)]
    pub op: Vec<Operation>,
    #[serde(rename = "contentType", default = "default_content_type")]
    pub content_type: String,
    #[serde(rename = "contentCoding", default)]
    pub content_coding: Option<String>,
    #[serde(rename = "subprotocol", default)]
    pub subprotocol: Option<String>,
    #[serde(rename = "security", default)]
    pub security: Vec<String>,
    #[serde(rename = "response", default)]
    pub response: Option<ExpectedResponse>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_content_type() -> String {
    "application/json".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectedResponse {
    #[serde(rename = "contentType", default)]
    pub content_type: Option<String>,
}

/// A [`Form`] paired with the resolved absolute URI it was expanded
/// against and the index it occupied in the owning affordance's `forms`
/// array.
///
/// Protocol binding dispatch never mutates the Thing Description's own
/// forms in place — each dispatch produces a fresh `AugmentedForm` with
/// the resolved `href`, so concurrent interactions against the same
/// affordance with different URI variables never observe each other's
/// resolution.
#[derive(Debug, Clone)]
pub struct AugmentedForm {
    pub form_index: usize,
    pub form: Form,
    pub resolved_href: String,
}

impl AugmentedForm {
    pub fn scheme(&self) -> Option<&str> {
        self.resolved_href.split_once(':').map(|(scheme, _)| scheme)
    }

    pub fn supports(&self, op: Operation, implicit_default: &[Operation]) -> bool {
        if self.form.op.is_empty() {
            implicit_default.contains(&op)
        } else {
            self.form.op.contains(&op)
        }
    }
}
