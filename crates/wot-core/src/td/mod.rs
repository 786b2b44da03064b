//! The subset of the W3C WoT Thing Description 1.1 model the consumption
//! engine needs: affordances, forms and security definitions. Anything a
//! consumer doesn't dispatch on (titles, descriptions, links, ...) is kept
//! as opaque JSON in `extra` fields so a TD round-trips through this model
//! without losing data it wasn't asked to interpret.

mod form;
mod schema;
mod security;

pub use form::{AugmentedForm, ExpectedResponse, Form, Operation};
pub use schema::DataSchema;
pub use security::{SecurityScheme, SecuritySchemeKind};

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{Result, WotError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    #[serde(flatten)]
    pub data_schema: DataSchema,
    #[serde(default)]
    pub forms: Vec<Form>,
    #[serde(rename = "readOnly", default)]
    pub read_only: bool,
    #[serde(rename = "writeOnly", default)]
    pub write_only: bool,
    #[serde(rename = "observable", default)]
    pub observable: bool,
    #[serde(rename = "uriVariables", default)]
    pub uri_variables: serde_json::Map<String, serde_json::Value>,
}

impl Property {
    fn implicit_ops(&self) -> Vec<Operation> {
        let mut ops = Vec::new();
        if !self.write_only {
            ops.push(Operation::Readproperty);
        }
        if !self.read_only {
            ops.push(Operation::Writeproperty);
        }
        ops
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    #[serde(default)]
    pub forms: Vec<Form>,
    #[serde(rename = "input", default)]
    pub input: Option<DataSchema>,
    #[serde(rename = "output", default)]
    pub output: Option<DataSchema>,
    #[serde(rename = "uriVariables", default)]
    pub uri_variables: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub forms: Vec<Form>,
    #[serde(rename = "data", default)]
    pub data: Option<DataSchema>,
    #[serde(rename = "uriVariables", default)]
    pub uri_variables: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThingDescription {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub base: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, Property>,
    #[serde(default)]
    pub actions: BTreeMap<String, Action>,
    #[serde(default)]
    pub events: BTreeMap<String, Event>,
    #[serde(rename = "securityDefinitions", default)]
    pub security_definitions: BTreeMap<String, SecurityScheme>,
    #[serde(default)]
    pub security: Vec<String>,
}

impl ThingDescription {
    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| WotError::InvalidThingDescription(e.to_string()))
    }

    /// Resolves `form.href` against `self.base` (when `href` is relative)
    /// and expands any `{var}` placeholders using `uri_variables`,
    /// producing the [`AugmentedForm`] every dispatch step operates on.
    ///
    /// A fresh copy is produced per call rather than caching the
    /// resolution on the form itself — two concurrent interactions
    /// against the same affordance may supply different URI variables.
    pub fn augment_form(
        &self,
        form: &Form,
        form_index: usize,
        uri_variables: &HashMap<String, String>,
    ) -> Result<AugmentedForm> {
        let expanded = match wot_uri_template::expand(&form.href, uri_variables) {
            wot_uri_template::Expansion::Unchanged(s) => s,
            wot_uri_template::Expansion::Expanded(s) => s,
        };
        let resolved = resolve_href(self.base.as_deref(), &expanded)?;
        Ok(AugmentedForm {
            form_index,
            form: form.clone(),
            resolved_href: resolved,
        })
    }

    pub fn property(&self, name: &str) -> Result<&Property> {
        self.properties
            .get(name)
            .ok_or_else(|| WotError::MissingAffordance(name.to_string()))
    }

    pub fn action(&self, name: &str) -> Result<&Action> {
        self.actions
            .get(name)
            .ok_or_else(|| WotError::MissingAffordance(name.to_string()))
    }

    pub fn event(&self, name: &str) -> Result<&Event> {
        self.events
            .get(name)
            .ok_or_else(|| WotError::MissingAffordance(name.to_string()))
    }

    /// All [`AugmentedForm`]s for `property_name` that declare (explicitly
    /// or by the property's implicit default) support for `op`.
    pub fn forms_for_property(
        &self,
        property_name: &str,
        op: Operation,
        uri_variables: &HashMap<String, String>,
    ) -> Result<Vec<AugmentedForm>> {
        let property = self.property(property_name)?;
        let implicit = property.implicit_ops();
        property
            .forms
            .iter()
            .enumerate()
            .filter(|(_, f)| f.supports_by(op, &implicit))
            .map(|(i, f)| self.augment_form(f, i, uri_variables))
            .collect()
    }

    pub fn forms_for_action(
        &self,
        action_name: &str,
        uri_variables: &HashMap<String, String>,
    ) -> Result<Vec<AugmentedForm>> {
        let action = self.action(action_name)?;
        let implicit = [Operation::Invokeaction];
        action
            .forms
            .iter()
            .enumerate()
            .filter(|(_, f)| f.supports_by(Operation::Invokeaction, &implicit))
            .map(|(i, f)| self.augment_form(f, i, uri_variables))
            .collect()
    }

    pub fn forms_for_event(
        &self,
        event_name: &str,
        op: Operation,
        uri_variables: &HashMap<String, String>,
    ) -> Result<Vec<AugmentedForm>> {
        let event = self.event(event_name)?;
        let implicit = [Operation::Subscribeevent];
        event
            .forms
            .iter()
            .enumerate()
            .filter(|(_, f)| f.supports_by(op, &implicit))
            .map(|(i, f)| self.augment_form(f, i, uri_variables))
            .collect()
    }

    /// Every form declared on `property_name`, regardless of which
    /// operations it supports. Used by unsubscribe-form scoring, which
    /// needs to weigh op-match as one of several criteria rather than
    /// have it pre-applied as a filter.
    pub fn all_forms_for_property(
        &self,
        property_name: &str,
        uri_variables: &HashMap<String, String>,
    ) -> Result<Vec<AugmentedForm>> {
        let property = self.property(property_name)?;
        property
            .forms
            .iter()
            .enumerate()
            .map(|(i, f)| self.augment_form(f, i, uri_variables))
            .collect()
    }

    /// Every form declared on `event_name`, regardless of which
    /// operations it supports. See [`ThingDescription::all_forms_for_property`].
    pub fn all_forms_for_event(
        &self,
        event_name: &str,
        uri_variables: &HashMap<String, String>,
    ) -> Result<Vec<AugmentedForm>> {
        let event = self.event(event_name)?;
        event
            .forms
            .iter()
            .enumerate()
            .map(|(i, f)| self.augment_form(f, i, uri_variables))
            .collect()
    }
}

impl Form {
    fn supports_by(&self, op: Operation, implicit_default: &[Operation]) -> bool {
        if self.op.is_empty() {
            implicit_default.contains(&op)
        } else {
            self.op.contains(&op)
        }
    }
}

fn resolve_href(base: Option<&str>, href: &str) -> Result<String> {
    if url::Url::parse(href).is_ok() {
        return Ok(href.to_string());
    }
    let base = base.ok_or_else(|| {
        WotError::InvalidThingDescription(format!(
            "form href \"{href}\" is relative but the thing has no \"base\""
        ))
    })?;
    let base_url = url::Url::parse(base)
        .map_err(|e| WotError::InvalidThingDescription(format!("invalid base \"{base}\": {e}")))?;
    let joined = base_url
        .join(href)
        .map_err(|e| WotError::InvalidThingDescription(format!("cannot join \"{href}\" onto base \"{base}\": {e}")))?;
    Ok(joined.to_string())
}
