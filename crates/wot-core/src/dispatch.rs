//! Protocol Binding Dispatch: turning a list of candidate forms into one
//! concrete protocol client call.
//!
//! The steps are deliberately kept as free functions rather than methods
//! on [`crate::consumed_thing::ConsumedThing`] — each is independently
//! testable against fixture forms and a fixture [`Servient`] without
//! standing up a whole `ConsumedThing`.

use std::sync::Arc;

use crate::credentials::CredentialsLookup;
use crate::error::{Result, WotError};
use crate::protocol_client::ProtocolClient;
use crate::servient::Servient;
use crate::td::{AugmentedForm, Operation, ThingDescription};

/// Picks the form to use out of every form that (already) supports the
/// requested operation, by the servient's scheme priority. Ties between
/// forms whose schemes share a priority rank do not occur — each scheme
/// occupies exactly one rank — so the first form reaching the best rank,
/// in TD declaration order, wins.
pub fn select_form<'a>(forms: &'a [AugmentedForm], servient: &Servient) -> Result<&'a AugmentedForm> {
    let priority = servient.supported_schemes();
    let mut best: Option<(&AugmentedForm, usize)> = None;
    for form in forms {
        let Some(scheme) = form.scheme() else { continue };
        let Some(rank) = priority.iter().position(|candidate| *candidate == scheme) else {
            continue;
        };
        let better = match &best {
            None => true,
            Some((_, best_rank)) => rank < *best_rank,
        };
        if better {
            best = Some((form, rank));
        }
    }
    best.map(|(form, _)| form).ok_or_else(|| {
        let schemes = forms.iter().filter_map(|f| f.scheme().map(str::to_string)).collect();
        WotError::NoClientFactoryForSchemes(schemes)
    })
}

/// Picks the form at an explicit, caller-supplied `formIndex`, bypassing
/// scheme-priority selection. Used when a caller already knows which form
/// it wants (e.g. retrying the exact form a previous call used).
pub fn select_form_by_index<'a>(forms: &'a [AugmentedForm], form_index: usize) -> Result<&'a AugmentedForm> {
    forms
        .iter()
        .find(|f| f.form_index == form_index)
        .ok_or_else(|| WotError::InvalidThingDescription(format!("no form at index {form_index}")))
}

/// Picks the form used to tear down a subscription (`unobserveproperty`/
/// `unsubscribeevent`), scored against the form the subscription was
/// opened with.
///
/// If the subscribe form's own `op` already lists the target unsubscribe
/// operation, it is reused verbatim. Otherwise every *other* form declared
/// on the affordance — `all_forms`, not pre-filtered by op — is scored by
/// summing one point each for: (a) `op` contains the target unsubscribe
/// operation, (b) the same URI scheme *and host* as the subscribe form,
/// (c) the same `contentType` as the subscribe form. The subscribe form
/// itself is excluded from scoring: it has already failed the exact-match
/// shortcut above, so letting it win on host/content-type alone would
/// always trivially succeed (a form always shares its own host and
/// content type) and the zero-score failure path below could never fire.
/// The highest score wins; ties keep the earliest (lowest `form_index`)
/// candidate. A maximum score of zero means no other form is usable for
/// teardown, which fails with `NoFormForInteraction` rather than silently
/// falling back to the subscribe form.
pub fn select_unsubscribe_form<'a>(
    subscribe_form: &AugmentedForm,
    all_forms: &'a [AugmentedForm],
    target_op: Operation,
    affordance: &str,
) -> Result<&'a AugmentedForm> {
    if subscribe_form.form.op.contains(&target_op) {
        return all_forms
            .iter()
            .find(|f| f.form_index == subscribe_form.form_index)
            .ok_or_else(|| no_form_for_unsubscribe(affordance, target_op));
    }

    let subscribe_origin = scheme_and_host(&subscribe_form.resolved_href);
    let mut best: Option<(&AugmentedForm, u8)> = None;
    for candidate in all_forms.iter().filter(|f| f.form_index != subscribe_form.form_index) {
        let mut score = 0u8;
        if candidate.form.op.contains(&target_op) {
            score += 1;
        }
        if subscribe_origin.is_some() && scheme_and_host(&candidate.resolved_href) == subscribe_origin {
            score += 1;
        }
        if candidate.form.content_type == subscribe_form.form.content_type {
            score += 1;
        }
        let better = match &best {
            None => true,
            Some((_, best_score)) => score > *best_score,
        };
        if better {
            best = Some((candidate, score));
        }
    }

    match best {
        Some((form, score)) if score > 0 => Ok(form),
        _ => Err(no_form_for_unsubscribe(affordance, target_op)),
    }
}

fn scheme_and_host(href: &str) -> Option<(String, String)> {
    let url = url::Url::parse(href).ok()?;
    Some((url.scheme().to_string(), url.host_str()?.to_string()))
}

fn no_form_for_unsubscribe(affordance: &str, op: Operation) -> WotError {
    WotError::NoFormForInteraction {
        affordance: affordance.to_string(),
        op: operation_name(op).to_string(),
    }
}

fn operation_name(op: Operation) -> &'static str {
    match op {
        Operation::Readproperty => "readproperty",
        Operation::Writeproperty => "writeproperty",
        Operation::Observeproperty => "observeproperty",
        Operation::Unobserveproperty => "unobserveproperty",
        Operation::Invokeaction => "invokeaction",
        Operation::Subscribeevent => "subscribeevent",
        Operation::Unsubscribeevent => "unsubscribeevent",
        Operation::Readallproperties => "readallproperties",
        Operation::Writeallproperties => "writeallproperties",
        Operation::Readmultipleproperties => "readmultipleproperties",
        Operation::Writemultipleproperties => "writemultipleproperties",
    }
}

/// Resolves the [`ProtocolClient`] for `form`'s scheme, creating it via
/// the servient's factory on first use.
pub async fn client_for_form(servient: &Servient, form: &AugmentedForm) -> Result<Arc<dyn ProtocolClient>> {
    let scheme = form.scheme().ok_or_else(|| {
        WotError::InvalidThingDescription(format!("form href \"{}\" has no scheme", form.resolved_href))
    })?;
    servient.get_client_for(scheme).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::td::Form;

    fn form(form_index: usize, href: &str, op: Vec<Operation>, content_type: &str) -> AugmentedForm {
        AugmentedForm {
            form_index,
            form: Form {
                href: href.to_string(),
                op,
                content_type: content_type.to_string(),
                content_coding: None,
                subprotocol: None,
                security: Vec::new(),
                response: None,
                extra: serde_json::Map::new(),
            },
            resolved_href: href.to_string(),
        }
    }

    #[test]
    fn unsubscribe_reuses_subscribe_form_when_its_own_op_already_covers_it() {
        let subscribe = form(0, "mock://thing/events/alert", vec![Operation::Subscribeevent, Operation::Unsubscribeevent], "application/json");
        let all_forms = vec![subscribe.clone()];
        let picked = select_unsubscribe_form(&subscribe, &all_forms, Operation::Unsubscribeevent, "alert").unwrap();
        assert_eq!(picked.form_index, 0);
    }

    #[test]
    fn unsubscribe_scoring_picks_best_of_several_decoys() {
        let subscribe = form(0, "mock://thing-a/events/alert", vec![Operation::Subscribeevent], "application/json");
        // Wrong op, wrong host, wrong content type: score 0.
        let decoy_zero = form(1, "other://thing-b/x", vec![], "application/cbor");
        // Right op only: score 1.
        let decoy_op_only = form(2, "other://thing-b/x", vec![Operation::Unsubscribeevent], "application/cbor");
        // Right op and same host: score 2.
        let decoy_op_and_host = form(3, "mock://thing-a/events/alert/unsubscribe", vec![Operation::Unsubscribeevent], "application/cbor");
        // Right op, same host, same content type: score 3 — the winner.
        let best = form(4, "mock://thing-a/events/alert/stop", vec![Operation::Unsubscribeevent], "application/json");
        let all_forms = vec![subscribe.clone(), decoy_zero, decoy_op_only, decoy_op_and_host, best];

        let picked = select_unsubscribe_form(&subscribe, &all_forms, Operation::Unsubscribeevent, "alert").unwrap();
        assert_eq!(picked.form_index, 4);
    }

    #[test]
    fn unsubscribe_scoring_ties_break_to_lowest_form_index() {
        let subscribe = form(0, "mock://thing-a/events/alert", vec![Operation::Subscribeevent], "application/json");
        let tie_a = form(1, "mock://thing-a/events/alert/a", vec![Operation::Unsubscribeevent], "application/json");
        let tie_b = form(2, "mock://thing-a/events/alert/b", vec![Operation::Unsubscribeevent], "application/json");
        let all_forms = vec![subscribe.clone(), tie_a, tie_b];

        let picked = select_unsubscribe_form(&subscribe, &all_forms, Operation::Unsubscribeevent, "alert").unwrap();
        assert_eq!(picked.form_index, 1);
    }

    #[test]
    fn unsubscribe_scoring_fails_when_every_candidate_scores_zero() {
        let subscribe = form(0, "mock://thing-a/events/alert", vec![Operation::Subscribeevent], "application/json");
        let decoy = form(1, "other://thing-b/x", vec![], "application/cbor");
        let all_forms = vec![subscribe.clone(), decoy];

        let err = select_unsubscribe_form(&subscribe, &all_forms, Operation::Unsubscribeevent, "alert").unwrap_err();
        assert!(matches!(err, WotError::NoFormForInteraction { affordance, op } if affordance == "alert" && op == "unsubscribeevent"));
    }
}

/// Installs credentials for whichever security schemes `form` (or, if the
/// form declares none, the thing-level default) requires, skipping
/// schemes already installed for this exact href.
pub async fn ensure_credentials(
    servient: &Servient,
    td: &ThingDescription,
    form: &AugmentedForm,
    client: &Arc<dyn ProtocolClient>,
) -> Result<()> {
    let security_names: &[String] = if !form.form.security.is_empty() {
        &form.form.security
    } else {
        &td.security
    };

    for name in security_names {
        let Some(scheme_def) = td.security_definitions.get(name) else {
            continue;
        };
        if !scheme_def.requires_credentials() {
            continue;
        }
        let install_key = format!("{}::{name}", form.resolved_href);
        if servient.mark_credentials_installed(&install_key) {
            continue;
        }
        let provider = servient
            .credentials_provider()
            .ok_or_else(|| WotError::NoCredentialsFound(name.clone()))?;
        let credentials = match provider.credentials_for(&form.resolved_href, scheme_def.scheme) {
            CredentialsLookup::Found(credentials) => credentials,
            CredentialsLookup::KindMismatch { expected, actual } => {
                return Err(WotError::NoCredentialsFound(format!(
                    "Expected {expected:?}Credentials but found {actual:?}Credentials"
                )));
            }
            CredentialsLookup::NotFound => return Err(WotError::NoCredentialsFound(name.clone())),
        };
        client.set_credentials(credentials);
    }
    Ok(())
}
