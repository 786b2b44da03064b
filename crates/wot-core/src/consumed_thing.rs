use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::stream::{BoxStream, StreamExt};
use futures::Stream;
use tokio::sync::Notify;

use crate::content::Content;
use crate::dispatch::{self, select_form, select_form_by_index, select_unsubscribe_form};
use crate::error::{Result, WotError};
use crate::interaction::{InteractionInput, InteractionOutput};
use crate::servient::Servient;
use crate::subscription::{Subscription, SubscriptionRegistry};
use crate::td::{AugmentedForm, Operation, ThingDescription};
use wot_codecs::CodecRegistry;

/// Enforces spec §4.6: if `form` declares a `response.contentType`, the
/// actually-returned `content`'s media type must canonically match it.
/// Forms that declare no expected response type impose no constraint —
/// the form's own `contentType` governs requests, not responses.
fn check_response_media_type(form: &AugmentedForm, content: &Content) -> Result<()> {
    let Some(expected) = form.form.response.as_ref().and_then(|r| r.content_type.as_deref()) else {
        return Ok(());
    };
    let expected = wot_codecs::canonical_media_type(expected);
    let got = content.canonical_media_type();
    if expected != got {
        return Err(WotError::MediaTypeMismatch { expected, got });
    }
    Ok(())
}

/// The client-side proxy for one Thing: every affordance access on this
/// type goes through [`crate::dispatch`] to pick a form, resolve (and
/// lazily create) the right [`crate::protocol_client::ProtocolClient`],
/// and decode the result with the shared [`CodecRegistry`].
///
/// A `ConsumedThing` owns its [`SubscriptionRegistry`] but not its
/// [`Servient`] or [`CodecRegistry`] — those are process-wide resources
/// shared across every Thing a process consumes.
pub struct ConsumedThing {
    td: Arc<ThingDescription>,
    servient: Arc<Servient>,
    codecs: Arc<CodecRegistry>,
    subscriptions: Arc<SubscriptionRegistry>,
}

impl ConsumedThing {
    pub fn new(td: ThingDescription, servient: Arc<Servient>, codecs: Arc<CodecRegistry>) -> Self {
        Self {
            td: Arc::new(td),
            servient,
            codecs,
            subscriptions: Arc::new(SubscriptionRegistry::new()),
        }
    }

    pub fn thing_description(&self) -> &ThingDescription {
        &self.td
    }

    pub async fn read_property(&self, name: &str) -> Result<InteractionOutput> {
        self.read_property_with(name, &HashMap::new()).await
    }

    pub async fn read_property_with(
        &self,
        name: &str,
        uri_variables: &HashMap<String, String>,
    ) -> Result<InteractionOutput> {
        let forms = self.td.forms_for_property(name, Operation::Readproperty, uri_variables)?;
        if forms.is_empty() {
            return Err(WotError::NoFormForInteraction {
                affordance: name.to_string(),
                op: "readproperty".to_string(),
            });
        }
        let form = select_form(&forms, &self.servient)?.clone();
        let client = dispatch::client_for_form(&self.servient, &form).await?;
        dispatch::ensure_credentials(&self.servient, &self.td, &form, &client).await?;
        let content = client.read_resource(&form).await?;
        check_response_media_type(&form, &content)?;
        let schema = self.td.property(name)?.data_schema.clone();
        Ok(InteractionOutput::new(content, Some(schema), self.codecs.clone()))
    }

    /// Reads a property through a specific form, bypassing scheme-priority
    /// selection. Useful for retrying a read through the exact form a
    /// previous call resolved to, rather than risking dispatch picking a
    /// different (even if equally valid) form on retry.
    pub async fn read_property_at(&self, name: &str, form_index: usize) -> Result<InteractionOutput> {
        self.read_property_at_with(name, form_index, &HashMap::new()).await
    }

    pub async fn read_property_at_with(
        &self,
        name: &str,
        form_index: usize,
        uri_variables: &HashMap<String, String>,
    ) -> Result<InteractionOutput> {
        let forms = self.td.forms_for_property(name, Operation::Readproperty, uri_variables)?;
        let form = select_form_by_index(&forms, form_index)?.clone();
        let client = dispatch::client_for_form(&self.servient, &form).await?;
        dispatch::ensure_credentials(&self.servient, &self.td, &form, &client).await?;
        let content = client.read_resource(&form).await?;
        check_response_media_type(&form, &content)?;
        let schema = self.td.property(name)?.data_schema.clone();
        Ok(InteractionOutput::new(content, Some(schema), self.codecs.clone()))
    }

    /// Reads every property on the Thing, bounded to
    /// [`Servient::read_concurrency`] concurrent reads. A property whose
    /// read fails is logged and silently dropped from the result map
    /// rather than failing the whole call — one misbehaving affordance
    /// should not hide the rest of a Thing's state.
    pub async fn read_all_properties(&self) -> HashMap<String, InteractionOutput> {
        let names: Vec<String> = self.td.properties.keys().cloned().collect();
        self.read_multiple_properties(&names).await
    }

    pub async fn read_multiple_properties(&self, names: &[String]) -> HashMap<String, InteractionOutput> {
        let concurrency = self.servient.read_concurrency();
        let results: Vec<(String, Option<InteractionOutput>)> = futures::stream::iter(names.iter().cloned())
            .map(|name| async move {
                match self.read_property(&name).await {
                    Ok(output) => (name, Some(output)),
                    Err(err) => {
                        tracing::warn!(property = %name, error = %err, "dropping property from batch read");
                        (name, None)
                    }
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;
        results.into_iter().filter_map(|(name, output)| output.map(|o| (name, o))).collect()
    }

    pub async fn write_property(&self, name: &str, input: InteractionInput) -> Result<()> {
        self.write_property_with(name, input, &HashMap::new()).await
    }

    pub async fn write_property_with(
        &self,
        name: &str,
        input: InteractionInput,
        uri_variables: &HashMap<String, String>,
    ) -> Result<()> {
        let forms = self.td.forms_for_property(name, Operation::Writeproperty, uri_variables)?;
        if forms.is_empty() {
            return Err(WotError::NoFormForInteraction {
                affordance: name.to_string(),
                op: "writeproperty".to_string(),
            });
        }
        let form = select_form(&forms, &self.servient)?.clone();
        let client = dispatch::client_for_form(&self.servient, &form).await?;
        dispatch::ensure_credentials(&self.servient, &self.td, &form, &client).await?;
        let bytes = input.encode(&self.codecs, &form.form.content_type)?;
        let content = Content::new(form.form.content_type.clone(), bytes);
        client.write_resource(&form, content).await
    }

    /// Writes several properties concurrently (same concurrency floor as
    /// [`ConsumedThing::read_multiple_properties`]) and returns the name
    /// of every property whose write failed, alongside its error —
    /// unlike reads, a failed write is too significant to drop silently.
    pub async fn write_multiple_properties(
        &self,
        inputs: HashMap<String, InteractionInput>,
    ) -> HashMap<String, WotError> {
        let concurrency = self.servient.read_concurrency();
        let results: Vec<(String, Option<WotError>)> = futures::stream::iter(inputs.into_iter())
            .map(|(name, input)| async move {
                match self.write_property(&name, input).await {
                    Ok(()) => (name, None),
                    Err(err) => (name, Some(err)),
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;
        results.into_iter().filter_map(|(name, err)| err.map(|e| (name, e))).collect()
    }

    pub async fn invoke_action(&self, name: &str, input: Option<InteractionInput>) -> Result<InteractionOutput> {
        self.invoke_action_with(name, input, &HashMap::new()).await
    }

    pub async fn invoke_action_with(
        &self,
        name: &str,
        input: Option<InteractionInput>,
        uri_variables: &HashMap<String, String>,
    ) -> Result<InteractionOutput> {
        let forms = self.td.forms_for_action(name, uri_variables)?;
        if forms.is_empty() {
            return Err(WotError::NoFormForInteraction {
                affordance: name.to_string(),
                op: "invokeaction".to_string(),
            });
        }
        let form = select_form(&forms, &self.servient)?.clone();
        let client = dispatch::client_for_form(&self.servient, &form).await?;
        dispatch::ensure_credentials(&self.servient, &self.td, &form, &client).await?;
        let request_content = match input {
            Some(input) => Some(Content::new(
                form.form.content_type.clone(),
                input.encode(&self.codecs, &form.form.content_type)?,
            )),
            None => None,
        };
        let response = client.invoke_resource(&form, request_content).await?;
        check_response_media_type(&form, &response)?;
        let schema = self.td.action(name)?.output.clone();
        Ok(InteractionOutput::new(response, schema, self.codecs.clone()))
    }

    /// Opens a push-style observation of a property. Only one observation
    /// per property name may be active at a time; call
    /// [`PropertyObservation::stop`] (or drop the registry-level handle
    /// via [`ConsumedThing::unsubscribe`]) before observing it again.
    pub async fn observe_property(&self, name: &str) -> Result<PropertyObservation> {
        self.observe_property_with(name, &HashMap::new()).await
    }

    pub async fn observe_property_with(
        &self,
        name: &str,
        uri_variables: &HashMap<String, String>,
    ) -> Result<PropertyObservation> {
        if self.subscriptions.is_active(name) {
            return Err(WotError::DuplicateSubscription(name.to_string()));
        }
        let forms = self.td.forms_for_property(name, Operation::Observeproperty, uri_variables)?;
        if forms.is_empty() {
            return Err(WotError::NoFormForInteraction {
                affordance: name.to_string(),
                op: "observeproperty".to_string(),
            });
        }
        let form = select_form(&forms, &self.servient)?.clone();
        let client = dispatch::client_for_form(&self.servient, &form).await?;
        dispatch::ensure_credentials(&self.servient, &self.td, &form, &client).await?;
        let raw = client.subscribe_resource(&form).await?;

        let all_forms = self.td.all_forms_for_property(name, uri_variables)?;
        let teardown_form =
            select_unsubscribe_form(&form, &all_forms, Operation::Unobserveproperty, name)?.clone();

        let schema = self.td.property(name)?.data_schema.clone();
        let codecs = self.codecs.clone();
        let cancel = Arc::new(Notify::new());
        let gate = {
            let cancel = cancel.clone();
            async move { cancel.notified().await }
        };
        let decoded = raw
            .take_until(gate)
            .map(move |item| item.map(|content| InteractionOutput::new(content, Some(schema.clone()), codecs.clone())))
            .boxed();

        let subscription = Arc::new(Subscription::new(name.to_string(), teardown_form, client, cancel, Arc::downgrade(&self.subscriptions)));
        self.subscriptions.register(name, subscription.clone())?;
        Ok(PropertyObservation { subscription, stream: decoded })
    }

    /// Opens a push-style subscription to an event — semantically
    /// identical to [`ConsumedThing::observe_property`], against the
    /// event's `subscribeevent` forms.
    pub async fn subscribe_event(&self, name: &str) -> Result<EventSubscription> {
        self.subscribe_event_with(name, &HashMap::new()).await
    }

    pub async fn subscribe_event_with(
        &self,
        name: &str,
        uri_variables: &HashMap<String, String>,
    ) -> Result<EventSubscription> {
        if self.subscriptions.is_active(name) {
            return Err(WotError::DuplicateSubscription(name.to_string()));
        }
        let forms = self.td.forms_for_event(name, Operation::Subscribeevent, uri_variables)?;
        if forms.is_empty() {
            return Err(WotError::NoFormForInteraction {
                affordance: name.to_string(),
                op: "subscribeevent".to_string(),
            });
        }
        let form = select_form(&forms, &self.servient)?.clone();
        let client = dispatch::client_for_form(&self.servient, &form).await?;
        dispatch::ensure_credentials(&self.servient, &self.td, &form, &client).await?;
        let raw = client.subscribe_resource(&form).await?;

        let all_forms = self.td.all_forms_for_event(name, uri_variables)?;
        let teardown_form =
            select_unsubscribe_form(&form, &all_forms, Operation::Unsubscribeevent, name)?.clone();

        let schema = self.td.event(name)?.data.clone();
        let codecs = self.codecs.clone();
        let cancel = Arc::new(Notify::new());
        let gate = {
            let cancel = cancel.clone();
            async move { cancel.notified().await }
        };
        let decoded = raw
            .take_until(gate)
            .map(move |item| item.map(|content| InteractionOutput::new(content, schema.clone(), codecs.clone())))
            .boxed();

        let subscription = Arc::new(Subscription::new(name.to_string(), teardown_form, client, cancel, Arc::downgrade(&self.subscriptions)));
        self.subscriptions.register(name, subscription.clone())?;
        Ok(EventSubscription { subscription, stream: decoded })
    }

    /// Opens a pull-style, restartable consumption of an event: each time
    /// the underlying transport stream ends on its own (not via explicit
    /// `stop`), the next poll transparently resubscribes instead of
    /// surfacing end-of-stream, matching the semantics of a caller that
    /// simply keeps calling "give me the next event" indefinitely.
    pub async fn consume_event(&self, name: &str) -> Result<EventConsumption> {
        self.consume_event_with(name, &HashMap::new()).await
    }

    pub async fn consume_event_with(
        &self,
        name: &str,
        uri_variables: &HashMap<String, String>,
    ) -> Result<EventConsumption> {
        if self.subscriptions.is_active(name) {
            return Err(WotError::DuplicateSubscription(name.to_string()));
        }
        let forms = self.td.forms_for_event(name, Operation::Subscribeevent, uri_variables)?;
        if forms.is_empty() {
            return Err(WotError::NoFormForInteraction {
                affordance: name.to_string(),
                op: "subscribeevent".to_string(),
            });
        }
        let form = select_form(&forms, &self.servient)?.clone();
        let client = dispatch::client_for_form(&self.servient, &form).await?;
        dispatch::ensure_credentials(&self.servient, &self.td, &form, &client).await?;
        let first = client.subscribe_resource(&form).await?;

        let all_forms = self.td.all_forms_for_event(name, uri_variables)?;
        let teardown_form =
            select_unsubscribe_form(&form, &all_forms, Operation::Unsubscribeevent, name)?.clone();

        let schema = self.td.event(name)?.data.clone();
        let codecs = self.codecs.clone();
        let cancel = Arc::new(Notify::new());

        let restart_client = client.clone();
        let restart_form = form.clone();
        let restart_cancel = cancel.clone();
        let raw = futures::stream::unfold(RestartState::Streaming(first), move |state| {
            let client = restart_client.clone();
            let form = restart_form.clone();
            let cancel = restart_cancel.clone();
            async move { advance_restartable(client, form, cancel, state).await }
        });
        let decoded = raw
            .map(move |item| item.map(|content| InteractionOutput::new(content, schema.clone(), codecs.clone())))
            .boxed();

        let subscription = Arc::new(Subscription::new(name.to_string(), teardown_form, client, cancel, Arc::downgrade(&self.subscriptions)));
        self.subscriptions.register(name, subscription.clone())?;
        Ok(EventConsumption { subscription, stream: decoded })
    }

    /// Stops an active subscription/observation, idempotently. Returns
    /// `Ok(())` (not an error) if `name` has no active subscription.
    pub async fn unsubscribe(&self, name: &str) -> Result<()> {
        self.subscriptions.stop(name).await
    }

    /// Stops every active subscription and observation this
    /// `ConsumedThing` holds. Called automatically on drop via a spawned
    /// cleanup task; call this directly first if you need to `.await`
    /// teardown completion.
    pub async fn stop_all_subscriptions(&self) {
        self.subscriptions.stop_all().await;
    }
}

impl Drop for ConsumedThing {
    fn drop(&mut self) {
        let subscriptions = self.subscriptions.clone();
        if tokio::runtime::Handle::try_current().is_ok() {
            tokio::spawn(async move { subscriptions.stop_all().await });
        }
    }
}

enum RestartState {
    Streaming(BoxStream<'static, Result<Content>>),
    NeedsResubscribe,
    Stopped,
}

async fn advance_restartable(
    client: Arc<dyn crate::protocol_client::ProtocolClient>,
    form: crate::td::AugmentedForm,
    cancel: Arc<Notify>,
    mut state: RestartState,
) -> Option<(Result<Content>, RestartState)> {
    loop {
        match state {
            RestartState::Stopped => return None,
            RestartState::Streaming(mut stream) => {
                tokio::select! {
                    biased;
                    _ = cancel.notified() => return None,
                    next = stream.next() => match next {
                        Some(item) => return Some((item, RestartState::Streaming(stream))),
                        None => state = RestartState::NeedsResubscribe,
                    },
                }
            }
            RestartState::NeedsResubscribe => match client.subscribe_resource(&form).await {
                Ok(stream) => state = RestartState::Streaming(stream),
                Err(err) => return Some((Err(err), RestartState::Stopped)),
            },
        }
    }
}

/// A push-style property observation: an [`InteractionOutput`] stream
/// plus the [`Subscription`] handle needed to tear it down.
pub struct PropertyObservation {
    pub subscription: Arc<Subscription>,
    stream: BoxStream<'static, Result<InteractionOutput>>,
}

impl std::fmt::Debug for PropertyObservation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyObservation")
            .field("subscription", &self.subscription.affordance_name())
            .finish()
    }
}

impl PropertyObservation {
    pub async fn stop(&self) -> Result<()> {
        self.subscription.stop().await
    }
}

impl Stream for PropertyObservation {
    type Item = Result<InteractionOutput>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        Pin::new(&mut this.stream).poll_next(cx)
    }
}

/// A push-style event subscription. See [`PropertyObservation`].
pub struct EventSubscription {
    pub subscription: Arc<Subscription>,
    stream: BoxStream<'static, Result<InteractionOutput>>,
}

impl EventSubscription {
    pub async fn stop(&self) -> Result<()> {
        self.subscription.stop().await
    }
}

impl Stream for EventSubscription {
    type Item = Result<InteractionOutput>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        Pin::new(&mut this.stream).poll_next(cx)
    }
}

/// A pull-style, restartable event consumption. See [`ConsumedThing::consume_event`].
pub struct EventConsumption {
    pub subscription: Arc<Subscription>,
    stream: BoxStream<'static, Result<InteractionOutput>>,
}

impl EventConsumption {
    pub async fn stop(&self) -> Result<()> {
        self.subscription.stop().await
    }
}

impl Stream for EventConsumption {
    type Item = Result<InteractionOutput>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        Pin::new(&mut this.stream).poll_next(cx)
    }
}

