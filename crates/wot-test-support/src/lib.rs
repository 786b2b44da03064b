//! In-memory [`wot_core::ProtocolClient`]/[`wot_core::ProtocolClientFactory`]
//! fakes and Thing Description fixtures for exercising the dispatch and
//! consumption engine without a real transport.
//!
//! The shape mirrors the simplest possible test double: a handler trait
//! the test supplies ([`MockResourceHandler`]), a client that records every
//! call it receives before delegating to the handler
//! ([`MockProtocolClient`]), and a factory that always hands back the same
//! client instance ([`MockProtocolClientFactory`]) — enough to assert both
//! "did dispatch call the right operation" and "did the engine decode the
//! response correctly".

use std::sync::Mutex;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};

use wot_core::td::AugmentedForm;
use wot_core::{Content, Credentials, ProtocolClient, ProtocolClientFactory, Result, ThingDescription, WotError};

/// What a test supplies to script a [`MockProtocolClient`]'s responses.
///
/// Every method has a default that errors with
/// [`WotError::UnsupportedInput`] — a test only needs to override the
/// operations its scenario actually exercises.
pub trait MockResourceHandler: Send + Sync + 'static {
    fn read(&self, form: &AugmentedForm) -> Result<Content> {
        Err(unsupported("read", form))
    }

    fn write(&self, form: &AugmentedForm, _content: Content) -> Result<()> {
        Err(unsupported("write", form))
    }

    fn invoke(&self, form: &AugmentedForm, _content: Option<Content>) -> Result<Content> {
        Err(unsupported("invoke", form))
    }

    /// Returns the canned sequence of items a subscription to `form`
    /// should emit. The mock client turns this into a finite stream —
    /// there is no notion of "more items arrive later" in the fixture.
    fn subscribe(&self, form: &AugmentedForm) -> Result<Vec<Content>> {
        Err(unsupported("subscribe", form))
    }
}

fn unsupported(operation: &str, form: &AugmentedForm) -> WotError {
    WotError::UnsupportedInput(format!("mock handler has no \"{operation}\" response for {}", form.resolved_href))
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub operation: &'static str,
    pub href: String,
}

/// A [`ProtocolClient`] that records every call before delegating to a
/// [`MockResourceHandler`], for assertions like "dispatch picked the
/// second form" or "credentials were installed before the first read".
pub struct MockProtocolClient<H> {
    handler: H,
    calls: Mutex<Vec<RecordedCall>>,
    credentials: Mutex<Option<Credentials>>,
    unlinked_hrefs: Mutex<Vec<String>>,
}

impl<H: MockResourceHandler> MockProtocolClient<H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            calls: Mutex::new(Vec::new()),
            credentials: Mutex::new(None),
            unlinked_hrefs: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("calls mutex poisoned").clone()
    }

    pub fn unlinked_hrefs(&self) -> Vec<String> {
        self.unlinked_hrefs.lock().expect("unlinked mutex poisoned").clone()
    }

    pub fn installed_credentials(&self) -> Option<Credentials> {
        self.credentials.lock().expect("credentials mutex poisoned").clone()
    }

    fn record(&self, operation: &'static str, form: &AugmentedForm) {
        self.calls.lock().expect("calls mutex poisoned").push(RecordedCall {
            operation,
            href: form.resolved_href.clone(),
        });
    }
}

#[async_trait]
impl<H: MockResourceHandler> ProtocolClient for MockProtocolClient<H> {
    async fn read_resource(&self, form: &AugmentedForm) -> Result<Content> {
        self.record("read", form);
        self.handler.read(form)
    }

    async fn write_resource(&self, form: &AugmentedForm, content: Content) -> Result<()> {
        self.record("write", form);
        self.handler.write(form, content)
    }

    async fn invoke_resource(&self, form: &AugmentedForm, content: Option<Content>) -> Result<Content> {
        self.record("invoke", form);
        self.handler.invoke(form, content)
    }

    async fn subscribe_resource(&self, form: &AugmentedForm) -> Result<BoxStream<'static, Result<Content>>> {
        self.record("subscribe", form);
        let items = self.handler.subscribe(form)?;
        Ok(futures::stream::iter(items.into_iter().map(Ok)).boxed())
    }

    async fn unlink_resource(&self, form: &AugmentedForm) -> Result<()> {
        self.unlinked_hrefs
            .lock()
            .expect("unlinked mutex poisoned")
            .push(form.resolved_href.clone());
        Ok(())
    }

    fn set_credentials(&self, credentials: Credentials) {
        *self.credentials.lock().expect("credentials mutex poisoned") = Some(credentials);
    }
}

/// Hands back the same pre-built client for every `create` call,
/// matching how a real factory for a connection-oriented protocol would
/// reuse one client across a process's lifetime.
pub struct MockProtocolClientFactory {
    schemes: Vec<&'static str>,
    client: Arc<dyn ProtocolClient>,
}

impl MockProtocolClientFactory {
    pub fn new(schemes: Vec<&'static str>, client: Arc<dyn ProtocolClient>) -> Self {
        Self { schemes, client }
    }
}

#[async_trait]
impl ProtocolClientFactory for MockProtocolClientFactory {
    fn schemes(&self) -> &[&str] {
        &self.schemes
    }

    async fn create(&self) -> Result<Arc<dyn ProtocolClient>> {
        Ok(Arc::clone(&self.client))
    }
}

/// A Thing Description exposing one observable property (`level`), one
/// action (`reset`) and one event (`alert`), every form scoped to the
/// `mock://thing` scheme so tests can register a single-scheme
/// [`MockProtocolClientFactory`] against it.
pub fn fixture_thing_description() -> ThingDescription {
    let json = serde_json::json!({
        "id": "urn:test:mock-thing",
        "title": "Mock Thing",
        "base": "mock://thing",
        "properties": {
            "level": {
                "type": "integer",
                "observable": true,
                "forms": [
                    { "href": "/properties/level", "op": ["readproperty", "writeproperty"], "contentType": "application/json" },
                    { "href": "/properties/level/observe", "op": ["observeproperty"], "contentType": "application/json" },
                    { "href": "/properties/level/unobserve", "op": ["unobserveproperty"], "contentType": "application/json" }
                ]
            }
        },
        "actions": {
            "reset": {
                "forms": [
                    { "href": "/actions/reset", "op": ["invokeaction"], "contentType": "application/json" }
                ]
            }
        },
        "events": {
            "alert": {
                "forms": [
                    { "href": "/events/alert", "op": ["subscribeevent"], "contentType": "application/json" },
                    { "href": "/events/alert/unsubscribe", "op": ["unsubscribeevent"], "contentType": "application/json" }
                ]
            }
        }
    });
    ThingDescription::parse(&json.to_string()).expect("fixture thing description is valid")
}
