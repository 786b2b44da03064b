use std::sync::Arc;

use futures::StreamExt;
use wot_codecs::CodecRegistry;
use wot_core::interaction::InteractionInput;
use wot_core::td::{SecuritySchemeKind, ThingDescription};
use wot_core::{ConsumedThing, Credentials, Servient, StaticCredentialsStore, WotError};
use wot_test_support::{fixture_thing_description, MockProtocolClient, MockProtocolClientFactory, MockResourceHandler};

struct Handler;

impl MockResourceHandler for Handler {
    fn read(&self, _form: &wot_core::td::AugmentedForm) -> wot_core::Result<wot_core::Content> {
        Ok(wot_core::Content::new("application/json", serde_json::json!(42).to_string()))
    }

    fn write(&self, _form: &wot_core::td::AugmentedForm, _content: wot_core::Content) -> wot_core::Result<()> {
        Ok(())
    }

    fn invoke(
        &self,
        _form: &wot_core::td::AugmentedForm,
        _content: Option<wot_core::Content>,
    ) -> wot_core::Result<wot_core::Content> {
        Ok(wot_core::Content::new("application/json", serde_json::json!({"ok": true}).to_string()))
    }

    fn subscribe(&self, _form: &wot_core::td::AugmentedForm) -> wot_core::Result<Vec<wot_core::Content>> {
        Ok(vec![
            wot_core::Content::new("application/json", serde_json::json!(1).to_string()),
            wot_core::Content::new("application/json", serde_json::json!(2).to_string()),
        ])
    }
}

fn mock_thing() -> (ConsumedThing, Arc<MockProtocolClient<Handler>>) {
    let client = Arc::new(MockProtocolClient::new(Handler));
    let mut servient = Servient::new();
    servient.add_client_factory(Arc::new(MockProtocolClientFactory::new(vec!["mock"], client.clone())));
    let thing = ConsumedThing::new(fixture_thing_description(), Arc::new(servient), Arc::new(CodecRegistry::with_defaults()));
    (thing, client)
}

#[tokio::test]
async fn reads_a_property_and_decodes_json() {
    let (thing, client) = mock_thing();
    let output = thing.read_property("level").await.expect("read should succeed");
    assert_eq!(output.value().unwrap(), serde_json::json!(42));
    assert!(output.data_used());
    assert_eq!(client.calls().len(), 1);
    assert_eq!(client.calls()[0].operation, "read");
}

#[tokio::test]
async fn reading_missing_property_errors() {
    let (thing, _client) = mock_thing();
    let err = thing.read_property("nonexistent").await.unwrap_err();
    assert!(matches!(err, WotError::MissingAffordance(name) if name == "nonexistent"));
}

#[tokio::test]
async fn writes_a_property() {
    let (thing, client) = mock_thing();
    thing
        .write_property("level", InteractionInput::value(serde_json::json!(7)))
        .await
        .expect("write should succeed");
    assert_eq!(client.calls().len(), 1);
    assert_eq!(client.calls()[0].operation, "write");
}

#[tokio::test]
async fn invokes_an_action() {
    let (thing, _client) = mock_thing();
    let output = thing.invoke_action("reset", None).await.expect("invoke should succeed");
    assert_eq!(output.value().unwrap(), serde_json::json!({"ok": true}));
}

#[tokio::test]
async fn read_all_properties_skips_failures_silently() {
    struct FailingHandler;
    impl MockResourceHandler for FailingHandler {}

    let client = Arc::new(MockProtocolClient::new(FailingHandler));
    let mut servient = Servient::new();
    servient.add_client_factory(Arc::new(MockProtocolClientFactory::new(vec!["mock"], client)));
    let thing = ConsumedThing::new(fixture_thing_description(), Arc::new(servient), Arc::new(CodecRegistry::with_defaults()));

    let results = thing.read_all_properties().await;
    assert!(results.is_empty());
}

#[tokio::test]
async fn observe_property_streams_items_then_stops_cleanly() {
    let (thing, client) = mock_thing();
    let mut observation = thing.observe_property("level").await.expect("observe should succeed");

    let first = observation.next().await.expect("first item").expect("decode ok");
    assert_eq!(first.value().unwrap(), serde_json::json!(1));
    let second = observation.next().await.expect("second item").expect("decode ok");
    assert_eq!(second.value().unwrap(), serde_json::json!(2));

    observation.stop().await.expect("stop should succeed");
    // Stopping again must be a no-op, not an error.
    observation.stop().await.expect("second stop should be a no-op");

    assert_eq!(client.unlinked_hrefs(), vec!["mock://thing/properties/level/unobserve".to_string()]);
}

#[tokio::test]
async fn duplicate_observation_is_rejected() {
    let (thing, _client) = mock_thing();
    let _first = thing.observe_property("level").await.expect("first observe should succeed");
    let err = thing.observe_property("level").await.unwrap_err();
    assert!(matches!(err, WotError::DuplicateSubscription(name) if name == "level"));
}

#[tokio::test]
#[tracing_test::traced_test]
async fn read_all_properties_logs_the_dropped_property_name() {
    struct FailingHandler;
    impl MockResourceHandler for FailingHandler {}

    let client = Arc::new(MockProtocolClient::new(FailingHandler));
    let mut servient = Servient::new();
    servient.add_client_factory(Arc::new(MockProtocolClientFactory::new(vec!["mock"], client)));
    let thing = ConsumedThing::new(fixture_thing_description(), Arc::new(servient), Arc::new(CodecRegistry::with_defaults()));

    let results = thing.read_all_properties().await;
    assert!(results.is_empty());
    assert!(logs_contain("level"));
    assert!(logs_contain("dropping property from batch read"));
}

#[tokio::test]
async fn unsubscribe_after_observation_allows_resubscribing() {
    let (thing, _client) = mock_thing();
    let observation = thing.observe_property("level").await.expect("first observe should succeed");
    thing.unsubscribe("level").await.expect("unsubscribe should succeed");
    drop(observation);

    let _second = thing
        .observe_property("level")
        .await
        .expect("observing again after unsubscribe should succeed");
}

#[tokio::test]
async fn observation_handles_own_stop_also_allows_resubscribing() {
    let (thing, _client) = mock_thing();
    let observation = thing.observe_property("level").await.expect("first observe should succeed");
    // Calling the handle's own `stop()` (not `ConsumedThing::unsubscribe`)
    // must remove the registry entry too, or this second observe fails
    // with `DuplicateSubscription`.
    observation.stop().await.expect("stop should succeed");

    let _second = thing
        .observe_property("level")
        .await
        .expect("observing again after the handle's own stop should succeed");
}

fn thing_with_response_content_type(expected: &str) -> ThingDescription {
    let json = serde_json::json!({
        "base": "mock://thing",
        "properties": {
            "level": {
                "type": "integer",
                "forms": [
                    {
                        "href": "/properties/level",
                        "op": ["readproperty"],
                        "contentType": "application/json",
                        "response": { "contentType": expected }
                    }
                ]
            }
        }
    });
    ThingDescription::parse(&json.to_string()).expect("thing description is valid")
}

#[tokio::test]
async fn read_property_fails_on_response_media_type_mismatch() {
    let client = Arc::new(MockProtocolClient::new(Handler));
    let mut servient = Servient::new();
    servient.add_client_factory(Arc::new(MockProtocolClientFactory::new(vec!["mock"], client)));
    let thing = ConsumedThing::new(
        thing_with_response_content_type("application/cbor"),
        Arc::new(servient),
        Arc::new(CodecRegistry::with_defaults()),
    );

    let err = thing.read_property("level").await.unwrap_err();
    assert!(matches!(
        err,
        WotError::MediaTypeMismatch { expected, got }
            if expected == "application/cbor" && got == "application/json"
    ));
}

#[tokio::test]
async fn read_property_succeeds_when_response_media_type_matches() {
    let client = Arc::new(MockProtocolClient::new(Handler));
    let mut servient = Servient::new();
    servient.add_client_factory(Arc::new(MockProtocolClientFactory::new(vec!["mock"], client)));
    let thing = ConsumedThing::new(
        thing_with_response_content_type("application/json"),
        Arc::new(servient),
        Arc::new(CodecRegistry::with_defaults()),
    );

    thing.read_property("level").await.expect("matching response media type should succeed");
}

fn thing_with_basic_security() -> ThingDescription {
    let json = serde_json::json!({
        "base": "http://example.com/device1",
        "securityDefinitions": {
            "basic_sc": { "scheme": "basic" }
        },
        "security": ["basic_sc"],
        "properties": {
            "status": {
                "type": "string",
                "forms": [
                    { "href": "/status", "op": ["readproperty"], "contentType": "application/json" }
                ]
            }
        }
    });
    ThingDescription::parse(&json.to_string()).expect("thing description is valid")
}

#[tokio::test]
async fn credentials_kind_mismatch_reports_expected_and_actual() {
    let client = Arc::new(MockProtocolClient::new(Handler));
    let mut servient = Servient::new();
    servient.add_client_factory(Arc::new(MockProtocolClientFactory::new(vec!["http"], client)));
    let store = StaticCredentialsStore::new();
    store.register(
        "http://example.com/device1",
        SecuritySchemeKind::Bearer,
        Credentials::Bearer { token: "t".to_string() },
    );
    servient.set_credentials_provider(Arc::new(store));
    let thing = ConsumedThing::new(thing_with_basic_security(), Arc::new(servient), Arc::new(CodecRegistry::with_defaults()));

    let err = thing.read_property("status").await.unwrap_err();
    let WotError::NoCredentialsFound(message) = err else {
        panic!("expected NoCredentialsFound, got {err:?}");
    };
    assert!(
        message.contains("Expected BasicCredentials but found BearerCredentials"),
        "unexpected message: {message}"
    );
}

#[tokio::test]
async fn credentials_lookup_succeeds_when_kind_matches() {
    let client = Arc::new(MockProtocolClient::new(Handler));
    let mut servient = Servient::new();
    servient.add_client_factory(Arc::new(MockProtocolClientFactory::new(vec!["http"], client.clone())));
    let store = StaticCredentialsStore::new();
    store.register(
        "http://example.com/device1",
        SecuritySchemeKind::Basic,
        Credentials::Basic { username: "u".to_string(), password: "p".to_string() },
    );
    servient.set_credentials_provider(Arc::new(store));
    let thing = ConsumedThing::new(thing_with_basic_security(), Arc::new(servient), Arc::new(CodecRegistry::with_defaults()));

    thing.read_property("status").await.expect("matching credential kind should succeed");
    assert!(matches!(client.installed_credentials(), Some(Credentials::Basic { .. })));
}

#[tokio::test]
async fn credentials_not_found_for_unknown_href() {
    let client = Arc::new(MockProtocolClient::new(Handler));
    let mut servient = Servient::new();
    servient.add_client_factory(Arc::new(MockProtocolClientFactory::new(vec!["http"], client)));
    let store = StaticCredentialsStore::new();
    store.register(
        "http://unknown.example.com",
        SecuritySchemeKind::Basic,
        Credentials::Basic { username: "u".to_string(), password: "p".to_string() },
    );
    servient.set_credentials_provider(Arc::new(store));
    let thing = ConsumedThing::new(thing_with_basic_security(), Arc::new(servient), Arc::new(CodecRegistry::with_defaults()));

    let err = thing.read_property("status").await.unwrap_err();
    assert!(matches!(err, WotError::NoCredentialsFound(message) if message == "basic_sc"));
}
