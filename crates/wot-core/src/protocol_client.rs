use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::content::Content;
use crate::credentials::Credentials;
use crate::error::Result;
use crate::td::AugmentedForm;

/// The kind of affordance a resource operation targets, passed to
/// protocol clients that need it for logging or protocol-specific framing
/// (e.g. a CoAP client choosing an Observe option only for properties).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Property,
    Action,
    Event,
}

/// A single scheme's binding to the network: the thing every
/// [`crate::servient::Servient`] scheme entry ultimately resolves to.
///
/// Implementations are created lazily by a [`ProtocolClientFactory`] the
/// first time dispatch needs that scheme, and are expected to be cheaply
/// cloneable (`Arc`-wrapped) since one instance is shared across every
/// `ConsumedThing` that talks to that scheme.
#[async_trait]
pub trait ProtocolClient: Send + Sync {
    async fn read_resource(&self, form: &AugmentedForm) -> Result<Content>;

    async fn write_resource(&self, form: &AugmentedForm, content: Content) -> Result<()>;

    /// Invokes an action. `content` is `None` for actions with no input
    /// schema; implementations should send an empty body in that case
    /// rather than erroring.
    async fn invoke_resource(&self, form: &AugmentedForm, content: Option<Content>) -> Result<Content>;

    /// Opens a push stream for `observeProperty`/`subscribeEvent`. The
    /// returned stream ends when the underlying transport closes it or
    /// when the caller drops it; explicit teardown goes through
    /// `unlink_resource`, not through dropping the stream.
    async fn subscribe_resource(&self, form: &AugmentedForm) -> Result<BoxStream<'static, Result<Content>>>;

    /// Tears down a subscription previously opened with
    /// `subscribe_resource`. Must be idempotent — the
    /// [`crate::subscription::SubscriptionRegistry`] guarantees at most
    /// one live call per affordance but may still call this more than
    /// once across retries.
    async fn unlink_resource(&self, form: &AugmentedForm) -> Result<()>;

    /// Installs credentials to attach to subsequent requests. Called at
    /// most once per security scheme the client is asked to satisfy,
    /// before the first request that needs it.
    fn set_credentials(&self, credentials: Credentials);

    async fn start(&self) -> Result<()> {
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        Ok(())
    }
}

/// Constructs [`ProtocolClient`]s for the schemes it claims, on demand.
///
/// A [`crate::servient::Servient`] holds one factory per scheme (`http`,
/// `https`, `coap`, `mqtt`, ...); the factory is only asked to `create` a
/// client the first time a dispatch needs that scheme, so schemes a
/// consumer never talks to never pay for a client instance.
#[async_trait]
pub trait ProtocolClientFactory: Send + Sync {
    /// The URI schemes this factory can produce clients for, e.g.
    /// `["http", "https"]`.
    fn schemes(&self) -> &[&str];

    async fn create(&self) -> Result<Arc<dyn ProtocolClient>>;
}
