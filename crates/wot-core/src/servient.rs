use std::sync::Arc;

use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use tokio::sync::Mutex as AsyncMutex;

use crate::credentials::CredentialsProvider;
use crate::error::{Result, WotError};
use crate::protocol_client::{ProtocolClient, ProtocolClientFactory};

/// The consumer-side registry of protocol bindings: which URI schemes are
/// supported, in what priority order, and the (lazily instantiated, then
/// cached) [`ProtocolClient`] for each.
///
/// A single `Servient` is typically shared across every
/// [`crate::consumed_thing::ConsumedThing`] in a process — clients are
/// connection-pool-like resources, not per-Thing state.
/// Default concurrency used by `readMultipleProperties`/
/// `readAllProperties` when the embedding application doesn't override it
/// via [`Servient::with_read_concurrency`]. Matches §5's "bounded
/// concurrency (implementation-defined, >= 4)".
const DEFAULT_READ_CONCURRENCY: usize = 4;

/// Sized wrapper around the credentials provider trait object so it can
/// be stored in [`ArcSwapOption`], which requires its pointee to be
/// `Sized` (`arc_swap::RefCnt` is only implemented for `Arc<T: Sized>`).
struct CredentialsProviderHandle(Arc<dyn CredentialsProvider>);

pub struct Servient {
    factories: Vec<Arc<dyn ProtocolClientFactory>>,
    clients: DashMap<String, Arc<dyn ProtocolClient>>,
    creation_locks: DashMap<String, Arc<AsyncMutex<()>>>,
    credentials_provider: ArcSwapOption<CredentialsProviderHandle>,
    credentials_installed: DashMap<String, ()>,
    read_concurrency: usize,
}

impl Servient {
    pub fn new() -> Self {
        Self {
            factories: Vec::new(),
            clients: DashMap::new(),
            creation_locks: DashMap::new(),
            credentials_provider: ArcSwapOption::empty(),
            credentials_installed: DashMap::new(),
            read_concurrency: DEFAULT_READ_CONCURRENCY,
        }
    }

    /// Overrides the concurrency `readMultipleProperties`/
    /// `readAllProperties` use when fanning out per-property reads. A TD
    /// exposing hundreds of properties may want more than the default
    /// four in flight at once; a Thing behind a connection-limited
    /// transport may want fewer.
    pub fn with_read_concurrency(mut self, concurrency: usize) -> Self {
        self.read_concurrency = concurrency.max(1);
        self
    }

    pub fn read_concurrency(&self) -> usize {
        self.read_concurrency
    }

    /// Stops every cached protocol client. Does not touch any
    /// [`crate::consumed_thing::ConsumedThing`]'s subscriptions — those
    /// are stopped by that Thing's own teardown guard (see
    /// [`crate::consumed_thing::ConsumedThing`]'s `Drop` impl).
    pub async fn shutdown(&self) {
        for entry in self.clients.iter() {
            if let Err(err) = entry.value().stop().await {
                tracing::warn!(scheme = %entry.key(), %err, "protocol client failed to stop cleanly during servient shutdown");
            }
        }
    }

    /// Records that credentials for `key` (conventionally
    /// `"{href}::{security name}"`) have been installed on a client.
    /// Returns `true` if this key was already marked, so the caller can
    /// skip re-installing credentials it already pushed.
    pub(crate) fn mark_credentials_installed(&self, key: &str) -> bool {
        self.credentials_installed.insert(key.to_string(), ()).is_some()
    }

    /// Registers a factory. Registration order is the priority order
    /// returned by [`Servient::supported_schemes`] — earlier registrations
    /// win ties when dispatch must choose among multiple equally-valid
    /// forms whose schemes differ.
    pub fn add_client_factory(&mut self, factory: Arc<dyn ProtocolClientFactory>) {
        self.factories.push(factory);
    }

    pub fn with_client_factory(mut self, factory: Arc<dyn ProtocolClientFactory>) -> Self {
        self.add_client_factory(factory);
        self
    }

    pub fn set_credentials_provider(&self, provider: Arc<dyn CredentialsProvider>) {
        self.credentials_provider
            .store(Some(Arc::new(CredentialsProviderHandle(provider))));
    }

    pub fn credentials_provider(&self) -> Option<Arc<dyn CredentialsProvider>> {
        self.credentials_provider
            .load_full()
            .map(|handle| Arc::clone(&handle.0))
    }

    /// Every scheme with a registered factory, in registration ("priority")
    /// order. A scheme backed by more than one factory is listed once, at
    /// the position of its first registration.
    pub fn supported_schemes(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for factory in &self.factories {
            for scheme in factory.schemes() {
                if !seen.contains(scheme) {
                    seen.push(*scheme);
                }
            }
        }
        seen
    }

    /// Returns the cached client for `scheme`, creating one via the
    /// registered factory on first use. Concurrent callers racing to
    /// create the same scheme's client serialize on a per-scheme lock so
    /// the factory is invoked exactly once; callers that lose the race
    /// simply observe the winner's cached client.
    pub async fn get_client_for(&self, scheme: &str) -> Result<Arc<dyn ProtocolClient>> {
        if let Some(client) = self.clients.get(scheme) {
            return Ok(Arc::clone(client.value()));
        }

        let lock = self
            .creation_locks
            .entry(scheme.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        if let Some(client) = self.clients.get(scheme) {
            return Ok(Arc::clone(client.value()));
        }

        let factory = self
            .factories
            .iter()
            .find(|f| f.schemes().contains(&scheme))
            .ok_or_else(|| WotError::NoClientFactoryForSchemes(vec![scheme.to_string()]))?;

        let client = factory.create().await?;
        client.start().await?;
        self.clients.insert(scheme.to_string(), Arc::clone(&client));
        Ok(client)
    }
}

impl Default for Servient {
    fn default() -> Self {
        Self::new()
    }
}
