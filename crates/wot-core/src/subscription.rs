use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::Notify;

use crate::error::{Result, WotError};
use crate::protocol_client::ProtocolClient;
use crate::td::AugmentedForm;

/// A live `observeProperty`/`subscribeEvent`/`consumeEvent` subscription.
///
/// Holding one keeps the underlying push stream (or pull-restart loop)
/// alive; dropping the last clone of the handle does *not* tear the
/// subscription down on its own — call [`Subscription::stop`], or let the
/// owning [`SubscriptionRegistry`] tear it down, so `unlinkResource` is
/// actually invoked on the protocol client.
pub struct Subscription {
    name: String,
    form: AugmentedForm,
    client: Arc<dyn ProtocolClient>,
    cancel: Arc<Notify>,
    unlinked: AtomicBool,
    registry: Weak<SubscriptionRegistry>,
}

impl Subscription {
    pub(crate) fn new(
        name: String,
        form: AugmentedForm,
        client: Arc<dyn ProtocolClient>,
        cancel: Arc<Notify>,
        registry: Weak<SubscriptionRegistry>,
    ) -> Self {
        Self {
            name,
            form,
            client,
            cancel,
            unlinked: AtomicBool::new(false),
            registry,
        }
    }

    pub fn affordance_name(&self) -> &str {
        &self.name
    }

    /// Tears the subscription down: wakes whatever is awaiting
    /// `cancel.notified()` in the stream gate so it stops forwarding
    /// items, calls `unlinkResource` exactly once, then removes itself
    /// from the owning [`SubscriptionRegistry`] so the affordance can be
    /// observed/subscribed again. Safe to call more than once — later
    /// calls are no-ops. The registry back-handle is weak: if the
    /// registry (and therefore the whole `ConsumedThing`) has already
    /// been dropped, there is nothing left to remove an entry from.
    pub async fn stop(&self) -> Result<()> {
        if self.unlinked.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.cancel.notify_one();
        let result = self.client.unlink_resource(&self.form).await;
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(&self.name);
        }
        result
    }
}

/// Enforces at most one active subscription per affordance name and
/// serves as the single owner responsible for eventually stopping every
/// subscription it holds.
#[derive(Default)]
pub struct SubscriptionRegistry {
    active: DashMap<String, Arc<Subscription>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.active.contains_key(name)
    }

    /// Registers `subscription` under `name`. Fails with
    /// [`WotError::DuplicateSubscription`] if `name` already has an
    /// active subscription — callers must `stop` the existing one first.
    pub fn register(&self, name: &str, subscription: Arc<Subscription>) -> Result<()> {
        match self.active.entry(name.to_string()) {
            Entry::Occupied(_) => Err(WotError::DuplicateSubscription(name.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(subscription);
                Ok(())
            }
        }
    }

    /// Removes the entry for `name` without stopping it, if present.
    /// Used by [`Subscription::stop`] to remove its own registry entry
    /// once it has already torn itself down, so this never re-enters
    /// `Subscription::stop`.
    pub(crate) fn remove(&self, name: &str) {
        self.active.remove(name);
    }

    /// Stops and removes the subscription for `name`, if any. Calling
    /// this twice in a row (or concurrently) is safe: the second caller
    /// finds nothing to remove and returns `Ok(())`. `Subscription::stop`
    /// removes its own entry once torn down, so this looks the
    /// subscription up without removing it first, to avoid discarding
    /// the entry before `stop` has a chance to run.
    pub async fn stop(&self, name: &str) -> Result<()> {
        let Some(subscription) = self.active.get(name).map(|entry| entry.value().clone()) else {
            return Ok(());
        };
        subscription.stop().await
    }

    /// Stops every active subscription, swallowing individual failures so
    /// one unresponsive transport cannot block teardown of the others.
    pub async fn stop_all(&self) {
        let names: Vec<String> = self.active.iter().map(|entry| entry.key().clone()).collect();
        for name in names {
            if let Err(err) = self.stop(&name).await {
                tracing::warn!(affordance = %name, error = %err, "failed to stop subscription during teardown");
            }
        }
    }
}
