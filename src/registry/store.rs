//! Broadcast registry implementation
//!
//! Holds the live subscriber set and fans each relayed message out to it,
//! dropping any subscriber whose delivery fails.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use tokio::sync::RwLock;

use super::config::{DuplicatePolicy, RegistryConfig};
use super::error::RegistryError;
use super::frame::RelayMessage;
use super::subscriber::{Subscriber, SubscriberId};

struct Entry {
    id: SubscriberId,
    subscriber: Arc<dyn Subscriber>,
}

/// Result of a single broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastOutcome {
    /// Entries that accepted the message
    pub delivered: usize,
    /// Entries that failed and were removed
    pub dropped: usize,
}

/// Central registry of downstream subscribers
///
/// `deliver` is non-blocking, so a broadcast runs entirely under the read
/// lock; failed entries are removed by id afterwards, which never disturbs
/// entries registered in between.
pub struct BroadcastRegistry {
    entries: RwLock<Vec<Entry>>,

    next_id: AtomicU64,

    config: RegistryConfig,
}

/// Deregistration capability returned by [`BroadcastRegistry::register`]
///
/// Removes exactly the entry it was issued for.
#[derive(Debug)]
pub struct Registration {
    id: SubscriberId,
    registry: Weak<BroadcastRegistry>,
}

impl Registration {
    /// Id assigned to this entry
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Remove this entry from its registry
    ///
    /// Returns `false` if the entry was already gone.
    pub async fn deregister(self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.deregister_id(self.id).await,
            None => false,
        }
    }
}

fn same_subscriber(a: &Arc<dyn Subscriber>, b: &Arc<dyn Subscriber>) -> bool {
    // Compare data pointers only; vtable pointers are not guaranteed unique.
    std::ptr::eq(Arc::as_ptr(a).cast::<()>(), Arc::as_ptr(b).cast::<()>())
}

impl BroadcastRegistry {
    /// Create a registry with the live relay contract
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Add a subscriber
    ///
    /// Under [`DuplicatePolicy::Reject`] a reference that is already present is
    /// left alone and its existing id is reported in the error.
    pub async fn register(
        self: &Arc<Self>,
        subscriber: Arc<dyn Subscriber>,
    ) -> Result<Registration, RegistryError> {
        self.register_with(subscriber, |_| None).await
    }

    /// Add a subscriber, first handing it a greeting built from its new id
    ///
    /// The greeting is delivered while the set is locked, so it always
    /// precedes any broadcast the subscriber will see. If it cannot be
    /// delivered the subscriber is not added and
    /// [`RegistryError::GreetingFailed`] is returned.
    pub async fn register_with<F>(
        self: &Arc<Self>,
        subscriber: Arc<dyn Subscriber>,
        greeting: F,
    ) -> Result<Registration, RegistryError>
    where
        F: FnOnce(SubscriberId) -> Option<RelayMessage>,
    {
        let mut entries = self.entries.write().await;

        if self.config.duplicates == DuplicatePolicy::Reject {
            if let Some(existing) = entries
                .iter()
                .find(|e| same_subscriber(&e.subscriber, &subscriber))
            {
                tracing::info!(
                    subscriber_id = %existing.id,
                    subscribers = entries.len(),
                    "Tried to add subscriber again, ignored"
                );
                return Err(RegistryError::AlreadyRegistered(existing.id));
            }
        }

        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        if let Some(message) = greeting(id) {
            if let Err(source) = subscriber.deliver(&message) {
                tracing::warn!(subscriber_id = %id, error = %source, "Greeting failed, subscriber not added");
                return Err(RegistryError::GreetingFailed { id, source });
            }
        }

        entries.push(Entry { id, subscriber });

        tracing::info!(
            subscriber_id = %id,
            subscribers = entries.len(),
            "Subscriber added"
        );

        Ok(Registration {
            id,
            registry: Arc::downgrade(self),
        })
    }

    /// Remove every entry holding this subscriber reference
    ///
    /// Returns the number of entries removed; absent subscribers are a no-op.
    pub async fn deregister(&self, subscriber: &Arc<dyn Subscriber>) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|e| !same_subscriber(&e.subscriber, subscriber));
        let removed = before - entries.len();

        if removed > 0 {
            tracing::info!(
                removed = removed,
                subscribers = entries.len(),
                "Subscriber removed"
            );
        }

        removed
    }

    /// Remove a single entry by id
    pub async fn deregister_id(&self, id: SubscriberId) -> bool {
        let mut entries = self.entries.write().await;
        let Some(pos) = entries.iter().position(|e| e.id == id) else {
            return false;
        };
        entries.remove(pos);

        tracing::info!(
            subscriber_id = %id,
            subscribers = entries.len(),
            "Subscriber removed"
        );

        true
    }

    /// Send a message to every live subscriber
    ///
    /// Failing subscribers are removed and logged; the remaining ones still
    /// receive the message. Never fails.
    pub async fn broadcast(&self, message: &RelayMessage) -> BroadcastOutcome {
        let (total, failed) = {
            let entries = self.entries.read().await;
            if entries.is_empty() {
                return BroadcastOutcome::default();
            }

            let failed: Vec<SubscriberId> = entries
                .iter()
                .filter_map(|entry| match entry.subscriber.deliver(message) {
                    Ok(()) => None,
                    Err(e) => {
                        tracing::warn!(subscriber_id = %entry.id, error = %e, "Error sending");
                        Some(entry.id)
                    }
                })
                .collect();

            (entries.len(), failed)
        };

        if !failed.is_empty() {
            let mut entries = self.entries.write().await;
            entries.retain(|e| !failed.contains(&e.id));

            tracing::info!(
                removed = failed.len(),
                subscribers = entries.len(),
                "Subscriber removed"
            );
        }

        BroadcastOutcome {
            delivered: total - failed.len(),
            dropped: failed.len(),
        }
    }

    /// Number of entries in the set
    pub async fn subscriber_count(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the set is empty
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Whether this subscriber reference has at least one entry
    pub async fn contains(&self, subscriber: &Arc<dyn Subscriber>) -> bool {
        self.entries
            .read()
            .await
            .iter()
            .any(|e| same_subscriber(&e.subscriber, subscriber))
    }
}

impl Default for BroadcastRegistry {
    fn default() -> Self {
        Self::new()
    }
}
