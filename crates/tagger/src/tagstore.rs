// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, error, trace};

use crate::cardinality::TagCardinality;
use crate::entity_tags::{EntityTags, ResolvedTags};
use crate::errors::TagStoreError;
use crate::events::{Entity, EntityEvent, EventType, Subscription};
use crate::tag_info::TagInfo;
use crate::telemetry::{TelemetryCounters, TelemetrySnapshot};

// This buffer size is an educated guess: we know the rate of updates, but
// not how fast subscribers can stream them out.
const DEFAULT_SUBSCRIPTION_BUFFER_SIZE: usize = 100;

/// Tuning knobs for a [`TagStore`].
#[derive(Debug, Clone)]
pub struct TagStoreConfig {
    /// Number of event batches a subscription buffers before deliveries
    /// start applying back-pressure to the store. Producers must be able to
    /// emit a burst without blocking on a slow consumer, but pathological
    /// lag stays bounded.
    pub subscription_buffer_size: usize,
}

impl Default for TagStoreConfig {
    fn default() -> Self {
        Self {
            subscription_buffer_size: DEFAULT_SUBSCRIPTION_BUFFER_SIZE,
        }
    }
}

struct Subscriber {
    tx: mpsc::Sender<Vec<EntityEvent>>,
    cardinality: TagCardinality,
}

/// Stores entity tags in memory and handles search and collation.
///
/// Collectors push batches of [`TagInfo`] updates through
/// [`process_tag_info`](Self::process_tag_info); consumers query through
/// [`lookup`](Self::lookup) or follow the live event stream through
/// [`subscribe`](Self::subscribe). Deletions are deferred: a delete update
/// only schedules the entity, and the host is expected to call
/// [`prune`](Self::prune) periodically.
///
/// Lock order is `to_delete`, then `store`, then `subscribers`, then the
/// per-entity record. No method acquires them out of that order.
pub struct TagStore {
    store: RwLock<HashMap<String, Arc<EntityTags>>>,
    to_delete: Mutex<HashSet<String>>,
    subscribers: RwLock<HashMap<u64, Subscriber>>,
    next_subscription_id: AtomicU64,
    telemetry: TelemetryCounters,
    config: TagStoreConfig,
}

impl TagStore {
    /// Creates an empty store with default tuning.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(TagStoreConfig::default())
    }

    /// Creates an empty store with the given tuning.
    #[must_use]
    pub fn with_config(config: TagStoreConfig) -> Self {
        Self {
            store: RwLock::new(HashMap::new()),
            to_delete: Mutex::new(HashSet::new()),
            subscribers: RwLock::new(HashMap::new()),
            next_subscription_id: AtomicU64::new(0),
            telemetry: TelemetryCounters::default(),
            config,
        }
    }

    /// Applies an ordered batch of collector updates, then notifies
    /// subscribers of the entities the batch added and modified.
    ///
    /// Structurally invalid records (empty entity or source) and cache-miss
    /// records that would overwrite authoritative tags are skipped; the rest
    /// of the batch still goes through.
    pub async fn process_tag_info(&self, batch: Vec<TagInfo>) {
        let mut added: HashMap<String, Option<Arc<EntityTags>>> = HashMap::new();
        let mut modified: HashMap<String, Option<Arc<EntityTags>>> = HashMap::new();

        for info in batch {
            if info.entity.is_empty() {
                trace!("process_tag_info: empty entity name, skipping message");
                continue;
            }
            if info.source.is_empty() {
                trace!("process_tag_info: empty source name, skipping message");
                continue;
            }
            if info.delete_entity {
                self.to_delete.lock().await.insert(info.entity);
                continue;
            }

            let entity = info.entity.clone();
            let (stored, existed) = self.lookup_or_create(&entity).await;

            self.telemetry.entity_updated();

            if let Err(err) = stored.apply(info).await {
                trace!("process_tag_info: {err}");
                continue;
            }

            if existed {
                modified.insert(entity, Some(stored));
            } else {
                added.insert(entity, Some(stored));
            }
        }

        if !added.is_empty() {
            self.notify_subscribers(EventType::Added, &added).await;
        }
        if !modified.is_empty() {
            self.notify_subscribers(EventType::Modified, &modified).await;
        }
    }

    /// Fetches the record for an entity, installing a fresh one when absent.
    /// Lookup and creation happen under one store write lock so concurrent
    /// updates for a new entity cannot produce two records.
    async fn lookup_or_create(&self, entity: &str) -> (Arc<EntityTags>, bool) {
        let mut store = self.store.write().await;
        match store.get(entity) {
            Some(stored) => (Arc::clone(stored), true),
            None => {
                let stored = Arc::new(EntityTags::new());
                store.insert(entity.to_string(), Arc::clone(&stored));
                self.telemetry.entity_stored();
                (stored, false)
            }
        }
    }

    /// Returns the resolved view of an entity at the requested cardinality.
    /// An absent entity yields an empty view; callers distinguish it by the
    /// empty source list.
    pub async fn lookup(&self, entity: &str, cardinality: TagCardinality) -> ResolvedTags {
        let store = self.store.read().await;
        match store.get(entity) {
            Some(stored) => stored.get(cardinality).await,
            None => ResolvedTags::default(),
        }
    }

    /// Returns the standard tags recorded for a given entity.
    pub async fn lookup_standard(&self, entity: &str) -> Result<Vec<String>, TagStoreError> {
        let store = self.store.read().await;
        match store.get(entity) {
            Some(stored) => Ok(stored.get_standard().await),
            None => Err(TagStoreError::EntityNotFound(entity.to_string())),
        }
    }

    /// Removes the entities previously scheduled for deletion and emits one
    /// `Deleted` notification for the swept set. To be called regularly by
    /// the host; a call with nothing scheduled is a no-op.
    pub async fn prune(&self) {
        let mut to_delete = self.to_delete.lock().await;
        if to_delete.is_empty() {
            return;
        }

        let mut deleted: HashMap<String, Option<Arc<EntityTags>>> =
            HashMap::with_capacity(to_delete.len());
        let remaining = {
            let mut store = self.store.write().await;
            for entity in to_delete.drain() {
                store.remove(&entity);
                deleted.insert(entity, None);
            }
            store.len()
        };
        debug!("pruned {} removed entities, {} remaining", deleted.len(), remaining);
        drop(to_delete);

        self.notify_subscribers(EventType::Deleted, &deleted).await;
        self.telemetry.set_stored_entities(remaining as u64);
    }

    /// Registers a subscriber and returns its receiving handle. The first
    /// batch delivered is a snapshot with one `Added` event per entity
    /// currently stored, at the subscription's cardinality; subsequent
    /// batches follow store updates.
    pub async fn subscribe(&self, cardinality: TagCardinality) -> Subscription {
        // Batches instead of single events: bursts are as likely as isolated
        // changes, especially at startup or with collectors that
        // periodically pull.
        let (tx, rx) = mpsc::channel(self.config.subscription_buffer_size);

        // The store read lock is held through registration, so an entity
        // added concurrently can appear in the snapshot or in a later live
        // batch, never in both or neither.
        let store = self.store.read().await;
        let mut events = Vec::with_capacity(store.len());
        for (id, stored) in &*store {
            let resolved = stored.get(cardinality).await;
            events.push(EntityEvent {
                event_type: EventType::Added,
                entity: Entity {
                    id: id.clone(),
                    tags: resolved.tags,
                },
            });
        }

        let mut subscribers = self.subscribers.write().await;
        let id = self.next_subscription_id.fetch_add(1, Ordering::Relaxed);
        subscribers.insert(
            id,
            Subscriber {
                tx: tx.clone(),
                cardinality,
            },
        );

        // The buffer absorbs the snapshot even though the caller is not
        // draining yet.
        if tx.send(events).await.is_err() {
            error!("failed to deliver initial snapshot - subscription already closed");
        }

        Subscription::new(id, rx)
    }

    /// Ends a subscription to entity events and closes its channel.
    pub async fn unsubscribe(&self, subscription: Subscription) {
        let mut subscribers = self.subscribers.write().await;
        subscribers.remove(&subscription.id());
        // Dropping the registered sender together with the consumed handle
        // closes the channel; no events are delivered past this point.
    }

    /// Current values of the store's telemetry counters.
    #[must_use]
    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.telemetry.snapshot()
    }

    /// Sends one batch of events of the given type to every subscriber,
    /// each at the subscriber's own cardinality. Deleted entities have no
    /// record anymore; their events carry no tags.
    ///
    /// Delivery awaits on a full buffer: a slow subscriber applies
    /// back-pressure to the notifier rather than losing events.
    async fn notify_subscribers(
        &self,
        event_type: EventType,
        entities: &HashMap<String, Option<Arc<EntityTags>>>,
    ) {
        let subscribers = self.subscribers.read().await;

        // NOTE: we need some telemetry on the amount of subscribers and
        // notifications being sent, and at which cardinality.

        for subscriber in subscribers.values() {
            let mut events = Vec::with_capacity(entities.len());
            for (id, stored) in entities {
                let tags = match stored {
                    Some(record) => record.get(subscriber.cardinality).await.tags,
                    None => Vec::new(),
                };
                events.push(EntityEvent {
                    event_type,
                    entity: Entity {
                        id: id.clone(),
                        tags,
                    },
                });
            }

            if subscriber.tx.send(events).await.is_err() {
                trace!("subscriber went away without unsubscribing, skipping delivery");
            }
        }
    }
}

impl Default for TagStore {
    fn default() -> Self {
        Self::new()
    }
}
