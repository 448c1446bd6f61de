// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// A type of event, triggered when an entity is added, modified or deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    /// An entity was added.
    Added,
    /// An entity was modified.
    Modified,
    /// An entity was deleted.
    Deleted,
}

/// An entity ID and its resolved tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Opaque entity identifier.
    pub id: String,
    /// Resolved tags at the subscription's cardinality. Empty for deleted
    /// entities, whose record no longer exists.
    pub tags: Vec<String>,
}

/// An event generated when an entity is added, modified or deleted. It
/// contains the event type and the new entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityEvent {
    /// What happened to the entity.
    pub event_type: EventType,
    /// The entity after the change.
    pub entity: Entity,
}

/// Receiving end of an entity event subscription.
///
/// Events arrive in batches, in store-update order. The first batch is a
/// snapshot of every entity present at subscription time. The channel is
/// bounded; a subscription that stops draining eventually blocks the store's
/// notifier, so consumers that go away should pass the handle back to
/// `TagStore::unsubscribe`.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    rx: mpsc::Receiver<Vec<EntityEvent>>,
}

impl Subscription {
    pub(crate) fn new(id: u64, rx: mpsc::Receiver<Vec<EntityEvent>>) -> Self {
        Self { id, rx }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Receives the next batch of events. Returns `None` once the
    /// subscription has been cancelled and the buffer drained.
    pub async fn recv(&mut self) -> Option<Vec<EntityEvent>> {
        self.rx.recv().await
    }
}
