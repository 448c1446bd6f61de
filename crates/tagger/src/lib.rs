// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! In-memory entity tag store for the host agent.
//!
//! Collectors (container runtimes, orchestrators, node metadata probes)
//! continuously report tags for entities such as containers, pods and hosts.
//! Downstream consumers query the store by entity ID and cardinality ceiling
//! and receive the unioned, de-duplicated, priority-resolved tag set, or
//! subscribe to a live stream of entity events bootstrapped with a snapshot
//! of current state.
//!
//! ## Architecture
//!
//! - [`tagstore`]: the registry — entity table, deferred-delete set,
//!   subscriber fan-out
//! - [`entity_tags`]: per-entity record with memoized, collated views
//! - [`collectors`]: collector priority registry for conflict resolution
//! - [`cardinality`]: the Low < Orchestrator < High ceiling
//! - [`events`]: the entity event stream surface
//! - [`telemetry`]: store counters for host metric export
//!
//! Queries should go through the host tagger facade, which handles
//! cache-miss fetches against collectors and schedules
//! [`TagStore::prune`].

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(unreachable_pub)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]

pub mod cardinality;
pub mod collectors;
pub mod entity_tags;
pub mod errors;
pub mod events;
pub mod tag_info;
pub mod tagstore;
pub mod telemetry;

pub use cardinality::TagCardinality;
pub use collectors::CollectorPriority;
pub use entity_tags::ResolvedTags;
pub use errors::TagStoreError;
pub use events::{Entity, EntityEvent, EventType, Subscription};
pub use tag_info::TagInfo;
pub use tagstore::{TagStore, TagStoreConfig};
pub use telemetry::{TelemetryCounters, TelemetrySnapshot};
