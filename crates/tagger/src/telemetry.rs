// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Aggregated tag store counters (all values use relaxed atomics).
///
/// The store drives these internally; hosts read them through
/// [`TelemetryCounters::snapshot`] and export them via statsd, OpenTelemetry,
/// or any other metric backend.
#[derive(Debug, Default)]
pub struct TelemetryCounters {
    stored_entities: AtomicU64,
    updated_entities: AtomicU64,
}

impl TelemetryCounters {
    /// Records the creation of an entity record.
    pub(crate) fn entity_stored(&self) {
        self.stored_entities.fetch_add(1, Ordering::Relaxed);
    }

    /// Re-bases the stored-entity gauge after a prune.
    pub(crate) fn set_stored_entities(&self, count: u64) {
        self.stored_entities.store(count, Ordering::Relaxed);
    }

    /// Records one applied tag update.
    pub(crate) fn entity_updated(&self) {
        self.updated_entities.fetch_add(1, Ordering::Relaxed);
    }

    /// Captures a point-in-time snapshot of the counters.
    #[must_use]
    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            stored_entities: self.stored_entities.load(Ordering::Relaxed),
            updated_entities: self.updated_entities.load(Ordering::Relaxed),
        }
    }
}

/// Plain data representation of [`TelemetryCounters`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    /// Number of entities currently held by the store (gauge).
    pub stored_entities: u64,
    /// Number of tag updates applied since startup (counter).
    pub updated_entities: u64,
}

impl fmt::Display for TelemetrySnapshot {
    /// Formats the snapshot metrics into a comma-separated list for logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "stored_entities={}, updated_entities={}",
            self.stored_entities, self.updated_entities
        )
    }
}
