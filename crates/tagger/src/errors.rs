// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Errors raised by the tag store.
#[derive(Debug, thiserror::Error)]
pub enum TagStoreError {
    /// The queried entity is not in the store. Only standard-tag lookups
    /// surface this; plain lookups return an empty view instead so callers
    /// can distinguish via the empty source list.
    #[error("entity {0} not found")]
    EntityNotFound(String),

    /// A cache-miss update tried to overwrite an authoritative entry. The
    /// offending record is skipped, the rest of the batch proceeds.
    #[error(
        "try to overwrite an existing entry with an empty cache-miss entry, source: {source_name}, entity: {entity}"
    )]
    CacheMissOverwrite {
        /// Entity the rejected update was for.
        entity: String,
        /// Source that reported the rejected update.
        source_name: String,
    },

    /// A cardinality string did not name a known level.
    #[error("invalid tag cardinality '{0}', must be one of: low, orchestrator, high")]
    InvalidCardinality(String),
}
