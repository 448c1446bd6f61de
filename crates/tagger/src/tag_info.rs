// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

/// One tag update reported by a collector for one entity.
///
/// Updates are whole-source replacements: the four tag sequences overwrite
/// whatever the source previously reported for the entity. A record with
/// `cache_miss` set represents "I tried to look this entity up and found
/// nothing" and is never allowed to overwrite an authoritative entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagInfo {
    /// Entity the tags apply to. Must be non-empty.
    pub entity: String,
    /// Collector that produced the tags. Must be non-empty.
    pub source: String,
    /// Schedule the entity for removal at the next prune instead of
    /// updating it.
    #[serde(default)]
    pub delete_entity: bool,
    /// The update is the result of a failed on-demand fetch.
    #[serde(default)]
    pub cache_miss: bool,
    /// `key:value` tags at low cardinality.
    #[serde(default)]
    pub low_card_tags: Vec<String>,
    /// `key:value` tags at orchestrator cardinality.
    #[serde(default)]
    pub orchestrator_card_tags: Vec<String>,
    /// `key:value` tags at high cardinality.
    #[serde(default)]
    pub high_card_tags: Vec<String>,
    /// Standard tags, returned regardless of the queried cardinality.
    #[serde(default)]
    pub standard_tags: Vec<String>,
}
