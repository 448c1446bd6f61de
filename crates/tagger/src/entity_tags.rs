// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::cardinality::TagCardinality;
use crate::collectors::{self, CollectorPriority};
use crate::errors::TagStoreError;
use crate::tag_info::TagInfo;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Resolved tag view returned by queries: the tags at the requested
/// cardinality, the names of the contributing sources (so clients can
/// trigger manual lookups on missing ones), and a digest of the full
/// resolved set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedTags {
    /// De-duplicated, priority-filtered tags up to the requested cardinality.
    pub tags: Vec<String>,
    /// Sources that contributed to this entity.
    pub sources: Vec<String>,
    /// FNV-1a digest of the full resolved set, identical across
    /// cardinalities. Empty when the entity resolves to no tags.
    pub hash: String,
}

/// Holds the tag information for a given entity: raw tags bucketed by source
/// and cardinality, and the memoized resolved views.
#[derive(Debug, Default)]
pub(crate) struct EntityTags {
    inner: RwLock<TagsState>,
}

#[derive(Debug, Default)]
struct TagsState {
    low_card_tags: HashMap<String, Vec<String>>,
    orchestrator_card_tags: HashMap<String, Vec<String>>,
    high_card_tags: HashMap<String, Vec<String>>,
    standard_tags: HashMap<String, Vec<String>>,
    cache_valid: bool,
    cached_sources: Vec<String>,
    // The three views share one backing sequence: low is
    // cached_all[..low_end], orchestrator is cached_all[..orchestrator_end].
    // Invalidation rebuilds the sequence as a fresh allocation.
    cached_all: Vec<String>,
    low_end: usize,
    orchestrator_end: usize,
    tags_hash: String,
}

/// One candidate for a tag key during collation.
#[derive(Debug)]
struct TagCandidate {
    tag: String,
    priority: CollectorPriority,
    cardinality: TagCardinality,
}

impl EntityTags {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Replaces all four buckets for the update's source and invalidates the
    /// memoized views.
    ///
    /// A cache-miss record must not overwrite a previously authoritative
    /// entry. Only the low bucket is checked: all cardinality levels are
    /// written together, so its presence implies a prior write.
    pub(crate) async fn apply(&self, info: TagInfo) -> Result<(), TagStoreError> {
        let mut state = self.inner.write().await;
        if info.cache_miss && state.low_card_tags.contains_key(&info.source) {
            return Err(TagStoreError::CacheMissOverwrite {
                entity: info.entity,
                source_name: info.source,
            });
        }
        state
            .orchestrator_card_tags
            .insert(info.source.clone(), info.orchestrator_card_tags);
        state
            .high_card_tags
            .insert(info.source.clone(), info.high_card_tags);
        state
            .standard_tags
            .insert(info.source.clone(), info.standard_tags);
        state.low_card_tags.insert(info.source, info.low_card_tags);
        state.cache_valid = false;
        Ok(())
    }

    /// Returns the resolved view at the requested cardinality, collating and
    /// memoizing on cache miss. The returned vectors are the caller's own.
    pub(crate) async fn get(&self, cardinality: TagCardinality) -> ResolvedTags {
        let mut state = self.inner.write().await;
        if !state.cache_valid {
            state.resolve();
        }
        state.view(cardinality)
    }

    /// Returns the standard tags across all sources, concatenated. Standard
    /// tags are expected not to collide across sources, so no de-duplication
    /// is applied.
    pub(crate) async fn get_standard(&self) -> Vec<String> {
        let state = self.inner.read().await;
        let mut tags = Vec::new();
        for source_tags in state.standard_tags.values() {
            tags.extend_from_slice(source_tags);
        }
        tags
    }
}

impl TagsState {
    /// Collates the source buckets into the three resolved views and
    /// installs the memoization cell.
    ///
    /// For each tag key, only the candidates carrying the maximal source
    /// priority survive; a high-priority source that contributes a key at
    /// any cardinality suppresses lower-priority values for that key in
    /// every bucket. Surviving candidates are partitioned by their own
    /// cardinality.
    fn resolve(&mut self) {
        let mut sources = Vec::with_capacity(self.low_card_tags.len());
        let mut candidates_by_key: HashMap<String, Vec<TagCandidate>> = HashMap::new();

        for (source, tags) in &self.low_card_tags {
            sources.push(source.clone());
            insert_with_priority(&mut candidates_by_key, tags, source, TagCardinality::Low);
        }
        for (source, tags) in &self.orchestrator_card_tags {
            insert_with_priority(
                &mut candidates_by_key,
                tags,
                source,
                TagCardinality::Orchestrator,
            );
        }
        for (source, tags) in &self.high_card_tags {
            insert_with_priority(&mut candidates_by_key, tags, source, TagCardinality::High);
        }

        let mut low = Vec::new();
        let mut orchestrator = Vec::new();
        let mut high = Vec::new();
        for candidates in candidates_by_key.into_values() {
            for (i, candidate) in candidates.iter().enumerate() {
                let suppressed = candidates
                    .iter()
                    .enumerate()
                    .any(|(j, other)| i != j && candidate.priority < other.priority);
                if suppressed {
                    continue;
                }
                match candidate.cardinality {
                    TagCardinality::Low => low.push(candidate.tag.clone()),
                    TagCardinality::Orchestrator => orchestrator.push(candidate.tag.clone()),
                    TagCardinality::High => high.push(candidate.tag.clone()),
                }
            }
        }

        let low_end = low.len();
        let orchestrator_end = low_end + orchestrator.len();
        let mut all = low;
        all.append(&mut orchestrator);
        all.append(&mut high);

        self.tags_hash = compute_tags_hash(&all);
        self.cached_sources = sources;
        self.cached_all = all;
        self.low_end = low_end;
        self.orchestrator_end = orchestrator_end;
        self.cache_valid = true;
    }

    fn view(&self, cardinality: TagCardinality) -> ResolvedTags {
        let end = match cardinality {
            TagCardinality::Low => self.low_end,
            TagCardinality::Orchestrator => self.orchestrator_end,
            TagCardinality::High => self.cached_all.len(),
        };
        ResolvedTags {
            tags: self.cached_all[..end].to_vec(),
            sources: self.cached_sources.clone(),
            hash: self.tags_hash.clone(),
        }
    }
}

fn insert_with_priority(
    candidates_by_key: &mut HashMap<String, Vec<TagCandidate>>,
    tags: &[String],
    source: &str,
    cardinality: TagCardinality,
) {
    let priority = collectors::priority_for(source);
    for tag in tags {
        let key = match tag.split_once(':') {
            Some((key, _)) => key,
            None => tag.as_str(),
        };
        candidates_by_key
            .entry(key.to_string())
            .or_default()
            .push(TagCandidate {
                tag: tag.clone(),
                priority,
                cardinality,
            });
    }
}

/// 64-bit FNV-1a digest of the lexicographically sorted tag set, formatted
/// as lowercase hexadecimal. Sorting first makes the digest independent of
/// collation iteration order. Empty input yields the empty string.
pub(crate) fn compute_tags_hash(tags: &[String]) -> String {
    if tags.is_empty() {
        return String::new();
    }
    // Sort a copy, the resolved sequence keeps collation order.
    let mut sorted: Vec<&str> = tags.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    let mut hash = FNV_OFFSET_BASIS;
    for tag in sorted {
        for byte in tag.bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(FNV_PRIME);
        }
    }
    format!("{hash:x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(source: &str, low: &[&str], orchestrator: &[&str], high: &[&str]) -> TagInfo {
        TagInfo {
            entity: "container_id://abc".to_string(),
            source: source.to_string(),
            low_card_tags: low.iter().map(ToString::to_string).collect(),
            orchestrator_card_tags: orchestrator.iter().map(ToString::to_string).collect(),
            high_card_tags: high.iter().map(ToString::to_string).collect(),
            ..TagInfo::default()
        }
    }

    #[tokio::test]
    async fn single_source_resolves_at_every_cardinality() {
        let entity_tags = EntityTags::new();
        entity_tags
            .apply(update("docker", &["image_name:redis"], &[], &[]))
            .await
            .expect("apply failed");

        let low = entity_tags.get(TagCardinality::Low).await;
        assert_eq!(low.tags, vec!["image_name:redis".to_string()]);
        assert_eq!(low.sources, vec!["docker".to_string()]);
        assert!(!low.hash.is_empty());

        let high = entity_tags.get(TagCardinality::High).await;
        assert_eq!(high.tags, low.tags);
        assert_eq!(high.hash, low.hash);
    }

    #[tokio::test]
    async fn views_are_prefixes_of_one_another() {
        let entity_tags = EntityTags::new();
        entity_tags
            .apply(update(
                "docker",
                &["image_name:redis"],
                &["task_arn:abc"],
                &["container_id:abc123"],
            ))
            .await
            .expect("apply failed");

        let low = entity_tags.get(TagCardinality::Low).await;
        let orchestrator = entity_tags.get(TagCardinality::Orchestrator).await;
        let high = entity_tags.get(TagCardinality::High).await;

        assert_eq!(low.tags.len(), 1);
        assert_eq!(orchestrator.tags.len(), 2);
        assert_eq!(high.tags.len(), 3);
        assert_eq!(orchestrator.tags[..low.tags.len()], low.tags[..]);
        assert_eq!(high.tags[..orchestrator.tags.len()], orchestrator.tags[..]);

        assert_eq!(low.hash, orchestrator.hash);
        assert_eq!(orchestrator.hash, high.hash);
    }

    #[tokio::test]
    async fn higher_priority_source_wins_the_key() {
        let entity_tags = EntityTags::new();
        entity_tags
            .apply(update("docker", &["env:prod"], &[], &[]))
            .await
            .expect("apply failed");
        entity_tags
            .apply(update("kubelet", &["env:staging"], &[], &[]))
            .await
            .expect("apply failed");

        let low = entity_tags.get(TagCardinality::Low).await;
        assert_eq!(low.tags, vec!["env:staging".to_string()]);
        let mut sources = low.sources.clone();
        sources.sort();
        assert_eq!(sources, vec!["docker".to_string(), "kubelet".to_string()]);
    }

    #[tokio::test]
    async fn equal_priority_candidates_are_all_retained() {
        let entity_tags = EntityTags::new();
        entity_tags
            .apply(update("docker", &["env:prod"], &[], &[]))
            .await
            .expect("apply failed");
        entity_tags
            .apply(update("cri", &["env:sandbox"], &[], &[]))
            .await
            .expect("apply failed");

        let mut tags = entity_tags.get(TagCardinality::Low).await.tags;
        tags.sort();
        assert_eq!(
            tags,
            vec!["env:prod".to_string(), "env:sandbox".to_string()]
        );
    }

    #[tokio::test]
    async fn suppression_crosses_cardinality_buckets() {
        // kubelet outranks docker: its low-cardinality pod tag must suppress
        // docker's high-cardinality value for the same key.
        let entity_tags = EntityTags::new();
        entity_tags
            .apply(update("kubelet", &["pod_name:p1"], &[], &[]))
            .await
            .expect("apply failed");
        entity_tags
            .apply(update("docker", &[], &[], &["pod_name:containerhash"]))
            .await
            .expect("apply failed");

        let high = entity_tags.get(TagCardinality::High).await;
        assert_eq!(high.tags, vec!["pod_name:p1".to_string()]);
    }

    #[tokio::test]
    async fn same_source_ties_survive_across_buckets() {
        // A single source reporting the same key at two cardinalities keeps
        // both values, they tie at the source's own priority.
        let entity_tags = EntityTags::new();
        entity_tags
            .apply(update("docker", &["image:redis"], &[], &["image:redis@sha256"]))
            .await
            .expect("apply failed");

        let mut tags = entity_tags.get(TagCardinality::High).await.tags;
        tags.sort();
        assert_eq!(
            tags,
            vec!["image:redis".to_string(), "image:redis@sha256".to_string()]
        );
        // The low view only carries the low-cardinality half.
        assert_eq!(
            entity_tags.get(TagCardinality::Low).await.tags,
            vec!["image:redis".to_string()]
        );
    }

    #[tokio::test]
    async fn cache_miss_never_overwrites_authoritative_tags() {
        let entity_tags = EntityTags::new();
        entity_tags
            .apply(update("docker", &["image_name:redis"], &[], &[]))
            .await
            .expect("apply failed");

        let rejected = entity_tags
            .apply(TagInfo {
                cache_miss: true,
                ..update("docker", &[], &[], &[])
            })
            .await;
        assert!(matches!(
            rejected,
            Err(TagStoreError::CacheMissOverwrite { .. })
        ));

        let low = entity_tags.get(TagCardinality::Low).await;
        assert_eq!(low.tags, vec!["image_name:redis".to_string()]);
    }

    #[tokio::test]
    async fn cache_miss_on_a_fresh_record_is_applied() {
        let entity_tags = EntityTags::new();
        entity_tags
            .apply(TagInfo {
                cache_miss: true,
                ..update("docker", &[], &[], &[])
            })
            .await
            .expect("apply failed");

        let low = entity_tags.get(TagCardinality::Low).await;
        assert!(low.tags.is_empty());
        assert_eq!(low.sources, vec!["docker".to_string()]);
    }

    #[tokio::test]
    async fn repeated_gets_return_the_memoized_view() {
        let entity_tags = EntityTags::new();
        entity_tags
            .apply(update("docker", &["image_name:redis"], &[], &["container_id:abc"]))
            .await
            .expect("apply failed");

        let first = entity_tags.get(TagCardinality::High).await;
        let second = entity_tags.get(TagCardinality::High).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn update_invalidates_the_memoized_view() {
        let entity_tags = EntityTags::new();
        entity_tags
            .apply(update("docker", &["env:prod"], &[], &[]))
            .await
            .expect("apply failed");
        let before = entity_tags.get(TagCardinality::Low).await;

        entity_tags
            .apply(update("docker", &["env:staging"], &[], &[]))
            .await
            .expect("apply failed");
        let after = entity_tags.get(TagCardinality::Low).await;

        assert_eq!(after.tags, vec!["env:staging".to_string()]);
        assert_ne!(before.hash, after.hash);
        // The previously returned view is a private copy, untouched by the
        // rebuild.
        assert_eq!(before.tags, vec!["env:prod".to_string()]);
    }

    #[tokio::test]
    async fn standard_tags_concatenate_across_sources() {
        let entity_tags = EntityTags::new();
        entity_tags
            .apply(TagInfo {
                standard_tags: vec!["env:prod".to_string()],
                ..update("docker", &[], &[], &[])
            })
            .await
            .expect("apply failed");
        entity_tags
            .apply(TagInfo {
                standard_tags: vec!["service:web".to_string(), "version:1.2".to_string()],
                ..update("kubelet", &[], &[], &[])
            })
            .await
            .expect("apply failed");

        let mut standard = entity_tags.get_standard().await;
        standard.sort();
        assert_eq!(
            standard,
            vec![
                "env:prod".to_string(),
                "service:web".to_string(),
                "version:1.2".to_string()
            ]
        );
    }

    #[test]
    fn hash_is_independent_of_ordering() {
        let forward = vec!["a:1".to_string(), "b:2".to_string(), "c:3".to_string()];
        let backward = vec!["c:3".to_string(), "b:2".to_string(), "a:1".to_string()];
        assert_eq!(compute_tags_hash(&forward), compute_tags_hash(&backward));
    }

    #[test]
    fn hash_distinguishes_different_sets() {
        let one = vec!["a:1".to_string()];
        let other = vec!["a:2".to_string()];
        assert_ne!(compute_tags_hash(&one), compute_tags_hash(&other));
    }

    #[test]
    fn hash_of_nothing_is_empty() {
        assert_eq!(compute_tags_hash(&[]), "");
    }

    #[test]
    fn hash_is_the_fnv1a_of_the_sorted_concatenation() {
        // FNV-1a of "a:1" folded byte by byte.
        let mut expected = FNV_OFFSET_BASIS;
        for byte in "a:1".bytes() {
            expected ^= u64::from(byte);
            expected = expected.wrapping_mul(FNV_PRIME);
        }
        assert_eq!(
            compute_tags_hash(&["a:1".to_string()]),
            format!("{expected:x}")
        );
    }

    #[test]
    fn tag_key_is_the_prefix_before_the_first_colon() {
        let mut candidates_by_key = HashMap::new();
        insert_with_priority(
            &mut candidates_by_key,
            &[
                "simple:value".to_string(),
                "nested:a:b".to_string(),
                "keyonly".to_string(),
            ],
            "docker",
            TagCardinality::Low,
        );
        let mut keys: Vec<_> = candidates_by_key.keys().cloned().collect();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                "keyonly".to_string(),
                "nested".to_string(),
                "simple".to_string()
            ]
        );
    }
}
