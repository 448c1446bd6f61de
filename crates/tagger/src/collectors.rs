// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use lazy_static::lazy_static;
use tracing::warn;

// Node-runtime collectors
const DOCKER_SOURCE: &str = "docker";
const CONTAINERD_SOURCE: &str = "containerd";
const CRI_SOURCE: &str = "cri";
const ECS_SOURCE: &str = "ecs";

// Node-orchestrator collectors
const KUBELET_SOURCE: &str = "kubelet";
const ECS_FARGATE_SOURCE: &str = "ecs_fargate";
const CLOUDFOUNDRY_SOURCE: &str = "cloudfoundry";

// Cluster-orchestrator collectors
const KUBE_METADATA_SOURCE: &str = "kube-metadata-collector";
const CLUSTER_AGENT_SOURCE: &str = "cluster-agent";

/// Rank of a collector source, used to resolve conflicts when two sources
/// assign different values to the same tag key. Higher wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CollectorPriority {
    /// Container runtimes observing the node directly.
    NodeRuntime,
    /// Orchestrator agents running on the node.
    NodeOrchestrator,
    /// Cluster-level metadata collectors.
    ClusterOrchestrator,
}

lazy_static! {
    static ref COLLECTOR_PRIORITIES: HashMap<&'static str, CollectorPriority> = HashMap::from([
        (DOCKER_SOURCE, CollectorPriority::NodeRuntime),
        (CONTAINERD_SOURCE, CollectorPriority::NodeRuntime),
        (CRI_SOURCE, CollectorPriority::NodeRuntime),
        (ECS_SOURCE, CollectorPriority::NodeRuntime),
        (KUBELET_SOURCE, CollectorPriority::NodeOrchestrator),
        (ECS_FARGATE_SOURCE, CollectorPriority::NodeOrchestrator),
        (CLOUDFOUNDRY_SOURCE, CollectorPriority::NodeOrchestrator),
        (KUBE_METADATA_SOURCE, CollectorPriority::ClusterOrchestrator),
        (CLUSTER_AGENT_SOURCE, CollectorPriority::ClusterOrchestrator),
    ]);
}

/// Returns the priority registered for a collector source. Sources without a
/// registry entry are assumed to be the lowest tier.
#[must_use]
pub fn priority_for(source: &str) -> CollectorPriority {
    match COLLECTOR_PRIORITIES.get(source) {
        Some(priority) => *priority,
        None => {
            warn!("{source} collector has no defined priority, assuming low");
            CollectorPriority::NodeRuntime
        }
    }
}
