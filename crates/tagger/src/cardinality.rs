// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::TagStoreError;

/// Cardinality level of a tag: an estimate of the value-space size, used to
/// opt consumers in or out of high-churn labels.
///
/// Queries carry a cardinality ceiling; the resolved view for a given ceiling
/// contains every tag at or below it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum TagCardinality {
    /// Stable labels (image name, environment).
    #[default]
    Low,
    /// Labels that churn with orchestrator scheduling (pod name).
    Orchestrator,
    /// High-churn labels (container ID).
    High,
}

impl TagCardinality {
    const LOW_STR: &'static str = "low";
    const ORCHESTRATOR_STR: &'static str = "orchestrator";
    const HIGH_STR: &'static str = "high";
}

impl fmt::Display for TagCardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "{}", Self::LOW_STR),
            Self::Orchestrator => write!(f, "{}", Self::ORCHESTRATOR_STR),
            Self::High => write!(f, "{}", Self::HIGH_STR),
        }
    }
}

impl FromStr for TagCardinality {
    type Err = TagStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            Self::LOW_STR => Ok(Self::Low),
            Self::ORCHESTRATOR_STR => Ok(Self::Orchestrator),
            Self::HIGH_STR => Ok(Self::High),
            _ => Err(TagStoreError::InvalidCardinality(s.to_string())),
        }
    }
}
