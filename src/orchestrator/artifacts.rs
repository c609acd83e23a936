//! Typed artifacts produced by orchestration phases.
//!
//! The artifact store is a closed mapping: every key is an [`ArtifactKey`]
//! and every value is the matching [`Artifact`] variant, so a value can never
//! be registered under the wrong key.

use crate::dag::TaskPlan;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Names of the artifacts phases exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKey {
    QueryClassification,
    ContextSummary,
    Wisdom,
    Plan,
    ValidationResult,
    DelegationTargets,
    TaskGraph,
    ExecutionResult,
}

impl ArtifactKey {
    pub const ALL: [ArtifactKey; 8] = [
        ArtifactKey::QueryClassification,
        ArtifactKey::ContextSummary,
        ArtifactKey::Wisdom,
        ArtifactKey::Plan,
        ArtifactKey::ValidationResult,
        ArtifactKey::DelegationTargets,
        ArtifactKey::TaskGraph,
        ArtifactKey::ExecutionResult,
    ];

    /// Stable snake_case name.
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactKey::QueryClassification => "query_classification",
            ArtifactKey::ContextSummary => "context_summary",
            ArtifactKey::Wisdom => "wisdom",
            ArtifactKey::Plan => "plan",
            ArtifactKey::ValidationResult => "validation_result",
            ArtifactKey::DelegationTargets => "delegation_targets",
            ArtifactKey::TaskGraph => "task_graph",
            ArtifactKey::ExecutionResult => "execution_result",
        }
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ArtifactKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ArtifactKey::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("Unknown artifact '{}'", s))
    }
}

/// Result of the VALIDATE phase's review of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub approved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critique: Option<String>,
}

/// A value produced by completing a phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Artifact {
    QueryClassification(String),
    ContextSummary(String),
    Wisdom(String),
    Plan(TaskPlan),
    ValidationResult(ValidationOutcome),
    /// Worker categories the plan delegates to
    DelegationTargets(Vec<String>),
    TaskGraph(TaskPlan),
    ExecutionResult(String),
}

impl Artifact {
    /// The key this artifact is stored under.
    pub fn key(&self) -> ArtifactKey {
        match self {
            Artifact::QueryClassification(_) => ArtifactKey::QueryClassification,
            Artifact::ContextSummary(_) => ArtifactKey::ContextSummary,
            Artifact::Wisdom(_) => ArtifactKey::Wisdom,
            Artifact::Plan(_) => ArtifactKey::Plan,
            Artifact::ValidationResult(_) => ArtifactKey::ValidationResult,
            Artifact::DelegationTargets(_) => ArtifactKey::DelegationTargets,
            Artifact::TaskGraph(_) => ArtifactKey::TaskGraph,
            Artifact::ExecutionResult(_) => ArtifactKey::ExecutionResult,
        }
    }

    /// The task plan carried by `Plan` and `TaskGraph` artifacts.
    pub fn as_plan(&self) -> Option<&TaskPlan> {
        match self {
            Artifact::Plan(plan) | Artifact::TaskGraph(plan) => Some(plan),
            _ => None,
        }
    }
}

/// Append/overwrite store of artifacts. Entries are never removed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtifactStore {
    entries: BTreeMap<ArtifactKey, Artifact>,
}

impl ArtifactStore {
    /// Store an artifact, replacing any previous value under the same key.
    ///
    /// Returns the replaced value.
    pub fn insert(&mut self, artifact: Artifact) -> Option<Artifact> {
        self.entries.insert(artifact.key(), artifact)
    }

    pub fn get(&self, key: ArtifactKey) -> Option<&Artifact> {
        self.entries.get(&key)
    }

    pub fn contains(&self, key: ArtifactKey) -> bool {
        self.entries.contains_key(&key)
    }

    /// Keys from `required` that are not present.
    pub fn missing(&self, required: &[ArtifactKey]) -> Vec<ArtifactKey> {
        required
            .iter()
            .copied()
            .filter(|k| !self.contains(*k))
            .collect()
    }

    pub fn keys(&self) -> impl Iterator<Item = ArtifactKey> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
