//! Orchestration phases and the legal transitions between them.
//!
//! This module provides:
//! - `Phase`, the closed set of orchestration stages in canonical order
//! - The adjacency map that decides which direct transitions are legal
//! - The artifact keys a phase requires before it can be entered

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::orchestrator::ArtifactKey;

/// A named stage of the orchestration workflow.
///
/// Ordering is only used for progress display. Transitions are governed by
/// [`Phase::successors`], which allows the PLAN/VALIDATE revision cycle and
/// lets CONTEXT bypass WISDOM.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Classify,
    Context,
    Wisdom,
    Plan,
    Validate,
    Delegate,
    Execute,
    Verify,
}

impl Phase {
    /// All phases in canonical order.
    pub const ALL: [Phase; 8] = [
        Phase::Classify,
        Phase::Context,
        Phase::Wisdom,
        Phase::Plan,
        Phase::Validate,
        Phase::Delegate,
        Phase::Execute,
        Phase::Verify,
    ];

    /// Total number of phases.
    pub const COUNT: usize = Self::ALL.len();

    /// 1-based position of the phase in canonical order.
    pub fn ordinal(self) -> usize {
        self as usize + 1
    }

    /// Upper-case name used in progress text.
    pub fn name(self) -> &'static str {
        match self {
            Phase::Classify => "CLASSIFY",
            Phase::Context => "CONTEXT",
            Phase::Wisdom => "WISDOM",
            Phase::Plan => "PLAN",
            Phase::Validate => "VALIDATE",
            Phase::Delegate => "DELEGATE",
            Phase::Execute => "EXECUTE",
            Phase::Verify => "VERIFY",
        }
    }

    /// Phases reachable from this one in a single transition.
    pub fn successors(self) -> &'static [Phase] {
        match self {
            Phase::Classify => &[Phase::Context],
            Phase::Context => &[Phase::Wisdom, Phase::Plan],
            Phase::Wisdom => &[Phase::Plan],
            Phase::Plan => &[Phase::Validate],
            Phase::Validate => &[Phase::Plan, Phase::Delegate],
            Phase::Delegate => &[Phase::Execute],
            Phase::Execute => &[Phase::Verify],
            Phase::Verify => &[],
        }
    }

    /// Check whether `target` is reachable in one hop.
    pub fn can_reach(self, target: Phase) -> bool {
        self.successors().contains(&target)
    }

    /// Artifacts that must be registered before this phase can be entered.
    pub fn required_artifacts(self) -> &'static [ArtifactKey] {
        match self {
            Phase::Classify | Phase::Plan => &[],
            Phase::Context => &[ArtifactKey::QueryClassification],
            Phase::Wisdom => &[ArtifactKey::ContextSummary],
            Phase::Validate => &[ArtifactKey::Plan],
            Phase::Delegate => &[ArtifactKey::ValidationResult],
            Phase::Execute => &[ArtifactKey::DelegationTargets, ArtifactKey::TaskGraph],
            Phase::Verify => &[ArtifactKey::ExecutionResult],
        }
    }

    /// Whether this is the terminal phase.
    pub fn is_terminal(self) -> bool {
        self.successors().is_empty()
    }

    /// Progress label such as `[Phase 4/8: PLAN]`.
    pub fn progress_label(self) -> String {
        format!("[Phase {}/{}: {}]", self.ordinal(), Self::COUNT, self.name())
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Phase {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Invalid phase '{}'. Valid values: classify, context, wisdom, plan, validate, delegate, execute, verify",
                    s
                )
            })
    }
}
