//! The orchestration phase state machine.
//!
//! A session moves through [`Phase`]s one transition at a time. Each
//! transition must follow the phase adjacency map, and entering a phase
//! requires its artifacts. VALIDATE -> PLAN revisions are bounded by
//! `max_critiques`.

use crate::dag::{EnforcerConfig, ParallelExecutionEnforcer, TaskGraph, TaskPlan};
use crate::errors::OrchestratorError;
use crate::orchestrator::artifacts::{Artifact, ArtifactKey, ArtifactStore};
use crate::orchestrator::gate::PhaseGate;
use crate::phase::Phase;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, info, warn};

/// Settings for the phase state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateConfig {
    /// Maximum VALIDATE -> PLAN revisions per planning cycle
    #[serde(default = "default_max_critiques")]
    pub max_critiques: u32,
    /// Treat missing artifacts as errors instead of warnings
    #[serde(default = "default_strict_mode")]
    pub strict_mode: bool,
    /// Ask the approval gate before each transition commits
    #[serde(default)]
    pub enable_phase_gates: bool,
}

fn default_max_critiques() -> u32 {
    3
}

fn default_strict_mode() -> bool {
    true
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            max_critiques: default_max_critiques(),
            strict_mode: default_strict_mode(),
            enable_phase_gates: false,
        }
    }
}

impl StateConfig {
    pub fn with_max_critiques(mut self, max: u32) -> Self {
        self.max_critiques = max;
        self
    }

    pub fn with_strict_mode(mut self, strict: bool) -> Self {
        self.strict_mode = strict;
        self
    }

    pub fn with_phase_gates(mut self, enabled: bool) -> Self {
        self.enable_phase_gates = enabled;
        self
    }
}

/// Result of a transition attempt that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The session moved to `to`.
    Advanced { from: Phase, to: Phase },
    /// The approval gate said no; the session stays in `from`.
    Declined { from: Phase, to: Phase },
}

impl TransitionOutcome {
    pub fn is_advanced(&self) -> bool {
        matches!(self, Self::Advanced { .. })
    }
}

/// Serializable view of a session for status output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub display: String,
    pub critique_count: u32,
    pub max_critiques: u32,
    pub history: Vec<Phase>,
    pub artifacts: Vec<ArtifactKey>,
}

/// State of one orchestration session.
pub struct OrchestratorState {
    current_phase: Phase,
    /// Phases left so far, in order
    history: Vec<Phase>,
    artifacts: ArtifactStore,
    critique_count: u32,
    config: StateConfig,
    gate: Option<Box<dyn PhaseGate>>,
}

impl fmt::Debug for OrchestratorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrchestratorState")
            .field("current_phase", &self.current_phase)
            .field("history", &self.history)
            .field("artifacts", &self.artifacts)
            .field("critique_count", &self.critique_count)
            .field("config", &self.config)
            .field("gate", &self.gate.is_some())
            .finish()
    }
}

impl Default for OrchestratorState {
    fn default() -> Self {
        Self::new(StateConfig::default())
    }
}

impl OrchestratorState {
    /// Start a session in CLASSIFY.
    pub fn new(config: StateConfig) -> Self {
        Self {
            current_phase: Phase::Classify,
            history: Vec::new(),
            artifacts: ArtifactStore::default(),
            critique_count: 0,
            config,
            gate: None,
        }
    }

    /// Install the approval gate consulted when phase gates are enabled.
    pub fn with_gate(mut self, gate: impl PhaseGate + 'static) -> Self {
        self.gate = Some(Box::new(gate));
        self
    }

    pub fn current_phase(&self) -> Phase {
        self.current_phase
    }

    pub fn history(&self) -> &[Phase] {
        &self.history
    }

    pub fn critique_count(&self) -> u32 {
        self.critique_count
    }

    pub fn config(&self) -> &StateConfig {
        &self.config
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    pub fn artifact(&self, key: ArtifactKey) -> Option<&Artifact> {
        self.artifacts.get(key)
    }

    /// Store or overwrite an artifact. Always succeeds.
    pub fn register_artifact(&mut self, artifact: Artifact) {
        let key = artifact.key();
        let replaced = self.artifacts.insert(artifact).is_some();
        info!(artifact = %key, replaced, phase = %self.current_phase, "artifact registered");
    }

    /// Artifacts `target` requires that are not registered yet.
    pub fn get_missing_artifacts(&self, target: Phase) -> Vec<ArtifactKey> {
        self.artifacts.missing(target.required_artifacts())
    }

    /// Check whether a transition to `target` would be allowed.
    ///
    /// Never changes state. The approval gate is not consulted.
    pub fn can_transition_to(&self, target: Phase) -> Result<(), OrchestratorError> {
        let from = self.current_phase;

        if !from.can_reach(target) {
            return Err(OrchestratorError::InvalidTransition { from, to: target });
        }

        if self.config.strict_mode {
            let missing = self.get_missing_artifacts(target);
            if !missing.is_empty() {
                return Err(OrchestratorError::MissingArtifact {
                    phase: target,
                    missing,
                });
            }
        }

        if from == Phase::Validate
            && target == Phase::Plan
            && self.critique_count >= self.config.max_critiques
        {
            return Err(OrchestratorError::CritiqueLimitExceeded {
                count: self.critique_count,
                max: self.config.max_critiques,
            });
        }

        debug!(%from, to = %target, "transition allowed");
        Ok(())
    }

    /// Move to `target`.
    ///
    /// On error, or when the approval gate declines, the session stays in the
    /// current phase with its critique count unchanged.
    pub fn transition_to(&mut self, target: Phase) -> Result<TransitionOutcome, OrchestratorError> {
        self.can_transition_to(target)?;
        let from = self.current_phase;

        if !self.config.strict_mode {
            let missing = self.get_missing_artifacts(target);
            if !missing.is_empty() {
                warn!(%from, to = %target, missing = ?missing, "entering phase without required artifacts");
            }
        }

        if self.config.enable_phase_gates {
            let approved = match self.gate.as_mut() {
                Some(gate) => gate.approve(from, target),
                None => {
                    debug!("phase gates enabled without a gate, approving");
                    true
                }
            };
            if !approved {
                warn!(%from, to = %target, "transition declined at approval gate");
                return Ok(TransitionOutcome::Declined { from, to: target });
            }
        }

        match (from, target) {
            (Phase::Validate, Phase::Plan) => self.critique_count += 1,
            (Phase::Validate, Phase::Delegate) => self.critique_count = 0,
            _ => {}
        }

        self.history.push(from);
        self.current_phase = target;
        info!(
            %from,
            to = %target,
            critiques = self.critique_count,
            "{}",
            self.get_phase_display()
        );

        Ok(TransitionOutcome::Advanced { from, to: target })
    }

    /// Current phase as user-facing progress text, e.g. `[Phase 4/8: PLAN]`.
    pub fn get_phase_display(&self) -> String {
        self.current_phase.progress_label()
    }

    /// The accepted plan: the `task_graph` artifact if present, else `plan`.
    fn accepted_plan(&self) -> Option<&TaskPlan> {
        self.artifact(ArtifactKey::TaskGraph)
            .or_else(|| self.artifact(ArtifactKey::Plan))
            .and_then(Artifact::as_plan)
    }

    /// Build the task graph from the accepted plan. Only legal in DELEGATE.
    pub fn build_task_graph(&self) -> Result<TaskGraph, OrchestratorError> {
        if self.current_phase != Phase::Delegate {
            return Err(OrchestratorError::WrongPhase {
                expected: Phase::Delegate,
                actual: self.current_phase,
            });
        }

        let plan = self
            .accepted_plan()
            .ok_or_else(|| OrchestratorError::MissingArtifact {
                phase: Phase::Delegate,
                missing: vec![ArtifactKey::Plan],
            })?;

        let graph = TaskGraph::from_plan(plan)?;
        graph.validate_references()?;
        Ok(graph)
    }

    /// Build the task graph, wrap it in an enforcer, and register the
    /// `task_graph` and `delegation_targets` artifacts EXECUTE requires.
    pub fn begin_delegation(
        &mut self,
        config: EnforcerConfig,
    ) -> Result<ParallelExecutionEnforcer, OrchestratorError> {
        let graph = self.build_task_graph()?;

        let targets: BTreeSet<String> = graph
            .tasks()
            .iter()
            .map(|t| t.worker_category.clone())
            .collect();
        let plan = self.accepted_plan().cloned().unwrap_or_default();

        let enforcer = ParallelExecutionEnforcer::new(graph, config)?;

        if !self.artifacts.contains(ArtifactKey::TaskGraph) {
            self.register_artifact(Artifact::TaskGraph(plan));
        }
        if !self.artifacts.contains(ArtifactKey::DelegationTargets) {
            self.register_artifact(Artifact::DelegationTargets(targets.into_iter().collect()));
        }

        Ok(enforcer)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.current_phase,
            display: self.get_phase_display(),
            critique_count: self.critique_count,
            max_critiques: self.config.max_critiques,
            history: self.history.clone(),
            artifacts: self.artifacts.keys().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::artifacts::ValidationOutcome;
    use std::sync::{Arc, Mutex};

    fn approved() -> Artifact {
        Artifact::ValidationResult(ValidationOutcome {
            approved: true,
            critique: None,
        })
    }

    fn rejected() -> Artifact {
        Artifact::ValidationResult(ValidationOutcome {
            approved: false,
            critique: Some("split task b".into()),
        })
    }

    fn sample_plan() -> TaskPlan {
        TaskPlan::default()
            .with_task("a", "Task A", "explore", &[])
            .with_task("b", "Task B", "dewey", &[])
            .with_task("c", "Task C", "frontend", &["a", "b"])
    }

    /// A session standing in PLAN with a registered plan.
    fn at_plan(config: StateConfig) -> OrchestratorState {
        let mut state = OrchestratorState::new(config);
        state.register_artifact(Artifact::QueryClassification("complex".into()));
        state.transition_to(Phase::Context).unwrap();
        state.transition_to(Phase::Plan).unwrap();
        state.register_artifact(Artifact::Plan(sample_plan()));
        state
    }

    #[test]
    fn test_starts_in_classify() {
        let state = OrchestratorState::default();
        assert_eq!(state.current_phase(), Phase::Classify);
        assert_eq!(state.critique_count(), 0);
        assert!(state.history().is_empty());
        assert_eq!(state.get_phase_display(), "[Phase 1/8: CLASSIFY]");
    }

    #[test]
    fn test_multi_hop_rejected_even_with_all_artifacts() {
        let mut state = OrchestratorState::default();
        state.register_artifact(Artifact::DelegationTargets(vec!["explore".into()]));
        state.register_artifact(Artifact::TaskGraph(sample_plan()));

        let err = state.transition_to(Phase::Execute).unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::InvalidTransition {
                from: Phase::Classify,
                to: Phase::Execute
            }
        ));
        assert_eq!(state.current_phase(), Phase::Classify);
    }

    #[test]
    fn test_context_then_skip_to_delegate_rejected() {
        let mut state = OrchestratorState::default();
        state.register_artifact(Artifact::QueryClassification("simple".into()));

        let outcome = state.transition_to(Phase::Context).unwrap();
        assert!(outcome.is_advanced());
        assert_eq!(state.current_phase(), Phase::Context);
        assert_eq!(state.history(), &[Phase::Classify]);

        let err = state.transition_to(Phase::Delegate).unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidTransition { .. }));
        assert_eq!(state.current_phase(), Phase::Context);
    }

    #[test]
    fn test_missing_artifact_strict() {
        let mut state = OrchestratorState::default();

        let err = state.transition_to(Phase::Context).unwrap_err();
        match err {
            OrchestratorError::MissingArtifact { phase, missing } => {
                assert_eq!(phase, Phase::Context);
                assert_eq!(missing, vec![ArtifactKey::QueryClassification]);
            }
            other => panic!("Expected MissingArtifact, got {other:?}"),
        }
        assert_eq!(state.current_phase(), Phase::Classify);

        state.register_artifact(Artifact::QueryClassification("complex".into()));
        assert!(state.transition_to(Phase::Context).is_ok());
    }

    #[test]
    fn test_missing_artifact_non_strict_is_skipped() {
        let mut state = OrchestratorState::new(StateConfig::default().with_strict_mode(false));
        assert!(state.can_transition_to(Phase::Context).is_ok());
        state.transition_to(Phase::Context).unwrap();
        assert_eq!(state.current_phase(), Phase::Context);

        // Adjacency still applies without strict mode
        assert!(matches!(
            state.transition_to(Phase::Verify),
            Err(OrchestratorError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_wisdom_is_optional() {
        let mut via_wisdom = OrchestratorState::default();
        via_wisdom.register_artifact(Artifact::QueryClassification("q".into()));
        via_wisdom.transition_to(Phase::Context).unwrap();
        assert!(via_wisdom.transition_to(Phase::Wisdom).is_err());
        via_wisdom.register_artifact(Artifact::ContextSummary("ctx".into()));
        via_wisdom.transition_to(Phase::Wisdom).unwrap();
        via_wisdom.transition_to(Phase::Plan).unwrap();
        assert_eq!(
            via_wisdom.history(),
            &[Phase::Classify, Phase::Context, Phase::Wisdom]
        );

        let skipped = at_plan(StateConfig::default());
        assert_eq!(skipped.history(), &[Phase::Classify, Phase::Context]);
    }

    #[test]
    fn test_critique_limit() {
        let mut state = at_plan(StateConfig::default().with_max_critiques(1));

        state.transition_to(Phase::Validate).unwrap();
        state.register_artifact(rejected());
        state.transition_to(Phase::Plan).unwrap();
        assert_eq!(state.critique_count(), 1);

        state.transition_to(Phase::Validate).unwrap();
        let err = state.transition_to(Phase::Plan).unwrap_err();
        match err {
            OrchestratorError::CritiqueLimitExceeded { count, max } => {
                assert_eq!(count, 1);
                assert_eq!(max, 1);
            }
            other => panic!("Expected CritiqueLimitExceeded, got {other:?}"),
        }
        assert_eq!(state.current_phase(), Phase::Validate);
        assert_eq!(state.critique_count(), 1);

        // The caller can still force-accept the plan
        state.register_artifact(approved());
        state.transition_to(Phase::Delegate).unwrap();
        assert_eq!(state.current_phase(), Phase::Delegate);
    }

    #[test]
    fn test_critique_count_resets_toward_delegate() {
        let mut state = at_plan(StateConfig::default());
        state.transition_to(Phase::Validate).unwrap();
        state.transition_to(Phase::Plan).unwrap();
        state.transition_to(Phase::Validate).unwrap();
        state.transition_to(Phase::Plan).unwrap();
        state.transition_to(Phase::Validate).unwrap();
        assert_eq!(state.critique_count(), 2);

        state.register_artifact(approved());
        state.transition_to(Phase::Delegate).unwrap();
        assert_eq!(state.critique_count(), 0);
    }

    #[test]
    fn test_queries_are_idempotent() {
        let mut state = at_plan(StateConfig::default().with_max_critiques(1));
        state.transition_to(Phase::Validate).unwrap();
        state.transition_to(Phase::Plan).unwrap();
        state.transition_to(Phase::Validate).unwrap();

        let phase = state.current_phase();
        let count = state.critique_count();
        for _ in 0..10 {
            let _ = state.get_missing_artifacts(Phase::Delegate);
            let _ = state.can_transition_to(Phase::Plan);
            let _ = state.can_transition_to(Phase::Delegate);
            let _ = state.can_transition_to(Phase::Verify);
        }
        assert_eq!(state.current_phase(), phase);
        assert_eq!(state.critique_count(), count);
    }

    #[test]
    fn test_gate_disabled_never_called() {
        let calls = Arc::new(Mutex::new(0));
        let counter = calls.clone();
        let mut state = OrchestratorState::new(StateConfig::default().with_strict_mode(false))
            .with_gate(move |_: Phase, _: Phase| {
                *counter.lock().unwrap() += 1;
                false
            });

        state.transition_to(Phase::Context).unwrap();
        assert_eq!(state.current_phase(), Phase::Context);
        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[test]
    fn test_gate_approves() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let seen = calls.clone();
        let config = StateConfig::default()
            .with_strict_mode(false)
            .with_phase_gates(true);
        let mut state = OrchestratorState::new(config).with_gate(move |from: Phase, to: Phase| {
            seen.lock().unwrap().push((from, to));
            true
        });

        let outcome = state.transition_to(Phase::Context).unwrap();
        assert_eq!(
            outcome,
            TransitionOutcome::Advanced {
                from: Phase::Classify,
                to: Phase::Context
            }
        );
        assert_eq!(*calls.lock().unwrap(), vec![(Phase::Classify, Phase::Context)]);
    }

    #[test]
    fn test_gate_decline_leaves_state_unchanged() {
        let config = StateConfig::default()
            .with_strict_mode(false)
            .with_phase_gates(true);
        let mut state = OrchestratorState::new(config).with_gate(|_: Phase, _: Phase| false);

        let outcome = state.transition_to(Phase::Context).unwrap();
        assert_eq!(
            outcome,
            TransitionOutcome::Declined {
                from: Phase::Classify,
                to: Phase::Context
            }
        );
        assert_eq!(state.current_phase(), Phase::Classify);
        assert!(state.history().is_empty());
    }

    #[test]
    fn test_gate_decline_does_not_count_critique() {
        let config = StateConfig::default().with_phase_gates(true);
        let allow = Arc::new(Mutex::new(true));
        let switch = allow.clone();
        let mut state = OrchestratorState::new(config)
            .with_gate(move |_: Phase, _: Phase| *switch.lock().unwrap());
        state.register_artifact(Artifact::QueryClassification("q".into()));
        state.transition_to(Phase::Context).unwrap();
        state.transition_to(Phase::Plan).unwrap();
        state.register_artifact(Artifact::Plan(sample_plan()));
        state.transition_to(Phase::Validate).unwrap();

        *allow.lock().unwrap() = false;
        let outcome = state.transition_to(Phase::Plan).unwrap();
        assert!(!outcome.is_advanced());
        assert_eq!(state.critique_count(), 0);
        assert_eq!(state.current_phase(), Phase::Validate);
    }

    #[test]
    fn test_build_task_graph_requires_delegate() {
        let state = at_plan(StateConfig::default());
        assert!(matches!(
            state.build_task_graph(),
            Err(OrchestratorError::WrongPhase {
                expected: Phase::Delegate,
                actual: Phase::Plan
            })
        ));
    }

    #[test]
    fn test_begin_delegation_registers_execute_artifacts() {
        let mut state = at_plan(StateConfig::default());
        state.transition_to(Phase::Validate).unwrap();
        state.register_artifact(approved());
        state.transition_to(Phase::Delegate).unwrap();

        assert_eq!(
            state.get_missing_artifacts(Phase::Execute),
            vec![ArtifactKey::DelegationTargets, ArtifactKey::TaskGraph]
        );

        let enforcer = state.begin_delegation(EnforcerConfig::default()).unwrap();
        assert_eq!(enforcer.total_waves(), 2);
        assert!(state.get_missing_artifacts(Phase::Execute).is_empty());
        assert_eq!(
            state.artifact(ArtifactKey::DelegationTargets),
            Some(&Artifact::DelegationTargets(vec![
                "dewey".into(),
                "explore".into(),
                "frontend".into()
            ]))
        );

        state.transition_to(Phase::Execute).unwrap();
        assert_eq!(state.get_phase_display(), "[Phase 7/8: EXECUTE]");
    }

    #[test]
    fn test_begin_delegation_reports_cycle() {
        let mut state = OrchestratorState::new(StateConfig::default());
        state.register_artifact(Artifact::QueryClassification("q".into()));
        state.transition_to(Phase::Context).unwrap();
        state.transition_to(Phase::Plan).unwrap();
        let cyclic = TaskPlan::default()
            .with_task("a", "A", "w", &["b"])
            .with_task("b", "B", "w", &["a"]);
        state.register_artifact(Artifact::Plan(cyclic));
        state.transition_to(Phase::Validate).unwrap();
        state.register_artifact(approved());
        state.transition_to(Phase::Delegate).unwrap();

        let err = state.begin_delegation(EnforcerConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::Graph(crate::errors::GraphError::CyclicDependency { .. })
        ));
        assert!(!state.artifacts().contains(ArtifactKey::TaskGraph));
    }

    #[test]
    fn test_full_session_reaches_verify() {
        let mut state = at_plan(StateConfig::default());
        state.transition_to(Phase::Validate).unwrap();
        state.register_artifact(approved());
        state.transition_to(Phase::Delegate).unwrap();
        let _enforcer = state.begin_delegation(EnforcerConfig::default()).unwrap();
        state.transition_to(Phase::Execute).unwrap();

        assert!(matches!(
            state.transition_to(Phase::Verify),
            Err(OrchestratorError::MissingArtifact { .. })
        ));
        state.register_artifact(Artifact::ExecutionResult("all tasks done".into()));
        state.transition_to(Phase::Verify).unwrap();

        let snapshot = state.snapshot();
        assert_eq!(snapshot.phase, Phase::Verify);
        assert_eq!(snapshot.display, "[Phase 8/8: VERIFY]");
        assert_eq!(snapshot.history.len(), 6);
        assert!(Phase::Verify.is_terminal());
        assert!(state.transition_to(Phase::Classify).is_err());
    }
}
