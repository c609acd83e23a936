//! Typed error hierarchy for the orchestration core.
//!
//! Three top-level enums cover the three subsystems:
//! - `OrchestratorError`: phase state machine failures
//! - `GraphError`: task graph construction and status lifecycle failures
//! - `EnforcementError`: wave dispatch and parallel compliance failures
//!
//! Every variant is recoverable. A rejected operation leaves the state it was
//! called on unchanged.

use std::time::Duration;
use thiserror::Error;

use crate::dag::TaskStatus;
use crate::orchestrator::ArtifactKey;
use crate::phase::Phase;

/// Errors from the phase state machine.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Invalid transition {from} -> {to}: {to} is not reachable from {from}")]
    InvalidTransition { from: Phase, to: Phase },

    #[error("Cannot enter {phase}: missing artifacts {missing:?}")]
    MissingArtifact {
        phase: Phase,
        missing: Vec<ArtifactKey>,
    },

    #[error("Critique limit exceeded: {count} of {max} revisions used")]
    CritiqueLimitExceeded { count: u32, max: u32 },

    #[error("Operation requires phase {expected}, current phase is {actual}")]
    WrongPhase { expected: Phase, actual: Phase },

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Errors from task graph construction and task status changes.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Cycle detected in task dependencies. Involved tasks: {tasks:?}")]
    CyclicDependency { tasks: Vec<String> },

    #[error("Unknown task '{id}'")]
    UnknownTask { id: String },

    #[error("Unknown dependency '{dependency}' in task '{task}': no task with that id exists")]
    UnknownDependency { task: String, dependency: String },

    #[error("Duplicate task id: {id}")]
    DuplicateTask { id: String },

    #[error("Task '{task}' cannot move from {from} to {to}")]
    InvalidStatusTransition {
        task: String,
        from: TaskStatus,
        to: TaskStatus,
    },
}

/// Errors from the parallel-execution enforcer.
#[derive(Debug, Error)]
pub enum EnforcementError {
    #[error("Task '{task}' is not in the current wave ({wave})")]
    OutOfWaveSpawn { task: String, wave: usize },

    #[error("Task '{task}' was already spawned in wave {wave}")]
    DuplicateSpawn { task: String, wave: usize },

    #[error(
        "Tasks in wave {wave} were not spawned in parallel: spread {}ms exceeds window {}ms",
        spread.as_millis(),
        window.as_millis()
    )]
    ParallelWindowViolation {
        wave: usize,
        spread: Duration,
        window: Duration,
    },

    #[error("Cannot advance past wave {wave}: unresolved tasks {unresolved:?}")]
    PrematureWaveAdvance {
        wave: usize,
        unresolved: Vec<String>,
    },

    #[error("Session halted after failed tasks {failed:?}")]
    SessionHalted { failed: Vec<String> },

    #[error(transparent)]
    Graph(#[from] GraphError),
}
