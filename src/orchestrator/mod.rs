//! Phase-gated orchestration session.
//!
//! [`OrchestratorState`] walks a session through the eight phases,
//! collecting [`Artifact`]s on the way. [`ModelRouter`] and the wisdom
//! helpers supply the per-phase model choice and planning context.

mod artifacts;
mod gate;
mod router;
mod state;
mod wisdom;

pub use artifacts::{Artifact, ArtifactKey, ArtifactStore, ValidationOutcome};
pub use gate::{AutoApprove, GateDecision, InteractiveGate, PhaseGate};
pub use router::{ModelRouter, RoutingConfig};
pub use state::{OrchestratorState, SessionSnapshot, StateConfig, TransitionOutcome};
pub use wisdom::{CritiqueGenerator, WISDOM_FILE, WisdomLoader};
