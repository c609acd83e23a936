//! Model selection per orchestration phase.
//!
//! Reasoning-heavy phases (planning, validation, wisdom, verification) go to
//! the planning model; everything else goes to the cheaper execution model.

use crate::phase::Phase;
use serde::{Deserialize, Serialize};

/// Model names used by the router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingConfig {
    #[serde(default = "default_planning_model")]
    pub planning_model: String,
    #[serde(default = "default_execution_model")]
    pub execution_model: String,
}

fn default_planning_model() -> String {
    "gemini-3-pro".to_string()
}

fn default_execution_model() -> String {
    "gemini-3-flash".to_string()
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            planning_model: default_planning_model(),
            execution_model: default_execution_model(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModelRouter {
    config: RoutingConfig,
}

impl ModelRouter {
    pub fn new(config: RoutingConfig) -> Self {
        Self { config }
    }

    /// Whether the phase needs the planning model.
    pub fn is_planning_phase(phase: Phase) -> bool {
        matches!(
            phase,
            Phase::Plan | Phase::Validate | Phase::Wisdom | Phase::Verify
        )
    }

    /// Select the model for a phase.
    pub fn select_model(&self, phase: Phase) -> &str {
        if Self::is_planning_phase(phase) {
            &self.config.planning_model
        } else {
            &self.config.execution_model
        }
    }
}
