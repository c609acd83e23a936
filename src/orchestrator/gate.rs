//! Human approval gates for phase transitions.

use crate::phase::Phase;
use crate::ui::icons::{CHECK, CROSS};
use dialoguer::{Select, theme::ColorfulTheme};
use tracing::warn;

/// Decides whether a phase transition may commit.
///
/// Consulted by the state machine only when phase gates are enabled. A
/// negative answer leaves the session in its current phase.
pub trait PhaseGate: Send {
    fn approve(&mut self, from: Phase, to: Phase) -> bool;
}

impl<F> PhaseGate for F
where
    F: FnMut(Phase, Phase) -> bool + Send,
{
    fn approve(&mut self, from: Phase, to: Phase) -> bool {
        self(from, to)
    }
}

/// Gate that approves every transition.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

impl PhaseGate for AutoApprove {
    fn approve(&mut self, _from: Phase, _to: Phase) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateDecision {
    Approved,
    ApprovedAll, // User chose "yes to all"
    Rejected,
}

/// Terminal prompt asking the operator before each transition.
pub struct InteractiveGate {
    pub skip_all: bool,
}

impl InteractiveGate {
    pub fn new(skip_all: bool) -> Self {
        Self { skip_all }
    }

    fn prompt_user(&mut self, from: Phase, to: Phase) -> anyhow::Result<GateDecision> {
        let options = &[
            "Yes, enter this phase",
            "Yes, and auto-approve remaining phases (--yes)",
            "No, stay in the current phase",
        ];

        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("Proceed from {} to {}?", from, to.progress_label()))
            .items(options)
            .default(0)
            .interact()?;

        match selection {
            0 => Ok(GateDecision::Approved),
            1 => {
                self.skip_all = true;
                Ok(GateDecision::ApprovedAll)
            }
            _ => Ok(GateDecision::Rejected),
        }
    }
}

impl PhaseGate for InteractiveGate {
    fn approve(&mut self, from: Phase, to: Phase) -> bool {
        if self.skip_all {
            println!(
                "  {}{} (--yes flag)",
                CHECK,
                console::style("Auto-approved").dim()
            );
            return true;
        }

        match self.prompt_user(from, to) {
            Ok(GateDecision::Approved | GateDecision::ApprovedAll) => true,
            Ok(GateDecision::Rejected) => {
                println!("  {}{}", CROSS, console::style("Declined").yellow());
                false
            }
            Err(e) => {
                warn!(error = %e, "approval prompt failed, treating as declined");
                false
            }
        }
    }
}
