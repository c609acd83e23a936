//! Project wisdom and plan critique prompts.
//!
//! Wisdom is a free-form file of lessons learned that the WISDOM phase feeds
//! into planning. The critique prompt drives the PLAN/VALIDATE revision loop.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Default wisdom file name inside the project's `.wavefront` directory.
pub const WISDOM_FILE: &str = "wisdom.md";

/// Loads the project wisdom file.
#[derive(Debug, Clone)]
pub struct WisdomLoader {
    path: PathBuf,
}

impl WisdomLoader {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Loader for `<wavefront_dir>/wisdom.md`.
    pub fn for_dir(wavefront_dir: &Path) -> Self {
        Self::new(wavefront_dir.join(WISDOM_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the wisdom file. A missing file yields an empty string.
    pub fn load_wisdom(&self) -> Result<String> {
        if !self.path.exists() {
            return Ok(String::new());
        }
        std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read wisdom file: {}", self.path.display()))
    }
}

/// Builds the prompt used to critique a plan during VALIDATE.
#[derive(Debug, Clone, Copy, Default)]
pub struct CritiqueGenerator;

impl CritiqueGenerator {
    pub fn critique_prompt(&self, plan: &str) -> String {
        format!(
            "## CRITIQUE\n\n\
             Review the following plan before any work is delegated.\n\n\
             ### Plan\n\n{plan}\n\n\
             ### Instructions\n\n\
             1. List 3 ways this plan could fail.\n\
             2. Identify tasks that are declared dependent but could run in parallel.\n\
             3. Answer APPROVED if the plan is ready, otherwise REVISE with concrete changes.\n"
        )
    }
}
