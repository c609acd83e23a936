//! Configuration for wavefront sessions.
//!
//! Settings are read from `.wavefront/wavefront.toml`; environment variables
//! override the file, and CLI flags override both.
//!
//! # Configuration File Format
//!
//! ```toml
//! [orchestrator]
//! max_critiques = 3
//! strict_mode = true
//! enable_phase_gates = false
//!
//! [enforcement]
//! parallel_window_ms = 500
//! strict = true
//! failure_policy = "halt"
//!
//! [routing]
//! planning_model = "gemini-3-pro"
//! execution_model = "gemini-3-flash"
//! ```

use crate::dag::{EnforcerConfig, FailurePolicy};
use crate::orchestrator::{ModelRouter, RoutingConfig, StateConfig, WISDOM_FILE};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Name of the per-project directory.
pub const WAVEFRONT_DIR: &str = ".wavefront";
/// Name of the configuration file inside [`WAVEFRONT_DIR`].
pub const CONFIG_FILE: &str = "wavefront.toml";

pub const ENV_PARALLEL_WINDOW_MS: &str = "WAVEFRONT_PARALLEL_WINDOW_MS";
pub const ENV_STRICT_MODE: &str = "WAVEFRONT_STRICT_MODE";
pub const ENV_MAX_CRITIQUES: &str = "WAVEFRONT_MAX_CRITIQUES";

/// Parallel-dispatch enforcement settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnforcementSection {
    /// Allowed spread between the first and last spawn of a wave
    #[serde(default = "default_parallel_window_ms")]
    pub parallel_window_ms: u64,
    /// Raise window violations as errors
    #[serde(default = "default_strict")]
    pub strict: bool,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

fn default_parallel_window_ms() -> u64 {
    500
}

fn default_strict() -> bool {
    true
}

impl Default for EnforcementSection {
    fn default() -> Self {
        Self {
            parallel_window_ms: default_parallel_window_ms(),
            strict: default_strict(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl EnforcementSection {
    pub fn to_enforcer_config(&self) -> EnforcerConfig {
        EnforcerConfig::default()
            .with_parallel_window(Duration::from_millis(self.parallel_window_ms))
            .with_strict(self.strict)
            .with_failure_policy(self.failure_policy)
    }
}

/// Root of `wavefront.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WavefrontToml {
    /// Phase state machine settings
    #[serde(default)]
    pub orchestrator: StateConfig,
    #[serde(default)]
    pub enforcement: EnforcementSection,
    /// Model routing per phase
    #[serde(default)]
    pub routing: RoutingConfig,
}

impl WavefrontToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse wavefront.toml")
    }

    /// Load `<wavefront_dir>/wavefront.toml`, or defaults if it doesn't exist.
    pub fn load_or_default(wavefront_dir: &Path) -> Result<Self> {
        let config_path = wavefront_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            debug!(path = %config_path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize wavefront.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Apply overrides from `lookup`, keyed by environment variable name.
    ///
    /// Unparseable values are skipped and reported in the returned warnings.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Vec<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut warnings = Vec::new();

        if let Some(raw) = lookup(ENV_PARALLEL_WINDOW_MS) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => self.enforcement.parallel_window_ms = ms,
                Err(_) => warnings.push(format!(
                    "Ignoring {}='{}': expected milliseconds",
                    ENV_PARALLEL_WINDOW_MS, raw
                )),
            }
        }

        if let Some(raw) = lookup(ENV_STRICT_MODE) {
            match parse_bool(&raw) {
                Some(strict) => self.orchestrator.strict_mode = strict,
                None => warnings.push(format!(
                    "Ignoring {}='{}': expected true or false",
                    ENV_STRICT_MODE, raw
                )),
            }
        }

        if let Some(raw) = lookup(ENV_MAX_CRITIQUES) {
            match raw.trim().parse::<u32>() {
                Ok(max) => self.orchestrator.max_critiques = max,
                Err(_) => warnings.push(format!(
                    "Ignoring {}='{}': expected a non-negative integer",
                    ENV_MAX_CRITIQUES, raw
                )),
            }
        }

        warnings
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Vec<String> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.enforcement.parallel_window_ms == 0 {
            warnings.push(
                "parallel_window_ms is 0: every wave with more than one task will be non-compliant"
                    .to_string(),
            );
        }

        if self.orchestrator.max_critiques == 0 {
            warnings.push("max_critiques is 0: VALIDATE can never send a plan back".to_string());
        }

        if self.routing.planning_model.trim().is_empty() {
            warnings.push("routing.planning_model is empty".to_string());
        }
        if self.routing.execution_model.trim().is_empty() {
            warnings.push("routing.execution_model is empty".to_string());
        }

        warnings
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Resolved configuration for one project directory.
#[derive(Debug, Clone)]
pub struct WavefrontConfig {
    pub project_dir: PathBuf,
    pub wavefront_dir: PathBuf,
    /// File settings with environment overrides applied
    pub toml: WavefrontToml,
    /// CLI override for the parallel window
    pub cli_parallel_window_ms: Option<u64>,
}

impl WavefrontConfig {
    /// Load configuration for `project_dir` (file -> env).
    pub fn new(project_dir: PathBuf) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let wavefront_dir = project_dir.join(WAVEFRONT_DIR);
        let mut toml = WavefrontToml::load_or_default(&wavefront_dir)?;
        for warning in toml.apply_env_overrides() {
            warn!("{}", warning);
        }

        Ok(Self {
            project_dir,
            wavefront_dir,
            toml,
            cli_parallel_window_ms: None,
        })
    }

    pub fn with_parallel_window_ms(mut self, window_ms: Option<u64>) -> Self {
        self.cli_parallel_window_ms = window_ms;
        self
    }

    pub fn config_file(&self) -> PathBuf {
        self.wavefront_dir.join(CONFIG_FILE)
    }

    pub fn wisdom_file(&self) -> PathBuf {
        self.wavefront_dir.join(WISDOM_FILE)
    }

    pub fn state_config(&self) -> StateConfig {
        self.toml.orchestrator.clone()
    }

    /// Enforcer settings (CLI -> env -> file -> default).
    pub fn enforcer_config(&self) -> EnforcerConfig {
        let config = self.toml.enforcement.to_enforcer_config();
        match self.cli_parallel_window_ms {
            Some(ms) => config.with_parallel_window(Duration::from_millis(ms)),
            None => config,
        }
    }

    pub fn router(&self) -> ModelRouter {
        ModelRouter::new(self.toml.routing.clone())
    }

    /// Validate configuration and return warnings.
    pub fn validate(&self) -> Vec<String> {
        self.toml.validate()
    }
}
