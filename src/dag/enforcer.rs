//! Parallel-execution enforcement over a task graph.
//!
//! The enforcer turns the wave structure of a [`TaskGraph`] into a dispatch
//! contract: only tasks in the active wave may be spawned, each at most once,
//! and all spawns of a wave must land within `parallel_window` of each other.
//!
//! Spawning and compliance are separate steps. A caller issues every spawn of
//! a wave first, then asks [`ParallelExecutionEnforcer::check_parallel_compliance`]
//! once dispatch is believed complete.

use crate::dag::builder::TaskGraph;
use crate::dag::state::{Task, TaskStatus};
use crate::errors::{EnforcementError, GraphError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// What happens once a wave resolves with at least one failed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Advance the wave but refuse further spawns
    #[default]
    Halt,
    /// Keep dispatching later waves
    Continue,
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailurePolicy::Halt => write!(f, "halt"),
            FailurePolicy::Continue => write!(f, "continue"),
        }
    }
}

/// Configuration for the enforcer.
#[derive(Debug, Clone)]
pub struct EnforcerConfig {
    /// Maximum spread between the first and last spawn of a wave
    pub parallel_window: Duration,
    /// Raise window violations as errors instead of reporting them
    pub strict: bool,
    pub failure_policy: FailurePolicy,
}

impl Default for EnforcerConfig {
    fn default() -> Self {
        Self {
            parallel_window: Duration::from_millis(500),
            strict: true,
            failure_policy: FailurePolicy::Halt,
        }
    }
}

impl EnforcerConfig {
    pub fn with_parallel_window(mut self, window: Duration) -> Self {
        self.parallel_window = window;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }
}

/// A spawn recorded for the current wave.
#[derive(Debug, Clone)]
pub struct SpawnRecord {
    pub task_id: String,
    pub external_handle: String,
    /// Monotonic timestamp used for the window check
    pub at: Instant,
    /// Wall-clock timestamp for display
    pub spawned_at: DateTime<Utc>,
}

/// Outcome of a compliance check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compliance {
    pub compliant: bool,
    /// Spread between the earliest and latest spawn of the wave
    pub spread: Duration,
    pub reason: Option<String>,
}

/// Spawn record as shown in status snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnRecordView {
    pub task_id: String,
    pub external_handle: String,
    pub spawned_at: DateTime<Utc>,
    /// Milliseconds after the first spawn of the wave
    pub offset_ms: u64,
}

/// Read-only snapshot of enforcement state for diagnostics and UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnforcementStatus {
    /// 0-based index of the active wave (equals `total_waves` once done)
    pub wave_index: usize,
    pub total_waves: usize,
    /// Every task id of the active wave, resolved or not
    pub current_wave_tasks: Vec<String>,
    pub spawn_records: Vec<SpawnRecordView>,
    pub task_statuses: BTreeMap<String, TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub halted_on: Option<Vec<String>>,
    pub complete: bool,
}

/// Wraps a task graph and enforces wave-by-wave parallel dispatch.
#[derive(Debug)]
pub struct ParallelExecutionEnforcer {
    graph: TaskGraph,
    /// Wave membership, computed once since structure never changes
    waves: Vec<Vec<String>>,
    current: usize,
    spawns: Vec<SpawnRecord>,
    config: EnforcerConfig,
    halted_on: Option<Vec<String>>,
}

impl ParallelExecutionEnforcer {
    /// Wrap a graph. Fails if the graph has dangling references or a cycle.
    pub fn new(graph: TaskGraph, config: EnforcerConfig) -> Result<Self, GraphError> {
        let waves = graph.wave_ids()?;
        info!(
            tasks = graph.len(),
            waves = waves.len(),
            window_ms = config.parallel_window.as_millis() as u64,
            strict = config.strict,
            "parallel enforcement armed"
        );

        Ok(Self {
            graph,
            waves,
            current: 0,
            spawns: Vec::new(),
            config,
            halted_on: None,
        })
    }

    /// Get the underlying graph.
    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    pub fn config(&self) -> &EnforcerConfig {
        &self.config
    }

    /// Get all waves as task ids.
    pub fn waves(&self) -> &[Vec<String>] {
        &self.waves
    }

    pub fn current_wave_index(&self) -> usize {
        self.current
    }

    pub fn total_waves(&self) -> usize {
        self.waves.len()
    }

    /// Check if every wave has been resolved.
    pub fn is_complete(&self) -> bool {
        self.current >= self.waves.len()
    }

    /// Failed task ids that halted the session, if any.
    pub fn halted_on(&self) -> Option<&[String]> {
        self.halted_on.as_deref()
    }

    /// Spawns recorded for the current wave.
    pub fn spawn_records(&self) -> &[SpawnRecord] {
        &self.spawns
    }

    fn current_wave_ids(&self) -> &[String] {
        self.waves.get(self.current).map_or(&[], |w| w.as_slice())
    }

    /// Tasks of the active wave that have not reached a terminal status.
    ///
    /// Only these tasks are eligible for dispatch.
    pub fn get_current_wave(&self) -> Vec<&Task> {
        self.current_wave_ids()
            .iter()
            .filter_map(|id| self.graph.get(id))
            .filter(|t| !t.status.is_terminal())
            .collect()
    }

    /// Check whether `task_id` may be spawned now.
    pub fn validate_spawn(&self, task_id: &str) -> Result<(), EnforcementError> {
        if let Some(failed) = &self.halted_on {
            return Err(EnforcementError::SessionHalted {
                failed: failed.clone(),
            });
        }

        let task = self.graph.get(task_id).ok_or_else(|| GraphError::UnknownTask {
            id: task_id.to_string(),
        })?;

        if !self.current_wave_ids().iter().any(|id| id == task_id) {
            return Err(EnforcementError::OutOfWaveSpawn {
                task: task_id.to_string(),
                wave: self.current,
            });
        }

        if task.status != TaskStatus::Pending || self.spawns.iter().any(|s| s.task_id == task_id) {
            return Err(EnforcementError::DuplicateSpawn {
                task: task_id.to_string(),
                wave: self.current,
            });
        }

        Ok(())
    }

    /// Record a spawn at the current instant.
    ///
    /// Callers are expected to have passed [`Self::validate_spawn`] first.
    pub fn record_spawn(
        &mut self,
        task_id: &str,
        external_handle: &str,
    ) -> Result<(), EnforcementError> {
        self.record_spawn_at(task_id, external_handle, Instant::now())
    }

    /// Record a spawn at an explicit instant.
    pub fn record_spawn_at(
        &mut self,
        task_id: &str,
        external_handle: &str,
        at: Instant,
    ) -> Result<(), EnforcementError> {
        self.graph.mark_spawned(task_id, external_handle)?;
        self.spawns.push(SpawnRecord {
            task_id: task_id.to_string(),
            external_handle: external_handle.to_string(),
            at,
            spawned_at: Utc::now(),
        });
        info!(
            task = task_id,
            handle = external_handle,
            wave = self.current,
            "spawn recorded"
        );
        Ok(())
    }

    /// Check that every spawn of the current wave landed within the window.
    ///
    /// In strict mode a violation is returned as
    /// [`EnforcementError::ParallelWindowViolation`]; otherwise it is reported
    /// through [`Compliance::compliant`].
    pub fn check_parallel_compliance(&self) -> Result<Compliance, EnforcementError> {
        let earliest = self.spawns.iter().map(|s| s.at).min();
        let latest = self.spawns.iter().map(|s| s.at).max();
        let spread = match (earliest, latest) {
            (Some(first), Some(last)) => last.saturating_duration_since(first),
            _ => Duration::ZERO,
        };

        if spread <= self.config.parallel_window {
            debug!(
                wave = self.current,
                spread_ms = spread.as_millis() as u64,
                "wave dispatch compliant"
            );
            return Ok(Compliance {
                compliant: true,
                spread,
                reason: None,
            });
        }

        let violation = EnforcementError::ParallelWindowViolation {
            wave: self.current,
            spread,
            window: self.config.parallel_window,
        };
        warn!(wave = self.current, "{}", violation);

        if self.config.strict {
            return Err(violation);
        }

        Ok(Compliance {
            compliant: false,
            spread,
            reason: Some(violation.to_string()),
        })
    }

    /// Mark a task completed, advancing the wave once it fully resolves.
    ///
    /// Returns the new wave index if the wave advanced.
    pub fn mark_task_completed(&mut self, task_id: &str) -> Result<Option<usize>, EnforcementError> {
        self.graph.mark_completed(task_id)?;
        Ok(self.advance_if_resolved())
    }

    /// Mark a task failed, advancing the wave once it fully resolves.
    pub fn mark_task_failed(&mut self, task_id: &str) -> Result<Option<usize>, EnforcementError> {
        self.graph.mark_failed(task_id)?;
        Ok(self.advance_if_resolved())
    }

    /// Advance to the next wave explicitly.
    ///
    /// Rejected while any task of the current wave is pending or spawned.
    pub fn advance_wave(&mut self) -> Result<usize, EnforcementError> {
        let unresolved: Vec<String> = self
            .get_current_wave()
            .iter()
            .map(|t| t.id.clone())
            .collect();
        if !unresolved.is_empty() {
            return Err(EnforcementError::PrematureWaveAdvance {
                wave: self.current,
                unresolved,
            });
        }

        if !self.is_complete() {
            self.advance();
        }
        Ok(self.current)
    }

    /// Advance past every wave that is already resolved, not just the current one.
    fn advance_if_resolved(&mut self) -> Option<usize> {
        let start = self.current;
        while !self.is_complete() && self.get_current_wave().is_empty() {
            self.advance();
        }
        (self.current != start).then_some(self.current)
    }

    fn advance(&mut self) {
        let failed: Vec<String> = self
            .current_wave_ids()
            .iter()
            .filter(|id| {
                self.graph
                    .get(id)
                    .is_some_and(|t| t.status == TaskStatus::Failed)
            })
            .cloned()
            .collect();

        if !failed.is_empty() && self.config.failure_policy == FailurePolicy::Halt {
            warn!(wave = self.current, failed = ?failed, "wave resolved with failures, halting");
            self.halted_on
                .get_or_insert_with(Vec::new)
                .extend(failed);
        }

        self.current += 1;
        self.spawns.clear();
        info!(
            wave = self.current,
            total = self.waves.len(),
            "advanced to next wave"
        );
    }

    /// Snapshot of the enforcement state.
    pub fn get_enforcement_status(&self) -> EnforcementStatus {
        let first = self.spawns.iter().map(|s| s.at).min();
        let spawn_records = self
            .spawns
            .iter()
            .map(|s| SpawnRecordView {
                task_id: s.task_id.clone(),
                external_handle: s.external_handle.clone(),
                spawned_at: s.spawned_at,
                offset_ms: first
                    .map(|f| s.at.saturating_duration_since(f).as_millis() as u64)
                    .unwrap_or(0),
            })
            .collect();

        EnforcementStatus {
            wave_index: self.current,
            total_waves: self.waves.len(),
            current_wave_tasks: self.current_wave_ids().to_vec(),
            spawn_records,
            task_statuses: self
                .graph
                .tasks()
                .iter()
                .map(|t| (t.id.clone(), t.status))
                .collect(),
            halted_on: self.halted_on.clone(),
            complete: self.is_complete(),
        }
    }
}
