//! Task lifecycle and dispatch result types.
//!
//! This module provides the per-task status lifecycle, the task record held
//! by the graph, the plan input shape, and the summary produced after a
//! wave-by-wave dispatch.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Status of a task in the graph.
///
/// Transitions are one-directional: `Pending -> Spawned -> {Completed | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task is waiting to be dispatched
    #[default]
    Pending,
    /// Task has been handed to a worker
    Spawned,
    /// Worker reported success
    Completed,
    /// Worker reported failure
    Failed,
}

impl TaskStatus {
    /// Check if the task is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Check whether moving to `next` respects the lifecycle.
    pub fn can_become(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Spawned)
                | (Self::Spawned, Self::Completed)
                | (Self::Spawned, Self::Failed)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Spawned => "spawned",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A unit of work in the task graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique id within the graph
    pub id: String,
    /// What the worker should do
    pub description: String,
    /// Worker category the task is assigned to
    pub worker_category: String,
    /// Ids of tasks that must complete first, in declaration order
    pub dependencies: Vec<String>,
    /// Current lifecycle status
    pub status: TaskStatus,
    /// Handle returned by the spawn collaborator, set once spawned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_handle: Option<String>,
}

impl Task {
    /// Create a new pending task.
    pub fn new(id: &str, description: &str, worker_category: &str, dependencies: Vec<String>) -> Self {
        Self {
            id: id.to_string(),
            description: description.to_string(),
            worker_category: worker_category.to_string(),
            dependencies,
            status: TaskStatus::Pending,
            external_handle: None,
        }
    }
}

/// One entry of an accepted plan, as produced by the planning step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanTask {
    pub description: String,
    #[serde(alias = "agent_type")]
    pub worker_category: String,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

/// The plan-to-graph input: task id to task definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskPlan {
    pub tasks: BTreeMap<String, PlanTask>,
}

impl TaskPlan {
    /// Parse a plan from its JSON mapping form.
    pub fn from_json(content: &str) -> anyhow::Result<Self> {
        use anyhow::Context;
        serde_json::from_str(content).context("Failed to parse task plan")
    }

    /// Add a task definition, builder style.
    pub fn with_task(
        mut self,
        id: &str,
        description: &str,
        worker_category: &str,
        depends_on: &[&str],
    ) -> Self {
        self.tasks.insert(
            id.to_string(),
            PlanTask {
                description: description.to_string(),
                worker_category: worker_category.to_string(),
                depends_on: depends_on.iter().map(|d| d.to_string()).collect(),
            },
        );
        self
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Summary of a wave-by-wave dispatch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchSummary {
    /// Total tasks in the graph
    pub total_tasks: usize,
    /// Waves fully dispatched and resolved
    pub waves_run: usize,
    /// Ids of tasks that completed
    pub completed: Vec<String>,
    /// Ids of tasks that failed
    pub failed: Vec<String>,
    /// Waves whose spawns fell outside the parallel window (advisory mode)
    pub non_compliant_waves: Vec<usize>,
    /// Whether dispatch stopped early because of the failure policy
    pub halted: bool,
    /// Total dispatch time in milliseconds
    #[serde(with = "duration_serde")]
    pub duration: Duration,
}

impl DispatchSummary {
    /// Create a new empty summary.
    pub fn new(total_tasks: usize) -> Self {
        Self {
            total_tasks,
            ..Default::default()
        }
    }

    /// Check if every task completed successfully.
    pub fn all_success(&self) -> bool {
        self.failed.is_empty() && self.completed.len() == self.total_tasks
    }

    /// Get completion percentage.
    pub fn completion_percentage(&self) -> f64 {
        if self.total_tasks == 0 {
            return 100.0;
        }
        (self.completed.len() as f64 / self.total_tasks as f64) * 100.0
    }
}

/// Serde helpers for Duration serialization.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_status_terminal() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Spawned.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
    }

    #[test]
    fn test_task_status_lifecycle_is_one_directional() {
        assert!(TaskStatus::Pending.can_become(TaskStatus::Spawned));
        assert!(TaskStatus::Spawned.can_become(TaskStatus::Completed));
        assert!(TaskStatus::Spawned.can_become(TaskStatus::Failed));

        assert!(!TaskStatus::Pending.can_become(TaskStatus::Completed));
        assert!(!TaskStatus::Pending.can_become(TaskStatus::Failed));
        assert!(!TaskStatus::Spawned.can_become(TaskStatus::Pending));
        assert!(!TaskStatus::Completed.can_become(TaskStatus::Spawned));
        assert!(!TaskStatus::Failed.can_become(TaskStatus::Completed));
        assert!(!TaskStatus::Spawned.can_become(TaskStatus::Spawned));
    }

    #[test]
    fn test_plan_parses_agent_type_alias() {
        let json = r#"{
            "research": {"description": "Research codebase", "agent_type": "explore", "depends_on": []},
            "implement": {"description": "Implement feature", "worker_category": "frontend", "depends_on": ["research"]}
        }"#;
        let plan = TaskPlan::from_json(json).unwrap();

        assert_eq!(plan.len(), 2);
        assert_eq!(plan.tasks["research"].worker_category, "explore");
        assert_eq!(plan.tasks["implement"].depends_on, vec!["research"]);
    }

    #[test]
    fn test_plan_depends_on_defaults_to_empty() {
        let json = r#"{"a": {"description": "A", "agent_type": "explore"}}"#;
        let plan = TaskPlan::from_json(json).unwrap();
        assert!(plan.tasks["a"].depends_on.is_empty());
    }

    #[test]
    fn test_dispatch_summary() {
        let mut summary = DispatchSummary::new(4);
        summary.completed = vec!["a".into(), "b".into()];
        summary.failed = vec!["c".into()];

        assert!(!summary.all_success());
        assert_eq!(summary.completion_percentage(), 50.0);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["duration"], 0);
    }
}
