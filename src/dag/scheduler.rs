//! Task readiness and status lifecycle.
//!
//! Structure is fixed once the graph is built; only task status changes
//! during execution, and only forward along `Pending -> Spawned -> terminal`.

use crate::dag::builder::TaskGraph;
use crate::dag::state::{Task, TaskStatus};
use crate::errors::GraphError;
use tracing::debug;

impl TaskGraph {
    /// Get pending tasks whose dependencies have all completed.
    ///
    /// Unknown dependency ids count as unsatisfied.
    pub fn get_ready_tasks(&self) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|task| task.status == TaskStatus::Pending)
            .filter(|task| {
                task.dependencies.iter().all(|dep| {
                    self.get(dep)
                        .is_some_and(|d| d.status == TaskStatus::Completed)
                })
            })
            .collect()
    }

    /// Get the status of a task.
    pub fn status(&self, id: &str) -> Result<TaskStatus, GraphError> {
        self.get(id)
            .map(|t| t.status)
            .ok_or_else(|| GraphError::UnknownTask { id: id.to_string() })
    }

    /// Mark a pending task as handed to a worker.
    pub fn mark_spawned(&mut self, id: &str, external_handle: &str) -> Result<(), GraphError> {
        let task = self.transition(id, TaskStatus::Spawned)?;
        task.external_handle = Some(external_handle.to_string());
        Ok(())
    }

    /// Mark a spawned task as completed.
    pub fn mark_completed(&mut self, id: &str) -> Result<(), GraphError> {
        self.transition(id, TaskStatus::Completed).map(|_| ())
    }

    /// Mark a spawned task as failed.
    pub fn mark_failed(&mut self, id: &str) -> Result<(), GraphError> {
        self.transition(id, TaskStatus::Failed).map(|_| ())
    }

    fn transition(&mut self, id: &str, next: TaskStatus) -> Result<&mut Task, GraphError> {
        let index = *self
            .index_map
            .get(id)
            .ok_or_else(|| GraphError::UnknownTask { id: id.to_string() })?;
        let task = &mut self.tasks[index];

        if !task.status.can_become(next) {
            return Err(GraphError::InvalidStatusTransition {
                task: id.to_string(),
                from: task.status,
                to: next,
            });
        }

        debug!(task = id, from = %task.status, to = %next, "task status changed");
        task.status = next;
        Ok(task)
    }

    /// Check if every task reached a terminal status.
    pub fn all_terminal(&self) -> bool {
        self.tasks.iter().all(|t| t.status.is_terminal())
    }

    /// Get the number of tasks with the given status.
    pub fn count_with_status(&self, status: TaskStatus) -> usize {
        self.tasks.iter().filter(|t| t.status == status).count()
    }

    /// Get completion percentage (terminal tasks over all tasks).
    pub fn completion_percentage(&self) -> f64 {
        if self.tasks.is_empty() {
            return 100.0;
        }
        let terminal = self.tasks.iter().filter(|t| t.status.is_terminal()).count();
        (terminal as f64 / self.tasks.len() as f64) * 100.0
    }
}
