//! Task graph construction and wave leveling.
//!
//! Tasks may reference dependencies that are added later. References are
//! resolved, and the graph checked for cycles, when waves are requested.

use crate::dag::state::{Task, TaskPlan};
use crate::errors::GraphError;
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// Index into the task list.
pub type TaskIndex = usize;

/// A directed acyclic graph of tasks.
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    /// Tasks in insertion order
    pub(super) tasks: Vec<Task>,
    /// Map from task id to index
    pub(super) index_map: HashMap<String, TaskIndex>,
}

/// Resolved edges of a validated graph.
struct Edges {
    /// index -> tasks that depend on it
    forward: Vec<Vec<TaskIndex>>,
    /// index -> tasks it depends on
    reverse: Vec<Vec<TaskIndex>>,
}

impl TaskGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from an accepted plan.
    ///
    /// Tasks are inserted in plan order; dangling references and cycles are
    /// reported when waves are computed.
    pub fn from_plan(plan: &TaskPlan) -> Result<Self, GraphError> {
        let mut graph = Self::new();
        for (id, entry) in &plan.tasks {
            let deps: Vec<&str> = entry.depends_on.iter().map(String::as_str).collect();
            graph.add_task(id, &entry.description, &entry.worker_category, &deps)?;
        }
        Ok(graph)
    }

    /// Add a task. Fails only if the id is already present.
    pub fn add_task(
        &mut self,
        id: &str,
        description: &str,
        worker_category: &str,
        dependencies: &[&str],
    ) -> Result<(), GraphError> {
        if self.index_map.contains_key(id) {
            return Err(GraphError::DuplicateTask { id: id.to_string() });
        }

        let deps = dependencies.iter().map(|d| d.to_string()).collect();
        self.index_map.insert(id.to_string(), self.tasks.len());
        self.tasks
            .push(Task::new(id, description, worker_category, deps));
        Ok(())
    }

    /// Get the number of tasks in the graph.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Check if the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Get a task by id.
    pub fn get(&self, id: &str) -> Option<&Task> {
        self.index_map.get(id).and_then(|&i| self.tasks.get(i))
    }

    /// Get all tasks in insertion order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Check that every dependency id refers to a task in this graph.
    pub fn validate_references(&self) -> Result<(), GraphError> {
        self.resolve_edges().map(|_| ())
    }

    fn resolve_edges(&self) -> Result<Edges, GraphError> {
        let mut forward: Vec<Vec<TaskIndex>> = vec![Vec::new(); self.tasks.len()];
        let mut reverse: Vec<Vec<TaskIndex>> = vec![Vec::new(); self.tasks.len()];

        for (to_idx, task) in self.tasks.iter().enumerate() {
            for dep in &task.dependencies {
                let from_idx =
                    *self
                        .index_map
                        .get(dep)
                        .ok_or_else(|| GraphError::UnknownDependency {
                            task: task.id.clone(),
                            dependency: dep.clone(),
                        })?;

                // from_idx must complete before to_idx
                forward[from_idx].push(to_idx);
                reverse[to_idx].push(from_idx);
            }
        }

        Ok(Edges { forward, reverse })
    }

    /// Assign every task a level: 0 without dependencies, otherwise one more
    /// than its deepest dependency.
    ///
    /// Uses Kahn's algorithm; tasks that never reach in-degree zero are part
    /// of a cycle and are reported instead of being dropped.
    pub(super) fn levels(&self) -> Result<Vec<usize>, GraphError> {
        let edges = self.resolve_edges()?;

        let mut in_degree: Vec<usize> = edges.reverse.iter().map(|deps| deps.len()).collect();
        let mut level = vec![0usize; self.tasks.len()];

        let mut queue: VecDeque<TaskIndex> = in_degree
            .iter()
            .enumerate()
            .filter(|&(_, deg)| *deg == 0)
            .map(|(i, _)| i)
            .collect();

        let mut processed = 0;

        while let Some(node) = queue.pop_front() {
            processed += 1;

            for &dependent in &edges.forward[node] {
                level[dependent] = level[dependent].max(level[node] + 1);
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    queue.push_back(dependent);
                }
            }
        }

        if processed != self.tasks.len() {
            let tasks: Vec<String> = in_degree
                .iter()
                .enumerate()
                .filter(|&(_, deg)| *deg > 0)
                .map(|(i, _)| self.tasks[i].id.clone())
                .collect();
            return Err(GraphError::CyclicDependency { tasks });
        }

        Ok(level)
    }

    /// Compute execution waves as task ids.
    ///
    /// Within a wave, tasks keep their insertion order.
    pub fn wave_ids(&self) -> Result<Vec<Vec<String>>, GraphError> {
        let levels = self.levels()?;
        let depth = levels.iter().max().map_or(0, |max| max + 1);

        let mut waves: Vec<Vec<String>> = vec![Vec::new(); depth];
        for (i, &lvl) in levels.iter().enumerate() {
            waves[lvl].push(self.tasks[i].id.clone());
        }

        debug!(tasks = self.tasks.len(), waves = waves.len(), "computed task waves");
        Ok(waves)
    }

    /// Compute the ordered list of waves: groups of tasks with no dependency
    /// relation among themselves.
    pub fn get_independent_groups(&self) -> Result<Vec<Vec<&Task>>, GraphError> {
        let waves = self.wave_ids()?;
        Ok(waves
            .iter()
            .map(|wave| wave.iter().filter_map(|id| self.get(id)).collect())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn ids(wave: &[&Task]) -> HashSet<String> {
        wave.iter().map(|t| t.id.clone()).collect()
    }

    fn set(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_from_plan() {
        let plan = TaskPlan::default()
            .with_task("research", "Research codebase", "explore", &[])
            .with_task("docs", "Research docs", "dewey", &[])
            .with_task("implement", "Implement feature", "frontend", &["research", "docs"]);

        let graph = TaskGraph::from_plan(&plan).unwrap();

        assert_eq!(graph.len(), 3);
        assert!(graph.get("research").unwrap().dependencies.is_empty());
        assert_eq!(
            graph.get("implement").unwrap().dependencies,
            vec!["research", "docs"]
        );
        assert_eq!(graph.get("docs").unwrap().worker_category, "dewey");
    }

    #[test]
    fn test_independent_groups() {
        let mut graph = TaskGraph::new();
        graph.add_task("a", "Task A", "explore", &[]).unwrap();
        graph.add_task("b", "Task B", "dewey", &[]).unwrap();
        graph.add_task("c", "Task C", "frontend", &["a"]).unwrap();
        graph.add_task("d", "Task D", "delphi", &["b"]).unwrap();
        graph.add_task("e", "Task E", "code-reviewer", &["c", "d"]).unwrap();

        let waves = graph.get_independent_groups().unwrap();

        assert_eq!(waves.len(), 3);
        assert_eq!(ids(&waves[0]), set(&["a", "b"]));
        assert_eq!(ids(&waves[1]), set(&["c", "d"]));
        assert_eq!(ids(&waves[2]), set(&["e"]));
    }

    #[test]
    fn test_level_uses_deepest_dependency() {
        // a -> b -> c, and d depends on a and c: d must land after c
        let mut graph = TaskGraph::new();
        graph.add_task("a", "A", "w", &[]).unwrap();
        graph.add_task("b", "B", "w", &["a"]).unwrap();
        graph.add_task("c", "C", "w", &["b"]).unwrap();
        graph.add_task("d", "D", "w", &["a", "c"]).unwrap();

        let waves = graph.wave_ids().unwrap();
        assert_eq!(waves, vec![vec!["a"], vec!["b"], vec!["c"], vec!["d"]]);
    }

    #[test]
    fn test_forward_references_allowed() {
        let mut graph = TaskGraph::new();
        graph.add_task("late", "Late", "w", &["early"]).unwrap();
        graph.add_task("early", "Early", "w", &[]).unwrap();

        let waves = graph.wave_ids().unwrap();
        assert_eq!(waves, vec![vec!["early"], vec!["late"]]);
    }

    #[test]
    fn test_dangling_reference_rejected_at_leveling() {
        let mut graph = TaskGraph::new();
        graph.add_task("a", "A", "w", &["nonexistent"]).unwrap();

        let err = graph.get_independent_groups().unwrap_err();
        match err {
            GraphError::UnknownDependency { task, dependency } => {
                assert_eq!(task, "a");
                assert_eq!(dependency, "nonexistent");
            }
            other => panic!("Expected UnknownDependency, got {other:?}"),
        }
    }

    #[test]
    fn test_cycle_detection() {
        let mut graph = TaskGraph::new();
        graph.add_task("a", "A", "w", &["c"]).unwrap();
        graph.add_task("b", "B", "w", &["a"]).unwrap();
        graph.add_task("c", "C", "w", &["b"]).unwrap();
        graph.add_task("free", "Free", "w", &[]).unwrap();

        let err = graph.get_independent_groups().unwrap_err();
        match err {
            GraphError::CyclicDependency { tasks } => {
                assert_eq!(tasks.len(), 3);
                assert!(!tasks.contains(&"free".to_string()));
            }
            other => panic!("Expected CyclicDependency, got {other:?}"),
        }
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let mut graph = TaskGraph::new();
        graph.add_task("a", "A", "w", &["a"]).unwrap();
        assert!(matches!(
            graph.wave_ids(),
            Err(GraphError::CyclicDependency { .. })
        ));
    }

    #[test]
    fn test_duplicate_task_id() {
        let mut graph = TaskGraph::new();
        graph.add_task("a", "A", "w", &[]).unwrap();
        let err = graph.add_task("a", "Again", "w", &[]).unwrap_err();
        assert!(matches!(err, GraphError::DuplicateTask { .. }));
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.get("a").unwrap().description, "A");
    }

    #[test]
    fn test_empty_graph() {
        let graph = TaskGraph::new();
        assert!(graph.is_empty());
        assert!(graph.get_independent_groups().unwrap().is_empty());
    }

    #[test]
    fn test_waves_partition_and_respect_dependencies() {
        // Layered graph with fan-in and fan-out at several depths
        let mut graph = TaskGraph::new();
        for i in 0..30 {
            let id = format!("t{i}");
            let deps: Vec<String> = (0..i)
                .filter(|j| (i * 7 + j * 3) % 5 == 0 && i - j <= 6)
                .map(|j| format!("t{j}"))
                .collect();
            let dep_refs: Vec<&str> = deps.iter().map(String::as_str).collect();
            graph.add_task(&id, "work", "w", &dep_refs).unwrap();
        }

        let waves = graph.wave_ids().unwrap();

        let mut wave_of = std::collections::HashMap::new();
        for (w, wave) in waves.iter().enumerate() {
            for id in wave {
                assert!(wave_of.insert(id.clone(), w).is_none(), "{id} in two waves");
            }
        }
        assert_eq!(wave_of.len(), graph.len());

        for task in graph.tasks() {
            let own = wave_of[&task.id];
            if task.dependencies.is_empty() {
                assert_eq!(own, 0, "{} has no deps but is not in wave 0", task.id);
            }
            for dep in &task.dependencies {
                assert!(wave_of[dep] < own, "{} not after {}", task.id, dep);
            }
        }
        for id in &waves[0] {
            assert!(graph.get(id).unwrap().dependencies.is_empty());
        }
    }
}
