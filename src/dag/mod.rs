//! Task graph, wave computation and parallel-dispatch enforcement.
//!
//! ## Architecture
//!
//! 1. **Builder** - Constructs a task graph and levels it into waves
//! 2. **Scheduler** - Task readiness and the one-way status lifecycle
//! 3. **Enforcer** - Only lets the active wave dispatch, and proves it
//!    dispatched within the parallel window
//! 4. **Executor** - Caller-side async loop driving an enforcer against a
//!    worker pool
//!
//! ## Example
//!
//! ```
//! use wavefront::dag::{EnforcerConfig, ParallelExecutionEnforcer, TaskGraph};
//!
//! # fn example() -> anyhow::Result<()> {
//! let mut graph = TaskGraph::new();
//! graph.add_task("research", "Research codebase", "explore", &[])?;
//! graph.add_task("docs", "Research docs", "dewey", &[])?;
//! graph.add_task("implement", "Implement feature", "frontend", &["research", "docs"])?;
//!
//! let mut enforcer = ParallelExecutionEnforcer::new(graph, EnforcerConfig::default())?;
//!
//! // Wave 0: research, docs - dispatched together
//! for id in ["research", "docs"] {
//!     enforcer.validate_spawn(id)?;
//!     enforcer.record_spawn(id, &format!("worker-{id}"))?;
//! }
//! assert!(enforcer.check_parallel_compliance()?.compliant);
//!
//! enforcer.mark_task_completed("research")?;
//! enforcer.mark_task_completed("docs")?;
//!
//! // Wave 1: implement
//! assert_eq!(enforcer.current_wave_index(), 1);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

mod builder;
mod enforcer;
mod executor;
mod scheduler;
mod state;

pub use builder::{TaskGraph, TaskIndex};
pub use enforcer::{
    Compliance, EnforcementStatus, EnforcerConfig, FailurePolicy, ParallelExecutionEnforcer,
    SpawnRecord, SpawnRecordView,
};
pub use executor::{DispatchEvent, WaveDispatcher, WorkerOutcome, WorkerPool};
pub use state::{DispatchSummary, PlanTask, Task, TaskPlan, TaskStatus};

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn plan() -> TaskPlan {
        TaskPlan::default()
            .with_task("a", "Task A", "explore", &[])
            .with_task("b", "Task B", "dewey", &[])
            .with_task("c", "Task C", "frontend", &["a"])
            .with_task("d", "Task D", "delphi", &["b"])
            .with_task("e", "Task E", "code-reviewer", &["c", "d"])
    }

    #[test]
    fn test_plan_to_enforced_dispatch() {
        let graph = TaskGraph::from_plan(&plan()).unwrap();
        let config = EnforcerConfig::default().with_parallel_window(Duration::from_millis(500));
        let mut enforcer = ParallelExecutionEnforcer::new(graph, config).unwrap();
        assert_eq!(enforcer.total_waves(), 3);

        let expected = [vec!["a", "b"], vec!["c", "d"], vec!["e"]];
        for (index, wave) in expected.iter().enumerate() {
            assert_eq!(enforcer.current_wave_index(), index);
            let t0 = Instant::now();
            for (offset, id) in wave.iter().enumerate() {
                enforcer.validate_spawn(id).unwrap();
                enforcer
                    .record_spawn_at(id, &format!("h-{id}"), t0 + Duration::from_millis(offset as u64 * 100))
                    .unwrap();
            }
            assert!(enforcer.check_parallel_compliance().unwrap().compliant);
            for id in wave {
                enforcer.mark_task_completed(id).unwrap();
            }
        }

        assert!(enforcer.is_complete());
        assert!(enforcer.graph().all_terminal());
    }

    #[test]
    fn test_ready_tasks_match_first_wave_initially() {
        let graph = TaskGraph::from_plan(&plan()).unwrap();
        let ready: Vec<&str> = graph.get_ready_tasks().iter().map(|t| t.id.as_str()).collect();
        let waves = graph.wave_ids().unwrap();
        assert_eq!(ready, waves[0]);
    }
}
