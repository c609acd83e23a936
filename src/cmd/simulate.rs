//! End-to-end session simulation - `wavefront simulate`.
//!
//! Walks a task plan through every phase, then dispatches its waves against
//! an in-process worker pool under the parallel-execution enforcer.

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use console::style;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;
use wavefront::config::WavefrontConfig;
use wavefront::dag::{TaskGraph, TaskPlan, WaveDispatcher, WorkerOutcome, WorkerPool};
use wavefront::orchestrator::{
    Artifact, CritiqueGenerator, InteractiveGate, ModelRouter, OrchestratorState,
    TransitionOutcome, ValidationOutcome, WisdomLoader,
};
use wavefront::phase::Phase;
use wavefront::ui::icons::{BLOCKER, PHASE, SPARKLE};
use wavefront::ui::{DispatchUI, UiMode, print_enforcement_status, print_wave_plan};

use super::super::Cli;
use super::waves::load_plan;

pub struct SimulateOptions {
    pub plan: PathBuf,
    pub window_ms: Option<u64>,
    /// Task ids whose workers report failure
    pub fail: Vec<String>,
    pub work_ms: u64,
    pub gates: bool,
    pub ui: String,
}

/// Split a comma-separated list of task ids.
pub fn parse_task_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    })
    .unwrap_or_default()
}

/// Worker pool that finishes every task after a fixed delay.
pub struct SimulatedPool {
    work: Duration,
    /// Task description -> task id
    tasks: HashMap<String, String>,
    /// Ids of tasks whose workers report failure
    failing: HashSet<String>,
    /// Handle -> task id
    handles: Mutex<HashMap<String, String>>,
}

impl SimulatedPool {
    /// Build a pool for `plan`, failing the workers of the `fail` task ids.
    ///
    /// Workers only see a task's description, so descriptions must be unique
    /// within the plan.
    pub fn for_plan(plan: &TaskPlan, work: Duration, fail: &[String]) -> Result<Self> {
        let mut tasks = HashMap::with_capacity(plan.len());
        for (id, task) in &plan.tasks {
            if let Some(other) = tasks.insert(task.description.clone(), id.clone()) {
                bail!(
                    "Tasks '{}' and '{}' share the description '{}'; simulated workers need unique descriptions",
                    other,
                    id,
                    task.description
                );
            }
        }

        let failing = fail
            .iter()
            .map(|id| {
                if plan.tasks.contains_key(id) {
                    Ok(id.clone())
                } else {
                    Err(anyhow!("--fail names unknown task '{}'", id))
                }
            })
            .collect::<Result<HashSet<_>>>()?;

        Ok(Self {
            work,
            tasks,
            failing,
            handles: Mutex::new(HashMap::new()),
        })
    }
}

#[async_trait]
impl WorkerPool for SimulatedPool {
    async fn spawn(&self, worker_category: &str, description: &str) -> Result<String> {
        let task_id = self
            .tasks
            .get(description)
            .cloned()
            .with_context(|| format!("No task in the plan is described as '{}'", description))?;
        let handle = format!("{}-{}", worker_category, Uuid::new_v4().simple());
        self.handles
            .lock()
            .map_err(|_| anyhow!("Worker registry lock poisoned"))?
            .insert(handle.clone(), task_id);
        Ok(handle)
    }

    async fn await_result(&self, handle: &str) -> Result<WorkerOutcome> {
        let task_id = self
            .handles
            .lock()
            .map_err(|_| anyhow!("Worker registry lock poisoned"))?
            .get(handle)
            .cloned()
            .with_context(|| format!("Unknown worker handle '{}'", handle))?;

        tokio::time::sleep(self.work).await;

        if self.failing.contains(&task_id) {
            Ok(WorkerOutcome::Failure {
                error: format!("simulated failure: {}", task_id),
            })
        } else {
            Ok(WorkerOutcome::Success {
                payload: format!("done: {}", task_id),
            })
        }
    }
}

struct Session {
    state: OrchestratorState,
    router: ModelRouter,
    quiet: bool,
}

impl Session {
    /// Transition to `target`. Returns false when the gate declined.
    fn advance(&mut self, target: Phase) -> Result<bool> {
        match self.state.transition_to(target)? {
            TransitionOutcome::Advanced { .. } => {
                if !self.quiet {
                    println!(
                        "{}{} {}",
                        PHASE,
                        style(self.state.get_phase_display()).bold(),
                        style(format!("model: {}", self.router.select_model(target))).dim()
                    );
                }
                Ok(true)
            }
            TransitionOutcome::Declined { from, to } => {
                if !self.quiet {
                    println!(
                        "{}Session stopped in {}: entering {} was declined",
                        BLOCKER, from, to
                    );
                }
                Ok(false)
            }
        }
    }
}

pub async fn cmd_simulate(project_dir: &Path, cli: &Cli, options: SimulateOptions) -> Result<()> {
    let plan = load_plan(&options.plan)?;
    let pool =
        SimulatedPool::for_plan(&plan, Duration::from_millis(options.work_ms), &options.fail)?;

    let config =
        WavefrontConfig::new(project_dir.to_path_buf())?.with_parallel_window_ms(options.window_ms);
    for warning in config.validate() {
        warn!("{}", warning);
    }

    let mode = UiMode::parse(&options.ui);
    let mut state_config = config.state_config();
    if options.gates {
        state_config.enable_phase_gates = true;
    }

    let mut session = Session {
        state: OrchestratorState::new(state_config).with_gate(InteractiveGate::new(cli.yes)),
        router: config.router(),
        quiet: mode == UiMode::Json,
    };

    if !session.quiet {
        println!();
        println!("{}", session.state.get_phase_display());
    }

    session
        .state
        .register_artifact(Artifact::QueryClassification(format!(
            "{}: {} task(s)",
            if plan.len() > 1 { "complex" } else { "simple" },
            plan.len()
        )));
    if !session.advance(Phase::Context)? {
        return Ok(());
    }

    let categories: BTreeSet<&str> = plan
        .tasks
        .values()
        .map(|t| t.worker_category.as_str())
        .collect();
    session
        .state
        .register_artifact(Artifact::ContextSummary(format!(
            "Plan {} with {} task(s) across worker categories: {}",
            options.plan.display(),
            plan.len(),
            categories.into_iter().collect::<Vec<_>>().join(", ")
        )));

    let wisdom = WisdomLoader::new(config.wisdom_file()).load_wisdom()?;
    if !wisdom.trim().is_empty() {
        if !session.advance(Phase::Wisdom)? {
            return Ok(());
        }
        session.state.register_artifact(Artifact::Wisdom(wisdom));
    }

    if !session.advance(Phase::Plan)? {
        return Ok(());
    }
    session.state.register_artifact(Artifact::Plan(plan.clone()));

    if !session.advance(Phase::Validate)? {
        return Ok(());
    }
    let prompt = CritiqueGenerator.critique_prompt(&serde_json::to_string_pretty(&plan)?);
    debug!(
        model = session.router.select_model(Phase::Validate),
        prompt_len = prompt.len(),
        "critique prompt prepared"
    );

    // A plan that cannot be leveled into waves is rejected here
    if let Err(e) = TaskGraph::from_plan(&plan).and_then(|g| g.wave_ids()) {
        session
            .state
            .register_artifact(Artifact::ValidationResult(ValidationOutcome {
                approved: false,
                critique: Some(e.to_string()),
            }));
        return Err(anyhow!(e).context("Plan rejected during VALIDATE"));
    }
    session
        .state
        .register_artifact(Artifact::ValidationResult(ValidationOutcome {
            approved: true,
            critique: None,
        }));

    if !session.advance(Phase::Delegate)? {
        return Ok(());
    }
    let mut enforcer = session.state.begin_delegation(config.enforcer_config())?;
    if !session.quiet {
        print_wave_plan(enforcer.graph(), enforcer.waves());
    }

    if !session.advance(Phase::Execute)? {
        return Ok(());
    }

    let (tx, mut rx) = mpsc::channel(64);
    let mut ui = DispatchUI::new(enforcer.graph().len(), mode, cli.verbose);
    let ui_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            ui.handle_event(&event);
        }
    });

    let dispatcher = WaveDispatcher::new(pool).with_event_channel(tx);
    let result = dispatcher.run(&mut enforcer).await;
    drop(dispatcher);
    let _ = ui_task.await;

    if !session.quiet {
        println!();
        print_enforcement_status(&enforcer.get_enforcement_status());
    }

    let summary = result?;
    if !summary.all_success() {
        anyhow::bail!(
            "{} task(s) failed{}",
            summary.failed.len(),
            if summary.halted {
                "; dispatch halted"
            } else {
                ""
            }
        );
    }

    session
        .state
        .register_artifact(Artifact::ExecutionResult(serde_json::to_string(&summary)?));
    if !session.advance(Phase::Verify)? {
        return Ok(());
    }

    if session.quiet {
        println!("{}", serde_json::to_string(&session.state.snapshot())?);
    } else {
        println!();
        println!(
            "{}Session reached {} with {}/{} tasks completed",
            SPARKLE,
            session.state.get_phase_display(),
            summary.completed.len(),
            summary.total_tasks
        );
        println!();
    }

    Ok(())
}
