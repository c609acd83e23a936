//! Wave dispatcher: drives an enforcer against an external worker pool.
//!
//! The enforcer itself never spawns anything. This driver is the caller-side
//! loop that asks the enforcer what may run, spawns every task of the wave
//! concurrently, records the spawns, checks compliance, and feeds worker
//! outcomes back until the graph is resolved or the session halts.

use crate::dag::enforcer::ParallelExecutionEnforcer;
use crate::dag::state::{DispatchSummary, Task};
use crate::errors::EnforcementError;
use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Outcome reported by a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WorkerOutcome {
    Success { payload: String },
    Failure { error: String },
}

impl WorkerOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// The spawn and result-collection collaborators.
#[async_trait]
pub trait WorkerPool: Send + Sync {
    /// Start a worker for the task and return its handle.
    async fn spawn(&self, worker_category: &str, description: &str) -> Result<String>;

    /// Wait for the worker behind `handle` to finish.
    async fn await_result(&self, handle: &str) -> Result<WorkerOutcome>;
}

/// Events emitted during dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DispatchEvent {
    /// A wave is about to be dispatched.
    WaveStarted { wave: usize, tasks: Vec<String> },
    /// A task was handed to a worker.
    Spawned {
        task: String,
        handle: String,
        wave: usize,
    },
    /// The wave's spawns were checked against the parallel window.
    ComplianceChecked {
        wave: usize,
        compliant: bool,
        spread_ms: u64,
    },
    /// A task reached a terminal status.
    TaskFinished { task: String, success: bool },
    /// Every task of a wave is terminal.
    WaveCompleted {
        wave: usize,
        success_count: usize,
        failed_count: usize,
    },
    /// Dispatch stopped.
    Finished { summary: DispatchSummary },
}

/// Drives wave-by-wave parallel dispatch.
pub struct WaveDispatcher<P: WorkerPool> {
    pool: P,
    event_tx: Option<mpsc::Sender<DispatchEvent>>,
}

impl<P: WorkerPool> WaveDispatcher<P> {
    pub fn new(pool: P) -> Self {
        Self {
            pool,
            event_tx: None,
        }
    }

    /// Set the event channel for progress updates.
    pub fn with_event_channel(mut self, tx: mpsc::Sender<DispatchEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Dispatch every wave of the enforcer's graph.
    ///
    /// Returns an error when the pool fails to spawn, or when strict
    /// enforcement rejects the dispatch. Worker failures are not errors;
    /// they are reported in the summary.
    pub async fn run(&self, enforcer: &mut ParallelExecutionEnforcer) -> Result<DispatchSummary> {
        let started = Instant::now();
        let mut summary = DispatchSummary::new(enforcer.graph().len());

        while !enforcer.is_complete() {
            if enforcer.halted_on().is_some() {
                summary.halted = true;
                break;
            }

            let wave = enforcer.current_wave_index();
            let batch: Vec<Task> = enforcer
                .get_current_wave()
                .into_iter()
                .filter(|t| enforcer.validate_spawn(&t.id).is_ok())
                .cloned()
                .collect();

            if batch.is_empty() {
                // Tasks of this wave were spawned outside the dispatcher.
                anyhow::bail!("Wave {} has no dispatchable tasks", wave);
            }

            self.emit(DispatchEvent::WaveStarted {
                wave,
                tasks: batch.iter().map(|t| t.id.clone()).collect(),
            })
            .await;

            // Each spawn is timestamped as it resolves, not after the batch joins.
            let spawns = join_all(batch.iter().map(|t| async move {
                let handle = self.pool.spawn(&t.worker_category, &t.description).await;
                (handle, Instant::now())
            }))
            .await;

            let mut spawned: Vec<(String, String)> = Vec::with_capacity(batch.len());
            let mut abort: Option<anyhow::Error> = None;
            for (task, (handle, at)) in batch.iter().zip(spawns) {
                match handle {
                    Ok(handle) => {
                        enforcer.record_spawn_at(&task.id, &handle, at)?;
                        spawned.push((task.id.clone(), handle));
                    }
                    Err(e) => {
                        warn!(task = %task.id, error = %e, "spawn failed");
                        if abort.is_none() {
                            abort = Some(
                                e.context(format!("Failed to spawn worker for task '{}'", task.id)),
                            );
                        }
                    }
                }
            }

            for (task, handle) in &spawned {
                self.emit(DispatchEvent::Spawned {
                    task: task.clone(),
                    handle: handle.clone(),
                    wave,
                })
                .await;
            }

            if abort.is_none() {
                let (compliant, spread) = match enforcer.check_parallel_compliance() {
                    Ok(compliance) => (compliance.compliant, compliance.spread),
                    Err(e) => {
                        let spread = match &e {
                            EnforcementError::ParallelWindowViolation { spread, .. } => *spread,
                            _ => Default::default(),
                        };
                        abort = Some(e.into());
                        (false, spread)
                    }
                };
                if !compliant {
                    summary.non_compliant_waves.push(wave);
                }
                self.emit(DispatchEvent::ComplianceChecked {
                    wave,
                    compliant,
                    spread_ms: spread.as_millis() as u64,
                })
                .await;
            }

            // Workers that did start are always awaited, even when the wave aborts.
            let outcomes = join_all(
                spawned
                    .iter()
                    .map(|(_, handle)| self.pool.await_result(handle)),
            )
            .await;

            let (mut ok, mut failed) = (0, 0);
            for ((task, _), outcome) in spawned.iter().zip(outcomes) {
                let success = match outcome {
                    Ok(outcome) => outcome.is_success(),
                    Err(e) => {
                        warn!(task = %task, error = %e, "result collection failed");
                        false
                    }
                };

                if success {
                    enforcer.mark_task_completed(task)?;
                    summary.completed.push(task.clone());
                    ok += 1;
                } else {
                    enforcer.mark_task_failed(task)?;
                    summary.failed.push(task.clone());
                    failed += 1;
                }

                self.emit(DispatchEvent::TaskFinished {
                    task: task.clone(),
                    success,
                })
                .await;
            }

            if let Some(e) = abort {
                return Err(e);
            }

            if enforcer.current_wave_index() == wave {
                return Err(EnforcementError::PrematureWaveAdvance {
                    wave,
                    unresolved: enforcer
                        .get_current_wave()
                        .iter()
                        .map(|t| t.id.clone())
                        .collect(),
                }
                .into());
            }

            summary.waves_run += 1;
            self.emit(DispatchEvent::WaveCompleted {
                wave,
                success_count: ok,
                failed_count: failed,
            })
            .await;
        }

        if enforcer.halted_on().is_some() && !enforcer.is_complete() {
            summary.halted = true;
        }
        summary.duration = started.elapsed();
        info!(
            completed = summary.completed.len(),
            failed = summary.failed.len(),
            waves = summary.waves_run,
            halted = summary.halted,
            "dispatch finished"
        );

        self.emit(DispatchEvent::Finished {
            summary: summary.clone(),
        })
        .await;

        Ok(summary)
    }

    /// Emit an event to the event channel if configured.
    async fn emit(&self, event: DispatchEvent) {
        if let Some(ref tx) = self.event_tx {
            tx.send(event).await.ok();
        }
    }
}
