//! Static status views: the phase map, a wave plan and enforcement snapshots.

use crate::dag::{EnforcementStatus, TaskGraph, TaskStatus};
use crate::phase::Phase;
use crate::ui::icons::{BLOCKER, CHECK, CROSS, PHASE, RUNNING, WAVE};
use console::style;
use std::fmt::Write;

/// The eight phases with their successors and required artifacts.
pub fn render_phase_map(current: Option<Phase>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}{}", PHASE, style("Orchestration phases").bold());
    for phase in Phase::ALL {
        let marker = if Some(phase) == current {
            style("→").green().bold().to_string()
        } else {
            " ".to_string()
        };
        let next: Vec<&str> = phase.successors().iter().map(|p| p.name()).collect();
        let needs: Vec<&str> = phase
            .required_artifacts()
            .iter()
            .map(|k| k.as_str())
            .collect();
        let _ = writeln!(
            out,
            " {} {:<22} next: {:<20} needs: {}",
            marker,
            phase.progress_label(),
            if next.is_empty() {
                "(terminal)".to_string()
            } else {
                next.join(", ")
            },
            if needs.is_empty() {
                "-".to_string()
            } else {
                needs.join(", ")
            }
        );
    }
    out
}

pub fn print_phase_map(current: Option<Phase>) {
    print!("{}", render_phase_map(current));
}

/// Waves of a graph, one line per wave.
pub fn render_wave_plan(graph: &TaskGraph, waves: &[Vec<String>]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}{} tasks in {} waves",
        WAVE,
        style(graph.len()).yellow().bold(),
        style(waves.len()).yellow().bold()
    );
    for (i, wave) in waves.iter().enumerate() {
        let entries: Vec<String> = wave
            .iter()
            .map(|id| match graph.get(id) {
                Some(task) => format!("{} ({})", id, task.worker_category),
                None => id.clone(),
            })
            .collect();
        let parallel = if wave.len() > 1 {
            format!(" {}", style("(parallel)").dim())
        } else {
            String::new()
        };
        let _ = writeln!(
            out,
            "  Wave {}: [{}]{}",
            style(i).cyan(),
            entries.join(", "),
            parallel
        );
    }
    out
}

pub fn print_wave_plan(graph: &TaskGraph, waves: &[Vec<String>]) {
    print!("{}", render_wave_plan(graph, waves));
}

fn status_icon(status: TaskStatus) -> String {
    match status {
        TaskStatus::Pending => style("·").dim().to_string(),
        TaskStatus::Spawned => RUNNING.to_string(),
        TaskStatus::Completed => CHECK.to_string(),
        TaskStatus::Failed => CROSS.to_string(),
    }
}

/// A human-readable enforcement snapshot.
pub fn render_enforcement_status(status: &EnforcementStatus) -> String {
    let mut out = String::new();
    if status.complete {
        let _ = writeln!(
            out,
            "{}All {} waves resolved",
            CHECK, status.total_waves
        );
    } else {
        let _ = writeln!(
            out,
            "{}Wave {}/{}: {}",
            WAVE,
            status.wave_index + 1,
            status.total_waves,
            status.current_wave_tasks.join(", ")
        );
    }

    for record in &status.spawn_records {
        let _ = writeln!(
            out,
            "  spawned {} as {} at {} (+{}ms)",
            record.task_id,
            record.external_handle,
            record.spawned_at.format("%H:%M:%S%.3f"),
            record.offset_ms
        );
    }

    for (id, task_status) in &status.task_statuses {
        let _ = writeln!(out, "  {} {:<20} {}", status_icon(*task_status), id, task_status);
    }

    if let Some(failed) = &status.halted_on {
        let _ = writeln!(
            out,
            "{}Halted after failed task(s): {}",
            BLOCKER,
            failed.join(", ")
        );
    }
    out
}

pub fn print_enforcement_status(status: &EnforcementStatus) {
    print!("{}", render_enforcement_status(status));
}
