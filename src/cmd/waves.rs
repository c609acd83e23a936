//! Wave computation command - `wavefront waves`.

use anyhow::{Context, Result};
use std::path::Path;
use wavefront::dag::{TaskGraph, TaskPlan};
use wavefront::ui::print_wave_plan;

/// Load and parse a task plan file.
pub fn load_plan(path: &Path) -> Result<TaskPlan> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read task plan: {}", path.display()))?;
    let plan = TaskPlan::from_json(&content)?;
    if plan.is_empty() {
        anyhow::bail!("Task plan {} contains no tasks", path.display());
    }
    Ok(plan)
}

pub fn cmd_waves(plan_path: &Path, json: bool) -> Result<()> {
    let plan = load_plan(plan_path)?;
    let graph = TaskGraph::from_plan(&plan)?;
    let waves = graph.wave_ids()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&waves)?);
    } else {
        println!();
        print_wave_plan(&graph, &waves);
        println!();
    }
    Ok(())
}
