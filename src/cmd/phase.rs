//! Phase map command - `wavefront phases`.

use anyhow::Result;
use wavefront::phase::Phase;
use wavefront::ui::print_phase_map;

pub fn cmd_phases(current: Option<&str>) -> Result<()> {
    let current = current.map(str::parse::<Phase>).transpose()?;

    println!();
    print_phase_map(current);
    println!();
    println!("VALIDATE -> PLAN is bounded by [orchestrator] max_critiques in wavefront.toml.");
    println!();
    Ok(())
}
