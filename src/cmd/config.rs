//! Configuration view and validation commands - `wavefront config`.

use anyhow::Result;
use std::path::Path;
use wavefront::config::{CONFIG_FILE, WAVEFRONT_DIR, WavefrontConfig, WavefrontToml};

use super::super::ConfigCommands;

fn print_toml(toml: &WavefrontToml) {
    println!("[orchestrator]");
    println!("  max_critiques = {}", toml.orchestrator.max_critiques);
    println!("  strict_mode = {}", toml.orchestrator.strict_mode);
    println!(
        "  enable_phase_gates = {}",
        toml.orchestrator.enable_phase_gates
    );
    println!();
    println!("[enforcement]");
    println!("  parallel_window_ms = {}", toml.enforcement.parallel_window_ms);
    println!("  strict = {}", toml.enforcement.strict);
    println!("  failure_policy = \"{}\"", toml.enforcement.failure_policy);
    println!();
    println!("[routing]");
    println!("  planning_model = \"{}\"", toml.routing.planning_model);
    println!("  execution_model = \"{}\"", toml.routing.execution_model);
    println!();
}

pub fn cmd_config(project_dir: &Path, command: Option<ConfigCommands>) -> Result<()> {
    let wavefront_dir = project_dir.join(WAVEFRONT_DIR);
    let config_path = wavefront_dir.join(CONFIG_FILE);

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Wavefront Configuration");
            println!("=======================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No wavefront.toml found at {}", config_path.display());
                println!("Run 'wavefront config init' to create one.");
            }
            println!();

            // Effective values include environment overrides
            let config = WavefrontConfig::new(project_dir.to_path_buf())?;
            print_toml(&config.toml);
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No wavefront.toml found. Using defaults (valid).");
                return Ok(());
            }

            let toml = WavefrontToml::load(&config_path)?;
            let warnings = toml.validate();

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("wavefront.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            if !wavefront_dir.exists() {
                std::fs::create_dir_all(&wavefront_dir)?;
            }

            WavefrontToml::default().save(&config_path)?;

            println!("Created wavefront.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [orchestrator] max_critiques, strict_mode, enable_phase_gates");
            println!("  - [enforcement] parallel_window_ms, strict, failure_policy");
            println!("  - [routing] planning_model, execution_model");
            println!();
        }
    }

    Ok(())
}
