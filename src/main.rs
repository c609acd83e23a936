use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "wavefront")]
#[command(version, about = "Phase-gated orchestration with enforced parallel wave dispatch")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Auto-approve every phase gate
    #[arg(long, global = true)]
    pub yes: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compute the dispatch waves of a task plan
    Waves {
        /// Path to the task plan (JSON)
        plan: PathBuf,

        /// Print waves as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run a task plan through every phase against a simulated worker pool
    Simulate {
        /// Path to the task plan (JSON)
        plan: PathBuf,

        /// Parallel window in milliseconds. Overrides wavefront.toml.
        #[arg(long)]
        window_ms: Option<u64>,

        /// Task ids whose simulated workers fail (comma-separated)
        #[arg(long)]
        fail: Option<String>,

        /// Simulated work time per task in milliseconds
        #[arg(long, default_value = "50")]
        work_ms: u64,

        /// Ask for approval before each phase transition
        #[arg(long)]
        gates: bool,

        /// UI output mode: full, minimal, json
        #[arg(long, default_value = "full")]
        ui: String,
    },
    /// Show the phase map, optionally marking a current phase
    Phases {
        #[arg(long)]
        current: Option<String>,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default wavefront.toml file
    Init,
}

fn init_tracing(verbose: bool) {
    let fallback_level = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(fallback_level))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Commands::Waves { plan, json } => cmd::cmd_waves(plan, *json)?,
        Commands::Simulate {
            plan,
            window_ms,
            fail,
            work_ms,
            gates,
            ui,
        } => {
            let options = cmd::SimulateOptions {
                plan: plan.clone(),
                window_ms: *window_ms,
                fail: cmd::parse_task_list(fail.as_deref()),
                work_ms: *work_ms,
                gates: *gates,
                ui: ui.clone(),
            };
            cmd::cmd_simulate(&project_dir, &cli, options).await?;
        }
        Commands::Phases { current } => cmd::cmd_phases(current.as_deref())?,
        Commands::Config { command } => cmd::cmd_config(&project_dir, command.clone())?,
    }

    Ok(())
}
