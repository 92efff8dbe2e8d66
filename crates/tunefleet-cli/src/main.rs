//! tunefleet CLI
//!
//! Local harness for running and inspecting tuning jobs.

mod commands;
mod synthetic;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::Path;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use tunefleet_core::OrchestratorConfig;

/// tunefleet - distributed AutoML training orchestrator
#[derive(Parser, Debug)]
#[command(name = "tunefleet")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error); overrides the config
    /// file
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a tuning job against a local cluster
    Run {
        /// Job definition file (TOML)
        #[arg(long)]
        job: String,

        /// Orchestrator configuration file (TOML)
        #[arg(long)]
        config: Option<String>,

        /// Directory trained parameters are persisted under
        #[arg(long)]
        params_dir: Option<String>,
    },

    /// Print advisor proposals for a job without running it
    Propose {
        /// Job definition file (TOML)
        #[arg(long)]
        job: String,

        /// Number of proposals to print
        #[arg(long, default_value_t = 5)]
        count: u64,
    },
}

fn init_logging(level: &str) {
    let log_level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            job,
            config,
            params_dir,
        } => {
            let config = match config.as_deref() {
                Some(path) => OrchestratorConfig::from_file(Path::new(path))
                    .with_context(|| format!("loading orchestrator config {}", path))?,
                None => OrchestratorConfig::default(),
            };
            init_logging(cli.log_level.as_deref().unwrap_or(&config.logging.level));
            commands::run(Path::new(&job), &config, params_dir.as_deref()).await?;
        }
        Commands::Propose { job, count } => {
            init_logging(cli.log_level.as_deref().unwrap_or("info"));
            commands::propose(Path::new(&job), count)?;
        }
    }

    Ok(())
}
