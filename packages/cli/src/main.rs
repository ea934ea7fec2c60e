use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use hazard_twin::{EventMonitor, HarnessConfig, Orchestrator, Scenario, Technique};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Hazard Twin CLI
/// Runs one concurrency hazard scenario under the event monitor
#[derive(Parser)]
#[command(name = "hazard", version)]
#[command(about = "Race condition, deadlock and starvation scenarios", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON configuration file (every field optional)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Append every event to this JSON-lines file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Write per-actor alert files into this directory
    #[arg(long, global = true)]
    alert_dir: Option<PathBuf>,

    /// Print the outcome as JSON instead of text
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Args)]
struct Mode {
    /// Run the safe variant
    #[arg(long)]
    secure: bool,

    /// Safe technique: `semaphore` or `monitor` (ticket lock for starvation)
    #[arg(long, requires = "secure")]
    technique: Option<Technique>,
}

#[derive(Subcommand)]
enum Commands {
    /// Concurrent deposits into one joint account
    Race(Mode),
    /// Two agents transferring between the same pair of wallets
    Deadlock(Mode),
    /// High-priority clients crowding out a low-priority one
    Starvation(Mode),
    /// Deposit workload with many actors and a muted console
    Stress {
        #[command(flatten)]
        mode: Mode,

        /// Number of depositors (overrides the config file)
        #[arg(short, long)]
        actors: Option<usize>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    info!("⚡ Hazard Twin v{}", hazard_twin::VERSION);

    let monitor = Arc::new(
        EventMonitor::new(config.monitor.clone()).context("failed to start event monitor")?,
    );
    let orchestrator = Orchestrator::new(Arc::clone(&monitor), config);

    let outcome = match cli.command {
        Commands::Race(mode) => run(&orchestrator, Scenario::RaceCondition, &mode, cli.json)?,
        Commands::Deadlock(mode) => run(&orchestrator, Scenario::Deadlock, &mode, cli.json)?,
        Commands::Starvation(mode) => run(&orchestrator, Scenario::Starvation, &mode, cli.json)?,
        Commands::Stress { mode, actors } => {
            let outcome = orchestrator
                .run_stress(actors, mode.secure, mode.technique)
                .context("stress run failed")?;
            if cli.json {
                serde_json::to_string_pretty(&outcome)?
            } else {
                outcome.to_string()
            }
        }
    };

    println!("{outcome}");
    println!("{}", monitor.report());
    monitor.shutdown();
    Ok(())
}

fn run(orchestrator: &Orchestrator, scenario: Scenario, mode: &Mode, json: bool) -> Result<String> {
    let outcome = orchestrator
        .run(scenario, mode.secure, mode.technique)
        .with_context(|| format!("{scenario} run failed"))?;
    if json {
        Ok(serde_json::to_string_pretty(&outcome)?)
    } else {
        Ok(outcome.to_string())
    }
}

fn load_config(cli: &Cli) -> Result<HarnessConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            HarnessConfig::from_json(&text)
                .with_context(|| format!("invalid config {}", path.display()))?
        }
        None => HarnessConfig::default(),
    };
    if let Some(path) = &cli.log_file {
        config.monitor = config.monitor.journal(path);
    }
    if let Some(dir) = &cli.alert_dir {
        config.monitor = config.monitor.alerts(dir);
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}
