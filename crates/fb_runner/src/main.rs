//! Find-ball experiment runner
//!
//! Drives the experiment loop: simulator poll, agent poll, controller tick,
//! repeated at a fixed best-effort cadence until Ctrl+C. On shutdown the open
//! trial is closed as cancelled and every CSV is flushed.

mod rehearsal;

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use fb_core::{
    AgentPool, CsvRecorder, ExperimentConfig, ExperimentController, SimulatorLink, SystemClock,
};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use rehearsal::{AgentScript, Field, HeadlessSimulator, SyntheticAgents};

#[derive(Parser, Debug)]
#[command(name = "find_ball")]
#[command(about = "Run the find-ball experiment", long_about = None)]
struct Cli {
    /// 1-based trial number to start (or resume) from
    start_from: Option<u32>,

    /// Experiment config file (.yaml, .yml or .json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for the trial and position CSVs
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Directory for the general log file
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,

    /// Driver loop cadence in milliseconds
    #[arg(long, default_value_t = 10)]
    tick_ms: u64,

    /// Stop after this many ticks instead of waiting for Ctrl+C
    #[arg(long)]
    max_ticks: Option<u64>,

    /// Number of synthetic agents in the headless rehearsal (1-5)
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=5))]
    agents: u8,

    /// Ticks between synthetic agents joining
    #[arg(long, default_value_t = 500)]
    join_every: u64,

    /// Seed for the synthetic agents' search behaviour
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

impl Cli {
    fn experiment_config(&self) -> Result<ExperimentConfig> {
        let mut config = match &self.config {
            Some(path) => ExperimentConfig::from_path(path)
                .with_context(|| format!("Failed to load config: {}", path.display()))?,
            None => ExperimentConfig::default(),
        };
        if let Some(start_from) = self.start_from {
            config.start_sequence = start_from;
        }
        config.validate().context("Invalid experiment config")?;
        Ok(config)
    }

    fn agent_script(&self) -> AgentScript {
        AgentScript {
            agents: self.agents,
            join_every: self.join_every,
            ..Default::default()
        }
    }
}

/// Drain both collaborators. Recoverable link errors are logged and the tick
/// goes ahead on cached state; a lost connection ends the run.
fn poll_links<S, A>(simulator: &mut S, agents: &mut A) -> Result<()>
where
    S: SimulatorLink + ?Sized,
    A: AgentPool + ?Sized,
{
    if let Err(e) = simulator.poll() {
        if !e.is_recoverable() {
            return Err(e).context("Simulator link lost");
        }
        warn!(error = %e, "Simulator poll failed");
    }
    if let Err(e) = agents.poll() {
        if !e.is_recoverable() {
            return Err(e).context("Agent server link lost");
        }
        warn!(error = %e, "Agent poll failed");
    }
    Ok(())
}

/// Log to stdout and to `<log_dir>/<stamp>.log`. `RUST_LOG` overrides the
/// default `info` filter.
fn init_tracing(log_dir: &Path, stamp: &str) -> Result<PathBuf> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;
    let path = log_dir.join(format!("{}.log", stamp));
    let file = File::create(&path)
        .with_context(|| format!("Failed to open log file: {}", path.display()))?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .init();

    Ok(path)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let stamp = chrono::Utc::now().timestamp().to_string();

    let log_path = init_tracing(&cli.log_dir, &stamp)?;
    info!(path = %log_path.display(), "Opened general log file");

    let config = cli.experiment_config()?;

    let (recorder, paths) = CsvRecorder::create_in(&cli.out_dir, &stamp)
        .with_context(|| format!("Failed to create output files in {}", cli.out_dir.display()))?;
    info!(
        trials = %paths.trials.display(),
        positions = %paths.positions.display(),
        "Opened output files"
    );

    let field = Field::shared(config.field);
    let mut simulator = HeadlessSimulator::new(field.clone());
    let mut agents = SyntheticAgents::new(field, cli.agent_script(), cli.seed);
    info!(
        agents = cli.agents,
        join_every = cli.join_every,
        "Running headless rehearsal"
    );

    let mut controller = ExperimentController::new(config, recorder, SystemClock::new())?;

    let mut interval = tokio::time::interval(Duration::from_millis(cli.tick_ms.max(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut ticks: u64 = 0;
    loop {
        tokio::select! {
            signal = &mut shutdown => {
                if let Err(e) = signal {
                    warn!(error = %e, "Failed to listen for Ctrl+C");
                }
                info!("Termination signal received");
                break;
            }
            _ = interval.tick() => {
                if let Err(e) = poll_links(&mut simulator, &mut agents) {
                    error!(error = %format!("{:#}", e), "Stopping experiment");
                    break;
                }
                controller.tick(&mut simulator, &mut agents);

                ticks += 1;
                if cli.max_ticks.is_some_and(|max| ticks >= max) {
                    info!(ticks, "Tick limit reached");
                    break;
                }
            }
        }
    }

    controller
        .finish()
        .context("Failed to flush trial data on shutdown")?;
    info!(next_trial = controller.trial_number(), "Experiment stopped");
    Ok(())
}
