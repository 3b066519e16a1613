use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use robocal::io::{CancelToken, FileResultStore, format_chain_record};
use robocal::linear::ChainSolveReport;
use robocal::session::{
    CalibrationSession, Collaborators, EdgeResult, ObservationLog, SessionConfig,
};
use robocal::sim::PanTiltScenario;
use serde::Serialize;

/// Kinematic-chain extrinsic calibration.
#[derive(Debug, Parser)]
#[command(author, version, about = "Kinematic-chain extrinsic calibration")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a full session against the simulated pan-tilt robot.
    Simulate {
        /// JSON SessionConfig; its frame names must exist in the simulation.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Directory for results, overriding the configured one.
        #[arg(long)]
        output: Option<PathBuf>,
        /// Also write the recorded observations for offline re-solving.
        #[arg(long)]
        save_observations: bool,
    },
    /// Re-solve recorded observations without moving the robot.
    Solve {
        /// Observation log written by a previous session.
        #[arg(long = "load-data")]
        load_data: PathBuf,
        /// Passes over the calibration order; 0 selects the default.
        #[arg(long, default_value_t = 0)]
        iterations: usize,
    },
    /// Print the simulated robot's session configuration as a template.
    Config,
}

const OBSERVATIONS_FILE: &str = "observations.json";

#[derive(Debug, Serialize)]
struct OfflineReport {
    solve: ChainSolveReport,
    edges: Vec<EdgeResult>,
}

fn load_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let data =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let value = serde_json::from_str(&data)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(value)
}

fn simulate(
    config_path: Option<&Path>,
    output: Option<PathBuf>,
    save_observations: bool,
    cancel: CancelToken,
) -> Result<String> {
    let scenario = PanTiltScenario::default();
    let mut config = match config_path {
        Some(path) => load_json_file::<SessionConfig>(path)?,
        None => scenario.config.clone(),
    };
    if let Some(dir) = output {
        config.storage.directory = dir;
    }
    if save_observations {
        config.storage.observations_file = Some(OBSERVATIONS_FILE.to_string());
    }

    let store = FileResultStore::new(&config.storage.directory, &config.storage.result_file);
    let detector = scenario.detector();
    let world = &scenario.world;
    let mut session = CalibrationSession::new(
        config,
        Collaborators {
            lookup: world,
            velocity: world,
            joints: Some(world),
            detector: &detector,
            store: &store,
            clock: world,
            frames: world.frames(),
            cancel,
        },
    )?;
    log::info!(
        "simulating {} configuration(s), results go to {}",
        session.configurations().len(),
        store.path().display()
    );

    let report = session.run()?;
    Ok(serde_json::to_string_pretty(&report)?)
}

fn solve_offline(path: &Path, iterations: usize) -> Result<String> {
    let log = ObservationLog::load(path)?;
    log::info!(
        "re-solving {} edge(s) from {} observation(s)",
        log.edges.len(),
        log.observations.len()
    );
    let (chain, solve) = log.solve(iterations)?;
    for line in format_chain_record(chain.edges()).lines().filter(|l| !l.is_empty()) {
        log::info!("{line}");
    }
    let report = OfflineReport {
        solve,
        edges: chain.edges().iter().map(EdgeResult::from).collect(),
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

fn config_template() -> Result<String> {
    Ok(serde_json::to_string_pretty(&PanTiltScenario::session_config())?)
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(err) = try_main() {
        log::error!("{err:#}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let args = Args::parse();
    let json = match args.command {
        Command::Simulate {
            config,
            output,
            save_observations,
        } => {
            let cancel = CancelToken::new();
            let on_signal = cancel.clone();
            ctrlc::set_handler(move || {
                log::info!("received shutdown signal");
                on_signal.cancel();
            })
            .context("failed to set Ctrl-C handler")?;
            simulate(config.as_deref(), output, save_observations, cancel)?
        }
        Command::Solve {
            load_data,
            iterations,
        } => solve_offline(&load_data, iterations)?,
        Command::Config => config_template()?,
    };
    println!("{json}");
    Ok(())
}
