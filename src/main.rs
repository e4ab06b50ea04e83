//! Lanekeep headless entry point
//!
//! Runs the simulation at the fixed physics rate and prints one JSON
//! snapshot per simulated second on stdout. `RUST_LOG` controls logging.

use std::path::PathBuf;

use clap::Parser;
use lanekeep_sim::consts::SIM_DT;
use lanekeep_sim::runner::{PerceptionMode, Runner};
use lanekeep_sim::settings::StepMethod;
use lanekeep_sim::sim::{GearMode, ModeSelect};
use lanekeep_sim::{SimConfig, SimResult};

#[derive(Parser)]
#[command(name = "lanekeep-sim", about = "Headless lane-keeping vehicle simulation")]
struct Cli {
    /// JSON config file; defaults are used when omitted
    config: Option<PathBuf>,
    /// Number of fixed physics ticks to run
    #[arg(long, default_value_t = 500)]
    ticks: u64,
    /// Starting gear mode (auto, park, manual)
    #[arg(long, default_value = "auto")]
    mode: GearMode,
    /// Override the configured integrator (heun, rk4)
    #[arg(long)]
    method: Option<StepMethod>,
    /// Run perception on a background thread
    #[arg(long)]
    threaded: bool,
    /// Save the annotated final frame as PNG
    #[arg(long)]
    overlay: Option<PathBuf>,
}

fn run(cli: Cli) -> SimResult<()> {
    let mut config = match &cli.config {
        Some(path) => SimConfig::load(path)?,
        None => SimConfig::default(),
    };
    if let Some(method) = cli.method {
        config.integrator.method = method;
    }
    let perception = if cli.threaded {
        PerceptionMode::Threaded
    } else {
        PerceptionMode::Synchronous
    };

    let mut runner = Runner::new(config, perception)?;
    runner.select_mode(ModeSelect::from(cli.mode));

    let per_second = (1.0 / SIM_DT).round() as u64;
    for _ in 0..cli.ticks {
        let snapshot = runner.step()?;
        if snapshot.tick % per_second == 0 {
            println!("{}", serde_json::to_string(&snapshot)?);
        }
    }

    let sim = runner.sim();
    let state = sim.state();
    log::info!(
        "Finished {} ticks ({:.1}s): x = {:.1} m, v = {:.2} m/s, y = {:.2} m, mode {}",
        sim.tick_count(),
        sim.time(),
        state.position,
        state.velocity,
        state.lateral_position,
        sim.mode()
    );

    if let Some(path) = &cli.overlay {
        runner.annotated_frame()?.save(path)?;
        log::info!("Overlay saved to {}", path.display());
    }
    runner.shutdown();
    Ok(())
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    log::info!("Lanekeep simulation starting...");

    if let Err(e) = run(cli) {
        log::error!("{e}");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
