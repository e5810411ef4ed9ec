//! AgentWorld headless runner
//!
//! Seeds or resumes a population, steps it, prints the outcome and optionally
//! saves a snapshot.

use clap::Parser;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

use simulation::{
    AgentParams, FileSnapshotStore, SimError, SimulationConfig, SnapshotStore, WorldSimulation,
};

#[derive(Debug, Parser)]
#[command(name = "agentworld", about = "Run the agent population simulation")]
struct Args {
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured seed
    #[arg(long)]
    seed: Option<u64>,

    /// Root agents to seed when not resuming
    #[arg(long, default_value_t = 50)]
    population: usize,

    /// Oldest initial age for seeded agents
    #[arg(long, default_value_t = 40.0)]
    max_initial_age: f64,

    /// Ticks to run
    #[arg(long, default_value_t = 200)]
    ticks: u64,

    /// Override the configured acceleration
    #[arg(long)]
    acceleration: Option<f64>,

    /// Snapshot file (.json or .bin). Loaded first if present, saved at the end.
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

/// Mean wall time per tick; float division so huge tick counts cannot wrap.
fn per_tick(elapsed: Duration, ticks: u64) -> Duration {
    Duration::from_secs_f64(elapsed.as_secs_f64() / ticks.max(1) as f64)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => SimulationConfig::from_file(path)?,
        None => SimulationConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }

    let mut world = WorldSimulation::new(config)?;
    let store = args.snapshot.clone().map(FileSnapshotStore::new);

    let resumed = match &store {
        Some(store) => match world.load(store) {
            Ok(_) => true,
            Err(SimError::SnapshotNotFound(_)) => false,
            Err(e) => return Err(e.into()),
        },
        None => false,
    };

    if !resumed {
        info!("Seeding {} root agents...", args.population);
        let spread = args.max_initial_age.max(0.0);
        for i in 0..args.population {
            // Spread ages evenly so every stage is represented from the start.
            let age = spread * i as f64 / args.population.max(1) as f64;
            world.create_agent(AgentParams::new().aged(age))?;
        }
    }

    if let Some(acceleration) = args.acceleration {
        world.set_acceleration(acceleration)?;
    }

    info!("Running {} ticks...", args.ticks);
    let start = Instant::now();
    let summary = world.step(args.ticks)?;
    let elapsed = start.elapsed();

    let stats = world.population_stats();
    info!(
        births = summary.births,
        deaths = summary.deaths,
        transitions = summary.stage_transitions,
        clock = summary.clock,
        "Run complete in {:?} ({:?} per tick)",
        elapsed,
        per_tick(elapsed, args.ticks)
    );
    println!("{}", serde_json::to_string_pretty(&stats)?);

    if let Some(store) = &store {
        world.save(store)?;
        info!("Snapshot written to {}", store.location());
    }

    Ok(())
}
