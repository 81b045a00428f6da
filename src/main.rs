/*
 * Boid Flocking Simulation - Headless Driver
 *
 * Owns the fixed-rate loop around the simulation core: loads parameters,
 * spawns the flock with a pluggable layout, steps the world and reports
 * progress. Rendering is left to other consumers of the core.
 *
 * The loop runs either as fast as possible or paced in real time, where frame
 * time is accumulated and drained in fixed physics steps.
 */

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use quadflock::{SimulationParams, Vec2, World};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "quadflock")]
#[command(about = "Headless boid flocking simulation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulation and report tick statistics
    Run {
        /// Path to a JSON parameter file (missing fields use defaults)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Number of physics ticks to run
        #[arg(long, default_value_t = 1000)]
        steps: u64,

        /// How the initial flock is laid out
        #[arg(long, value_enum, default_value_t = Pattern::Grid)]
        pattern: Pattern,

        /// Boids per side for the grid layout, total boids for the random layout
        #[arg(long, default_value_t = 10)]
        count: usize,

        /// Override the seed from the parameter file
        #[arg(long)]
        seed: Option<u64>,

        /// Pace ticks against the wall clock instead of running flat out
        #[arg(long)]
        realtime: bool,

        /// Log statistics every N ticks
        #[arg(long, default_value_t = 100)]
        log_every: u64,

        /// Write the final boid states as JSON
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print the default parameters as JSON
    DumpDefaultConfig,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Pattern {
    Grid,
    Random,
}

// Initial layout of the flock
trait Spawner {
    fn spawn(&self, world: &mut World, rng: &mut ChaCha8Rng);
}

// Square grid with unit spacing centred on the origin
struct GridSpawner {
    side: usize,
}

impl Spawner for GridSpawner {
    fn spawn(&self, world: &mut World, _rng: &mut ChaCha8Rng) {
        let offset = (self.side as f32 - 1.0) / 2.0;
        for row in 0..self.side {
            for col in 0..self.side {
                let position = Vec2::new(col as f32 - offset, offset - row as f32);
                world.spawn(position, None);
            }
        }
    }
}

// Uniform positions inside the region the boundary leaves alone
struct RandomSpawner {
    count: usize,
}

impl Spawner for RandomSpawner {
    fn spawn(&self, world: &mut World, rng: &mut ChaCha8Rng) {
        let threshold = world.boundary().threshold().max(Vec2::splat(f32::EPSILON));
        for _ in 0..self.count {
            let x = rng.gen_range(-threshold.x..threshold.x);
            let y = rng.gen_range(-threshold.y..threshold.y);
            let seed = rng.gen();
            world.spawn(Vec2::new(x, y), Some(seed));
        }
    }
}

#[derive(Serialize)]
struct BoidRecord {
    position: [f32; 2],
    heading: [f32; 2],
    boundary_override: bool,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            steps,
            pattern,
            count,
            seed,
            realtime,
            log_every,
            out,
        } => {
            let mut params = match config {
                Some(path) => load_params(&path)?,
                None => SimulationParams::default(),
            };
            if let Some(seed) = seed {
                params.seed = seed;
            }

            let spawner: Box<dyn Spawner> = match pattern {
                Pattern::Grid => Box::new(GridSpawner { side: count }),
                Pattern::Random => Box::new(RandomSpawner { count }),
            };

            let mut world = World::new(params).context("invalid simulation parameters")?;
            let mut rng = ChaCha8Rng::seed_from_u64(world.params().seed);
            spawner.spawn(&mut world, &mut rng);
            info!(boids = world.agent_count(), ?pattern, "spawned flock");

            run(&mut world, steps, realtime, log_every.max(1))?;

            if let Some(path) = out {
                write_boids(&world, &path)?;
                info!(path = %path.display(), "wrote final boid states");
            }
        }
        Commands::DumpDefaultConfig => {
            println!("{}", serde_json::to_string_pretty(&SimulationParams::default())?);
        }
    }

    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}

fn load_params(path: &Path) -> Result<SimulationParams> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let params = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(params)
}

// Wall-clock length of one physics tick
fn step_duration(dt: f32) -> Result<Duration> {
    Duration::try_from_secs_f32(dt)
        .with_context(|| format!("physics step of {dt}s cannot be paced in real time"))
}

fn run(world: &mut World, steps: u64, realtime: bool, log_every: u64) -> Result<()> {
    let dt = world.params().physics_step();
    let started = Instant::now();
    let mut completed = 0;

    if realtime {
        let step_size = step_duration(dt)?;

        // Fixed timestep physics: accumulate frame time, drain it in whole steps
        let mut accumulator = Duration::ZERO;
        let mut last_update = Instant::now();

        while completed < steps {
            let now = Instant::now();
            accumulator += now.duration_since(last_update);
            last_update = now;

            while accumulator >= step_size && completed < steps {
                world.step(dt);
                accumulator -= step_size;
                completed += 1;
                report(world, completed, log_every);
            }

            thread::sleep(step_size.saturating_sub(accumulator));
        }
    } else {
        while completed < steps {
            world.step(dt);
            completed += 1;
            report(world, completed, log_every);
        }
    }

    let elapsed = started.elapsed();
    let per_tick = elapsed.as_secs_f64() * 1000.0 / completed.max(1) as f64;
    info!(ticks = completed, elapsed_ms = elapsed.as_millis() as u64, per_tick_ms = per_tick, "simulation finished");
    Ok(())
}

fn report(world: &World, completed: u64, log_every: u64) {
    let stats = world.last_tick();
    if stats.skipped > 0 {
        warn!(tick = stats.tick, skipped = stats.skipped, "boids skipped this tick");
    }
    if completed % log_every == 0 {
        info!(
            tick = stats.tick,
            boids = stats.boids,
            leaves = stats.leaf_count,
            depth = stats.tree_depth,
            overrides = stats.boundary_overrides,
            avg_neighbours = stats.average_neighbours(),
            max_neighbours = stats.max_neighbours,
            tick_us = stats.elapsed.as_micros() as u64,
            "progress"
        );
    }
}

fn write_boids(world: &World, path: &Path) -> Result<()> {
    let records: Vec<BoidRecord> = world
        .iter()
        .map(|(_, boid)| BoidRecord {
            position: boid.position().to_array(),
            heading: boid.heading().to_array(),
            boundary_override: boid.boundary_override(),
        })
        .collect();

    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &records)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
