// Headless runner for the wildcatch simulation.
//
// Builds a rolling-hills heightmap, scatters rocks and wild creatures on it,
// and runs the frame loop at 60 fps with no renderer. Every second and a half
// it drops a projectile onto the nearest capturable creature so the capture
// protocol gets exercised end to end. At the end it deploys and recalls the
// first stored creature, then prints a summary.
//
// Logging goes through `tracing`; set `RUST_LOG=debug` to see every event.
//
// Usage:
//   headless [OPTIONS]
//     --seed <N>          PRNG seed (default: 1)
//     --frames <N>        Frames to simulate (default: 3600)
//     --creatures <N>     Wild creatures to scatter (default: 20)
//     --rocks <N>         Rocks to scatter (default: 50)
//     --config <PATH>     JSON GameConfig to load (default: built-in)

use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use wildcatch_sim::command::SimAction;
use wildcatch_sim::config::GameConfig;
use wildcatch_sim::event::{SimEvent, SimEventKind};
use wildcatch_sim::sim::SimState;
use wildcatch_sim::terrain::Heightfield;
use wildcatch_sim::types::Vec3;

const FRAME_DT: f32 = 1.0 / 60.0;
const DROP_INTERVAL_FRAMES: u64 = 90;
const COMPANION_FRAMES: u64 = 120;

struct RunOptions {
    seed: u64,
    frames: u64,
    creatures: usize,
    rocks: usize,
    config_path: Option<String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            seed: 1,
            frames: 3600,
            creatures: 20,
            rocks: 50,
            config_path: None,
        }
    }
}

#[derive(Default)]
struct Tally {
    thrown: u32,
    expired: u32,
    succeeded: u32,
    failed: u32,
    stored: u32,
    companion: u32,
}

impl Tally {
    fn record(&mut self, kind: &SimEventKind) {
        match kind {
            SimEventKind::ProjectileThrown { .. } => self.thrown += 1,
            SimEventKind::ProjectileExpired { .. } => self.expired += 1,
            SimEventKind::CaptureSucceeded { .. } => self.succeeded += 1,
            SimEventKind::CaptureFailed { .. } => self.failed += 1,
            SimEventKind::Stored { .. } => self.stored += 1,
            SimEventKind::SentOut { .. } | SimEventKind::Recalled { .. } => self.companion += 1,
            _ => {}
        }
    }
}

fn main() {
    init_tracing();
    let options = parse_args();

    let config = match &options.config_path {
        Some(path) => load_config(path),
        None => GameConfig::default(),
    };
    let mut sim = match SimState::with_config(options.seed, config) {
        Ok(sim) => sim,
        Err(e) => {
            eprintln!("Invalid config: {e}");
            std::process::exit(1);
        }
    };

    sim.set_terrain(Some(rolling_hills(&sim.config)));
    let rocks = sim.scatter_obstacles(options.rocks);
    let spawned = sim.scatter_creatures(options.creatures).events.len();
    info!(seed = options.seed, rocks, creatures = spawned, "world populated");

    let mut tally = Tally::default();
    for frame in 0..options.frames {
        let actions = if frame % DROP_INTERVAL_FRAMES == 0 {
            drop_on_nearest(&sim)
        } else {
            Vec::new()
        };
        let result = sim.frame(FRAME_DT, &actions);
        for event in &result.events {
            log_event(event);
            tally.record(&event.kind);
        }
    }

    exercise_companion(&mut sim, &mut tally);

    println!("Simulated {} frames (seed {})", options.frames, options.seed);
    println!("  projectiles thrown:  {}", tally.thrown);
    println!("  projectiles expired: {}", tally.expired);
    println!("  captures succeeded:  {}", tally.succeeded);
    println!("  captures failed:     {}", tally.failed);
    println!("  creatures stored:    {}", tally.stored);
    println!("  companion events:    {}", tally.companion);
    println!("  wild creatures left: {}", sim.registry.roster_len());
    let in_flight = sim.projectiles.iter().filter(|p| p.is_active()).count();
    println!("  still in flight:     {in_flight}");
    for species in sim.species_table.ids() {
        let stored = sim
            .registry
            .inventory()
            .iter()
            .filter(|c| c.species == species)
            .count();
        let name = sim.species_table.get(species).map_or("?", |s| s.name.as_str());
        println!("    {name:<12} stored: {stored}");
    }
}

fn log_event(event: &SimEvent) {
    match event.kind.creature() {
        Some(creature) => debug!(frame = event.frame, %creature, event = ?event.kind, "sim event"),
        None => debug!(frame = event.frame, event = ?event.kind, "sim event"),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn load_config(path: &str) -> GameConfig {
    let json = match std::fs::read_to_string(path) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("Failed to read config {path}: {e}");
            std::process::exit(1);
        }
    };
    match GameConfig::from_json(&json) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config {path}: {e}");
            std::process::exit(1);
        }
    }
}

/// Grayscale heightmap covering the scatter area, fed through the same
/// ingestion path a loaded image would use.
fn rolling_hills(config: &GameConfig) -> Heightfield {
    let cell = config.terrain.cell_size;
    let samples = ((2.0 * config.scatter.range / cell) as usize + 1).max(2);
    let mut pixels = Vec::with_capacity(samples * samples);
    for j in 0..samples {
        for i in 0..samples {
            let x = i as f32 * cell * 0.05;
            let z = j as f32 * cell * 0.07;
            let h = 0.5 + 0.25 * x.sin() + 0.25 * (z + 0.3 * x).cos();
            pixels.push((h.clamp(0.0, 1.0) * 255.0) as u8);
        }
    }
    Heightfield::load_or_flat(&pixels, samples, samples, cell, config.terrain.height_scale)
}

/// A throw straight down onto the capturable creature closest to the origin.
fn drop_on_nearest(sim: &SimState) -> Vec<SimAction> {
    let target = sim
        .registry
        .capturable()
        .min_by(|a, b| a.position.length_squared().total_cmp(&b.position.length_squared()));
    let Some(creature) = target else {
        return Vec::new();
    };
    let lift = sim.config.projectile.spawn_distance + creature.radius + 0.1;
    vec![SimAction::Throw {
        eye: creature.position + Vec3::new(0.0, lift, 0.0),
        aim: Vec3::NEG_Y,
        charge: 0.0,
    }]
}

/// Send the first stored creature out next to the origin, let it wander,
/// then recall it.
fn exercise_companion(sim: &mut SimState, tally: &mut Tally) {
    if sim.registry.inventory().is_empty() {
        info!("inventory empty, skipping companion run");
        return;
    }
    let spot = Vec3::new(0.0, 0.0, 0.0);
    let mut events = match sim.send_out(0, spot) {
        Ok((id, result)) => {
            info!(creature = %id, "companion deployed");
            result.events
        }
        Err(e) => {
            warn!(%e, "send out failed");
            return;
        }
    };
    for _ in 0..COMPANION_FRAMES {
        events.extend(sim.frame(FRAME_DT, &[]).events);
    }
    match sim.recall(0) {
        Ok((_, result)) => events.extend(result.events),
        Err(e) => warn!(%e, "recall failed"),
    }
    for event in &events {
        log_event(event);
        tally.record(&event.kind);
    }
}

/// Parse command-line arguments. Uses simple `std::env::args()` matching.
fn parse_args() -> RunOptions {
    let mut options = RunOptions::default();
    let args: Vec<String> = std::env::args().collect();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--seed" => {
                i += 1;
                options.seed = args.get(i).and_then(|s| s.parse().ok()).unwrap_or_else(|| {
                    eprintln!("--seed requires a number");
                    std::process::exit(1);
                });
            }
            "--frames" => {
                i += 1;
                options.frames = args.get(i).and_then(|s| s.parse().ok()).unwrap_or_else(|| {
                    eprintln!("--frames requires a number");
                    std::process::exit(1);
                });
            }
            "--creatures" => {
                i += 1;
                options.creatures =
                    args.get(i).and_then(|s| s.parse().ok()).unwrap_or_else(|| {
                        eprintln!("--creatures requires a number");
                        std::process::exit(1);
                    });
            }
            "--rocks" => {
                i += 1;
                options.rocks = args.get(i).and_then(|s| s.parse().ok()).unwrap_or_else(|| {
                    eprintln!("--rocks requires a number");
                    std::process::exit(1);
                });
            }
            "--config" => {
                i += 1;
                options.config_path = args.get(i).cloned().or_else(|| {
                    eprintln!("--config requires a path");
                    std::process::exit(1);
                });
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {other}");
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    options
}

fn print_usage() {
    println!("Usage: headless [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --seed <N>          PRNG seed (default: 1)");
    println!("  --frames <N>        Frames to simulate (default: 3600)");
    println!("  --creatures <N>     Wild creatures to scatter (default: 20)");
    println!("  --rocks <N>         Rocks to scatter (default: 50)");
    println!("  --config <PATH>     JSON GameConfig to load (default: built-in)");
    println!("  --help, -h          Show this help");
}
