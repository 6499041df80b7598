//! Genesis Universe Simulator CLI
//!
//! Runs the bounded-universe simulation in epochs, surveying habitability
//! after each epoch and writing interim and final chunked reports. A run
//! resumes from the save directory when a compatible state exists.

use clap::Parser;
use genesis_core::{Engine, PhysicsKernel};
use genesis_sim::habitability::{self, WaterState};
use genesis_sim::report::{self, BiomeCounts, SurveyStats};
use genesis_sim::store::Store;
use genesis_sim::PlanetRecord;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Genesis bounded-universe simulation CLI
#[derive(Parser, Debug)]
#[command(name = "genesis-sim")]
#[command(about = "Run the black-hole membrane universe simulation", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Epochs to run this invocation
    #[arg(short, long, default_value = "20")]
    epochs: u64,

    /// Simulation steps per epoch
    #[arg(long, default_value = "300")]
    steps: u64,

    /// Bodies seeded at big bang (fresh runs only)
    #[arg(short, long, default_value = "120")]
    bodies: usize,

    /// Write an interim report every N epochs
    #[arg(long, default_value = "2")]
    interim: u64,

    /// Save directory
    #[arg(long, default_value = "universe_saves")]
    save_dir: String,

    /// Ignore any existing save and big-bang a fresh universe
    #[arg(long)]
    fresh: bool,

    /// Print the final summary as JSON only
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("warning: logging already initialized");
    }

    let seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(42)
    } else {
        args.seed
    };

    let mut kernel = PhysicsKernel::default();
    let store = Store::new(&args.save_dir);
    // Survey randomness is decoupled from the physics stream: reports never
    // perturb trajectories.
    let mut survey_rng = ChaCha8Rng::seed_from_u64(seed);

    let mut stats = SurveyStats::default();
    let mut biomes = BiomeCounts::default();
    let mut habitable: Vec<PlanetRecord> = Vec::new();

    let mut restored = None;
    if !args.fresh {
        if let Some(report) = store.load() {
            restore_survey(&report, &mut stats, &mut biomes);
            restore_params(&report, &mut kernel);
        }
        if let Some(state) = store.load_engine() {
            match Engine::from_state(&state, kernel.clone(), seed) {
                Ok(engine) => restored = Some(engine),
                Err(err) => warn!(%err, "saved engine rejected, starting fresh"),
            }
        }
    }
    let mut engine = match restored {
        Some(engine) => engine,
        None => {
            info!(bodies = args.bodies, seed, "big bang");
            let mut engine = Engine::new(kernel, seed);
            engine.big_bang(args.bodies);
            stats.tu += 1;
            engine
        }
    };

    let start = engine.epoch;
    let target = start + args.epochs;
    info!(
        run_id = engine.run_id,
        epoch = start,
        bodies = engine.bodies.len(),
        plan = %format!("{start} -> {target}"),
        "engine ready"
    );

    for epoch in start..target {
        engine.run_epoch(args.steps);
        survey_epoch(
            &engine,
            epoch,
            &mut stats,
            &mut biomes,
            &mut habitable,
            &mut survey_rng,
        );

        if let Some(record) = engine.history.last() {
            info!(
                epoch,
                n = record.snapshot.count,
                bound_pct = record.snapshot.bound_pct,
                buf_pct = record.snapshot.buffer_pct,
                uni = record.snapshot.uniformity,
                recycled = engine.tallies.recycled_count,
                "epoch complete"
            );
        }

        if args.interim > 0 && (epoch - start + 1) % args.interim == 0 {
            stats.ir += 1;
            let verification = genesis_core::analyze(&engine);
            let chunks =
                report::chunks(&engine, &stats, &habitable, &biomes, verification.as_ref());
            if let Err(err) = store.save(&chunks, "INTERIM") {
                warn!(%err, "interim report not saved");
            }
            if let Some(v) = &verification {
                info!(score = %v.verdict.total, interp = ?v.verdict.interp, "interim verdict");
            }
        }
    }

    let verification = genesis_core::analyze(&engine);
    let chunks = report::chunks(&engine, &stats, &habitable, &biomes, verification.as_ref());
    if let Err(err) = store.save(&chunks, "FINAL") {
        warn!(%err, "final report not saved");
    }

    if args.json {
        if let Some(summary) = chunks.first() {
            println!("{summary}");
        }
    } else if let Some(v) = &verification {
        println!("score: {}", v.verdict.total);
        println!("interpretation: {:?}", v.verdict.interp);
        println!("{}", v.verdict.summary);
        println!("habitable planets found: {}", habitable.len());
    } else {
        println!("no verdict: universe is empty");
    }
}

/// Surveys every candidate planet after an epoch: bodies in the habitable
/// mass and distance band get an atmosphere and water-phase analysis.
fn survey_epoch(
    engine: &Engine,
    epoch: u64,
    stats: &mut SurveyStats,
    biomes: &mut BiomeCounts,
    habitable: &mut Vec<PlanetRecord>,
    rng: &mut ChaCha8Rng,
) {
    let star = engine.star();
    let view = genesis_core::StarView {
        position: star.position,
        mass: star.mass,
        temp: star.temp,
    };

    for body in engine.bodies.iter().filter(|b| b.is_active && !b.is_star) {
        let dist = body.distance_to(view.position);
        if body.mass <= 12.0 || body.mass >= 80.0 || dist <= 400.0 || dist >= 2600.0 {
            continue;
        }
        stats.tc += 1;

        let atmosphere = habitability::calculate_atmosphere(body.mass, body.temp, rng);
        let hab = habitability::analyze_habitability(
            body.temp,
            atmosphere.pressure,
            body.mass,
            body.composition.vo,
            rng,
        );
        match hab.state {
            WaterState::Gas => {
                stats.hot += 1;
                biomes.scorched += 1;
            }
            WaterState::Ice => {
                stats.cold += 1;
                biomes.snowball += 1;
            }
            WaterState::Sublimation => {
                stats.no_pressure += 1;
                biomes.barren += 1;
            }
            WaterState::Liquid => {
                stats.liq += 1;
                match hab.biome {
                    genesis_sim::Biome::Ocean => biomes.ocean += 1,
                    genesis_sim::Biome::Gaia => biomes.gaia += 1,
                    genesis_sim::Biome::Arid => biomes.arid += 1,
                    _ => biomes.desert += 1,
                }
                habitable.push(habitability::compact_planet(body, &view, epoch, rng));
            }
        }
    }
}

/// Re-imports the physics parameters a saved run exported, so a resumed
/// universe keeps the regime it was created under.
fn restore_params(report: &serde_json::Value, kernel: &mut PhysicsKernel) {
    let chunks = match report.get("chunks").and_then(|c| c.as_array()) {
        Some(chunks) => chunks,
        None => return,
    };
    for chunk in chunks {
        if chunk.get("type").and_then(|t| t.as_str()) != Some("SUMMARY") {
            continue;
        }
        let pp = match chunk.get("data").and_then(|d| d.get("pp")) {
            Some(pp) => pp,
            None => continue,
        };
        if let Ok(params) = serde_json::from_value::<std::collections::BTreeMap<String, f64>>(
            pp.clone(),
        ) {
            kernel.import_params(&params);
        }
        return;
    }
}

/// Restores survey counters from a compatible saved summary chunk.
fn restore_survey(report: &serde_json::Value, stats: &mut SurveyStats, biomes: &mut BiomeCounts) {
    let chunks = match report.get("chunks").and_then(|c| c.as_array()) {
        Some(chunks) => chunks,
        None => return,
    };
    for chunk in chunks {
        if chunk.get("type").and_then(|t| t.as_str()) != Some("SUMMARY") {
            continue;
        }
        let data = match chunk.get("data") {
            Some(data) => data,
            None => continue,
        };
        let tag = data.get("v").and_then(|v| v.as_str()).unwrap_or("");
        if !tag.contains("V6") {
            continue;
        }
        if let Some(st) = data.get("st") {
            if let Ok(parsed) = serde_json::from_value(st.clone()) {
                *stats = parsed;
            }
        }
        if let Some(bd) = data.get("bd") {
            if let Ok(parsed) = serde_json::from_value(bd.clone()) {
                *biomes = parsed;
            }
        }
        return;
    }
}
