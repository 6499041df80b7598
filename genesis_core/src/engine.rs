//! The simulation engine.
//!
//! Owns the body collection and the aggregate counters, and drives one
//! epoch at a time: energy injection, per-body physics, grid-based merge
//! resolution, star re-anchoring, garbage collection and history recording.
//!
//! All randomness flows through a single seeded ChaCha8 stream held by the
//! engine, so a run is reproducible from its master seed.

use crate::body::{Body, Origin, StarView};
use crate::grid::SpatialGrid;
use crate::membrane::{self, MembraneEffects};
use crate::physics::PhysicsKernel;
use crate::persist::round1;
use crate::snapshot::{self, Snapshot};

use nalgebra::Vector2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// Mass the star is seeded with at big bang. Absorbed-by-star bookkeeping
/// is measured against this baseline.
pub const STAR_SEED_MASS: f64 = 6000.0;

/// Shared center coordinate of the universe (both axes).
pub const CENTER_COORD: f64 = 5000.0;

/// Trailing epoch records retained in memory and in saves.
pub const HISTORY_RETENTION: usize = 20;

/// Grid cell edge for merge candidate generation. An algorithmic constant,
/// not a physical one: it trades collision-detection cost against accuracy.
const CELL_SIZE: f64 = 50.0;

/// Bodies merge when separated by less than this fraction of their summed radii.
const MERGE_RADIUS_FACTOR: f64 = 0.8;

/// Inactive bodies are compacted out of the collection at this step cadence.
const GC_INTERVAL: u64 = 60;

/// Running totals across the lifetime of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tallies {
    /// Shred-zone entries
    #[serde(rename = "be", default)]
    pub boundary_events: u64,

    /// Mass added by energy injection
    #[serde(rename = "im", default)]
    pub injected_mass: f64,

    /// Bodies added by energy injection
    #[serde(rename = "ic", default)]
    pub injected_count: u64,

    /// Star mass gained over the seed mass (may dip negative from fuel burn)
    #[serde(rename = "as", default)]
    pub absorbed_by_star: f64,

    /// Merge events
    #[serde(rename = "me", default)]
    pub merge_events: u64,

    /// Mass recycled into fragments by the membrane
    #[serde(rename = "rm", default)]
    pub recycled_mass: f64,

    /// Fragments spawned by the membrane
    #[serde(rename = "rc", default)]
    pub recycled_count: u64,
}

/// One entry of the trailing epoch history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    #[serde(rename = "ep")]
    pub epoch: u64,

    #[serde(rename = "sn")]
    pub snapshot: Snapshot,

    /// Star mass at epoch end, 1 dp
    #[serde(rename = "sm")]
    pub star_mass: f64,

    /// Cumulative step counter at epoch end
    #[serde(rename = "ts")]
    pub total_steps: u64,
}

/// The simulation engine. Index 0 of `bodies` is always the star.
#[derive(Debug)]
pub struct Engine {
    pub kernel: PhysicsKernel,
    pub bodies: Vec<Body>,
    pub center: Vector2<f64>,
    pub epoch: u64,
    pub total_steps: u64,
    pub run_id: u32,
    pub tallies: Tallies,
    pub history: Vec<EpochRecord>,
    rng: ChaCha8Rng,
}

impl Engine {
    /// Creates an empty engine. Call [`big_bang`](Self::big_bang) or restore
    /// a saved state before running epochs.
    ///
    /// The physics stream is derived from the master seed so other seeded
    /// subsystems (e.g. reporting jitter) don't perturb trajectories.
    pub fn new(kernel: PhysicsKernel, seed: u64) -> Self {
        let physics_seed = seed.wrapping_mul(0x9e3779b97f4a7c15);
        let mut rng = ChaCha8Rng::seed_from_u64(physics_seed);
        let run_id = rng.gen_range(10_000..=99_999);

        Self {
            kernel,
            bodies: Vec::new(),
            center: Vector2::new(CENTER_COORD, CENTER_COORD),
            epoch: 0,
            total_steps: 0,
            run_id,
            tallies: Tallies::default(),
            history: Vec::new(),
            rng,
        }
    }

    /// The star. Valid once the engine is seeded or restored.
    pub fn star(&self) -> &Body {
        &self.bodies[0]
    }

    fn star_view(&self) -> StarView {
        let star = &self.bodies[0];
        StarView {
            position: star.position,
            mass: star.mass,
            temp: star.temp,
        }
    }

    /// Number of active bodies, star included.
    pub fn active_count(&self) -> usize {
        self.bodies.iter().filter(|b| b.is_active).count()
    }

    /// Seeds the star plus `n` orbiting bodies on randomized near-circular
    /// orbits, with a slight global spin.
    pub fn big_bang(&mut self, n: usize) {
        self.bodies.clear();
        let center = self.center;

        let mut sun = Body::new(center, STAR_SEED_MASS, 5.0, 5500.0, &self.kernel, &mut self.rng);
        sun.is_star = true;
        self.bodies.push(sun);

        for _ in 0..n {
            let dist = self.rng.gen_range(400.0..2200.0);
            let angle = self.rng.gen_range(0.0..TAU);
            let radial = Vector2::new(angle.cos(), angle.sin());
            let tangent = Vector2::new(-angle.sin(), angle.cos());
            let position = center + radial * dist;

            let mass = self.rng.gen_range(5.0..30.0);
            let spin = self.rng.gen_range(1.0..10.0);
            let est = self.kernel.equilibrium_temp(5500.0, dist);
            let temp = est * self.rng.gen_range(0.5..1.5);

            let mut body = Body::new(position, mass, spin, temp, &self.kernel, &mut self.rng);
            body.birth_dist = dist;

            let v_orb = (self.kernel.g_const * STAR_SEED_MASS / dist).sqrt();
            let jitter = Vector2::new(
                self.rng.gen_range(-0.15..0.15),
                self.rng.gen_range(-0.15..0.15),
            );
            body.velocity = tangent * v_orb + jitter;
            body.velocity += tangent * v_orb * self.kernel.universe_spin;

            self.bodies.push(body);
        }
    }

    /// Spawns external bodies near the buffer start, aimed inward, when the
    /// cumulative step counter hits the injection cadence.
    fn inject_external_energy(&mut self) {
        let interval = self.kernel.energy_inject_interval;
        if interval == 0 || self.total_steps % interval != 0 {
            return;
        }
        let center = self.center;
        let spawn_dist = self.kernel.universe_radius * self.kernel.boundary_start * 0.95;

        for _ in 0..self.kernel.energy_inject_count {
            let angle = self.rng.gen_range(0.0..TAU);
            let radial = Vector2::new(angle.cos(), angle.sin());
            let tangent = Vector2::new(-angle.sin(), angle.cos());
            let position = center + radial * spawn_dist;

            let mass = self.rng.gen_range(3.0..12.0);
            let spin = self.rng.gen_range(1.0..8.0);
            let temp = self.rng.gen_range(50.0..250.0);

            let mut body = Body::new(position, mass, spin, temp, &self.kernel, &mut self.rng);
            body.birth_dist = spawn_dist;
            body.origin = Origin::Injected;

            let inward_speed = self.rng.gen_range(1.5..3.0);
            let tangential = inward_speed * self.rng.gen_range(0.3..0.8);
            body.velocity = -radial * inward_speed + tangent * tangential;

            self.bodies.push(body);
            self.tallies.injected_mass += mass;
            self.tallies.injected_count += 1;
        }
    }

    /// Advances the world by `steps` discrete steps, then records the epoch.
    pub fn run_epoch(&mut self, steps: u64) {
        let center = self.center;

        for step in 0..steps {
            self.inject_external_energy();
            self.total_steps += 1;

            let mut grid = SpatialGrid::new(CELL_SIZE);
            let mut effects = MembraneEffects::new();

            // The star updates first so every other body sees its state
            // for this step through one consistent view.
            let self_view = self.star_view();
            self.bodies[0].update_thermodynamics(&self_view, &self.kernel);
            self.bodies[0].advance(&self.kernel);
            grid.insert(0, self.bodies[0].position);
            let star = self.star_view();

            // Fragments spawned by the membrane land in `effects` and are
            // appended after this loop: never processed in their birth step.
            let count = self.bodies.len();
            for idx in 1..count {
                let body = &mut self.bodies[idx];
                if !body.is_active {
                    continue;
                }
                body.update_thermodynamics(&star, &self.kernel);
                body.advance(&self.kernel);
                membrane::apply(body, center, &self.kernel, &mut self.rng, &mut effects);
                if !body.is_active {
                    continue;
                }
                grid.insert(idx, body.position);

                // Two-body gravity toward the star, softened
                let to_star = star.position - body.position;
                let dist_sq = to_star.norm_squared() + 100.0;
                let dist = dist_sq.sqrt();
                let force = (self.kernel.g_const * star.mass * body.mass) / dist_sq;
                body.velocity += to_star / dist * (force / body.mass);
            }

            // Merge resolution within crowded cells
            for cell in grid.crowded_cells() {
                for i in 0..cell.len() {
                    for j in (i + 1)..cell.len() {
                        let (a, b) = (cell[i], cell[j]);
                        if !self.bodies[a].is_active || !self.bodies[b].is_active {
                            continue;
                        }
                        let separation =
                            (self.bodies[a].position - self.bodies[b].position).norm();
                        let reach =
                            (self.bodies[a].radius + self.bodies[b].radius) * MERGE_RADIUS_FACTOR;
                        if separation < reach {
                            self.merge_pair(a, b);
                        }
                    }
                }
            }

            // The star never drifts: re-anchor with zero velocity.
            self.bodies[0].position = center;
            self.bodies[0].velocity = Vector2::zeros();

            self.tallies.boundary_events += effects.boundary_events;
            self.tallies.recycled_mass += effects.recycled_mass;
            self.tallies.recycled_count += effects.recycled_count;
            self.bodies.extend(effects.fragments);

            // Compaction bounds memory; correctness never depends on it.
            if step % GC_INTERVAL == 0 {
                self.bodies.retain(|b| b.is_active);
            }
        }

        let star_mass = self.bodies[0].mass;
        self.tallies.absorbed_by_star = star_mass - STAR_SEED_MASS;

        let snapshot = self.collect_snapshot();
        self.history.push(EpochRecord {
            epoch: self.epoch,
            snapshot,
            star_mass: round1(star_mass),
            total_steps: self.total_steps,
        });
        if self.history.len() > HISTORY_RETENTION {
            let excess = self.history.len() - HISTORY_RETENTION;
            self.history.drain(0..excess);
        }

        self.epoch += 1;
    }

    /// Merges a candidate pair. Idempotent against repeats within a pass:
    /// the activation check makes a second call a no-op.
    fn merge_pair(&mut self, a: usize, b: usize) {
        if !self.bodies[a].is_active || !self.bodies[b].is_active {
            return;
        }
        self.tallies.merge_events += 1;

        // The star absorbs unconditionally; its own thermodynamics dominate.
        if self.bodies[a].is_star || self.bodies[b].is_star {
            let (star, food) = if self.bodies[a].is_star { (a, b) } else { (b, a) };
            let gained = self.bodies[food].mass;
            self.bodies[food].is_active = false;
            self.bodies[star].mass += gained;
            self.bodies[star].radius =
                self.kernel.radius(self.bodies[star].mass, self.bodies[star].spin);
            return;
        }

        let (w, l) = if self.bodies[a].mass > self.bodies[b].mass {
            (a, b)
        } else {
            (b, a)
        };
        let exothermic_bonus = self.rng.gen_range(50.0..200.0);
        let (winner, loser) = pair_mut(&mut self.bodies, w, l);

        let total = winner.mass + loser.mass;
        winner.velocity = (winner.velocity * winner.mass + loser.velocity * loser.mass) / total;
        winner.temp =
            (winner.temp * winner.mass + loser.temp * loser.mass) / total + exothermic_bonus;
        winner.spin = (winner.spin * winner.mass + loser.spin * loser.mass) / total;
        winner.composition.absorb(&loser.composition);
        winner.mass = total;
        winner.radius = self.kernel.radius(winner.mass, winner.spin);
        winner.boundary_hits = winner.boundary_hits.max(loser.boundary_hits);
        winner.tidal_damage = winner.tidal_damage.max(loser.tidal_damage) * 0.7;
        winner.shred_immunity = winner.shred_immunity.max(loser.shred_immunity);
        loser.is_active = false;
    }

    /// Collects the current diagnostic snapshot. Pure read.
    pub fn collect_snapshot(&self) -> Snapshot {
        snapshot::collect(&self.bodies, &self.kernel)
    }
}

/// Disjoint mutable references to two distinct indices.
fn pair_mut(bodies: &mut [Body], a: usize, b: usize) -> (&mut Body, &mut Body) {
    debug_assert_ne!(a, b);
    if a < b {
        let (lo, hi) = bodies.split_at_mut(b);
        (&mut lo[a], &mut hi[0])
    } else {
        let (lo, hi) = bodies.split_at_mut(a);
        (&mut hi[0], &mut lo[b])
    }
}
