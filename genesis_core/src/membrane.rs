//! The black-hole boundary membrane.
//!
//! Converts the unbounded domain into an effectively closed one without a
//! hard wall: bodies that wander outward slow down (time dilation), cool
//! (redshift) and accumulate tidal damage until the membrane shreds them
//! into inward-moving fragments, recycling their mass.
//!
//! Fragments spawned here go into a [`MembraneEffects`] buffer and are only
//! merged into the engine's collection at the end of the step, so a fragment
//! is never processed in the step that created it.

use crate::body::{Body, Origin};
use crate::physics::PhysicsKernel;
use nalgebra::Vector2;
use rand::Rng;
use std::f64::consts::TAU;

/// Immunity granted to freshly spawned fragments, in steps.
pub const FRAGMENT_IMMUNITY_STEPS: u32 = 60;

/// Tidal damage recovered per step in normal space.
const DAMAGE_RECOVERY: f64 = 0.005;

/// Depth into the buffer zone is capped just short of 1.
const MAX_DEPTH: f64 = 0.99;

/// Velocity loss factor at full depth.
const TIME_DILATION: f64 = 0.8;

/// Temperature loss factor at full depth.
const REDSHIFT: f64 = 0.15;

/// Tidal damage accrued per step at full depth.
const DAMAGE_RATE: f64 = 0.02;

/// Minimum damage before the shred zone acts.
const SHRED_DAMAGE_GATE: f64 = 0.3;

/// Damage above which shredding is complete rather than partial.
const COMPLETE_SHRED_DAMAGE: f64 = 0.8;

/// Mass below which shredding is always complete.
const COMPLETE_SHRED_MASS: f64 = 5.0;

/// Hard clamp triggers beyond this fraction of R...
const HARD_CLAMP_AT: f64 = 0.98;

/// ...and projects the body back to this fraction of R.
const HARD_CLAMP_TO: f64 = 0.97;

/// Velocity retained after a hard clamp.
const CLAMP_VELOCITY_DAMP: f64 = 0.05;

/// Side effects of one membrane pass, applied to the engine afterwards.
#[derive(Debug, Default)]
pub struct MembraneEffects {
    /// Fragments to append after the step's update phase
    pub fragments: Vec<Body>,

    /// Shred-zone entries (global boundary-event counter delta)
    pub boundary_events: u64,

    /// Mass transferred into fragments
    pub recycled_mass: f64,

    /// Fragments spawned
    pub recycled_count: u64,
}

impl MembraneEffects {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Runs the membrane state machine for one body for one step.
///
/// States: IMMUNE (countdown, hard clamp only), NORMAL (damage decays),
/// BUFFERED (dilation + redshift + damage accrual), SHREDDING (transient).
/// The hard clamp applies orthogonally in every non-immune state.
pub fn apply(
    body: &mut Body,
    center: Vector2<f64>,
    kernel: &PhysicsKernel,
    rng: &mut impl Rng,
    effects: &mut MembraneEffects,
) {
    let offset = body.position - center;
    let dist = offset.norm();
    let r = kernel.universe_radius;

    // Immunity: countdown, hard boundary check only
    if body.shred_immunity > 0 {
        body.shred_immunity -= 1;
        body.in_buffer_zone = false;
        hard_clamp(body, center, offset, dist, r);
        return;
    }

    let buf_start = r * kernel.boundary_start;
    let shred_zone = r * kernel.tidal_shred_threshold;

    body.in_buffer_zone = false;

    if dist <= buf_start {
        // Normal space: tidal damage recovers
        if body.tidal_damage > 0.0 {
            body.tidal_damage = (body.tidal_damage - DAMAGE_RECOVERY).max(0.0);
        }
        return;
    }

    // ---- buffer zone ----
    body.in_buffer_zone = true;
    let depth = ((dist - buf_start) / (r - buf_start)).min(MAX_DEPTH);

    // Time dilation: the deeper in, the slower
    body.velocity *= 1.0 - depth * TIME_DILATION;

    // Gravitational redshift: temperature drops
    body.temp *= 1.0 - depth * REDSHIFT;

    // Tidal damage accrues
    body.tidal_damage = (body.tidal_damage + depth * DAMAGE_RATE).min(1.0);

    // ---- shred zone ----
    if dist > shred_zone && body.tidal_damage > SHRED_DAMAGE_GATE {
        body.boundary_hits += 1;
        effects.boundary_events += 1;

        if body.tidal_damage > COMPLETE_SHRED_DAMAGE || body.mass < COMPLETE_SHRED_MASS {
            shred_complete(body, center, kernel, rng, effects);
        } else {
            shred_partial(body, center, kernel, rng, effects);
        }
    }

    hard_clamp(body, center, offset, dist, r);
}

/// Projects a body beyond 0.98R back to 0.97R and damps its velocity.
fn hard_clamp(body: &mut Body, center: Vector2<f64>, offset: Vector2<f64>, dist: f64, r: f64) {
    if dist > r * HARD_CLAMP_AT {
        let normal = offset / dist;
        body.position = center + normal * r * HARD_CLAMP_TO;
        body.velocity *= CLAMP_VELOCITY_DAMP;
    }
}

/// Partial shred: lose 20-40% of mass scaled by tidal damage, spawn 1-2
/// fragments carrying the lost mass, halve the remaining damage.
fn shred_partial(
    body: &mut Body,
    center: Vector2<f64>,
    kernel: &PhysicsKernel,
    rng: &mut impl Rng,
    effects: &mut MembraneEffects,
) {
    let loss_pct = rng.gen_range(0.2..0.4) * body.tidal_damage;
    let lost_mass = body.mass * loss_pct;
    body.mass -= lost_mass;
    body.radius = kernel.radius(body.mass, body.spin);
    body.composition.scale(1.0 - loss_pct);

    let n_frags = rng.gen_range(1..=2u32);
    for _ in 0..n_frags {
        let frag_mass = lost_mass / n_frags as f64;
        if frag_mass < 1.0 {
            continue;
        }
        spawn_fragment(
            body, center, kernel, rng, effects, frag_mass, 20.0, body.temp * 1.5, 2.0, 5.0, 0.5,
        );
    }

    body.tidal_damage *= 0.5;
}

/// Complete shred: the whole body becomes 2-4 fragments and deactivates.
fn shred_complete(
    body: &mut Body,
    center: Vector2<f64>,
    kernel: &PhysicsKernel,
    rng: &mut impl Rng,
    effects: &mut MembraneEffects,
) {
    let n_frags = rng.gen_range(2..=4u32);
    let frag_mass = body.mass / n_frags as f64;
    for _ in 0..n_frags {
        if frag_mass < 0.5 {
            continue;
        }
        spawn_fragment(
            body, center, kernel, rng, effects, frag_mass, 30.0, body.temp * 2.0, 3.0, 6.0, 1.0,
        );
    }

    body.is_active = false;
}

/// Places one fragment at a random angle around its parent, aimed inward
/// with tangential jitter, immune for [`FRAGMENT_IMMUNITY_STEPS`].
#[allow(clippy::too_many_arguments)]
fn spawn_fragment(
    parent: &Body,
    center: Vector2<f64>,
    kernel: &PhysicsKernel,
    rng: &mut impl Rng,
    effects: &mut MembraneEffects,
    mass: f64,
    offset_dist: f64,
    temp: f64,
    speed_min: f64,
    speed_max: f64,
    jitter: f64,
) {
    let angle = rng.gen_range(0.0..TAU);
    let position = parent.position + Vector2::new(angle.cos(), angle.sin()) * offset_dist;

    let spin = rng.gen_range(1.0..5.0);
    let mut frag = Body::new(position, mass, spin, temp, kernel, rng);
    frag.origin = Origin::Recycled;
    frag.birth_dist = (position - center).norm();
    frag.shred_immunity = FRAGMENT_IMMUNITY_STEPS;

    let inward = center - position;
    let inward_dist = inward.norm();
    if inward_dist > 0.0 {
        let speed = rng.gen_range(speed_min..speed_max);
        frag.velocity = inward / inward_dist * speed
            + Vector2::new(rng.gen_range(-jitter..jitter), rng.gen_range(-jitter..jitter));
    }

    effects.recycled_mass += mass;
    effects.recycled_count += 1;
    effects.fragments.push(frag);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn center() -> Vector2<f64> {
        Vector2::new(5000.0, 5000.0)
    }

    fn body_at_dist(dist: f64, mass: f64) -> (Body, PhysicsKernel, ChaCha8Rng) {
        let kernel = PhysicsKernel::default();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let position = center() + Vector2::new(dist, 0.0);
        let body = Body::new(position, mass, 2.0, 300.0, &kernel, &mut rng);
        (body, kernel, rng)
    }

    #[test]
    fn test_normal_space_recovers_damage() {
        let (mut body, kernel, mut rng) = body_at_dist(500.0, 20.0);
        body.tidal_damage = 0.5;

        let mut effects = MembraneEffects::new();
        apply(&mut body, center(), &kernel, &mut rng, &mut effects);

        assert!((body.tidal_damage - 0.495).abs() < 1e-12);
        assert!(!body.in_buffer_zone);
        assert!(effects.fragments.is_empty());
    }

    #[test]
    fn test_buffer_zone_damage_is_monotonic() {
        // Between buffer start (0.78R) and shred zone (0.95R): damage only grows
        let (mut body, kernel, mut rng) = body_at_dist(2400.0, 50.0);
        let hold = body.position;

        let mut last = 0.0;
        for _ in 0..200 {
            let mut effects = MembraneEffects::new();
            apply(&mut body, center(), &kernel, &mut rng, &mut effects);
            assert!(body.tidal_damage >= last);
            assert!(body.tidal_damage <= 1.0);
            last = body.tidal_damage;
            body.position = hold;
        }
        assert!(last > 0.0);
    }

    #[test]
    fn test_buffer_zone_dilates_and_redshifts() {
        let (mut body, kernel, mut rng) = body_at_dist(2400.0, 50.0);
        body.velocity = Vector2::new(4.0, 0.0);
        body.temp = 400.0;

        let mut effects = MembraneEffects::new();
        apply(&mut body, center(), &kernel, &mut rng, &mut effects);

        assert!(body.in_buffer_zone);
        assert!(body.velocity.norm() < 4.0);
        assert!(body.temp < 400.0);
    }

    #[test]
    fn test_complete_shred_of_small_damaged_body() {
        // Deep in the shred zone, heavily damaged, under the mass floor:
        // the complete-shred branch must fire
        let (mut body, kernel, mut rng) = body_at_dist(0.99 * 2800.0, 3.0);
        body.tidal_damage = 0.9;

        let mut effects = MembraneEffects::new();
        apply(&mut body, center(), &kernel, &mut rng, &mut effects);

        assert!(!body.is_active);
        assert!(effects.fragments.len() >= 2 && effects.fragments.len() <= 4);
        assert_eq!(effects.boundary_events, 1);
        assert_eq!(body.boundary_hits, 1);
        for frag in &effects.fragments {
            assert_eq!(frag.origin, Origin::Recycled);
            assert_eq!(frag.shred_immunity, FRAGMENT_IMMUNITY_STEPS);
            assert!(frag.is_active);
        }
        // All of the pre-shred mass went into fragments
        let frag_mass: f64 = effects.fragments.iter().map(|f| f.mass).sum();
        assert!((frag_mass - effects.recycled_mass).abs() < 1e-9);
    }

    #[test]
    fn test_partial_shred_keeps_a_remnant() {
        let (mut body, kernel, mut rng) = body_at_dist(0.96 * 2800.0, 100.0);
        body.tidal_damage = 0.5;
        let mass_before = body.mass;

        let mut effects = MembraneEffects::new();
        apply(&mut body, center(), &kernel, &mut rng, &mut effects);

        assert!(body.is_active);
        assert!(body.mass < mass_before);
        assert!(body.mass > mass_before * 0.5);
        assert!(!effects.fragments.is_empty() && effects.fragments.len() <= 2);
        // Remnant damage is halved after the accrual for this step
        assert!(body.tidal_damage < 0.5);
        // Composition shrank with the mass
        assert!((body.composition.total() - body.mass).abs() < 1e-6);
        assert_eq!(body.radius, kernel.radius(body.mass, body.spin));
    }

    #[test]
    fn test_immunity_applies_only_hard_clamp() {
        let (mut body, kernel, mut rng) = body_at_dist(0.99 * 2800.0, 3.0);
        body.shred_immunity = 5;
        body.tidal_damage = 0.9;
        body.velocity = Vector2::new(2.0, 0.0);

        let mut effects = MembraneEffects::new();
        apply(&mut body, center(), &kernel, &mut rng, &mut effects);

        // No shred, no damage accrual, countdown decremented
        assert!(body.is_active);
        assert_eq!(body.shred_immunity, 4);
        assert_eq!(body.tidal_damage, 0.9);
        assert!(effects.fragments.is_empty());
        // Hard clamp projected back to 0.97R with damped velocity
        let dist = (body.position - center()).norm();
        assert!((dist - 0.97 * 2800.0).abs() < 1e-6);
        assert!((body.velocity.x - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_hard_clamp_in_buffered_state() {
        let (mut body, kernel, mut rng) = body_at_dist(0.99 * 2800.0, 50.0);
        // No damage yet, so the shred gate stays closed this step
        let mut effects = MembraneEffects::new();
        apply(&mut body, center(), &kernel, &mut rng, &mut effects);

        let dist = (body.position - center()).norm();
        assert!((dist - 0.97 * 2800.0).abs() < 1e-6);
        assert!(body.is_active);
    }
}
