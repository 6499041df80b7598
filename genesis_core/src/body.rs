//! Celestial body state and local physics.

use crate::physics::PhysicsKernel;
use nalgebra::Vector2;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Provenance of a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Seeded at big-bang initialization
    BigBang,

    /// Spawned by periodic external energy injection
    Injected,

    /// Fragment recycled by the boundary membrane
    Recycled,
}

impl Origin {
    /// Wire name used by the compact record schema.
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::BigBang => "bigbang",
            Origin::Injected => "injected",
            Origin::Recycled => "recycled",
        }
    }

    /// Parses a wire name, defaulting to `bigbang` for unknown tags.
    pub fn from_str_or_default(s: &str) -> Self {
        match s {
            "injected" => Origin::Injected,
            "recycled" => Origin::Recycled,
            _ => Origin::BigBang,
        }
    }
}

/// Material composition. The key set is closed (iron, silicates, volatiles),
/// so this is a fixed-shape record rather than a map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Composition {
    pub fe: f64,
    pub si: f64,
    pub vo: f64,
}

impl Composition {
    /// Standard split for a newly formed body of the given mass.
    pub fn from_mass(mass: f64) -> Self {
        Self {
            fe: mass * 0.3,
            si: mass * 0.4,
            vo: mass * 0.3,
        }
    }

    /// Scales every component uniformly (mass loss on partial shredding).
    pub fn scale(&mut self, factor: f64) {
        self.fe *= factor;
        self.si *= factor;
        self.vo *= factor;
    }

    /// Absorbs another body's material (merge).
    pub fn absorb(&mut self, other: &Composition) {
        self.fe += other.fe;
        self.si += other.si;
        self.vo += other.vo;
    }

    pub fn total(&self) -> f64 {
        self.fe + self.si + self.vo
    }
}

/// A read-only view of the star, captured once per step so every body in the
/// update phase sees the same stellar state.
#[derive(Debug, Clone, Copy)]
pub struct StarView {
    pub position: Vector2<f64>,
    pub mass: f64,
    pub temp: f64,
}

/// Mutable state of one celestial object.
#[derive(Debug, Clone)]
pub struct Body {
    /// Identity (random 6-digit id, stable across save/restore)
    pub id: u32,

    /// Position in universe coordinates
    pub position: Vector2<f64>,

    /// Velocity, bounded only by the relativistic clamp
    pub velocity: Vector2<f64>,

    pub mass: f64,
    pub spin: f64,
    pub temp: f64,

    /// Derived from mass and spin; never mutated independently
    pub radius: f64,

    pub composition: Composition,
    pub axial_tilt: f64,

    pub is_star: bool,

    /// False once merged away or fully shredded. Inactive bodies are
    /// logically deleted and never mutated again.
    pub is_active: bool,

    /// Radial distance from center at creation
    pub birth_dist: f64,

    /// Times this body crossed into the shred zone
    pub boundary_hits: u64,

    pub origin: Origin,

    /// Transient flag, recomputed every step; not persisted
    pub in_buffer_zone: bool,

    /// Accumulated membrane stress in [0, 1]
    pub tidal_damage: f64,

    /// Post-fragment countdown; while > 0 only the hard clamp applies
    pub shred_immunity: u32,
}

/// Temperature floor (absolute zero in the simulation's degree unit).
pub const TEMP_FLOOR: f64 = -273.15;

impl Body {
    /// Creates a new body with a fresh random identity and axial tilt.
    pub fn new(
        position: Vector2<f64>,
        mass: f64,
        spin: f64,
        temp: f64,
        kernel: &PhysicsKernel,
        rng: &mut impl Rng,
    ) -> Self {
        Self {
            id: rng.gen_range(100_000..=999_999),
            position,
            velocity: Vector2::zeros(),
            mass,
            spin,
            temp,
            radius: kernel.radius(mass, spin),
            composition: Composition::from_mass(mass),
            axial_tilt: rng.gen_range(0.0..30.0),
            is_star: false,
            is_active: true,
            birth_dist: 0.0,
            boundary_hits: 0,
            origin: Origin::BigBang,
            in_buffer_zone: false,
            tidal_damage: 0.0,
            shred_immunity: 0,
        }
    }

    /// Distance from this body to a point.
    pub fn distance_to(&self, point: Vector2<f64>) -> f64 {
        (self.position - point).norm()
    }

    /// One thermodynamic update.
    ///
    /// The star self-heats toward `5500 + mass * 0.1` by exponential smoothing
    /// and burns a fixed mass fraction per step. Non-stars radiate toward the
    /// star's flux at their current distance, floored at absolute zero.
    pub fn update_thermodynamics(&mut self, star: &StarView, kernel: &PhysicsKernel) {
        if !self.is_active {
            return;
        }
        if self.is_star {
            let target = 5500.0 + self.mass * 0.1;
            self.temp = self.temp * 0.9 + target * 0.1;
            self.mass -= self.mass * 0.00001;
            self.radius = kernel.radius(self.mass, self.spin);
            return;
        }
        let offset = self.position - star.position;
        let dist_sq = offset.norm_squared() + 1.0;
        let flux_in = (star.temp * kernel.solar_constant) / dist_sq;
        self.temp = self.temp * kernel.cooling_rate + flux_in;
        if self.temp < TEMP_FLOOR {
            self.temp = TEMP_FLOOR;
        }
        self.radius = kernel.radius(self.mass, self.spin);
    }

    /// Clamps velocity relativistically, then integrates one unit time step.
    pub fn advance(&mut self, kernel: &PhysicsKernel) {
        self.velocity = kernel.clamp_relativistic(self.velocity);
        self.position += self.velocity;
    }

    /// Kinetic energy `0.5 * m * |v|^2`.
    pub fn kinetic_energy(&self) -> f64 {
        0.5 * self.mass * self.velocity.norm_squared()
    }

    /// Gravitational potential energy relative to the star, with the
    /// distance floored at 1 to avoid a near-zero division.
    pub fn potential_energy(&self, star: &StarView, kernel: &PhysicsKernel) -> f64 {
        let dist = self.distance_to(star.position).max(1.0);
        -kernel.g_const * star.mass * self.mass / dist
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn test_body(mass: f64, spin: f64) -> (Body, PhysicsKernel) {
        let kernel = PhysicsKernel::default();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let body = Body::new(Vector2::new(100.0, 100.0), mass, spin, 300.0, &kernel, &mut rng);
        (body, kernel)
    }

    #[test]
    fn test_new_body_radius_matches_kernel() {
        let (body, kernel) = test_body(25.0, 4.0);
        assert_relative_eq!(body.radius, kernel.radius(25.0, 4.0));
    }

    #[test]
    fn test_composition_sums_to_mass() {
        let (body, _) = test_body(20.0, 1.0);
        assert_relative_eq!(body.composition.total(), 20.0, epsilon = 1e-9);
    }

    #[test]
    fn test_star_thermodynamics_self_heats_and_burns_fuel() {
        let (mut body, kernel) = test_body(6000.0, 5.0);
        body.is_star = true;
        body.temp = 5500.0;

        let view = StarView {
            position: body.position,
            mass: body.mass,
            temp: body.temp,
        };
        body.update_thermodynamics(&view, &kernel);

        // Drifts toward 5500 + 600 = 6100 by the 0.9/0.1 blend
        assert_relative_eq!(body.temp, 5500.0 * 0.9 + 6100.0 * 0.1, epsilon = 1e-6);
        assert!(body.mass < 6000.0);
        assert_relative_eq!(body.radius, kernel.radius(body.mass, body.spin));
    }

    #[test]
    fn test_thermodynamics_floors_at_absolute_zero() {
        let (mut body, kernel) = test_body(10.0, 1.0);
        body.temp = -273.0;
        body.position = Vector2::new(1e6, 1e6); // Effectively no flux

        let star = StarView {
            position: Vector2::new(5000.0, 5000.0),
            mass: 6000.0,
            temp: 5500.0,
        };
        for _ in 0..100 {
            body.update_thermodynamics(&star, &kernel);
        }

        assert!(body.temp >= TEMP_FLOOR);
    }

    #[test]
    fn test_advance_clamps_then_moves() {
        let (mut body, kernel) = test_body(10.0, 1.0);
        body.position = Vector2::zeros();
        body.velocity = Vector2::new(300.0, 0.0);

        body.advance(&kernel);

        // Clamped to c_speed before the position integration
        assert_relative_eq!(body.position.x, kernel.c_speed);
        assert_relative_eq!(body.velocity.norm(), kernel.c_speed);
    }

    #[test]
    fn test_inactive_body_skips_thermodynamics() {
        let (mut body, kernel) = test_body(10.0, 1.0);
        body.is_active = false;
        let before = body.temp;

        let star = StarView {
            position: Vector2::new(5000.0, 5000.0),
            mass: 6000.0,
            temp: 5500.0,
        };
        body.update_thermodynamics(&star, &kernel);

        assert_eq!(body.temp, before);
    }

    #[test]
    fn test_bound_body_has_negative_total_energy() {
        let (mut body, kernel) = test_body(10.0, 1.0);
        body.position = Vector2::new(5500.0, 5000.0);
        body.velocity = Vector2::new(0.0, 1.0);

        let star = StarView {
            position: Vector2::new(5000.0, 5000.0),
            mass: 6000.0,
            temp: 5500.0,
        };
        let total = body.kinetic_energy() + body.potential_energy(&star, &kernel);
        assert!(total < 0.0);
    }

    #[test]
    fn test_origin_wire_names() {
        assert_eq!(Origin::BigBang.as_str(), "bigbang");
        assert_eq!(Origin::from_str_or_default("recycled"), Origin::Recycled);
        assert_eq!(Origin::from_str_or_default("garbage"), Origin::BigBang);
    }
}
