//! The physical constants set.
//!
//! [`PhysicsKernel`] is an explicit configuration struct passed by reference
//! into engine construction. There is no process-wide mutable state, so
//! multiple universes can run side by side with different regimes.

use nalgebra::Vector2;
use std::collections::BTreeMap;

/// Immutable-by-default parameter table for one universe.
///
/// The whole regime is exportable/importable as a flat short-key map so a
/// resumed run reproduces exactly the physics of the run that saved it.
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicsKernel {
    /// Gravitational constant
    pub g_const: f64,

    /// Relativistic speed cap (simulation units per step)
    pub c_speed: f64,

    /// Per-step temperature retention factor for non-stars
    pub cooling_rate: f64,

    /// Stellar flux scale
    pub solar_constant: f64,

    /// Universe radius R (the membrane sits inside this)
    pub universe_radius: f64,

    /// Global spin imparted to seeded orbits
    pub universe_spin: f64,

    /// Cumulative-step interval between energy injections
    pub energy_inject_interval: u64,

    /// Bodies spawned per injection event
    pub energy_inject_count: u32,

    /// Buffer zone starts at this fraction of R
    pub boundary_start: f64,

    /// Shred zone starts at this fraction of R
    pub tidal_shred_threshold: f64,
}

impl Default for PhysicsKernel {
    fn default() -> Self {
        Self {
            g_const: 0.8,
            c_speed: 15.0,
            cooling_rate: 0.995,
            solar_constant: 130.0,
            universe_radius: 2800.0,
            universe_spin: 0.0003,
            energy_inject_interval: 80,
            energy_inject_count: 2,
            boundary_start: 0.78,
            tidal_shred_threshold: 0.95,
        }
    }
}

impl PhysicsKernel {
    /// Density as a function of spin. Faster spin means a puffier body.
    pub fn density(&self, spin: f64) -> f64 {
        1.0 / (1.0 + spin * 0.002)
    }

    /// Derived radius. Recomputed whenever mass or spin changes.
    pub fn radius(&self, mass: f64, spin: f64) -> f64 {
        (mass / self.density(spin)).sqrt() * 3.0
    }

    /// Rescales a velocity uniformly to the speed cap when it exceeds it.
    /// Velocities under the cap pass through unchanged.
    pub fn clamp_relativistic(&self, v: Vector2<f64>) -> Vector2<f64> {
        let speed = v.norm();
        if speed > self.c_speed {
            v * (self.c_speed / speed)
        } else {
            v
        }
    }

    /// Equilibrium temperature for a body at `dist` from a star at `star_temp`.
    pub fn equilibrium_temp(&self, star_temp: f64, dist: f64) -> f64 {
        let flux = (star_temp * self.solar_constant) / (dist * dist + 1.0);
        flux / (1.0 - self.cooling_rate)
    }

    /// Exports the regime as a flat short-key map.
    pub fn export_params(&self) -> BTreeMap<String, f64> {
        let mut m = BTreeMap::new();
        m.insert("G".to_string(), self.g_const);
        m.insert("C".to_string(), self.c_speed);
        m.insert("CR".to_string(), self.cooling_rate);
        m.insert("SC".to_string(), self.solar_constant);
        m.insert("UR".to_string(), self.universe_radius);
        m.insert("US".to_string(), self.universe_spin);
        m.insert("EI".to_string(), self.energy_inject_interval as f64);
        m.insert("EC".to_string(), self.energy_inject_count as f64);
        m.insert("BS".to_string(), self.boundary_start);
        m.insert("TS".to_string(), self.tidal_shred_threshold);
        m
    }

    /// Imports a regime exported by [`export_params`](Self::export_params).
    /// Missing keys are ignored and the existing value is retained.
    pub fn import_params(&mut self, params: &BTreeMap<String, f64>) {
        if let Some(&v) = params.get("G") {
            self.g_const = v;
        }
        if let Some(&v) = params.get("C") {
            self.c_speed = v;
        }
        if let Some(&v) = params.get("CR") {
            self.cooling_rate = v;
        }
        if let Some(&v) = params.get("SC") {
            self.solar_constant = v;
        }
        if let Some(&v) = params.get("UR") {
            self.universe_radius = v;
        }
        if let Some(&v) = params.get("US") {
            self.universe_spin = v;
        }
        if let Some(&v) = params.get("EI") {
            self.energy_inject_interval = v as u64;
        }
        if let Some(&v) = params.get("EC") {
            self.energy_inject_count = v as u32;
        }
        if let Some(&v) = params.get("BS") {
            self.boundary_start = v;
        }
        if let Some(&v) = params.get("TS") {
            self.tidal_shred_threshold = v;
        }
    }
}
