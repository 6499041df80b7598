//! Planetary geophysics: atmosphere synthesis, habitability analysis and
//! body classification for the reporting layer.
//!
//! These are observational models layered on top of the engine state. They
//! draw from their own random stream so report generation never perturbs
//! the physics trajectory.

use genesis_core::{Body, Origin, StarView};
use rand::Rng;
use serde::Serialize;
use std::collections::BTreeMap;

/// Synthesized atmosphere: surface pressure plus a normalized composition.
#[derive(Debug, Clone, Serialize)]
pub struct Atmosphere {
    pub pressure: f64,
    pub composition: BTreeMap<&'static str, f64>,
}

/// Surface water phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WaterState {
    Sublimation,
    Ice,
    Gas,
    Liquid,
}

/// Dominant biome classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Biome {
    Barren,
    Snowball,
    Scorched,
    Desert,
    Arid,
    Gaia,
    Ocean,
}

/// Habitability verdict for one body.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Habitability {
    pub state: WaterState,
    pub biome: Biome,
    /// Estimated surface water coverage, percent
    pub water: f64,
}

/// Mass-band classification codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BodyClass {
    /// Star
    S,
    /// Brown dwarf, mass > 300
    BD,
    /// Gas giant, mass > 80
    GG,
    /// Ice giant, mass > 30
    IG,
    /// Rocky planet, mass > 10
    RP,
    /// Dwarf planet
    DP,
}

impl BodyClass {
    /// Wire code used by report histograms.
    pub fn as_str(&self) -> &'static str {
        match self {
            BodyClass::S => "S",
            BodyClass::BD => "BD",
            BodyClass::GG => "GG",
            BodyClass::IG => "IG",
            BodyClass::RP => "RP",
            BodyClass::DP => "DP",
        }
    }
}

/// Classifies a body by mass band.
pub fn classify(mass: f64, is_star: bool) -> BodyClass {
    if is_star {
        BodyClass::S
    } else if mass > 300.0 {
        BodyClass::BD
    } else if mass > 80.0 {
        BodyClass::GG
    } else if mass > 30.0 {
        BodyClass::IG
    } else if mass > 10.0 {
        BodyClass::RP
    } else {
        BodyClass::DP
    }
}

/// Counts active non-star bodies per mass-band class. Absent classes are
/// omitted rather than reported as zero.
pub fn class_histogram(bodies: &[Body]) -> BTreeMap<&'static str, usize> {
    let mut counts = BTreeMap::new();
    for body in bodies.iter().filter(|b| b.is_active && !b.is_star) {
        *counts
            .entry(classify(body.mass, body.is_star).as_str())
            .or_insert(0) += 1;
    }
    counts
}

/// Synthesizes an atmosphere from mass and temperature.
///
/// Gravity retention scales with mass above a floor of 8; thermal escape
/// reduces retention linearly with temperature up to 1500 degrees. Thin
/// atmospheres are CO2-dominated, thick ones are primordial H2/He, and the
/// middle band is an N2/CO2/O2 mix with O2 only in the temperate range.
pub fn calculate_atmosphere(mass: f64, temp: f64, rng: &mut impl Rng) -> Atmosphere {
    let gravity_hold = (mass - 8.0).max(0.0) / 12.0;
    let thermal_escape = (1.0 - temp / 1500.0).max(0.1);
    let pressure = gravity_hold * thermal_escape * rng.gen_range(0.6..1.4);

    let composition = if pressure < 0.1 {
        BTreeMap::from([("CO2", 0.95), ("N2", 0.05)])
    } else if pressure > 5.0 {
        BTreeMap::from([("H2", 0.6), ("He", 0.3), ("Ar", 0.1)])
    } else {
        let n2 = rng.gen_range(0.7..0.8);
        let co2 = rng.gen_range(0.01..0.1);
        let o2 = if temp > -5.0 && temp < 60.0 {
            rng.gen_range(0.05..0.25)
        } else {
            0.0
        };
        let total = n2 + co2 + o2;
        BTreeMap::from([
            ("N2", round3(n2 / total)),
            ("CO2", round3(co2 / total)),
            ("O2", round3(o2 / total)),
        ])
    };

    Atmosphere {
        pressure: round3(pressure),
        composition,
    }
}

/// Analyzes surface water phase and biome.
///
/// Water potential derives from the volatile mass fraction; the boiling
/// point rises with pressure (capped at 65 degrees for phase purposes).
pub fn analyze_habitability(
    temp: f64,
    pressure: f64,
    mass: f64,
    volatiles: f64,
    rng: &mut impl Rng,
) -> Habitability {
    let water_potential = if mass > 0.0 {
        volatiles / mass * 3.0
    } else {
        0.0
    };
    let water = (water_potential * 100.0 * rng.gen_range(0.8..1.2)).min(100.0);
    let boiling_point = if pressure < 0.06 {
        -100.0
    } else {
        100.0 * pressure.powf(0.15)
    };

    let (state, biome) = if pressure < 0.2 {
        (WaterState::Sublimation, Biome::Barren)
    } else if temp < 0.0 {
        (WaterState::Ice, Biome::Snowball)
    } else if temp > boiling_point.min(65.0) {
        (WaterState::Gas, Biome::Scorched)
    } else {
        let biome = if water < 20.0 {
            Biome::Desert
        } else if water < 50.0 {
            Biome::Arid
        } else if water < 80.0 {
            Biome::Gaia
        } else {
            Biome::Ocean
        };
        (WaterState::Liquid, biome)
    };

    Habitability {
        state,
        biome,
        water: round1(water),
    }
}

/// A compact per-planet record for habitability reports.
#[derive(Debug, Clone, Serialize)]
pub struct PlanetRecord {
    pub id: u32,
    pub tp: BodyClass,
    pub m: f64,
    pub d: f64,
    pub t: f64,
    pub p: f64,
    pub a: BTreeMap<&'static str, f64>,
    pub w: f64,
    pub ws: WaterState,
    pub bi: Biome,
    pub tl: f64,
    pub og: Origin,
    pub bh: u64,
    pub td: f64,
    pub ep: u64,
}

/// Extracts the compact planet record for one body.
pub fn compact_planet(
    body: &Body,
    star: &StarView,
    epoch: u64,
    rng: &mut impl Rng,
) -> PlanetRecord {
    let dist = body.distance_to(star.position);
    let atmosphere = calculate_atmosphere(body.mass, body.temp, rng);
    let hab = analyze_habitability(
        body.temp,
        atmosphere.pressure,
        body.mass,
        body.composition.vo,
        rng,
    );
    PlanetRecord {
        id: body.id,
        tp: classify(body.mass, body.is_star),
        m: round1(body.mass),
        d: dist.round(),
        t: round1(body.temp),
        p: atmosphere.pressure,
        a: atmosphere.composition,
        w: hab.water,
        ws: hab.state,
        bi: hab.biome,
        tl: round1(body.axial_tilt),
        og: body.origin,
        bh: body.boundary_hits,
        td: round2(body.tidal_damage),
        ep: epoch,
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}
