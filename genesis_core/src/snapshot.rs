//! Per-epoch diagnostic snapshot.
//!
//! A pure read over the body collection: zone breakdown, lineage counts,
//! binding statistics, angular uniformity and buffer-zone occupancy. The
//! snapshot is what the trailing history stores, so its fields carry the
//! persistence schema's short keys and fixed rounding.

use crate::body::{Body, StarView};
use crate::persist::{round1, round3};
use crate::physics::PhysicsKernel;
use serde::{Deserialize, Serialize};

/// Inner zone ends at this distance from the star.
const INNER_LIMIT: f64 = 700.0;

/// Middle zone ends here; everything beyond is the outer zone.
const MIDDLE_LIMIT: f64 = 1400.0;

/// Number of angular sectors in the uniformity histogram.
pub const ANGULAR_SECTORS: usize = 8;

/// Aggregate statistics for one radial zone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneStats {
    #[serde(rename = "n")]
    pub count: usize,

    /// [min, max] temperature, absent for an empty zone
    #[serde(rename = "t", default, skip_serializing_if = "Option::is_none")]
    pub temp_range: Option<[f64; 2]>,

    /// [min, max] mass, absent for an empty zone
    #[serde(rename = "m", default, skip_serializing_if = "Option::is_none")]
    pub mass_range: Option<[f64; 2]>,

    #[serde(rename = "bh", default)]
    pub boundary_hits: u64,
}

/// The three fixed radial zones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneBreakdown {
    #[serde(rename = "i")]
    pub inner: ZoneStats,

    #[serde(rename = "m")]
    pub middle: ZoneStats,

    #[serde(rename = "o")]
    pub outer: ZoneStats,
}

/// Body counts per lineage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OriginCounts {
    #[serde(rename = "bigbang", default)]
    pub bigbang: usize,

    #[serde(rename = "injected", default)]
    pub injected: usize,

    #[serde(rename = "recycled", default)]
    pub recycled: usize,
}

/// One epoch's diagnostic snapshot over all active non-star bodies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "n")]
    pub count: usize,

    #[serde(rename = "st", default)]
    pub star_temp: f64,

    #[serde(rename = "sm", default)]
    pub star_mass: f64,

    #[serde(rename = "z", default)]
    pub zones: ZoneBreakdown,

    #[serde(rename = "org", default)]
    pub origins: OriginCounts,

    #[serde(rename = "avg_d", default)]
    pub mean_distance: f64,

    #[serde(rename = "bound", default)]
    pub bound_count: usize,

    #[serde(rename = "bound_pct", default)]
    pub bound_pct: f64,

    #[serde(rename = "uni", default)]
    pub uniformity: f64,

    #[serde(rename = "abins", default)]
    pub angular_bins: [u32; ANGULAR_SECTORS],

    #[serde(rename = "tbh", default)]
    pub boundary_hits: u64,

    #[serde(rename = "buf", default)]
    pub buffer_count: usize,

    #[serde(rename = "buf_pct", default)]
    pub buffer_pct: f64,
}

/// Computes the 8-sector angular histogram and the uniformity score.
///
/// This is the single canonical site for the uniformity computation: the
/// score is rounded once, post-aggregation, to 3 decimal places. Snapshot
/// and verifier both call this; neither rounds again.
pub fn angular_uniformity(
    bodies: &[&Body],
    star: &StarView,
) -> (f64, [u32; ANGULAR_SECTORS]) {
    let mut bins = [0u32; ANGULAR_SECTORS];
    if bodies.is_empty() {
        return (0.0, bins);
    }
    for body in bodies {
        let offset = body.position - star.position;
        let angle = offset.y.atan2(offset.x) + std::f64::consts::PI;
        let bin = (angle / std::f64::consts::TAU * ANGULAR_SECTORS as f64) as usize;
        bins[bin % ANGULAR_SECTORS] += 1;
    }
    let mean = bodies.len() as f64 / ANGULAR_SECTORS as f64;
    let max_dev = bins
        .iter()
        .map(|&c| (c as f64 - mean).abs())
        .fold(0.0, f64::max);
    let uniformity = round3(1.0 - max_dev / mean.max(1.0));
    (uniformity, bins)
}

/// Collects a snapshot over the body collection. Index 0 is the star.
pub fn collect(bodies: &[Body], kernel: &PhysicsKernel) -> Snapshot {
    let star = match bodies.first() {
        Some(star) => star,
        None => return Snapshot::default(),
    };
    let star_view = StarView {
        position: star.position,
        mass: star.mass,
        temp: star.temp,
    };

    let active: Vec<&Body> = bodies
        .iter()
        .filter(|b| b.is_active && !b.is_star)
        .collect();
    if active.is_empty() {
        return Snapshot::default();
    }

    let mut origins = OriginCounts::default();
    let mut inner = Vec::new();
    let mut middle = Vec::new();
    let mut outer = Vec::new();
    let mut dist_sum = 0.0;
    let mut bound_count = 0;
    let mut buffer_count = 0;

    for body in &active {
        let dist = body.distance_to(star_view.position);
        dist_sum += dist;

        match body.origin {
            crate::body::Origin::BigBang => origins.bigbang += 1,
            crate::body::Origin::Injected => origins.injected += 1,
            crate::body::Origin::Recycled => origins.recycled += 1,
        }

        let total_energy =
            body.kinetic_energy() + body.potential_energy(&star_view, kernel);
        if total_energy < 0.0 {
            bound_count += 1;
        }
        if body.in_buffer_zone {
            buffer_count += 1;
        }

        if dist < INNER_LIMIT {
            inner.push(*body);
        } else if dist < MIDDLE_LIMIT {
            middle.push(*body);
        } else {
            outer.push(*body);
        }
    }

    let (uniformity, angular_bins) = angular_uniformity(&active, &star_view);

    let count = active.len();
    Snapshot {
        count,
        star_temp: round1(star.temp),
        star_mass: round1(star.mass),
        zones: ZoneBreakdown {
            inner: zone_stats(&inner),
            middle: zone_stats(&middle),
            outer: zone_stats(&outer),
        },
        origins,
        mean_distance: round1(dist_sum / count as f64),
        bound_count,
        bound_pct: round1(bound_count as f64 / count as f64 * 100.0),
        uniformity,
        angular_bins,
        boundary_hits: active.iter().map(|b| b.boundary_hits).sum(),
        buffer_count,
        buffer_pct: round1(buffer_count as f64 / count as f64 * 100.0),
    }
}

fn zone_stats(bodies: &[&Body]) -> ZoneStats {
    if bodies.is_empty() {
        return ZoneStats::default();
    }
    let mut temp_min = f64::INFINITY;
    let mut temp_max = f64::NEG_INFINITY;
    let mut mass_min = f64::INFINITY;
    let mut mass_max = f64::NEG_INFINITY;
    let mut boundary_hits = 0;
    for body in bodies {
        temp_min = temp_min.min(body.temp);
        temp_max = temp_max.max(body.temp);
        mass_min = mass_min.min(body.mass);
        mass_max = mass_max.max(body.mass);
        boundary_hits += body.boundary_hits;
    }
    ZoneStats {
        count: bodies.len(),
        temp_range: Some([round1(temp_min), round1(temp_max)]),
        mass_range: Some([round1(mass_min), round1(mass_max)]),
        boundary_hits,
    }
}
