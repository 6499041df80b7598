//! Chunked run reports.
//!
//! A report is an ordered list of JSON chunks: a summary, the habitable
//! planet records in pages of ten, the compact engine state, and the
//! verification document. Chunking keeps each write small enough to stream
//! or tail individually.

use crate::habitability::{self, PlanetRecord};
use genesis_core::{Engine, Verification};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::{SystemTime, UNIX_EPOCH};

/// Report format tag. Loaders accept any summary whose tag contains "V6".
pub const FORMAT_TAG: &str = "V6BH";

/// Planets per PLANETS chunk.
const PAGE_SIZE: usize = 10;

/// Running habitability-survey counters, carried across restored runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyStats {
    /// Total universes surveyed
    #[serde(default)]
    pub tu: u64,

    /// Bodies checked
    #[serde(default)]
    pub tc: u64,

    /// Too hot (water boiled off)
    #[serde(default)]
    pub hot: u64,

    /// Frozen
    #[serde(default)]
    pub cold: u64,

    /// No meaningful atmosphere
    #[serde(rename = "noP", default)]
    pub no_pressure: u64,

    /// Liquid surface water
    #[serde(default)]
    pub liq: u64,

    /// Interim reports written
    #[serde(default)]
    pub ir: u64,
}

/// Biome histogram over surveyed bodies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiomeCounts {
    #[serde(rename = "Ocean", default)]
    pub ocean: u64,
    #[serde(rename = "Gaia", default)]
    pub gaia: u64,
    #[serde(rename = "Arid", default)]
    pub arid: u64,
    #[serde(rename = "Desert", default)]
    pub desert: u64,
    #[serde(rename = "Snowball", default)]
    pub snowball: u64,
    #[serde(rename = "Scorched", default)]
    pub scorched: u64,
    #[serde(rename = "Barren", default)]
    pub barren: u64,
}

/// Builds the summary chunk payload.
///
/// `top5` ranks habitable planets by closeness to a 22-degree surface
/// temperature, the survey's notion of ideal.
pub fn summary(
    engine: &Engine,
    stats: &SurveyStats,
    habitable: &[PlanetRecord],
    biomes: &BiomeCounts,
    verification: Option<&Verification>,
) -> Value {
    let mut ranked: Vec<&PlanetRecord> = habitable.iter().collect();
    ranked.sort_by(|a, b| {
        let da = (a.t - 22.0).abs();
        let db = (b.t - 22.0).abs();
        da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
    });
    let best: Vec<&&PlanetRecord> = ranked.iter().take(5).collect();

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    json!({
        "v": FORMAT_TAG,
        "rid": engine.run_id,
        "ts": timestamp,
        "pp": engine.kernel.export_params(),
        "st": stats,
        "bd": biomes,
        "sn": engine.collect_snapshot(),
        "classes": habitability::class_histogram(&engine.bodies),
        "top5": best,
        "total_hab": habitable.len(),
        "epochs": engine.epoch,
        "steps": engine.total_steps,
        "sv": verification,
    })
}

/// Builds the full chunk list. Every chunk carries its index and the total
/// chunk count so a partial read is detectable.
pub fn chunks(
    engine: &Engine,
    stats: &SurveyStats,
    habitable: &[PlanetRecord],
    biomes: &BiomeCounts,
    verification: Option<&Verification>,
) -> Vec<Value> {
    let mut out = Vec::new();
    out.push(json!({
        "chunk": 0,
        "type": "SUMMARY",
        "data": summary(engine, stats, habitable, biomes, verification),
    }));

    for (page, batch) in habitable.chunks(PAGE_SIZE).enumerate() {
        let start = page * PAGE_SIZE;
        out.push(json!({
            "chunk": out.len(),
            "type": "PLANETS",
            "range": format!("{}-{}", start, start + batch.len() - 1),
            "data": batch,
        }));
    }

    out.push(json!({
        "chunk": out.len(),
        "type": "ENGINE",
        "data": engine.to_state(),
    }));
    out.push(json!({
        "chunk": out.len(),
        "type": "SV",
        "data": verification,
    }));

    let total = out.len();
    for chunk in &mut out {
        chunk["tc"] = json!(total);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use genesis_core::{PhysicsKernel, StarView};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn run_engine() -> Engine {
        let mut engine = Engine::new(PhysicsKernel::default(), 42);
        engine.big_bang(40);
        engine.run_epoch(50);
        engine
    }

    fn sample_planets(engine: &Engine, n: usize) -> Vec<PlanetRecord> {
        let star = engine.star();
        let view = StarView {
            position: star.position,
            mass: star.mass,
            temp: star.temp,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        engine
            .bodies
            .iter()
            .filter(|b| !b.is_star)
            .take(n)
            .map(|b| crate::habitability::compact_planet(b, &view, 0, &mut rng))
            .collect()
    }

    #[test]
    fn test_summary_carries_engine_identity() {
        let engine = run_engine();
        let stats = SurveyStats::default();
        let biomes = BiomeCounts::default();

        let s = summary(&engine, &stats, &[], &biomes, None);
        assert_eq!(s["v"], FORMAT_TAG);
        assert_eq!(s["rid"], engine.run_id);
        assert_eq!(s["epochs"], 1);
        assert_eq!(s["total_hab"], 0);
        assert!(s["pp"].get("G").is_some());
    }

    #[test]
    fn test_summary_reports_class_breakdown() {
        let engine = run_engine();
        let stats = SurveyStats::default();
        let biomes = BiomeCounts::default();

        let s = summary(&engine, &stats, &[], &biomes, None);
        let classes = s["classes"].as_object().unwrap();
        let total: u64 = classes.values().map(|v| v.as_u64().unwrap()).sum();
        let active = engine
            .bodies
            .iter()
            .filter(|b| b.is_active && !b.is_star)
            .count() as u64;
        assert_eq!(total, active);
        assert!(classes.get("S").is_none());
    }

    #[test]
    fn test_chunks_paginate_planets() {
        let engine = run_engine();
        let planets = sample_planets(&engine, 23);
        let stats = SurveyStats::default();
        let biomes = BiomeCounts::default();

        let all = chunks(&engine, &stats, &planets, &biomes, None);
        // Summary, three planet pages, engine, verification
        assert_eq!(all.len(), 6);
        assert_eq!(all[1]["type"], "PLANETS");
        assert_eq!(all[1]["range"], "0-9");
        assert_eq!(all[3]["range"], "20-22");
        assert_eq!(all[4]["type"], "ENGINE");
        assert_eq!(all[5]["type"], "SV");
        for (i, chunk) in all.iter().enumerate() {
            assert_eq!(chunk["chunk"], i as u64);
            assert_eq!(chunk["tc"], 6);
        }
    }

    #[test]
    fn test_top5_prefers_temperate_planets() {
        let engine = run_engine();
        let planets = sample_planets(&engine, 8);
        let stats = SurveyStats::default();
        let biomes = BiomeCounts::default();

        let s = summary(&engine, &stats, &planets, &biomes, None);
        let top5 = s["top5"].as_array().unwrap();
        assert_eq!(top5.len(), 5);
        let devs: Vec<f64> = top5
            .iter()
            .map(|p| (p["t"].as_f64().unwrap() - 22.0).abs())
            .collect();
        assert!(devs.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_stats_round_trip_with_short_keys() {
        let stats = SurveyStats {
            tc: 40,
            no_pressure: 7,
            ..Default::default()
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["noP"], 7);
        let back: SurveyStats = serde_json::from_value(json).unwrap();
        assert_eq!(back, stats);
    }
}
