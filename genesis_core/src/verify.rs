//! Spherical-universe verification suite.
//!
//! Eight independent diagnostics (T1..T8) over the engine and its trailing
//! epoch history, plus an aggregate verdict. Each test reports its measured
//! quantities together with a categorical rating from a fixed enumeration,
//! so downstream reporting can match on the rating without re-deriving the
//! thresholds.

use crate::body::{Body, Origin, StarView};
use crate::engine::Engine;
use crate::persist::{round1, round2, round3};
use crate::snapshot::{self, ANGULAR_SECTORS};
use serde::Serialize;

/// Mean mass of a big-bang seeded body, used for the mass-conservation
/// baseline (uniform draw over 5..30).
pub const SEED_BODY_MEAN_MASS: f64 = 17.5;

/// Default big-bang body count assumed by the mass baseline.
pub const DEFAULT_SEED_COUNT: f64 = 120.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BindingRating {
    StronglyBound,
    Bound,
    Partial,
    Unbound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InjectionRating {
    /// More surviving injected bodies on orbit than drifting outside it
    Integrated,
    Peripheral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MassRating {
    /// The balance column accounts for every transfer; always reported
    Consistent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Trend {
    Improving,
    Degrading,
    Stable,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UniformityRating {
    Confirmed,
    Stable,
    NotYet,
    Unexpected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpansionType {
    Decelerating,
    Accelerating,
    Steady,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpansionRating {
    Closed,
    DarkE,
    Stable,
    NeedMore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StructureRating {
    Active,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BindingEvolution {
    Tightening,
    Loosening,
    Stable,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvolutionRating {
    Maturing,
    Stable,
    Dispersing,
    NeedMore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MembraneRating {
    ActiveMembrane,
    Quiet,
    NoEffect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Interpretation {
    StronglySupports,
    Supports,
    Partial,
    Inconclusive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgeBand {
    VeryYoung,
    Young,
    Developing,
    Maturing,
}

/// T1: fraction of bodies with negative total mechanical energy.
#[derive(Debug, Serialize)]
pub struct BindingTest {
    #[serde(rename = "l")]
    pub label: &'static str,
    pub bound: usize,
    pub n: usize,
    pub pct: f64,
    #[serde(rename = "r")]
    pub rating: BindingRating,
}

/// Radial fates of surviving injected bodies.
#[derive(Debug, Default, Serialize)]
pub struct InjectionFates {
    pub near: usize,
    pub orbit: usize,
    pub outer: usize,
    pub merged: u64,
}

/// T2: what became of externally injected and membrane-recycled matter.
#[derive(Debug, Serialize)]
pub struct InjectionTest {
    #[serde(rename = "l")]
    pub label: &'static str,
    pub inj_mass: f64,
    pub inj_count: u64,
    pub inj_alive: usize,
    pub recycled_mass: f64,
    pub recycled_alive: usize,
    pub fates: InjectionFates,
    #[serde(rename = "r")]
    pub rating: InjectionRating,
}

/// T3: mass budget against the seeded baseline.
#[derive(Debug, Serialize)]
pub struct MassTest {
    #[serde(rename = "l")]
    pub label: &'static str,
    pub init: f64,
    pub cur: f64,
    pub inj: f64,
    pub recycled: f64,
    /// Residual after removing injected mass; star fuel burn and recycling
    /// losses land here
    pub bal: f64,
    #[serde(rename = "r")]
    pub rating: MassRating,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct UniformityPoint {
    pub ep: u64,
    pub uni: f64,
}

/// T4: angular uniformity, current and first-half/second-half trend.
#[derive(Debug, Serialize)]
pub struct UniformityTest {
    #[serde(rename = "l")]
    pub label: &'static str,
    pub cur: f64,
    pub bins: [u32; ANGULAR_SECTORS],
    pub trend_data: Vec<UniformityPoint>,
    pub trend: Trend,
    #[serde(rename = "r")]
    pub rating: UniformityRating,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct DistancePoint {
    pub ep: u64,
    pub d: f64,
}

/// T5: rate of change of mean distance across epochs.
#[derive(Debug, Serialize)]
pub struct ExpansionTest {
    #[serde(rename = "l")]
    pub label: &'static str,
    pub data: Vec<DistancePoint>,
    pub rates: Vec<f64>,
    #[serde(rename = "type")]
    pub expansion: ExpansionType,
    #[serde(rename = "r")]
    pub rating: ExpansionRating,
}

/// T6: mass concentration and merge activity.
#[derive(Debug, Serialize)]
pub struct StructureTest {
    #[serde(rename = "l")]
    pub label: &'static str,
    pub n: usize,
    pub merges: u64,
    /// Percent of total mass held by the ten heaviest bodies
    pub conc: f64,
    pub max_m: f64,
    #[serde(rename = "r")]
    pub rating: StructureRating,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct BoundPoint {
    pub ep: u64,
    pub pct: f64,
}

/// T7: bound-percentage delta between the first and last recorded epochs.
#[derive(Debug, Serialize)]
pub struct EvolutionTest {
    #[serde(rename = "l")]
    pub label: &'static str,
    pub data: Vec<BoundPoint>,
    pub evo: BindingEvolution,
    #[serde(rename = "r")]
    pub rating: EvolutionRating,
}

/// T8: boundary-membrane activity.
#[derive(Debug, Serialize)]
pub struct MembraneTest {
    #[serde(rename = "l")]
    pub label: &'static str,
    pub in_buffer: usize,
    pub buf_pct: f64,
    pub avg_tidal_dmg: f64,
    pub recycled_total: u64,
    pub recycled_mass: f64,
    pub shred_events: u64,
    #[serde(rename = "r")]
    pub rating: MembraneRating,
}

/// Per-test pass flags feeding the verdict total.
#[derive(Debug, Serialize)]
pub struct Scores {
    pub binding: bool,
    pub injection: bool,
    pub mass: bool,
    pub uniformity: bool,
    pub expansion: bool,
    pub structure: bool,
    pub binding_evo: bool,
    pub membrane: bool,
}

impl Scores {
    pub fn total(&self) -> u32 {
        [
            self.binding,
            self.injection,
            self.mass,
            self.uniformity,
            self.expansion,
            self.structure,
            self.binding_evo,
            self.membrane,
        ]
        .iter()
        .filter(|&&passed| passed)
        .count() as u32
    }
}

/// The aggregate verdict.
#[derive(Debug, Serialize)]
pub struct Verdict {
    /// Framework tag carried through to reports
    pub fw: &'static str,
    pub scores: Scores,
    pub total: String,
    pub interp: Interpretation,
    pub summary: String,
    pub age: AgeBand,
}

/// The full verification document, keyed T1..T8 plus VERDICT on the wire.
#[derive(Debug, Serialize)]
pub struct Verification {
    #[serde(rename = "T1")]
    pub binding: BindingTest,
    #[serde(rename = "T2")]
    pub injection: InjectionTest,
    #[serde(rename = "T3")]
    pub mass: MassTest,
    #[serde(rename = "T4")]
    pub uniformity: UniformityTest,
    #[serde(rename = "T5")]
    pub expansion: ExpansionTest,
    #[serde(rename = "T6")]
    pub structure: StructureTest,
    #[serde(rename = "T7")]
    pub evolution: EvolutionTest,
    #[serde(rename = "T8")]
    pub membrane: MembraneTest,
    #[serde(rename = "VERDICT")]
    pub verdict: Verdict,
}

/// Runs the full suite. Returns `None` when there is no data: an unseeded
/// engine or one whose every non-star body has been deactivated.
pub fn analyze(engine: &Engine) -> Option<Verification> {
    let star = engine.bodies.first()?;
    let star_view = StarView {
        position: star.position,
        mass: star.mass,
        temp: star.temp,
    };
    let active: Vec<&Body> = engine
        .bodies
        .iter()
        .filter(|b| b.is_active && !b.is_star)
        .collect();
    if active.is_empty() {
        return None;
    }
    let n = active.len();
    // Epoch records taken while the collection was empty carry no signal
    let history: Vec<_> = engine
        .history
        .iter()
        .filter(|h| h.snapshot.count > 0)
        .collect();

    // T1
    let bound = active
        .iter()
        .filter(|b| b.kinetic_energy() + b.potential_energy(&star_view, &engine.kernel) < 0.0)
        .count();
    let bound_pct = round1(bound as f64 / n as f64 * 100.0);
    let binding = BindingTest {
        label: "gravitational binding",
        bound,
        n,
        pct: bound_pct,
        rating: if bound_pct > 90.0 {
            BindingRating::StronglyBound
        } else if bound_pct > 70.0 {
            BindingRating::Bound
        } else if bound_pct > 50.0 {
            BindingRating::Partial
        } else {
            BindingRating::Unbound
        },
    };

    // T2
    let mut fates = InjectionFates::default();
    let mut inj_alive = 0;
    let mut recycled_alive = 0;
    for body in &active {
        match body.origin {
            Origin::Injected => {
                inj_alive += 1;
                let dist = body.distance_to(star_view.position);
                if dist < 500.0 {
                    fates.near += 1;
                } else if dist < 2000.0 {
                    fates.orbit += 1;
                } else {
                    fates.outer += 1;
                }
            }
            Origin::Recycled => recycled_alive += 1,
            Origin::BigBang => {}
        }
    }
    fates.merged = engine.tallies.injected_count.saturating_sub(inj_alive as u64);
    let injection = InjectionTest {
        label: "injection and recycling fate",
        inj_mass: round1(engine.tallies.injected_mass),
        inj_count: engine.tallies.injected_count,
        inj_alive,
        recycled_mass: round1(engine.tallies.recycled_mass),
        recycled_alive,
        rating: if fates.orbit > fates.outer {
            InjectionRating::Integrated
        } else {
            InjectionRating::Peripheral
        },
        fates,
    };

    // T3
    let current = star.mass + active.iter().map(|b| b.mass).sum::<f64>();
    let init = DEFAULT_SEED_COUNT * SEED_BODY_MEAN_MASS + crate::engine::STAR_SEED_MASS;
    let mass = MassTest {
        label: "mass conservation",
        init: init.round(),
        cur: current.round(),
        inj: engine.tallies.injected_mass.round(),
        recycled: engine.tallies.recycled_mass.round(),
        bal: (current - init - engine.tallies.injected_mass).round(),
        rating: MassRating::Consistent,
    };

    // T4
    let trend_data: Vec<UniformityPoint> = history
        .iter()
        .map(|h| UniformityPoint {
            ep: h.epoch,
            uni: h.snapshot.uniformity,
        })
        .collect();
    let trend = if trend_data.len() >= 2 {
        let half = trend_data.len() / 2;
        let first: f64 =
            trend_data[..half].iter().map(|p| p.uni).sum::<f64>() / half.max(1) as f64;
        let second: f64 = trend_data[half..].iter().map(|p| p.uni).sum::<f64>()
            / (trend_data.len() - half).max(1) as f64;
        let delta = second - first;
        if delta > 0.03 {
            Trend::Improving
        } else if delta < -0.03 {
            Trend::Degrading
        } else {
            Trend::Stable
        }
    } else {
        Trend::Unknown
    };
    let (cur_uni, bins) = snapshot::angular_uniformity(&active, &star_view);
    let uniformity = UniformityTest {
        label: "uniformity trend",
        cur: cur_uni,
        bins,
        trend_data,
        trend,
        rating: match trend {
            Trend::Improving => UniformityRating::Confirmed,
            Trend::Stable => UniformityRating::Stable,
            Trend::Unknown => UniformityRating::NotYet,
            Trend::Degrading => UniformityRating::Unexpected,
        },
    };

    // T5
    let data: Vec<DistancePoint> = history
        .iter()
        .map(|h| DistancePoint {
            ep: h.epoch,
            d: h.snapshot.mean_distance,
        })
        .collect();
    let mut rates = Vec::new();
    let mut expansion_type = ExpansionType::Unknown;
    if data.len() >= 3 {
        rates = data.windows(2).map(|w| round2(w[1].d - w[0].d)).collect();
        if rates.len() >= 2 {
            let half = rates.len() / 2;
            let early: f64 = rates[..half].iter().sum::<f64>() / half as f64;
            let late: f64 =
                rates[half..].iter().sum::<f64>() / (rates.len() - half).max(1) as f64;
            expansion_type = if late < early - 1.0 {
                ExpansionType::Decelerating
            } else if late > early + 1.0 {
                ExpansionType::Accelerating
            } else {
                ExpansionType::Steady
            };
        }
    }
    let expansion = ExpansionTest {
        label: "expansion dynamics",
        data,
        rates,
        expansion: expansion_type,
        rating: match expansion_type {
            ExpansionType::Decelerating => ExpansionRating::Closed,
            ExpansionType::Accelerating => ExpansionRating::DarkE,
            ExpansionType::Steady => ExpansionRating::Stable,
            ExpansionType::Unknown => ExpansionRating::NeedMore,
        },
    };

    // T6
    let mut masses: Vec<f64> = active.iter().map(|b| b.mass).collect();
    masses.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    let top10: f64 = masses.iter().take(10).sum();
    let total_mass: f64 = masses.iter().sum();
    let structure = StructureTest {
        label: "structure formation",
        n,
        merges: engine.tallies.merge_events,
        conc: round1(top10 / total_mass.max(1.0) * 100.0),
        max_m: round1(masses.first().copied().unwrap_or(0.0)),
        rating: if engine.tallies.merge_events > 5 {
            StructureRating::Active
        } else {
            StructureRating::Low
        },
    };

    // T7
    let bound_data: Vec<BoundPoint> = history
        .iter()
        .map(|h| BoundPoint {
            ep: h.epoch,
            pct: h.snapshot.bound_pct,
        })
        .collect();
    let evo = if bound_data.len() >= 2 {
        let delta = bound_data[bound_data.len() - 1].pct - bound_data[0].pct;
        if delta > 2.0 {
            BindingEvolution::Tightening
        } else if delta < -2.0 {
            BindingEvolution::Loosening
        } else {
            BindingEvolution::Stable
        }
    } else {
        BindingEvolution::Unknown
    };
    let evolution = EvolutionTest {
        label: "binding evolution",
        data: bound_data,
        evo,
        rating: match evo {
            BindingEvolution::Tightening => EvolutionRating::Maturing,
            BindingEvolution::Stable => EvolutionRating::Stable,
            BindingEvolution::Loosening => EvolutionRating::Dispersing,
            BindingEvolution::Unknown => EvolutionRating::NeedMore,
        },
    };

    // T8
    let in_buffer = active.iter().filter(|b| b.in_buffer_zone).count();
    let avg_tidal = active.iter().map(|b| b.tidal_damage).sum::<f64>() / n as f64;
    let membrane = MembraneTest {
        label: "membrane activity",
        in_buffer,
        buf_pct: round1(in_buffer as f64 / n as f64 * 100.0),
        avg_tidal_dmg: round3(avg_tidal),
        recycled_total: engine.tallies.recycled_count,
        recycled_mass: round1(engine.tallies.recycled_mass),
        shred_events: engine.tallies.boundary_events,
        rating: if engine.tallies.recycled_count > 0 {
            MembraneRating::ActiveMembrane
        } else if in_buffer > 0 {
            MembraneRating::Quiet
        } else {
            MembraneRating::NoEffect
        },
    };

    // Verdict
    let scores = Scores {
        binding: bound_pct > 70.0,
        injection: injection.fates.orbit > 0,
        mass: true,
        uniformity: matches!(trend, Trend::Improving | Trend::Stable),
        expansion: matches!(
            expansion_type,
            ExpansionType::Decelerating | ExpansionType::Steady
        ),
        structure: engine.tallies.merge_events > 3,
        binding_evo: matches!(
            evo,
            BindingEvolution::Tightening | BindingEvolution::Stable
        ),
        membrane: engine.tallies.recycled_count > 0 || in_buffer > 0,
    };
    let total = scores.total();
    let epochs_seen = history.len();
    let verdict = Verdict {
        fw: "YOUNG_EXPANDING_BH",
        total: format!("{total}/8"),
        interp: if total >= 7 {
            Interpretation::StronglySupports
        } else if total >= 5 {
            Interpretation::Supports
        } else if total >= 4 {
            Interpretation::Partial
        } else {
            Interpretation::Inconclusive
        },
        summary: format!("spherical universe (black-hole membrane model): {total}/8 checks"),
        age: if epochs_seen <= 2 {
            AgeBand::VeryYoung
        } else if epochs_seen <= 5 {
            AgeBand::Young
        } else if epochs_seen <= 10 {
            AgeBand::Developing
        } else {
            AgeBand::Maturing
        },
        scores,
    };

    Some(Verification {
        binding,
        injection,
        mass,
        uniformity,
        expansion,
        structure,
        evolution,
        membrane,
        verdict,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::PhysicsKernel;

    fn seeded_engine(bodies: usize, epochs: u64, steps: u64) -> Engine {
        let mut engine = Engine::new(PhysicsKernel::default(), 42);
        engine.big_bang(bodies);
        for _ in 0..epochs {
            engine.run_epoch(steps);
        }
        engine
    }

    #[test]
    fn test_analyze_requires_data() {
        let engine = Engine::new(PhysicsKernel::default(), 42);
        assert!(analyze(&engine).is_none());

        let mut star_only = Engine::new(PhysicsKernel::default(), 42);
        star_only.big_bang(0);
        assert!(analyze(&star_only).is_none());
    }

    #[test]
    fn test_seeded_universe_is_bound() {
        let engine = seeded_engine(120, 1, 50);
        let v = analyze(&engine).unwrap();

        // Near-circular orbits keep the vast majority bound
        assert!(v.binding.pct > 70.0);
        assert!(v.binding.bound <= v.binding.n);
        assert!(matches!(
            v.binding.rating,
            BindingRating::StronglyBound | BindingRating::Bound
        ));
    }

    #[test]
    fn test_mass_balance_accounts_for_injection() {
        let engine = seeded_engine(120, 2, 100);
        let v = analyze(&engine).unwrap();

        assert_eq!(v.mass.init, 6000.0 + 120.0 * 17.5);
        assert!(matches!(v.mass.rating, MassRating::Consistent));
        // With injection removed, the residual is the seeded-mass spread
        // around its mean, star fuel burn, and any recycling skim
        assert!(v.mass.bal.abs() < 500.0);
    }

    #[test]
    fn test_short_history_defers_trend_tests() {
        let engine = seeded_engine(60, 1, 20);
        let v = analyze(&engine).unwrap();

        assert_eq!(v.uniformity.trend, Trend::Unknown);
        assert_eq!(v.uniformity.rating, UniformityRating::NotYet);
        assert_eq!(v.expansion.rating, ExpansionRating::NeedMore);
        assert_eq!(v.evolution.rating, EvolutionRating::NeedMore);
        assert_eq!(v.verdict.age, AgeBand::VeryYoung);
    }

    #[test]
    fn test_long_run_produces_trend_ratings() {
        let engine = seeded_engine(120, 8, 100);
        let v = analyze(&engine).unwrap();

        assert!(v.uniformity.trend_data.len() >= 2);
        assert_ne!(v.uniformity.trend, Trend::Unknown);
        assert_ne!(v.expansion.expansion, ExpansionType::Unknown);
        assert_eq!(v.expansion.rates.len(), v.expansion.data.len() - 1);
        assert_ne!(v.evolution.evo, BindingEvolution::Unknown);
        assert_eq!(v.verdict.age, AgeBand::Developing);
    }

    #[test]
    fn test_injection_is_tallied() {
        // 100 steps crosses the injection cadence at least once
        let engine = seeded_engine(120, 1, 100);
        let v = analyze(&engine).unwrap();

        assert!(v.injection.inj_count >= 2);
        assert_eq!(
            v.injection.fates.merged,
            v.injection.inj_count - v.injection.inj_alive as u64
        );
    }

    #[test]
    fn test_verdict_total_matches_scores() {
        let engine = seeded_engine(120, 4, 100);
        let v = analyze(&engine).unwrap();

        let total = v.verdict.scores.total();
        assert_eq!(v.verdict.total, format!("{total}/8"));
        assert!(v.verdict.scores.mass);
        assert_eq!(v.verdict.fw, "YOUNG_EXPANDING_BH");
    }

    #[test]
    fn test_wire_format_uses_test_names_and_ratings() {
        let engine = seeded_engine(60, 1, 50);
        let v = analyze(&engine).unwrap();

        let json = serde_json::to_value(&v).unwrap();
        assert!(json.get("T1").is_some());
        assert!(json.get("T8").is_some());
        let verdict = json.get("VERDICT").unwrap();
        assert!(verdict.get("interp").unwrap().is_string());
        assert_eq!(json["T3"]["r"], "CONSISTENT");
        assert!(json["T1"]["r"].as_str().unwrap().chars().all(|c| c.is_ascii_uppercase() || c == '_'));
    }
}
