//! Compact persistence schema.
//!
//! Bodies serialize to heterogeneous 19-element JSON arrays with fixed
//! per-field rounding, and the engine serializes to a short-key state
//! document. Restores accept records as short as 14 fields, defaulting the
//! trailing membrane bookkeeping, so older saves remain loadable.

use crate::body::{Body, Composition, Origin};
use crate::engine::{Engine, EpochRecord, Tallies, HISTORY_RETENTION};
use crate::physics::PhysicsKernel;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// Minimum record length accepted on restore.
const RECORD_CORE_FIELDS: usize = 14;

pub(crate) fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

pub(crate) fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

pub(crate) fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

/// Restore failure.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("body record too short: {len} fields, need {RECORD_CORE_FIELDS}")]
    TooShort { len: usize },

    #[error("body record field {index} has the wrong type")]
    BadField { index: usize },

    #[error("body list is empty or does not start with the star")]
    NoStar,
}

/// The serialized engine. Bodies are stored as compact records rather than
/// structs, which keeps a 100-body save to a few kilobytes.
#[derive(Debug, Serialize, Deserialize)]
pub struct EngineState {
    #[serde(rename = "r")]
    pub run_id: u32,

    #[serde(rename = "e")]
    pub epoch: u64,

    #[serde(rename = "s")]
    pub total_steps: u64,

    /// Active body count at save time, informational
    #[serde(rename = "n")]
    pub body_count: usize,

    #[serde(rename = "sv")]
    pub tallies: Tallies,

    #[serde(rename = "eh", default)]
    pub history: Vec<EpochRecord>,

    #[serde(rename = "b", default)]
    pub bodies: Vec<Vec<Value>>,
}

impl Body {
    /// Serializes to the compact 19-field record.
    pub fn to_record(&self) -> Vec<Value> {
        vec![
            json!(self.id),
            json!(round1(self.position.x)),
            json!(round1(self.position.y)),
            json!(round3(self.velocity.x)),
            json!(round3(self.velocity.y)),
            json!(round2(self.mass)),
            json!(round2(self.spin)),
            json!(round1(self.temp)),
            json!(round1(self.radius)),
            json!(round1(self.composition.fe)),
            json!(round1(self.composition.si)),
            json!(round1(self.composition.vo)),
            json!(round1(self.axial_tilt)),
            json!(if self.is_star { 1 } else { 0 }),
            json!(self.birth_dist.round()),
            json!(self.boundary_hits),
            json!(self.origin.as_str()),
            json!(round3(self.tidal_damage)),
            json!(self.shred_immunity),
        ]
    }

    /// Restores from a compact record. Fields beyond the first 14 default
    /// when absent; restored bodies are active and out of the buffer zone.
    pub fn from_record(record: &[Value]) -> Result<Body, PersistError> {
        if record.len() < RECORD_CORE_FIELDS {
            return Err(PersistError::TooShort { len: record.len() });
        }
        let num = |index: usize| -> Result<f64, PersistError> {
            record
                .get(index)
                .and_then(Value::as_f64)
                .ok_or(PersistError::BadField { index })
        };

        let id = record
            .first()
            .and_then(Value::as_u64)
            .ok_or(PersistError::BadField { index: 0 })? as u32;
        let is_star = num(13)? != 0.0;

        Ok(Body {
            id,
            position: Vector2::new(num(1)?, num(2)?),
            velocity: Vector2::new(num(3)?, num(4)?),
            mass: num(5)?,
            spin: num(6)?,
            temp: num(7)?,
            radius: num(8)?,
            composition: Composition {
                fe: num(9)?,
                si: num(10)?,
                vo: num(11)?,
            },
            axial_tilt: num(12)?,
            is_star,
            is_active: true,
            birth_dist: record.get(14).and_then(Value::as_f64).unwrap_or(0.0),
            boundary_hits: record.get(15).and_then(Value::as_u64).unwrap_or(0),
            origin: record
                .get(16)
                .and_then(Value::as_str)
                .map(Origin::from_str_or_default)
                .unwrap_or(Origin::BigBang),
            in_buffer_zone: false,
            tidal_damage: record.get(17).and_then(Value::as_f64).unwrap_or(0.0),
            shred_immunity: record.get(18).and_then(Value::as_u64).unwrap_or(0) as u32,
        })
    }
}

impl Engine {
    /// Captures the engine for persistence. Only active bodies are stored;
    /// the trailing history is trimmed to its retention bound.
    pub fn to_state(&self) -> EngineState {
        let bodies: Vec<Vec<Value>> = self
            .bodies
            .iter()
            .filter(|b| b.is_active)
            .map(Body::to_record)
            .collect();
        let history_start = self.history.len().saturating_sub(HISTORY_RETENTION);

        let mut tallies = self.tallies.clone();
        tallies.injected_mass = round1(tallies.injected_mass);
        tallies.absorbed_by_star = round1(tallies.absorbed_by_star);
        tallies.recycled_mass = round1(tallies.recycled_mass);

        EngineState {
            run_id: self.run_id,
            epoch: self.epoch,
            total_steps: self.total_steps,
            body_count: bodies.len(),
            tallies,
            history: self.history[history_start..].to_vec(),
            bodies,
        }
    }

    /// Rebuilds an engine from a saved state. The random stream restarts
    /// from the caller's seed; trajectories after a restore are reproducible
    /// given the same seed, not a bitwise continuation of the original run.
    pub fn from_state(
        state: &EngineState,
        kernel: PhysicsKernel,
        seed: u64,
    ) -> Result<Engine, PersistError> {
        let mut engine = Engine::new(kernel, seed);
        engine.run_id = state.run_id;
        engine.epoch = state.epoch;
        engine.total_steps = state.total_steps;
        engine.tallies = state.tallies.clone();
        engine.history = state.history.clone();
        engine.bodies = state
            .bodies
            .iter()
            .map(|r| Body::from_record(r))
            .collect::<Result<Vec<_>, _>>()?;
        // Index 0 is the star everywhere downstream; a save that lost it
        // must be rejected here, not blow up mid-epoch.
        match engine.bodies.first() {
            Some(first) if first.is_star => Ok(engine),
            _ => Err(PersistError::NoStar),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn sample_body() -> (Body, PhysicsKernel) {
        let kernel = PhysicsKernel::default();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut body = Body::new(
            Vector2::new(5123.456, 4987.654),
            17.3312,
            4.21,
            312.77,
            &kernel,
            &mut rng,
        );
        body.velocity = Vector2::new(1.23456, -0.98765);
        body.birth_dist = 812.7;
        body.boundary_hits = 3;
        body.origin = Origin::Recycled;
        body.tidal_damage = 0.12345;
        body.shred_immunity = 42;
        (body, kernel)
    }

    #[test]
    fn test_record_has_nineteen_fields_and_fixed_rounding() {
        let (body, _) = sample_body();
        let record = body.to_record();

        assert_eq!(record.len(), 19);
        assert_eq!(record[1], json!(5123.5));
        assert_eq!(record[3], json!(1.235));
        assert_eq!(record[5], json!(17.33));
        assert_eq!(record[14], json!(813.0));
        assert_eq!(record[16], json!("recycled"));
        assert_eq!(record[17], json!(0.123));
    }

    #[test]
    fn test_record_reserializes_byte_identically() {
        let (body, _) = sample_body();
        let record = body.to_record();

        let restored = Body::from_record(&record).unwrap();
        assert_eq!(restored.to_record(), record);
        assert_eq!(
            serde_json::to_string(&restored.to_record()).unwrap(),
            serde_json::to_string(&record).unwrap()
        );
    }

    #[test]
    fn test_short_record_defaults_trailing_fields() {
        let (body, _) = sample_body();
        let mut record = body.to_record();
        record.truncate(14);

        let restored = Body::from_record(&record).unwrap();
        assert_eq!(restored.birth_dist, 0.0);
        assert_eq!(restored.boundary_hits, 0);
        assert_eq!(restored.origin, Origin::BigBang);
        assert_eq!(restored.tidal_damage, 0.0);
        assert_eq!(restored.shred_immunity, 0);
        assert!(restored.is_active);
        assert!(!restored.in_buffer_zone);
    }

    #[test]
    fn test_too_short_record_is_rejected() {
        let (body, _) = sample_body();
        let mut record = body.to_record();
        record.truncate(10);

        let err = Body::from_record(&record).unwrap_err();
        assert!(matches!(err, PersistError::TooShort { len: 10 }));
    }

    #[test]
    fn test_wrong_field_type_is_rejected() {
        let (body, _) = sample_body();
        let mut record = body.to_record();
        record[5] = json!("heavy");

        let err = Body::from_record(&record).unwrap_err();
        assert!(matches!(err, PersistError::BadField { index: 5 }));
    }

    #[test]
    fn test_engine_state_round_trip() {
        let mut engine = Engine::new(PhysicsKernel::default(), 42);
        engine.big_bang(25);
        engine.run_epoch(30);

        let state = engine.to_state();
        let json = serde_json::to_string(&state).unwrap();
        let parsed: EngineState = serde_json::from_str(&json).unwrap();
        let restored = Engine::from_state(&parsed, PhysicsKernel::default(), 42).unwrap();

        assert_eq!(restored.run_id, engine.run_id);
        assert_eq!(restored.epoch, engine.epoch);
        assert_eq!(restored.total_steps, engine.total_steps);
        assert_eq!(restored.tallies.merge_events, engine.tallies.merge_events);
        assert_eq!(restored.history.len(), engine.history.len());
        assert_eq!(restored.bodies.len(), engine.active_count());
        assert!(restored.star().is_star);
        assert_eq!(restored.star().id, engine.star().id);
    }

    #[test]
    fn test_starless_state_is_rejected() {
        let mut engine = Engine::new(PhysicsKernel::default(), 42);
        engine.big_bang(3);
        let mut state = engine.to_state();

        // A save that lost every body must not restore
        state.bodies.clear();
        let err = Engine::from_state(&state, PhysicsKernel::default(), 42).unwrap_err();
        assert!(matches!(err, PersistError::NoStar));

        // Nor one whose first record is not the star
        let mut shuffled = engine.to_state();
        shuffled.bodies.swap(0, 1);
        let err = Engine::from_state(&shuffled, PhysicsKernel::default(), 42).unwrap_err();
        assert!(matches!(err, PersistError::NoStar));
    }

    #[test]
    fn test_inactive_bodies_are_not_persisted() {
        let mut engine = Engine::new(PhysicsKernel::default(), 42);
        engine.big_bang(5);
        engine.bodies[2].is_active = false;

        let state = engine.to_state();
        assert_eq!(state.bodies.len(), 5);
        assert_eq!(state.body_count, 5);
    }
}
