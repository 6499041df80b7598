//! Genesis Core - Bounded Spherical Universe Simulation
//!
//! A deterministic 2D universe inside a black-hole membrane boundary:
//! 1. **Gravity and thermodynamics**: a central star, orbiting bodies,
//!    relativistic velocity clamping and radiative cooling
//! 2. **The membrane**: a boundary annulus with time dilation, redshift,
//!    tidal damage and mass recycling into inward-moving fragments
//! 3. **Verification**: eight diagnostics over the trailing epoch history
//!    producing an aggregate cosmological verdict
//!
//! All randomness flows through a seedable generator threaded into engine
//! construction, so any run reproduces exactly from its seed.

pub mod body;
pub mod engine;
pub mod grid;
pub mod membrane;
pub mod persist;
pub mod physics;
pub mod snapshot;
pub mod verify;

// Re-export key types for convenience
pub use body::{Body, Composition, Origin, StarView};
pub use engine::{Engine, EpochRecord, Tallies};
pub use persist::{EngineState, PersistError};
pub use physics::PhysicsKernel;
pub use snapshot::Snapshot;
pub use verify::{analyze, Verification};
