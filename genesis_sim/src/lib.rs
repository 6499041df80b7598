//! Genesis Simulation Runner
//!
//! The reporting layer over `genesis_core`: habitability surveys of the
//! body collection, chunked JSON reports, and the on-disk store that lets
//! a run resume where the previous one stopped.

pub mod habitability;
pub mod report;
pub mod store;

pub use habitability::{classify, compact_planet, Biome, BodyClass, PlanetRecord, WaterState};
pub use report::{BiomeCounts, SurveyStats, FORMAT_TAG};
pub use store::{Store, StoreError};
