//! On-disk report and state store.
//!
//! A store directory holds the chunked report (`state.json`), the summary
//! alone (`report_summary.json`), and the latest verification document
//! (`verification.json`); the summary is duplicated to `RESULT.txt` in the
//! working directory for quick inspection. Write failures are logged and
//! swallowed: persistence must never corrupt or abort a running simulation.
//! Read failures surface as `None` the same way a missing save does.

use genesis_core::EngineState;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

const STATE_FILE: &str = "state.json";
const SUMMARY_FILE: &str = "report_summary.json";
const VERIFICATION_FILE: &str = "verification.json";
const RESULT_FILE: &str = "RESULT.txt";

/// Classified store failure. Only surfaced from the one fallible entry
/// point ([`Store::save`]); loads degrade to `None`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("save directory {path:?} could not be created: {source}")]
    Dir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("report serialization failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Handle to one save directory.
pub struct Store {
    dir: PathBuf,
}

impl Store {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes a chunked report. `report_type` tags the write as INTERIM or
    /// FINAL. Individual file failures are logged and skipped; only a
    /// missing save directory or unencodable report is an error.
    pub fn save(&self, chunks: &[Value], report_type: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(|source| StoreError::Dir {
            path: self.dir.clone(),
            source,
        })?;

        let document = serde_json::to_string(&serde_json::json!({
            "type": report_type,
            "chunks": chunks,
        }))?;
        self.write_file(&self.dir.join(STATE_FILE), &document);

        if let Some(summary) = chunks.first() {
            let compact = serde_json::to_string(summary)?;
            self.write_file(&self.dir.join(SUMMARY_FILE), &compact);
            self.write_file(Path::new(RESULT_FILE), &compact);
        }

        for chunk in chunks {
            if chunk.get("type").and_then(Value::as_str) == Some("SV") {
                let pretty = serde_json::to_string_pretty(chunk)?;
                self.write_file(&self.dir.join(VERIFICATION_FILE), &pretty);
            }
        }

        debug!(report_type, dir = %self.dir.display(), "report saved");
        Ok(())
    }

    fn write_file(&self, path: &Path, contents: &str) {
        if let Err(err) = fs::write(path, contents) {
            warn!(path = %path.display(), %err, "report write skipped");
        }
    }

    /// Loads the raw chunked report, or `None` if absent or unreadable.
    pub fn load(&self) -> Option<Value> {
        let path = self.dir.join(STATE_FILE);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(_) => return None,
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(path = %path.display(), %err, "saved report unreadable");
                None
            }
        }
    }

    /// Extracts the most recent engine state from the saved report.
    pub fn load_engine(&self) -> Option<EngineState> {
        let report = self.load()?;
        let chunks = report.get("chunks")?.as_array()?;
        for chunk in chunks.iter().rev() {
            if chunk.get("type").and_then(Value::as_str) == Some("ENGINE") {
                match serde_json::from_value(chunk.get("data")?.clone()) {
                    Ok(state) => return Some(state),
                    Err(err) => {
                        warn!(%err, "engine chunk unreadable, starting fresh");
                        return None;
                    }
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genesis_core::{Engine, PhysicsKernel};

    fn temp_store(tag: &str) -> Store {
        let dir = std::env::temp_dir().join(format!("genesis_store_{tag}_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        Store::new(dir)
    }

    fn report_chunks(engine: &Engine) -> Vec<Value> {
        let stats = crate::report::SurveyStats::default();
        let biomes = crate::report::BiomeCounts::default();
        crate::report::chunks(engine, &stats, &[], &biomes, None)
    }

    #[test]
    fn test_missing_save_loads_as_none() {
        let store = temp_store("missing");
        assert!(store.load().is_none());
        assert!(store.load_engine().is_none());
    }

    #[test]
    fn test_save_then_load_engine() {
        let store = temp_store("roundtrip");
        let mut engine = Engine::new(PhysicsKernel::default(), 42);
        engine.big_bang(15);
        engine.run_epoch(20);

        store.save(&report_chunks(&engine), "INTERIM").unwrap();

        let report = store.load().unwrap();
        assert_eq!(report["type"], "INTERIM");
        let state = store.load_engine().unwrap();
        assert_eq!(state.run_id, engine.run_id);
        assert_eq!(state.epoch, 1);
        assert_eq!(state.bodies.len(), engine.active_count());

        let restored = Engine::from_state(&state, PhysicsKernel::default(), 42).unwrap();
        assert_eq!(restored.total_steps, engine.total_steps);

        let _ = fs::remove_dir_all(store.dir());
        let _ = fs::remove_file(RESULT_FILE);
    }

    #[test]
    fn test_corrupt_save_loads_as_none() {
        let store = temp_store("corrupt");
        fs::create_dir_all(store.dir()).unwrap();
        fs::write(store.dir().join(STATE_FILE), "{not json").unwrap();

        assert!(store.load().is_none());
        assert!(store.load_engine().is_none());

        let _ = fs::remove_dir_all(store.dir());
    }
}
