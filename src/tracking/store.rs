//! Tracking persistence stores

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::{Result, RunRecord, TrackingError};

/// Where run records are persisted
pub trait TrackingStore {
    /// Write (or overwrite) a run record
    fn persist(&mut self, record: &RunRecord) -> Result<()>;

    /// Load a run record by name
    fn load(&self, run_name: &str) -> Result<RunRecord>;
}

/// One JSON file per run under a directory
#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Create a store rooted at `dir`; the directory appears on first write
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn run_path(&self, run_name: &str) -> PathBuf {
        self.dir.join(format!("{run_name}.json"))
    }

    /// Directory the store writes into
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl TrackingStore for JsonFileStore {
    fn persist(&mut self, record: &RunRecord) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| TrackingError::Io(format!("cannot create {}: {e}", self.dir.display())))?;
        let body = serde_json::to_string_pretty(record)?;
        let path = self.run_path(&record.run_name);
        fs::write(&path, body)
            .map_err(|e| TrackingError::Io(format!("cannot write {}: {e}", path.display())))?;
        Ok(())
    }

    fn load(&self, run_name: &str) -> Result<RunRecord> {
        let path = self.run_path(run_name);
        if !path.exists() {
            return Err(TrackingError::RunNotFound(run_name.to_string()));
        }
        let body = fs::read_to_string(&path)
            .map_err(|e| TrackingError::Io(format!("cannot read {}: {e}", path.display())))?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// In-memory store for tests
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: HashMap<String, RunRecord>,
}

impl InMemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TrackingStore for InMemoryStore {
    fn persist(&mut self, record: &RunRecord) -> Result<()> {
        self.records.insert(record.run_name.clone(), record.clone());
        Ok(())
    }

    fn load(&self, run_name: &str) -> Result<RunRecord> {
        self.records
            .get(run_name)
            .cloned()
            .ok_or_else(|| TrackingError::RunNotFound(run_name.to_string()))
    }
}
