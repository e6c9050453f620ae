//! Experiment tracking
//!
//! A [`RunTracker`] records one training run: hyperparameters, per-step
//! metrics, artifact paths. Persistence goes through the pluggable
//! [`store::TrackingStore`] trait; the training loop uses the JSON file
//! store under the run's save directory, tests use the in-memory store.

pub mod store;

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use store::TrackingStore;

/// Final status of a tracked run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Still recording
    Active,
    /// Finished normally
    Completed,
    /// Aborted by an error
    Failed,
}

/// One metric observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    /// Global step the value was observed at
    pub step: u64,
    /// Observed value
    pub value: f64,
}

/// The full record of a training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    /// Project the run belongs to
    pub project: String,
    /// Run name (unique within the project)
    pub run_name: String,
    /// Current status
    pub status: RunStatus,
    /// Logged hyperparameters and config summaries
    pub params: BTreeMap<String, Json>,
    /// Metric streams, keyed by metric name
    pub metrics: BTreeMap<String, Vec<MetricPoint>>,
    /// Paths of produced artifacts (checkpoints, generation dumps)
    pub artifacts: Vec<String>,
    /// Unix timestamp (ms) at start
    pub started_at_ms: i64,
    /// Unix timestamp (ms) at finish
    pub finished_at_ms: Option<i64>,
}

/// Errors from tracking operations
#[derive(Debug, thiserror::Error)]
pub enum TrackingError {
    #[error("tracking I/O error: {0}")]
    Io(String),

    #[error("tracking serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("run not found: {0}")]
    RunNotFound(String),
}

/// Result alias for tracking operations
pub type Result<T> = std::result::Result<T, TrackingError>;

/// Tracker for a single run
#[derive(Debug)]
pub struct RunTracker<S: TrackingStore> {
    record: RunRecord,
    store: S,
}

impl<S: TrackingStore> RunTracker<S> {
    /// Start recording a run
    pub fn start(project: impl Into<String>, run_name: impl Into<String>, store: S) -> Self {
        Self {
            record: RunRecord {
                project: project.into(),
                run_name: run_name.into(),
                status: RunStatus::Active,
                params: BTreeMap::new(),
                metrics: BTreeMap::new(),
                artifacts: Vec::new(),
                started_at_ms: Utc::now().timestamp_millis(),
                finished_at_ms: None,
            },
            store,
        }
    }

    /// Log one hyperparameter / config value
    pub fn log_param(&mut self, key: impl Into<String>, value: impl Into<Json>) {
        self.record.params.insert(key.into(), value.into());
    }

    /// Log a metric observation
    pub fn log_metric(&mut self, key: &str, value: f64, step: u64) {
        self.record
            .metrics
            .entry(key.to_string())
            .or_default()
            .push(MetricPoint { step, value });
    }

    /// Record an artifact path
    pub fn log_artifact(&mut self, path: impl Into<String>) {
        self.record.artifacts.push(path.into());
    }

    /// Read access to the record under construction
    #[must_use]
    pub fn record(&self) -> &RunRecord {
        &self.record
    }

    /// Stamp the final status, persist, and return the record
    pub fn finish(mut self, status: RunStatus) -> Result<RunRecord> {
        self.record.status = status;
        self.record.finished_at_ms = Some(Utc::now().timestamp_millis());
        self.store.persist(&self.record)?;
        Ok(self.record)
    }
}
