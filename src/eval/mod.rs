//! Named evaluators and dispatch
//!
//! An [`EvaluatorRegistry`] holds named (configuration, function, weight)
//! entries. Building it against the execution context resolves every
//! entry's configuration once up front; the resulting [`EvalSuite`] is
//! invoked repeatedly by the training loop with the live trainer handle,
//! which is merged into each prebuilt argument bundle at call time. The
//! report maps every evaluator name to its raw return value; the entry
//! named [`PRIMARY_EVALUATOR`] supplies the single scalar used for
//! model-selection decisions.

pub mod generation;
pub mod loss;

pub use generation::{evaluate_generation, GenerationArgs};
pub use loss::{evaluate_loss, LossArgs};

use std::collections::BTreeMap;

use serde_json::{json, Value as Json};
use thiserror::Error;

use crate::config::{MetaConfig, NodeRef};
use crate::resolve::{Resolved, ResolveError, Resolver};
use crate::train::Trainer;

/// Name of the entry whose report carries the primary metric
pub const PRIMARY_EVALUATOR: &str = "data";

/// Key the primary entry's report must expose the scalar under
pub const PRIMARY_METRIC_KEY: &str = "loss";

/// An evaluation function: live inference handle + prebuilt bundle in,
/// raw report value out. Failures are plain messages; the dispatcher
/// attaches the evaluator name.
pub type EvalFn = fn(&Trainer, &EvalArgs) -> std::result::Result<Json, String>;

/// Errors from registry construction and dispatch
#[derive(Debug, Error)]
pub enum EvalError {
    /// The registry lacks the well-known primary entry
    #[error("evaluator registry has no `{0}` entry to supply the primary metric")]
    MissingPrimary(&'static str),

    /// An entry's configuration failed to resolve at build time
    #[error("evaluator `{name}`: {source}")]
    Resolve {
        name: String,
        #[source]
        source: ResolveError,
    },

    /// An entry's configuration resolved to a non-evaluator bundle
    #[error("evaluator `{name}` config resolved to `{found}`, expected an evaluation bundle")]
    NotAnEvaluator { name: String, found: &'static str },

    /// An evaluator function failed at dispatch time; propagates uncaught
    /// (no retry, no partial report)
    #[error("evaluator `{name}` failed: {message}")]
    Failed { name: String, message: String },

    /// The primary entry's report has no numeric scalar under the fixed key
    #[error("primary evaluator `{name}` returned no numeric `{key}` field")]
    PrimaryMetricShape { name: String, key: &'static str },
}

/// Result alias for evaluator operations
pub type Result<T> = std::result::Result<T, EvalError>;

/// Prebuilt argument bundle handed to an evaluation function
#[derive(Debug, Clone)]
pub enum EvalArgs {
    /// Held-out loss evaluation
    Loss(std::sync::Arc<LossArgs>),
    /// Greedy-generation evaluation
    Generation(std::sync::Arc<GenerationArgs>),
}

impl EvalArgs {
    /// Expect a loss bundle
    pub fn loss(&self) -> std::result::Result<&LossArgs, String> {
        match self {
            EvalArgs::Loss(args) => Ok(args),
            EvalArgs::Generation(_) => Err("expected a loss bundle, got generation".to_string()),
        }
    }

    /// Expect a generation bundle
    pub fn generation(&self) -> std::result::Result<&GenerationArgs, String> {
        match self {
            EvalArgs::Generation(args) => Ok(args),
            EvalArgs::Loss(_) => Err("expected a generation bundle, got loss".to_string()),
        }
    }
}

/// One registered evaluator
#[derive(Debug, Clone)]
pub struct EvaluatorEntry {
    /// Report key
    pub name: String,
    /// Declarative configuration, resolved at build time
    pub config: NodeRef,
    /// Evaluation function
    pub func: EvalFn,
    /// Optional relative weight (recorded, not applied by the dispatcher)
    pub weight: Option<f64>,
}

/// Ordered collection of named evaluators
#[derive(Debug, Clone, Default)]
pub struct EvaluatorRegistry {
    entries: Vec<EvaluatorEntry>,
}

impl EvaluatorRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an evaluator
    #[must_use]
    pub fn register(self, name: impl Into<String>, config: NodeRef, func: EvalFn) -> Self {
        self.register_weighted(name, config, func, None)
    }

    /// Register an evaluator with a weight
    #[must_use]
    pub fn register_weighted(
        mut self,
        name: impl Into<String>,
        config: NodeRef,
        func: EvalFn,
        weight: Option<f64>,
    ) -> Self {
        self.entries.push(EvaluatorEntry {
            name: name.into(),
            config,
            func,
            weight,
        });
        self
    }

    /// Registered names in registration order
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    /// Summary of the registry for experiment tracking
    #[must_use]
    pub fn describe(&self) -> Json {
        let mut map = serde_json::Map::new();
        for entry in &self.entries {
            map.insert(
                entry.name.clone(),
                json!({
                    "kind": entry.config.kind().name(),
                    "weight": entry.weight,
                }),
            );
        }
        Json::Object(map)
    }

    /// Resolve every entry's configuration against the context and return
    /// the dispatchable suite.
    ///
    /// The primary entry must be present; its absence fails here, before
    /// any training side effect.
    pub fn build(&self, meta: &MetaConfig) -> Result<EvalSuite> {
        if !self.entries.iter().any(|e| e.name == PRIMARY_EVALUATOR) {
            return Err(EvalError::MissingPrimary(PRIMARY_EVALUATOR));
        }

        let mut bound = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            // each entry resolves independently, per-entry cache
            let mut resolver = Resolver::new(meta);
            let resolved = resolver
                .resolve(&entry.config)
                .map_err(|source| EvalError::Resolve {
                    name: entry.name.clone(),
                    source,
                })?;
            let args = match resolved {
                Resolved::LossEval(args) => EvalArgs::Loss(args),
                Resolved::GenerationEval(args) => EvalArgs::Generation(args),
                other => {
                    return Err(EvalError::NotAnEvaluator {
                        name: entry.name.clone(),
                        found: other.kind_name(),
                    })
                }
            };
            bound.push(BoundEvaluator {
                name: entry.name.clone(),
                args,
                func: entry.func,
                weight: entry.weight,
            });
        }
        Ok(EvalSuite { bound })
    }
}

#[derive(Debug, Clone)]
struct BoundEvaluator {
    name: String,
    args: EvalArgs,
    func: EvalFn,
    weight: Option<f64>,
}

/// The outcome of one evaluation pass
#[derive(Debug, Clone)]
pub struct EvalOutcome {
    /// The primary scalar, `report[PRIMARY_EVALUATOR][PRIMARY_METRIC_KEY]`
    pub primary: f64,
    /// Every evaluator's raw return value, keyed by name
    pub report: BTreeMap<String, Json>,
}

/// A built, repeatedly-invokable evaluation suite
#[derive(Debug, Clone)]
pub struct EvalSuite {
    bound: Vec<BoundEvaluator>,
}

impl EvalSuite {
    /// Run every evaluator against the live handle.
    ///
    /// Results aggregate per name with no merging across evaluators. The
    /// first failure aborts the whole pass.
    pub fn run(&self, inference: &Trainer) -> Result<EvalOutcome> {
        let mut report = BTreeMap::new();
        for evaluator in &self.bound {
            let value =
                (evaluator.func)(inference, &evaluator.args).map_err(|message| {
                    EvalError::Failed {
                        name: evaluator.name.clone(),
                        message,
                    }
                })?;
            report.insert(evaluator.name.clone(), value);
        }

        let primary = report
            .get(PRIMARY_EVALUATOR)
            .and_then(|v| v.get(PRIMARY_METRIC_KEY))
            .and_then(Json::as_f64)
            .ok_or_else(|| EvalError::PrimaryMetricShape {
                name: PRIMARY_EVALUATOR.to_string(),
                key: PRIMARY_METRIC_KEY,
            })?;

        Ok(EvalOutcome { primary, report })
    }

    /// Recorded weight for an evaluator, if any
    #[must_use]
    pub fn weight(&self, name: &str) -> Option<f64> {
        self.bound
            .iter()
            .find(|b| b.name == name)
            .and_then(|b| b.weight)
    }
}
