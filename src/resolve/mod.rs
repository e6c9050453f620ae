//! Resolution of configuration trees into runtime objects
//!
//! [`Resolver`] walks a configuration tree once, constructing runtime
//! objects bottom-up. Memoization is keyed on node identity and scoped to
//! a single resolver: a node referenced from several places constructs
//! once and every consumer receives the same `Arc`, while two independent
//! resolution calls over the same tree build two equivalent object sets.
//! A constructor failure aborts the whole walk with the failing node's
//! role path attached; no partial object set escapes.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value as Json;
use thiserror::Error;

use crate::config::{node_id, ConfigValue, MetaConfig, NodeKind, NodeRef};
use crate::data::{DataSource, SeqPairDataset, SeqPairGenerator};
use crate::eval::{GenerationArgs, LossArgs};
use crate::model::Model;
use crate::optim::{AdaFactor, AdamW, OptimCell};
use crate::train::Trainer;

/// Errors from configuration resolution
#[derive(Debug, Error)]
pub enum ResolveError {
    /// A required field is absent
    #[error("`{path}`: missing required field `{field}` on {kind} node")]
    MissingField {
        path: String,
        kind: &'static str,
        field: &'static str,
    },

    /// A field holds a value of the wrong type
    #[error("`{path}.{field}`: expected {expected}, found {found}")]
    FieldType {
        path: String,
        field: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    /// A nested node resolved to an unexpected runtime kind
    #[error("`{path}`: expected {expected}, found {found}")]
    NodeKindMismatch {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    /// The node's constructor failed; the whole resolution aborts
    #[error("failed to construct `{path}` ({kind}): {message}")]
    Construction {
        path: String,
        kind: &'static str,
        message: String,
    },
}

/// Result alias for resolution
pub type Result<T> = std::result::Result<T, ResolveError>;

/// A runtime object produced by resolution
#[derive(Debug, Clone)]
pub enum Resolved {
    /// Shared model handle
    Model(Arc<Model>),
    /// Dataset (train or eval)
    Data(Arc<dyn DataSource>),
    /// Optimizer handle
    Optimizer(Arc<OptimCell>),
    /// Trainer / live inference handle
    Trainer(Arc<Trainer>),
    /// Loss-evaluator argument bundle
    LossEval(Arc<LossArgs>),
    /// Generation-evaluator argument bundle
    GenerationEval(Arc<GenerationArgs>),
    /// Full training-loop object set
    TrainLoop(Arc<TrainObjects>),
}

impl Resolved {
    /// Name of the runtime kind, for diagnostics
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Resolved::Model(_) => "model",
            Resolved::Data(_) => "data",
            Resolved::Optimizer(_) => "optimizer",
            Resolved::Trainer(_) => "trainer",
            Resolved::LossEval(_) => "loss_eval",
            Resolved::GenerationEval(_) => "generation_eval",
            Resolved::TrainLoop(_) => "train_loop",
        }
    }
}

/// Experiment-tracking parameters carried by the object set
#[derive(Debug, Clone)]
pub struct TrackingConfig {
    /// Record this run
    pub enabled: bool,
    /// Project the run belongs to
    pub project: String,
    /// Run name (also the tracking file stem)
    pub run_name: String,
    /// Evaluator-registry summary, injected after the registry is built
    pub evaluator: Option<Json>,
}

/// Role-addressed runtime object set for one training run
#[derive(Debug, Clone)]
pub struct TrainObjects {
    /// The model under training (the same object the trainer holds)
    pub model: Arc<Model>,
    /// Training data source
    pub train_data: Arc<dyn DataSource>,
    /// Trainer (shares the model with `train_data`)
    pub trainer: Arc<Trainer>,
    /// Seed for epoch shuffling
    pub seed: u64,
    /// Checkpoint/output directory, anchored at the project root
    pub save_dir: PathBuf,
    /// Retention cap on periodic checkpoints; `None` keeps all
    pub max_checkpoints: Option<usize>,
    /// Number of epochs
    pub epochs: usize,
    /// Hard cap on total steps; `None` means bounded by epochs only
    pub max_steps: Option<usize>,
    /// Training batch size
    pub bsize: usize,
    /// Log training loss every this many steps
    pub log_every: usize,
    /// Run the evaluator every this many steps
    pub eval_every: usize,
    /// Write a periodic checkpoint every this many steps
    pub save_every: Option<usize>,
    /// Suppress periodic checkpoints, save once at the end
    pub save_only_at_end: bool,
    /// Verbose loop output
    pub verbose: bool,
    /// Tracking parameters
    pub tracking: TrackingConfig,
}

/// Resolve a training-loop tree into its runtime object set.
///
/// Each call starts a fresh resolver; resolving the same static tree
/// twice yields two distinct-but-equivalent object sets.
pub fn unroll(tree: &NodeRef, meta: &MetaConfig) -> Result<TrainObjects> {
    let mut resolver = Resolver::new(meta);
    match resolver.resolve(tree)? {
        Resolved::TrainLoop(objects) => Ok((*objects).clone()),
        other => Err(ResolveError::NodeKindMismatch {
            path: tree.kind().name().to_string(),
            expected: "train_loop",
            found: other.kind_name(),
        }),
    }
}

/// Identity-memoizing tree walker
pub struct Resolver<'a> {
    meta: &'a MetaConfig,
    cache: HashMap<usize, Resolved>,
}

impl<'a> Resolver<'a> {
    /// Create a resolver with an empty cache
    #[must_use]
    pub fn new(meta: &'a MetaConfig) -> Self {
        Self {
            meta,
            cache: HashMap::new(),
        }
    }

    /// Resolve a node (and everything below it)
    pub fn resolve(&mut self, node: &NodeRef) -> Result<Resolved> {
        let path = node.kind().name().to_string();
        self.resolve_at(node, &path)
    }

    fn resolve_at(&mut self, node: &NodeRef, path: &str) -> Result<Resolved> {
        if let Some(hit) = self.cache.get(&node_id(node)) {
            return Ok(hit.clone());
        }
        let built = self.construct(node, path)?;
        self.cache.insert(node_id(node), built.clone());
        Ok(built)
    }

    fn construct(&mut self, node: &NodeRef, path: &str) -> Result<Resolved> {
        if self.meta.verbose {
            println!("building {path}");
        }
        match node.kind() {
            NodeKind::Model => self.construct_model(node, path),
            NodeKind::SeqPairData => self.construct_seq_pair_data(node, path),
            NodeKind::SeqPairGenerator => self.construct_seq_pair_generator(node, path),
            NodeKind::AdamW => self.construct_adamw(node, path),
            NodeKind::AdaFactor => self.construct_adafactor(node, path),
            NodeKind::Trainer => self.construct_trainer(node, path),
            NodeKind::LossEval => self.construct_loss_eval(node, path),
            NodeKind::GenerationEval => self.construct_generation_eval(node, path),
            NodeKind::TrainLoop => self.construct_train_loop(node, path),
        }
    }

    fn construct_model(&mut self, node: &NodeRef, path: &str) -> Result<Resolved> {
        let model_str = self.str_field(node, path, "model_str")?;
        let checkpoint_path = self
            .opt_str_field(node, path, "checkpoint_path")?
            .map(|p| self.meta.resolve_path(&p));
        let use_fp16 = self.bool_field(node, path, "use_fp16")?;
        let gradient_checkpoint = self.bool_field(node, path, "gradient_checkpoint")?;
        let vocab_size = self.usize_field(node, path, "vocab_size")?;

        let model = Model::new(
            model_str,
            checkpoint_path.as_deref(),
            use_fp16,
            gradient_checkpoint,
            vocab_size,
        )
        .map_err(|e| self.construction(path, node, e))?;
        Ok(Resolved::Model(Arc::new(model)))
    }

    fn construct_seq_pair_data(&mut self, node: &NodeRef, path: &str) -> Result<Resolved> {
        let tsv_path = self.meta.resolve_path(&self.str_field(node, path, "tsv_path")?);
        let enc_len = self.usize_field(node, path, "enc_len")?;
        let dec_len = self.usize_field(node, path, "dec_len")?;
        let model = self.model_field(node, path, "model_tokenizer")?;

        let dataset = SeqPairDataset::from_tsv(&tsv_path, enc_len, dec_len, model)
            .map_err(|e| self.construction(path, node, e))?;
        Ok(Resolved::Data(Arc::new(dataset)))
    }

    fn construct_seq_pair_generator(&mut self, node: &NodeRef, path: &str) -> Result<Resolved> {
        let settings = self.settings_field(node, path, "data_settings")?;
        let max_instances = self.usize_field(node, path, "max_instances_per_setting")?;
        let enc_len = self.usize_field(node, path, "enc_len")?;
        let dec_len = self.usize_field(node, path, "dec_len")?;
        let seed = self.u64_field(node, path, "seed")?;
        let model = self.model_field(node, path, "model_tokenizer")?;

        let generator =
            SeqPairGenerator::synthesize(&settings, model, max_instances, enc_len, dec_len, seed);
        Ok(Resolved::Data(Arc::new(generator)))
    }

    fn construct_adamw(&mut self, node: &NodeRef, path: &str) -> Result<Resolved> {
        let lr = self.f32_field(node, path, "lr")?;
        let beta1 = self.f32_field(node, path, "beta1")?;
        let beta2 = self.f32_field(node, path, "beta2")?;
        let eps = self.f32_field(node, path, "eps")?;
        let weight_decay = self.f32_field(node, path, "weight_decay")?;
        let grad_accum_steps = self.usize_field(node, path, "grad_accum_steps")?;

        let optimizer = AdamW::new(lr, beta1, beta2, eps, weight_decay);
        Ok(Resolved::Optimizer(Arc::new(OptimCell::new(
            Box::new(optimizer),
            grad_accum_steps,
        ))))
    }

    fn construct_adafactor(&mut self, node: &NodeRef, path: &str) -> Result<Resolved> {
        let lr = self.f32_field(node, path, "lr")?;
        let by_scale = self.bool_field(node, path, "multiply_by_parameter_scale")?;
        let grad_accum_steps = self.usize_field(node, path, "grad_accum_steps")?;

        let optimizer = AdaFactor::new(lr, by_scale);
        Ok(Resolved::Optimizer(Arc::new(OptimCell::new(
            Box::new(optimizer),
            grad_accum_steps,
        ))))
    }

    fn construct_trainer(&mut self, node: &NodeRef, path: &str) -> Result<Resolved> {
        let model = self.model_field(node, path, "model")?;
        let optim = self.optimizer_field(node, path, "optim")?;
        let verbose = self.bool_field(node, path, "verbose")?;
        Ok(Resolved::Trainer(Arc::new(Trainer::new(model, optim, verbose))))
    }

    fn construct_loss_eval(&mut self, node: &NodeRef, path: &str) -> Result<Resolved> {
        let eval_data = self.data_field(node, path, "eval_data")?;
        let seed = self.u64_field(node, path, "seed")?;
        let bsize = self.usize_field(node, path, "bsize")?;
        let eval_batches = self.opt_usize_field(node, path, "eval_batches")?;
        let verbose = self.bool_field(node, path, "verbose")?;

        Ok(Resolved::LossEval(Arc::new(LossArgs {
            eval_data,
            seed,
            bsize,
            eval_batches,
            verbose,
        })))
    }

    fn construct_generation_eval(&mut self, node: &NodeRef, path: &str) -> Result<Resolved> {
        let eval_data = self.data_field(node, path, "eval_data")?;
        let seed = self.u64_field(node, path, "seed")?;
        let bsize = self.usize_field(node, path, "bsize")?;
        let eval_batches = self.opt_usize_field(node, path, "eval_batches")?;
        let max_generation_len = self.usize_field(node, path, "max_generation_len")?;
        let save_generations_path = self
            .opt_str_field(node, path, "save_generations_path")?
            .map(|p| self.meta.resolve_path(&p));
        let verbose = self.bool_field(node, path, "verbose")?;

        Ok(Resolved::GenerationEval(Arc::new(GenerationArgs {
            eval_data,
            seed,
            bsize,
            eval_batches,
            max_generation_len,
            save_generations_path,
            verbose,
        })))
    }

    fn construct_train_loop(&mut self, node: &NodeRef, path: &str) -> Result<Resolved> {
        let train_data = self.data_field(node, path, "train_data")?;
        let trainer = self.trainer_field(node, path, "trainer")?;
        let seed = self.u64_field(node, path, "seed")?;
        let save_dir = self.meta.resolve_path(&self.str_field(node, path, "save_dir")?);
        let max_checkpoints = self.opt_usize_field(node, path, "max_checkpoints")?;
        let epochs = self.usize_field(node, path, "epochs")?;
        let max_steps = self.opt_usize_field(node, path, "max_steps")?;
        let bsize = self.usize_field(node, path, "bsize")?;
        let log_every = self.usize_field(node, path, "log_every")?;
        let eval_every = self.usize_field(node, path, "eval_every")?;
        let save_every = self.opt_usize_field(node, path, "save_every")?;
        let save_only_at_end = self.bool_field(node, path, "save_only_at_end")?;
        let use_tracking = self.bool_field(node, path, "use_tracking")?;
        let project = self.str_field(node, path, "project")?;
        let run_name = self.str_field(node, path, "run_name")?;
        let verbose = self.bool_field(node, path, "verbose")?;

        Ok(Resolved::TrainLoop(Arc::new(TrainObjects {
            model: trainer.model().clone(),
            train_data,
            trainer,
            seed,
            save_dir,
            max_checkpoints,
            epochs,
            max_steps,
            bsize,
            log_every,
            eval_every,
            save_every,
            save_only_at_end,
            verbose,
            tracking: TrackingConfig {
                enabled: use_tracking,
                project,
                run_name,
                evaluator: None,
            },
        })))
    }

    // ── field access ──────────────────────────────────────────────────

    fn field<'n>(
        &self,
        node: &'n NodeRef,
        path: &str,
        name: &'static str,
    ) -> Result<&'n ConfigValue> {
        node.get(name).ok_or(ResolveError::MissingField {
            path: path.to_string(),
            kind: node.kind().name(),
            field: name,
        })
    }

    fn field_type(
        &self,
        path: &str,
        name: &'static str,
        expected: &'static str,
        found: &ConfigValue,
    ) -> ResolveError {
        ResolveError::FieldType {
            path: path.to_string(),
            field: name,
            expected,
            found: found.type_name(),
        }
    }

    fn construction(
        &self,
        path: &str,
        node: &NodeRef,
        error: impl std::fmt::Display,
    ) -> ResolveError {
        ResolveError::Construction {
            path: path.to_string(),
            kind: node.kind().name(),
            message: error.to_string(),
        }
    }

    fn str_field(&self, node: &NodeRef, path: &str, name: &'static str) -> Result<String> {
        let v = self.field(node, path, name)?;
        v.as_str()
            .map(str::to_string)
            .ok_or_else(|| self.field_type(path, name, "string", v))
    }

    fn opt_str_field(
        &self,
        node: &NodeRef,
        path: &str,
        name: &'static str,
    ) -> Result<Option<String>> {
        let v = self.field(node, path, name)?;
        match v {
            ConfigValue::Null => Ok(None),
            ConfigValue::Str(s) => Ok(Some(s.clone())),
            other => Err(self.field_type(path, name, "string or null", other)),
        }
    }

    fn bool_field(&self, node: &NodeRef, path: &str, name: &'static str) -> Result<bool> {
        let v = self.field(node, path, name)?;
        v.as_bool()
            .ok_or_else(|| self.field_type(path, name, "bool", v))
    }

    fn usize_field(&self, node: &NodeRef, path: &str, name: &'static str) -> Result<usize> {
        let v = self.field(node, path, name)?;
        v.as_usize()
            .ok_or_else(|| self.field_type(path, name, "non-negative int", v))
    }

    fn u64_field(&self, node: &NodeRef, path: &str, name: &'static str) -> Result<u64> {
        self.usize_field(node, path, name).map(|v| v as u64)
    }

    fn opt_usize_field(
        &self,
        node: &NodeRef,
        path: &str,
        name: &'static str,
    ) -> Result<Option<usize>> {
        let v = self.field(node, path, name)?;
        match v {
            ConfigValue::Null => Ok(None),
            ConfigValue::Int(i) if *i >= 0 => Ok(Some(*i as usize)),
            other => Err(self.field_type(path, name, "non-negative int or null", other)),
        }
    }

    fn f32_field(&self, node: &NodeRef, path: &str, name: &'static str) -> Result<f32> {
        let v = self.field(node, path, name)?;
        v.as_float()
            .map(|f| f as f32)
            .ok_or_else(|| self.field_type(path, name, "number", v))
    }

    fn settings_field(
        &self,
        node: &NodeRef,
        path: &str,
        name: &'static str,
    ) -> Result<Vec<crate::config::Setting>> {
        let v = self.field(node, path, name)?;
        v.as_settings()
            .map(<[crate::config::Setting]>::to_vec)
            .ok_or_else(|| self.field_type(path, name, "settings", v))
    }

    fn child(&mut self, node: &NodeRef, path: &str, name: &'static str) -> Result<Resolved> {
        let v = self.field(node, path, name)?;
        let child = v
            .as_node()
            .cloned()
            .ok_or_else(|| self.field_type(path, name, "node", v))?;
        let child_path = format!("{path}.{name}");
        self.resolve_at(&child, &child_path)
    }

    fn model_field(&mut self, node: &NodeRef, path: &str, name: &'static str) -> Result<Arc<Model>> {
        match self.child(node, path, name)? {
            Resolved::Model(m) => Ok(m),
            other => Err(ResolveError::NodeKindMismatch {
                path: format!("{path}.{name}"),
                expected: "model",
                found: other.kind_name(),
            }),
        }
    }

    fn data_field(
        &mut self,
        node: &NodeRef,
        path: &str,
        name: &'static str,
    ) -> Result<Arc<dyn DataSource>> {
        match self.child(node, path, name)? {
            Resolved::Data(d) => Ok(d),
            other => Err(ResolveError::NodeKindMismatch {
                path: format!("{path}.{name}"),
                expected: "data",
                found: other.kind_name(),
            }),
        }
    }

    fn optimizer_field(
        &mut self,
        node: &NodeRef,
        path: &str,
        name: &'static str,
    ) -> Result<Arc<OptimCell>> {
        match self.child(node, path, name)? {
            Resolved::Optimizer(o) => Ok(o),
            other => Err(ResolveError::NodeKindMismatch {
                path: format!("{path}.{name}"),
                expected: "optimizer",
                found: other.kind_name(),
            }),
        }
    }

    fn trainer_field(
        &mut self,
        node: &NodeRef,
        path: &str,
        name: &'static str,
    ) -> Result<Arc<Trainer>> {
        match self.child(node, path, name)? {
            Resolved::Trainer(t) => Ok(t),
            other => Err(ResolveError::NodeKindMismatch {
                path: format!("{path}.{name}"),
                expected: "trainer",
                found: other.kind_name(),
            }),
        }
    }
}
