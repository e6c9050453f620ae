//! Ajustar: declarative fine-tuning orchestration
//!
//! A fine-tuning run is declared as an immutable configuration tree,
//! overridden from the command line, and only then resolved into live
//! runtime objects against a shared execution context:
//!
//! - [`config`]: configuration nodes, the dataset-settings cross
//!   product, path-addressed overrides, and the execution context
//! - [`resolve`]: identity-memoized resolution of a tree into a
//!   role-addressed runtime object set
//! - [`eval`]: named evaluators dispatched against the live trainer,
//!   reporting one primary scalar for model selection
//! - [`train`]: the trainer and the epoch/step loop driver
//! - [`tracking`]: experiment-run recording
//!
//! # Example
//!
//! ```
//! use ajustar::config::{ConfigNode, ConfigValue, MetaConfig, NodeKind};
//! use ajustar::config::{deep_replace, parse_overrides};
//! use ajustar::resolve::{Resolved, Resolver};
//!
//! let model = ConfigNode::builder(NodeKind::Model)
//!     .field("model_str", "seq2seq-base")
//!     .field("checkpoint_path", ConfigValue::Null)
//!     .field("use_fp16", true)
//!     .field("gradient_checkpoint", false)
//!     .field("vocab_size", 128usize)
//!     .build();
//!
//! // override a field, then resolve against the context
//! let overrides = parse_overrides(["use_fp16=false"])?;
//! let model = deep_replace(&model, &overrides)?;
//!
//! let meta = MetaConfig::new("/tmp", false);
//! let mut resolver = Resolver::new(&meta);
//! match resolver.resolve(&model)? {
//!     Resolved::Model(m) => assert!(!m.use_fp16()),
//!     _ => unreachable!(),
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod eval;
pub mod model;
pub mod optim;
pub mod recipe;
pub mod resolve;
pub mod tracking;
pub mod train;

pub use config::{
    deep_replace, parse_overrides, ConfigNode, ConfigValue, MetaConfig, NodeKind, NodeRef,
    Setting, SettingGrid,
};
pub use error::{Error, Result};
pub use eval::{EvalSuite, EvaluatorRegistry};
pub use model::Model;
pub use resolve::{unroll, Resolver, TrainObjects};
pub use train::{train_model, TrainReport, Trainer};
