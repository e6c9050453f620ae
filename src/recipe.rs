//! Default instruction-tuning recipe
//!
//! The declarative counterpart of a launcher script: one shared model
//! node, a settings-driven training generator, a TSV eval set, an AdamW
//! optimizer, two evaluators, and the training-loop node tying them
//! together. Built once at startup; CLI overrides then rewrite the tree
//! before resolution.

use crate::config::{ConfigNode, ConfigValue, NodeKind, NodeRef, SettingGrid};
use crate::eval::{evaluate_generation, evaluate_loss, EvaluatorRegistry, PRIMARY_EVALUATOR};

/// Run identifier used for the save directory, tracking project and run
const RUN_NAME: &str = "seq2seq_instruct_finetune_v1";
const SAVE_DIR: &str = "outputs/seq2seq_instruct_finetune_v1";

/// A declared experiment: the training-loop tree plus its evaluators
#[derive(Debug, Clone)]
pub struct Recipe {
    /// Root of the configuration tree (a `train_loop` node)
    pub train_loop: NodeRef,
    /// Named evaluators dispatched during the run
    pub evaluators: EvaluatorRegistry,
}

/// The dataset-settings grid: every combination of instruction-formatting
/// options the training generator mixes over
#[must_use]
pub fn dataset_grid() -> SettingGrid {
    SettingGrid::new()
        .axis("add_task_definition", [true, false])
        .axis("num_pos_examples", [0i64, 1, 2, 3])
        .axis("num_neg_examples", [0i64, 1, 2, 3])
        .axis("add_explanation", [true, false])
        .axis("add_task_name", [false])
}

/// Build the default recipe
#[must_use]
pub fn instruction_tuning_recipe() -> Recipe {
    let model = ConfigNode::builder(NodeKind::Model)
        .field("model_str", "seq2seq-lm-adapt")
        .field("checkpoint_path", ConfigValue::Null)
        .field("use_fp16", true)
        .field("gradient_checkpoint", true)
        .field("vocab_size", 512usize)
        .build();

    let train_data = ConfigNode::builder(NodeKind::SeqPairGenerator)
        .field("data_settings", dataset_grid().expand())
        .field("max_instances_per_setting", 100usize)
        .field("enc_len", 1024usize)
        .field("dec_len", 128usize)
        .field("seed", 0usize)
        .field("model_tokenizer", model.clone())
        .build();

    let eval_data = ConfigNode::builder(NodeKind::SeqPairData)
        .field("tsv_path", "data/eval/seq2seq_eval.tsv")
        .field("enc_len", 1024usize)
        .field("dec_len", 128usize)
        .field("model_tokenizer", model.clone())
        .build();

    let optim = ConfigNode::builder(NodeKind::AdamW)
        .field("grad_accum_steps", 2usize)
        .field("lr", 1e-5)
        .field("weight_decay", 0.0)
        .field("beta1", 0.9)
        .field("beta2", 0.999)
        .field("eps", 1e-6)
        .build();

    let trainer = ConfigNode::builder(NodeKind::Trainer)
        .field("model", model)
        .field("optim", optim)
        .field("verbose", true)
        .build();

    let loss_eval = ConfigNode::builder(NodeKind::LossEval)
        .field("eval_data", eval_data.clone())
        .field("seed", 1usize)
        .field("bsize", 32usize)
        .field("eval_batches", 32usize)
        .field("verbose", false)
        .build();

    let generation_eval = ConfigNode::builder(NodeKind::GenerationEval)
        .field("eval_data", eval_data)
        .field("seed", 2usize)
        .field("bsize", 32usize)
        .field("eval_batches", ConfigValue::Null)
        .field("max_generation_len", 128usize)
        .field(
            "save_generations_path",
            format!("{SAVE_DIR}/greedy_eval.json"),
        )
        .field("verbose", true)
        .build();

    let evaluators = EvaluatorRegistry::new()
        .register(PRIMARY_EVALUATOR, loss_eval, evaluate_loss)
        .register("inference", generation_eval, evaluate_generation);

    let train_loop = ConfigNode::builder(NodeKind::TrainLoop)
        .field("train_data", train_data)
        .field("trainer", trainer)
        .field("seed", 3usize)
        .field("save_dir", SAVE_DIR)
        .field("max_checkpoints", ConfigValue::Null)
        .field("epochs", 10usize)
        .field("max_steps", ConfigValue::Null)
        .field("bsize", 8usize)
        .field("log_every", 256usize)
        .field("eval_every", 1024usize)
        .field("save_every", ConfigValue::Null)
        .field("save_only_at_end", false)
        .field("use_tracking", true)
        .field("project", "seq2seq_instruct_finetune")
        .field("run_name", RUN_NAME)
        .field("verbose", true)
        .build();

    Recipe {
        train_loop,
        evaluators,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::{deep_replace, parse_overrides, MetaConfig};
    use crate::data::DataSource;
    use crate::resolve::unroll;

    #[test]
    fn test_grid_expands_to_full_cross_product() {
        let settings = dataset_grid().expand();
        assert_eq!(settings.len(), 2 * 4 * 4 * 2);
        assert_eq!(dataset_grid().combinations(), settings.len());
    }

    #[test]
    fn test_recipe_tree_resolves_with_shared_model() {
        let recipe = instruction_tuning_recipe();
        let meta = MetaConfig::new("/tmp/recipe-test", false);
        let objects = unroll(&recipe.train_loop, &meta).expect("unroll");
        assert!(Arc::ptr_eq(objects.train_data.tokenizer(), objects.trainer.model()));
        assert_eq!(objects.epochs, 10);
        assert_eq!(objects.train_data.len(), 128 * 100);
    }

    #[test]
    fn test_recipe_accepts_standard_overrides() {
        let recipe = instruction_tuning_recipe();
        let overrides = parse_overrides([
            "trainer.optim.lr=0.0001",
            "epochs=1",
            "trainer.model.use_fp16=false",
        ])
        .expect("parse");
        let tree = deep_replace(&recipe.train_loop, &overrides).expect("apply");
        let meta = MetaConfig::new("/tmp/recipe-test", false);
        let objects = unroll(&tree, &meta).expect("unroll");
        assert_eq!(objects.epochs, 1);
        assert!((f64::from(objects.trainer.lr()) - 1e-4).abs() < 1e-9);
        // the model override traveled through the shared node
        assert!(!objects.train_data.tokenizer().use_fp16());
    }

    #[test]
    fn test_registered_evaluators() {
        let recipe = instruction_tuning_recipe();
        assert_eq!(recipe.evaluators.names(), vec!["data", "inference"]);
        let summary = recipe.evaluators.describe();
        assert_eq!(summary["data"]["kind"], "loss_eval");
        assert_eq!(summary["inference"]["kind"], "generation_eval");
    }
}
