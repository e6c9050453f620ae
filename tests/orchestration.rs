//! End-to-end orchestration: declare, override, resolve, train, evaluate

use std::path::Path;
use std::sync::Arc;

use ajustar::config::{
    deep_replace, parse_overrides, ConfigNode, ConfigValue, MetaConfig, NodeKind, NodeRef,
    SettingGrid,
};
use ajustar::data::DataSource;
use ajustar::eval::{
    evaluate_generation, evaluate_loss, EvalError, EvaluatorRegistry, PRIMARY_EVALUATOR,
};
use ajustar::resolve::unroll;
use ajustar::train::train_model;
use ajustar::Error;

const EVAL_TSV: &str = "data/eval.tsv";
const SAVE_DIR: &str = "outputs/test_run";

fn write_eval_tsv(root: &Path) {
    let dir = root.join("data");
    std::fs::create_dir_all(&dir).expect("create data dir");
    let lines: Vec<String> = (0..12)
        .map(|i| format!("translate sentence number {i} please\tsentence {i}"))
        .collect();
    std::fs::write(dir.join("eval.tsv"), lines.join("\n")).expect("write tsv");
}

/// A scaled-down version of the default recipe, fast enough for tests.
fn declare() -> (NodeRef, EvaluatorRegistry) {
    let model = ConfigNode::builder(NodeKind::Model)
        .field("model_str", "seq2seq-it")
        .field("checkpoint_path", ConfigValue::Null)
        .field("use_fp16", true)
        .field("gradient_checkpoint", false)
        .field("vocab_size", 64usize)
        .build();

    let settings = SettingGrid::new()
        .axis("add_task_definition", [true, false])
        .axis("num_pos_examples", [0i64, 2])
        .expand();

    let train_data = ConfigNode::builder(NodeKind::SeqPairGenerator)
        .field("data_settings", settings)
        .field("max_instances_per_setting", 8usize)
        .field("enc_len", 16usize)
        .field("dec_len", 8usize)
        .field("seed", 0usize)
        .field("model_tokenizer", model.clone())
        .build();

    let eval_data = ConfigNode::builder(NodeKind::SeqPairData)
        .field("tsv_path", EVAL_TSV)
        .field("enc_len", 16usize)
        .field("dec_len", 8usize)
        .field("model_tokenizer", model.clone())
        .build();

    let optim = ConfigNode::builder(NodeKind::AdamW)
        .field("grad_accum_steps", 1usize)
        .field("lr", 0.05)
        .field("weight_decay", 0.0)
        .field("beta1", 0.9)
        .field("beta2", 0.999)
        .field("eps", 1e-8)
        .build();

    let trainer = ConfigNode::builder(NodeKind::Trainer)
        .field("model", model)
        .field("optim", optim)
        .field("verbose", false)
        .build();

    let loss_eval = ConfigNode::builder(NodeKind::LossEval)
        .field("eval_data", eval_data.clone())
        .field("seed", 1usize)
        .field("bsize", 4usize)
        .field("eval_batches", ConfigValue::Null)
        .field("verbose", false)
        .build();

    let generation_eval = ConfigNode::builder(NodeKind::GenerationEval)
        .field("eval_data", eval_data)
        .field("seed", 2usize)
        .field("bsize", 4usize)
        .field("eval_batches", ConfigValue::Null)
        .field("max_generation_len", 8usize)
        .field("save_generations_path", format!("{SAVE_DIR}/greedy_eval.json"))
        .field("verbose", false)
        .build();

    let evaluators = EvaluatorRegistry::new()
        .register(PRIMARY_EVALUATOR, loss_eval, evaluate_loss)
        .register("inference", generation_eval, evaluate_generation);

    let train_loop = ConfigNode::builder(NodeKind::TrainLoop)
        .field("train_data", train_data)
        .field("trainer", trainer)
        .field("seed", 3usize)
        .field("save_dir", SAVE_DIR)
        .field("max_checkpoints", 2usize)
        .field("epochs", 2usize)
        .field("max_steps", ConfigValue::Null)
        .field("bsize", 4usize)
        .field("log_every", 2usize)
        .field("eval_every", 4usize)
        .field("save_every", 4usize)
        .field("save_only_at_end", false)
        .field("use_tracking", true)
        .field("project", "orchestration-test")
        .field("run_name", "run-e2e")
        .field("verbose", false)
        .build();

    (train_loop, evaluators)
}

#[test]
fn full_run_from_declaration_to_checkpoints() {
    let tmp = tempfile::tempdir().expect("tempdir");
    write_eval_tsv(tmp.path());
    let (tree, evaluators) = declare();

    // command-line style overrides
    let overrides = parse_overrides(["trainer.optim.lr=0.1", "epochs=3"]).expect("parse");
    let tree = deep_replace(&tree, &overrides).expect("apply");

    let meta = MetaConfig::new(tmp.path(), false);
    let mut objects = unroll(&tree, &meta).expect("unroll");
    let suite = evaluators.build(&meta).expect("build evaluators");
    objects.tracking.evaluator = Some(evaluators.describe());

    let report = train_model(&objects, &suite).expect("train");

    // 4 settings x 8 instances = 32 examples, bsize 4 -> 8 steps/epoch
    assert_eq!(report.steps, 24);
    assert_eq!(report.epochs_completed, 3);
    assert_eq!(report.evaluations, 6);
    assert!(report.final_checkpoint.exists());
    assert!(report.best_eval_loss.expect("eval ran") < 1.0);

    let out = tmp.path().join(SAVE_DIR);
    assert!(out.join("checkpoints/checkpoint_final.json").exists());
    assert!(out.join("checkpoints/checkpoint_best.json").exists());
    assert!(out.join("greedy_eval.json").exists());

    // tracked run carries the overridden values and the evaluator summary
    let run = report.run.expect("tracked run");
    assert_eq!(run.params["epochs"], serde_json::json!(3));
    assert_eq!(run.params["evaluator"]["inference"]["kind"], "generation_eval");
    assert!(tmp.path().join(format!("{SAVE_DIR}/runs/run-e2e.json")).exists());
}

#[test]
fn shared_model_resolves_once_per_call() {
    let tmp = tempfile::tempdir().expect("tempdir");
    write_eval_tsv(tmp.path());
    let (tree, _) = declare();
    let meta = MetaConfig::new(tmp.path(), false);

    let first = unroll(&tree, &meta).expect("first unroll");
    assert!(Arc::ptr_eq(first.train_data.tokenizer(), first.trainer.model()));

    // a second resolution succeeds and builds fresh objects
    let second = unroll(&tree, &meta).expect("second unroll");
    assert!(!Arc::ptr_eq(first.trainer.model(), second.trainer.model()));
    assert!(Arc::ptr_eq(second.train_data.tokenizer(), second.trainer.model()));
}

#[test]
fn evaluation_report_has_expected_shape() {
    let tmp = tempfile::tempdir().expect("tempdir");
    write_eval_tsv(tmp.path());
    let (tree, evaluators) = declare();
    let meta = MetaConfig::new(tmp.path(), false);

    let objects = unroll(&tree, &meta).expect("unroll");
    let suite = evaluators.build(&meta).expect("build");
    let outcome = suite.run(&objects.trainer).expect("run");

    let keys: Vec<&String> = outcome.report.keys().collect();
    assert_eq!(keys, vec!["data", "inference"]);
    let loss = outcome.report["data"]["loss"].as_f64().expect("loss");
    assert!((outcome.primary - loss).abs() < 1e-12);
    assert!(outcome.report["inference"]["f1"].is_number());
}

#[test]
fn failed_override_prevents_all_side_effects() {
    let tmp = tempfile::tempdir().expect("tempdir");
    write_eval_tsv(tmp.path());
    let (tree, _) = declare();

    let overrides = parse_overrides(["trainer.optim.no_such_field=1"]).expect("parse");
    let err = deep_replace(&tree, &overrides).expect_err("must fail");
    assert!(format!("{err}").contains("trainer.optim.no_such_field"));

    // nothing was created under the save dir
    assert!(!tmp.path().join(SAVE_DIR).exists());
}

#[test]
fn failed_resolution_prevents_training_and_names_culprit() {
    let tmp = tempfile::tempdir().expect("tempdir");
    // eval TSV deliberately absent
    let (tree, evaluators) = declare();
    let meta = MetaConfig::new(tmp.path(), false);

    // the training tree itself resolves (generator data needs no files)
    let objects = unroll(&tree, &meta).expect("unroll");

    // but the evaluator registry cannot be built
    let err = evaluators.build(&meta).expect_err("must fail");
    match err {
        EvalError::Resolve { name, source } => {
            assert_eq!(name, "data");
            assert!(format!("{source}").contains("eval_data"));
        }
        other => panic!("unexpected error {other}"),
    }

    // training never started; no checkpoint directory appeared
    assert!(!objects.save_dir.join("checkpoints").exists());
}

#[test]
fn missing_primary_evaluator_rejected_at_build_time() {
    let tmp = tempfile::tempdir().expect("tempdir");
    write_eval_tsv(tmp.path());
    let meta = MetaConfig::new(tmp.path(), false);

    let secondary_only = EvaluatorRegistry::new().register(
        "inference",
        ConfigNode::builder(NodeKind::LossEval)
            .field("eval_data", ConfigValue::Null)
            .field("seed", 0usize)
            .field("bsize", 1usize)
            .field("eval_batches", ConfigValue::Null)
            .field("verbose", false)
            .build(),
        evaluate_loss,
    );
    assert!(matches!(
        secondary_only.build(&meta).expect_err("must fail"),
        EvalError::MissingPrimary("data")
    ));
}

#[test]
fn training_reduces_the_primary_metric() {
    let tmp = tempfile::tempdir().expect("tempdir");
    write_eval_tsv(tmp.path());
    let (tree, evaluators) = declare();
    let overrides = parse_overrides(["trainer.optim.lr=0.1"]).expect("parse");
    let tree = deep_replace(&tree, &overrides).expect("apply");

    let meta = MetaConfig::new(tmp.path(), false);
    let objects = unroll(&tree, &meta).expect("unroll");
    let suite = evaluators.build(&meta).expect("build");

    let before = suite.run(&objects.trainer).expect("eval").primary;
    train_model(&objects, &suite).expect("train");
    let after = suite.run(&objects.trainer).expect("eval").primary;
    assert!(after < before, "expected {after} < {before}");
}

#[test]
fn cli_style_errors_surface_as_crate_errors() {
    let (tree, _) = declare();
    let overrides = parse_overrides(["epochs.too.deep=1"]).expect("parse");
    let err: Error = deep_replace(&tree, &overrides)
        .map(|_| ())
        .map_err(Error::from)
        .expect_err("must fail");
    assert!(matches!(err, Error::Override(_)));
}
