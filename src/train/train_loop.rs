//! Training-loop driver
//!
//! Consumes a resolved object set plus a built evaluation suite and owns
//! the run: epoch/step counting, periodic logging, periodic evaluation,
//! periodic checkpoints with retention, and experiment tracking. The
//! evaluator is invoked many times per run; an evaluator failure aborts
//! the run (after marking the tracked run failed) rather than being
//! retried or skipped.

use std::path::PathBuf;

use serde_json::json;

use super::checkpoint::CheckpointWriter;
use crate::data::DataSource;
use crate::error::Result;
use crate::eval::EvalSuite;
use crate::resolve::TrainObjects;
use crate::tracking::store::JsonFileStore;
use crate::tracking::{RunRecord, RunStatus, RunTracker};

/// Summary of one completed training run
#[derive(Debug)]
pub struct TrainReport {
    /// Total optimizer-visible steps taken
    pub steps: u64,
    /// Epochs fully completed
    pub epochs_completed: usize,
    /// Training loss of the last step
    pub final_train_loss: f32,
    /// Best primary metric seen across evaluation passes
    pub best_eval_loss: Option<f64>,
    /// Number of evaluation passes
    pub evaluations: usize,
    /// Path of the end-of-run checkpoint
    pub final_checkpoint: PathBuf,
    /// Persisted tracking record, when tracking was enabled
    pub run: Option<RunRecord>,
}

/// Run the training loop to completion.
///
/// Counters behave as configured: `log_every` / `eval_every` fire on step
/// multiples, `save_every` writes periodic checkpoints subject to
/// `max_checkpoints` retention, `max_steps` caps the run across epochs,
/// and `save_only_at_end` suppresses all mid-run saves.
pub fn train_model(objects: &TrainObjects, evaluator: &EvalSuite) -> Result<TrainReport> {
    let trainer = objects.trainer.as_ref();
    let mut writer =
        CheckpointWriter::new(objects.save_dir.join("checkpoints"), objects.max_checkpoints);

    let mut tracker = if objects.tracking.enabled {
        let mut t = RunTracker::start(
            objects.tracking.project.clone(),
            objects.tracking.run_name.clone(),
            JsonFileStore::new(objects.save_dir.join("runs")),
        );
        t.log_param("epochs", json!(objects.epochs));
        t.log_param("max_steps", json!(objects.max_steps));
        t.log_param("bsize", json!(objects.bsize));
        t.log_param("seed", json!(objects.seed));
        t.log_param("lr", json!(trainer.lr()));
        t.log_param("optimizer", json!(trainer.optim().algorithm()));
        t.log_param("model_str", json!(trainer.model().model_str()));
        t.log_param("train_examples", json!(objects.train_data.len()));
        if let Some(summary) = &objects.tracking.evaluator {
            t.log_param("evaluator", summary.clone());
        }
        Some(t)
    } else {
        None
    };

    let mut step: u64 = 0;
    let mut epochs_completed = 0usize;
    let mut last_loss = 0.0f32;
    let mut best_eval: Option<f64> = None;
    let mut evaluations = 0usize;

    'run: for epoch in 0..objects.epochs {
        let batches = objects
            .train_data
            .batches(objects.seed.wrapping_add(epoch as u64), objects.bsize);

        for batch in &batches {
            last_loss = trainer.train_step(batch);
            step += 1;

            if objects.log_every > 0 && step % objects.log_every as u64 == 0 {
                if let Some(t) = tracker.as_mut() {
                    t.log_metric("train_loss", f64::from(last_loss), step);
                }
                if objects.verbose {
                    println!("epoch {epoch} step {step}: loss {last_loss:.4}");
                }
            }

            if objects.eval_every > 0 && step % objects.eval_every as u64 == 0 {
                let outcome = match evaluator.run(trainer) {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        if let Some(t) = tracker.take() {
                            // best effort; the evaluator failure is the error to surface
                            let _ = t.finish(RunStatus::Failed);
                        }
                        return Err(e.into());
                    }
                };
                evaluations += 1;
                if let Some(t) = tracker.as_mut() {
                    t.log_metric("eval_loss", outcome.primary, step);
                }
                if objects.verbose {
                    println!("step {step}: eval loss {:.4}", outcome.primary);
                }

                let improved = best_eval.map_or(true, |b| outcome.primary < b);
                if improved {
                    best_eval = Some(outcome.primary);
                    if !objects.save_only_at_end {
                        let path = writer.save_best(&objects.model, step)?;
                        if let Some(t) = tracker.as_mut() {
                            t.log_artifact(path.display().to_string());
                        }
                    }
                }
            }

            if let Some(every) = objects.save_every {
                if !objects.save_only_at_end && every > 0 && step % every as u64 == 0 {
                    let path = writer.save_step(&objects.model, step)?;
                    if let Some(t) = tracker.as_mut() {
                        t.log_artifact(path.display().to_string());
                    }
                }
            }

            if objects.max_steps.is_some_and(|cap| step >= cap as u64) {
                trainer.finish_accumulation();
                break 'run;
            }
        }

        // do not drop a partial accumulation window at the epoch boundary
        trainer.finish_accumulation();
        epochs_completed += 1;
    }

    let final_checkpoint = writer.save_final(&objects.model, step)?;

    let run = match tracker {
        Some(mut t) => {
            t.log_artifact(final_checkpoint.display().to_string());
            Some(t.finish(RunStatus::Completed)?)
        }
        None => None,
    };

    Ok(TrainReport {
        steps: step,
        epochs_completed,
        final_train_loss: last_loss,
        best_eval_loss: best_eval,
        evaluations,
        final_checkpoint,
        run,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::{ConfigNode, ConfigValue, MetaConfig, NodeKind, NodeRef, SettingGrid};
    use crate::data::SeqPairGenerator;
    use crate::eval::{evaluate_loss, EvalArgs, EvaluatorRegistry, PRIMARY_EVALUATOR};
    use crate::model::Model;
    use crate::optim::{AdamW, OptimCell};
    use crate::resolve::TrackingConfig;
    use crate::train::Trainer;

    fn objects(save_dir: PathBuf, tracking: bool) -> TrainObjects {
        let model = Arc::new(Model::new("loop-test", None, false, false, 64).expect("model"));
        let settings = SettingGrid::new()
            .axis("add_task_definition", [true, false])
            .axis("num_pos_examples", [0i64, 1])
            .expand();
        let train_data = Arc::new(SeqPairGenerator::synthesize(
            &settings,
            model.clone(),
            8,
            16,
            8,
            0,
        ));
        let optim = Arc::new(OptimCell::new(
            Box::new(AdamW::new(0.05, 0.9, 0.999, 1e-8, 0.0)),
            1,
        ));
        let trainer = Arc::new(Trainer::new(model.clone(), optim, false));
        TrainObjects {
            model,
            train_data,
            trainer,
            seed: 3,
            save_dir,
            max_checkpoints: Some(2),
            epochs: 3,
            max_steps: None,
            bsize: 4,
            log_every: 2,
            eval_every: 4,
            save_every: Some(4),
            save_only_at_end: false,
            verbose: false,
            tracking: TrackingConfig {
                enabled: tracking,
                project: "loop-test".to_string(),
                run_name: "run-a".to_string(),
                evaluator: None,
            },
        }
    }

    fn eval_node(model_str: &str) -> NodeRef {
        let settings = SettingGrid::new().axis("flag", [true, false]).expand();
        let model = ConfigNode::builder(NodeKind::Model)
            .field("model_str", model_str)
            .field("checkpoint_path", ConfigValue::Null)
            .field("use_fp16", false)
            .field("gradient_checkpoint", false)
            .field("vocab_size", 64usize)
            .build();
        let data = ConfigNode::builder(NodeKind::SeqPairGenerator)
            .field("data_settings", settings)
            .field("max_instances_per_setting", 4usize)
            .field("enc_len", 16usize)
            .field("dec_len", 8usize)
            .field("seed", 0usize)
            .field("model_tokenizer", model)
            .build();
        ConfigNode::builder(NodeKind::LossEval)
            .field("eval_data", data)
            .field("seed", 1usize)
            .field("bsize", 4usize)
            .field("eval_batches", ConfigValue::Null)
            .field("verbose", false)
            .build()
    }

    fn suite() -> EvalSuite {
        let meta = MetaConfig::new("/tmp", false);
        EvaluatorRegistry::new()
            .register(PRIMARY_EVALUATOR, eval_node("loop-test"), evaluate_loss)
            .build(&meta)
            .expect("build suite")
    }

    #[test]
    fn test_full_run_trains_evaluates_and_checkpoints() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let objs = objects(tmp.path().join("out"), true);
        let report = train_model(&objs, &suite()).expect("train");

        // 32 examples, bsize 4 -> 8 steps/epoch, 3 epochs
        assert_eq!(report.steps, 24);
        assert_eq!(report.epochs_completed, 3);
        assert_eq!(report.evaluations, 6);
        assert!(report.best_eval_loss.is_some());
        assert!(report.final_checkpoint.exists());

        // retention: save_every=4 wrote 6 periodic checkpoints, cap keeps 2
        let ck_dir = tmp.path().join("out/checkpoints");
        let periodic: Vec<_> = std::fs::read_dir(&ck_dir)
            .expect("read dir")
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("checkpoint_step_"))
            .collect();
        assert_eq!(periodic.len(), 2);

        // tracking run persisted with both metric streams
        let run = report.run.expect("tracked run");
        assert_eq!(run.status, RunStatus::Completed);
        assert!(!run.metrics["train_loss"].is_empty());
        assert_eq!(run.metrics["eval_loss"].len(), 6);
        assert!(tmp.path().join("out/runs/run-a.json").exists());
    }

    #[test]
    fn test_training_improves_primary_metric() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let objs = objects(tmp.path().join("out"), false);
        let s = suite();
        let before = s.run(&objs.trainer).expect("eval").primary;
        let report = train_model(&objs, &s).expect("train");
        let after = s.run(&objs.trainer).expect("eval").primary;
        assert!(after < before, "expected {after} < {before}");
        assert!(report.run.is_none());
    }

    #[test]
    fn test_max_steps_caps_run() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let mut objs = objects(tmp.path().join("out"), false);
        objs.max_steps = Some(5);
        let report = train_model(&objs, &suite()).expect("train");
        assert_eq!(report.steps, 5);
        assert_eq!(report.epochs_completed, 0);
    }

    #[test]
    fn test_save_only_at_end_suppresses_periodic_saves() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let mut objs = objects(tmp.path().join("out"), false);
        objs.save_only_at_end = true;
        let report = train_model(&objs, &suite()).expect("train");
        assert!(report.final_checkpoint.exists());

        let ck_dir = tmp.path().join("out/checkpoints");
        let names: Vec<String> = std::fs::read_dir(&ck_dir)
            .expect("read dir")
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["checkpoint_final.json".to_string()]);
    }

    #[test]
    fn test_evaluator_failure_aborts_and_marks_run_failed() {
        fn broken(_: &Trainer, _: &EvalArgs) -> std::result::Result<serde_json::Value, String> {
            Err("broken evaluator".to_string())
        }

        let tmp = tempfile::tempdir().expect("tempdir");
        let objs = objects(tmp.path().join("out"), true);
        let meta = MetaConfig::new("/tmp", false);
        let suite = EvaluatorRegistry::new()
            .register(PRIMARY_EVALUATOR, eval_node("loop-test"), broken)
            .build(&meta)
            .expect("build");

        let err = train_model(&objs, &suite).expect_err("must fail");
        assert!(format!("{err}").contains("broken evaluator"));

        // the tracked run was persisted as failed
        let body = std::fs::read_to_string(tmp.path().join("out/runs/run-a.json"))
            .expect("run file");
        assert!(body.contains("\"failed\""));
    }
}
