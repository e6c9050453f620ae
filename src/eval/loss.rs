//! Held-out loss evaluation

use std::sync::Arc;

use serde_json::{json, Value as Json};

use super::EvalArgs;
use crate::data::DataSource;
use crate::train::Trainer;

/// Prebuilt arguments for [`evaluate_loss`]
#[derive(Debug)]
pub struct LossArgs {
    /// Evaluation dataset
    pub eval_data: Arc<dyn DataSource>,
    /// Shuffling seed
    pub seed: u64,
    /// Batch size
    pub bsize: usize,
    /// Cap on evaluated batches; `None` runs all of them
    pub eval_batches: Option<usize>,
    /// Verbose progress output
    pub verbose: bool,
}

/// Mean loss over (up to `eval_batches`) batches of the eval dataset.
///
/// Report shape: `{"loss": f64, "batches": n, "examples": n}`.
pub fn evaluate_loss(inference: &Trainer, args: &EvalArgs) -> Result<Json, String> {
    let args = args.loss()?;

    let mut batches = args.eval_data.batches(args.seed, args.bsize);
    if let Some(cap) = args.eval_batches {
        batches.truncate(cap);
    }
    if batches.is_empty() {
        return Err("no evaluation batches".to_string());
    }

    let mut total = 0.0f64;
    let mut examples = 0usize;
    for batch in &batches {
        total += f64::from(inference.eval_loss(batch));
        examples += batch.len();
        if args.verbose {
            println!("eval loss batch {examples} examples, running mean {:.4}", total);
        }
    }

    Ok(json!({
        "loss": total / batches.len() as f64,
        "batches": batches.len(),
        "examples": examples,
    }))
}
