//! Greedy-generation evaluation
//!
//! Generates from every eval input and scores the output against the
//! reference with exact match and bag-of-tokens F1. Generations can be
//! dumped as JSON for inspection.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{json, Value as Json};

use super::EvalArgs;
use crate::data::DataSource;
use crate::train::Trainer;

/// Prebuilt arguments for [`evaluate_generation`]
#[derive(Debug)]
pub struct GenerationArgs {
    /// Evaluation dataset
    pub eval_data: Arc<dyn DataSource>,
    /// Shuffling seed
    pub seed: u64,
    /// Batch size
    pub bsize: usize,
    /// Cap on evaluated batches; `None` runs all of them
    pub eval_batches: Option<usize>,
    /// Maximum generated sequence length
    pub max_generation_len: usize,
    /// Where to write generations, already anchored at the project root
    pub save_generations_path: Option<PathBuf>,
    /// Verbose progress output
    pub verbose: bool,
}

/// Bag-of-tokens F1 between a generated sequence and its reference
fn token_f1(generated: &[u32], reference: &[u32]) -> f64 {
    if generated.is_empty() && reference.is_empty() {
        return 1.0;
    }
    if generated.is_empty() || reference.is_empty() {
        return 0.0;
    }
    let mut counts: HashMap<u32, i64> = HashMap::new();
    for &tok in reference {
        *counts.entry(tok).or_insert(0) += 1;
    }
    let mut overlap = 0i64;
    for &tok in generated {
        if let Some(c) = counts.get_mut(&tok) {
            if *c > 0 {
                *c -= 1;
                overlap += 1;
            }
        }
    }
    if overlap == 0 {
        return 0.0;
    }
    let precision = overlap as f64 / generated.len() as f64;
    let recall = overlap as f64 / reference.len() as f64;
    2.0 * precision * recall / (precision + recall)
}

/// Generate for the eval set and score against references.
///
/// Report shape:
/// `{"exact_match": f64, "f1": f64, "generated": n, "saved_to": path?}`.
pub fn evaluate_generation(inference: &Trainer, args: &EvalArgs) -> Result<Json, String> {
    let args = args.generation()?;

    let mut batches = args.eval_data.batches(args.seed, args.bsize);
    if let Some(cap) = args.eval_batches {
        batches.truncate(cap);
    }
    if batches.is_empty() {
        return Err("no evaluation batches".to_string());
    }

    let mut exact = 0usize;
    let mut f1_sum = 0.0f64;
    let mut count = 0usize;
    let mut dump = Vec::new();

    for batch in &batches {
        for (input, reference) in batch.inputs.iter().zip(&batch.targets) {
            let generated = inference.generate(input, args.max_generation_len);
            if generated == *reference {
                exact += 1;
            }
            f1_sum += token_f1(&generated, reference);
            count += 1;
            if args.save_generations_path.is_some() {
                dump.push(json!({
                    "input": input,
                    "reference": reference,
                    "generated": generated,
                }));
            }
        }
    }
    if args.verbose {
        println!("generation eval: {count} examples, {exact} exact");
    }

    let saved_to = match &args.save_generations_path {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| format!("cannot create {}: {e}", parent.display()))?;
            }
            let body = serde_json::to_string_pretty(&Json::Array(dump))
                .map_err(|e| format!("cannot serialize generations: {e}"))?;
            std::fs::write(path, body)
                .map_err(|e| format!("cannot write {}: {e}", path.display()))?;
            Some(path.display().to_string())
        }
        None => None,
    };

    Ok(json!({
        "exact_match": exact as f64 / count as f64,
        "f1": f1_sum / count as f64,
        "generated": count,
        "saved_to": saved_to,
    }))
}
