//! Sequence-pair datasets
//!
//! Two dataset flavors back the training loop: a fixed TSV-loaded eval set
//! and a settings-driven synthetic generator for training. Both share the
//! model's tokenizer/vocabulary and hand out shuffled [`Batch`]es from a
//! caller-supplied seed, so iteration order is reproducible per run.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::{rngs::StdRng, Rng, SeedableRng};
use thiserror::Error;

use crate::config::{ConfigValue, Setting};
use crate::model::Model;

/// One batch of tokenized input/target sequence pairs
#[derive(Debug, Clone, Default)]
pub struct Batch {
    /// Encoder-side token sequences
    pub inputs: Vec<Vec<u32>>,
    /// Decoder-side target token sequences
    pub targets: Vec<Vec<u32>>,
}

impl Batch {
    /// Number of examples in the batch
    #[must_use]
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    /// Whether the batch holds no examples
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}

/// Errors from dataset construction
#[derive(Debug, Error)]
pub enum DataError {
    #[error("cannot read dataset {path}: {message}")]
    Io { path: String, message: String },

    #[error("{path}:{line}: expected `input<TAB>target`")]
    BadRecord { path: String, line: usize },

    #[error("dataset {path} holds no usable records")]
    Empty { path: String },
}

/// A source of training or evaluation batches
pub trait DataSource: Send + Sync + fmt::Debug {
    /// Total number of examples
    fn len(&self) -> usize;

    /// Whether the source holds no examples
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shuffled batches for one pass; deterministic for a fixed seed
    fn batches(&self, seed: u64, bsize: usize) -> Vec<Batch>;

    /// The model whose tokenizer/vocabulary this source is aligned with
    fn tokenizer(&self) -> &Arc<Model>;
}

#[derive(Debug, Clone)]
struct SeqPair {
    input: Vec<u32>,
    target: Vec<u32>,
}

fn shuffled_batches(pairs: &[SeqPair], seed: u64, bsize: usize) -> Vec<Batch> {
    if pairs.is_empty() || bsize == 0 {
        return Vec::new();
    }
    let mut order: Vec<usize> = (0..pairs.len()).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    order.shuffle(&mut rng);

    order
        .chunks(bsize)
        .map(|chunk| Batch {
            inputs: chunk.iter().map(|&i| pairs[i].input.clone()).collect(),
            targets: chunk.iter().map(|&i| pairs[i].target.clone()).collect(),
        })
        .collect()
}

/// Fixed evaluation dataset loaded from a `input<TAB>target` TSV file
#[derive(Debug)]
pub struct SeqPairDataset {
    pairs: Vec<SeqPair>,
    model: Arc<Model>,
}

impl SeqPairDataset {
    /// Load and tokenize a TSV file.
    ///
    /// Blank lines are skipped; a line without a tab separator fails the
    /// whole load. Sequences truncate at `enc_len` / `dec_len`.
    pub fn from_tsv(
        path: &Path,
        enc_len: usize,
        dec_len: usize,
        model: Arc<Model>,
    ) -> Result<Self, DataError> {
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|e| DataError::Io {
            path: display.clone(),
            message: e.to_string(),
        })?;

        let mut pairs = Vec::new();
        for (lineno, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let (input, target) = line.split_once('\t').ok_or(DataError::BadRecord {
                path: display.clone(),
                line: lineno + 1,
            })?;
            pairs.push(SeqPair {
                input: model.tokenize(input, enc_len),
                target: model.tokenize(target, dec_len),
            });
        }
        if pairs.is_empty() {
            return Err(DataError::Empty { path: display });
        }
        Ok(Self { pairs, model })
    }
}

impl DataSource for SeqPairDataset {
    fn len(&self) -> usize {
        self.pairs.len()
    }

    fn batches(&self, seed: u64, bsize: usize) -> Vec<Batch> {
        shuffled_batches(&self.pairs, seed, bsize)
    }

    fn tokenizer(&self) -> &Arc<Model> {
        &self.model
    }
}

/// Settings-driven synthetic training generator
///
/// Each dataset setting contributes up to `max_instances_per_setting`
/// examples whose shape depends on the setting's option values (more
/// demonstrations, longer inputs). Targets are subsequences of their
/// inputs, so generation quality is measurable against references.
/// Generation is fully determined by `(settings, seed, model vocabulary)`.
#[derive(Debug)]
pub struct SeqPairGenerator {
    pairs: Vec<SeqPair>,
    num_settings: usize,
    model: Arc<Model>,
}

impl SeqPairGenerator {
    /// Synthesize the dataset
    #[must_use]
    pub fn synthesize(
        settings: &[Setting],
        model: Arc<Model>,
        max_instances_per_setting: usize,
        enc_len: usize,
        dec_len: usize,
        seed: u64,
    ) -> Self {
        let vocab = model.vocab_size() as u32;
        let mut pairs = Vec::with_capacity(settings.len() * max_instances_per_setting);

        for (idx, setting) in settings.iter().enumerate() {
            // per-setting stream: stable under reordering of other settings
            let mut rng = StdRng::seed_from_u64(seed ^ (idx as u64).wrapping_mul(0x9e37_79b9));
            let weight = setting_weight(setting);
            let input_len = (6 + 2 * weight as usize).min(enc_len.max(1));
            let target_len = (2 + weight as usize).min(dec_len.max(1));

            for _ in 0..max_instances_per_setting {
                let input: Vec<u32> =
                    (0..input_len).map(|_| rng.gen_range(1..vocab)).collect();
                // target = evenly-strided subsequence of the input
                let stride = (input.len() / target_len).max(1);
                let target: Vec<u32> =
                    input.iter().step_by(stride).take(target_len).copied().collect();
                pairs.push(SeqPair { input, target });
            }
        }

        Self {
            pairs,
            num_settings: settings.len(),
            model,
        }
    }

    /// Number of settings the generator was built from
    #[must_use]
    pub fn num_settings(&self) -> usize {
        self.num_settings
    }
}

impl DataSource for SeqPairGenerator {
    fn len(&self) -> usize {
        self.pairs.len()
    }

    fn batches(&self, seed: u64, bsize: usize) -> Vec<Batch> {
        shuffled_batches(&self.pairs, seed, bsize)
    }

    fn tokenizer(&self) -> &Arc<Model> {
        &self.model
    }
}

/// How "heavy" a setting is: numeric options add their value, enabled
/// flags add one. Drives example length so different settings produce
/// visibly different data.
fn setting_weight(setting: &Setting) -> u64 {
    setting
        .entries()
        .iter()
        .map(|(_, v)| match v {
            ConfigValue::Int(i) if *i > 0 => *i as u64,
            ConfigValue::Bool(true) => 1,
            _ => 0,
        })
        .sum()
}
