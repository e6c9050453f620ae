//! Sequence model and tokenizer handle
//!
//! The orchestration core treats the model as an external collaborator
//! behind a narrow contract: tokenize text, score a batch, accumulate
//! gradients, generate greedily. The implementation here is a small
//! deterministic embedding-table model, enough to drive the trainer,
//! evaluators, and tests end to end without an ML framework.

use std::path::Path;
use std::sync::Mutex;

use ndarray::Array1;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::Batch;

/// Padding token id; excluded from loss and generation
pub const PAD_TOKEN: u32 = 0;

/// Generation emits a token once its weight crosses this threshold
const GENERATION_THRESHOLD: f32 = 0.5;

/// Errors from model construction and checkpoint exchange
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("cannot read checkpoint {path}: {message}")]
    CheckpointRead { path: String, message: String },

    #[error("checkpoint {path} holds {found} parameters, model expects {expected}")]
    CheckpointShape {
        path: String,
        expected: usize,
        found: usize,
    },
}

/// Serialized model state, written by the training loop and read back on
/// warm starts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCheckpoint {
    /// Identifier of the model the parameters belong to
    pub model_str: String,
    /// Global step at save time
    pub step: u64,
    /// Flat parameter vector
    pub params: Vec<f32>,
}

/// A small deterministic sequence model
///
/// Parameters form one embedding weight per vocabulary entry. Training
/// pushes the weights of observed target tokens toward 1.0; generation
/// emits input tokens whose weight has crossed a fixed threshold. The
/// model also owns tokenization so datasets can share its vocabulary.
#[derive(Debug)]
pub struct Model {
    model_str: String,
    use_fp16: bool,
    gradient_checkpoint: bool,
    vocab_size: usize,
    embedding: Mutex<Array1<f32>>,
}

impl Model {
    /// Construct a model, warm-starting from `checkpoint_path` when given.
    ///
    /// Without a checkpoint the embedding initializes deterministically
    /// from the model identifier, so equal configs build equal models.
    pub fn new(
        model_str: impl Into<String>,
        checkpoint_path: Option<&Path>,
        use_fp16: bool,
        gradient_checkpoint: bool,
        vocab_size: usize,
    ) -> Result<Self, ModelError> {
        let model_str = model_str.into();
        let embedding = match checkpoint_path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| ModelError::CheckpointRead {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?;
                let ckpt: ModelCheckpoint =
                    serde_json::from_str(&raw).map_err(|e| ModelError::CheckpointRead {
                        path: path.display().to_string(),
                        message: e.to_string(),
                    })?;
                if ckpt.params.len() != vocab_size {
                    return Err(ModelError::CheckpointShape {
                        path: path.display().to_string(),
                        expected: vocab_size,
                        found: ckpt.params.len(),
                    });
                }
                Array1::from_vec(ckpt.params)
            }
            None => {
                let mut rng = StdRng::seed_from_u64(fnv1a(&model_str));
                Array1::from_shape_fn(vocab_size, |_| rng.gen_range(-0.1..0.1f32))
            }
        };

        Ok(Self {
            model_str,
            use_fp16,
            gradient_checkpoint,
            vocab_size,
            embedding: Mutex::new(embedding),
        })
    }

    /// Model identifier
    #[must_use]
    pub fn model_str(&self) -> &str {
        &self.model_str
    }

    /// Mixed-precision flag (carried for logging; scoring is f32)
    #[must_use]
    pub fn use_fp16(&self) -> bool {
        self.use_fp16
    }

    /// Gradient checkpointing flag (carried for logging)
    #[must_use]
    pub fn gradient_checkpoint(&self) -> bool {
        self.gradient_checkpoint
    }

    /// Vocabulary size
    #[must_use]
    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    /// Number of trainable parameters
    #[must_use]
    pub fn num_params(&self) -> usize {
        self.vocab_size
    }

    /// Tokenize whitespace-separated text into vocabulary ids.
    ///
    /// Hash tokenization keeps datasets and model aligned on the same
    /// vocabulary without a learned tokenizer. Ids 0 (pad) is reserved.
    #[must_use]
    pub fn tokenize(&self, text: &str, max_len: usize) -> Vec<u32> {
        text.split_whitespace()
            .take(max_len)
            .map(|word| 1 + (fnv1a(word) % (self.vocab_size as u64 - 1)) as u32)
            .collect()
    }

    /// Mean squared distance of target-token weights from 1.0
    #[must_use]
    pub fn loss(&self, batch: &Batch) -> f32 {
        let emb = lock(&self.embedding);
        let mut sum = 0.0f32;
        let mut count = 0usize;
        for target in &batch.targets {
            for &tok in target {
                if tok == PAD_TOKEN {
                    continue;
                }
                let w = emb[tok as usize % self.vocab_size];
                sum += (w - 1.0) * (w - 1.0);
                count += 1;
            }
        }
        if count == 0 {
            0.0
        } else {
            sum / count as f32
        }
    }

    /// Accumulate the analytic gradient of [`Model::loss`] into `grad`,
    /// returning the batch loss
    pub fn accumulate_grad(&self, batch: &Batch, grad: &mut Array1<f32>) -> f32 {
        let emb = lock(&self.embedding);
        let mut sum = 0.0f32;
        let mut count = 0usize;
        for target in &batch.targets {
            for &tok in target {
                if tok == PAD_TOKEN {
                    continue;
                }
                count += 1;
            }
        }
        if count == 0 {
            return 0.0;
        }
        for target in &batch.targets {
            for &tok in target {
                if tok == PAD_TOKEN {
                    continue;
                }
                let idx = tok as usize % self.vocab_size;
                let w = emb[idx];
                sum += (w - 1.0) * (w - 1.0);
                grad[idx] += 2.0 * (w - 1.0) / count as f32;
            }
        }
        sum / count as f32
    }

    /// Greedy generation: emit input tokens whose weight has crossed the
    /// generation threshold, in input order, up to `max_len` tokens
    #[must_use]
    pub fn generate(&self, input: &[u32], max_len: usize) -> Vec<u32> {
        let emb = lock(&self.embedding);
        input
            .iter()
            .filter(|&&tok| {
                tok != PAD_TOKEN && emb[tok as usize % self.vocab_size] > GENERATION_THRESHOLD
            })
            .take(max_len)
            .copied()
            .collect()
    }

    /// Run `f` with mutable access to the parameter vector
    pub fn with_params_mut<R>(&self, f: impl FnOnce(&mut Array1<f32>) -> R) -> R {
        let mut emb = lock(&self.embedding);
        f(&mut emb)
    }

    /// Copy out the current parameters (checkpointing)
    #[must_use]
    pub fn params_snapshot(&self) -> Vec<f32> {
        lock(&self.embedding).to_vec()
    }
}

// A poisoned lock only happens after a panic elsewhere; recover the data
// rather than propagating the panic.
fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// FNV-1a hash; stable across runs and platforms, unlike `DefaultHasher`
#[must_use]
pub(crate) fn fnv1a(text: &str) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325u64;
    for byte in text.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}
