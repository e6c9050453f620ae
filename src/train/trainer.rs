//! Trainer: binds the shared model to an optimizer
//!
//! The trainer performs gradient-accumulated training steps and doubles as
//! the live inference handle evaluators receive at dispatch time.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ndarray::Array1;

use crate::data::Batch;
use crate::model::Model;
use crate::optim::OptimCell;

#[derive(Debug)]
struct StepState {
    grad: Array1<f32>,
    pending: usize,
}

/// Trainer and inference handle
#[derive(Debug)]
pub struct Trainer {
    model: Arc<Model>,
    optim: Arc<OptimCell>,
    verbose: bool,
    state: Mutex<StepState>,
}

impl Trainer {
    /// Create a trainer over a shared model and optimizer
    #[must_use]
    pub fn new(model: Arc<Model>, optim: Arc<OptimCell>, verbose: bool) -> Self {
        let grad = Array1::zeros(model.num_params());
        Self {
            model,
            optim,
            verbose,
            state: Mutex::new(StepState { grad, pending: 0 }),
        }
    }

    /// The model this trainer updates (shared with data sources)
    #[must_use]
    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    /// The optimizer handle
    #[must_use]
    pub fn optim(&self) -> &Arc<OptimCell> {
        &self.optim
    }

    /// Verbose construction flag
    #[must_use]
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Current learning rate
    #[must_use]
    pub fn lr(&self) -> f32 {
        self.optim.lr()
    }

    /// One training step: accumulate gradients, apply the optimizer at
    /// each accumulation-window boundary. Returns the batch loss.
    pub fn train_step(&self, batch: &Batch) -> f32 {
        let mut state = self.lock_state();
        let loss = self.model.accumulate_grad(batch, &mut state.grad);
        state.pending += 1;

        if state.pending >= self.optim.grad_accum_steps {
            self.apply_pending(&mut state);
        }
        loss
    }

    /// Apply any gradients still pending in a partial accumulation window
    /// (called at epoch boundaries so no contribution is dropped)
    pub fn finish_accumulation(&self) {
        let mut state = self.lock_state();
        if state.pending > 0 {
            self.apply_pending(&mut state);
        }
    }

    /// Loss on a batch without touching gradients
    #[must_use]
    pub fn eval_loss(&self, batch: &Batch) -> f32 {
        self.model.loss(batch)
    }

    /// Greedy generation through the underlying model
    #[must_use]
    pub fn generate(&self, input: &[u32], max_len: usize) -> Vec<u32> {
        self.model.generate(input, max_len)
    }

    fn apply_pending(&self, state: &mut StepState) {
        let grad = state.grad.clone();
        self.model.with_params_mut(|params| self.optim.step(params, &grad));
        state.grad.fill(0.0);
        state.pending = 0;
    }

    fn lock_state(&self) -> MutexGuard<'_, StepState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
