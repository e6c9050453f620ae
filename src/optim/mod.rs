//! Optimizers
//!
//! The trainer drives optimizers through the [`Optimizer`] trait; AdamW
//! and AdaFactor are provided. [`OptimCell`] wraps a boxed optimizer with
//! its gradient-accumulation window so it can be shared behind an `Arc`.

mod adafactor;
mod adamw;

pub use adafactor::AdaFactor;
pub use adamw::AdamW;

use std::sync::Mutex;

use ndarray::Array1;

/// Trait for optimization algorithms
pub trait Optimizer: Send {
    /// Apply one update to `params` given accumulated `grads`
    fn step(&mut self, params: &mut Array1<f32>, grads: &Array1<f32>);

    /// Current learning rate
    fn lr(&self) -> f32;

    /// Replace the learning rate
    fn set_lr(&mut self, lr: f32);

    /// Algorithm name for logging
    fn name(&self) -> &'static str;
}

/// A shareable optimizer handle
///
/// Resolution hands the same cell to every consumer of an optimizer node;
/// the mutex confines mutation while the surrounding orchestration stays
/// single-flow.
pub struct OptimCell {
    /// Number of batches whose gradients accumulate before each step
    pub grad_accum_steps: usize,
    inner: Mutex<Box<dyn Optimizer>>,
}

impl OptimCell {
    /// Wrap an optimizer
    #[must_use]
    pub fn new(optimizer: Box<dyn Optimizer>, grad_accum_steps: usize) -> Self {
        Self {
            grad_accum_steps: grad_accum_steps.max(1),
            inner: Mutex::new(optimizer),
        }
    }

    /// Apply one optimizer step
    pub fn step(&self, params: &mut Array1<f32>, grads: &Array1<f32>) {
        lock(&self.inner).step(params, grads);
    }

    /// Current learning rate
    #[must_use]
    pub fn lr(&self) -> f32 {
        lock(&self.inner).lr()
    }

    /// Algorithm name
    #[must_use]
    pub fn algorithm(&self) -> &'static str {
        lock(&self.inner).name()
    }
}

impl std::fmt::Debug for OptimCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptimCell")
            .field("algorithm", &self.algorithm())
            .field("grad_accum_steps", &self.grad_accum_steps)
            .finish()
    }
}

fn lock(m: &Mutex<Box<dyn Optimizer>>) -> std::sync::MutexGuard<'_, Box<dyn Optimizer>> {
    m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
