//! AdamW optimizer (Adam with decoupled weight decay)

use ndarray::Array1;

use super::Optimizer;

/// AdamW optimizer
///
/// Weight decay applies directly to the parameters instead of being folded
/// into the gradient:
/// θ_t = (1 - lr * λ) * θ_{t-1} - lr * m̂_t / (√v̂_t + ε)
pub struct AdamW {
    lr: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    weight_decay: f32,
    t: u64,
    m: Option<Array1<f32>>,
    v: Option<Array1<f32>>,
}

impl AdamW {
    /// Create a new AdamW optimizer
    #[must_use]
    pub fn new(lr: f32, beta1: f32, beta2: f32, epsilon: f32, weight_decay: f32) -> Self {
        Self {
            lr,
            beta1,
            beta2,
            epsilon,
            weight_decay,
            t: 0,
            m: None,
            v: None,
        }
    }

    /// AdamW with conventional defaults (weight_decay = 0.01)
    #[must_use]
    pub fn default_params(lr: f32) -> Self {
        Self::new(lr, 0.9, 0.999, 1e-8, 0.01)
    }

    /// Number of steps taken
    #[must_use]
    pub fn step_count(&self) -> u64 {
        self.t
    }

    /// Weight decay hyperparameter
    #[must_use]
    pub fn weight_decay(&self) -> f32 {
        self.weight_decay
    }
}

impl Optimizer for AdamW {
    fn step(&mut self, params: &mut Array1<f32>, grads: &Array1<f32>) {
        self.t += 1;

        let m = self
            .m
            .get_or_insert_with(|| Array1::zeros(params.len()));
        let v = self
            .v
            .get_or_insert_with(|| Array1::zeros(params.len()));

        // Bias-corrected step size
        let lr_t = self.lr
            * ((1.0 - self.beta2.powi(self.t as i32)).sqrt()
                / (1.0 - self.beta1.powi(self.t as i32)));

        for i in 0..params.len() {
            let g = grads[i];
            m[i] = self.beta1 * m[i] + (1.0 - self.beta1) * g;
            v[i] = self.beta2 * v[i] + (1.0 - self.beta2) * g * g;

            params[i] = (1.0 - self.lr * self.weight_decay) * params[i]
                - lr_t * m[i] / (v[i].sqrt() + self.epsilon);
        }
    }

    fn lr(&self) -> f32 {
        self.lr
    }

    fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
    }

    fn name(&self) -> &'static str {
        "adamw"
    }
}
