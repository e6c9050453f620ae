//! AdaFactor optimizer (vector-parameter variant)

use ndarray::Array1;

use super::Optimizer;

const EPSILON_1: f32 = 1e-30;
const EPSILON_2: f32 = 1e-3;

/// AdaFactor with the factored second moment degenerated to a single
/// vector, matching this crate's flat parameter layout.
///
/// The second-moment decay follows the schedule β̂2_t = 1 - t^(-0.8);
/// when `multiply_by_parameter_scale` is set, updates scale with the
/// parameter RMS as in the original formulation.
pub struct AdaFactor {
    lr: f32,
    multiply_by_parameter_scale: bool,
    t: u64,
    v: Option<Array1<f32>>,
}

impl AdaFactor {
    /// Create a new AdaFactor optimizer
    #[must_use]
    pub fn new(lr: f32, multiply_by_parameter_scale: bool) -> Self {
        Self {
            lr,
            multiply_by_parameter_scale,
            t: 0,
            v: None,
        }
    }

    /// Number of steps taken
    #[must_use]
    pub fn step_count(&self) -> u64 {
        self.t
    }
}

fn rms(values: &Array1<f32>) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    (values.iter().map(|x| x * x).sum::<f32>() / values.len() as f32).sqrt()
}

impl Optimizer for AdaFactor {
    fn step(&mut self, params: &mut Array1<f32>, grads: &Array1<f32>) {
        self.t += 1;
        let beta2_t = 1.0 - (self.t as f32).powf(-0.8);

        let v = self
            .v
            .get_or_insert_with(|| Array1::zeros(params.len()));

        let scale = if self.multiply_by_parameter_scale {
            rms(params).max(EPSILON_2)
        } else {
            1.0
        };

        for i in 0..params.len() {
            let g = grads[i];
            v[i] = beta2_t * v[i] + (1.0 - beta2_t) * (g * g + EPSILON_1);
            params[i] -= self.lr * scale * g / v[i].sqrt();
        }
    }

    fn lr(&self) -> f32 {
        self.lr
    }

    fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
    }

    fn name(&self) -> &'static str {
        "adafactor"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_moves_against_gradient() {
        let mut opt = AdaFactor::new(0.01, false);
        let mut params = Array1::from_vec(vec![1.0f32, -1.0]);
        let grads = Array1::from_vec(vec![1.0f32, -1.0]);

        opt.step(&mut params, &grads);
        assert!(params[0] < 1.0);
        assert!(params[1] > -1.0);
    }

    #[test]
    fn test_parameter_scale_amplifies_large_params() {
        let grads = Array1::from_vec(vec![1.0f32]);

        let mut plain = AdaFactor::new(0.01, false);
        let mut p1 = Array1::from_vec(vec![10.0f32]);
        plain.step(&mut p1, &grads);
        let plain_delta = 10.0 - p1[0];

        let mut scaled = AdaFactor::new(0.01, true);
        let mut p2 = Array1::from_vec(vec![10.0f32]);
        scaled.step(&mut p2, &grads);
        let scaled_delta = 10.0 - p2[0];

        assert!(scaled_delta > plain_delta);
    }

    #[test]
    fn test_rms_of_empty_is_zero() {
        assert_eq!(rms(&Array1::zeros(0)), 0.0);
    }
}
