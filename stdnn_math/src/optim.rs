//! Gradient-based optimisers
//!
//! Contains the RMSProp update rule with L2 weight decay folded
//! into the gradient, matching the usual deep-learning formulation:
//!
//! ```text
//! g = grad + weight_decay * param
//! v = alpha * v + (1 - alpha) * g^2
//! param -= lr * g / (sqrt(v) + eps)
//! ```

use crate::{MathError, Result};

/// RMSProp optimiser over a flat parameter buffer
#[derive(Debug, Clone)]
pub struct RmsProp {
    learning_rate: f64,
    alpha: f64,
    epsilon: f64,
    weight_decay: f64,
    square_avg: Vec<f64>,
}

impl RmsProp {
    /// Create an optimiser for `num_params` parameters
    pub fn new(learning_rate: f64, weight_decay: f64, num_params: usize) -> Result<Self> {
        if learning_rate <= 0.0 || !learning_rate.is_finite() {
            return Err(MathError::InvalidInput(
                "Learning rate must be a positive finite number".to_string(),
            ));
        }
        if weight_decay < 0.0 {
            return Err(MathError::InvalidInput(
                "Weight decay must not be negative".to_string(),
            ));
        }

        Ok(Self {
            learning_rate,
            alpha: 0.99,
            epsilon: 1e-8,
            weight_decay,
            square_avg: vec![0.0; num_params],
        })
    }

    /// Apply one update step
    pub fn step(&mut self, params: &mut [f64], grads: &[f64]) -> Result<()> {
        if params.len() != self.square_avg.len() || grads.len() != self.square_avg.len() {
            return Err(MathError::InvalidInput(format!(
                "Optimiser expects {} parameters, got {} parameters and {} gradients",
                self.square_avg.len(),
                params.len(),
                grads.len()
            )));
        }

        for ((param, &grad), avg) in params
            .iter_mut()
            .zip(grads.iter())
            .zip(self.square_avg.iter_mut())
        {
            let g = grad + self.weight_decay * *param;
            *avg = self.alpha * *avg + (1.0 - self.alpha) * g * g;
            *param -= self.learning_rate * g / (avg.sqrt() + self.epsilon);
        }

        Ok(())
    }

    /// Current learning rate
    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// Multiply the learning rate by `factor` (exponential decay schedule)
    pub fn decay_learning_rate(&mut self, factor: f64) {
        self.learning_rate *= factor;
    }
}
