//! Forecasting models behind a uniform fit/predict contract
//!
//! Every variant, trainable or not, implements [`ForecastModel`]. The
//! experiment only ever talks to models through this trait, so variants can
//! be swapped by name through the [`registry`].

use crate::config::TrainingConfig;
use crate::error::Result;
use crate::window::WindowPair;
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

pub mod baseline;
pub mod gwn;
pub mod registry;

pub use baseline::{MovingAverage, Persistence};
pub use gwn::GraphWaveNet;
pub use registry::{ModelKind, ModelRegistry};

/// Outcome of fitting a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitReport {
    /// Epochs actually run
    pub epochs: usize,
    /// Mean training loss after the last epoch
    pub final_loss: Option<f64>,
    /// Best validation loss seen, when validation was used
    pub best_validation_loss: Option<f64>,
    /// Whether fitting met its stopping criterion before the epoch budget ran out
    pub converged: bool,
    /// Whether validation-based early stopping ended fitting
    pub early_stopped: bool,
}

impl FitReport {
    /// Report for models whose fit phase does nothing
    pub fn no_op() -> Self {
        Self {
            epochs: 0,
            final_loss: None,
            best_validation_loss: None,
            converged: true,
            early_stopped: false,
        }
    }
}

/// Progress notification emitted after every epoch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochProgress {
    pub epoch: usize,
    pub total_epochs: usize,
    pub train_loss: f64,
    pub validation_loss: Option<f64>,
    pub learning_rate: f64,
}

/// Common interface for forecasting models
pub trait ForecastModel: Debug + Send + Sync {
    /// Stable identifier used as the key in metric reports
    fn name(&self) -> &str;

    /// Number of steps every prediction covers
    fn horizon(&self) -> usize;

    /// Fit on training pairs, reporting each finished epoch to `progress`
    fn fit_with_progress(
        &mut self,
        pairs: &[WindowPair],
        config: &TrainingConfig,
        progress: &mut dyn FnMut(&EpochProgress),
    ) -> Result<FitReport>;

    /// Fit on training pairs
    fn fit(&mut self, pairs: &[WindowPair], config: &TrainingConfig) -> Result<FitReport> {
        self.fit_with_progress(pairs, config, &mut |_| {})
    }

    /// Predict `horizon × nodes` values following `window`
    fn predict(&self, window: ArrayView2<'_, f64>) -> Result<Array2<f64>>;

    /// Whether `predict` may be called
    fn is_fitted(&self) -> bool;

    /// Whether `fit` actually learns anything
    fn is_trainable(&self) -> bool {
        true
    }
}
