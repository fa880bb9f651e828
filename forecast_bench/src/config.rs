//! Experiment configuration
//!
//! [`ExperimentConfig`] is built once through [`ExperimentConfigBuilder`]
//! (or read from JSON) and validated before the experiment starts. After
//! that it is only ever read.

use crate::data::DEFAULT_GAP_TOLERANCE;
use crate::error::{ForecastError, Result};
use crate::models::registry::ModelKind;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use stdnn_math::NormMethod;

/// Hyperparameters for iterative model fitting
///
/// Baselines ignore these values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Maximum number of passes over the training pairs
    pub epochs: usize,
    /// Initial learning rate
    pub learning_rate: f64,
    /// Mini-batch size
    pub batch_size: usize,
    /// Normalisation applied to model inputs and targets
    pub norm_method: NormMethod,
    /// Hold out the tail of the training pairs and stop when validation loss stalls
    pub early_stop: bool,
    /// Fraction of training pairs held out for validation when `early_stop` is set
    pub valid_fraction: f64,
    /// Validation checks without improvement before stopping
    pub patience: usize,
    /// Validate every `validate_freq` epochs
    pub validate_freq: usize,
    /// Decay the learning rate every this many epochs (0 disables decay)
    pub exponential_decay_step: usize,
    /// Multiplicative learning rate decay factor
    pub decay_rate: f64,
    /// L2 penalty folded into the gradient
    pub weight_decay: f64,
    /// Relative change in training loss below which fitting counts as converged
    pub tolerance: f64,
    /// Seed for parameter initialisation and shuffling
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 50,
            learning_rate: 1e-4,
            batch_size: 32,
            norm_method: NormMethod::ZScore,
            early_stop: false,
            valid_fraction: 0.2,
            patience: 5,
            validate_freq: 1,
            exponential_decay_step: 5,
            decay_rate: 0.5,
            weight_decay: 1e-4,
            tolerance: 1e-6,
            seed: 0,
        }
    }
}

impl TrainingConfig {
    /// Check every field
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(ForecastError::InvalidParameter(
                "Epochs must be positive".to_string(),
            ));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(ForecastError::InvalidParameter(format!(
                "Learning rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.batch_size == 0 {
            return Err(ForecastError::InvalidParameter(
                "Batch size must be positive".to_string(),
            ));
        }
        if !(self.valid_fraction > 0.0 && self.valid_fraction < 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "Validation fraction must lie strictly between 0 and 1, got {}",
                self.valid_fraction
            )));
        }
        if self.validate_freq == 0 {
            return Err(ForecastError::InvalidParameter(
                "Validation frequency must be positive".to_string(),
            ));
        }
        if !(self.decay_rate > 0.0 && self.decay_rate <= 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "Decay rate must lie in (0, 1], got {}",
                self.decay_rate
            )));
        }
        if self.weight_decay < 0.0 {
            return Err(ForecastError::InvalidParameter(
                "Weight decay must not be negative".to_string(),
            ));
        }
        if self.tolerance < 0.0 {
            return Err(ForecastError::InvalidParameter(
                "Tolerance must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Options of the graph-based model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GwnConfig {
    /// Include the graph mixing term
    pub gcn: bool,
    /// Learn the adjacency instead of using uniform mixing
    pub adaptive_adjacency: bool,
}

impl Default for GwnConfig {
    fn default() -> Self {
        Self {
            gcn: true,
            adaptive_adjacency: true,
        }
    }
}

/// Which optional metrics the evaluator reports
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Mean absolute percentage error
    pub mape: bool,
}

/// Immutable configuration of one experiment run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    model: ModelKind,
    dataset: String,
    window_size: usize,
    horizon: usize,
    stride: usize,
    eval_fraction: f64,
    gap_tolerance: f64,
    baseline: bool,
    baseline_only: bool,
    baselines: Vec<ModelKind>,
    training: TrainingConfig,
    gwn: GwnConfig,
    metrics: MetricsConfig,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            model: ModelKind::Gwn,
            dataset: "JSE_clean_truncated".to_string(),
            window_size: 20,
            horizon: 5,
            stride: 1,
            eval_fraction: 0.2,
            gap_tolerance: DEFAULT_GAP_TOLERANCE,
            baseline: false,
            baseline_only: false,
            baselines: ModelKind::BASELINES.to_vec(),
            training: TrainingConfig::default(),
            gwn: GwnConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl ExperimentConfig {
    /// Start building a configuration for `model` (looked up by name at build time)
    pub fn builder<S: Into<String>>(model: S, window_size: usize, horizon: usize) -> ExperimentConfigBuilder {
        ExperimentConfigBuilder::new(model, window_size, horizon)
    }

    /// Read a configuration from a JSON file; missing fields take their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let value: serde_json::Value = serde_json::from_reader(BufReader::new(file))?;
        check_model_names(&value)?;
        let config: Self = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every field and the relations between them
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(ForecastError::InvalidParameter(
                "window_size must be positive".to_string(),
            ));
        }
        if self.horizon == 0 {
            return Err(ForecastError::InvalidParameter(
                "horizon must be positive".to_string(),
            ));
        }
        if self.stride == 0 {
            return Err(ForecastError::InvalidParameter(
                "stride must be at least 1".to_string(),
            ));
        }
        if !(self.eval_fraction > 0.0 && self.eval_fraction < 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "Evaluation fraction must lie strictly between 0 and 1, got {}",
                self.eval_fraction
            )));
        }
        if self.gap_tolerance < 1.0 {
            return Err(ForecastError::InvalidParameter(format!(
                "Gap tolerance must be at least 1 interval, got {}",
                self.gap_tolerance
            )));
        }
        if let Some(kind) = self.baselines.iter().find(|k| !k.is_baseline()) {
            return Err(ForecastError::InvalidParameter(format!(
                "'{}' is not a baseline model",
                kind
            )));
        }
        if self.baseline_only && self.baselines.is_empty() {
            return Err(ForecastError::InvalidParameter(
                "baseline_only requires at least one baseline".to_string(),
            ));
        }
        self.training.validate()
    }

    /// Primary model
    pub fn model(&self) -> ModelKind {
        self.model
    }

    /// Dataset label used in reports and output paths
    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Fraction of window pairs used for evaluation
    pub fn eval_fraction(&self) -> f64 {
        self.eval_fraction
    }

    /// Largest allowed gap between observations, in sampling intervals
    pub fn gap_tolerance(&self) -> f64 {
        self.gap_tolerance
    }

    /// Whether baselines are evaluated next to the primary model
    pub fn baseline(&self) -> bool {
        self.baseline || self.baseline_only
    }

    /// Whether only baselines run
    pub fn baseline_only(&self) -> bool {
        self.baseline_only
    }

    /// Baselines evaluated when `baseline()` is set
    pub fn baselines(&self) -> &[ModelKind] {
        &self.baselines
    }

    pub fn training(&self) -> &TrainingConfig {
        &self.training
    }

    pub fn gwn(&self) -> &GwnConfig {
        &self.gwn
    }

    pub fn metrics(&self) -> &MetricsConfig {
        &self.metrics
    }
}

/// Resolve `model` and `baselines` through the registry so a bad name surfaces
/// as [`ForecastError::UnknownModel`] rather than a JSON error
fn check_model_names(value: &serde_json::Value) -> Result<()> {
    if let Some(name) = value.get("model").and_then(serde_json::Value::as_str) {
        name.parse::<ModelKind>()?;
    }
    if let Some(names) = value.get("baselines").and_then(serde_json::Value::as_array) {
        for name in names.iter().filter_map(serde_json::Value::as_str) {
            name.parse::<ModelKind>()?;
        }
    }
    Ok(())
}

/// Builder for [`ExperimentConfig`]
#[derive(Debug, Clone)]
pub struct ExperimentConfigBuilder {
    model: String,
    baselines: Option<Vec<String>>,
    config: ExperimentConfig,
}

impl ExperimentConfigBuilder {
    fn new<S: Into<String>>(model: S, window_size: usize, horizon: usize) -> Self {
        Self {
            model: model.into(),
            baselines: None,
            config: ExperimentConfig {
                window_size,
                horizon,
                ..ExperimentConfig::default()
            },
        }
    }

    pub fn dataset<S: Into<String>>(mut self, dataset: S) -> Self {
        self.config.dataset = dataset.into();
        self
    }

    pub fn stride(mut self, stride: usize) -> Self {
        self.config.stride = stride;
        self
    }

    pub fn eval_fraction(mut self, eval_fraction: f64) -> Self {
        self.config.eval_fraction = eval_fraction;
        self
    }

    pub fn gap_tolerance(mut self, gap_tolerance: f64) -> Self {
        self.config.gap_tolerance = gap_tolerance;
        self
    }

    pub fn baseline(mut self, baseline: bool) -> Self {
        self.config.baseline = baseline;
        self
    }

    pub fn baseline_only(mut self, baseline_only: bool) -> Self {
        self.config.baseline_only = baseline_only;
        self
    }

    /// Baseline names, resolved through the model registry at build time
    pub fn baselines<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.baselines = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn training(mut self, training: TrainingConfig) -> Self {
        self.config.training = training;
        self
    }

    pub fn gwn(mut self, gwn: GwnConfig) -> Self {
        self.config.gwn = gwn;
        self
    }

    pub fn metrics(mut self, metrics: MetricsConfig) -> Self {
        self.config.metrics = metrics;
        self
    }

    /// Resolve model names and validate the configuration
    pub fn build(self) -> Result<ExperimentConfig> {
        let mut config = self.config;
        config.model = self.model.parse()?;
        if let Some(names) = self.baselines {
            config.baselines = names
                .iter()
                .map(|name| name.parse())
                .collect::<Result<Vec<ModelKind>>>()?;
        }
        config.validate()?;
        Ok(config)
    }
}
