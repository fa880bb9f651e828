//! Graph-based spatio-temporal forecaster ("GWN")
//!
//! A compact Graph WaveNet style model. For an input window `X`
//! (`window_size × nodes`) with `Z = Xᵀ`, the normalised forecast is
//!
//! ```text
//! Ŷᵀ = Z·W_t + A·Z·W_g + b
//! ```
//!
//! where `W_t` is a temporal projection shared by all nodes, `A` is a
//! row-stochastic adjacency (softmax of learned logits when adaptive) that
//! mixes information between nodes, `W_g` projects the mixed signal and `b`
//! is a per-step bias. Parameters are fitted with mini-batch RMSProp on the
//! mean squared error in normalised space.
//!
//! Per-sample gradients are computed in parallel but summed in batch order,
//! so a fixed seed reproduces the same parameters exactly.

use crate::config::{GwnConfig, TrainingConfig};
use crate::error::{ForecastError, Result};
use crate::models::{EpochProgress, FitReport, ForecastModel};
use crate::window::{split, WindowPair};
use ndarray::{Array, Array1, Array2, ArrayView2, Axis, Dimension};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;
use std::collections::BTreeMap;
use stdnn_math::activation::softmax_in_place;
use stdnn_math::{Normalizer, RmsProp};
use tracing::{debug, info, warn};

/// How nodes exchange information
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GraphMode {
    /// No graph term
    Disabled,
    /// Uniform mixing over all nodes
    Fixed,
    /// Mixing weights learned from data
    Adaptive,
}

impl From<&GwnConfig> for GraphMode {
    fn from(config: &GwnConfig) -> Self {
        match (config.gcn, config.adaptive_adjacency) {
            (false, _) => GraphMode::Disabled,
            (true, false) => GraphMode::Fixed,
            (true, true) => GraphMode::Adaptive,
        }
    }
}

/// Trainable parameters; also used as the gradient accumulator
#[derive(Debug, Clone, PartialEq)]
struct GwnParams {
    temporal: Array2<f64>,
    graph: Array2<f64>,
    adjacency_logits: Array2<f64>,
    bias: Array1<f64>,
}

impl GwnParams {
    fn zeros(window_size: usize, nodes: usize, horizon: usize) -> Self {
        Self {
            temporal: Array2::zeros((window_size, horizon)),
            graph: Array2::zeros((window_size, horizon)),
            adjacency_logits: Array2::zeros((nodes, nodes)),
            bias: Array1::zeros(horizon),
        }
    }

    fn random(window_size: usize, nodes: usize, horizon: usize, rng: &mut StdRng) -> Result<Self> {
        let std_dev = 1.0 / (window_size as f64).sqrt();
        let normal = Normal::new(0.0, std_dev)
            .map_err(|e| ForecastError::InvalidParameter(e.to_string()))?;

        let mut params = Self::zeros(window_size, nodes, horizon);
        params.temporal.mapv_inplace(|_| normal.sample(rng));
        params.graph.mapv_inplace(|_| normal.sample(rng) * 0.1);
        Ok(params)
    }

    fn add_assign(&mut self, other: &GwnParams) {
        self.temporal += &other.temporal;
        self.graph += &other.graph;
        self.adjacency_logits += &other.adjacency_logits;
        self.bias += &other.bias;
    }

    fn scale(&mut self, factor: f64) {
        self.temporal *= factor;
        self.graph *= factor;
        self.adjacency_logits *= factor;
        self.bias *= factor;
    }

    fn is_finite(&self) -> bool {
        self.temporal.iter().all(|v| v.is_finite())
            && self.graph.iter().all(|v| v.is_finite())
            && self.adjacency_logits.iter().all(|v| v.is_finite())
            && self.bias.iter().all(|v| v.is_finite())
    }

    /// Row-wise softmax of the adjacency logits
    fn adjacency(&self, mode: GraphMode) -> Option<Array2<f64>> {
        if mode == GraphMode::Disabled {
            return None;
        }

        let mut adjacency = self.adjacency_logits.clone();
        for mut row in adjacency.rows_mut() {
            if let Some(values) = row.as_slice_mut() {
                softmax_in_place(values);
            }
        }
        Some(adjacency)
    }

    /// Normalised forecast, `nodes × horizon`
    fn forward(&self, adjacency: Option<&Array2<f64>>, z: &Array2<f64>) -> Array2<f64> {
        let mut out = z.dot(&self.temporal);
        if let Some(adjacency) = adjacency {
            out += &adjacency.dot(z).dot(&self.graph);
        }
        out += &self.bias;
        out
    }

    /// Gradient of the squared error of one sample, and the loss itself
    fn sample_gradient(
        &self,
        mode: GraphMode,
        adjacency: Option<&Array2<f64>>,
        sample: &Sample,
    ) -> (GwnParams, f64) {
        let mixed = adjacency.map(|a| a.dot(&sample.z));

        let mut prediction = sample.z.dot(&self.temporal);
        if let Some(mixed) = &mixed {
            prediction += &mixed.dot(&self.graph);
        }
        prediction += &self.bias;

        let diff = prediction - &sample.y;
        let count = diff.len() as f64;
        let loss = diff.iter().map(|d| d * d).sum::<f64>() / count;
        let upstream = diff * (2.0 / count);

        let mut grads = GwnParams::zeros(self.temporal.nrows(), sample.z.nrows(), self.bias.len());
        grads.temporal = sample.z.t().dot(&upstream);
        grads.bias = upstream.sum_axis(Axis(0));

        if let (Some(adjacency), Some(mixed)) = (adjacency, &mixed) {
            grads.graph = mixed.t().dot(&upstream);
            if mode == GraphMode::Adaptive {
                let projected = sample.z.dot(&self.graph);
                let d_adjacency = upstream.dot(&projected.t());
                grads.adjacency_logits = softmax_backward(adjacency, &d_adjacency);
            }
        }

        (grads, loss)
    }
}

/// Back-propagate through a row-wise softmax
fn softmax_backward(probs: &Array2<f64>, upstream: &Array2<f64>) -> Array2<f64> {
    let mut out = Array2::zeros(probs.raw_dim());
    for ((p_row, g_row), mut out_row) in probs
        .rows()
        .into_iter()
        .zip(upstream.rows())
        .zip(out.rows_mut())
    {
        let dot: f64 = p_row.iter().zip(g_row.iter()).map(|(p, g)| p * g).sum();
        for ((o, p), g) in out_row.iter_mut().zip(p_row.iter()).zip(g_row.iter()) {
            *o = p * (g - dot);
        }
    }
    out
}

fn flat_mut<D: Dimension>(array: &mut Array<f64, D>) -> Result<&mut [f64]> {
    array.as_slice_mut().ok_or_else(|| {
        ForecastError::Validation("Parameter buffer is not contiguous".to_string())
    })
}

fn flat<D: Dimension>(array: &Array<f64, D>) -> Result<&[f64]> {
    array.as_slice().ok_or_else(|| {
        ForecastError::Validation("Gradient buffer is not contiguous".to_string())
    })
}

/// One optimiser per parameter tensor
#[derive(Debug, Clone)]
struct Optimizers {
    temporal: RmsProp,
    graph: RmsProp,
    adjacency_logits: RmsProp,
    bias: RmsProp,
}

impl Optimizers {
    fn new(params: &GwnParams, config: &TrainingConfig) -> Result<Self> {
        let lr = config.learning_rate;
        let wd = config.weight_decay;
        Ok(Self {
            temporal: RmsProp::new(lr, wd, params.temporal.len())?,
            graph: RmsProp::new(lr, wd, params.graph.len())?,
            adjacency_logits: RmsProp::new(lr, 0.0, params.adjacency_logits.len())?,
            bias: RmsProp::new(lr, 0.0, params.bias.len())?,
        })
    }

    fn step(&mut self, params: &mut GwnParams, grads: &GwnParams, mode: GraphMode) -> Result<()> {
        self.temporal
            .step(flat_mut(&mut params.temporal)?, flat(&grads.temporal)?)?;
        self.bias.step(flat_mut(&mut params.bias)?, flat(&grads.bias)?)?;
        if mode != GraphMode::Disabled {
            self.graph
                .step(flat_mut(&mut params.graph)?, flat(&grads.graph)?)?;
        }
        if mode == GraphMode::Adaptive {
            self.adjacency_logits.step(
                flat_mut(&mut params.adjacency_logits)?,
                flat(&grads.adjacency_logits)?,
            )?;
        }
        Ok(())
    }

    fn decay(&mut self, factor: f64) {
        self.temporal.decay_learning_rate(factor);
        self.graph.decay_learning_rate(factor);
        self.adjacency_logits.decay_learning_rate(factor);
        self.bias.decay_learning_rate(factor);
    }

    fn learning_rate(&self) -> f64 {
        self.temporal.learning_rate()
    }
}

/// A window pair in normalised, node-major form
#[derive(Debug, Clone)]
struct Sample {
    /// `nodes × window_size`
    z: Array2<f64>,
    /// `nodes × horizon`
    y: Array2<f64>,
}

fn to_node_major(values: ArrayView2<'_, f64>, normalizer: &Normalizer) -> Array2<f64> {
    Array2::from_shape_fn((values.ncols(), values.nrows()), |(node, t)| {
        normalizer.transform(node, values[[t, node]])
    })
}

/// Fitted state
#[derive(Debug, Clone)]
struct GwnState {
    params: GwnParams,
    normalizer: Normalizer,
    window_size: usize,
    nodes: usize,
}

/// Graph-based spatio-temporal forecaster
#[derive(Debug, Clone)]
pub struct GraphWaveNet {
    /// Name of the model
    name: String,
    horizon: usize,
    mode: GraphMode,
    state: Option<GwnState>,
}

impl GraphWaveNet {
    pub const NAME: &'static str = "GWN";

    /// Create an unfitted model predicting `horizon` steps
    pub fn new(horizon: usize, config: &GwnConfig) -> Result<Self> {
        if horizon == 0 {
            return Err(ForecastError::InvalidParameter(
                "Horizon must be positive".to_string(),
            ));
        }

        Ok(Self {
            name: Self::NAME.to_string(),
            horizon,
            mode: GraphMode::from(config),
            state: None,
        })
    }

    /// Learned adjacency (row-stochastic), once fitted and when the graph term is enabled
    pub fn adjacency(&self) -> Option<Array2<f64>> {
        self.state
            .as_ref()
            .and_then(|state| state.params.adjacency(self.mode))
    }

    fn check_pairs(&self, pairs: &[WindowPair]) -> Result<(usize, usize)> {
        let first = pairs.first().ok_or_else(|| {
            ForecastError::Validation("Cannot fit on an empty set of pairs".to_string())
        })?;
        let (window_size, nodes) = (first.window_size(), first.num_nodes());

        for pair in pairs {
            if pair.window_size() != window_size
                || pair.num_nodes() != nodes
                || pair.horizon() != self.horizon
            {
                return Err(ForecastError::Validation(format!(
                    "Pair {} has shape {}x{} -> {} but the model expects {}x{} -> {}",
                    pair.index(),
                    pair.window_size(),
                    pair.num_nodes(),
                    pair.horizon(),
                    window_size,
                    nodes,
                    self.horizon
                )));
            }
        }
        Ok((window_size, nodes))
    }

    /// Fit the normaliser on the distinct series rows covered by training inputs
    fn fit_normalizer(pairs: &[WindowPair], config: &TrainingConfig, nodes: usize) -> Result<Normalizer> {
        let mut rows: BTreeMap<usize, Vec<f64>> = BTreeMap::new();
        for pair in pairs {
            for (offset, row) in pair.input().rows().into_iter().enumerate() {
                rows.entry(pair.start() + offset)
                    .or_insert_with(|| row.to_vec());
            }
        }

        let columns: Vec<Vec<f64>> = (0..nodes)
            .map(|node| rows.values().map(|row| row[node]).collect())
            .collect();
        Ok(Normalizer::fit(config.norm_method, &columns)?)
    }

    fn batch_gradient(
        params: &GwnParams,
        mode: GraphMode,
        samples: &[Sample],
        batch: &[usize],
    ) -> (GwnParams, f64) {
        let adjacency = params.adjacency(mode);
        let per_sample: Vec<(GwnParams, f64)> = batch
            .par_iter()
            .map(|&i| params.sample_gradient(mode, adjacency.as_ref(), &samples[i]))
            .collect();

        let mut total = GwnParams::zeros(
            params.temporal.nrows(),
            params.adjacency_logits.nrows(),
            params.bias.len(),
        );
        let mut loss = 0.0;
        for (grads, sample_loss) in &per_sample {
            total.add_assign(grads);
            loss += sample_loss;
        }

        let n = batch.len() as f64;
        total.scale(1.0 / n);
        (total, loss / n)
    }

    fn mean_loss(params: &GwnParams, mode: GraphMode, samples: &[Sample]) -> f64 {
        if samples.is_empty() {
            return f64::NAN;
        }
        let adjacency = params.adjacency(mode);
        let losses: Vec<f64> = samples
            .par_iter()
            .map(|sample| {
                let diff = params.forward(adjacency.as_ref(), &sample.z) - &sample.y;
                diff.iter().map(|d| d * d).sum::<f64>() / diff.len() as f64
            })
            .collect();
        losses.iter().sum::<f64>() / samples.len() as f64
    }
}

impl ForecastModel for GraphWaveNet {
    fn name(&self) -> &str {
        &self.name
    }

    fn horizon(&self) -> usize {
        self.horizon
    }

    fn fit_with_progress(
        &mut self,
        pairs: &[WindowPair],
        config: &TrainingConfig,
        progress: &mut dyn FnMut(&EpochProgress),
    ) -> Result<FitReport> {
        config.validate()?;
        let (window_size, nodes) = self.check_pairs(pairs)?;

        let (train_pairs, valid_pairs) = if config.early_stop {
            match split(pairs, config.valid_fraction) {
                Ok(holdout) => holdout.into_parts(),
                Err(err) => {
                    warn!(error = %err, "cannot hold out validation pairs, early stopping disabled");
                    (pairs.to_vec(), Vec::new())
                }
            }
        } else {
            (pairs.to_vec(), Vec::new())
        };

        let normalizer = Self::fit_normalizer(&train_pairs, config, nodes)?;
        let to_sample = |pair: &WindowPair| Sample {
            z: to_node_major(pair.input(), &normalizer),
            y: to_node_major(pair.target(), &normalizer),
        };
        let train: Vec<Sample> = train_pairs.iter().map(to_sample).collect();
        let valid: Vec<Sample> = valid_pairs.iter().map(to_sample).collect();

        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut params = GwnParams::random(window_size, nodes, self.horizon, &mut rng)?;
        let mut optimizers = Optimizers::new(&params, config)?;
        let mut order: Vec<usize> = (0..train.len()).collect();

        info!(
            model = %self.name,
            train = train.len(),
            validation = valid.len(),
            window_size,
            nodes,
            horizon = self.horizon,
            "fitting"
        );

        let mut report = FitReport {
            epochs: 0,
            final_loss: None,
            best_validation_loss: None,
            converged: false,
            early_stopped: false,
        };
        let mut best_params: Option<GwnParams> = None;
        let mut checks_without_improvement = 0;
        let mut previous_loss: Option<f64> = None;

        for epoch in 1..=config.epochs {
            let last_good = params.clone();
            order.shuffle(&mut rng);
            for batch in order.chunks(config.batch_size) {
                let (grads, _) = Self::batch_gradient(&params, self.mode, &train, batch);
                optimizers.step(&mut params, &grads, self.mode)?;
            }

            let train_loss = Self::mean_loss(&params, self.mode, &train);
            if !train_loss.is_finite() || !params.is_finite() {
                warn!(model = %self.name, epoch, "training diverged, keeping parameters of the previous epoch");
                params = last_good;
                break;
            }
            report.epochs = epoch;
            report.final_loss = Some(train_loss);

            if config.exponential_decay_step > 0 && epoch % config.exponential_decay_step == 0 {
                optimizers.decay(config.decay_rate);
            }

            let mut validation_loss = None;
            if !valid.is_empty() && epoch % config.validate_freq == 0 {
                let loss = Self::mean_loss(&params, self.mode, &valid);
                validation_loss = Some(loss);
                match report.best_validation_loss {
                    Some(best) if loss >= best => checks_without_improvement += 1,
                    _ => {
                        report.best_validation_loss = Some(loss);
                        best_params = Some(params.clone());
                        checks_without_improvement = 0;
                    }
                }
            }

            progress(&EpochProgress {
                epoch,
                total_epochs: config.epochs,
                train_loss,
                validation_loss,
                learning_rate: optimizers.learning_rate(),
            });
            debug!(epoch, train_loss, ?validation_loss, "epoch finished");

            if !valid.is_empty() && checks_without_improvement >= config.patience {
                report.early_stopped = true;
                report.converged = true;
                break;
            }

            if let Some(previous) = previous_loss {
                let change = (previous - train_loss).abs() / previous.abs().max(f64::EPSILON);
                if change < config.tolerance {
                    report.converged = true;
                    break;
                }
            }
            previous_loss = Some(train_loss);
        }

        if let Some(best) = best_params {
            params = best;
        }
        if !report.converged {
            warn!(
                model = %self.name,
                epochs = report.epochs,
                tolerance = config.tolerance,
                "fit did not converge within the epoch budget"
            );
        }

        self.state = Some(GwnState {
            params,
            normalizer,
            window_size,
            nodes,
        });
        Ok(report)
    }

    fn predict(&self, window: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| ForecastError::NotFitted(self.name.clone()))?;

        if window.nrows() != state.window_size || window.ncols() != state.nodes {
            return Err(ForecastError::Validation(format!(
                "Window of shape {}x{} does not match the fitted shape {}x{}",
                window.nrows(),
                window.ncols(),
                state.window_size,
                state.nodes
            )));
        }

        let z = to_node_major(window, &state.normalizer);
        let adjacency = state.params.adjacency(self.mode);
        let normalized = state.params.forward(adjacency.as_ref(), &z);

        Ok(Array2::from_shape_fn((self.horizon, state.nodes), |(step, node)| {
            state.normalizer.inverse(node, normalized[[node, step]])
        }))
    }

    fn is_fitted(&self) -> bool {
        self.state.is_some()
    }
}
