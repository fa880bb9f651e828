//! Sliding-window construction and chronological splitting
//!
//! A [`Windower`] turns a [`Series`] into ordered (input window, horizon
//! target) pairs. [`split`] partitions those pairs by time so that no
//! evaluation window starts before every training target has ended.

use crate::data::Series;
use crate::error::{ForecastError, Result};
use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;
use tracing::debug;

/// One (input window, horizon target) pair
#[derive(Debug, Clone, PartialEq)]
pub struct WindowPair {
    index: usize,
    start: usize,
    input: Array2<f64>,
    target: Array2<f64>,
}

impl WindowPair {
    /// Build a pair from explicit matrices (rows are time steps, columns are nodes)
    pub fn new(index: usize, start: usize, input: Array2<f64>, target: Array2<f64>) -> Result<Self> {
        if input.nrows() == 0 || target.nrows() == 0 {
            return Err(ForecastError::Validation(
                "Window and target must both contain at least one time step".to_string(),
            ));
        }
        if input.ncols() != target.ncols() {
            return Err(ForecastError::Validation(format!(
                "Window has {} nodes but target has {}",
                input.ncols(),
                target.ncols()
            )));
        }

        Ok(Self {
            index,
            start,
            input,
            target,
        })
    }

    /// Position of the pair in the windowed sequence
    pub fn index(&self) -> usize {
        self.index
    }

    /// Series row at which the input window starts
    pub fn start(&self) -> usize {
        self.start
    }

    /// Series row one past the last input row (first target row)
    pub fn input_end(&self) -> usize {
        self.start + self.input.nrows()
    }

    /// Series row one past the last target row
    pub fn target_end(&self) -> usize {
        self.input_end() + self.target.nrows()
    }

    /// Input window, `window_size × nodes`
    pub fn input(&self) -> ArrayView2<'_, f64> {
        self.input.view()
    }

    /// Ground-truth horizon, `horizon × nodes`
    pub fn target(&self) -> ArrayView2<'_, f64> {
        self.target.view()
    }

    pub fn window_size(&self) -> usize {
        self.input.nrows()
    }

    pub fn horizon(&self) -> usize {
        self.target.nrows()
    }

    pub fn num_nodes(&self) -> usize {
        self.input.ncols()
    }
}

/// Sliding window generator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Windower {
    window_size: usize,
    horizon: usize,
    stride: usize,
}

impl Windower {
    /// Create a windower; all three sizes must be positive
    pub fn new(window_size: usize, horizon: usize, stride: usize) -> Result<Self> {
        if window_size == 0 {
            return Err(ForecastError::InvalidParameter(
                "Window size must be positive".to_string(),
            ));
        }
        if horizon == 0 {
            return Err(ForecastError::InvalidParameter(
                "Horizon must be positive".to_string(),
            ));
        }
        if stride == 0 {
            return Err(ForecastError::InvalidParameter(
                "Stride must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            window_size,
            horizon,
            stride,
        })
    }

    /// Smallest series length that yields one pair
    pub fn required_len(&self) -> usize {
        self.window_size + self.horizon
    }

    /// Number of pairs produced for a series of `len` observations
    pub fn num_pairs(&self, len: usize) -> usize {
        if len < self.required_len() {
            0
        } else {
            (len - self.required_len()) / self.stride + 1
        }
    }

    /// Slice `series` into ordered pairs
    pub fn build(&self, series: &Series) -> Result<Vec<WindowPair>> {
        let available = series.len();
        if available < self.required_len() {
            return Err(ForecastError::InsufficientData {
                required: self.required_len(),
                available,
            });
        }

        let count = self.num_pairs(available);
        let pairs: Vec<WindowPair> = (0..count)
            .into_par_iter()
            .map(|index| {
                let start = index * self.stride;
                let split = start + self.window_size;
                WindowPair {
                    index,
                    start,
                    input: series.rows(start, split).to_owned(),
                    target: series.rows(split, split + self.horizon).to_owned(),
                }
            })
            .collect();

        debug!(
            pairs = pairs.len(),
            window_size = self.window_size,
            horizon = self.horizon,
            stride = self.stride,
            "built window pairs"
        );
        Ok(pairs)
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
}

/// Slice `series` into (window, target) pairs offset by `stride`
pub fn build(
    series: &Series,
    window_size: usize,
    horizon: usize,
    stride: usize,
) -> Result<Vec<WindowPair>> {
    Windower::new(window_size, horizon, stride)?.build(series)
}

/// Chronological train/eval partition of window pairs
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSplit {
    train: Vec<WindowPair>,
    eval: Vec<WindowPair>,
    purged: usize,
}

impl DatasetSplit {
    pub fn train(&self) -> &[WindowPair] {
        &self.train
    }

    pub fn eval(&self) -> &[WindowPair] {
        &self.eval
    }

    /// Training-side pairs dropped because their target overlapped the evaluation period
    pub fn purged(&self) -> usize {
        self.purged
    }

    pub fn into_parts(self) -> (Vec<WindowPair>, Vec<WindowPair>) {
        (self.train, self.eval)
    }
}

/// Partition `pairs` chronologically
///
/// The last `round(len * eval_fraction)` pairs form the evaluation subset.
/// Earlier pairs whose target runs past the start of the first evaluation
/// window are purged, the rest form the training subset.
pub fn split(pairs: &[WindowPair], eval_fraction: f64) -> Result<DatasetSplit> {
    if !(eval_fraction > 0.0 && eval_fraction < 1.0) {
        return Err(ForecastError::InvalidSplit(format!(
            "Evaluation fraction must lie strictly between 0 and 1, got {}",
            eval_fraction
        )));
    }

    let total = pairs.len();
    let eval_len = (total as f64 * eval_fraction).round() as usize;
    if eval_len == 0 || eval_len >= total {
        return Err(ForecastError::InvalidSplit(format!(
            "Evaluation fraction {} of {} pairs leaves an empty subset",
            eval_fraction, total
        )));
    }

    let boundary = total - eval_len;
    let eval_start = pairs[boundary].start();
    let train: Vec<WindowPair> = pairs[..boundary]
        .iter()
        .take_while(|pair| pair.target_end() <= eval_start)
        .cloned()
        .collect();

    if train.is_empty() {
        return Err(ForecastError::InvalidSplit(format!(
            "No training pair ends before the evaluation period starts at row {} \
             ({} candidate pairs overlap it)",
            eval_start, boundary
        )));
    }

    let purged = boundary - train.len();
    debug!(
        train = train.len(),
        eval = eval_len,
        purged,
        "split window pairs"
    );

    Ok(DatasetSplit {
        train,
        eval: pairs[boundary..].to_vec(),
        purged,
    })
}
