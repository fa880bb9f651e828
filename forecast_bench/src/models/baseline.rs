//! Naive baseline predictors
//!
//! Baselines need no training: `fit` is a no-op and `predict` works on a
//! fresh instance. Both are exactly deterministic.

use crate::config::TrainingConfig;
use crate::error::{ForecastError, Result};
use crate::models::{EpochProgress, FitReport, ForecastModel};
use crate::window::WindowPair;
use ndarray::{Array1, Array2, ArrayView2, Axis};
use stdnn_math::stats::mean;

fn check_horizon(horizon: usize) -> Result<()> {
    if horizon == 0 {
        return Err(ForecastError::InvalidParameter(
            "Horizon must be positive".to_string(),
        ));
    }
    Ok(())
}

fn check_window(name: &str, window: &ArrayView2<'_, f64>) -> Result<()> {
    if window.nrows() == 0 || window.ncols() == 0 {
        return Err(ForecastError::Validation(format!(
            "{} received an empty window",
            name
        )));
    }
    Ok(())
}

/// Repeat one row `horizon` times
fn repeat_row(row: &Array1<f64>, horizon: usize) -> Array2<f64> {
    Array2::from_shape_fn((horizon, row.len()), |(_, node)| row[node])
}

/// Persistence (last value) predictor
#[derive(Debug, Clone)]
pub struct Persistence {
    /// Name of the model
    name: String,
    /// Forecast horizon
    horizon: usize,
}

impl Persistence {
    pub const NAME: &'static str = "persistence";

    /// Create a persistence predictor for `horizon` steps
    pub fn new(horizon: usize) -> Result<Self> {
        check_horizon(horizon)?;
        Ok(Self {
            name: Self::NAME.to_string(),
            horizon,
        })
    }
}

impl ForecastModel for Persistence {
    fn name(&self) -> &str {
        &self.name
    }

    fn horizon(&self) -> usize {
        self.horizon
    }

    fn fit_with_progress(
        &mut self,
        _pairs: &[WindowPair],
        _config: &TrainingConfig,
        _progress: &mut dyn FnMut(&EpochProgress),
    ) -> Result<FitReport> {
        Ok(FitReport::no_op())
    }

    fn predict(&self, window: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        check_window(&self.name, &window)?;
        let last = window.row(window.nrows() - 1).to_owned();
        Ok(repeat_row(&last, self.horizon))
    }

    fn is_fitted(&self) -> bool {
        true
    }

    fn is_trainable(&self) -> bool {
        false
    }
}

/// Window-mean predictor
#[derive(Debug, Clone)]
pub struct MovingAverage {
    /// Name of the model
    name: String,
    /// Forecast horizon
    horizon: usize,
}

impl MovingAverage {
    pub const NAME: &'static str = "moving_average";

    /// Create a moving average predictor for `horizon` steps
    pub fn new(horizon: usize) -> Result<Self> {
        check_horizon(horizon)?;
        Ok(Self {
            name: Self::NAME.to_string(),
            horizon,
        })
    }
}

impl ForecastModel for MovingAverage {
    fn name(&self) -> &str {
        &self.name
    }

    fn horizon(&self) -> usize {
        self.horizon
    }

    fn fit_with_progress(
        &mut self,
        _pairs: &[WindowPair],
        _config: &TrainingConfig,
        _progress: &mut dyn FnMut(&EpochProgress),
    ) -> Result<FitReport> {
        Ok(FitReport::no_op())
    }

    fn predict(&self, window: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        check_window(&self.name, &window)?;

        // Summing in sorted order keeps the mean independent of row order, bit for bit.
        let means = window
            .axis_iter(Axis(1))
            .map(|column| {
                let mut values = column.to_vec();
                values.sort_by(f64::total_cmp);
                mean(&values)
            })
            .collect::<stdnn_math::Result<Vec<f64>>>()?;

        Ok(repeat_row(&Array1::from(means), self.horizon))
    }

    fn is_fitted(&self) -> bool {
        true
    }

    fn is_trainable(&self) -> bool {
        false
    }
}
