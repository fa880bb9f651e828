//! Scoring fitted models on evaluation pairs

use crate::config::MetricsConfig;
use crate::error::{ForecastError, Result};
use crate::metrics::{
    mean_absolute_error, mean_absolute_percentage_error, root_mean_squared_error, MetricReport,
    ModelMetrics, StepMetrics,
};
use crate::models::ForecastModel;
use crate::window::WindowPair;
use ndarray::Array2;
use rayon::prelude::*;
use tracing::debug;

/// One prediction next to its ground truth
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRecord {
    pub pair_index: usize,
    pub model: String,
    /// `horizon × nodes`
    pub predicted: Array2<f64>,
    /// `horizon × nodes`
    pub actual: Array2<f64>,
}

/// Computes per-step error metrics for fitted models
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    config: MetricsConfig,
}

impl Evaluator {
    pub fn new(config: MetricsConfig) -> Self {
        Self { config }
    }

    /// Predict every pair; records come back in pair order
    pub fn predict_all(
        &self,
        model: &dyn ForecastModel,
        pairs: &[WindowPair],
    ) -> Result<Vec<PredictionRecord>> {
        if pairs.is_empty() {
            return Err(ForecastError::Validation(
                "Cannot evaluate on an empty set of pairs".to_string(),
            ));
        }

        pairs
            .par_iter()
            .map(|pair| -> Result<PredictionRecord> {
                let predicted = model.predict(pair.input())?;
                if predicted.dim() != pair.target().dim() {
                    return Err(ForecastError::Validation(format!(
                        "Model '{}' predicted shape {:?} for pair {}, expected {:?}",
                        model.name(),
                        predicted.dim(),
                        pair.index(),
                        pair.target().dim()
                    )));
                }
                Ok(PredictionRecord {
                    pair_index: pair.index(),
                    model: model.name().to_string(),
                    predicted,
                    actual: pair.target().to_owned(),
                })
            })
            .collect()
    }

    /// Per-step metrics from prediction records
    ///
    /// Every record must share the shape of the first one.
    pub fn score(&self, model: &str, records: &[PredictionRecord]) -> Result<ModelMetrics> {
        let first = records.first().ok_or_else(|| {
            ForecastError::Validation("Cannot score an empty set of predictions".to_string())
        })?;
        let shape = first.actual.dim();
        if let Some(bad) = records
            .iter()
            .find(|r| r.actual.dim() != shape || r.predicted.dim() != shape)
        {
            return Err(ForecastError::Validation(format!(
                "Record for pair {} has predicted shape {:?} and actual shape {:?}, expected {:?}",
                bad.pair_index,
                bad.predicted.dim(),
                bad.actual.dim(),
                shape
            )));
        }
        let horizon = shape.0;

        let steps = (0..horizon)
            .map(|step| -> Result<StepMetrics> {
                let mut predicted = Vec::new();
                let mut actual = Vec::new();
                for record in records {
                    predicted.extend(record.predicted.row(step).iter().copied());
                    actual.extend(record.actual.row(step).iter().copied());
                }

                let mape = if self.config.mape {
                    Some(mean_absolute_percentage_error(&predicted, &actual)?)
                } else {
                    None
                };
                Ok(StepMetrics {
                    step: step + 1,
                    mae: mean_absolute_error(&predicted, &actual)?,
                    rmse: root_mean_squared_error(&predicted, &actual)?,
                    mape,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        ModelMetrics::from_steps(model, records.len(), steps)
    }

    /// Predict and score one model
    pub fn evaluate_model(&self, model: &dyn ForecastModel, pairs: &[WindowPair]) -> Result<ModelMetrics> {
        let records = self.predict_all(model, pairs)?;
        let metrics = self.score(model.name(), &records)?;
        debug!(
            model = model.name(),
            samples = metrics.samples,
            mae = metrics.aggregate.mae,
            rmse = metrics.aggregate.rmse,
            "evaluated"
        );
        Ok(metrics)
    }

    /// Metric report for a single model
    pub fn evaluate(&self, model: &dyn ForecastModel, pairs: &[WindowPair]) -> Result<MetricReport> {
        let mut report = MetricReport::new();
        report.insert(self.evaluate_model(model, pairs)?)?;
        Ok(report)
    }

    /// Evaluate several models concurrently over the same pairs
    pub fn evaluate_all(
        &self,
        models: &[&dyn ForecastModel],
        pairs: &[WindowPair],
    ) -> Result<MetricReport> {
        let results: Vec<ModelMetrics> = models
            .par_iter()
            .map(|model| self.evaluate_model(*model, pairs))
            .collect::<Result<Vec<_>>>()?;

        let mut report = MetricReport::new();
        for metrics in results {
            report.insert(metrics)?;
        }
        Ok(report)
    }
}
