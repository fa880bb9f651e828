//! Error metrics and the per-model metric report
//!
//! Metrics are computed per horizon step over every prediction record and
//! node, then averaged across steps for the aggregate. Values are in the
//! units of the input series.

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A metric value, or the marker for a metric that cannot be computed
///
/// Serialized as a number or the string `"undefined"`, so a report keeps
/// undefined values apart from metrics that were never computed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "MetricRepr", into = "MetricRepr")]
pub enum MetricValue {
    Value(f64),
    Undefined,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum MetricRepr {
    Value(f64),
    Marker(Marker),
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Marker {
    Undefined,
}

impl From<MetricRepr> for MetricValue {
    fn from(repr: MetricRepr) -> Self {
        match repr {
            MetricRepr::Value(v) => MetricValue::Value(v),
            MetricRepr::Marker(Marker::Undefined) => MetricValue::Undefined,
        }
    }
}

impl From<MetricValue> for MetricRepr {
    fn from(value: MetricValue) -> Self {
        match value {
            MetricValue::Value(v) => MetricRepr::Value(v),
            MetricValue::Undefined => MetricRepr::Marker(Marker::Undefined),
        }
    }
}

impl MetricValue {
    /// The numeric value, if defined
    pub fn value(&self) -> Option<f64> {
        match self {
            MetricValue::Value(v) => Some(*v),
            MetricValue::Undefined => None,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, MetricValue::Undefined)
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Value(v) => write!(f, "{:.6}", v),
            MetricValue::Undefined => write!(f, "undefined"),
        }
    }
}

/// Supported error metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Mae,
    Rmse,
    Mape,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Metric::Mae => "MAE",
            Metric::Rmse => "RMSE",
            Metric::Mape => "MAPE",
        };
        f.write_str(name)
    }
}

/// Horizon step (1-based) or the aggregate over all steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKey {
    Step(usize),
    Aggregate,
}

/// Metrics of one horizon step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepMetrics {
    /// 1-based horizon step
    pub step: usize,
    pub mae: f64,
    pub rmse: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub mape: Option<MetricValue>,
}

/// Mean of the per-step metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub mae: f64,
    pub rmse: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub mape: Option<MetricValue>,
}

/// All metrics of one model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub model: String,
    /// Number of evaluation pairs
    pub samples: usize,
    pub steps: Vec<StepMetrics>,
    pub aggregate: AggregateMetrics,
}

impl ModelMetrics {
    /// Assemble metrics from per-step values
    pub fn from_steps(model: impl Into<String>, samples: usize, steps: Vec<StepMetrics>) -> Result<Self> {
        if steps.is_empty() {
            return Err(ForecastError::Validation(
                "Metrics need at least one horizon step".to_string(),
            ));
        }

        let count = steps.len() as f64;
        let mae = steps.iter().map(|s| s.mae).sum::<f64>() / count;
        let rmse = steps.iter().map(|s| s.rmse).sum::<f64>() / count;

        let mape = if steps.iter().all(|s| s.mape.is_some()) {
            let values: Option<Vec<f64>> = steps
                .iter()
                .map(|s| s.mape.and_then(|m| m.value()))
                .collect();
            Some(match values {
                Some(values) => MetricValue::Value(values.iter().sum::<f64>() / count),
                None => MetricValue::Undefined,
            })
        } else {
            None
        };

        Ok(Self {
            model: model.into(),
            samples,
            steps,
            aggregate: AggregateMetrics { mae, rmse, mape },
        })
    }

    /// Look a single value up; `None` if the step or metric was not computed
    pub fn get(&self, key: StepKey, metric: Metric) -> Option<MetricValue> {
        let (mae, rmse, mape) = match key {
            StepKey::Aggregate => (self.aggregate.mae, self.aggregate.rmse, self.aggregate.mape),
            StepKey::Step(step) => {
                let s = self.steps.iter().find(|s| s.step == step)?;
                (s.mae, s.rmse, s.mape)
            }
        };

        match metric {
            Metric::Mae => Some(MetricValue::Value(mae)),
            Metric::Rmse => Some(MetricValue::Value(rmse)),
            Metric::Mape => mape,
        }
    }

    pub fn horizon(&self) -> usize {
        self.steps.len()
    }

    pub fn has_mape(&self) -> bool {
        self.aggregate.mape.is_some()
    }
}

/// Metrics of every evaluated model, keyed by model name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricReport {
    models: BTreeMap<String, ModelMetrics>,
}

impl MetricReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one model's metrics; a name may only appear once
    pub fn insert(&mut self, metrics: ModelMetrics) -> Result<()> {
        if self.models.contains_key(&metrics.model) {
            return Err(ForecastError::Validation(format!(
                "Metrics for model '{}' were already recorded",
                metrics.model
            )));
        }
        self.models.insert(metrics.model.clone(), metrics);
        Ok(())
    }

    /// Move every entry of `other` into this report
    pub fn merge(&mut self, other: MetricReport) -> Result<()> {
        for (_, metrics) in other.models {
            self.insert(metrics)?;
        }
        Ok(())
    }

    pub fn get(&self, model: &str, key: StepKey, metric: Metric) -> Option<MetricValue> {
        self.models.get(model)?.get(key, metric)
    }

    pub fn model(&self, name: &str) -> Option<&ModelMetrics> {
        self.models.get(name)
    }

    /// Models in name order
    pub fn models(&self) -> impl Iterator<Item = &ModelMetrics> {
        self.models.values()
    }

    pub fn model_names(&self) -> Vec<&str> {
        self.models.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl fmt::Display for MetricReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for metrics in self.models.values() {
            writeln!(f, "Model: {} ({} evaluation pairs)", metrics.model, metrics.samples)?;
            if metrics.has_mape() {
                writeln!(f, "{:>10} {:>14} {:>14} {:>14}", "step", "MAE", "RMSE", "MAPE")?;
            } else {
                writeln!(f, "{:>10} {:>14} {:>14}", "step", "MAE", "RMSE")?;
            }

            for s in &metrics.steps {
                write!(f, "{:>10} {:>14.6} {:>14.6}", s.step, s.mae, s.rmse)?;
                match s.mape {
                    Some(mape) => writeln!(f, " {:>14}", mape.to_string())?,
                    None => writeln!(f)?,
                }
            }

            let agg = &metrics.aggregate;
            write!(f, "{:>10} {:>14.6} {:>14.6}", "mean", agg.mae, agg.rmse)?;
            match agg.mape {
                Some(mape) => writeln!(f, " {:>14}", mape.to_string())?,
                None => writeln!(f)?,
            }
        }
        Ok(())
    }
}

fn check_lengths(predicted: &[f64], actual: &[f64]) -> Result<()> {
    if predicted.len() != actual.len() || predicted.is_empty() {
        return Err(ForecastError::Validation(
            "Predicted and actual values must have the same non-zero length".to_string(),
        ));
    }
    Ok(())
}

/// Mean absolute error
pub fn mean_absolute_error(predicted: &[f64], actual: &[f64]) -> Result<f64> {
    check_lengths(predicted, actual)?;
    let sum: f64 = predicted
        .iter()
        .zip(actual)
        .map(|(p, a)| (p - a).abs())
        .sum();
    Ok(sum / predicted.len() as f64)
}

/// Root mean squared error
pub fn root_mean_squared_error(predicted: &[f64], actual: &[f64]) -> Result<f64> {
    check_lengths(predicted, actual)?;
    let sum: f64 = predicted
        .iter()
        .zip(actual)
        .map(|(p, a)| (p - a).powi(2))
        .sum();
    Ok((sum / predicted.len() as f64).sqrt())
}

/// Mean absolute percentage error, in percent
///
/// Undefined when any actual value is zero.
pub fn mean_absolute_percentage_error(predicted: &[f64], actual: &[f64]) -> Result<MetricValue> {
    check_lengths(predicted, actual)?;
    if actual.iter().any(|&a| a == 0.0) {
        return Ok(MetricValue::Undefined);
    }
    let sum: f64 = predicted
        .iter()
        .zip(actual)
        .map(|(p, a)| ((p - a) / a).abs())
        .sum();
    Ok(MetricValue::Value(sum / predicted.len() as f64 * 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_undefined_serializes_as_marker() {
        let step = StepMetrics {
            step: 1,
            mae: 1.0,
            rmse: 1.0,
            mape: Some(MetricValue::Undefined),
        };
        let json = serde_json::to_string(&step).unwrap();
        assert!(json.contains(r#""mape":"undefined""#));
        let parsed: StepMetrics = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.mape, Some(MetricValue::Undefined));

        let value: MetricValue = serde_json::from_str("12.5").unwrap();
        assert_eq!(value, MetricValue::Value(12.5));
        assert!(serde_json::from_str::<MetricValue>(r#""nan""#).is_err());
    }

    #[test]
    fn test_point_metrics() {
        let predicted = [1.0, 2.0, 3.0];
        let actual = [2.0, 2.0, 5.0];
        assert_approx_eq!(mean_absolute_error(&predicted, &actual).unwrap(), 1.0);
        assert_approx_eq!(
            root_mean_squared_error(&predicted, &actual).unwrap(),
            (5.0f64 / 3.0).sqrt()
        );
        assert!(mean_absolute_error(&[], &[]).is_err());
    }

    #[test]
    fn test_mape_zero_actual_is_undefined() {
        let mape = mean_absolute_percentage_error(&[1.0, 1.0], &[0.0, 2.0]).unwrap();
        assert!(mape.is_undefined());
        assert_eq!(mape.to_string(), "undefined");
    }

    #[test]
    fn test_undefined_step_makes_aggregate_undefined() {
        let steps = vec![
            StepMetrics { step: 1, mae: 1.0, rmse: 1.0, mape: Some(MetricValue::Value(5.0)) },
            StepMetrics { step: 2, mae: 3.0, rmse: 3.0, mape: Some(MetricValue::Undefined) },
        ];
        let metrics = ModelMetrics::from_steps("m", 4, steps).unwrap();
        assert_eq!(metrics.aggregate.mae, 2.0);
        assert_eq!(metrics.aggregate.mape, Some(MetricValue::Undefined));
        assert_eq!(
            metrics.get(StepKey::Step(1), Metric::Mape),
            Some(MetricValue::Value(5.0))
        );
        assert_eq!(metrics.get(StepKey::Step(3), Metric::Mae), None);
    }

    #[test]
    fn test_report_rejects_duplicates() {
        let steps = vec![StepMetrics { step: 1, mae: 1.0, rmse: 1.0, mape: None }];
        let metrics = ModelMetrics::from_steps("m", 1, steps).unwrap();
        let mut report = MetricReport::new();
        report.insert(metrics.clone()).unwrap();
        assert!(report.insert(metrics).is_err());
        assert_eq!(report.len(), 1);
    }
}
