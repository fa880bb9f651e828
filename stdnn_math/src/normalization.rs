//! Per-column normalisation
//!
//! A [`Normalizer`] is fitted on one column of values per variable and maps
//! every value `x` of column `c` to `(x - offset[c]) / scale[c]`. Columns
//! with (near) zero spread keep a scale of one so constant series survive
//! the round trip unchanged.

use crate::stats::{mean, min_max, std_dev};
use crate::{MathError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const MIN_SCALE: f64 = 1e-12;

/// Normalisation method applied to model inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormMethod {
    /// Subtract the mean, divide by the standard deviation
    #[default]
    ZScore,
    /// Rescale into `[0, 1]` using the observed minimum and maximum
    MinMax,
    /// Leave values untouched
    None,
}

impl FromStr for NormMethod {
    type Err = MathError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "z_score" | "zscore" | "z-score" => Ok(NormMethod::ZScore),
            "min_max" | "minmax" | "min-max" => Ok(NormMethod::MinMax),
            "none" | "identity" => Ok(NormMethod::None),
            other => Err(MathError::InvalidInput(format!(
                "Unknown normalisation method '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for NormMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NormMethod::ZScore => "z_score",
            NormMethod::MinMax => "min_max",
            NormMethod::None => "none",
        };
        f.write_str(name)
    }
}

/// Fitted per-column affine normalisation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Normalizer {
    method: NormMethod,
    offsets: Vec<f64>,
    scales: Vec<f64>,
}

impl Normalizer {
    /// Fit a normaliser with one entry per column
    pub fn fit(method: NormMethod, columns: &[Vec<f64>]) -> Result<Self> {
        if columns.is_empty() {
            return Err(MathError::InsufficientData(
                "At least one column is required to fit a normaliser".to_string(),
            ));
        }

        let mut offsets = Vec::with_capacity(columns.len());
        let mut scales = Vec::with_capacity(columns.len());

        for column in columns {
            let (offset, scale) = match method {
                NormMethod::ZScore => (mean(column)?, std_dev(column)?),
                NormMethod::MinMax => {
                    let (min, max) = min_max(column)?;
                    (min, max - min)
                }
                NormMethod::None => return Ok(Self::identity(columns.len())),
            };

            offsets.push(offset);
            scales.push(if scale.abs() < MIN_SCALE { 1.0 } else { scale });
        }

        Ok(Self {
            method,
            offsets,
            scales,
        })
    }

    /// Normaliser that leaves `columns` columns untouched
    pub fn identity(columns: usize) -> Self {
        Self {
            method: NormMethod::None,
            offsets: vec![0.0; columns],
            scales: vec![1.0; columns],
        }
    }

    /// The method this normaliser was fitted with
    pub fn method(&self) -> NormMethod {
        self.method
    }

    /// Number of columns
    pub fn num_columns(&self) -> usize {
        self.offsets.len()
    }

    /// Map a raw value of `column` into normalised space
    pub fn transform(&self, column: usize, value: f64) -> f64 {
        (value - self.offsets[column]) / self.scales[column]
    }

    /// Map a normalised value of `column` back into raw units
    pub fn inverse(&self, column: usize, value: f64) -> f64 {
        value * self.scales[column] + self.offsets[column]
    }

    /// Scale factor of `column`
    pub fn scale(&self, column: usize) -> f64 {
        self.scales[column]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_z_score_round_trip() {
        let columns = vec![vec![10.0, 20.0, 30.0, 40.0, 50.0]];
        let normalizer = Normalizer::fit(NormMethod::ZScore, &columns).unwrap();

        let z = normalizer.transform(0, 30.0);
        assert!(z.abs() < 1e-12);
        assert!((normalizer.inverse(0, normalizer.transform(0, 42.0)) - 42.0).abs() < 1e-9);
    }

    #[test]
    fn test_min_max_maps_into_unit_interval() {
        let columns = vec![vec![10.0, 20.0, 30.0], vec![-1.0, 1.0, 0.0]];
        let normalizer = Normalizer::fit(NormMethod::MinMax, &columns).unwrap();

        assert_eq!(normalizer.num_columns(), 2);
        assert!((normalizer.transform(0, 10.0) - 0.0).abs() < 1e-12);
        assert!((normalizer.transform(0, 30.0) - 1.0).abs() < 1e-12);
        assert!((normalizer.transform(1, 0.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_constant_column_keeps_unit_scale() {
        let columns = vec![vec![5.0, 5.0, 5.0]];
        let normalizer = Normalizer::fit(NormMethod::ZScore, &columns).unwrap();

        assert_eq!(normalizer.scale(0), 1.0);
        assert!((normalizer.transform(0, 5.0)).abs() < 1e-12);
    }

    #[test]
    fn test_parse_method() {
        assert_eq!("z_score".parse::<NormMethod>().unwrap(), NormMethod::ZScore);
        assert_eq!("MinMax".parse::<NormMethod>().unwrap(), NormMethod::MinMax);
        assert_eq!("none".parse::<NormMethod>().unwrap(), NormMethod::None);
        assert!("log".parse::<NormMethod>().is_err());
        assert_eq!(NormMethod::ZScore.to_string(), "z_score");
    }

    #[test]
    fn test_none_fits_identity() {
        let columns = vec![vec![1.0, 9.0], vec![-4.0, 4.0], vec![100.0, 200.0]];
        let normalizer = Normalizer::fit(NormMethod::None, &columns).unwrap();
        assert_eq!(normalizer, Normalizer::identity(3));
        assert_eq!(normalizer.method(), NormMethod::None);
        assert_eq!(normalizer.transform(2, 7.5), 7.5);
        assert_eq!(normalizer.inverse(1, -2.0), -2.0);
    }
}
