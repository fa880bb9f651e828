//! Descriptive statistics over slices
//!
//! All functions use population statistics (divide by `n`) and reject
//! empty input instead of returning `NaN`.

use crate::{MathError, Result};
use num_traits::Float;

fn length_as<T: Float>(values: &[T]) -> Result<T> {
    if values.is_empty() {
        return Err(MathError::InsufficientData(
            "Cannot compute a statistic over an empty slice".to_string(),
        ));
    }

    T::from(values.len()).ok_or_else(|| {
        MathError::CalculationError(format!(
            "Slice length {} is not representable as a float",
            values.len()
        ))
    })
}

/// Arithmetic mean
pub fn mean<T: Float>(values: &[T]) -> Result<T> {
    let n = length_as(values)?;
    let sum = values.iter().fold(T::zero(), |acc, &v| acc + v);
    Ok(sum / n)
}

/// Population variance
pub fn variance<T: Float>(values: &[T]) -> Result<T> {
    let n = length_as(values)?;
    let mean = mean(values)?;
    let sum_sq = values.iter().fold(T::zero(), |acc, &v| {
        let diff = v - mean;
        acc + diff * diff
    });
    Ok(sum_sq / n)
}

/// Population standard deviation
pub fn std_dev<T: Float>(values: &[T]) -> Result<T> {
    Ok(variance(values)?.sqrt())
}

/// Smallest and largest value. A `NaN` anywhere in the slice is an error.
pub fn min_max<T: Float>(values: &[T]) -> Result<(T, T)> {
    length_as(values)?;

    let mut min = T::infinity();
    let mut max = T::neg_infinity();
    for &value in values {
        if value.is_nan() {
            return Err(MathError::InvalidInput(
                "Cannot compute min/max of a slice containing NaN".to_string(),
            ));
        }
        min = min.min(value);
        max = max.max(value);
    }

    Ok((min, max))
}
