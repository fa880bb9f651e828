//! Activation functions

/// Numerically stable softmax, applied in place
///
/// An empty slice is left untouched.
pub fn softmax_in_place(values: &mut [f64]) {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return;
    }

    let mut sum = 0.0;
    for value in values.iter_mut() {
        *value = (*value - max).exp();
        sum += *value;
    }
    for value in values.iter_mut() {
        *value /= sum;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn softmax(values: &[f64]) -> Vec<f64> {
        let mut out = values.to_vec();
        softmax_in_place(&mut out);
        out
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let probs = softmax(&[1.0, 2.0, 3.0]);
        let total: f64 = probs.iter().sum();

        assert!((total - 1.0).abs() < 1e-12);
        assert!(probs[2] > probs[1] && probs[1] > probs[0]);
    }

    #[test]
    fn test_softmax_uniform_for_equal_logits() {
        let probs = softmax(&[0.0; 4]);
        for p in probs {
            assert!((p - 0.25).abs() < 1e-12);
        }
    }

    #[test]
    fn test_softmax_large_logits_do_not_overflow() {
        let probs = softmax(&[1000.0, 1000.0]);
        assert!((probs[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_softmax_empty_is_noop() {
        let mut values: [f64; 0] = [];
        softmax_in_place(&mut values);
        assert!(values.is_empty());
    }
}
