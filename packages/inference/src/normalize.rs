//! # Probability Normalization
//! Model outputs may be logits or probabilities. Vectors whose sum is already
//! close to one are rescaled; everything else goes through softmax.

/// Lower bound (inclusive) of the sum treated as already normalized.
pub const NORMALIZED_SUM_MIN: f64 = 0.9;
/// Upper bound (inclusive) of the sum treated as already normalized.
pub const NORMALIZED_SUM_MAX: f64 = 1.1;

/// Whether a raw vector is treated as an approximate probability distribution.
pub fn is_approximately_normalized(raw: &[f64]) -> bool {
    let sum: f64 = raw.iter().sum();
    (NORMALIZED_SUM_MIN..=NORMALIZED_SUM_MAX).contains(&sum) && raw.iter().all(|&v| v >= 0.0)
}

/// Turn a raw model output into a probability distribution.
pub fn normalize(raw: &[f64]) -> Vec<f64> {
    if raw.is_empty() {
        return Vec::new();
    }
    if is_approximately_normalized(raw) {
        let sum: f64 = raw.iter().sum();
        raw.iter().map(|v| v / sum).collect()
    } else {
        softmax(raw)
    }
}

/// Softmax with the maximum subtracted before exponentiation.
pub fn softmax(raw: &[f64]) -> Vec<f64> {
    let max = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = raw.iter().map(|v| (v - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}
