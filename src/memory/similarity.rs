//! Cosine similarity between two embeddings.

use crate::error::ChatError;

/// Dot product divided by the product of magnitudes.
///
/// Returns a value in `[-1, 1]` for equal-length, non-zero vectors. Mismatched
/// lengths and zero-magnitude inputs are reported as errors instead of
/// producing `NaN`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32, ChatError> {
    if a.len() != b.len() {
        return Err(ChatError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Err(ChatError::ZeroVector);
    }

    let score = dot / (norm_a.sqrt() * norm_b.sqrt());
    // rounding can push parallel vectors a hair past 1.0
    Ok(score.clamp(-1.0, 1.0) as f32)
}
