//! Similarity Evaluator: cosine distance between face embeddings
//!
//! distance = 1 − cos(a, b), in [0, 2]; 0 means same direction.

use crate::error::{KycError, Result};
use crate::NORM_EPSILON;

/// Cosine distance between two equal-length vectors.
///
/// Each vector is divided by `norm + ε`, so a zero vector normalises to
/// zero and sits at distance 1 from everything.
pub fn distance(a: &[f32], b: &[f32]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(KycError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let norm_a = norm(a) + NORM_EPSILON;
    let norm_b = norm(b) + NORM_EPSILON;
    let dot: f64 = a
        .iter()
        .zip(b)
        .map(|(&x, &y)| (x as f64 / norm_a) * (y as f64 / norm_b))
        .sum();

    Ok(1.0 - dot)
}

/// Similarity on the social scale: higher is more alike
pub fn similarity(a: &[f32], b: &[f32]) -> Result<f64> {
    distance(a, b).map(|d| 1.0 - d)
}

/// Same person iff `distance < threshold` (strict)
pub fn is_match(distance: f64, threshold: f64) -> bool {
    distance < threshold
}

fn norm(v: &[f32]) -> f64 {
    v.iter().map(|&x| (x as f64) * (x as f64)).sum::<f64>().sqrt()
}
