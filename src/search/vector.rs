/// Vector similarity signal.

use crate::errors::EngineError;

/// Cosine similarity of two equal-length vectors, in [-1, 1].
///
/// Zero-norm inputs have no direction and score 0.0, as do vectors holding NaN or
/// infinite components. Unequal lengths mean the query and node vectors come from
/// different projector/model configurations.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64, EngineError> {
    if a.len() != b.len() {
        return Err(EngineError::DimensionMismatch {
            expected: b.len(),
            actual: a.len(),
        });
    }
    let (mut dot, mut na, mut nb) = (0.0f64, 0.0f64, 0.0f64);
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return Ok(0.0);
    }
    let cosine = dot / (na.sqrt() * nb.sqrt());
    if !cosine.is_finite() {
        return Ok(0.0);
    }
    Ok(cosine)
}

/// Cosine similarity clamped to [0, 1]; anti-correlated vectors score 0.
pub fn vector_score(query_embedding: &[f32], node_embedding: &[f32]) -> Result<f64, EngineError> {
    Ok(cosine_similarity(query_embedding, node_embedding)?.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_vectors_score_one() {
        let v = [0.3f32, -0.2, 0.9];
        assert!((vector_score(&v, &v).unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_negative_similarity_clamped() {
        let a = [1.0f32, 0.0];
        let b = [-1.0f32, 0.0];
        assert_eq!(vector_score(&a, &b).unwrap(), 0.0);
        assert!((cosine_similarity(&a, &b).unwrap() + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_vector_scores_zero() {
        assert_eq!(vector_score(&[0.0, 0.0], &[1.0, 2.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_non_finite_components_score_zero() {
        let clean = [1.0f32, 0.0];
        for bad in [[f32::NAN, 1.0], [f32::INFINITY, 1.0], [f32::NEG_INFINITY, 0.0]] {
            assert_eq!(cosine_similarity(&clean, &bad).unwrap(), 0.0, "{:?}", bad);
            assert_eq!(vector_score(&clean, &bad).unwrap(), 0.0, "{:?}", bad);
            assert_eq!(vector_score(&bad, &clean).unwrap(), 0.0, "{:?}", bad);
        }
        // a huge but finite component must not overflow into a NaN score
        let s = vector_score(&[f32::MAX, f32::MAX], &[1.0, 1.0]).unwrap();
        assert!((0.0..=1.0).contains(&s), "scored {}", s);
    }

    #[test]
    fn test_dimension_mismatch() {
        let err = vector_score(&[1.0, 2.0, 3.0], &[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, EngineError::DimensionMismatch { expected: 2, actual: 3 }));
    }
}
