//! Cosine similarity

use crate::types::FeatureVector;

/// Why a pair of vectors has no similarity score
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CosineError {
    /// The left-hand vector has zero norm
    DegenerateLeft,
    /// The right-hand vector has zero norm
    DegenerateRight,
    DimensionMismatch { left: usize, right: usize },
}

/// `dot(a, b) / (|a| * |b|)`, accumulated in f64
///
/// Zero-norm inputs are reported rather than divided by, so the result is
/// never NaN for finite inputs. Rounding can push the quotient a hair past
/// ±1; it is clamped back into range.
pub fn cosine_similarity(a: &FeatureVector, b: &FeatureVector) -> Result<f64, CosineError> {
    if a.dim() != b.dim() {
        return Err(CosineError::DimensionMismatch {
            left: a.dim(),
            right: b.dim(),
        });
    }

    let norm_a = a.norm();
    if norm_a == 0.0 {
        return Err(CosineError::DegenerateLeft);
    }
    let norm_b = b.norm();
    if norm_b == 0.0 {
        return Err(CosineError::DegenerateRight);
    }

    let dot: f64 = a
        .values()
        .iter()
        .zip(b.values())
        .map(|(&x, &y)| x as f64 * y as f64)
        .sum();

    Ok((dot / (norm_a * norm_b)).clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fv(values: &[f32]) -> FeatureVector {
        FeatureVector::new(values.to_vec())
    }

    #[test]
    fn test_identical_vectors_score_one() {
        let a = fv(&[-210.5, 80.25, -3.0, 12.0]);
        let score = cosine_similarity(&a, &a.clone()).unwrap();
        assert!((score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_opposite_and_orthogonal() {
        assert!((cosine_similarity(&fv(&[1.0, 2.0]), &fv(&[-1.0, -2.0])).unwrap() + 1.0).abs() < 1e-12);
        assert!(cosine_similarity(&fv(&[1.0, 0.0]), &fv(&[0.0, 5.0])).unwrap().abs() < 1e-12);
    }

    #[test]
    fn test_symmetric() {
        let a = fv(&[0.3, -1.7, 4.2, 9.0]);
        let b = fv(&[2.5, 0.1, -3.3, 7.7]);
        assert_eq!(
            cosine_similarity(&a, &b).unwrap(),
            cosine_similarity(&b, &a).unwrap()
        );
    }

    #[test]
    fn test_zero_vector_is_degenerate() {
        let zero = fv(&[0.0, 0.0, 0.0]);
        let other = fv(&[1.0, 2.0, 3.0]);
        assert_eq!(cosine_similarity(&zero, &other), Err(CosineError::DegenerateLeft));
        assert_eq!(cosine_similarity(&other, &zero), Err(CosineError::DegenerateRight));
    }

    #[test]
    fn test_dimension_mismatch() {
        assert_eq!(
            cosine_similarity(&fv(&[1.0]), &fv(&[1.0, 2.0])),
            Err(CosineError::DimensionMismatch { left: 1, right: 2 })
        );
    }
}
