//! Face embeddings and L2 normalization.
//!
//! Every embedding that enters the store or the matcher goes through
//! [`normalize`] first, so Euclidean distance between two normalized
//! embeddings is a monotonic function of their cosine similarity and does
//! not depend on the extractor's raw output scale.

use serde::{Deserialize, Serialize};

/// Scale `values` to unit Euclidean length.
///
/// A vector whose norm is zero (or not finite) cannot be normalized and is
/// returned unchanged. Callers must treat such a vector as non-matchable.
pub fn normalize(values: &[f32]) -> Vec<f32> {
    let norm = l2_norm(values);
    if norm == 0.0 || !norm.is_finite() {
        return values.to_vec();
    }
    values.iter().map(|&v| (f64::from(v) / norm) as f32).collect()
}

/// Accumulated in f64 so tiny components don't underflow and large ones
/// don't overflow the sum of squares.
fn l2_norm(values: &[f32]) -> f64 {
    values
        .iter()
        .map(|&v| f64::from(v) * f64::from(v))
        .sum::<f64>()
        .sqrt()
}

/// An embedding that has been passed through [`normalize`].
///
/// The only way to build one is [`NormalizedEmbedding::from_raw`], so a
/// value of this type is either unit length or null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<f32>", into = "Vec<f32>")]
pub struct NormalizedEmbedding {
    values: Vec<f32>,
}

impl NormalizedEmbedding {
    pub fn from_raw(raw: &[f32]) -> Self {
        Self {
            values: normalize(raw),
        }
    }

    /// True when the source vector could not be normalized (empty, all
    /// zeros, or non-finite). Null embeddings never match anything.
    pub fn is_null(&self) -> bool {
        let norm = l2_norm(&self.values);
        norm == 0.0 || !norm.is_finite()
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    /// Euclidean distance to `other`.
    ///
    /// Embeddings of different length come from different extractors and
    /// are reported as infinitely far apart instead of raising an error.
    pub fn distance(&self, other: &NormalizedEmbedding) -> f32 {
        if self.values.len() != other.values.len() {
            return f32::INFINITY;
        }
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

impl From<Vec<f32>> for NormalizedEmbedding {
    fn from(raw: Vec<f32>) -> Self {
        Self::from_raw(&raw)
    }
}

impl From<NormalizedEmbedding> for Vec<f32> {
    fn from(embedding: NormalizedEmbedding) -> Self {
        embedding.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_unit_length() {
        let inputs: [&[f32]; 4] = [
            &[3.0, 4.0],
            &[1.0, 1.0, 1.0, 1.0],
            &[-0.001, 0.002, 0.0005],
            &[120.0, -45.5, 3.25, 0.0, 9.0],
        ];
        for raw in inputs {
            let n = normalize(raw);
            assert!((l2_norm(&n) - 1.0).abs() < 1e-5, "norm of {raw:?} = {}", l2_norm(&n));
        }
    }

    #[test]
    fn test_normalize_extreme_magnitudes() {
        for raw in [[1e-25f32, 2e-25], [3e20, 4e20]] {
            let n = normalize(&raw);
            assert!((l2_norm(&n) - 1.0).abs() < 1e-5, "norm of {raw:?} = {}", l2_norm(&n));
            assert!(!NormalizedEmbedding::from_raw(&raw).is_null());
        }
        let n = normalize(&[3e20, 4e20]);
        assert!((n[0] - 0.6).abs() < 1e-6);
        assert!((n[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_infinite_component_is_null() {
        let raw = [f32::INFINITY, 1.0];
        assert!(NormalizedEmbedding::from_raw(&raw).is_null());
    }

    #[test]
    fn test_normalize_preserves_direction() {
        let n = normalize(&[3.0, 4.0]);
        assert!((n[0] - 0.6).abs() < 1e-6);
        assert!((n[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_zero_vector_unchanged() {
        let zero = vec![0.0f32; 8];
        assert_eq!(normalize(&zero), zero);
        assert!(NormalizedEmbedding::from_raw(&zero).is_null());
    }

    #[test]
    fn test_normalize_empty_vector() {
        assert!(normalize(&[]).is_empty());
        assert!(NormalizedEmbedding::from_raw(&[]).is_null());
    }

    #[test]
    fn test_normalize_non_finite_is_null() {
        let e = NormalizedEmbedding::from_raw(&[f32::NAN, 1.0]);
        assert!(e.is_null());
    }

    #[test]
    fn test_distance_identical_is_zero() {
        let a = NormalizedEmbedding::from_raw(&[0.2, 0.5, -0.1]);
        let b = a.clone();
        assert_eq!(a.distance(&b), 0.0);
    }

    #[test]
    fn test_distance_bounded_by_two() {
        let a = NormalizedEmbedding::from_raw(&[1.0, 0.0]);
        let b = NormalizedEmbedding::from_raw(&[-1.0, 0.0]);
        let c = NormalizedEmbedding::from_raw(&[0.0, 1.0]);
        assert!((a.distance(&b) - 2.0).abs() < 1e-6);
        let d = a.distance(&c);
        assert!(d > 0.0 && d <= 2.0);
        assert!((d - 2.0f32.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn test_distance_scale_invariant() {
        let a = NormalizedEmbedding::from_raw(&[1.0, 2.0, 3.0]);
        let b = NormalizedEmbedding::from_raw(&[100.0, 200.0, 300.0]);
        assert!(a.distance(&b) < 1e-6);
    }

    #[test]
    fn test_distance_dimension_mismatch_is_infinite() {
        let a = NormalizedEmbedding::from_raw(&[1.0, 0.0]);
        let b = NormalizedEmbedding::from_raw(&[1.0, 0.0, 0.0]);
        assert_eq!(a.distance(&b), f32::INFINITY);
    }

    #[test]
    fn test_deserialize_normalizes() {
        let e: NormalizedEmbedding = serde_json::from_str("[0.0, 5.0]").unwrap();
        assert_eq!(e.values(), &[0.0, 1.0]);
    }
}
