//! Chunk aggregation and L2 normalization.

use ndarray::{Array1, Array2, ArrayView1, Axis};

/// Added to the norm so an all-zero vector divides cleanly.
pub const NORM_EPSILON: f32 = 1e-12;

/// Scale `v` to unit length: `v / (‖v‖₂ + ε)`.
pub fn l2_normalize(v: ArrayView1<'_, f32>) -> Array1<f32> {
    let norm = v.dot(&v).sqrt();
    v.mapv(|x| x / (norm + NORM_EPSILON))
}

/// Collapse the raw vectors of one document's chunks into its document vector.
///
/// One chunk is normalized as is. Several are averaged with equal weight,
/// regardless of chunk length, and the mean is normalized. No chunks at all
/// yields the zero vector of `dimension`.
pub fn aggregate_document(chunk_vectors: &Array2<f32>, dimension: usize) -> Vec<f32> {
    match chunk_vectors.nrows() {
        0 => vec![0.0; dimension],
        1 => l2_normalize(chunk_vectors.row(0)).to_vec(),
        _ => match chunk_vectors.mean_axis(Axis(0)) {
            Some(mean) => l2_normalize(mean.view()).to_vec(),
            None => vec![0.0; dimension],
        },
    }
}

/// Euclidean length of `v`.
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_l2_normalize() {
        let v = array![3.0f32, 4.0];
        let normalized = l2_normalize(v.view());
        assert!((normalized[0] - 0.6).abs() < 1e-6);
        assert!((normalized[1] - 0.8).abs() < 1e-6);
        assert!((l2_norm(normalized.as_slice().unwrap()) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero_vector() {
        let v = array![0.0f32, 0.0, 0.0];
        let normalized = l2_normalize(v.view());
        assert_eq!(normalized, array![0.0f32, 0.0, 0.0]);
        assert!(normalized.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn single_chunk_is_normalized_directly() {
        let vectors = array![[0.0f32, 2.0]];
        assert_eq!(aggregate_document(&vectors, 2), vec![0.0, 1.0]);
    }

    #[test]
    fn chunks_are_averaged_with_equal_weight() {
        // mean of (1,0) and (0,1) is (0.5, 0.5); normalized that is (1/√2, 1/√2)
        let vectors = array![[1.0f32, 0.0], [0.0, 1.0]];
        let doc = aggregate_document(&vectors, 2);
        let expected = std::f32::consts::FRAC_1_SQRT_2;
        assert!((doc[0] - expected).abs() < 1e-6);
        assert!((doc[1] - expected).abs() < 1e-6);
    }

    #[test]
    fn mean_is_taken_before_normalizing() {
        // Normalizing each chunk first would give a different direction.
        let vectors = array![[10.0f32, 0.0], [0.0, 1.0]];
        let doc = aggregate_document(&vectors, 2);
        let mean = array![5.0f32, 0.5];
        let expected = l2_normalize(mean.view());
        assert!((doc[0] - expected[0]).abs() < 1e-6);
        assert!((doc[1] - expected[1]).abs() < 1e-6);
        assert!(doc[0] > 0.99);
    }

    #[test]
    fn no_chunks_yields_zero_vector() {
        let vectors = Array2::<f32>::zeros((0, 4));
        assert_eq!(aggregate_document(&vectors, 4), vec![0.0; 4]);
    }
}
