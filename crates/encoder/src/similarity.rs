use onnxruntime::ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::EncoderError;

/// Score between a query row and a document row.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityFunction {
    /// Plain inner product, the SPLADE training objective.
    #[default]
    Dot,
    /// Inner product of L2-normalized rows. Zero rows score 0.
    Cosine,
}

/// Scores every query row against every document row, giving `(m, n)` for
/// `queries: (m, V)` and `documents: (n, V)`.
pub fn similarity(
    function: SimilarityFunction,
    queries: ArrayView2<f32>,
    documents: ArrayView2<f32>,
) -> Result<Array2<f32>, EncoderError> {
    if queries.ncols() != documents.ncols() {
        return Err(EncoderError::ShapeMismatch(format!(
            "queries have {} dims, documents have {}",
            queries.ncols(),
            documents.ncols()
        )));
    }

    match function {
        SimilarityFunction::Dot => Ok(queries.dot(&documents.t())),
        SimilarityFunction::Cosine => {
            let queries = l2_normalized_rows(queries);
            let documents = l2_normalized_rows(documents);
            Ok(queries.dot(&documents.t()))
        }
    }
}

fn l2_normalized_rows(rows: ArrayView2<f32>) -> Array2<f32> {
    let mut out = rows.to_owned();
    for mut row in out.axis_iter_mut(Axis(0)) {
        let norm = row.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            row.mapv_inplace(|v| v / norm);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use onnxruntime::ndarray::array;

    #[test]
    fn dot_scores_every_pair() {
        let queries = array![[1.0f32, 0.0, 2.0]];
        let documents = array![[1.0f32, 1.0, 1.0], [0.0, 3.0, 0.0], [0.5, 0.0, 0.5]];

        let scores = similarity(SimilarityFunction::Dot, queries.view(), documents.view()).unwrap();
        assert_eq!(scores.dim(), (1, 3));
        assert_eq!(scores, array![[3.0f32, 0.0, 1.5]]);
    }

    #[test]
    fn cosine_ignores_magnitude() {
        let queries = array![[2.0f32, 0.0], [0.0, 0.0]];
        let documents = array![[5.0f32, 0.0], [0.0, 1.0]];

        let scores =
            similarity(SimilarityFunction::Cosine, queries.view(), documents.view()).unwrap();
        assert_eq!(scores.dim(), (2, 2));
        assert!((scores[[0, 0]] - 1.0).abs() < 1e-6);
        assert_eq!(scores[[0, 1]], 0.0);
        assert_eq!(scores[[1, 0]], 0.0);
    }

    #[test]
    fn mismatched_width_is_rejected() {
        let queries = array![[1.0f32, 2.0]];
        let documents = array![[1.0f32, 2.0, 3.0]];
        let err = similarity(SimilarityFunction::Dot, queries.view(), documents.view()).unwrap_err();
        assert!(matches!(err, EncoderError::ShapeMismatch(_)));
    }

    #[test]
    fn similarity_function_parses_lowercase() {
        let f: SimilarityFunction = serde_json::from_str("\"cosine\"").unwrap();
        assert_eq!(f, SimilarityFunction::Cosine);
    }
}
