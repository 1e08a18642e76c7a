use encoder::ndarray::Array2;
use encoder::{SparseEmbeddings, SpladeEncoder};

use crate::{SpladeConfig, SpladeError};

/// Embeddings and scores produced by [`run_inference`].
#[derive(Debug, Clone)]
pub struct InferenceOutcome {
    pub queries: SparseEmbeddings,
    pub documents: SparseEmbeddings,
    /// `(queries, documents)`.
    pub scores: Array2<f32>,
}

/// Inference flow: loads the encoder bound to the configured checkpoint,
/// encodes the queries and documents, and scores every pair.
pub fn run_inference(cfg: &SpladeConfig) -> Result<InferenceOutcome, SpladeError> {
    let encoder = SpladeEncoder::from_config(cfg.encoder_config())?;
    tracing::info!(
        model = %encoder.assets().model_path.display(),
        queries = cfg.inference.queries.len(),
        documents = cfg.inference.documents.len(),
        "running inference"
    );

    let queries = encoder.encode_query(&cfg.inference.queries)?;
    let documents = encoder.encode_document(&cfg.inference.documents)?;
    let scores = encoder.similarity(&queries, &documents)?;

    Ok(InferenceOutcome {
        queries,
        documents,
        scores,
    })
}

/// `[rows, cols]`, the way the shapes line is printed.
pub fn format_shape(embeddings: &SparseEmbeddings) -> String {
    let (rows, cols) = embeddings.shape();
    format!("[{rows}, {cols}]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_prints_like_a_list() {
        let emb = SparseEmbeddings::new(Array2::zeros((3, 30522)));
        assert_eq!(format_shape(&emb), "[3, 30522]");
    }
}
