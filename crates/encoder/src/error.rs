use graph::GraphError;
use std::io;
use thiserror::Error;

/// Errors surfaced while resolving, loading, or running a sparse encoder.
#[derive(Debug, Error)]
pub enum EncoderError {
    /// The ONNX model could not be located locally.
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    /// No tokenizer could be located or built.
    #[error("tokenizer missing: {0}")]
    TokenizerMissing(String),
    /// Configuration is inconsistent (e.g., empty model id or zero sequence length).
    #[error("invalid encoder config: {0}")]
    InvalidConfig(String),
    /// The hub answered 404 for the requested file.
    #[error("file not found on hub: {0}")]
    RemoteFileMissing(String),
    /// Unable to download remote assets.
    #[error("download failed: {0}")]
    Download(String),
    /// The model graph could not be read or normalized.
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),
    /// Tokenizer construction or encoding failed.
    #[error("tokenizer failure: {0}")]
    Tokenizer(String),
    /// ONNX Runtime errors.
    #[error("inference failure: {0}")]
    Inference(String),
    /// `encode` was called with no texts.
    #[error("no input texts to encode")]
    EmptyInput,
    /// Tensor shapes do not line up.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),
    /// The model output width differs from the configured vocabulary size.
    #[error("vocabulary size mismatch: expected {expected}, model produced {found}")]
    VocabMismatch { expected: usize, found: usize },
    /// Low-level IO failures while touching the filesystem.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}
