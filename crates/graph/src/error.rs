use std::io;
use thiserror::Error;

/// Errors surfaced while reading, rewriting, or writing ONNX graphs.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The bytes are not a valid `ModelProto`.
    #[error("invalid onnx model: {0}")]
    Decode(#[from] prost::DecodeError),
    /// The model has no graph attached.
    #[error("model has no graph")]
    MissingGraph,
    /// The default-domain opset is outside the range this exporter can stamp.
    #[error("unsupported opset {found}: expected {min}..={target}")]
    UnsupportedOpset { found: i64, min: i64, target: i64 },
    /// A required model input is absent.
    #[error("model input `{0}` is missing")]
    MissingInput(String),
    /// The model declares an input the exported signature cannot carry.
    #[error("unexpected model input `{0}`")]
    UnexpectedInput(String),
    /// No output could be identified as the masked-language-model logits.
    #[error("no logits output found: {0}")]
    MissingLogits(String),
    /// A tensor or node name the rewrite wants to introduce is already taken.
    #[error("name `{0}` already exists in the graph")]
    NameCollision(String),
    /// Feature present in the model that the export cannot represent.
    #[error("unsupported model feature: {0}")]
    Unsupported(String),
    /// Initializer stored as external data could not be resolved.
    #[error("external data for `{tensor}`: {reason}")]
    ExternalData { tensor: String, reason: String },
    /// Low-level IO failures while touching the filesystem.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}
