use encoder::EncoderError;
use graph::GraphError;
use thiserror::Error;

use crate::config::ConfigLoadError;

/// Failures of the export and inference flows. None are recovered from.
#[derive(Debug, Error)]
pub enum SpladeError {
    #[error(transparent)]
    Config(#[from] ConfigLoadError),

    #[error("graph export failed: {0}")]
    Graph(#[from] GraphError),

    #[error("encoder failed: {0}")]
    Encoder(#[from] EncoderError),

    /// The exported files disagree with each other on the sample input.
    #[error("export verification failed: {0}")]
    Verification(String),

    #[error("failed to initialize logging: {0}")]
    Logging(String),
}
