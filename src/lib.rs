//! Workspace umbrella crate for the SPLADE sparse encoder.
//!
//! Two flows share one YAML configuration ([`SpladeConfig`]):
//!
//! - **Export** ([`run_export`]) takes the checkpoint's masked-LM ONNX graph
//!   and writes `splade_raw.onnx` (per-token logits) and `splade_pooled.onnx`
//!   (the same graph ending in `max_t log(1 + relu(x))`), then checks the two
//!   against each other on a sample text.
//! - **Inference** ([`run_inference`]) encodes the configured queries and
//!   documents and scores every pair.
//!
//! The graph rewriting lives in [`graph`], tokenization and ONNX Runtime in
//! [`encoder`]; both are re-exported here.
//!
//! ## Quick example
//!
//! ```no_run
//! use splade::{run_inference, SpladeConfig};
//!
//! let cfg = SpladeConfig::default();
//! let outcome = run_inference(&cfg).unwrap();
//! println!("{}", outcome.scores);
//! ```

pub mod config;
pub mod error;

mod export;
mod inference;
mod logging;

pub use encoder;
pub use graph;

pub use crate::config::{
    CheckpointYamlConfig, ConfigLoadError, ExportYamlConfig, InferenceYamlConfig,
    LoggingYamlConfig, SpladeConfig,
};
pub use crate::error::SpladeError;
pub use crate::export::{display_path, run_export, ExportOutcome, Verification};
pub use crate::inference::{format_shape, run_inference, InferenceOutcome};
pub use crate::logging::init_logging;
