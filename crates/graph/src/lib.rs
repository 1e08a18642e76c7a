//! SPLADE graph export
//!
//! This crate turns a masked-language-model ONNX graph into the two files a
//! SPLADE deployment needs:
//!
//! - **Raw export** (`splade_raw.onnx`) - `input_ids`, `attention_mask` in,
//!   `logits` out, batch and sequence axes dynamic, opset 14.
//! - **Pooled export** (`splade_pooled.onnx`) - the same graph with the SPLADE
//!   head appended, producing `sparse_embedding` of shape `(batch, vocab)`.
//!
//! There is no tracing step here. We take the forward graph as ONNX
//! (Hugging Face checkpoints ship one under `onnx/model.onnx`), decode it with
//! `prost`, and rewrite the protobuf directly. That keeps the whole export
//! inside Rust and makes the output deterministic: same input, same bytes.
//!
//! ## Quick example
//!
//! ```no_run
//! use graph::{export_graphs, ExportConfig};
//! use std::path::Path;
//!
//! let cfg = ExportConfig::default();
//! let summary = export_graphs(Path::new("models/onnx/model.onnx"), &cfg).unwrap();
//! println!("raw: {} bytes", summary.raw.bytes);
//! println!("pooled: {} bytes", summary.pooled.bytes);
//! ```
//!
//! ## Things to know
//!
//! - Opsets 13 and 14 are accepted and stamped to 14. Newer graphs use
//!   operator versions ONNX Runtime 1.8 cannot load, so they are rejected.
//! - `token_type_ids` is folded into the graph as zeros.
//! - External tensor data is inlined on load; exports are single files.

pub mod builder;
pub mod fixtures;
pub mod proto;

mod config;
mod error;
mod export;
mod inspect;
mod io;
mod optimize;
mod pooled;
mod raw;

pub use crate::config::ExportConfig;
pub use crate::error::GraphError;
pub use crate::export::{
    export_graphs, export_model, prepare_for_runtime, ExportReport, ExportSummary,
};
pub use crate::inspect::{signature, GraphSignature, TensorSignature};
pub use crate::io::{decode_model, encode_model, load_model, load_model_from_bytes, save_model};
pub use crate::optimize::{optimize_graph, OptimizeStats};
pub use crate::pooled::{attach_splade_pooling, is_pooled};
pub use crate::raw::{prepare_raw, PreparedRaw};

pub use crate::builder::Dim;

/// Token id input, `(batch, seq_len)` int64.
pub const INPUT_IDS: &str = "input_ids";
/// Padding mask input, `(batch, seq_len)` int64, 1 for real tokens.
pub const ATTENTION_MASK: &str = "attention_mask";
/// Segment input of BERT-style checkpoints; folded to zeros on export.
pub const TOKEN_TYPE_IDS: &str = "token_type_ids";
/// Raw export output, `(batch, seq_len, vocab)` f32.
pub const LOGITS: &str = "logits";
/// Pooled export output, `(batch, vocab)` f32.
pub const SPARSE_EMBEDDING: &str = "sparse_embedding";

pub const BATCH_AXIS: &str = "batch";
pub const SEQUENCE_AXIS: &str = "seq_len";

/// IR version written into exports; the newest ONNX Runtime 1.8 loads.
pub const EXPORT_IR_VERSION: i64 = 7;
/// Oldest default-domain opset accepted as export input.
pub const MIN_SOURCE_OPSET: i64 = 13;
