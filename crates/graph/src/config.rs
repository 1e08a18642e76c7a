use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Settings for the raw and pooled graph exports.
///
/// # Example
/// ```
/// use graph::ExportConfig;
///
/// let cfg = ExportConfig {
///     output_dir: "target/exports".into(),
///     ..Default::default()
/// };
/// assert_eq!(cfg.opset_version, 14);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExportConfig {
    /// Default-domain opset stamped on both exports. Source graphs may use
    /// any opset from 13 up to this value.
    pub opset_version: i64,
    /// Fold constants, then prune identities, dead nodes, and unused
    /// initializers after rewriting.
    pub optimize: bool,
    /// Zero padded positions before the max-pool in the pooled export.
    pub mask_padding: bool,
    /// Replace a `token_type_ids` input by in-graph zeros so the exported
    /// signature carries exactly `input_ids` and `attention_mask`.
    pub fill_token_type_ids: bool,
    /// Name of the source output holding the logits. When `None` the output
    /// named `logits` is used, else the first rank-3 output.
    pub logits_output: Option<String>,
    /// Directory receiving both files.
    pub output_dir: PathBuf,
    /// File name of the raw-logits export.
    pub raw_file_name: String,
    /// File name of the pooled sparse-embedding export.
    pub pooled_file_name: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            opset_version: 14,
            optimize: true,
            mask_padding: true,
            fill_token_type_ids: true,
            logits_output: None,
            output_dir: PathBuf::from("."),
            raw_file_name: "splade_raw.onnx".into(),
            pooled_file_name: "splade_pooled.onnx".into(),
        }
    }
}

impl ExportConfig {
    pub fn raw_path(&self) -> PathBuf {
        self.output_dir.join(&self.raw_file_name)
    }

    pub fn pooled_path(&self) -> PathBuf {
        self.output_dir.join(&self.pooled_file_name)
    }
}
