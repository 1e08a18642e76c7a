use std::path::{Path, PathBuf};

use encoder::{EncoderConfig, SpladeEncoder};
use graph::{export_graphs, ExportSummary};

use crate::{SpladeConfig, SpladeError};

/// What [`run_export`] wrote and, when enabled, how the files compared.
#[derive(Debug, Clone)]
pub struct ExportOutcome {
    pub source: PathBuf,
    pub summary: ExportSummary,
    pub verification: Option<Verification>,
}

/// Result of running the sample text through both exports.
#[derive(Debug, Clone, PartialEq)]
pub struct Verification {
    /// Token count of the sample, special tokens included.
    pub tokens: usize,
    /// Width of both outputs.
    pub vocab: usize,
    /// Largest gap between host-pooled raw logits and the pooled graph.
    pub max_abs_diff: f32,
}

/// Export flow: resolves the checkpoint's masked-LM graph, writes the raw
/// and pooled files, then checks them against each other on the sample text.
pub fn run_export(cfg: &SpladeConfig) -> Result<ExportOutcome, SpladeError> {
    let source = match &cfg.export.source_model {
        Some(path) => path.clone(),
        None => cfg.hub().fetch(&cfg.checkpoint.model_file)?,
    };

    let summary = export_graphs(&source, &cfg.export.graph)?;
    let verification = if cfg.export.verify {
        Some(verify_exports(cfg, &summary)?)
    } else {
        None
    };

    Ok(ExportOutcome {
        source,
        summary,
        verification,
    })
}

fn verify_exports(cfg: &SpladeConfig, summary: &ExportSummary) -> Result<Verification, SpladeError> {
    let raw_rank = summary.raw.signature.output(graph::LOGITS).and_then(|t| t.rank());
    let pooled_rank = summary
        .pooled
        .signature
        .output(graph::SPARSE_EMBEDDING)
        .and_then(|t| t.rank());
    if raw_rank != Some(3) || pooled_rank != Some(2) {
        return Err(SpladeError::Verification(format!(
            "expected rank-3 `logits` and rank-2 `sparse_embedding`, got {raw_rank:?} and {pooled_rank:?}"
        )));
    }

    let encoder_for = |model: &Path| {
        SpladeEncoder::from_config(EncoderConfig {
            hub: cfg.hub(),
            model_path: Some(model.to_path_buf()),
            tokenizer_path: cfg.checkpoint.tokenizer_path.clone(),
            vocab_size: None,
            ..Default::default()
        })
    };
    let raw = encoder_for(&summary.raw.path)?;
    let pooled = encoder_for(&summary.pooled.path)?;

    let text = cfg.export.dummy_text.as_str();
    let tokens = raw.token_ids(text)?.len();
    let from_raw = raw.encode(&[text])?;
    let from_pooled = pooled.encode(&[text])?;

    if from_raw.shape() != from_pooled.shape() || from_raw.len() != 1 {
        return Err(SpladeError::Verification(format!(
            "raw export pools to {:?} but pooled export gives {:?}",
            from_raw.shape(),
            from_pooled.shape()
        )));
    }

    let max_abs_diff = from_raw
        .view()
        .iter()
        .zip(from_pooled.view().iter())
        .map(|(a, b)| (a - b).abs())
        .fold(0.0f32, f32::max);
    if max_abs_diff > cfg.export.tolerance {
        return Err(SpladeError::Verification(format!(
            "exports differ by {max_abs_diff} (tolerance {})",
            cfg.export.tolerance
        )));
    }

    let vocab = from_raw.shape().1;
    tracing::info!(tokens, vocab, max_abs_diff, "raw and pooled exports agree");
    Ok(Verification {
        tokens,
        vocab,
        max_abs_diff,
    })
}

/// `./splade_raw.onnx` prints as `splade_raw.onnx`.
pub fn display_path(path: &Path) -> String {
    path.strip_prefix(".").unwrap_or(path).display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_path_drops_current_dir() {
        assert_eq!(display_path(Path::new("./splade_raw.onnx")), "splade_raw.onnx");
        assert_eq!(display_path(Path::new("out/splade_raw.onnx")), "out/splade_raw.onnx");
    }
}
