use std::path::{Path, PathBuf};

use crate::inspect::{signature, GraphSignature};
use crate::io::{load_model, save_model};
use crate::pooled::{attach_splade_pooling, is_pooled};
use crate::proto::ModelProto;
use crate::raw::prepare_raw;
use crate::{ExportConfig, GraphError};

/// One written graph file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub path: PathBuf,
    pub bytes: usize,
    pub signature: GraphSignature,
}

/// Both files produced by [`export_graphs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub raw: ExportReport,
    pub pooled: ExportReport,
}

/// Loads the masked-LM graph at `source` and writes the raw and pooled exports
/// into `cfg.output_dir`, overwriting existing files.
pub fn export_graphs(source: &Path, cfg: &ExportConfig) -> Result<ExportSummary, GraphError> {
    tracing::info!(source = %source.display(), "loading masked-lm graph");
    let model = load_model(source)?;
    export_model(model, cfg)
}

/// Same as [`export_graphs`] for a model already in memory.
pub fn export_model(model: ModelProto, cfg: &ExportConfig) -> Result<ExportSummary, GraphError> {
    let prepared = prepare_raw(model, cfg)?;
    if let Some(stats) = prepared.optimize {
        if !stats.is_noop() {
            tracing::info!(
                folded = stats.constants_folded,
                identities = stats.identities_removed,
                nodes = stats.nodes_removed,
                initializers = stats.initializers_removed,
                "simplified raw graph"
            );
        }
    }

    let raw = write(&prepared.model, cfg.raw_path())?;
    let pooled_model = attach_splade_pooling(prepared.model, cfg.mask_padding)?;
    let pooled = write(&pooled_model, cfg.pooled_path())?;

    Ok(ExportSummary { raw, pooled })
}

fn write(model: &ModelProto, path: PathBuf) -> Result<ExportReport, GraphError> {
    let signature = signature(model)?;
    let bytes = save_model(model, &path)?;
    tracing::info!(path = %path.display(), bytes, "wrote onnx graph");
    Ok(ExportReport {
        path,
        bytes,
        signature,
    })
}

/// Brings an arbitrary encoder graph into the shape the runtime expects.
///
/// Pooled graphs are returned untouched; anything else is treated as a
/// masked-LM graph and normalized with default settings.
pub fn prepare_for_runtime(model: ModelProto) -> Result<ModelProto, GraphError> {
    if is_pooled(&model) {
        return Ok(model);
    }
    Ok(prepare_raw(model, &ExportConfig::default())?.model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::toy_masked_lm;
    use crate::{LOGITS, SPARSE_EMBEDDING};
    use std::fs;

    fn table() -> Vec<Vec<f32>> {
        vec![vec![0.1, 0.2, -0.3], vec![1.0, -1.0, 0.0], vec![0.0, 0.0, 5.0]]
    }

    fn config(dir: &Path) -> ExportConfig {
        ExportConfig {
            output_dir: dir.to_path_buf(),
            ..Default::default()
        }
    }

    #[test]
    fn export_writes_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.onnx");
        save_model(&toy_masked_lm(&table()), &source).unwrap();

        let summary = export_graphs(&source, &config(dir.path())).unwrap();
        assert_eq!(summary.raw.path, dir.path().join("splade_raw.onnx"));
        assert_eq!(summary.pooled.path, dir.path().join("splade_pooled.onnx"));
        assert_eq!(
            fs::metadata(&summary.raw.path).unwrap().len() as usize,
            summary.raw.bytes
        );
        assert!(summary.raw.signature.output(LOGITS).is_some());
        assert!(summary.pooled.signature.output(SPARSE_EMBEDDING).is_some());
    }

    #[test]
    fn rerunning_export_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());

        let first = export_model(toy_masked_lm(&table()), &cfg).unwrap();
        let raw_before = fs::read(&first.raw.path).unwrap();
        let pooled_before = fs::read(&first.pooled.path).unwrap();

        export_model(toy_masked_lm(&table()), &cfg).unwrap();
        assert_eq!(fs::read(&first.raw.path).unwrap(), raw_before);
        assert_eq!(fs::read(&first.pooled.path).unwrap(), pooled_before);
    }

    #[test]
    fn runtime_preparation_leaves_pooled_graphs_alone() {
        let dir = tempfile::tempdir().unwrap();
        let summary = export_model(toy_masked_lm(&table()), &config(dir.path())).unwrap();
        let pooled = load_model(&summary.pooled.path).unwrap();

        assert_eq!(prepare_for_runtime(pooled.clone()).unwrap(), pooled);
    }

    #[test]
    fn runtime_preparation_normalizes_masked_lm() {
        let mut model = toy_masked_lm(&table());
        model.ir_version = 8;
        let prepared = prepare_for_runtime(model).unwrap();
        assert_eq!(prepared.ir_version, crate::EXPORT_IR_VERSION);
    }
}
