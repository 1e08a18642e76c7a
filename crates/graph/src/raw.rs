//! Normalization of a masked-language-model graph into the raw-logits export.

use std::collections::HashSet;

use crate::builder::{attr_tensor, node, set_dims, tensor_i64, tensor_type, Dim};
use crate::inspect::is_default_domain;
use crate::optimize::{optimize_graph, OptimizeStats};
use crate::proto::{GraphProto, ModelProto, OperatorSetIdProto};
use crate::{
    ExportConfig, GraphError, ATTENTION_MASK, BATCH_AXIS, EXPORT_IR_VERSION, INPUT_IDS, LOGITS,
    MIN_SOURCE_OPSET, SEQUENCE_AXIS, TOKEN_TYPE_IDS,
};

/// Result of [`prepare_raw`].
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRaw {
    pub model: ModelProto,
    /// `None` when optimization was disabled.
    pub optimize: Option<OptimizeStats>,
}

/// Rewrites a masked-LM graph into the raw export signature:
/// `input_ids`, `attention_mask` → `logits`, batch and sequence axes dynamic,
/// opset stamped to [`ExportConfig::opset_version`], IR version 7.
///
/// Applying it to its own output changes nothing.
pub fn prepare_raw(mut model: ModelProto, cfg: &ExportConfig) -> Result<PreparedRaw, GraphError> {
    stamp_versions(&mut model, cfg)?;

    let graph = model.graph.as_mut().ok_or(GraphError::MissingGraph)?;
    drop_initializer_inputs(graph);
    normalize_inputs(graph, cfg)?;
    normalize_logits_output(graph, cfg)?;
    // Intermediate shapes may still carry the batch/sequence extents of the
    // trace; the runtime re-infers them.
    graph.value_info.clear();

    let optimize = cfg.optimize.then(|| optimize_graph(graph));

    model.producer_name = env!("CARGO_PKG_NAME").to_string();
    model.producer_version = env!("CARGO_PKG_VERSION").to_string();

    Ok(PreparedRaw { model, optimize })
}

fn stamp_versions(model: &mut ModelProto, cfg: &ExportConfig) -> Result<(), GraphError> {
    if !model.functions.is_empty() {
        return Err(GraphError::Unsupported(format!(
            "{} model-local functions cannot be expressed at IR version {EXPORT_IR_VERSION}",
            model.functions.len()
        )));
    }
    if !model.training_info.is_empty() {
        return Err(GraphError::Unsupported("training info".into()));
    }

    let target = cfg.opset_version;
    let mut stamped = false;
    for op in &mut model.opset_import {
        if !is_default_domain(&op.domain) {
            continue;
        }
        if op.version < MIN_SOURCE_OPSET || op.version > target {
            return Err(GraphError::UnsupportedOpset {
                found: op.version,
                min: MIN_SOURCE_OPSET,
                target,
            });
        }
        op.domain = String::new();
        op.version = target;
        stamped = true;
    }
    if !stamped {
        model.opset_import.insert(
            0,
            OperatorSetIdProto {
                domain: String::new(),
                version: target,
            },
        );
    }

    model.ir_version = EXPORT_IR_VERSION;
    Ok(())
}

fn drop_initializer_inputs(graph: &mut GraphProto) {
    let initializers: HashSet<String> = graph.initializer.iter().map(|t| t.name.clone()).collect();
    graph.input.retain(|i| !initializers.contains(&i.name));
}

fn normalize_inputs(graph: &mut GraphProto, cfg: &ExportConfig) -> Result<(), GraphError> {
    for required in [INPUT_IDS, ATTENTION_MASK] {
        if !graph.input.iter().any(|i| i.name == required) {
            return Err(GraphError::MissingInput(required.to_string()));
        }
    }

    if let Some(extra) = graph
        .input
        .iter()
        .find(|i| ![INPUT_IDS, ATTENTION_MASK, TOKEN_TYPE_IDS].contains(&i.name.as_str()))
    {
        return Err(GraphError::UnexpectedInput(extra.name.clone()));
    }

    if graph.input.iter().any(|i| i.name == TOKEN_TYPE_IDS) {
        if !cfg.fill_token_type_ids {
            return Err(GraphError::UnexpectedInput(TOKEN_TYPE_IDS.to_string()));
        }
        fill_token_type_ids(graph)?;
    }

    // Fixed feed order.
    graph
        .input
        .sort_by_key(|i| if i.name == INPUT_IDS { 0 } else { 1 });

    let token_axes = [Dim::dynamic(BATCH_AXIS), Dim::dynamic(SEQUENCE_AXIS)];
    for input in &mut graph.input {
        set_dims(input, &token_axes);
    }
    Ok(())
}

/// Replaces the `token_type_ids` input by zeros shaped like `input_ids`.
fn fill_token_type_ids(graph: &mut GraphProto) -> Result<(), GraphError> {
    let shape_name = "token_type_ids/shape";
    if produced_names(graph).contains(shape_name) {
        return Err(GraphError::NameCollision(shape_name.to_string()));
    }

    graph.input.retain(|i| i.name != TOKEN_TYPE_IDS);
    let zeros = tensor_i64("", &[1], vec![0]);
    let prologue = [
        node("Shape", shape_name, &[INPUT_IDS], &[shape_name], vec![]),
        node(
            "ConstantOfShape",
            "token_type_ids/zeros",
            &[shape_name],
            &[TOKEN_TYPE_IDS],
            vec![attr_tensor("value", zeros)],
        ),
    ];
    graph.node.splice(0..0, prologue);
    tracing::debug!("token_type_ids input replaced by in-graph zeros");
    Ok(())
}

fn normalize_logits_output(graph: &mut GraphProto, cfg: &ExportConfig) -> Result<(), GraphError> {
    let position = match &cfg.logits_output {
        Some(name) => graph
            .output
            .iter()
            .position(|o| &o.name == name)
            .ok_or_else(|| GraphError::MissingLogits(format!("no output named `{name}`")))?,
        None => graph
            .output
            .iter()
            .position(|o| o.name == LOGITS)
            .or_else(|| {
                graph.output.iter().position(|o| {
                    matches!(tensor_type(o), Some((_, Some(dims))) if dims.len() == 3)
                })
            })
            .ok_or_else(|| {
                GraphError::MissingLogits(format!(
                    "none of {} outputs is named `{LOGITS}` or has rank 3",
                    graph.output.len()
                ))
            })?,
    };

    let mut logits = graph.output.swap_remove(position);
    let dropped: Vec<String> = graph.output.drain(..).map(|o| o.name).collect();
    if !dropped.is_empty() {
        tracing::debug!(?dropped, "dropped extra graph outputs");
    }

    if logits.name != LOGITS {
        if produced_names(graph).contains(LOGITS) {
            return Err(GraphError::NameCollision(LOGITS.to_string()));
        }
        rename_value(graph, &logits.name, LOGITS);
        logits.name = LOGITS.to_string();
    }

    let vocab = match tensor_type(&logits) {
        Some((_, Some(dims))) if dims.len() == 3 => dims[2].clone(),
        _ => Dim::Unknown,
    };
    set_dims(
        &mut logits,
        &[Dim::dynamic(BATCH_AXIS), Dim::dynamic(SEQUENCE_AXIS), vocab],
    );
    graph.output.push(logits);
    Ok(())
}

pub(crate) fn produced_names(graph: &GraphProto) -> HashSet<&str> {
    graph
        .node
        .iter()
        .flat_map(|n| n.output.iter().map(String::as_str))
        .chain(graph.input.iter().map(|i| i.name.as_str()))
        .chain(graph.initializer.iter().map(|t| t.name.as_str()))
        .collect()
}

fn rename_value(graph: &mut GraphProto, from: &str, to: &str) {
    for node in &mut graph.node {
        for name in node.input.iter_mut().chain(node.output.iter_mut()) {
            if *name == from {
                *name = to.to_string();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::tensor_value_info;
    use crate::fixtures::toy_masked_lm;
    use crate::inspect::signature;
    use crate::io::encode_model;
    use crate::proto::data_type;

    fn table() -> Vec<Vec<f32>> {
        vec![vec![0.5, -1.0, 2.0], vec![-0.25, 3.0, 0.0]]
    }

    #[test]
    fn prepared_signature_matches_export_contract() {
        let prepared = prepare_raw(toy_masked_lm(&table()), &ExportConfig::default()).unwrap();
        let sig = signature(&prepared.model).unwrap();

        assert_eq!(sig.ir_version, EXPORT_IR_VERSION);
        assert_eq!(sig.opset_version, Some(14));
        let names: Vec<&str> = sig.inputs.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec![INPUT_IDS, ATTENTION_MASK]);
        assert_eq!(sig.outputs.len(), 1);

        let logits = sig.output(LOGITS).unwrap();
        assert_eq!(logits.dynamic_axes(), vec![0, 1]);
        assert_eq!(logits.dims.as_ref().unwrap()[2], Dim::Static(3));
        for input in &sig.inputs {
            assert_eq!(input.dynamic_axes(), vec![0, 1]);
        }
    }

    #[test]
    fn prepare_is_idempotent() {
        let cfg = ExportConfig::default();
        let once = prepare_raw(toy_masked_lm(&table()), &cfg).unwrap().model;
        let twice = prepare_raw(once.clone(), &cfg).unwrap().model;
        assert_eq!(encode_model(&once), encode_model(&twice));
    }

    #[test]
    fn newer_opset_is_rejected() {
        let mut model = toy_masked_lm(&table());
        model.opset_import[0].version = 17;
        let err = prepare_raw(model, &ExportConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            GraphError::UnsupportedOpset { found: 17, target: 14, .. }
        ));
    }

    #[test]
    fn opset_13_is_stamped_up() {
        let mut model = toy_masked_lm(&table());
        model.opset_import[0].version = 13;
        let prepared = prepare_raw(model, &ExportConfig::default()).unwrap();
        assert_eq!(signature(&prepared.model).unwrap().opset_version, Some(14));
    }

    #[test]
    fn token_type_ids_become_in_graph_zeros() {
        let mut model = toy_masked_lm(&table());
        let graph = model.graph.as_mut().unwrap();
        graph.input.push(tensor_value_info(
            TOKEN_TYPE_IDS,
            data_type::INT64,
            &[Dim::Static(1), Dim::Static(4)],
        ));
        // Nothing in the toy graph reads token_type_ids; keep the fill alive.
        let cfg = ExportConfig {
            optimize: false,
            ..Default::default()
        };

        let prepared = prepare_raw(model, &cfg).unwrap();
        let graph = prepared.model.graph.unwrap();
        assert!(graph.input.iter().all(|i| i.name != TOKEN_TYPE_IDS));
        assert_eq!(graph.node[0].op_type, "Shape");
        assert_eq!(graph.node[1].op_type, "ConstantOfShape");
        assert_eq!(graph.node[1].output, vec![TOKEN_TYPE_IDS.to_string()]);
    }

    #[test]
    fn token_type_ids_rejected_when_fill_disabled() {
        let mut model = toy_masked_lm(&table());
        model.graph.as_mut().unwrap().input.push(tensor_value_info(
            TOKEN_TYPE_IDS,
            data_type::INT64,
            &[Dim::Unknown, Dim::Unknown],
        ));
        let cfg = ExportConfig {
            fill_token_type_ids: false,
            ..Default::default()
        };
        let err = prepare_raw(model, &cfg).unwrap_err();
        assert!(matches!(err, GraphError::UnexpectedInput(name) if name == TOKEN_TYPE_IDS));
    }

    #[test]
    fn missing_attention_mask_is_reported() {
        let mut model = toy_masked_lm(&table());
        model
            .graph
            .as_mut()
            .unwrap()
            .input
            .retain(|i| i.name != ATTENTION_MASK);
        let err = prepare_raw(model, &ExportConfig::default()).unwrap_err();
        assert!(matches!(err, GraphError::MissingInput(name) if name == ATTENTION_MASK));
    }

    #[test]
    fn rank3_output_is_renamed_and_extras_dropped() {
        let mut model = toy_masked_lm(&table());
        let graph = model.graph.as_mut().unwrap();
        rename_value(graph, LOGITS, "prediction_scores");
        graph.output[0].name = "prediction_scores".into();
        graph.node.push(node(
            "ReduceSum",
            "pooled_hidden",
            &["prediction_scores"],
            &["summary"],
            vec![],
        ));
        graph.output.insert(
            0,
            tensor_value_info("summary", data_type::FLOAT, &[Dim::Unknown]),
        );

        let prepared = prepare_raw(model, &ExportConfig::default()).unwrap();
        let graph = prepared.model.graph.as_ref().unwrap();
        assert_eq!(graph.output.len(), 1);
        assert_eq!(graph.output[0].name, LOGITS);
        assert!(graph.node.iter().any(|n| n.output.contains(&LOGITS.to_string())));
        // The summary branch no longer reaches an output.
        assert!(graph.node.iter().all(|n| n.name != "pooled_hidden"));
        assert_eq!(prepared.optimize.unwrap().nodes_removed, 1);
    }
}
