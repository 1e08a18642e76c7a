use crate::builder::{
    attr_int, attr_ints, node, tensor_f32, tensor_i64, tensor_type, tensor_value_info, Dim,
};
use crate::proto::{data_type, ModelProto, NodeProto};
use crate::raw::produced_names;
use crate::{GraphError, ATTENTION_MASK, BATCH_AXIS, LOGITS, SPARSE_EMBEDDING};

const PREFIX: &str = "splade_pooling/";
const ONE: &str = "splade_pooling/one";
const RELU: &str = "splade_pooling/relu";
const PLUS_ONE: &str = "splade_pooling/plus_one";
const LOG1P: &str = "splade_pooling/log1p";
const MASK_FLOAT: &str = "splade_pooling/mask_float";
const MASK_AXES: &str = "splade_pooling/mask_axes";
const MASK: &str = "splade_pooling/mask";
const MASKED: &str = "splade_pooling/masked";
const MAX: &str = "splade_pooling/max";

/// Appends the SPLADE head to a prepared raw graph:
/// `max over seq_len of log(1 + relu(logits))`, optionally zeroing padded
/// positions through `attention_mask` first.
///
/// The result has a single `sparse_embedding` output of shape `(batch, vocab)`.
pub fn attach_splade_pooling(
    mut model: ModelProto,
    mask_padding: bool,
) -> Result<ModelProto, GraphError> {
    let graph = model.graph.as_mut().ok_or(GraphError::MissingGraph)?;

    let logits_pos = graph
        .output
        .iter()
        .position(|o| o.name == LOGITS)
        .ok_or_else(|| {
            GraphError::MissingLogits(format!("pooling needs an output named `{LOGITS}`"))
        })?;
    {
        let taken = produced_names(graph);
        if taken.contains(SPARSE_EMBEDDING) {
            return Err(GraphError::NameCollision(SPARSE_EMBEDDING.to_string()));
        }
        if let Some(clash) = taken.iter().find(|n| n.starts_with(PREFIX)) {
            return Err(GraphError::NameCollision(clash.to_string()));
        }
    }
    if mask_padding && !graph.input.iter().any(|i| i.name == ATTENTION_MASK) {
        return Err(GraphError::MissingInput(ATTENTION_MASK.to_string()));
    }

    let logits = graph.output.remove(logits_pos);
    let vocab = match tensor_type(&logits) {
        Some((_, Some(dims))) if dims.len() == 3 => dims[2].clone(),
        _ => Dim::Unknown,
    };

    graph.initializer.push(tensor_f32(ONE, &[], vec![1.0]));

    let mut head: Vec<NodeProto> = vec![
        node("Relu", RELU, &[LOGITS], &[RELU], vec![]),
        node("Add", PLUS_ONE, &[RELU, ONE], &[PLUS_ONE], vec![]),
        node("Log", LOG1P, &[PLUS_ONE], &[LOG1P], vec![]),
    ];

    let mut reduce_input = LOG1P;
    if mask_padding {
        graph.initializer.push(tensor_i64(MASK_AXES, &[1], vec![2]));
        head.extend([
            node(
                "Cast",
                MASK_FLOAT,
                &[ATTENTION_MASK],
                &[MASK_FLOAT],
                vec![attr_int("to", i64::from(data_type::FLOAT))],
            ),
            node("Unsqueeze", MASK, &[MASK_FLOAT, MASK_AXES], &[MASK], vec![]),
            node("Mul", MASKED, &[LOG1P, MASK], &[MASKED], vec![]),
        ]);
        reduce_input = MASKED;
    }

    head.push(node(
        "ReduceMax",
        MAX,
        &[reduce_input],
        &[SPARSE_EMBEDDING],
        vec![attr_ints("axes", &[1]), attr_int("keepdims", 0)],
    ));
    graph.node.extend(head);
    graph.output.push(tensor_value_info(
        SPARSE_EMBEDDING,
        data_type::FLOAT,
        &[Dim::dynamic(BATCH_AXIS), vocab],
    ));

    tracing::debug!(mask_padding, "attached splade pooling head");
    Ok(model)
}

/// Whether `model` already ends in the SPLADE head.
pub fn is_pooled(model: &ModelProto) -> bool {
    model
        .graph
        .as_ref()
        .is_some_and(|g| g.output.len() == 1 && g.output[0].name == SPARSE_EMBEDDING)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::toy_masked_lm;
    use crate::inspect::signature;
    use crate::{prepare_raw, ExportConfig};

    fn raw_model() -> ModelProto {
        let table = vec![vec![1.0, -2.0, 0.5, 0.0], vec![0.0, 4.0, -1.0, 2.0]];
        prepare_raw(toy_masked_lm(&table), &ExportConfig::default())
            .unwrap()
            .model
    }

    fn ops(model: &ModelProto) -> Vec<String> {
        model
            .graph
            .as_ref()
            .unwrap()
            .node
            .iter()
            .filter(|n| n.name.starts_with(PREFIX))
            .map(|n| n.op_type.clone())
            .collect()
    }

    #[test]
    fn pooled_signature_has_dynamic_batch_only() {
        let pooled = attach_splade_pooling(raw_model(), true).unwrap();
        let sig = signature(&pooled).unwrap();

        assert_eq!(sig.outputs.len(), 1);
        let out = sig.output(SPARSE_EMBEDDING).unwrap();
        assert_eq!(out.rank(), Some(2));
        assert_eq!(out.dynamic_axes(), vec![0]);
        assert_eq!(out.dims.as_ref().unwrap()[1], Dim::Static(4));
        assert!(is_pooled(&pooled));
    }

    #[test]
    fn masked_head_multiplies_before_max() {
        let pooled = attach_splade_pooling(raw_model(), true).unwrap();
        assert_eq!(
            ops(&pooled),
            vec!["Relu", "Add", "Log", "Cast", "Unsqueeze", "Mul", "ReduceMax"]
        );
    }

    #[test]
    fn unmasked_head_reduces_activation_directly() {
        let pooled = attach_splade_pooling(raw_model(), false).unwrap();
        assert_eq!(ops(&pooled), vec!["Relu", "Add", "Log", "ReduceMax"]);

        let graph = pooled.graph.unwrap();
        let max = graph.node.last().unwrap();
        assert_eq!(max.input, vec![LOG1P.to_string()]);
        let keepdims = max.attribute.iter().find(|a| a.name == "keepdims").unwrap();
        assert_eq!(keepdims.i, Some(0));
    }

    #[test]
    fn pooling_twice_is_rejected() {
        let pooled = attach_splade_pooling(raw_model(), true).unwrap();
        let err = attach_splade_pooling(pooled, true).unwrap_err();
        assert!(matches!(err, GraphError::MissingLogits(_)));
    }

    #[test]
    fn raw_graph_is_not_pooled() {
        assert!(!is_pooled(&raw_model()));
    }
}
