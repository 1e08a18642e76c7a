//! Tiny stand-in graphs for tests, benches and demos.

use crate::builder::{node, tensor_f32, tensor_value_info, Dim};
use crate::proto::{data_type, GraphProto, ModelProto, OperatorSetIdProto};
use crate::{
    ATTENTION_MASK, BATCH_AXIS, EXPORT_IR_VERSION, INPUT_IDS, LOGITS, SEQUENCE_AXIS,
};

/// A masked-LM graph whose logits are looked up per token:
/// `logits[b, t, :] = table[input_ids[b, t]]`.
///
/// `table` holds one row of vocabulary scores per token id; every row must
/// have the same length. `attention_mask` is declared but not read.
pub fn toy_masked_lm(table: &[Vec<f32>]) -> ModelProto {
    let rows = table.len() as i64;
    let vocab = table.first().map_or(0, Vec::len) as i64;
    let weights: Vec<f32> = table.iter().flatten().copied().collect();
    let token_axes = [Dim::dynamic(BATCH_AXIS), Dim::dynamic(SEQUENCE_AXIS)];

    let graph = GraphProto {
        name: "toy_masked_lm".into(),
        node: vec![node(
            "Gather",
            "lm_head/lookup",
            &["lm_head.weight", INPUT_IDS],
            &[LOGITS],
            vec![],
        )],
        initializer: vec![tensor_f32("lm_head.weight", &[rows, vocab], weights)],
        input: vec![
            tensor_value_info(INPUT_IDS, data_type::INT64, &token_axes),
            tensor_value_info(ATTENTION_MASK, data_type::INT64, &token_axes),
        ],
        output: vec![tensor_value_info(
            LOGITS,
            data_type::FLOAT,
            &[
                Dim::dynamic(BATCH_AXIS),
                Dim::dynamic(SEQUENCE_AXIS),
                Dim::Static(vocab),
            ],
        )],
        ..Default::default()
    };

    ModelProto {
        ir_version: EXPORT_IR_VERSION,
        opset_import: vec![OperatorSetIdProto {
            domain: String::new(),
            version: 14,
        }],
        producer_name: "toy".into(),
        graph: Some(graph),
        ..Default::default()
    }
}
