use std::collections::HashSet;

use crate::builder::{tensor_type, Dim};
use crate::proto::{ModelProto, ValueInfoProto};
use crate::GraphError;

/// Name, element type and shape of one graph input or output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorSignature {
    pub name: String,
    /// ONNX `TensorProto.DataType` value.
    pub elem_type: i32,
    /// `None` when the graph declares no shape at all.
    pub dims: Option<Vec<Dim>>,
}

impl TensorSignature {
    pub fn rank(&self) -> Option<usize> {
        self.dims.as_ref().map(Vec::len)
    }

    /// Indices of the axes marked as runtime-variable.
    pub fn dynamic_axes(&self) -> Vec<usize> {
        self.dims
            .iter()
            .flatten()
            .enumerate()
            .filter(|(_, d)| d.is_dynamic())
            .map(|(i, _)| i)
            .collect()
    }
}

/// What a consumer of the file sees: IR version, opset and the feed/fetch tensors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphSignature {
    pub ir_version: i64,
    /// Version of the default (`ai.onnx`) operator set.
    pub opset_version: Option<i64>,
    pub inputs: Vec<TensorSignature>,
    pub outputs: Vec<TensorSignature>,
}

impl GraphSignature {
    pub fn input(&self, name: &str) -> Option<&TensorSignature> {
        self.inputs.iter().find(|t| t.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&TensorSignature> {
        self.outputs.iter().find(|t| t.name == name)
    }
}

pub(crate) fn is_default_domain(domain: &str) -> bool {
    domain.is_empty() || domain == "ai.onnx"
}

pub(crate) fn default_opset(model: &ModelProto) -> Option<i64> {
    model
        .opset_import
        .iter()
        .find(|op| is_default_domain(&op.domain))
        .map(|op| op.version)
}

/// Reads the feed/fetch signature of `model`. Inputs backed by an initializer
/// (pre-IR-4 style) are not reported.
pub fn signature(model: &ModelProto) -> Result<GraphSignature, GraphError> {
    let graph = model.graph.as_ref().ok_or(GraphError::MissingGraph)?;
    let initializers: HashSet<&str> = graph.initializer.iter().map(|t| t.name.as_str()).collect();

    let inputs = graph
        .input
        .iter()
        .filter(|info| !initializers.contains(info.name.as_str()))
        .map(describe)
        .collect();
    let outputs = graph.output.iter().map(describe).collect();

    Ok(GraphSignature {
        ir_version: model.ir_version,
        opset_version: default_opset(model),
        inputs,
        outputs,
    })
}

fn describe(info: &ValueInfoProto) -> TensorSignature {
    let (elem_type, dims) = tensor_type(info).unwrap_or((0, None));
    TensorSignature {
        name: info.name.clone(),
        elem_type,
        dims,
    }
}
