//! Small constructors for the protobuf messages the rewrites emit.

use crate::proto::tensor_shape_proto::{dimension, Dimension};
use crate::proto::{
    attribute_type, data_type, type_proto, AttributeProto, NodeProto, TensorProto,
    TensorShapeProto, TypeProto, ValueInfoProto,
};

/// One axis of a tensor shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dim {
    /// Fixed extent baked into the graph.
    Static(i64),
    /// Named runtime-variable extent.
    Dynamic(String),
    /// The graph does not say.
    Unknown,
}

impl Dim {
    pub fn dynamic(name: &str) -> Self {
        Dim::Dynamic(name.to_string())
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, Dim::Dynamic(_))
    }

    pub(crate) fn from_proto(dim: &Dimension) -> Self {
        match &dim.value {
            Some(dimension::Value::DimValue(v)) => Dim::Static(*v),
            Some(dimension::Value::DimParam(p)) if !p.is_empty() => Dim::Dynamic(p.clone()),
            _ => Dim::Unknown,
        }
    }

    pub(crate) fn to_proto(&self) -> Dimension {
        let value = match self {
            Dim::Static(v) => Some(dimension::Value::DimValue(*v)),
            Dim::Dynamic(p) => Some(dimension::Value::DimParam(p.clone())),
            Dim::Unknown => None,
        };
        Dimension {
            denotation: String::new(),
            value,
        }
    }
}

pub fn node(
    op_type: &str,
    name: &str,
    inputs: &[&str],
    outputs: &[&str],
    attribute: Vec<AttributeProto>,
) -> NodeProto {
    NodeProto {
        input: inputs.iter().map(|s| s.to_string()).collect(),
        output: outputs.iter().map(|s| s.to_string()).collect(),
        name: name.to_string(),
        op_type: op_type.to_string(),
        attribute,
        ..Default::default()
    }
}

pub fn attr_int(name: &str, value: i64) -> AttributeProto {
    AttributeProto {
        name: name.to_string(),
        r#type: attribute_type::INT,
        i: Some(value),
        ..Default::default()
    }
}

pub fn attr_ints(name: &str, values: &[i64]) -> AttributeProto {
    AttributeProto {
        name: name.to_string(),
        r#type: attribute_type::INTS,
        ints: values.to_vec(),
        ..Default::default()
    }
}

pub fn attr_tensor(name: &str, tensor: TensorProto) -> AttributeProto {
    AttributeProto {
        name: name.to_string(),
        r#type: attribute_type::TENSOR,
        t: Some(tensor),
        ..Default::default()
    }
}

pub fn tensor_f32(name: &str, dims: &[i64], values: Vec<f32>) -> TensorProto {
    TensorProto {
        name: name.to_string(),
        dims: dims.to_vec(),
        data_type: data_type::FLOAT,
        float_data: values,
        ..Default::default()
    }
}

pub fn tensor_i64(name: &str, dims: &[i64], values: Vec<i64>) -> TensorProto {
    TensorProto {
        name: name.to_string(),
        dims: dims.to_vec(),
        data_type: data_type::INT64,
        int64_data: values,
        ..Default::default()
    }
}

pub fn tensor_value_info(name: &str, elem_type: i32, dims: &[Dim]) -> ValueInfoProto {
    ValueInfoProto {
        name: name.to_string(),
        r#type: Some(TypeProto {
            denotation: String::new(),
            value: Some(type_proto::Value::TensorType(type_proto::Tensor {
                elem_type,
                shape: Some(TensorShapeProto {
                    dim: dims.iter().map(Dim::to_proto).collect(),
                }),
            })),
        }),
        ..Default::default()
    }
}

/// Tensor element type and dims of a value, when it is a tensor.
pub(crate) fn tensor_type(info: &ValueInfoProto) -> Option<(i32, Option<Vec<Dim>>)> {
    match info.r#type.as_ref()?.value.as_ref()? {
        type_proto::Value::TensorType(t) => Some((
            t.elem_type,
            t.shape
                .as_ref()
                .map(|shape| shape.dim.iter().map(Dim::from_proto).collect()),
        )),
        _ => None,
    }
}

/// Overwrites the shape of a tensor-typed value, keeping its element type.
pub(crate) fn set_dims(info: &mut ValueInfoProto, dims: &[Dim]) {
    let elem_type = tensor_type(info)
        .map(|(elem, _)| elem)
        .unwrap_or(data_type::UNDEFINED);
    info.r#type = tensor_value_info(&info.name, elem_type, dims).r#type;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_info_carries_dims() {
        let info = tensor_value_info(
            "input_ids",
            data_type::INT64,
            &[Dim::dynamic("batch"), Dim::Static(7)],
        );
        let (elem, dims) = tensor_type(&info).unwrap();
        assert_eq!(elem, data_type::INT64);
        assert_eq!(dims.unwrap(), vec![Dim::dynamic("batch"), Dim::Static(7)]);
    }

    #[test]
    fn set_dims_keeps_element_type() {
        let mut info = tensor_value_info("logits", data_type::FLOAT, &[Dim::Static(1)]);
        info.doc_string = "scores".into();
        set_dims(&mut info, &[Dim::dynamic("batch"), Dim::Unknown]);

        let (elem, dims) = tensor_type(&info).unwrap();
        assert_eq!(elem, data_type::FLOAT);
        assert_eq!(dims.unwrap(), vec![Dim::dynamic("batch"), Dim::Unknown]);
        assert_eq!(info.name, "logits");
        assert_eq!(info.doc_string, "scores");
    }

    #[test]
    fn empty_dim_param_reads_as_unknown() {
        let dim = Dimension {
            denotation: String::new(),
            value: Some(dimension::Value::DimParam(String::new())),
        };
        assert_eq!(Dim::from_proto(&dim), Dim::Unknown);
    }
}
