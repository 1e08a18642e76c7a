use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Component, Path};

use prost::Message;

use crate::proto::{GraphProto, ModelProto, TensorProto, DATA_LOCATION_EXTERNAL};
use crate::GraphError;

pub fn decode_model(bytes: &[u8]) -> Result<ModelProto, GraphError> {
    Ok(ModelProto::decode(bytes)?)
}

/// Serializes `model`. Encoding is deterministic: equal models give equal bytes.
pub fn encode_model(model: &ModelProto) -> Vec<u8> {
    model.encode_to_vec()
}

/// Reads a model file and inlines initializers stored as external data, so the
/// result can be written anywhere without dangling references.
pub fn load_model(path: &Path) -> Result<ModelProto, GraphError> {
    let bytes = fs::read(path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    load_model_from_bytes(&bytes, base_dir)
}

/// [`load_model`] for bytes already read; external data resolves against
/// `base_dir`.
pub fn load_model_from_bytes(bytes: &[u8], base_dir: &Path) -> Result<ModelProto, GraphError> {
    let mut model = decode_model(bytes)?;
    if let Some(graph) = model.graph.as_mut() {
        let inlined = inline_external_data(graph, base_dir)?;
        if inlined > 0 {
            tracing::debug!(base_dir = %base_dir.display(), tensors = inlined, "inlined external tensor data");
        }
    }
    Ok(model)
}

/// Writes `model` to `path`, replacing any existing file.
pub fn save_model(model: &ModelProto, path: &Path) -> Result<usize, GraphError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    let bytes = encode_model(model);
    fs::write(path, &bytes)?;
    Ok(bytes.len())
}

fn inline_external_data(graph: &mut GraphProto, base_dir: &Path) -> Result<usize, GraphError> {
    let mut count = 0;
    for tensor in &mut graph.initializer {
        count += inline_tensor(tensor, base_dir)?;
    }
    for node in &mut graph.node {
        for attr in &mut node.attribute {
            if let Some(tensor) = attr.t.as_mut() {
                count += inline_tensor(tensor, base_dir)?;
            }
            for tensor in &mut attr.tensors {
                count += inline_tensor(tensor, base_dir)?;
            }
            if let Some(sub) = attr.g.as_mut() {
                count += inline_external_data(sub, base_dir)?;
            }
            for sub in &mut attr.graphs {
                count += inline_external_data(sub, base_dir)?;
            }
        }
    }
    Ok(count)
}

fn inline_tensor(tensor: &mut TensorProto, base_dir: &Path) -> Result<usize, GraphError> {
    if tensor.data_location != DATA_LOCATION_EXTERNAL {
        return Ok(0);
    }

    let fail = |reason: String| GraphError::ExternalData {
        tensor: tensor.name.clone(),
        reason,
    };

    let mut location = None;
    let mut offset = 0u64;
    let mut length = None;
    for entry in &tensor.external_data {
        match entry.key.as_str() {
            "location" => location = Some(entry.value.clone()),
            "offset" => {
                offset = entry
                    .value
                    .parse()
                    .map_err(|_| fail(format!("bad offset `{}`", entry.value)))?
            }
            "length" => {
                length = Some(
                    entry
                        .value
                        .parse::<u64>()
                        .map_err(|_| fail(format!("bad length `{}`", entry.value)))?,
                )
            }
            _ => {}
        }
    }

    let location = location.ok_or_else(|| fail("no location entry".into()))?;
    let relative = Path::new(&location);
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(fail(format!("location `{location}` escapes the model directory")));
    }

    let mut file = fs::File::open(base_dir.join(relative))?;
    file.seek(SeekFrom::Start(offset))?;
    let mut data = Vec::new();
    match length {
        Some(len) => {
            let available = file.metadata()?.len().saturating_sub(offset);
            if len > available {
                return Err(fail(format!(
                    "length {len} runs past the end of `{location}` ({available} bytes after offset {offset})"
                )));
            }
            data.resize(len as usize, 0);
            file.read_exact(&mut data)?;
        }
        None => {
            file.read_to_end(&mut data)?;
        }
    }

    tensor.raw_data = data;
    tensor.external_data.clear();
    tensor.data_location = 0;
    Ok(1)
}
