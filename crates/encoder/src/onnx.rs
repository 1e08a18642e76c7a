use onnxruntime::ndarray::{Array, Array2, Ix2, Ix3};
use onnxruntime::session::Session;
use std::cell::RefCell;
use tokenizers::Tokenizer;

use crate::cache::CachedModel;
use crate::pooling::splade_max_pool;
use crate::EncoderError;

/// Tokenizes `texts`, runs the graph, and returns `(batch, vocab)` embeddings
/// in input order.
pub(crate) fn run_splade<T>(handle: &CachedModel, texts: &[T]) -> Result<Array2<f32>, EncoderError>
where
    T: AsRef<str>,
{
    if texts.is_empty() {
        return Err(EncoderError::EmptyInput);
    }

    let (encoded, max_len) = encode_documents(&handle.tokenizer, texts)?;
    let (input_ids, attn_mask) = build_padded_arrays(encoded, max_len)?;
    execute_session(&handle.session, input_ids, attn_mask)
}

pub(crate) struct EncodedDoc {
    pub(crate) ids: Vec<i64>,
    pub(crate) mask: Vec<i64>,
}

/// Truncation is configured on the tokenizer itself.
pub(crate) fn encode_documents<T>(
    tokenizer: &Tokenizer,
    texts: &[T],
) -> Result<(Vec<EncodedDoc>, usize), EncoderError>
where
    T: AsRef<str>,
{
    let mut encoded = Vec::with_capacity(texts.len());
    let mut max_len = 0usize;

    for text in texts {
        let encoding = tokenizer
            .encode(text.as_ref(), true)
            .map_err(|e| EncoderError::Tokenizer(e.to_string()))?;
        let ids: Vec<i64> = encoding.get_ids().iter().map(|&x| x as i64).collect();
        let mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&x| x as i64)
            .collect();
        max_len = max_len.max(ids.len());
        encoded.push(EncodedDoc { ids, mask });
    }

    Ok((encoded, max_len))
}

/// Right-pads every document to `max_len` with id 0 and mask 0.
pub(crate) fn build_padded_arrays(
    encoded: Vec<EncodedDoc>,
    max_len: usize,
) -> Result<(Array2<i64>, Array2<i64>), EncoderError> {
    let seq_len = max_len.max(1);
    let batch = encoded.len();
    let mut id_storage = Vec::with_capacity(batch * seq_len);
    let mut mask_storage = Vec::with_capacity(batch * seq_len);

    for EncodedDoc { ids, mask } in encoded {
        if ids.len() != mask.len() {
            return Err(EncoderError::Tokenizer(
                "tokenizer produced mismatched id/mask lengths".into(),
            ));
        }
        let pad = seq_len.saturating_sub(ids.len());
        id_storage.extend(ids);
        mask_storage.extend(mask);
        if pad > 0 {
            id_storage.extend(std::iter::repeat_n(0, pad));
            mask_storage.extend(std::iter::repeat_n(0, pad));
        }
    }

    let input_ids = Array::from_shape_vec((batch, seq_len), id_storage)
        .map_err(|e| EncoderError::ShapeMismatch(e.to_string()))?;
    let attn_mask = Array::from_shape_vec((batch, seq_len), mask_storage)
        .map_err(|e| EncoderError::ShapeMismatch(e.to_string()))?;
    Ok((input_ids, attn_mask))
}

/// Runs the session. A `(batch, vocab)` output is returned as-is; a
/// `(batch, seq_len, vocab)` output is max-pooled on the host.
pub(crate) fn execute_session(
    session: &RefCell<Session<'static>>,
    input_ids: Array2<i64>,
    attn_mask: Array2<i64>,
) -> Result<Array2<f32>, EncoderError> {
    let batch = input_ids.nrows();
    let host_mask = attn_mask.clone();
    let mut guard = session.borrow_mut();
    let session_ref = &mut *guard;
    let mut runtime_inputs = Vec::with_capacity(session_ref.inputs.len());
    let mut input_ids_tensor = Some(input_ids);
    let mut attn_mask_tensor = Some(attn_mask);

    for input in &session_ref.inputs {
        match input.name.as_str() {
            graph::INPUT_IDS => {
                let tensor = input_ids_tensor.take().ok_or_else(|| {
                    EncoderError::InvalidConfig("model requested `input_ids` multiple times".into())
                })?;
                runtime_inputs.push(tensor.into_dyn());
            }
            graph::ATTENTION_MASK => {
                let tensor = attn_mask_tensor.take().ok_or_else(|| {
                    EncoderError::InvalidConfig(
                        "model requested `attention_mask` multiple times".into(),
                    )
                })?;
                runtime_inputs.push(tensor.into_dyn());
            }
            other => {
                return Err(EncoderError::Inference(format!(
                    "unsupported model input '{other}'"
                )))
            }
        }
    }

    let outputs = session_ref
        .run::<i64, f32, _>(runtime_inputs)
        .map_err(|e| EncoderError::Inference(e.to_string()))?;
    let output_tensor = outputs
        .into_iter()
        .next()
        .ok_or_else(|| EncoderError::Inference("model returned no outputs".into()))?;

    let output = output_tensor.view();
    if output.shape().first() != Some(&batch) {
        return Err(EncoderError::ShapeMismatch(format!(
            "model output {:?} does not match batch {batch}",
            output.shape()
        )));
    }

    match output.ndim() {
        2 => {
            let pooled = output
                .into_dimensionality::<Ix2>()
                .map_err(|e| EncoderError::ShapeMismatch(e.to_string()))?;
            Ok(pooled.to_owned())
        }
        3 => {
            let logits = output
                .into_dimensionality::<Ix3>()
                .map_err(|e| EncoderError::ShapeMismatch(e.to_string()))?;
            tracing::debug!(shape = ?logits.dim(), "pooling logits on host");
            splade_max_pool(logits, host_mask.view())
        }
        rank => Err(EncoderError::ShapeMismatch(format!(
            "expected a rank 2 or 3 model output, got rank {rank}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(ids: &[i64]) -> EncodedDoc {
        EncodedDoc {
            ids: ids.to_vec(),
            mask: vec![1; ids.len()],
        }
    }

    #[test]
    fn padding_appends_zero_ids_and_mask() {
        let (ids, mask) = build_padded_arrays(vec![doc(&[101, 7, 102]), doc(&[101, 102])], 3).unwrap();
        assert_eq!(ids.dim(), (2, 3));
        assert_eq!(ids.row(1).to_vec(), vec![101, 102, 0]);
        assert_eq!(mask.row(1).to_vec(), vec![1, 1, 0]);
        assert_eq!(mask.row(0).to_vec(), vec![1, 1, 1]);
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let broken = EncodedDoc {
            ids: vec![1, 2],
            mask: vec![1],
        };
        assert!(build_padded_arrays(vec![broken], 2).is_err());
    }
}
