use onnxruntime::ndarray::{Array2, ArrayView2, ArrayView3, Axis};

use crate::EncoderError;

/// `ln(1 + max(0, x))`. Never negative.
#[inline]
pub fn splade_activation(x: f32) -> f32 {
    x.max(0.0).ln_1p()
}

/// Host-side SPLADE pooling of `(batch, seq_len, vocab)` logits into
/// `(batch, vocab)`: the maximum activation over positions whose mask is
/// non-zero. Rows with no unmasked position stay all-zero.
pub fn splade_max_pool(
    logits: ArrayView3<f32>,
    attention_mask: ArrayView2<i64>,
) -> Result<Array2<f32>, EncoderError> {
    let (batch, seq_len, vocab) = logits.dim();
    if attention_mask.dim() != (batch, seq_len) {
        return Err(EncoderError::ShapeMismatch(format!(
            "logits are ({batch}, {seq_len}, {vocab}) but mask is {:?}",
            attention_mask.dim()
        )));
    }

    let mut pooled = Array2::<f32>::zeros((batch, vocab));
    for (b, mut acc) in pooled.axis_iter_mut(Axis(0)).enumerate() {
        let doc = logits.index_axis(Axis(0), b);
        for (t, position) in doc.axis_iter(Axis(0)).enumerate() {
            if attention_mask[[b, t]] == 0 {
                continue;
            }
            acc.zip_mut_with(&position, |best, &x| {
                let value = splade_activation(x);
                if value > *best {
                    *best = value;
                }
            });
        }
    }
    Ok(pooled)
}
