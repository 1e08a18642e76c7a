//! SPLADE Sparse Encoding
//!
//! This crate turns text into SPLADE sparse embeddings: one non-negative
//! weight per vocabulary term, most of them zero. Scores between queries and
//! documents are plain inner products over those weights.
//!
//! Two kinds of graphs work:
//!
//! - **Pooled graphs** (`splade_pooled.onnx`) already end in the SPLADE head
//!   and return `(batch, vocab)` directly.
//! - **Logits graphs** (a raw export, or the checkpoint's own
//!   `onnx/model.onnx`) return `(batch, seq_len, vocab)`; we apply
//!   `max_t log(1 + relu(x))` on the host, skipping padded positions.
//!
//! Model files come from a local path or a pinned revision of a Hugging Face
//! repository, cached under `./models` by default.
//!
//! ## Threading notes
//!
//! Tokenizers and ONNX sessions get cached per-thread. The first encoder on a
//! thread pays the setup; later ones with the same files share it.
//! [`SpladeEncoder`] is therefore not `Send`.
//!
//! ## Quick example
//!
//! ```no_run
//! use encoder::{EncoderConfig, SpladeEncoder};
//!
//! let encoder = SpladeEncoder::from_config(EncoderConfig::default()).unwrap();
//! let queries = encoder.encode_query(&["what causes aging fast"]).unwrap();
//! let docs = encoder
//!     .encode_document(&["UV-A light, specifically, is what mainly causes tanning, skin aging, and cataracts"])
//!     .unwrap();
//! let scores = encoder.similarity(&queries, &docs).unwrap();
//! println!("{scores}");
//! ```
//!
//! ## Env vars to know
//!
//! - `HF_TOKEN` - bearer token for gated or private repositories

pub mod config;
pub mod error;
pub mod types;

mod assets;
mod cache;
mod hub;
mod onnx;
mod pooling;
mod similarity;
mod tokenizer;

pub use onnxruntime::ndarray;

pub use crate::assets::{resolve_model_assets, ModelAssets};
pub use crate::config::{EncoderConfig, HubSource};
pub use crate::error::EncoderError;
pub use crate::hub::HF_TOKEN_ENV;
pub use crate::pooling::{splade_activation, splade_max_pool};
pub use crate::similarity::{similarity, SimilarityFunction};
pub use crate::types::{SparseEmbeddings, SparseVector};

use std::borrow::Cow;
use std::rc::Rc;

use crate::cache::{get_or_load_model_handle, CachedModel};
use crate::ndarray::{Array2, ArrayView1};
use crate::onnx::run_splade;

/// A loaded SPLADE model bound to one configuration.
pub struct SpladeEncoder {
    cfg: EncoderConfig,
    assets: ModelAssets,
    handle: Rc<CachedModel>,
}

impl SpladeEncoder {
    /// Resolves the model files (downloading missing hub files) and loads
    /// the tokenizer and ONNX session.
    pub fn from_config(cfg: EncoderConfig) -> Result<Self, EncoderError> {
        if cfg.max_sequence_length == 0 {
            return Err(EncoderError::InvalidConfig(
                "max_sequence_length must be positive".into(),
            ));
        }
        let assets = resolve_model_assets(&cfg)?;
        let handle = get_or_load_model_handle(&assets, cfg.max_sequence_length, cfg.num_threads)?;
        Ok(Self {
            cfg,
            assets,
            handle,
        })
    }

    /// Default settings bound to the hub checkpoint `model_id`.
    pub fn from_pretrained(model_id: &str) -> Result<Self, EncoderError> {
        Self::from_config(EncoderConfig::for_model(model_id))
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.cfg
    }

    pub fn assets(&self) -> &ModelAssets {
        &self.assets
    }

    /// Encodes `texts` as given, one row per text in input order.
    ///
    /// Fails with [`EncoderError::EmptyInput`] when `texts` is empty.
    pub fn encode<T>(&self, texts: &[T]) -> Result<SparseEmbeddings, EncoderError>
    where
        T: AsRef<str>,
    {
        let values = run_splade(&self.handle, texts)?;
        let (batch, vocab) = values.dim();
        if let Some(expected) = self.cfg.vocab_size {
            if vocab != expected {
                return Err(EncoderError::VocabMismatch {
                    expected,
                    found: vocab,
                });
            }
        }
        tracing::debug!(batch, vocab, "encoded batch");
        Ok(SparseEmbeddings::new(values))
    }

    /// [`encode`](Self::encode) with the configured query prefix.
    pub fn encode_query<T>(&self, texts: &[T]) -> Result<SparseEmbeddings, EncoderError>
    where
        T: AsRef<str>,
    {
        self.encode(&with_prefix(self.cfg.query_prefix.as_deref(), texts))
    }

    /// [`encode`](Self::encode) with the configured document prefix.
    pub fn encode_document<T>(&self, texts: &[T]) -> Result<SparseEmbeddings, EncoderError>
    where
        T: AsRef<str>,
    {
        self.encode(&with_prefix(self.cfg.document_prefix.as_deref(), texts))
    }

    /// `(queries, documents)` score matrix using the configured function.
    pub fn similarity(
        &self,
        queries: &SparseEmbeddings,
        documents: &SparseEmbeddings,
    ) -> Result<Array2<f32>, EncoderError> {
        similarity(self.cfg.similarity, queries.view(), documents.view())
    }

    /// The `top_k` heaviest non-zero terms of `row`, heaviest first.
    pub fn decode(&self, row: ArrayView1<f32>, top_k: usize) -> Vec<(String, f32)> {
        let mut weighted: Vec<(u32, f32)> = row
            .iter()
            .enumerate()
            .filter(|&(_, &w)| w > 0.0)
            .map(|(i, &w)| (i as u32, w))
            .collect();
        weighted.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        weighted.truncate(top_k);

        weighted
            .into_iter()
            .map(|(id, w)| {
                let token = self
                    .handle
                    .tokenizer
                    .id_to_token(id)
                    .unwrap_or_else(|| format!("[{id}]"));
                (token, w)
            })
            .collect()
    }

    /// Token ids the model sees for `text`, special tokens and truncation included.
    pub fn token_ids(&self, text: &str) -> Result<Vec<u32>, EncoderError> {
        let encoding = self
            .handle
            .tokenizer
            .encode(text, true)
            .map_err(|e| EncoderError::Tokenizer(e.to_string()))?;
        Ok(encoding.get_ids().to_vec())
    }

    /// Size of the tokenizer vocabulary, added tokens included.
    pub fn vocab_size(&self) -> usize {
        self.handle.tokenizer.get_vocab_size(true)
    }
}

fn with_prefix<'a, T>(prefix: Option<&str>, texts: &'a [T]) -> Vec<Cow<'a, str>>
where
    T: AsRef<str>,
{
    texts
        .iter()
        .map(|t| match prefix {
            Some(p) => Cow::Owned(format!("{p}{}", t.as_ref())),
            None => Cow::Borrowed(t.as_ref()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_is_prepended() {
        let texts = with_prefix(Some("query: "), &["aging", "sun"]);
        assert_eq!(texts, vec!["query: aging", "query: sun"]);
    }

    #[test]
    fn no_prefix_borrows() {
        let texts = with_prefix(None, &["aging"]);
        assert!(matches!(texts[0], Cow::Borrowed("aging")));
    }

    #[test]
    fn zero_sequence_length_is_rejected() {
        let cfg = EncoderConfig {
            max_sequence_length: 0,
            ..Default::default()
        };
        assert!(matches!(
            SpladeEncoder::from_config(cfg),
            Err(EncoderError::InvalidConfig(_))
        ));
    }
}
