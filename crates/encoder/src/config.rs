use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::similarity::SimilarityFunction;

/// Where checkpoint files come from when no local path is given.
///
/// Files land in `cache_dir/models--{org}--{name}/{revision}/` and are reused
/// on later runs without touching the network.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HubSource {
    /// Base URL of the model hub.
    pub endpoint: String,
    /// Repository id, e.g. `naver/splade-cocondenser-ensembledistil`.
    pub model_id: String,
    /// Branch, tag, or commit pinned for every download.
    pub revision: String,
    /// Local download cache.
    pub cache_dir: PathBuf,
    /// Bearer token. Falls back to the `HF_TOKEN` environment variable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    /// Per-request timeout in seconds; `None` waits indefinitely.
    pub timeout_secs: Option<u64>,
}

impl Default for HubSource {
    fn default() -> Self {
        Self {
            endpoint: "https://huggingface.co".into(),
            model_id: "naver/splade-cocondenser-ensembledistil".into(),
            revision: "main".into(),
            cache_dir: PathBuf::from("./models"),
            auth_token: None,
            timeout_secs: Some(600),
        }
    }
}

/// Runtime configuration of a [`SpladeEncoder`](crate::SpladeEncoder).
///
/// # Example
/// ```no_run
/// use encoder::{EncoderConfig, SpladeEncoder};
/// use std::path::PathBuf;
///
/// let cfg = EncoderConfig {
///     model_path: Some(PathBuf::from("splade_pooled.onnx")),
///     ..Default::default()
/// };
/// let encoder = SpladeEncoder::from_config(cfg).unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EncoderConfig {
    /// Checkpoint location used for every file not given locally.
    pub hub: HubSource,
    /// Local ONNX graph (raw logits or pooled). Overrides the hub.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_path: Option<PathBuf>,
    /// Graph file inside the hub repository.
    pub model_file: String,
    /// Local `tokenizer.json`, or a word-piece `vocab.txt`. Overrides the hub.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokenizer_path: Option<PathBuf>,
    /// Longer inputs are truncated.
    pub max_sequence_length: usize,
    /// Expected embedding width; checked against the model output when set.
    pub vocab_size: Option<usize>,
    /// Score function used by [`SpladeEncoder::similarity`](crate::SpladeEncoder::similarity).
    pub similarity: SimilarityFunction,
    /// Prepended to every text passed to `encode_query`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_prefix: Option<String>,
    /// Prepended to every text passed to `encode_document`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_prefix: Option<String>,
    /// ONNX Runtime intra-op threads; runtime default when `None`.
    pub num_threads: Option<i16>,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            hub: HubSource::default(),
            model_path: None,
            model_file: "onnx/model.onnx".into(),
            tokenizer_path: None,
            max_sequence_length: 512,
            vocab_size: Some(30522),
            similarity: SimilarityFunction::Dot,
            query_prefix: None,
            document_prefix: None,
            num_threads: None,
        }
    }
}

impl EncoderConfig {
    /// Defaults bound to another hub checkpoint.
    pub fn for_model(model_id: &str) -> Self {
        Self {
            hub: HubSource {
                model_id: model_id.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_default_values() {
        let cfg = EncoderConfig::default();
        assert_eq!(cfg.hub.endpoint, "https://huggingface.co");
        assert_eq!(cfg.hub.model_id, "naver/splade-cocondenser-ensembledistil");
        assert_eq!(cfg.hub.revision, "main");
        assert_eq!(cfg.hub.cache_dir, PathBuf::from("./models"));
        assert!(cfg.model_path.is_none());
        assert_eq!(cfg.model_file, "onnx/model.onnx");
        assert_eq!(cfg.max_sequence_length, 512);
        assert_eq!(cfg.vocab_size, Some(30522));
        assert_eq!(cfg.similarity, SimilarityFunction::Dot);
    }

    #[test]
    fn config_for_model_keeps_other_defaults() {
        let cfg = EncoderConfig::for_model("org/other-splade");
        assert_eq!(cfg.hub.model_id, "org/other-splade");
        assert_eq!(cfg.hub.revision, "main");
        assert_eq!(cfg.max_sequence_length, 512);
    }

    #[test]
    fn config_serde_roundtrip() {
        let cfg = EncoderConfig {
            model_path: Some(PathBuf::from("/models/splade_pooled.onnx")),
            query_prefix: Some("query: ".into()),
            similarity: SimilarityFunction::Cosine,
            num_threads: Some(2),
            ..Default::default()
        };

        let serialized = serde_json::to_string(&cfg).unwrap();
        let deserialized: EncoderConfig = serde_json::from_str(&serialized).unwrap();
        assert_eq!(cfg, deserialized);
    }

    #[test]
    fn config_partial_json_fills_defaults() {
        let cfg: EncoderConfig =
            serde_json::from_str(r#"{"hub": {"revision": "v1"}, "similarity": "cosine"}"#).unwrap();
        assert_eq!(cfg.hub.revision, "v1");
        assert_eq!(cfg.hub.model_id, "naver/splade-cocondenser-ensembledistil");
        assert_eq!(cfg.similarity, SimilarityFunction::Cosine);
    }
}
