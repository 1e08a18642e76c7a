//! YAML Configuration File Support
//!
//! Both flows read one YAML file. Every section is optional; an empty file
//! (or no file at all) reproduces the stock setup: the
//! `naver/splade-cocondenser-ensembledistil` checkpoint at `main`, exports
//! written to the working directory, and the sample query/documents.
//!
//! ## Example YAML Configuration
//!
//! ```yaml
//! version: "1.0"
//!
//! checkpoint:
//!   model_id: "naver/splade-cocondenser-ensembledistil"
//!   revision: "main"
//!   cache_dir: "./models"
//!
//! export:
//!   output_dir: "."
//!   opset_version: 14
//!   mask_padding: true
//!   dummy_text: "export test to onnx"
//!   verify: true
//!
//! inference:
//!   model_path: "splade_pooled.onnx"
//!   similarity: "dot"
//!   queries:
//!     - "what causes aging fast"
//!   documents:
//!     - "UV-A light is what mainly causes tanning and skin aging."
//!
//! logging:
//!   level: "info"
//!   json: false
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use encoder::{EncoderConfig, HubSource, SimilarityFunction};
use graph::ExportConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when loading YAML configuration files
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),
}

/// Top-level YAML configuration shared by `splade-export` and `splade-encode`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct SpladeConfig {
    /// Configuration format version
    #[serde(default = "default_config_version")]
    pub version: String,

    /// Optional configuration name/description
    #[serde(default)]
    pub name: Option<String>,

    /// Checkpoint both flows are bound to
    #[serde(default)]
    pub checkpoint: CheckpointYamlConfig,

    /// Graph export settings
    #[serde(default)]
    pub export: ExportYamlConfig,

    /// Encoder and sample inputs for the inference flow
    #[serde(default)]
    pub inference: InferenceYamlConfig,

    #[serde(default)]
    pub logging: LoggingYamlConfig,
}

impl SpladeConfig {
    /// Load a YAML configuration file from the given path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse YAML configuration from a string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        // An empty document parses as unit, not as an empty map.
        let config: SpladeConfig = if yaml.trim().is_empty() {
            SpladeConfig::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// `from_file` when a path is given, defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigLoadError> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => Ok(()),
            v => Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }?;

        self.checkpoint.validate()?;
        self.export.validate()?;
        self.inference.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    pub fn hub(&self) -> HubSource {
        let cp = &self.checkpoint;
        HubSource {
            endpoint: cp.endpoint.clone(),
            model_id: cp.model_id.clone(),
            revision: cp.revision.clone(),
            cache_dir: cp.cache_dir.clone(),
            auth_token: cp.auth_token.clone(),
            timeout_secs: cp.timeout_secs,
        }
    }

    /// Encoder settings for the inference flow.
    pub fn encoder_config(&self) -> EncoderConfig {
        let inf = &self.inference;
        EncoderConfig {
            hub: self.hub(),
            model_path: inf.model_path.clone(),
            model_file: self.checkpoint.model_file.clone(),
            tokenizer_path: self.checkpoint.tokenizer_path.clone(),
            max_sequence_length: inf.max_sequence_length,
            vocab_size: inf.vocab_size,
            similarity: inf.similarity,
            query_prefix: inf.query_prefix.clone(),
            document_prefix: inf.document_prefix.clone(),
            num_threads: inf.num_threads,
        }
    }
}

impl Default for SpladeConfig {
    fn default() -> Self {
        Self {
            version: default_config_version(),
            name: None,
            checkpoint: CheckpointYamlConfig::default(),
            export: ExportYamlConfig::default(),
            inference: InferenceYamlConfig::default(),
            logging: LoggingYamlConfig::default(),
        }
    }
}

/// Checkpoint YAML configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckpointYamlConfig {
    #[serde(default = "default_model_id")]
    pub model_id: String,

    /// Branch, tag, or commit pinned for every file either flow downloads
    #[serde(default = "default_revision")]
    pub revision: String,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Masked-LM graph inside the repository
    #[serde(default = "default_model_file")]
    pub model_file: String,

    /// Local `tokenizer.json` or `vocab.txt` used instead of the hub copy
    #[serde(default)]
    pub tokenizer_path: Option<PathBuf>,

    /// Bearer token; `HF_TOKEN` is consulted when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    #[serde(default = "default_timeout")]
    pub timeout_secs: Option<u64>,
}

impl CheckpointYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.model_id.trim().is_empty() {
            return Err(ConfigLoadError::Validation(
                "checkpoint.model_id must not be empty".to_string(),
            ));
        }
        if self.revision.trim().is_empty() {
            return Err(ConfigLoadError::Validation(
                "checkpoint.revision must not be empty".to_string(),
            ));
        }
        if self.model_file.trim().is_empty() {
            return Err(ConfigLoadError::Validation(
                "checkpoint.model_file must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for CheckpointYamlConfig {
    fn default() -> Self {
        Self {
            model_id: default_model_id(),
            revision: default_revision(),
            endpoint: default_endpoint(),
            cache_dir: default_cache_dir(),
            model_file: default_model_file(),
            tokenizer_path: None,
            auth_token: None,
            timeout_secs: default_timeout(),
        }
    }
}

/// Export YAML configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExportYamlConfig {
    /// Graph rewrite and output file settings
    #[serde(flatten)]
    pub graph: ExportConfig,

    /// Local masked-LM graph used instead of the checkpoint's
    #[serde(default)]
    pub source_model: Option<PathBuf>,

    /// Sample text run through both exports for verification
    #[serde(default = "default_dummy_text")]
    pub dummy_text: String,

    /// Compare the raw and pooled exports on `dummy_text` after writing
    #[serde(default = "true_value")]
    pub verify: bool,

    /// Largest tolerated absolute difference between the two exports
    #[serde(default = "default_tolerance")]
    pub tolerance: f32,
}

impl ExportYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        let opset = self.graph.opset_version;
        if !(graph::MIN_SOURCE_OPSET..=14).contains(&opset) {
            return Err(ConfigLoadError::Validation(format!(
                "export.opset_version must be between {} and 14, got {opset}",
                graph::MIN_SOURCE_OPSET
            )));
        }
        if self.graph.raw_file_name.is_empty() || self.graph.pooled_file_name.is_empty() {
            return Err(ConfigLoadError::Validation(
                "export file names must not be empty".to_string(),
            ));
        }
        if self.graph.raw_file_name == self.graph.pooled_file_name {
            return Err(ConfigLoadError::Validation(
                "export.raw_file_name and export.pooled_file_name must differ".to_string(),
            ));
        }
        if self.verify && self.dummy_text.trim().is_empty() {
            return Err(ConfigLoadError::Validation(
                "export.dummy_text must not be empty when verify is on".to_string(),
            ));
        }
        if self.tolerance.is_nan() || self.tolerance < 0.0 {
            return Err(ConfigLoadError::Validation(
                "export.tolerance must be >= 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ExportYamlConfig {
    fn default() -> Self {
        Self {
            graph: ExportConfig::default(),
            source_model: None,
            dummy_text: default_dummy_text(),
            verify: true,
            tolerance: default_tolerance(),
        }
    }
}

/// Inference YAML configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InferenceYamlConfig {
    /// Local graph (raw or pooled export); the checkpoint's graph when unset
    #[serde(default)]
    pub model_path: Option<PathBuf>,

    #[serde(default = "default_queries")]
    pub queries: Vec<String>,

    #[serde(default = "default_documents")]
    pub documents: Vec<String>,

    #[serde(default)]
    pub similarity: SimilarityFunction,

    #[serde(default = "default_max_sequence_length")]
    pub max_sequence_length: usize,

    #[serde(default = "default_vocab_size")]
    pub vocab_size: Option<usize>,

    #[serde(default)]
    pub query_prefix: Option<String>,

    #[serde(default)]
    pub document_prefix: Option<String>,

    #[serde(default)]
    pub num_threads: Option<i16>,
}

impl InferenceYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.queries.is_empty() {
            return Err(ConfigLoadError::Validation(
                "inference.queries must not be empty".to_string(),
            ));
        }
        if self.documents.is_empty() {
            return Err(ConfigLoadError::Validation(
                "inference.documents must not be empty".to_string(),
            ));
        }
        if self.max_sequence_length == 0 {
            return Err(ConfigLoadError::Validation(
                "inference.max_sequence_length must be >= 1".to_string(),
            ));
        }
        if self.vocab_size == Some(0) {
            return Err(ConfigLoadError::Validation(
                "inference.vocab_size must be >= 1".to_string(),
            ));
        }
        if matches!(self.num_threads, Some(n) if n < 1) {
            return Err(ConfigLoadError::Validation(
                "inference.num_threads must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for InferenceYamlConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            queries: default_queries(),
            documents: default_documents(),
            similarity: SimilarityFunction::Dot,
            max_sequence_length: default_max_sequence_length(),
            vocab_size: default_vocab_size(),
            query_prefix: None,
            document_prefix: None,
            num_threads: None,
        }
    }
}

/// Logging YAML configuration. `RUST_LOG` wins over `level` when set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingYamlConfig {
    /// `tracing` filter directive, e.g. `info` or `encoder=debug,info`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl LoggingYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.level.trim().is_empty() {
            return Err(ConfigLoadError::Validation(
                "logging.level must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for LoggingYamlConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_config_version() -> String {
    "1.0".to_string()
}
fn default_model_id() -> String {
    "naver/splade-cocondenser-ensembledistil".to_string()
}
fn default_revision() -> String {
    "main".to_string()
}
fn default_endpoint() -> String {
    "https://huggingface.co".to_string()
}
fn default_cache_dir() -> PathBuf {
    PathBuf::from("./models")
}
fn default_model_file() -> String {
    "onnx/model.onnx".to_string()
}
fn default_timeout() -> Option<u64> {
    Some(600)
}
fn default_dummy_text() -> String {
    "export test to onnx".to_string()
}
fn true_value() -> bool {
    true
}
fn default_tolerance() -> f32 {
    1e-4
}
fn default_queries() -> Vec<String> {
    vec!["what causes aging fast".to_string()]
}
fn default_documents() -> Vec<String> {
    vec![
        "UV-A light, specifically, is what mainly causes tanning, skin aging, and cataracts, UV-B causes sunburn, skin aging and skin cancer, and UV-C is the strongest, and therefore most effective at killing microorganisms. Again \u{e2}\u{80}\u{93} single words and multiple bullets.".to_string(),
        "Answers from Ronald Petersen, M.D. Yes, Alzheimer's disease usually worsens slowly. But its speed of progression varies, depending on a person's genetic makeup, environmental factors, age at diagnosis and other medical conditions. Still, anyone diagnosed with Alzheimer's whose symptoms seem to be progressing quickly \u{e2}\u{80}\u{94} or who experiences a sudden decline \u{e2}\u{80}\u{94} should see his or her doctor.".to_string(),
        "Bell's palsy and Extreme tiredness and Extreme fatigue (2 causes) Bell's palsy and Extreme tiredness and Hepatitis (2 causes) Bell's palsy and Extreme tiredness and Liver pain (2 causes) Bell's palsy and Extreme tiredness and Lymph node swelling in children (2 causes)".to_string(),
    ]
}
fn default_max_sequence_length() -> usize {
    512
}
fn default_vocab_size() -> Option<usize> {
    Some(30522)
}
fn default_log_level() -> String {
    "info".to_string()
}
