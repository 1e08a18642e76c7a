use std::path::PathBuf;

use crate::tokenizer::TokenizerSource;
use crate::{EncoderConfig, EncoderError};

const TOKENIZER_JSON: &str = "tokenizer.json";
const VOCAB_TXT: &str = "vocab.txt";

/// Local files backing one encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelAssets {
    pub model_path: PathBuf,
    pub(crate) tokenizer: TokenizerSource,
}

impl ModelAssets {
    pub fn tokenizer_path(&self) -> &std::path::Path {
        self.tokenizer.path()
    }
}

/// Resolves the graph and tokenizer for `cfg`. Explicit local paths win;
/// everything else comes from the configured hub revision.
pub fn resolve_model_assets(cfg: &EncoderConfig) -> Result<ModelAssets, EncoderError> {
    let model_path = match &cfg.model_path {
        Some(path) if path.exists() => path.clone(),
        Some(path) => return Err(EncoderError::ModelNotFound(path.display().to_string())),
        None => cfg.hub.fetch(&cfg.model_file)?,
    };

    let tokenizer = match &cfg.tokenizer_path {
        Some(path) if path.exists() => TokenizerSource::from_path(path.clone()),
        Some(path) => return Err(EncoderError::TokenizerMissing(path.display().to_string())),
        None => hub_tokenizer(cfg)?,
    };

    Ok(ModelAssets {
        model_path,
        tokenizer,
    })
}

/// `tokenizer.json` when the repository has one, else its `vocab.txt`.
fn hub_tokenizer(cfg: &EncoderConfig) -> Result<TokenizerSource, EncoderError> {
    match cfg.hub.fetch(TOKENIZER_JSON) {
        Ok(path) => Ok(TokenizerSource::Json(path)),
        Err(EncoderError::RemoteFileMissing(_)) => {
            tracing::info!(
                model_id = %cfg.hub.model_id,
                "no tokenizer.json on hub, falling back to vocab.txt"
            );
            match cfg.hub.fetch(VOCAB_TXT) {
                Ok(path) => Ok(TokenizerSource::WordPieceVocab(path)),
                Err(EncoderError::RemoteFileMissing(_)) => Err(EncoderError::TokenizerMissing(
                    cfg.hub.model_id.clone(),
                )),
                Err(err) => Err(err),
            }
        }
        Err(err) => Err(err),
    }
}
