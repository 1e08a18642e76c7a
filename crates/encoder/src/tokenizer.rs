use std::path::{Path, PathBuf};

use tokenizers::decoders::wordpiece::WordPiece as WordPieceDecoder;
use tokenizers::models::wordpiece::WordPiece;
use tokenizers::normalizers::bert::BertNormalizer;
use tokenizers::pre_tokenizers::bert::BertPreTokenizer;
use tokenizers::processors::bert::BertProcessing;
use tokenizers::{Model, Tokenizer, TruncationParams};

use crate::EncoderError;

/// Where the tokenizer definition lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum TokenizerSource {
    /// Serialized `tokenizers` pipeline.
    Json(PathBuf),
    /// Bare BERT word-piece vocabulary, one token per line.
    WordPieceVocab(PathBuf),
}

impl TokenizerSource {
    /// Picks the variant from the file name: `*.txt` is a vocabulary.
    pub(crate) fn from_path(path: PathBuf) -> Self {
        if path.extension().is_some_and(|ext| ext == "txt") {
            TokenizerSource::WordPieceVocab(path)
        } else {
            TokenizerSource::Json(path)
        }
    }

    pub(crate) fn path(&self) -> &Path {
        match self {
            TokenizerSource::Json(path) | TokenizerSource::WordPieceVocab(path) => path,
        }
    }
}

/// Loads the tokenizer and arms truncation at `max_length` tokens.
pub(crate) fn load_tokenizer(
    source: &TokenizerSource,
    max_length: usize,
) -> Result<Tokenizer, EncoderError> {
    let mut tokenizer = match source {
        TokenizerSource::Json(path) => {
            Tokenizer::from_file(path).map_err(|e| EncoderError::Tokenizer(e.to_string()))?
        }
        TokenizerSource::WordPieceVocab(path) => bert_wordpiece(path)?,
    };

    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length,
            ..Default::default()
        }))
        .map_err(|e| EncoderError::Tokenizer(e.to_string()))?;
    // Padding is applied per batch when the tensors are built.
    tokenizer.with_padding(None);
    Ok(tokenizer)
}

/// Uncased BERT pipeline around a `vocab.txt`.
fn bert_wordpiece(vocab: &Path) -> Result<Tokenizer, EncoderError> {
    let vocab_path = vocab
        .to_str()
        .ok_or_else(|| EncoderError::TokenizerMissing(vocab.display().to_string()))?;
    let model = WordPiece::from_file(vocab_path)
        .build()
        .map_err(|e| EncoderError::Tokenizer(e.to_string()))?;

    let special = |token: &str| {
        model
            .token_to_id(token)
            .ok_or_else(|| EncoderError::Tokenizer(format!("vocabulary has no {token} token")))
    };
    let cls = ("[CLS]".to_string(), special("[CLS]")?);
    let sep = ("[SEP]".to_string(), special("[SEP]")?);

    let mut tokenizer = Tokenizer::new(model);
    tokenizer
        .with_normalizer(Some(BertNormalizer::default()))
        .with_pre_tokenizer(Some(BertPreTokenizer))
        .with_post_processor(Some(BertProcessing::new(sep, cls)))
        .with_decoder(Some(WordPieceDecoder::default()));
    tracing::debug!(path = %vocab.display(), "built word-piece tokenizer from vocabulary");
    Ok(tokenizer)
}
