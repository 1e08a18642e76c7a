use fxhash::hash64;
use once_cell::sync::OnceCell;
use onnxruntime::{environment::Environment, session::Session, GraphOptimizationLevel};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tokenizers::Tokenizer;

use crate::assets::ModelAssets;
use crate::tokenizer::{load_tokenizer, TokenizerSource};
use crate::EncoderError;

static ORT_ENV: OnceCell<Environment> = OnceCell::new();

thread_local! {
    static MODEL_CACHE: RefCell<HashMap<ModelCacheKey, Rc<CachedModel>>> =
        RefCell::new(HashMap::new());
}

#[derive(Hash, PartialEq, Eq, Clone)]
struct ModelCacheKey {
    model_path: PathBuf,
    /// Digest of the file's bytes; a rewritten file gets a fresh session.
    model_digest: u64,
    tokenizer: TokenizerSource,
    max_sequence_length: usize,
    num_threads: Option<i16>,
}

pub(crate) struct CachedModel {
    pub(crate) tokenizer: Tokenizer,
    pub(crate) session: RefCell<Session<'static>>,
}

impl CachedModel {
    pub(crate) fn load(
        assets: &ModelAssets,
        model_bytes: &[u8],
        max_sequence_length: usize,
        num_threads: Option<i16>,
    ) -> Result<Self, EncoderError> {
        let tokenizer = load_tokenizer(&assets.tokenizer, max_sequence_length)?;

        // The graph is normalized in memory so that raw checkpoints, raw
        // exports and pooled exports all present the same feeds.
        let base_dir = assets.model_path.parent().unwrap_or_else(|| Path::new("."));
        let model = graph::load_model_from_bytes(model_bytes, base_dir)?;
        let model = graph::prepare_for_runtime(model)?;
        let bytes = graph::encode_model(&model);

        let env = ort_environment()?;
        let mut builder = env
            .new_session_builder()
            .map_err(|e| EncoderError::Inference(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Basic)
            .map_err(|e| EncoderError::Inference(e.to_string()))?;
        if let Some(threads) = num_threads {
            builder = builder
                .with_number_threads(threads)
                .map_err(|e| EncoderError::Inference(e.to_string()))?;
        }
        let session = builder
            .with_model_from_memory(bytes)
            .map_err(|e| EncoderError::Inference(e.to_string()))?;

        tracing::info!(
            model = %assets.model_path.display(),
            tokenizer = %assets.tokenizer.path().display(),
            "loaded splade model"
        );
        Ok(Self {
            tokenizer,
            session: RefCell::new(session),
        })
    }
}

pub(crate) fn get_or_load_model_handle(
    assets: &ModelAssets,
    max_sequence_length: usize,
    num_threads: Option<i16>,
) -> Result<Rc<CachedModel>, EncoderError> {
    let model_bytes = fs::read(&assets.model_path)?;
    let key = ModelCacheKey {
        model_path: assets.model_path.clone(),
        model_digest: hash64(model_bytes.as_slice()),
        tokenizer: assets.tokenizer.clone(),
        max_sequence_length,
        num_threads,
    };

    MODEL_CACHE.with(|cache| {
        let mut cache = cache.borrow_mut();
        if let Some(handle) = cache.get(&key) {
            return Ok(handle.clone());
        }

        let handle = Rc::new(CachedModel::load(
            assets,
            &model_bytes,
            max_sequence_length,
            num_threads,
        )?);
        // Sessions for earlier contents of the same file are stale.
        cache.retain(|k, _| k.model_path != key.model_path || k.model_digest == key.model_digest);
        cache.insert(key, handle.clone());
        Ok(handle)
    })
}

fn ort_environment() -> Result<&'static Environment, EncoderError> {
    ORT_ENV.get_or_try_init(|| {
        Environment::builder()
            .with_name("splade")
            .build()
            .map_err(|e| EncoderError::Inference(e.to_string()))
    })
}
