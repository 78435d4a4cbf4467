//! ONNX sentence-transformer embedder (all-MiniLM-L6-v2).

use std::path::Path;
use std::sync::Mutex;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tracing::{debug, info};

use super::{validate_vector, Embedder, EmbeddingError};
use crate::math;
use crate::sync::RecoverableMutex;

const MODEL_ID: &str = "all-minilm-l6-v2";
const MODEL_DIMENSIONS: usize = 384;

/// Local ONNX embedder; the model is downloaded into the cache directory on first load.
pub struct OnnxEmbedder {
    model: Mutex<TextEmbedding>,
}

impl std::fmt::Debug for OnnxEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxEmbedder")
            .field("model", &MODEL_ID)
            .field("dimensions", &MODEL_DIMENSIONS)
            .finish()
    }
}

impl OnnxEmbedder {
    pub fn load(cache_dir: Option<&Path>) -> Result<Self, EmbeddingError> {
        info!(model = MODEL_ID, "Loading ONNX embedding model");

        let mut options =
            InitOptions::new(EmbeddingModel::AllMiniLML6V2).with_show_download_progress(false);
        if let Some(dir) = cache_dir {
            options = options.with_cache_dir(dir.to_path_buf());
        }

        let model = TextEmbedding::try_new(options)
            .map_err(|e| EmbeddingError::ModelUnavailable(e.to_string()))?;

        Ok(Self {
            model: Mutex::new(model),
        })
    }
}

impl Embedder for OnnxEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }

        let mut model = self.model.lock_or_recover();
        let mut outputs = model
            .embed(vec![text], None)
            .map_err(|e| EmbeddingError::Inference(e.to_string()))?;
        drop(model);

        let mut vector = outputs
            .pop()
            .ok_or_else(|| EmbeddingError::Inference("model returned no embedding".to_string()))?;
        debug!(len = vector.len(), "ONNX embedding computed");

        math::normalize_in_place(&mut vector);
        validate_vector(&vector, MODEL_DIMENSIONS)?;
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        MODEL_DIMENSIONS
    }

    fn model_id(&self) -> &str {
        MODEL_ID
    }
}
