//! Local ONNX embedding models via `fastembed`.

use std::path::PathBuf;
use std::sync::Mutex;

use fastembed::{InitOptions, TextEmbedding};
use tracing::debug;

use pdfkb_shared::{PdfKbError, Result};

use crate::{EmbeddingModel, matches_model_code};

/// A `fastembed` text-embedding model resolved by name.
pub struct FastEmbedModel {
    name: String,
    dimensions: usize,
    // Inference needs exclusive access to the ONNX session.
    inner: Mutex<TextEmbedding>,
}

impl FastEmbedModel {
    /// Resolve `name` against fastembed's supported models and initialize it,
    /// downloading the weights into `cache_dir` on first use.
    pub fn load(name: &str, cache_dir: Option<&str>, show_download_progress: bool) -> Result<Self> {
        let info = TextEmbedding::list_supported_models()
            .into_iter()
            .find(|info| matches_model_code(&info.model_code, name))
            .ok_or_else(|| {
                PdfKbError::model_load(name, "not in the list of supported embedding models")
            })?;

        debug!(code = %info.model_code, dim = info.dim, "resolved embedding model");

        let mut options =
            InitOptions::new(info.model).with_show_download_progress(show_download_progress);
        if let Some(dir) = cache_dir {
            options = options.with_cache_dir(PathBuf::from(dir));
        }

        let model = TextEmbedding::try_new(options)
            .map_err(|e| PdfKbError::model_load(name, e.to_string()))?;

        Ok(Self {
            name: info.model_code,
            dimensions: info.dim,
            inner: Mutex::new(model),
        })
    }

    /// Length of the vectors this model produces.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }
}

impl EmbeddingModel for FastEmbedModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn embed_texts(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut model = self
            .inner
            .lock()
            .map_err(|_| PdfKbError::Embedding("embedding model lock poisoned".into()))?;

        model
            .embed(texts.to_vec(), None)
            .map_err(|e| PdfKbError::Embedding(e.to_string()))
    }
}
