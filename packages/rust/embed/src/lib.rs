//! Embedding adapter around an external sentence-embedding model.
//!
//! The model itself is behind the [`EmbeddingModel`] trait. [`Embedder`] owns
//! one and turns its raw `f32` output into the unit-length `f64` vectors that
//! go into a knowledge base, optionally rounding them in lite mode.

#[cfg(feature = "fastembed")]
mod fastembed_backend;

use tracing::{debug, info, instrument};

use pdfkb_shared::{EmbeddingConfig, EmbeddingVector, PdfKbError, Result};

#[cfg(feature = "fastembed")]
pub use fastembed_backend::FastEmbedModel;

/// Norm below which a vector is treated as zero.
const MIN_NORM: f64 = 1e-12;

/// Most decimal digits lite mode will keep. An `f64` holds no more than this.
pub const MAX_PRECISION: u32 = 15;

/// A loaded embedding model.
///
/// Implementations must return exactly one vector per input text, in input
/// order, all of the same length.
pub trait EmbeddingModel: Send + Sync {
    /// Model identifier, for logs.
    fn name(&self) -> &str;

    /// Embed a batch of texts.
    fn embed_texts(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;
}

// ---------------------------------------------------------------------------
// Embedder
// ---------------------------------------------------------------------------

/// Adapter that normalizes (and optionally rounds) model output.
pub struct Embedder {
    model: Box<dyn EmbeddingModel>,
    precision: Option<u32>,
}

impl Embedder {
    /// Wrap a model with full-precision output.
    pub fn new(model: impl EmbeddingModel + 'static) -> Self {
        Self {
            model: Box::new(model),
            precision: None,
        }
    }

    /// Round every component to `digits` decimal places (lite mode).
    ///
    /// Values above [`MAX_PRECISION`] are clamped to it.
    pub fn with_precision(mut self, digits: Option<u32>) -> Self {
        self.precision = digits.map(|d| d.min(MAX_PRECISION));
        self
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Decimal digits kept, or `None` for full precision.
    pub fn precision(&self) -> Option<u32> {
        self.precision
    }

    /// Embed a single fragment.
    pub fn embed(&self, text: &str) -> Result<EmbeddingVector> {
        let mut vectors = self.embed_batch(&[text])?;
        vectors
            .pop()
            .ok_or_else(|| PdfKbError::Embedding("model returned no vector".into()))
    }

    /// Embed fragments in one model call, preserving input order.
    #[instrument(skip_all, fields(model = %self.model.name(), count = texts.len()))]
    pub fn embed_batch(&self, texts: &[&str]) -> Result<Vec<EmbeddingVector>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let raw = self.model.embed_texts(texts)?;
        if raw.len() != texts.len() {
            return Err(PdfKbError::Embedding(format!(
                "model returned {} vectors for {} texts",
                raw.len(),
                texts.len()
            )));
        }

        let vectors = raw
            .into_iter()
            .map(|v| self.finish(v))
            .collect::<Result<Vec<_>>>()?;

        debug!(dimensions = vectors[0].len(), "embedded batch");
        Ok(vectors)
    }

    fn finish(&self, raw: Vec<f32>) -> Result<EmbeddingVector> {
        let mut vector: EmbeddingVector = raw.into_iter().map(f64::from).collect();
        l2_normalize(&mut vector)?;

        if let Some(digits) = self.precision {
            for x in &mut vector {
                *x = round_to(*x, digits);
            }
        }

        Ok(vector)
    }
}

impl std::fmt::Debug for Embedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Embedder")
            .field("model", &self.model.name())
            .field("precision", &self.precision)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Model loading
// ---------------------------------------------------------------------------

/// Load the configured model and wrap it in an [`Embedder`].
///
/// Call this before touching any document: a failure here means nothing can
/// be embedded.
#[cfg(feature = "fastembed")]
pub fn load_model(config: &EmbeddingConfig) -> Result<Embedder> {
    info!(model = %config.model, "loading embedding model");

    let model = FastEmbedModel::load(
        &config.model,
        config.cache_dir.as_deref(),
        config.show_download_progress,
    )?;

    info!(
        model = %config.model,
        dimensions = model.dimensions(),
        lite = config.lite,
        "embedding model loaded"
    );

    Ok(Embedder::new(model).with_precision(config.precision()))
}

/// Load the configured model and wrap it in an [`Embedder`].
#[cfg(not(feature = "fastembed"))]
pub fn load_model(config: &EmbeddingConfig) -> Result<Embedder> {
    info!(model = %config.model, "loading embedding model");
    Err(PdfKbError::model_load(
        &config.model,
        "pdfkb was built without the `fastembed` feature",
    ))
}

/// Whether `name` refers to the backend model published as `model_code`.
///
/// Accepts the full code (`Qdrant/all-MiniLM-L6-v2`) or its last segment
/// (`all-minilm-l6-v2`), ignoring ASCII case.
pub fn matches_model_code(model_code: &str, name: &str) -> bool {
    let name = name.trim();
    if name.is_empty() {
        return false;
    }
    model_code.eq_ignore_ascii_case(name)
        || model_code
            .rsplit('/')
            .next()
            .is_some_and(|short| short.eq_ignore_ascii_case(name))
}

// ---------------------------------------------------------------------------
// Vector math
// ---------------------------------------------------------------------------

/// Scale `vector` to unit Euclidean length in place.
pub fn l2_normalize(vector: &mut [f64]) -> Result<()> {
    if vector.iter().any(|x| !x.is_finite()) {
        return Err(PdfKbError::Embedding(
            "model returned a non-finite component".into(),
        ));
    }

    let norm = vector.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm < MIN_NORM {
        return Err(PdfKbError::Embedding("model returned a zero vector".into()));
    }

    for x in vector.iter_mut() {
        *x /= norm;
    }
    Ok(())
}

/// Euclidean norm.
pub fn l2_norm(vector: &[f64]) -> f64 {
    vector.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Round to `digits` decimal places, at most [`MAX_PRECISION`].
pub fn round_to(value: f64, digits: u32) -> f64 {
    let scale = 10f64.powi(digits.min(MAX_PRECISION) as i32);
    (value * scale).round() / scale
}
