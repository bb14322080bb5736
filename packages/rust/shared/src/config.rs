//! Application configuration for pdfkb.
//!
//! User config lives at `~/.pdfkb/pdfkb.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PdfKbError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "pdfkb.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".pdfkb";

// ---------------------------------------------------------------------------
// Config structs (matching pdfkb.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Embedding model settings.
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Fragment quality thresholds.
    #[serde(default)]
    pub segment: SegmentConfig,

    /// PDF extraction settings.
    #[serde(default)]
    pub extract: ExtractConfig,

    /// Merge behavior.
    #[serde(default)]
    pub merge: MergeConfig,

    /// Search defaults.
    #[serde(default)]
    pub search: SearchConfig,
}

/// `[embedding]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Model name, matched against the backend's supported model codes.
    #[serde(default = "default_model")]
    pub model: String,

    /// Fragments per model invocation.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Round vector components to `lite_precision` decimal digits.
    #[serde(default)]
    pub lite: bool,

    /// Decimal digits kept in lite mode.
    #[serde(default = "default_lite_precision")]
    pub lite_precision: u32,

    /// Where downloaded model files are cached (backend default if unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<String>,

    /// Show the backend's download progress on first use of a model.
    #[serde(default = "default_true")]
    pub show_download_progress: bool,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            batch_size: default_batch_size(),
            lite: false,
            lite_precision: default_lite_precision(),
            cache_dir: None,
            show_download_progress: true,
        }
    }
}

impl EmbeddingConfig {
    /// Digits to round to, or `None` when lite mode is off.
    pub fn precision(&self) -> Option<u32> {
        self.lite.then_some(self.lite_precision)
    }
}

fn default_model() -> String {
    "all-mpnet-base-v2".into()
}
fn default_batch_size() -> usize {
    32
}
fn default_lite_precision() -> u32 {
    4
}
fn default_true() -> bool {
    true
}

/// `[segment]` section: fragment quality gates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentConfig {
    /// Minimum fragment length in characters.
    #[serde(default = "default_min_chars")]
    pub min_chars: usize,

    /// Minimum number of real words per fragment.
    #[serde(default = "default_min_words")]
    pub min_words: usize,

    /// Letters needed for a run to count as a real word.
    #[serde(default = "default_min_word_len")]
    pub min_word_len: usize,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            min_chars: default_min_chars(),
            min_words: default_min_words(),
            min_word_len: default_min_word_len(),
        }
    }
}

fn default_min_chars() -> usize {
    40
}
fn default_min_words() -> usize {
    5
}
fn default_min_word_len() -> usize {
    2
}

/// How the extractor hands text to the builder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractMode {
    /// One text blob for the whole document.
    #[default]
    Document,
    /// One text blob per page.
    Pages,
}

impl std::fmt::Display for ExtractMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Document => f.write_str("document"),
            Self::Pages => f.write_str("pages"),
        }
    }
}

/// `[extract]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractConfig {
    #[serde(default)]
    pub mode: ExtractMode,
}

/// `[merge]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Fail instead of warn when merged vectors differ in length.
    #[serde(default)]
    pub require_consistent_dimensions: bool,

    /// Write an empty array when every input is empty.
    #[serde(default)]
    pub allow_empty: bool,
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Number of hits returned.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    5
}

impl AppConfig {
    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.embedding.model.trim().is_empty() {
            return Err(PdfKbError::config("embedding.model must not be empty"));
        }
        if self.embedding.batch_size == 0 {
            return Err(PdfKbError::config("embedding.batch_size must be at least 1"));
        }
        if self.embedding.lite_precision > 15 {
            return Err(PdfKbError::config(
                "embedding.lite_precision must be between 0 and 15",
            ));
        }
        if self.segment.min_word_len == 0 {
            return Err(PdfKbError::config("segment.min_word_len must be at least 1"));
        }
        if self.search.top_k == 0 {
            return Err(PdfKbError::config("search.top_k must be at least 1"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.pdfkb/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| PdfKbError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.pdfkb/pdfkb.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| PdfKbError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content)
        .map_err(|e| PdfKbError::config(format!("failed to parse {}: {e}", path.display())))?;
    config.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| PdfKbError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| PdfKbError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| PdfKbError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
