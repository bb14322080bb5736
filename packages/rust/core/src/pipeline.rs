//! Knowledge-base build: raw text → sanitize → segment → embed → records.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use pdfkb_embed::Embedder;
use pdfkb_extract::{TextExtractor, document_label};
use pdfkb_shared::{
    AppConfig, ExtractMode, Fragment, KbRecord, KnowledgeBase, RawText, Result, SegmentConfig,
};
use pdfkb_text::{sanitize, split_fragments};

/// Settings for turning raw text into records.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Fragment quality gates.
    pub segment: SegmentConfig,
    /// Fragments per embedding call.
    pub batch_size: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for BuildConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            segment: config.segment.clone(),
            batch_size: config.embedding.batch_size,
        }
    }
}

/// Why a document produced no records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyReason {
    /// Nothing alphanumeric survived sanitization.
    NoText,
    /// Text survived, but no fragment passed the quality gates.
    NoFragments,
}

impl std::fmt::Display for EmptyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoText => f.write_str("no text left after cleanup"),
            Self::NoFragments => f.write_str("no fragment passed the quality gates"),
        }
    }
}

/// Result of building one document.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildOutcome {
    Built(KnowledgeBase),
    NoUsableContent(EmptyReason),
}

/// Progress callback for reporting build status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each embedding batch with cumulative counts.
    fn fragments_embedded(&self, done: usize, total: usize);
    /// Called when a document finishes with records.
    fn done(&self, records: usize);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn fragments_embedded(&self, _done: usize, _total: usize) {}
    fn done(&self, _records: usize) {}
}

// ---------------------------------------------------------------------------
// Fragment collection
// ---------------------------------------------------------------------------

/// Sanitize and segment `source`, numbering fragments over the whole document.
///
/// In page mode each page is cleaned and split on its own and pages without
/// fragments are skipped; ordinals still run continuously across pages.
pub fn collect_fragments(
    source: &RawText,
    config: &SegmentConfig,
) -> std::result::Result<Vec<Fragment>, EmptyReason> {
    let pages: &[String] = match source {
        RawText::Whole(text) => std::slice::from_ref(text),
        RawText::Pages(pages) => pages,
    };

    let mut texts = Vec::new();
    let mut any_text = false;
    let mut rejected = 0;

    for (page, raw) in pages.iter().enumerate() {
        let clean = sanitize(raw);
        if clean.is_empty() {
            debug!(page, "page has no usable text, skipping");
            continue;
        }
        any_text = true;

        let segments = split_fragments(&clean, config);
        rejected += segments.rejected;
        if segments.fragments.is_empty() {
            debug!(page, "page produced no fragments, skipping");
        }
        texts.extend(segments.fragments);
    }

    if !any_text {
        return Err(EmptyReason::NoText);
    }

    info!(fragments = texts.len(), rejected, "filtered out noise fragments");

    if texts.is_empty() {
        return Err(EmptyReason::NoFragments);
    }

    Ok(texts
        .into_iter()
        .enumerate()
        .map(|(source_ordinal, text)| Fragment {
            text,
            source_ordinal,
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Build
// ---------------------------------------------------------------------------

/// Build a knowledge base from one document's raw text.
///
/// An empty result is reported as [`BuildOutcome::NoUsableContent`], never as
/// an error. Errors come only from the embedding model.
#[instrument(skip_all, fields(document = %label, pages = source.page_count()))]
pub fn build(
    source: RawText,
    label: &str,
    embedder: &Embedder,
    config: &BuildConfig,
    progress: &dyn ProgressReporter,
) -> Result<BuildOutcome> {
    progress.phase("Cleaning and segmenting text");
    let fragments = match collect_fragments(&source, &config.segment) {
        Ok(fragments) => fragments,
        Err(reason) => {
            warn!(%reason, "no usable content");
            return Ok(BuildOutcome::NoUsableContent(reason));
        }
    };
    drop(source);

    progress.phase("Embedding fragments");
    let total = fragments.len();
    let batch_size = config.batch_size.max(1);
    info!(total, batch_size, model = %embedder.model_name(), "starting embedding");

    let mut kb = KnowledgeBase::new();
    for batch in fragments.chunks(batch_size) {
        let texts: Vec<&str> = batch.iter().map(|f| f.text.as_str()).collect();
        let vectors = embedder.embed_batch(&texts)?;

        for (fragment, vector) in batch.iter().zip(vectors) {
            kb.push(KbRecord::from_fragment(label, fragment.clone(), vector));
        }
        progress.fragments_embedded(kb.len(), total);
    }

    progress.done(kb.len());
    info!(records = kb.len(), "knowledge base built");

    Ok(BuildOutcome::Built(kb))
}

// ---------------------------------------------------------------------------
// PDF → file
// ---------------------------------------------------------------------------

/// Configuration for building one PDF into a knowledge-base file.
#[derive(Debug, Clone)]
pub struct BuildFileConfig {
    /// PDF to read.
    pub pdf_path: PathBuf,
    /// Where the JSON artifact goes.
    pub output_path: PathBuf,
    /// Whole-document or per-page extraction.
    pub mode: ExtractMode,
    /// Segmentation and batching settings.
    pub build: BuildConfig,
}

/// What happened to one PDF.
#[derive(Debug)]
pub enum FileOutcome {
    /// An artifact was written.
    Written {
        path: PathBuf,
        records: usize,
        elapsed: Duration,
    },
    /// Nothing usable was found; no file was written.
    NoUsableContent(EmptyReason),
}

/// Extract, build, and write a single PDF.
///
/// Extraction failures are returned as errors; the caller decides whether to
/// move on to the next document.
#[instrument(skip_all, fields(pdf = %config.pdf_path.display(), mode = %config.mode))]
pub fn build_file(
    config: &BuildFileConfig,
    extractor: &dyn TextExtractor,
    embedder: &Embedder,
    progress: &dyn ProgressReporter,
) -> Result<FileOutcome> {
    let start = Instant::now();
    let label = document_label(&config.pdf_path);

    info!(%label, "reading document");
    progress.phase("Extracting text");
    let raw = extractor.extract(&config.pdf_path, config.mode)?;

    let kb = match build(raw, &label, embedder, &config.build, progress)? {
        BuildOutcome::Built(kb) => kb,
        BuildOutcome::NoUsableContent(reason) => return Ok(FileOutcome::NoUsableContent(reason)),
    };

    progress.phase("Writing knowledge base");
    pdfkb_storage::write_kb(&config.output_path, &kb)?;

    Ok(FileOutcome::Written {
        path: config.output_path.clone(),
        records: kb.len(),
        elapsed: start.elapsed(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Mutex;

    use pdfkb_embed::{EmbeddingModel, l2_norm};
    use pdfkb_shared::PdfKbError;

    /// Letter histogram plus length; deterministic and never zero.
    struct LetterModel;

    impl EmbeddingModel for LetterModel {
        fn name(&self) -> &str {
            "letters"
        }

        fn embed_texts(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let mut v = vec![0.0f32; 27];
                    for b in t.bytes().filter(u8::is_ascii_alphabetic) {
                        v[(b.to_ascii_lowercase() - b'a') as usize] += 1.0;
                    }
                    v[26] = t.len() as f32;
                    v
                })
                .collect())
        }
    }

    struct FailingModel;

    impl EmbeddingModel for FailingModel {
        fn name(&self) -> &str {
            "failing"
        }

        fn embed_texts(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>> {
            Err(PdfKbError::Embedding("inference failed".into()))
        }
    }

    struct FixedExtractor(RawText);

    impl TextExtractor for FixedExtractor {
        fn extract_text(&self, path: &Path) -> Result<String> {
            match &self.0 {
                RawText::Whole(text) => Ok(text.clone()),
                RawText::Pages(_) => Err(PdfKbError::extraction(path, "pages only")),
            }
        }

        fn extract_pages(&self, path: &Path) -> Result<Vec<String>> {
            match &self.0 {
                RawText::Pages(pages) => Ok(pages.clone()),
                RawText::Whole(_) => Err(PdfKbError::extraction(path, "whole only")),
            }
        }
    }

    #[derive(Default)]
    struct RecordingProgress {
        embedded: Mutex<Vec<(usize, usize)>>,
    }

    impl ProgressReporter for RecordingProgress {
        fn phase(&self, _name: &str) {}
        fn fragments_embedded(&self, done: usize, total: usize) {
            self.embedded.lock().unwrap().push((done, total));
        }
        fn done(&self, _records: usize) {}
    }

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pdfkb-pipeline-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn embedder() -> Embedder {
        Embedder::new(LetterModel)
    }

    fn sentence(n: usize) -> String {
        format!("Sentence number {n} talks about a topic at considerable length.")
    }

    const SCENARIO: &str = "Figure 1. The cat sat on the mat. It was warm and the sun- light \
                            filled the room with a gentle glow today.";

    #[test]
    fn scenario_builds_single_record() {
        let outcome = build(
            RawText::Whole(SCENARIO.into()),
            "doc",
            &embedder(),
            &BuildConfig::default(),
            &SilentProgress,
        )
        .unwrap();

        let BuildOutcome::Built(kb) = outcome else {
            panic!("expected records");
        };
        assert_eq!(kb.len(), 1);
        assert_eq!(kb.records[0].id, "doc_0");
        assert_eq!(
            kb.records[0].text,
            "It was warm and the sunlight filled the room with a gentle glow today."
        );
    }

    #[test]
    fn table_separators_yield_no_text() {
        let outcome = build(
            RawText::Whole("---- ---- ----\n----".into()),
            "doc",
            &embedder(),
            &BuildConfig::default(),
            &SilentProgress,
        )
        .unwrap();
        assert_eq!(outcome, BuildOutcome::NoUsableContent(EmptyReason::NoText));
    }

    #[test]
    fn short_sentences_yield_no_fragments() {
        let outcome = build(
            RawText::Whole("Too short. Also short. Nope.".into()),
            "doc",
            &embedder(),
            &BuildConfig::default(),
            &SilentProgress,
        )
        .unwrap();
        assert_eq!(outcome, BuildOutcome::NoUsableContent(EmptyReason::NoFragments));
    }

    #[test]
    fn ordinals_are_contiguous_in_source_order() {
        let text = (0..7).map(sentence).collect::<Vec<_>>().join(" ");
        let config = BuildConfig {
            batch_size: 3,
            ..BuildConfig::default()
        };
        let BuildOutcome::Built(kb) =
            build(RawText::Whole(text), "book.pdf", &embedder(), &config, &SilentProgress).unwrap()
        else {
            panic!("expected records");
        };

        assert_eq!(kb.len(), 7);
        for (i, record) in kb.iter().enumerate() {
            assert_eq!(record.id, format!("book.pdf_{i}"));
            assert_eq!(record.text, sentence(i));
        }
    }

    #[test]
    fn page_mode_numbers_across_pages_and_skips_empty_pages() {
        let pages = vec![
            format!("{} {}", sentence(0), sentence(1)),
            "| | | ---- ....".to_string(),
            "Short.".to_string(),
            sentence(2),
        ];
        let fragments =
            collect_fragments(&RawText::Pages(pages), &SegmentConfig::default()).unwrap();

        let ordinals: Vec<_> = fragments.iter().map(|f| f.source_ordinal).collect();
        assert_eq!(ordinals, vec![0, 1, 2]);
        assert_eq!(fragments[2].text, sentence(2));
    }

    #[test]
    fn page_mode_with_only_noise_pages_is_no_text() {
        let pages = vec!["----".to_string(), "  ".to_string()];
        let err = collect_fragments(&RawText::Pages(pages), &SegmentConfig::default()).unwrap_err();
        assert_eq!(err, EmptyReason::NoText);
    }

    #[test]
    fn page_mode_does_not_join_sentences_across_pages() {
        // Each half alone is too short; together they would pass.
        let pages = vec![
            "The paragraph starts on one page and".to_string(),
            "finishes on the next page of the book.".to_string(),
        ];
        let whole = RawText::Whole(pages.join(" "));
        assert!(collect_fragments(&whole, &SegmentConfig::default()).is_ok());
        assert_eq!(
            collect_fragments(&RawText::Pages(pages), &SegmentConfig::default()).unwrap_err(),
            EmptyReason::NoFragments
        );
    }

    #[test]
    fn vectors_are_unit_length() {
        let text = (0..4).map(sentence).collect::<Vec<_>>().join(" ");
        let BuildOutcome::Built(kb) = build(
            RawText::Whole(text),
            "doc",
            &embedder(),
            &BuildConfig::default(),
            &SilentProgress,
        )
        .unwrap() else {
            panic!("expected records");
        };

        for record in kb.iter() {
            assert!((l2_norm(&record.vector) - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn batching_does_not_change_results() {
        let text = (0..5).map(sentence).collect::<Vec<_>>().join(" ");
        let run = |batch_size| {
            let config = BuildConfig {
                batch_size,
                ..BuildConfig::default()
            };
            build(
                RawText::Whole(text.clone()),
                "doc",
                &embedder(),
                &config,
                &SilentProgress,
            )
            .unwrap()
        };
        assert_eq!(run(1), run(2));
        assert_eq!(run(2), run(100));
    }

    #[test]
    fn progress_reports_cumulative_counts() {
        let text = (0..5).map(sentence).collect::<Vec<_>>().join(" ");
        let progress = RecordingProgress::default();
        let config = BuildConfig {
            batch_size: 2,
            ..BuildConfig::default()
        };
        build(RawText::Whole(text), "doc", &embedder(), &config, &progress).unwrap();

        assert_eq!(
            *progress.embedded.lock().unwrap(),
            vec![(2, 5), (4, 5), (5, 5)]
        );
    }

    #[test]
    fn embedding_failure_is_an_error() {
        let err = build(
            RawText::Whole(sentence(0)),
            "doc",
            &Embedder::new(FailingModel),
            &BuildConfig::default(),
            &SilentProgress,
        )
        .unwrap_err();
        assert!(matches!(err, PdfKbError::Embedding(_)));
    }

    #[test]
    fn build_file_writes_artifact() {
        let tmp = temp_dir();
        let config = BuildFileConfig {
            pdf_path: tmp.join("paper.pdf"),
            output_path: tmp.join("out/paper_kb.json"),
            mode: ExtractMode::Document,
            build: BuildConfig::default(),
        };
        let extractor = FixedExtractor(RawText::Whole(SCENARIO.into()));

        let outcome = build_file(&config, &extractor, &embedder(), &SilentProgress).unwrap();
        let FileOutcome::Written { path, records, .. } = outcome else {
            panic!("expected a written file");
        };
        assert_eq!(records, 1);

        let kb = pdfkb_storage::read_kb(&path).unwrap();
        assert_eq!(kb.records[0].id, "paper.pdf_0");

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn build_file_writes_nothing_without_content() {
        let tmp = temp_dir();
        let config = BuildFileConfig {
            pdf_path: tmp.join("scan.pdf"),
            output_path: tmp.join("scan_kb.json"),
            mode: ExtractMode::Pages,
            build: BuildConfig::default(),
        };
        let extractor = FixedExtractor(RawText::Pages(vec!["----".into(), "----".into()]));

        let outcome = build_file(&config, &extractor, &embedder(), &SilentProgress).unwrap();
        assert!(matches!(outcome, FileOutcome::NoUsableContent(EmptyReason::NoText)));
        assert!(!config.output_path.exists());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn build_file_propagates_extraction_errors() {
        let tmp = temp_dir();
        let config = BuildFileConfig {
            pdf_path: tmp.join("broken.pdf"),
            output_path: tmp.join("broken_kb.json"),
            mode: ExtractMode::Document,
            build: BuildConfig::default(),
        };
        let extractor = FixedExtractor(RawText::Pages(vec![]));

        let err = build_file(&config, &extractor, &embedder(), &SilentProgress).unwrap_err();
        assert!(matches!(err, PdfKbError::Extraction { .. }));
        assert!(!config.output_path.exists());

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
