//! Merge several knowledge bases into one.
//!
//! Records are concatenated in input order. Ids are neither checked for
//! collisions nor renumbered, and vectors are never recomputed.

use std::path::{Path, PathBuf};

use tracing::{info, instrument, warn};

use pdfkb_shared::{KnowledgeBase, MergeConfig, PdfKbError, Result};

/// Merge behavior switches.
#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    /// Fail on the first record whose vector length differs from the first
    /// record's, instead of only warning.
    pub require_consistent_dimensions: bool,
    /// Accept a merge whose inputs are all empty.
    pub allow_empty: bool,
}

impl From<&MergeConfig> for MergeOptions {
    fn from(config: &MergeConfig) -> Self {
        Self {
            require_consistent_dimensions: config.require_consistent_dimensions,
            allow_empty: config.allow_empty,
        }
    }
}

/// Summary of a file merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSummary {
    /// Number of input files combined.
    pub inputs: usize,
    /// Total records written.
    pub records: usize,
    /// Where the merged file went.
    pub output: PathBuf,
}

/// Concatenate `kbs` in order.
pub fn merge(kbs: Vec<KnowledgeBase>, options: &MergeOptions) -> Result<KnowledgeBase> {
    if kbs.is_empty() {
        return Err(PdfKbError::EmptyMergeInput);
    }

    let total = kbs.iter().map(KnowledgeBase::len).sum();
    let mut merged = KnowledgeBase {
        records: Vec::with_capacity(total),
    };
    for kb in kbs {
        merged.records.extend(kb);
    }

    if merged.is_empty() && !options.allow_empty {
        return Err(PdfKbError::EmptyMergeInput);
    }

    check_dimensions(&merged, options.require_consistent_dimensions)?;
    Ok(merged)
}

/// Read every file in `paths` and merge them.
#[instrument(skip_all, fields(inputs = paths.len()))]
pub fn merge_files(paths: &[PathBuf], options: &MergeOptions) -> Result<KnowledgeBase> {
    if paths.is_empty() {
        return Err(PdfKbError::EmptyMergeInput);
    }

    let mut kbs = Vec::with_capacity(paths.len());
    for path in paths {
        let kb = pdfkb_storage::read_kb(path)?;
        info!(file = %path.display(), records = kb.len(), "merging");
        kbs.push(kb);
    }

    merge(kbs, options)
}

/// Merge `paths` and write the result to `output`.
pub fn merge_to_file(
    paths: &[PathBuf],
    output: &Path,
    options: &MergeOptions,
) -> Result<MergeSummary> {
    let merged = merge_files(paths, options)?;
    pdfkb_storage::write_kb(output, &merged)?;

    info!(
        inputs = paths.len(),
        records = merged.len(),
        output = %output.display(),
        "combined knowledge bases"
    );

    Ok(MergeSummary {
        inputs: paths.len(),
        records: merged.len(),
        output: output.to_path_buf(),
    })
}

fn check_dimensions(kb: &KnowledgeBase, strict: bool) -> Result<()> {
    let Some(expected) = kb.records.first().map(|r| r.dimensions()) else {
        return Ok(());
    };

    let mut mismatched = 0;
    for record in kb.iter().filter(|r| r.dimensions() != expected) {
        if strict {
            return Err(PdfKbError::DimensionMismatch {
                id: record.id.clone(),
                expected,
                found: record.dimensions(),
            });
        }
        mismatched += 1;
    }

    if mismatched > 0 {
        warn!(
            expected,
            mismatched, "merged records have inconsistent vector dimensions"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdfkb_shared::KbRecord;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pdfkb-merge-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn kb(label: &str, count: usize, dims: usize) -> KnowledgeBase {
        (0..count)
            .map(|i| KbRecord {
                id: format!("{label}_{i}"),
                text: format!("{label} fragment {i}"),
                vector: vec![1.0 / (dims as f64).sqrt(); dims],
            })
            .collect::<Vec<_>>()
            .into()
    }

    #[test]
    fn merge_concatenates_in_order() {
        let a = kb("a.pdf", 2, 3);
        let b = kb("b.pdf", 3, 3);

        let merged = merge(vec![a.clone(), b.clone()], &MergeOptions::default()).unwrap();

        let mut expected = a.records;
        expected.extend(b.records);
        assert_eq!(merged.records, expected);
    }

    #[test]
    fn merge_keeps_duplicate_ids() {
        let a = kb("same.pdf", 2, 3);
        let merged = merge(vec![a.clone(), a], &MergeOptions::default()).unwrap();
        let ids: Vec<_> = merged.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["same.pdf_0", "same.pdf_1", "same.pdf_0", "same.pdf_1"]);
    }

    #[test]
    fn merge_without_inputs_fails() {
        let err = merge(Vec::new(), &MergeOptions::default()).unwrap_err();
        assert!(matches!(err, PdfKbError::EmptyMergeInput));
    }

    #[test]
    fn merge_of_empty_inputs_needs_opt_in() {
        let empties = || vec![KnowledgeBase::new(), KnowledgeBase::new()];

        let err = merge(empties(), &MergeOptions::default()).unwrap_err();
        assert!(matches!(err, PdfKbError::EmptyMergeInput));

        let options = MergeOptions {
            allow_empty: true,
            ..MergeOptions::default()
        };
        assert!(merge(empties(), &options).unwrap().is_empty());
    }

    #[test]
    fn empty_inputs_alongside_others_are_fine() {
        let merged = merge(
            vec![KnowledgeBase::new(), kb("x.pdf", 1, 2)],
            &MergeOptions::default(),
        )
        .unwrap();
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn mixed_dimensions_pass_by_default() {
        let merged = merge(
            vec![kb("a.pdf", 1, 3), kb("b.pdf", 1, 5)],
            &MergeOptions::default(),
        )
        .unwrap();
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn mixed_dimensions_fail_when_strict() {
        let options = MergeOptions {
            require_consistent_dimensions: true,
            ..MergeOptions::default()
        };
        let err = merge(vec![kb("a.pdf", 1, 3), kb("b.pdf", 1, 5)], &options).unwrap_err();
        match err {
            PdfKbError::DimensionMismatch {
                id,
                expected,
                found,
            } => {
                assert_eq!(id, "b.pdf_0");
                assert_eq!(expected, 3);
                assert_eq!(found, 5);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn merge_to_file_roundtrip() {
        let tmp = temp_dir();
        let a = kb("a.pdf", 2, 4);
        let b = kb("b.pdf", 1, 4);
        let pa = tmp.join("a.json");
        let pb = tmp.join("b.json");
        pdfkb_storage::write_kb(&pa, &a).unwrap();
        pdfkb_storage::write_kb(&pb, &b).unwrap();

        let out = tmp.join("combo_kb.json");
        let summary = merge_to_file(&[pa, pb], &out, &MergeOptions::default()).unwrap();
        assert_eq!(summary.inputs, 2);
        assert_eq!(summary.records, 3);

        let read = pdfkb_storage::read_kb(&out).unwrap();
        let mut expected = a.records;
        expected.extend(b.records);
        assert_eq!(read.records, expected);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn merge_files_reads_utf16_input() {
        let tmp = temp_dir();
        let a = kb("a.pdf", 1, 2);
        let json = serde_json::to_string(&a).unwrap();
        let mut bytes = vec![0xFF, 0xFE];
        for unit in json.encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let path = tmp.join("utf16.json");
        std::fs::write(&path, bytes).unwrap();

        let merged = merge_files(&[path], &MergeOptions::default()).unwrap();
        assert_eq!(merged, a);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn merge_files_stops_on_undecodable_input() {
        let tmp = temp_dir();
        let good = tmp.join("good.json");
        pdfkb_storage::write_kb(&good, &kb("a.pdf", 1, 2)).unwrap();
        let bad = tmp.join("bad.json");
        std::fs::write(&bad, [0xC3, 0x28, 0xFF]).unwrap();
        let out = tmp.join("out.json");

        let err = merge_to_file(&[good, bad], &out, &MergeOptions::default()).unwrap_err();
        assert!(matches!(err, PdfKbError::Encoding { .. }));
        assert!(!out.exists());

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
