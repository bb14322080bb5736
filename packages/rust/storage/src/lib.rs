//! Knowledge-base file storage.
//!
//! A knowledge base on disk is a bare JSON array of `{id, text, vector}`
//! objects. Files are always written as UTF-8; reading also accepts UTF-16
//! since some tools re-save JSON in that encoding.

use std::path::Path;

use tracing::{debug, info, instrument, warn};

use pdfkb_shared::{KnowledgeBase, PdfKbError, Result};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const UTF16_LE_BOM: &[u8] = &[0xFF, 0xFE];
const UTF16_BE_BOM: &[u8] = &[0xFE, 0xFF];

/// Text encodings a knowledge-base file may arrive in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    Utf16Le,
    Utf16Be,
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Serialize `kb` to `path` as compact UTF-8 JSON.
///
/// The file is written next to its destination under a temporary name and
/// renamed into place, so a failed write never leaves a truncated artifact.
#[instrument(skip_all, fields(path = %path.display(), records = kb.len()))]
pub fn write_kb(path: &Path, kb: &KnowledgeBase) -> Result<()> {
    let json = serde_json::to_vec(kb)
        .map_err(|e| PdfKbError::validation(format!("JSON serialization failed: {e}")))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| PdfKbError::io(parent, e))?;
    }

    let file_name = path
        .file_name()
        .ok_or_else(|| PdfKbError::validation(format!("{} is not a file path", path.display())))?;
    let temp = path.with_file_name(format!(".{}.tmp", file_name.to_string_lossy()));

    std::fs::write(&temp, &json).map_err(|e| PdfKbError::io(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| PdfKbError::io(path, e))?;

    info!(bytes = json.len(), "wrote knowledge base");
    Ok(())
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Read a knowledge-base file, falling back to UTF-16 when it is not UTF-8.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn read_kb(path: &Path) -> Result<KnowledgeBase> {
    let bytes = std::fs::read(path).map_err(|e| PdfKbError::io(path, e))?;

    let (text, encoding) =
        decode_text(&bytes).ok_or_else(|| PdfKbError::Encoding { path: path.into() })?;
    if encoding != Encoding::Utf8 {
        warn!(?encoding, "knowledge base is not UTF-8, decoded with fallback");
    }

    let kb: KnowledgeBase = serde_json::from_str(&text).map_err(|e| {
        PdfKbError::validation(format!("invalid knowledge base {}: {e}", path.display()))
    })?;

    debug!(records = kb.len(), "read knowledge base");
    Ok(kb)
}

/// Decode file bytes as UTF-8, or as UTF-16 if that fails.
///
/// UTF-16 endianness comes from the byte-order mark, little-endian when there
/// is none. Text holding NUL characters is not accepted as UTF-8: JSON cannot
/// contain them raw, but BOM-less UTF-16 of ASCII text is full of them.
pub fn decode_text(bytes: &[u8]) -> Option<(String, Encoding)> {
    let utf8 = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    if let Ok(text) = std::str::from_utf8(utf8) {
        if !text.contains('\0') {
            return Some((text.to_string(), Encoding::Utf8));
        }
    }

    decode_utf16(bytes)
}

fn decode_utf16(bytes: &[u8]) -> Option<(String, Encoding)> {
    let (body, encoding) = if let Some(rest) = bytes.strip_prefix(UTF16_LE_BOM) {
        (rest, Encoding::Utf16Le)
    } else if let Some(rest) = bytes.strip_prefix(UTF16_BE_BOM) {
        (rest, Encoding::Utf16Be)
    } else {
        (bytes, Encoding::Utf16Le)
    };

    if body.len() % 2 != 0 {
        return None;
    }

    let units: Vec<u16> = body
        .chunks_exact(2)
        .map(|pair| match encoding {
            Encoding::Utf16Be => u16::from_be_bytes([pair[0], pair[1]]),
            _ => u16::from_le_bytes([pair[0], pair[1]]),
        })
        .collect();

    String::from_utf16(&units).ok().map(|text| (text, encoding))
}
