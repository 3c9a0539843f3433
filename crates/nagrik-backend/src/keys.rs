//! Shared storage path derivation.
//!
//! Path format: `{document_type}/{uuid}.{ext}`, where `ext` is the
//! original file extension lowercased. Every derivation produces a fresh
//! path, so a retry never overwrites an earlier attempt.

use std::path::Path;
use uuid::Uuid;

const MAX_EXTENSION_LEN: usize = 10;

/// Derive a collision-resistant storage path for a document upload.
///
/// The caller is expected to have validated `document_type` (see
/// `nagrik_core::validation::validate_document_type`). The original file
/// name only contributes its extension; the rest is replaced by a random
/// suffix.
pub fn document_storage_path(document_type: &str, original_filename: &str) -> String {
    match file_extension(original_filename) {
        Some(ext) => format!("{}/{}.{}", document_type, Uuid::new_v4(), ext),
        None => format!("{}/{}", document_type, Uuid::new_v4()),
    }
}

fn file_extension(filename: &str) -> Option<String> {
    let ext: String = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())?
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(MAX_EXTENSION_LEN)
        .collect::<String>()
        .to_lowercase();
    if ext.is_empty() {
        None
    } else {
        Some(ext)
    }
}
