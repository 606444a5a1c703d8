//! Local document corpus searched by the embedding researcher.
//!
//! Documents are plain `.txt` / `.md` files in one directory. Each file is
//! split into paragraph passages; very short paragraphs (headings, stray
//! lines) are dropped.

use std::path::{Path, PathBuf};

use deepresearch_core::ResearchError;
use tracing::{debug, warn};

/// Passages shorter than this (in characters) are ignored.
pub const MIN_PASSAGE_CHARS: usize = 40;

/// Longer passages are cut at a char boundary below this length.
pub const MAX_PASSAGE_CHARS: usize = 1_000;

/// One searchable paragraph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Passage {
    /// File name the passage came from
    pub source: String,
    pub content: String,
}

/// Load every passage from the documents in `dir`.
///
/// A missing directory yields an empty corpus; unreadable files are skipped
/// with a warning.
pub fn load_corpus(dir: &Path) -> Result<Vec<Passage>, ResearchError> {
    let mut passages = Vec::new();
    for path in document_paths(dir)? {
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        match std::fs::read_to_string(&path) {
            Ok(text) => {
                let before = passages.len();
                passages.extend(split_passages(&text).into_iter().map(|content| Passage {
                    source: source.clone(),
                    content,
                }));
                debug!(source = %source, passages = passages.len() - before, "Indexed document");
            }
            Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable document"),
        }
    }
    Ok(passages)
}

/// Sorted list of `.txt` / `.md` files directly inside `dir`.
pub fn document_paths(dir: &Path) -> Result<Vec<PathBuf>, ResearchError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_document(p))
        .collect();
    paths.sort();
    Ok(paths)
}

fn is_document(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("txt") | Some("md")
    )
}

/// Split text on blank lines into normalized passages.
pub fn split_passages(text: &str) -> Vec<String> {
    text.split("\n\n")
        .map(|para| para.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|para| para.chars().count() >= MIN_PASSAGE_CHARS)
        .map(|para| truncate_chars(para, MAX_PASSAGE_CHARS))
        .collect()
}

fn truncate_chars(mut s: String, max: usize) -> String {
    if let Some((idx, _)) = s.char_indices().nth(max) {
        s.truncate(idx);
    }
    s
}
