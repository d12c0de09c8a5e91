//! Recursive text chunker.
//!
//! Splits text on the coarsest separator that occurs in it (paragraph, line,
//! sentence, word, then single characters), recursing into pieces that are
//! still too long, and greedily merges small pieces back into windows of at
//! most `chunk_size` characters. Consecutive windows share up to
//! `chunk_overlap` characters of trailing context.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::loader::ExtractedDocument;
use crate::core::config::defaults::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use crate::core::errors::ApiError;

/// Tried in order; the empty separator splits into characters.
const SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

/// Configuration for the chunker. Sizes are in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters
    pub chunk_size: usize,
    /// Overlap between consecutive chunks
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// A bounded segment of a document with its source metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    /// File name the chunk came from.
    pub source: String,
    /// 1-based page number, for paged sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<usize>,
    /// Position of the chunk within its source document.
    pub sequence_index: usize,
}

pub struct TextChunker {
    config: ChunkingConfig,
}

impl TextChunker {
    pub fn new(config: ChunkingConfig) -> Result<Self, ApiError> {
        if config.chunk_size == 0 {
            return Err(ApiError::BadRequest(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if config.chunk_overlap >= config.chunk_size {
            return Err(ApiError::BadRequest(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }
        Ok(Self { config })
    }

    /// Splits one logical unit of text. Surrounding whitespace does not count
    /// toward the chunk size. Blank input yields no chunks.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let text = text.trim();
        if text.is_empty() {
            return Vec::new();
        }
        self.split_recursive(text, &SEPARATORS)
    }

    /// Chunks every unit of an extracted document, numbering chunks across
    /// units in page order.
    pub fn chunk_document(&self, document: &ExtractedDocument) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for unit in &document.units {
            for text in self.split_text(&unit.text) {
                chunks.push(Chunk {
                    text,
                    source: document.source.clone(),
                    page: unit.page,
                    total_pages: document.total_pages,
                    sequence_index: chunks.len(),
                });
            }
        }
        chunks
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut final_chunks = Vec::new();
        let (separator, remaining) = pick_separator(text, separators);

        let mut good_splits: Vec<&str> = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.config.chunk_size {
                good_splits.push(piece);
                continue;
            }

            if !good_splits.is_empty() {
                final_chunks.extend(self.merge_splits(&good_splits));
                good_splits.clear();
            }

            if remaining.is_empty() {
                let trimmed = piece.trim();
                if !trimmed.is_empty() {
                    final_chunks.push(trimmed.to_string());
                }
            } else {
                final_chunks.extend(self.split_recursive(piece, remaining));
            }
        }

        if !good_splits.is_empty() {
            final_chunks.extend(self.merge_splits(&good_splits));
        }

        final_chunks
    }

    /// Greedy window merge. When a window is flushed, pieces are dropped from
    /// its front until at most `chunk_overlap` characters remain and the next
    /// piece fits.
    fn merge_splits(&self, splits: &[&str]) -> Vec<String> {
        let chunk_size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;

        let mut docs = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in splits {
            let len = char_len(piece);

            if total + len > chunk_size && !current.is_empty() {
                push_joined(&mut docs, &current);

                while total > overlap || (total + len > chunk_size && total > 0) {
                    let Some(front) = current.pop_front() else {
                        break;
                    };
                    total -= char_len(front);
                }
            }

            current.push_back(piece);
            total += len;
        }

        push_joined(&mut docs, &current);
        docs
    }
}

/// Chunks a single logical unit of text under the given settings.
pub fn split(
    document_text: &str,
    source_id: &str,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>, ApiError> {
    let chunker = TextChunker::new(ChunkingConfig {
        chunk_size,
        chunk_overlap: overlap,
    })?;

    Ok(chunker
        .split_text(document_text)
        .into_iter()
        .enumerate()
        .map(|(sequence_index, text)| Chunk {
            text,
            source: source_id.to_string(),
            page: None,
            total_pages: None,
            sequence_index,
        })
        .collect())
}

fn pick_separator<'a>(text: &str, separators: &'a [&'a str]) -> (&'a str, &'a [&'a str]) {
    for (i, separator) in separators.iter().enumerate() {
        if separator.is_empty() {
            return ("", &[]);
        }
        if text.contains(separator) {
            return (separator, &separators[i + 1..]);
        }
    }
    ("", &[])
}

/// Splits after every occurrence of `separator`, so each piece keeps the
/// separator that terminated it. An empty separator yields single characters.
fn split_keeping_separator<'t>(text: &'t str, separator: &str) -> Vec<&'t str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (index, matched) in text.match_indices(separator) {
        let end = index + matched.len();
        pieces.push(&text[start..end]);
        start = end;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces.retain(|piece| !piece.is_empty());
    pieces
}

fn push_joined(docs: &mut Vec<String>, pieces: &VecDeque<&str>) {
    let joined: String = pieces.iter().copied().collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        docs.push(trimmed.to_string());
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
