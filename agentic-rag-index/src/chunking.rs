//! Text chunking strategies.
//!
//! This module provides the [`Chunker`] trait and two implementations:
//!
//! - [`RecursiveChunker`] splits on paragraph, line and word boundaries, then characters
//! - [`FixedSizeChunker`] slides a fixed character window with configurable overlap
//!
//! All sizes are measured in `char`s, so multi-byte text never splits inside a code point.

use std::collections::VecDeque;

use crate::config::{ChunkingStrategy, RagConfig};

/// A strategy for splitting text into bounded, overlapping segments.
///
/// Implementations are deterministic: the same text and configuration always
/// produce the same chunks. Empty or whitespace-only text yields no chunks.
pub trait Chunker: Send + Sync {
    /// Split `text` into ordered chunks.
    fn chunk(&self, text: &str) -> Vec<String>;
}

/// Build the chunker selected by `config.chunking`.
pub fn chunker_for(config: &RagConfig) -> Box<dyn Chunker> {
    match config.chunking {
        ChunkingStrategy::Recursive => {
            Box::new(RecursiveChunker::new(config.chunk_size, config.chunk_overlap))
        }
        ChunkingStrategy::Fixed => {
            Box::new(FixedSizeChunker::new(config.chunk_size, config.chunk_overlap))
        }
    }
}

/// Splits text into fixed-size chunks by character count with configurable overlap.
///
/// # Example
///
/// ```rust,ignore
/// use agentic_rag_index::FixedSizeChunker;
///
/// let chunker = FixedSizeChunker::new(256, 50);
/// let chunks = chunker.chunk(&text);
/// ```
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size`: maximum number of characters per chunk
    /// * `chunk_overlap`: number of overlapping characters between consecutive chunks
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size: chunk_size.max(1), chunk_overlap }
    }
}

impl Chunker for FixedSizeChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.trim().chars().collect();
        if chars.is_empty() {
            return Vec::new();
        }

        let step = self.chunk_size.saturating_sub(self.chunk_overlap).max(1);
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < chars.len() {
            let end = (start + self.chunk_size).min(chars.len());
            let piece: String = chars[start..end].iter().collect();
            let piece = piece.trim();
            if !piece.is_empty() {
                chunks.push(piece.to_string());
            }
            if end == chars.len() {
                break;
            }
            start += step;
        }

        chunks
    }
}

/// Separators tried in order by [`RecursiveChunker`]. The empty separator
/// splits into single characters and always applies.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Splits text hierarchically: paragraphs, lines, words, then characters.
///
/// The first separator present in the text is used to split it. Pieces shorter
/// than `chunk_size` are greedily merged back together (joined with that
/// separator); when the next piece would overflow the chunk, the chunk is
/// emitted and pieces are dropped from its front until at most
/// `chunk_overlap` characters remain, which then start the next chunk.
/// Pieces that are too long on their own are split again with the remaining
/// separators. Chunks are trimmed and empty chunks dropped.
///
/// # Example
///
/// ```rust,ignore
/// use agentic_rag_index::RecursiveChunker;
///
/// let chunker = RecursiveChunker::new(512, 50);
/// let chunks = chunker.chunk(&text);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size`: maximum number of characters per chunk
    /// * `chunk_overlap`: number of overlapping characters between consecutive chunks
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size: chunk_size.max(1), chunk_overlap }
    }

    fn split_text(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let (separator, remaining) = match separators
            .iter()
            .position(|sep| sep.is_empty() || text.contains(sep))
        {
            Some(i) => (separators[i], &separators[i + 1..]),
            None => ("", &[][..]),
        };

        let mut chunks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();

        for piece in split_on(text, separator) {
            if char_len(piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }
            if !pending.is_empty() {
                chunks.extend(self.merge(&pending, separator));
                pending.clear();
            }
            if remaining.is_empty() {
                // Indivisible: emitted as-is even though it exceeds the budget.
                let piece = piece.trim();
                if !piece.is_empty() {
                    chunks.push(piece.to_string());
                }
            } else {
                chunks.extend(self.split_text(piece, remaining));
            }
        }

        if !pending.is_empty() {
            chunks.extend(self.merge(&pending, separator));
        }

        chunks
    }

    fn merge(&self, pieces: &[&str], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut chunks = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let piece_len = char_len(piece);
            let joined_sep = if window.is_empty() { 0 } else { sep_len };

            if total + piece_len + joined_sep > self.chunk_size && !window.is_empty() {
                push_joined(&mut chunks, &window, separator);

                // Keep at most `chunk_overlap` characters, and only as many as still fit.
                loop {
                    let joined_sep = if window.is_empty() { 0 } else { sep_len };
                    let overflows = total > 0 && total + piece_len + joined_sep > self.chunk_size;
                    if total <= self.chunk_overlap && !overflows {
                        break;
                    }
                    let Some(front) = window.pop_front() else { break };
                    total -= char_len(front);
                    if !window.is_empty() {
                        total -= sep_len;
                    }
                }
            }

            if !window.is_empty() {
                total += sep_len;
            }
            window.push_back(piece);
            total += piece_len;
        }

        push_joined(&mut chunks, &window, separator);
        chunks
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        self.split_text(text, &SEPARATORS)
    }
}

fn push_joined(chunks: &mut Vec<String>, window: &VecDeque<&str>, separator: &str) {
    let joined = window.iter().copied().collect::<Vec<_>>().join(separator);
    let joined = joined.trim();
    if !joined.is_empty() {
        chunks.push(joined.to_string());
    }
}

/// Split on `separator`; the empty separator yields one slice per character.
fn split_on<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        text.char_indices().map(|(i, c)| &text[i..i + c.len_utf8()]).collect()
    } else {
        text.split(separator).collect()
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
