//! Recursive character chunking with overlap.
//!
//! Documents are split into windows of at most `chunk_size` characters,
//! breaking on the largest semantic unit that fits: paragraphs first, then
//! lines, sentences, and words, falling back to fixed grapheme windows only
//! when a single unit is larger than a whole window. Consecutive windows share up to
//! `chunk_overlap` characters of suffix. Output is fully deterministic for a
//! fixed input and configuration.
//!
//! Every split keeps its separator attached to the preceding piece, so the
//! concatenation of a level's pieces reproduces the input exactly; chunk
//! texts are never trimmed. That keeps the de-overlap round trip exact.

use std::collections::VecDeque;

use unicode_segmentation::UnicodeSegmentation;
use uuid::Uuid;

use crate::types::{Chunk, Document, PipelineError};

/// Breakpoint ladder, largest unit first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Breakpoint {
    Paragraph,
    Line,
    Sentence,
    Word,
    Grapheme,
}

impl Breakpoint {
    fn finer(self) -> Option<Self> {
        match self {
            Self::Paragraph => Some(Self::Line),
            Self::Line => Some(Self::Sentence),
            Self::Sentence => Some(Self::Word),
            Self::Word => Some(Self::Grapheme),
            Self::Grapheme => None,
        }
    }

    /// Splits `text` into pieces whose concatenation is exactly `text`.
    fn split<'a>(self, text: &'a str) -> Vec<&'a str> {
        match self {
            Self::Paragraph => split_after(text, "\n\n"),
            Self::Line => split_after(text, "\n"),
            Self::Sentence => text.split_sentence_bounds().collect(),
            Self::Word => text.split_word_bounds().collect(),
            Self::Grapheme => text.graphemes(true).collect(),
        }
    }
}

/// Splits after each occurrence of `sep`, keeping the separator attached to
/// the preceding piece.
fn split_after<'a>(text: &'a str, sep: &str) -> Vec<&'a str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    while let Some(found) = text[start..].find(sep) {
        let end = start + found + sep.len();
        pieces.push(&text[start..end]);
        start = end;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

/// Character count as the user perceives it: grapheme clusters.
fn width(text: &str) -> usize {
    text.graphemes(true).count()
}

/// Deterministic splitter configured with a window size and overlap.
#[derive(Clone, Debug)]
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextChunker {
    /// Fails fast when the overlap leaves no room for the window to advance.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, PipelineError> {
        if chunk_size == 0 {
            return Err(PipelineError::Config("chunk_size must be positive".into()));
        }
        if chunk_overlap >= chunk_size {
            return Err(PipelineError::Config(format!(
                "chunk_overlap ({chunk_overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    /// Splits every document into position-stamped chunks carrying the
    /// parent document's metadata.
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for document in documents {
            let source = document.source().unwrap_or_default();
            for (index, text) in self.split_text(&document.text).into_iter().enumerate() {
                chunks.push(Chunk {
                    id: chunk_id(source, index),
                    text,
                    chunk_index: index,
                    metadata: document.metadata.clone(),
                });
            }
        }
        chunks
    }

    /// Splits raw text into overlapping windows of at most `chunk_size`
    /// characters. A text that already fits is returned whole.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }
        if width(text) <= self.chunk_size {
            return vec![text.to_string()];
        }
        self.split_level(text, Breakpoint::Paragraph)
    }

    fn split_level(&self, text: &str, level: Breakpoint) -> Vec<String> {
        let Some(finer) = level.finer() else {
            return self.grapheme_windows(text);
        };
        let pieces = level.split(text);
        if pieces.len() <= 1 {
            // No boundary at this level; try the next smaller unit.
            return self.split_level(text, finer);
        }
        self.merge_pieces(pieces, finer)
    }

    /// Greedily packs pieces into windows of at most `chunk_size` characters.
    /// When a window closes, pieces are dropped from its front until at most
    /// `chunk_overlap` characters remain; those carry into the next window.
    fn merge_pieces(&self, pieces: Vec<&str>, finer: Breakpoint) -> Vec<String> {
        let mut windows = Vec::new();
        let mut current: VecDeque<(&str, usize)> = VecDeque::new();
        let mut current_len = 0usize;

        for piece in pieces {
            let piece_len = width(piece);
            if piece_len > self.chunk_size {
                // A single unit larger than a whole window: close the open
                // window and break the unit at the next smaller breakpoint.
                if !current.is_empty() {
                    windows.push(join(&current));
                    current.clear();
                    current_len = 0;
                }
                windows.extend(self.split_level(piece, finer));
                continue;
            }
            if current_len + piece_len > self.chunk_size && !current.is_empty() {
                windows.push(join(&current));
                while current_len > self.chunk_overlap
                    || (current_len + piece_len > self.chunk_size && current_len > 0)
                {
                    match current.pop_front() {
                        Some((_, dropped)) => current_len -= dropped,
                        None => break,
                    }
                }
            }
            current.push_back((piece, piece_len));
            current_len += piece_len;
        }
        if !current.is_empty() {
            windows.push(join(&current));
        }
        windows
    }

    /// Fixed-stride windows over grapheme clusters, the last resort when no
    /// breakpoint fits: each window after the first starts
    /// `chunk_size - chunk_overlap` clusters after the previous one.
    fn grapheme_windows(&self, text: &str) -> Vec<String> {
        let clusters: Vec<&str> = text.graphemes(true).collect();
        let stride = self.chunk_size - self.chunk_overlap;
        let mut windows = Vec::new();
        let mut start = 0;
        loop {
            let end = (start + self.chunk_size).min(clusters.len());
            windows.push(clusters[start..end].concat());
            if end == clusters.len() {
                break;
            }
            start += stride;
        }
        windows
    }
}

fn join(pieces: &VecDeque<(&str, usize)>) -> String {
    pieces.iter().map(|(piece, _)| *piece).collect()
}

/// Deterministic chunk id so re-indexing the same source upserts in place.
fn chunk_id(source: &str, index: usize) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, format!("{source}#{index}").as_bytes()).to_string()
}
