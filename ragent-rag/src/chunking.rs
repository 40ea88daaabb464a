//! Document chunking.
//!
//! This module provides the [`Chunker`] trait and [`RecursiveChunker`], which
//! splits text hierarchically (paragraphs, lines, sentences, words, then
//! characters) and packs the resulting units into overlapping windows of the
//! original text.
//!
//! All lengths are counted in `char`s, so a split never lands inside a
//! multi-byte code point.

use crate::config::RagConfig;
use crate::document::{
    CHUNK_INDEX_KEY, Chunk, Document, MetadataValue, SOURCE_ID_KEY, TOTAL_CHUNKS_KEY, chunk_id,
};
use crate::error::{RagError, Result};

/// Separators tried from coarsest to finest. The empty string means
/// character-level splitting.
pub const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", ". ", "! ", "? ", " ", ""];

/// A strategy for splitting documents into chunks.
///
/// Implementations produce [`Chunk`]s with text and metadata but no embeddings.
/// Embeddings are attached later by the pipeline.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if the document has empty text. Every chunk
    /// carries `source_id`, `chunk_index` and `total_chunks` metadata.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;
}

/// Splits text hierarchically and packs the pieces into overlapping chunks.
///
/// Each chunk is a contiguous slice of the input of at most `chunk_size`
/// characters. Every chunk after the first starts with exactly the last
/// `chunk_overlap` characters of its predecessor, so dropping those leading
/// characters and concatenating the chunks reproduces the input.
///
/// A unit that none of the configured separators can break below the
/// per-chunk budget is kept whole in a chunk of its own, even though that
/// chunk exceeds `chunk_size`. With the default separators this never happens,
/// because the final separator splits at character level.
///
/// # Example
///
/// ```rust,ignore
/// use ragent_rag::RecursiveChunker;
///
/// let chunker = RecursiveChunker::new(1000, 200)?;
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker` with the default separators.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `chunk_size` is zero or
    /// `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate(chunk_size, chunk_overlap)?;
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Create a chunker from the sizes in a [`RagConfig`].
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Replace the separator list, coarsest first.
    ///
    /// Leaving out the empty string makes the finest separator's pieces
    /// atomic: they are never cut, even when longer than `chunk_size`.
    pub fn with_separators<I, S>(mut self, separators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.separators = separators.into_iter().map(Into::into).collect();
        self
    }

    /// Maximum number of characters per chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of characters repeated at the start of each following chunk.
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split raw text into chunk strings.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }

        let index = CharIndex::new(text);
        if index.len() <= self.chunk_size {
            return vec![text.to_string()];
        }

        let units = self.unit_ends(text, &index);
        self.pack(text, &index, &units)
    }

    /// Compute the end positions (char indices) of the units the text breaks
    /// into.
    ///
    /// Driven by an explicit work stack of `(start, end, separator level)`
    /// ranges instead of recursion, so deeply nested input cannot exhaust the
    /// call stack. A range short enough to fit next to the overlap is a unit.
    fn unit_ends(&self, text: &str, index: &CharIndex) -> Vec<usize> {
        let budget = self.chunk_size - self.chunk_overlap;
        let mut ends = Vec::new();
        let mut stack = vec![(0, index.len(), 0)];

        while let Some((start, end, level)) = stack.pop() {
            if end - start <= budget {
                ends.push(end);
                continue;
            }

            let slice = index.slice(text, start, end);
            let found = self
                .separators
                .iter()
                .enumerate()
                .skip(level)
                .find(|(_, separator)| separator.is_empty() || slice.contains(separator.as_str()));

            match found {
                None => ends.push(end),
                Some((_, separator)) if separator.is_empty() => ends.extend(start + 1..=end),
                Some((found_level, separator)) => {
                    let pieces = split_keeping_separator(text, index, start, end, separator);
                    // Reversed so the first piece is popped first.
                    for (piece_start, piece_end) in pieces.into_iter().rev() {
                        stack.push((piece_start, piece_end, found_level + 1));
                    }
                }
            }
        }

        ends
    }

    /// Greedily pack units into windows of at most `chunk_size` characters.
    fn pack(&self, text: &str, index: &CharIndex, unit_ends: &[usize]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut start = 0;
        let mut units = unit_ends.iter().copied().peekable();

        // Every chunk takes at least one new unit, so `start` strictly advances.
        while let Some(mut end) = units.next() {
            while let Some(&next) = units.peek() {
                if next - start > self.chunk_size {
                    break;
                }
                end = next;
                units.next();
            }

            chunks.push(index.slice(text, start, end).to_string());
            start = end.saturating_sub(self.chunk_overlap);
        }

        chunks
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        // The whole split is buffered so every chunk can carry the final count.
        let texts = self.split_text(&document.text);
        let total_chunks = texts.len();

        texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| {
                let mut metadata = document.metadata.clone();
                metadata.insert(SOURCE_ID_KEY.to_string(), MetadataValue::from(document.id.as_str()));
                metadata.insert(CHUNK_INDEX_KEY.to_string(), MetadataValue::from(i));
                metadata.insert(TOTAL_CHUNKS_KEY.to_string(), MetadataValue::from(total_chunks));
                Chunk {
                    id: chunk_id(&document.id, i),
                    text,
                    embedding: Vec::new(),
                    metadata,
                    document_id: document.id.clone(),
                }
            })
            .collect()
    }
}

/// Split `text` into chunks of at most `chunk_size` characters with
/// `chunk_overlap` characters repeated between neighbours.
///
/// # Errors
///
/// Returns [`RagError::ConfigError`] if `chunk_size` is zero or
/// `chunk_overlap >= chunk_size`.
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Result<Vec<String>> {
    Ok(RecursiveChunker::new(chunk_size, chunk_overlap)?.split_text(text))
}

pub(crate) fn validate(chunk_size: usize, chunk_overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(RagError::ConfigError("chunk_size must be greater than zero".to_string()));
    }
    if chunk_overlap >= chunk_size {
        return Err(RagError::ConfigError(format!(
            "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
        )));
    }
    Ok(())
}

/// Byte offsets of every char in a string, plus the end offset.
struct CharIndex {
    offsets: Vec<usize>,
}

impl CharIndex {
    fn new(text: &str) -> Self {
        let mut offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        offsets.push(text.len());
        Self { offsets }
    }

    /// Number of chars.
    fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    fn slice<'a>(&self, text: &'a str, start: usize, end: usize) -> &'a str {
        &text[self.offsets[start]..self.offsets[end]]
    }

    fn char_at_byte(&self, byte: usize) -> usize {
        self.offsets.binary_search(&byte).unwrap_or_else(|i| i)
    }
}

/// Split the char range `start..end` at `separator`, keeping each separator
/// attached to the preceding piece. Returns char ranges covering the input.
fn split_keeping_separator(
    text: &str,
    index: &CharIndex,
    start: usize,
    end: usize,
    separator: &str,
) -> Vec<(usize, usize)> {
    let base = index.offsets[start];
    let slice = index.slice(text, start, end);
    let mut pieces = Vec::new();
    let mut piece_start = start;

    for (pos, _) in slice.match_indices(separator) {
        let piece_end = index.char_at_byte(base + pos + separator.len());
        if piece_end > piece_start {
            pieces.push((piece_start, piece_end));
            piece_start = piece_end;
        }
    }
    if piece_start < end {
        pieces.push((piece_start, end));
    }

    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    fn char_len(s: &str) -> usize {
        s.chars().count()
    }

    fn reconstruct(chunks: &[String], overlap: usize) -> String {
        let mut out = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            if i == 0 {
                out.push_str(chunk);
            } else {
                out.extend(chunk.chars().skip(overlap));
            }
        }
        out
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        assert!(matches!(RecursiveChunker::new(100, 100), Err(RagError::ConfigError(_))));
        assert!(matches!(RecursiveChunker::new(100, 150), Err(RagError::ConfigError(_))));
        assert!(matches!(RecursiveChunker::new(0, 0), Err(RagError::ConfigError(_))));
        assert!(split_text("abc", 10, 10).is_err());
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(split_text("", 10, 2).unwrap().is_empty());
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks = split_text("hello world", 20, 5).unwrap();
        assert_eq!(chunks, vec!["hello world".to_string()]);
    }

    #[test]
    fn character_level_windows_have_exact_overlap() {
        let text: String = (0..2400).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let chunks = split_text(&text, 1000, 200).unwrap();

        let lengths: Vec<usize> = chunks.iter().map(|c| char_len(c)).collect();
        assert_eq!(lengths, vec![1000, 1000, 800]);
        assert_eq!(chunks[0], text[0..1000]);
        assert_eq!(chunks[1], text[800..1800]);
        assert_eq!(chunks[2], text[1600..2400]);
        assert_eq!(chunks[0][800..], chunks[1][..200]);
        assert_eq!(chunks[1][800..], chunks[2][..200]);
        assert_eq!(reconstruct(&chunks, 200), text);
    }

    #[test]
    fn prefers_paragraph_boundaries() {
        let text = format!("{}\n\n{}\n\n{}", "a".repeat(38), "b".repeat(38), "c".repeat(38));
        let chunks = split_text(&text, 100, 10).unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], text[..80]);
        assert!(chunks[0].ends_with("\n\n"));
        assert_eq!(chunks[1], text[70..]);
        assert_eq!(reconstruct(&chunks, 10), text);
    }

    #[test]
    fn falls_back_to_word_boundaries() {
        let text = "the quick brown fox jumps over the lazy dog ".repeat(5);
        let chunks = split_text(&text, 30, 5).unwrap();

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(char_len(chunk) <= 30);
        }
        // Apart from the last, chunks end on a word boundary.
        for chunk in &chunks[..chunks.len() - 1] {
            assert!(chunk.ends_with(' '), "chunk {chunk:?} does not end at a word boundary");
        }
        assert_eq!(reconstruct(&chunks, 5), text);
    }

    #[test]
    fn oversized_word_is_kept_whole_without_character_fallback() {
        let long_word = "x".repeat(50);
        let text = format!("short {long_word} tail");
        let chunker = RecursiveChunker::new(20, 5).unwrap().with_separators(["\n\n", " "]);
        let chunks = chunker.split_text(&text);

        let holder: Vec<&String> = chunks.iter().filter(|c| c.contains(&long_word)).collect();
        assert_eq!(holder.len(), 1);
        assert!(char_len(holder[0]) > 20);
        assert!(chunks.last().unwrap().ends_with("tail"));
        assert_eq!(reconstruct(&chunks, 5), text);
    }

    #[test]
    fn oversized_word_is_cut_with_character_fallback() {
        let text = format!("short {} tail", "x".repeat(50));
        let chunks = split_text(&text, 20, 5).unwrap();

        for chunk in &chunks {
            assert!(char_len(chunk) <= 20);
        }
        assert_eq!(reconstruct(&chunks, 5), text);
    }

    #[test]
    fn multibyte_text_never_splits_inside_a_char() {
        let text = "Größenänderung für Bücher. ".repeat(12) + "日本語のテキストも分割されます。";
        let chunks = split_text(&text, 25, 7).unwrap();

        for chunk in &chunks {
            assert!(char_len(chunk) <= 25);
        }
        assert_eq!(reconstruct(&chunks, 7), text);
    }

    #[test]
    fn chunk_metadata_records_index_and_total() {
        let doc = Document::new("guide", "word ".repeat(100)).with_source("guide.md");
        let chunker = RecursiveChunker::new(50, 10).unwrap();
        let chunks = chunker.chunk(&doc);

        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.id, format!("guide_{i}"));
            assert_eq!(chunk.chunk_index(), Some(i));
            assert_eq!(chunk.total_chunks(), Some(chunks.len()));
            assert_eq!(chunk.document_id, "guide");
            assert_eq!(chunk.source(), "guide.md");
            assert!(chunk.embedding.is_empty());
        }
    }
}
