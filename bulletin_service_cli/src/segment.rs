//! Paragraph-aware splitting of long documents into bounded chunks.
//!
//! Lengths are measured in `char`s, not bytes, so accented text is never cut
//! in the middle of a code point.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// Inserted between paragraphs that share a chunk.
pub const PARAGRAPH_SEPARATOR: &str = "\n\n";
const SEPARATOR_CHARS: usize = 2;

static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{2,}").expect("static regex"));

/// A 1-indexed, bounded slice of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
}

impl Chunk {
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Splits `text` into chunks of at most `max_chars` characters.
///
/// Paragraphs (separated by two or more newlines) are packed greedily into a
/// buffer joined by [`PARAGRAPH_SEPARATOR`]. A paragraph longer than
/// `max_chars` flushes the buffer and is cut into fixed-size slices, each
/// emitted as its own chunk. `max_chars` below 1 is treated as 1.
pub fn segment(text: &str, max_chars: usize) -> Vec<Chunk> {
    let max_chars = max_chars.max(1);
    let mut chunks = ChunkSink::default();
    let mut buffer = String::new();
    let mut buffer_chars = 0usize;

    for paragraph in paragraphs(text) {
        let len = paragraph.chars().count();

        if len > max_chars {
            chunks.flush(&mut buffer, &mut buffer_chars);
            for slice in hard_split(paragraph, max_chars) {
                chunks.push(slice.to_string());
            }
            continue;
        }

        if !buffer.is_empty() && buffer_chars + SEPARATOR_CHARS + len > max_chars {
            chunks.flush(&mut buffer, &mut buffer_chars);
        }

        if !buffer.is_empty() {
            buffer.push_str(PARAGRAPH_SEPARATOR);
            buffer_chars += SEPARATOR_CHARS;
        }
        buffer.push_str(paragraph);
        buffer_chars += len;
    }

    chunks.flush(&mut buffer, &mut buffer_chars);
    chunks.0
}

fn paragraphs(text: &str) -> impl Iterator<Item = &str> {
    PARAGRAPH_BREAK.split(text).filter(|p| !p.is_empty())
}

fn hard_split(paragraph: &str, max_chars: usize) -> Vec<&str> {
    let mut slices = Vec::new();
    let mut start = 0;
    for (count, (offset, _)) in paragraph.char_indices().enumerate() {
        if count > 0 && count % max_chars == 0 {
            slices.push(&paragraph[start..offset]);
            start = offset;
        }
    }
    slices.push(&paragraph[start..]);
    slices
}

#[derive(Default)]
struct ChunkSink(Vec<Chunk>);

impl ChunkSink {
    fn push(&mut self, text: String) {
        let index = self.0.len() + 1;
        self.0.push(Chunk { index, text });
    }

    fn flush(&mut self, buffer: &mut String, buffer_chars: &mut usize) {
        if !buffer.is_empty() {
            self.push(std::mem::take(buffer));
        }
        *buffer_chars = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn texts(chunks: &[Chunk]) -> Vec<&str> {
        chunks.iter().map(|c| c.text.as_str()).collect()
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(segment("", 100).is_empty());
        assert!(segment("\n\n\n", 100).is_empty());
    }

    #[test]
    fn packs_paragraphs_until_budget() {
        let chunks = segment("aaaa\n\nbbbb\n\ncccc", 10);
        assert_eq!(texts(&chunks), vec!["aaaa\n\nbbbb", "cccc"]);
        assert_eq!(chunks[0].index, 1);
        assert_eq!(chunks[1].index, 2);
    }

    #[test]
    fn separator_counts_against_budget() {
        // 4 + 2 + 4 = 10 > 9
        let chunks = segment("aaaa\n\nbbbb", 9);
        assert_eq!(texts(&chunks), vec!["aaaa", "bbbb"]);
    }

    #[test]
    fn collapses_long_newline_runs() {
        let chunks = segment("uno\n\n\n\n\ndos", 100);
        assert_eq!(texts(&chunks), vec!["uno\n\ndos"]);
    }

    #[test]
    fn oversized_paragraph_is_hard_split_after_flushing_buffer() {
        let chunks = segment("ab\n\n0123456789\n\ncd", 4);
        assert_eq!(texts(&chunks), vec!["ab", "0123", "4567", "89", "cd"]);
        let indices: Vec<usize> = chunks.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn hard_split_respects_multibyte_characters() {
        let chunks = segment("áéíóúñ", 4);
        assert_eq!(texts(&chunks), vec!["áéíó", "úñ"]);
    }

    #[test]
    fn two_large_paragraphs_become_four_chunks() {
        let text = format!("{}\n\n{}", "a".repeat(6000), "b".repeat(6000));
        let chunks = segment(&text, 5000);
        let lens: Vec<usize> = chunks.iter().map(Chunk::char_len).collect();
        assert_eq!(lens, vec![5000, 1000, 5000, 1000]);
    }

    #[test]
    fn zero_budget_is_treated_as_one() {
        let chunks = segment("abc", 0);
        assert_eq!(texts(&chunks), vec!["a", "b", "c"]);
    }

    proptest! {
        #[test]
        fn chunks_cover_original_text(text in "[a-zñé .\n]{0,300}", max in 1usize..40) {
            let chunks = segment(&text, max);
            let rebuilt: String = chunks
                .iter()
                .map(|c| c.text.replace(PARAGRAPH_SEPARATOR, ""))
                .collect();
            let expected = PARAGRAPH_BREAK.replace_all(&text, "").into_owned();
            prop_assert_eq!(rebuilt, expected);
        }

        #[test]
        fn chunks_never_exceed_budget(text in "[a-z \n]{0,300}", max in 1usize..40) {
            for chunk in segment(&text, max) {
                prop_assert!(chunk.char_len() <= max);
                prop_assert!(!chunk.text.is_empty());
            }
        }

        #[test]
        fn segmentation_is_idempotent(text in "[a-z\n]{0,200}", max in 1usize..30) {
            prop_assert_eq!(segment(&text, max), segment(&text, max));
        }
    }
}
