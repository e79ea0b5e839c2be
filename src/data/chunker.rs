// ============================================================
// Layer 4 — Text Chunker
// ============================================================
// Splits long documents into overlapping windows of words.
//
// A training sample is prompt + target and must fit the model's
// context, so long documents are cut into windows of
// `chunk_size` words, each sharing `overlap` words with the
// next. Line breaks inside a window are kept: the markdown
// structure of requirements documents lives in them.
//
// Example with chunk_size=5, overlap=2:
//   Document: "A B C D E F G H I J"
//   Chunk 1:  "A B C D E"          (positions 0-4)
//   Chunk 2:  "D E F G H"          (positions 3-7)
//   Chunk 3:  "G H I J"            (positions 6-9, last chunk)
//
// The stride (step between chunks) = chunk_size - overlap
//
// Reference: Rust Book §8 (Slices)

use crate::domain::error::{SpinError, SpinResult};

pub struct Chunker {
    /// Target number of words per chunk
    chunk_size: usize,
    /// Number of words shared between adjacent chunks
    overlap:    usize,
}

impl Chunker {
    /// Fails when overlap >= chunk_size: the stride would be zero.
    pub fn new(chunk_size: usize, overlap: usize) -> SpinResult<Self> {
        if chunk_size == 0 {
            return Err(SpinError::config("chunk_size must be positive"));
        }
        if overlap >= chunk_size {
            return Err(SpinError::config(format!(
                "overlap ({overlap}) must be less than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self { chunk_size, overlap })
    }

    /// Split text into overlapping word-level chunks.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        // Each word remembers its line so windows can rebuild line breaks
        let words: Vec<(usize, &str)> = text
            .lines()
            .enumerate()
            .flat_map(|(line, l)| l.split_whitespace().map(move |w| (line, w)))
            .collect();

        if words.is_empty() {
            return Vec::new();
        }

        let stride     = self.chunk_size - self.overlap;
        let mut chunks = Vec::new();
        let mut start  = 0usize;

        loop {
            let end = (start + self.chunk_size).min(words.len());
            chunks.push(join_window(&words[start..end]));
            if end == words.len() {
                break;
            }
            start += stride;
        }

        chunks
    }

    /// Returns how many chunks a text of `word_count` words would produce
    pub fn num_chunks(&self, word_count: usize) -> usize {
        if word_count <= self.chunk_size {
            return usize::from(word_count > 0);
        }
        let stride = self.chunk_size - self.overlap;
        1 + (word_count - self.chunk_size).div_ceil(stride)
    }
}

fn join_window(window: &[(usize, &str)]) -> String {
    let mut out  = String::new();
    let mut prev = None;
    for &(line, word) in window {
        match prev {
            None => {}
            Some(p) if p == line => out.push(' '),
            Some(_) => out.push('\n'),
        }
        out.push_str(word);
        prev = Some(line);
    }
    out
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_chunking() {
        let c      = Chunker::new(5, 2).unwrap();
        let chunks = c.chunk("a b c d e f g h i j");
        assert_eq!(chunks, vec!["a b c d e", "d e f g h", "g h i j"]);
        assert_eq!(c.num_chunks(10), chunks.len());
    }

    #[test]
    fn test_overlap_is_correct() {
        let c      = Chunker::new(4, 2).unwrap();
        let chunks = c.chunk("a b c d e f");
        assert_eq!(chunks[0], "a b c d");
        assert!(chunks[1].starts_with("c d"));
    }

    #[test]
    fn test_line_breaks_preserved() {
        let c = Chunker::new(100, 10).unwrap();
        let chunks = c.chunk("# Title\n\n- users log in\n- data encrypted");
        assert_eq!(chunks, vec!["# Title\n- users log in\n- data encrypted"]);
    }

    #[test]
    fn test_short_text_gives_one_chunk() {
        let c      = Chunker::new(100, 10).unwrap();
        let chunks = c.chunk("just a few words");
        assert_eq!(chunks, vec!["just a few words"]);
        assert_eq!(c.num_chunks(4), 1);
    }

    #[test]
    fn test_empty_text_gives_no_chunks() {
        let c = Chunker::new(5, 2).unwrap();
        assert!(c.chunk("").is_empty());
        assert_eq!(c.num_chunks(0), 0);
    }

    #[test]
    fn test_overlap_must_be_less_than_chunk_size() {
        assert!(matches!(Chunker::new(5, 5), Err(SpinError::Config(_))));
        assert!(Chunker::new(0, 0).is_err());
    }
}
