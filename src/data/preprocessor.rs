// ============================================================
// Layer 4 — Text Preprocessor
// ============================================================
// Cleans extracted document text before tokenisation.
//
// Extracted documents often contain:
//   - Non-breaking and zero-width spaces from Word formatting
//   - Typographic ligatures (ﬁ, ﬂ) from PDF-to-text exports
//   - Bullet glyphs (•, ◦, ▪) instead of markdown list markers
//   - Smart quotes and dashes
//   - Carriage returns and form feeds
//
// Each would otherwise become its own vocabulary entry or an
// [UNK] in the word-level tokenizer.
//
// Cleaning steps (applied in order):
//   1. Expand ligatures, map bullets/quotes/dashes to ASCII,
//      Unicode whitespace to a plain space, \r and form feed
//      to \n, drop other control characters
//   2. Collapse runs of spaces, trim every line
//   3. Drop leading, trailing and repeated blank lines
//
// Reference: Rust Book §8 (Strings in Rust)

pub struct Preprocessor;

impl Preprocessor {
    pub fn new() -> Self {
        Self
    }

    /// Clean a raw text string for downstream tokenisation.
    pub fn clean(&self, text: &str) -> String {

        // ── Step 1: Normalise individual characters ───────────────────────────
        let mut step1 = String::with_capacity(text.len());
        for c in text.replace("\r\n", "\n").chars() {
            match c {
                'ﬀ' => step1.push_str("ff"),
                'ﬁ' => step1.push_str("fi"),
                'ﬂ' => step1.push_str("fl"),
                'ﬃ' => step1.push_str("ffi"),
                'ﬄ' => step1.push_str("ffl"),
                '•' | '◦' | '▪' | '‣' | '●' | '■' => step1.push('-'),
                '\u{2013}' | '\u{2014}' | '\u{2212}' => step1.push('-'),
                '\u{2018}' | '\u{2019}' => step1.push('\''),
                '\u{201C}' | '\u{201D}' => step1.push('"'),
                '\u{2026}' => step1.push_str("..."),
                '\r' | '\u{000C}' => step1.push('\n'),
                '\t' | '\u{00A0}' | '\u{2007}' | '\u{202F}' => step1.push(' '),
                '\u{200B}' | '\u{FEFF}' => {}
                c if c.is_control() && c != '\n' => step1.push(' '),
                c => step1.push(c),
            }
        }

        // ── Steps 2-3: Squeeze each line, keep one blank line between paragraphs
        let mut lines: Vec<String> = Vec::new();
        for line in step1.lines() {
            let squeezed = line.split_whitespace().collect::<Vec<_>>().join(" ");
            let blank_run = squeezed.is_empty() && lines.last().map_or(true, String::is_empty);
            if !blank_run {
                lines.push(squeezed);
            }
        }
        while lines.last().is_some_and(String::is_empty) {
            lines.pop();
        }

        lines.join("\n")
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_multiple_spaces() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("hello   world"), "hello world");
    }

    #[test]
    fn test_trims_edges() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("  hello world  "), "hello world");
    }

    #[test]
    fn test_removes_control_chars() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("hello\x01world"), "hello world");
    }

    #[test]
    fn test_collapses_blank_lines() {
        let p = Preprocessor::new();
        let output = p.clean("line1\n\n\n\n\nline2");
        assert_eq!(output, "line1\n\nline2");
    }

    #[test]
    fn test_expands_ligatures_and_bullets() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("• ﬁle up\u{2014}load"), "- file up-load");
    }

    #[test]
    fn test_smart_quotes_and_form_feed() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("\u{201C}fast\u{201D}\u{000C}page two"), "\"fast\"\npage two");
    }

    #[test]
    fn test_zero_width_space_removed() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("log\u{200B}in"), "login");
    }

    #[test]
    fn test_windows_line_endings() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("a\r\nb\r\n\r\nc"), "a\nb\n\nc");
    }

    #[test]
    fn test_empty_string() {
        let p = Preprocessor::new();
        assert_eq!(p.clean(""), "");
    }
}
