// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Builds a word-level tokenizer from the document corpus, or
// loads a previously saved one, and wraps it in a `TextCodec`.
//
// In tokenizers 0.15, train_from_files requires Trainer::Model
// to equal ModelWrapper. We sidestep the trainer entirely:
// count words ourselves, write the HuggingFace tokenizer JSON
// and load it back.
//
// Fixed ids:
//   [PAD]=0  [UNK]=1  [BOS]=2  [EOS]=3  ⏎=4 (line break)
//
// Line breaks carry the markdown structure of the targets, so
// the normaliser maps "\n" to a ⏎ word before BertNormalizer
// would turn it into plain whitespace; decode maps it back.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;

pub const TOKENIZER_FILE: &str = "tokenizer.json";

pub const PAD_ID:     u32 = 0;
pub const UNK_ID:     u32 = 1;
pub const BOS_ID:     u32 = 2;
pub const EOS_ID:     u32 = 3;
pub const NEWLINE_ID: u32 = 4;

pub const NEWLINE_MARKER: &str = "⏎";

const SPECIAL_TOKENS: [(&str, u32); 4] =
    [("[PAD]", PAD_ID), ("[UNK]", UNK_ID), ("[BOS]", BOS_ID), ("[EOS]", EOS_ID)];

// ─── TextCodec ────────────────────────────────────────────────────────────────
/// Text ↔ token ids with the special ids the rest of the crate relies on.
pub struct TextCodec {
    tokenizer: Tokenizer,
}

impl TextCodec {
    pub fn new(tokenizer: Tokenizer) -> Self {
        Self { tokenizer }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let tokenizer = Tokenizer::from_file(path)
            .map_err(|e| anyhow::anyhow!("Cannot load tokenizer from '{}': {}", path.display(), e))?;
        Ok(Self::new(tokenizer))
    }

    /// Token ids without BOS/EOS
    pub fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let enc = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| anyhow::anyhow!("Tokenisation error: {e}"))?;
        Ok(enc.get_ids().to_vec())
    }

    /// Special tokens are skipped; ⏎ words become line breaks again.
    pub fn decode(&self, ids: &[u32]) -> Result<String> {
        let text = self
            .tokenizer
            .decode(ids, true)
            .map_err(|e| anyhow::anyhow!("Decode error: {e}"))?;
        let lines: Vec<&str> = text.split(NEWLINE_MARKER).map(str::trim).collect();
        Ok(lines.join("\n"))
    }

    pub fn vocab_size(&self) -> usize {
        self.tokenizer.get_vocab_size(true)
    }

    pub fn pad_id(&self) -> u32 {
        PAD_ID
    }

    pub fn eos_id(&self) -> u32 {
        EOS_ID
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.tokenizer
            .save(path, true)
            .map_err(|e| anyhow::anyhow!("Cannot write tokenizer to '{}': {}", path.display(), e))
    }
}

// ─── TokenizerStore ───────────────────────────────────────────────────────────
pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(TOKENIZER_FILE)
    }

    /// Load existing tokenizer or build a new one from texts
    pub fn load_or_build(&self, texts: &[String], vocab_size: usize) -> Result<TextCodec> {
        if self.path().exists() {
            tracing::info!("Loading existing tokenizer from '{}'", self.path().display());
            self.load()
        } else {
            tracing::info!("Building new tokenizer (vocab_size={})", vocab_size);
            self.build_and_save(texts, vocab_size)
        }
    }

    pub fn load(&self) -> Result<TextCodec> {
        TextCodec::from_file(self.path())
    }

    /// Build a fresh tokenizer from `texts`, replacing any saved one.
    pub fn build_and_save(&self, texts: &[String], vocab_size: usize) -> Result<TextCodec> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;

        // ── Step 1: word frequencies, split the way the pre-tokenizer splits
        let mut freq: HashMap<String, usize> = HashMap::new();
        for text in texts {
            for word in pre_tokenize(&text.to_lowercase()) {
                *freq.entry(word).or_insert(0) += 1;
            }
        }

        // Most frequent first; ties alphabetical so the vocabulary is stable
        let mut words: Vec<(String, usize)> = freq.into_iter().collect();
        words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        words.truncate(vocab_size.saturating_sub(NEWLINE_ID as usize + 1));

        // ── Step 2: vocab JSON ────────────────────────────────────────────────
        let mut vocab = serde_json::Map::new();
        for (token, id) in SPECIAL_TOKENS {
            vocab.insert(token.to_string(), serde_json::json!(id));
        }
        vocab.insert(NEWLINE_MARKER.to_string(), serde_json::json!(NEWLINE_ID));
        let mut next_id = NEWLINE_ID + 1;
        for (word, _) in &words {
            if !vocab.contains_key(word) {
                vocab.insert(word.clone(), serde_json::json!(next_id));
                next_id += 1;
            }
        }

        let added_tokens: Vec<serde_json::Value> = SPECIAL_TOKENS
            .iter()
            .map(|(token, id)| serde_json::json!({
                "id": id, "content": token, "single_word": false, "lstrip": false,
                "rstrip": false, "normalized": false, "special": true
            }))
            .collect();

        // ── Step 3: HuggingFace tokenizer JSON ────────────────────────────────
        let tokenizer_json = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": added_tokens,
            "normalizer": {
                "type": "Sequence",
                "normalizers": [
                    {
                        "type": "Replace",
                        "pattern": { "String": "\n" },
                        "content": format!(" {NEWLINE_MARKER} ")
                    },
                    {
                        "type": "BertNormalizer",
                        "clean_text": true,
                        "handle_chinese_chars": true,
                        "strip_accents": null,
                        "lowercase": true
                    }
                ]
            },
            "pre_tokenizer": { "type": "Whitespace" },
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": vocab,
                "unk_token": "[UNK]"
            }
        });

        let tok_path = self.path();
        std::fs::write(&tok_path, serde_json::to_string_pretty(&tokenizer_json)?)
            .with_context(|| format!("Cannot write tokenizer JSON to '{}'", tok_path.display()))?;

        tracing::info!("Tokenizer built with {} tokens, saved to '{}'", next_id, tok_path.display());
        self.load()
    }
}

/// Runs of word characters or of punctuation, mirroring the
/// `Whitespace` pre-tokenizer (`\w+|[^\w\s]+`).
fn pre_tokenize(text: &str) -> Vec<String> {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let mut out  = Vec::new();
    let mut cur  = String::new();
    let mut kind = None;
    for c in text.chars() {
        let k = if c.is_whitespace() { None } else { Some(is_word(c)) };
        if k != kind && !cur.is_empty() {
            out.push(std::mem::take(&mut cur));
        }
        if k.is_some() {
            cur.push(c);
        }
        kind = k;
    }
    if !cur.is_empty() {
        out.push(cur);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<String> {
        vec![
            "The system shall log in users.\nUsers shall reset passwords.".to_string(),
            "# Requirements Document\n## Functional Requirements".to_string(),
        ]
    }

    #[test]
    fn test_pre_tokenize_splits_punctuation() {
        assert_eq!(pre_tokenize("log-in, now"), vec!["log", "-", "in", ",", "now"]);
    }

    #[test]
    fn test_build_then_reload() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenizerStore::new(dir.path());
        let codec = store.load_or_build(&corpus(), 100).unwrap();
        assert!(store.path().exists());
        assert!(codec.vocab_size() > 5);

        let reloaded = store.load_or_build(&[], 100).unwrap();
        assert_eq!(reloaded.vocab_size(), codec.vocab_size());
    }

    #[test]
    fn test_line_breaks_survive_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let codec = TokenizerStore::new(dir.path()).load_or_build(&corpus(), 100).unwrap();

        let ids = codec.encode("Users shall\nreset passwords").unwrap();
        assert!(ids.contains(&NEWLINE_ID));
        assert!(!ids.contains(&UNK_ID));
        assert_eq!(codec.decode(&ids).unwrap(), "users shall\nreset passwords");
    }

    #[test]
    fn test_unknown_words_map_to_unk() {
        let dir = tempfile::tempdir().unwrap();
        let codec = TokenizerStore::new(dir.path()).load_or_build(&corpus(), 100).unwrap();
        assert_eq!(codec.encode("zebra").unwrap(), vec![UNK_ID]);
    }

    #[test]
    fn test_vocab_size_is_capped() {
        let dir = tempfile::tempdir().unwrap();
        let codec = TokenizerStore::new(dir.path()).load_or_build(&corpus(), 8).unwrap();
        assert_eq!(codec.vocab_size(), 8);
    }
}
