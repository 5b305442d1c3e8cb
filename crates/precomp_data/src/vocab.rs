//! Vocabulary capability and its JSON-backed implementation.

use crate::tokenize::word_tokens;
use crate::types::{DatasetResult, PrecompError};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub const PAD_TOKEN: &str = "<pad>";
pub const START_TOKEN: &str = "<start>";
pub const END_TOKEN: &str = "<end>";
pub const UNK_TOKEN: &str = "<unk>";

/// Padding id written into collated caption matrices. Vocabularies are
/// expected to reserve id 0 for `<pad>`.
pub const PAD_ID: u32 = 0;

/// Token-to-id capability. `lookup` is total: unknown tokens resolve to the
/// `<unk>` id instead of failing.
pub trait Vocabulary: Send + Sync {
    fn lookup(&self, token: &str) -> u32;
    fn start_id(&self) -> u32;
    fn end_id(&self) -> u32;
    fn unk_id(&self) -> u32;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Encodes one caption as `<start> tokens... <end>` ids.
pub fn encode_caption(vocab: &dyn Vocabulary, caption: &str) -> Vec<u32> {
    let tokens = word_tokens(caption);
    let mut ids = Vec::with_capacity(tokens.len() + 2);
    ids.push(vocab.start_id());
    ids.extend(tokens.iter().map(|t| vocab.lookup(t)));
    ids.push(vocab.end_id());
    ids
}

/// Vocabulary backed by a flat `{token: id}` JSON map.
///
/// The map must resolve `<start>`, `<end>`, and `<unk>`; ids for these are
/// cached at load so the hot lookup path stays a single hash probe.
#[derive(Debug, Clone)]
pub struct JsonVocab {
    word2idx: HashMap<String, u32>,
    start: u32,
    end: u32,
    unk: u32,
}

impl JsonVocab {
    pub fn load(path: &Path) -> DatasetResult<Self> {
        let bytes = fs::read(path).map_err(|e| PrecompError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let word2idx: HashMap<String, u32> =
            serde_json::from_slice(&bytes).map_err(|e| PrecompError::Json {
                path: path.to_path_buf(),
                source: e,
            })?;
        Self::from_map(path, word2idx)
    }

    fn from_map(path: &Path, word2idx: HashMap<String, u32>) -> DatasetResult<Self> {
        let reserved = |token: &str| {
            word2idx
                .get(token)
                .copied()
                .ok_or_else(|| PrecompError::Vocab {
                    path: path.to_path_buf(),
                    msg: format!("missing reserved token {token}"),
                })
        };
        let start = reserved(START_TOKEN)?;
        let end = reserved(END_TOKEN)?;
        let unk = reserved(UNK_TOKEN)?;
        Ok(JsonVocab {
            word2idx,
            start,
            end,
            unk,
        })
    }

    /// Builds a vocabulary in memory: reserved tokens at ids 0..=3 followed
    /// by `words` in iteration order. Handy for tests and small experiments.
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut word2idx = HashMap::new();
        for (i, token) in [PAD_TOKEN, START_TOKEN, END_TOKEN, UNK_TOKEN]
            .into_iter()
            .enumerate()
        {
            word2idx.insert(token.to_string(), i as u32);
        }
        for word in words {
            let next = word2idx.len() as u32;
            word2idx.entry(word.into()).or_insert(next);
        }
        JsonVocab {
            word2idx,
            start: 1,
            end: 2,
            unk: 3,
        }
    }
}

impl Vocabulary for JsonVocab {
    fn lookup(&self, token: &str) -> u32 {
        self.word2idx.get(token).copied().unwrap_or(self.unk)
    }

    fn start_id(&self) -> u32 {
        self.start
    }

    fn end_id(&self) -> u32 {
        self.end
    }

    fn unk_id(&self) -> u32 {
        self.unk
    }

    fn len(&self) -> usize {
        self.word2idx.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_words_assigns_sequential_ids() {
        let vocab = JsonVocab::from_words(["dog", "runs", "dog"]);
        assert_eq!(vocab.lookup(PAD_TOKEN), 0);
        assert_eq!(vocab.start_id(), 1);
        assert_eq!(vocab.end_id(), 2);
        assert_eq!(vocab.unk_id(), 3);
        assert_eq!(vocab.lookup("dog"), 4);
        assert_eq!(vocab.lookup("runs"), 5);
        assert_eq!(vocab.len(), 6, "duplicate words must not burn ids");
    }

    #[test]
    fn unknown_tokens_fall_back_to_unk() {
        let vocab = JsonVocab::from_words(["dog"]);
        assert_eq!(vocab.lookup("zebra"), vocab.unk_id());
    }

    #[test]
    fn encode_wraps_in_start_end() {
        let vocab = JsonVocab::from_words(["a", "dog", "."]);
        let ids = encode_caption(&vocab, "A dog.");
        assert_eq!(ids, vec![1, 4, 5, 6, 2]);
        assert_eq!(encode_caption(&vocab, ""), vec![1, 2]);
    }

    #[test]
    fn json_load_roundtrip() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("vocab.json");
        let map: HashMap<&str, u32> = [
            (PAD_TOKEN, 0),
            (START_TOKEN, 1),
            (END_TOKEN, 2),
            (UNK_TOKEN, 3),
            ("dog", 4),
        ]
        .into_iter()
        .collect();
        fs::write(&path, serde_json::to_vec(&map)?)?;

        let vocab = JsonVocab::load(&path)?;
        assert_eq!(vocab.lookup("dog"), 4);
        assert_eq!(vocab.lookup("zebra"), 3);
        assert_eq!((vocab.start_id(), vocab.end_id()), (1, 2));
        Ok(())
    }

    #[test]
    fn json_load_requires_reserved_tokens() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("vocab.json");
        fs::write(&path, r#"{"dog": 0}"#)?;
        let err = JsonVocab::load(&path).err();
        let msg = err.map(|e| e.to_string()).unwrap_or_default();
        assert!(msg.contains("missing reserved token"), "got: {msg}");
        Ok(())
    }
}
