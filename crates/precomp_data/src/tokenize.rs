//! Lowercase word tokenizer for caption text.

/// Splits a caption into lowercase word and punctuation tokens.
///
/// Alphanumeric runs form words; an apostrophe flanked by alphanumerics stays
/// inside its word, so contractions and possessives survive whole. Every
/// other non-whitespace character becomes its own single-char token.
pub fn word_tokens(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let chars: Vec<char> = lower.chars().collect();
    let mut tokens = Vec::new();
    let mut word = String::new();
    for (i, &c) in chars.iter().enumerate() {
        if c.is_alphanumeric() {
            word.push(c);
        } else if c == '\''
            && !word.is_empty()
            && chars.get(i + 1).is_some_and(|n| n.is_alphanumeric())
        {
            word.push(c);
        } else {
            if !word.is_empty() {
                tokens.push(std::mem::take(&mut word));
            }
            if !c.is_whitespace() {
                tokens.push(c.to_string());
            }
        }
    }
    if !word.is_empty() {
        tokens.push(word);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(text: &str) -> Vec<String> {
        word_tokens(text)
    }

    #[test]
    fn lowercases_and_splits_punctuation() {
        assert_eq!(toks("A brown Dog runs."), ["a", "brown", "dog", "runs", "."]);
        assert_eq!(toks("hello,world"), ["hello", ",", "world"]);
    }

    #[test]
    fn keeps_contractions_whole() {
        assert_eq!(toks("the dog's tail"), ["the", "dog's", "tail"]);
        assert_eq!(toks("it isn't here"), ["it", "isn't", "here"]);
        // A trailing apostrophe is punctuation, not part of the word.
        assert_eq!(toks("the dogs' tails"), ["the", "dogs", "'", "tails"]);
    }

    #[test]
    fn handles_empty_and_whitespace_only() {
        assert!(toks("").is_empty());
        assert!(toks("   \t ").is_empty());
    }

    #[test]
    fn keeps_digits_and_unicode_words() {
        assert_eq!(toks("2 dogs at a caf\u{e9}"), ["2", "dogs", "at", "a", "caf\u{e9}"]);
    }
}
