//! Token-budget truncation.
//!
//! Files are cut to a fixed number of BPE tokens before they are sent to
//! the embedding service. Counting and cutting use the same encoding, so a
//! truncated text never re-encodes to more tokens than the budget.
//!
//! Text is encoded with `encode_ordinary`: strings such as `<|endoftext|>`
//! that appear in source files are plain text, not control tokens, which
//! keeps `decode(encode(text)) == text` for every input.

use anyhow::Result;
use std::fmt;
use std::str::FromStr;
use tiktoken_rs::{cl100k_base, o200k_base, CoreBPE};

/// BPE encoding used for budget accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenModel {
    #[default]
    Cl100k,
    O200k,
}

impl fmt::Display for TokenModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenModel::Cl100k => write!(f, "cl100k"),
            TokenModel::O200k => write!(f, "o200k"),
        }
    }
}

impl FromStr for TokenModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cl100k" | "cl100k_base" => Ok(TokenModel::Cl100k),
            "o200k" | "o200k_base" => Ok(TokenModel::O200k),
            other => Err(format!(
                "unknown tokenizer '{}'. Available: cl100k, o200k",
                other
            )),
        }
    }
}

pub struct Tokenizer {
    model: TokenModel,
    bpe: CoreBPE,
}

impl fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tokenizer")
            .field("model", &self.model)
            .finish()
    }
}

impl Tokenizer {
    pub fn new(model: TokenModel) -> Result<Self> {
        let bpe = match model {
            TokenModel::Cl100k => cl100k_base(),
            TokenModel::O200k => o200k_base(),
        }
        .map_err(|e| anyhow::anyhow!("Failed to load {} encoding: {}", model, e))?;
        Ok(Self { model, bpe })
    }

    pub fn model(&self) -> TokenModel {
        self.model
    }

    pub fn count(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        self.bpe.encode_ordinary(text).len()
    }

    /// Return the longest token prefix of `text` that fits in `max_tokens`.
    ///
    /// Text already within budget is returned unchanged. When the cut falls
    /// inside a multi-byte character, or the decoded prefix would re-encode
    /// above the budget, tokens are dropped one at a time until it fits.
    pub fn truncate(&self, text: &str, max_tokens: usize) -> String {
        if text.is_empty() || max_tokens == 0 {
            return String::new();
        }

        let tokens = self.bpe.encode_ordinary(text);
        if tokens.len() <= max_tokens {
            return text.to_string();
        }

        let mut keep = max_tokens;
        while keep > 0 {
            if let Ok(prefix) = self.bpe.decode(tokens[..keep].to_vec()) {
                if text.starts_with(prefix.as_str()) && self.count(&prefix) <= max_tokens {
                    return prefix;
                }
            }
            keep -= 1;
        }
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenizer() -> Tokenizer {
        Tokenizer::new(TokenModel::Cl100k).unwrap()
    }

    fn sample_texts() -> Vec<String> {
        vec![
            String::new(),
            "a".to_string(),
            "Hello, world!".to_string(),
            "def greet(name)\n  puts \"Hello, #{name}\"\nend\n".repeat(40),
            "多字节字符测试 — émoji 🦀🦀🦀 and ascii mixed ".repeat(25),
            "<|endoftext|> is just text here".to_string(),
            "    \t\n\n\r\n   ".to_string(),
        ]
    }

    #[test]
    fn empty_input_is_empty() {
        let t = tokenizer();
        assert_eq!(t.truncate("", 10), "");
        assert_eq!(t.count(""), 0);
    }

    #[test]
    fn zero_budget_is_empty() {
        assert_eq!(tokenizer().truncate("class Foo; end", 0), "");
    }

    #[test]
    fn under_budget_is_identity() {
        let t = tokenizer();
        for text in sample_texts() {
            let n = t.count(&text);
            assert_eq!(t.truncate(&text, n), text);
            assert_eq!(t.truncate(&text, n + 5), text);
        }
    }

    #[test]
    fn never_exceeds_budget() {
        let t = tokenizer();
        for text in sample_texts() {
            for budget in [1, 2, 3, 7, 50, 333] {
                let out = t.truncate(&text, budget);
                assert!(
                    t.count(&out) <= budget,
                    "{} tokens over budget {}",
                    t.count(&out),
                    budget
                );
                assert!(text.starts_with(&out));
            }
        }
    }

    #[test]
    fn truncation_is_idempotent() {
        let t = tokenizer();
        for text in sample_texts() {
            for budget in [1, 4, 25, 200] {
                let once = t.truncate(&text, budget);
                let twice = t.truncate(&once, budget);
                assert_eq!(once, twice);
            }
        }
    }

    #[test]
    fn long_text_is_cut_near_budget() {
        let t = tokenizer();
        let text = "word ".repeat(1000);
        let out = t.truncate(&text, 100);
        let n = t.count(&out);
        assert!(n <= 100 && n >= 95, "got {} tokens", n);
    }

    #[test]
    fn multibyte_cut_keeps_valid_prefix() {
        let t = tokenizer();
        let text = "🦀".repeat(64);
        for budget in 1..12 {
            let out = t.truncate(&text, budget);
            assert!(text.starts_with(&out));
            assert!(out.chars().all(|c| c == '🦀'));
        }
    }

    #[test]
    fn o200k_also_respects_budget() {
        let t = Tokenizer::new(TokenModel::O200k).unwrap();
        let text = "fn main() { println!(\"hi\"); }\n".repeat(50);
        let out = t.truncate(&text, 30);
        assert!(t.count(&out) <= 30);
    }

    #[test]
    fn model_from_str() {
        assert_eq!("cl100k".parse::<TokenModel>().unwrap(), TokenModel::Cl100k);
        assert_eq!("O200K_BASE".parse::<TokenModel>().unwrap(), TokenModel::O200k);
        assert!("gpt2".parse::<TokenModel>().is_err());
        assert_eq!(TokenModel::O200k.to_string(), "o200k");
    }
}
