//! Word-level view of a headline for alias matching

use super::QUOTE_SUFFIX;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Token {
    text: String,
    /// Written with a leading `$` (cashtag)
    cashtag: bool,
}

/// Upper-cased alphanumeric tokens of a text, in order.
///
/// Matching is always on whole tokens, so `ACT` never matches inside
/// `ACTION` and `ETH` never matches inside `METHOD`.
#[derive(Debug, Clone)]
pub struct TokenizedText {
    tokens: Vec<Token>,
}

impl TokenizedText {
    pub fn new(text: &str) -> Self {
        let mut tokens = Vec::new();
        let mut current = String::new();
        let mut cashtag = false;
        let mut prev: Option<char> = None;

        for ch in text.chars().flat_map(char::to_uppercase) {
            if ch.is_alphanumeric() {
                if current.is_empty() {
                    cashtag = prev == Some('$');
                }
                current.push(ch);
            } else if !current.is_empty() {
                tokens.push(Token {
                    text: std::mem::take(&mut current),
                    cashtag,
                });
            }
            prev = Some(ch);
        }
        if !current.is_empty() {
            tokens.push(Token {
                text: current,
                cashtag,
            });
        }

        Self { tokens }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Every word of `phrase` appears consecutively
    pub fn contains_phrase(&self, phrase: &str) -> bool {
        let words: Vec<&str> = phrase.split_whitespace().collect();
        if words.is_empty() {
            return false;
        }
        self.tokens
            .windows(words.len())
            .any(|w| w.iter().zip(&words).all(|(t, word)| t.text == *word))
    }

    /// `base` written so it can only mean the asset: `$BASE`, `BASEUSDT`
    /// or `BASE/USDT`.
    pub fn is_qualified(&self, base: &str) -> bool {
        let pair = format!("{}{}", base, QUOTE_SUFFIX);
        self.tokens.iter().enumerate().any(|(i, t)| {
            if t.text == pair {
                return true;
            }
            if t.text != base {
                return false;
            }
            t.cashtag
                || self
                    .tokens
                    .get(i + 1)
                    .map(|next| next.text == QUOTE_SUFFIX)
                    .unwrap_or(false)
        })
    }
}
