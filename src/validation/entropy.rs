//! Entropy Analyzer
//!
//! Flags opaque tokens (base64 blobs, random API keys) that carry no known
//! structural signature. Entropy is computed over the character distribution
//! of a single whitespace-delimited token.

use std::collections::HashMap;

/// Default minimum token length (in characters) considered for entropy
pub const DEFAULT_MIN_TOKEN_LENGTH: usize = 20;

/// Default entropy threshold in bits per character
pub const DEFAULT_ENTROPY_THRESHOLD: f64 = 4.5;

/// Shannon entropy of `s` in bits per character
///
/// Returns 0.0 for the empty string.
pub fn shannon_entropy(s: &str) -> f64 {
    let mut counts: HashMap<char, usize> = HashMap::new();
    let mut length = 0usize;
    for c in s.chars() {
        *counts.entry(c).or_insert(0) += 1;
        length += 1;
    }

    if length == 0 {
        return 0.0;
    }

    let length = length as f64;
    counts
        .values()
        .map(|&count| {
            let p = count as f64 / length;
            -p * p.log2()
        })
        .sum()
}

/// Per-token entropy check
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntropyAnalyzer {
    min_token_length: usize,
    threshold: f64,
}

impl Default for EntropyAnalyzer {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_TOKEN_LENGTH, DEFAULT_ENTROPY_THRESHOLD)
    }
}

impl EntropyAnalyzer {
    pub fn new(min_token_length: usize, threshold: f64) -> Self {
        Self {
            min_token_length,
            threshold,
        }
    }

    pub fn min_token_length(&self) -> usize {
        self.min_token_length
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Whether a single token is long enough and random enough to look like a secret
    pub fn is_suspicious(&self, token: &str) -> bool {
        token.chars().count() >= self.min_token_length && shannon_entropy(token) > self.threshold
    }

    /// Whether any whitespace-delimited token in `text` is suspicious
    pub fn has_high_entropy_token(&self, text: &str) -> bool {
        text.split_whitespace().any(|token| self.is_suspicious(token))
    }
}
