//! Heuristic confidence estimate for recognized text
//!
//! Providers do not report a usable confidence, so every result gets the same
//! estimate: a base of 75 plus bonuses for text that looks like prose.

use once_cell::sync::Lazy;
use regex::Regex;

pub const MIN_CONFIDENCE: f64 = 50.0;
pub const MAX_CONFIDENCE: f64 = 99.0;

const BASE: f64 = 75.0;

static CAPITALIZED_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\p{Lu}\p{Ll}+").unwrap());

/// Estimate recognition quality on a 0-100 scale, clamped to [50, 99]
pub fn estimate_confidence(text: &str) -> f64 {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.is_empty() {
        return MIN_CONFIDENCE;
    }

    let mut score = BASE;

    let word_count = tokens.len();
    if word_count > 10 {
        score += 5.0;
    }
    if word_count > 30 {
        score += 5.0;
    }

    let proper_words = tokens.iter().filter(|t| is_proper_word(t)).count();
    score += (proper_words as f64 / word_count as f64) * 10.0;

    let sentences = text
        .split(['.', '!', '?'])
        .filter(|s| s.trim().len() > 10)
        .count();
    score += (sentences.min(3) * 2) as f64;

    let visible = text.chars().filter(|c| !c.is_whitespace()).count();
    let symbols = text
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_alphanumeric())
        .count();
    let symbol_ratio = symbols as f64 / visible.max(1) as f64;
    if symbol_ratio < 0.1 {
        score += 5.0;
    } else if symbol_ratio < 0.2 {
        score += 3.0;
    }

    if CAPITALIZED_WORD.is_match(text) {
        score += 3.0;
    }

    score.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE).round()
}

/// An alphabetic run of at least three chars, ignoring edge punctuation
fn is_proper_word(token: &str) -> bool {
    let word = token.trim_matches(|c: char| !c.is_alphanumeric());
    word.chars().count() >= 3 && word.chars().all(char::is_alphabetic)
}
