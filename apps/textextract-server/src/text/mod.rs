//! Text post-processing for OCR output
//!
//! Providers tend to return everything visible in a screenshot: like counts,
//! buttons, handles and decorative glyphs alongside the content the user
//! actually cares about. This module cleans that up:
//!
//! - `filter`: rule-based line scoring and garbled-output detection
//! - `confidence`: heuristic 0-100 quality estimate for recognized text
//! - `similarity`: Levenshtein distance used to drop repeated lines

mod confidence;
mod filter;
mod similarity;

pub use confidence::{estimate_confidence, MAX_CONFIDENCE, MIN_CONFIDENCE};
pub use filter::{
    is_garbled, score_line, ScoringRule, TextFilter, DEFAULT_RULES, GARBLED_MAX_SYMBOL_RATIO,
    GARBLED_MAX_WEIRD_SYMBOLS, GARBLED_MIN_REAL_WORDS, GARBLED_TEXT_MESSAGE,
};
pub use similarity::{levenshtein, similarity};

/// Count whitespace-separated words
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
