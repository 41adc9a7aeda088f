//! Heuristic line filter
//!
//! Each line of recognized text is scored by an ordered list of named rules.
//! Lines with a positive total are kept, strongest first.

use once_cell::sync::Lazy;
use regex::Regex;

use super::similarity::similarity;

/// Fewer real words than this is one half of the garbled condition
pub const GARBLED_MIN_REAL_WORDS: usize = 3;
/// More weird symbols than this marks text as garbled
pub const GARBLED_MAX_WEIRD_SYMBOLS: usize = 5;
/// A non-word character ratio above this marks text as garbled
pub const GARBLED_MAX_SYMBOL_RATIO: f64 = 0.6;

/// Returned verbatim in place of unreadable output
pub const GARBLED_TEXT_MESSAGE: &str = "The text in this image appears to be stylized or decorative and could not be read reliably. Please try an image with clear, plain text on a contrasting background.";

/// Lines at least this similar to an already kept line are dropped
const DUPLICATE_SIMILARITY: f64 = 0.9;

/// Punctuation that ordinary prose uses; anything else non-alphanumeric is "weird"
const COMMON_PUNCTUATION: &[char] = &[
    '.', ',', '!', '?', ';', ':', '\'', '"', '-', '(', ')', '/', '&', '%', '$', '#', '@',
];

static REAL_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\p{Alphabetic}{3,}").unwrap());

#[derive(Clone)]
enum Matcher {
    Pattern(Regex),
    Predicate(fn(&str) -> bool),
}

/// A named scoring rule: when it applies to a line, its weight is added
#[derive(Clone)]
pub struct ScoringRule {
    pub name: &'static str,
    pub weight: i32,
    matcher: Matcher,
}

impl std::fmt::Debug for ScoringRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoringRule")
            .field("name", &self.name)
            .field("weight", &self.weight)
            .finish()
    }
}

impl ScoringRule {
    /// Rule that applies when `pattern` matches anywhere in the line.
    ///
    /// Panics on an invalid pattern; rules are built from literals.
    pub fn pattern(name: &'static str, pattern: &str, weight: i32) -> Self {
        Self {
            name,
            weight,
            matcher: Matcher::Pattern(Regex::new(pattern).expect("invalid scoring rule pattern")),
        }
    }

    /// Rule that applies when `predicate` returns true for the line
    pub fn predicate(name: &'static str, predicate: fn(&str) -> bool, weight: i32) -> Self {
        Self {
            name,
            weight,
            matcher: Matcher::Predicate(predicate),
        }
    }

    pub fn applies(&self, line: &str) -> bool {
        match &self.matcher {
            Matcher::Pattern(re) => re.is_match(line),
            Matcher::Predicate(f) => f(line),
        }
    }
}

fn mostly_symbols(line: &str) -> bool {
    let visible: Vec<char> = line.chars().filter(|c| !c.is_whitespace()).collect();
    if visible.is_empty() {
        return true;
    }
    let alnum = visible.iter().filter(|c| c.is_alphanumeric()).count();
    (alnum as f64) / (visible.len() as f64) < 0.5
}

fn multi_word(line: &str) -> bool {
    line.split_whitespace().count() >= 4
}

fn long_line(line: &str) -> bool {
    line.chars().count() >= 30
}

/// Default rule set, tuned on screenshots of social media posts and articles
pub static DEFAULT_RULES: Lazy<Vec<ScoringRule>> = Lazy::new(|| {
    vec![
        // Noise
        ScoringRule::pattern(
            "engagement_count",
            r"(?i)\b\d+(?:[.,]\d+)?\s*[km]?\s*(?:likes?|comments?|shares?|views?|followers?|following|retweets?|reposts?|replies|reactions?)\b",
            -5,
        ),
        ScoringRule::pattern(
            "ui_verb",
            r"(?i)\b(?:follow|unfollow|share|manage|reply|subscribe|retweet|repost|like|see more|see translation|view all|log ?in|sign ?up|download|install|edit profile|message)\b",
            -3,
        ),
        ScoringRule::pattern("handle", r"(?:^|\s)@[A-Za-z0-9_.]{2,}", -4),
        ScoringRule::pattern(
            "url",
            r"(?i)(?:https?://|www\.)\S+|\b[a-z0-9-]+\.(?:com|net|org|io|co)\b",
            -4,
        ),
        ScoringRule::predicate("mostly_symbols", mostly_symbols, -5),
        // Content
        ScoringRule::predicate("multi_word", multi_word, 2),
        ScoringRule::predicate("long_line", long_line, 2),
        ScoringRule::pattern(
            "function_words",
            r"(?i)\b(?:the|and|of|to|in|is|are|was|were|for|with|that|this|it|on|as|be|by|at|from|have|has)\b",
            2,
        ),
        ScoringRule::pattern(
            "domain_keyword",
            r"(?i)\b(?:text|image|photo|document|page|chapter|note|recipe|invoice|receipt|total|date|name|address|report|article|quote)\b",
            1,
        ),
        ScoringRule::pattern("sentence", r#"^\p{Lu}.*[.!?]["')\]]?$"#, 3),
        ScoringRule::pattern("capitalized", r"^\p{Lu}", 1),
    ]
});

/// Sum the weights of every rule that applies to `line`
pub fn score_line(line: &str, rules: &[ScoringRule]) -> i32 {
    rules
        .iter()
        .filter(|rule| rule.applies(line))
        .map(|rule| rule.weight)
        .sum()
}

/// Detect recognizer output that is mostly decorative glyphs.
///
/// Garbled means fewer than three real words and either more than five weird
/// symbols or a non-word character ratio above 0.6.
pub fn is_garbled(text: &str) -> bool {
    let real_words = REAL_WORD.find_iter(text).count();
    if real_words >= GARBLED_MIN_REAL_WORDS {
        return false;
    }

    let visible: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
    if visible.is_empty() {
        return false;
    }

    let weird = visible
        .iter()
        .filter(|c| !c.is_alphanumeric() && !COMMON_PUNCTUATION.contains(c))
        .count();
    let non_word = visible
        .iter()
        .filter(|c| !c.is_alphanumeric() && **c != '_')
        .count();
    let ratio = non_word as f64 / visible.len() as f64;

    weird > GARBLED_MAX_WEIRD_SYMBOLS || ratio > GARBLED_MAX_SYMBOL_RATIO
}

/// Rule-based noise filter for recognized text
#[derive(Debug, Clone)]
pub struct TextFilter {
    rules: Vec<ScoringRule>,
    max_lines: usize,
}

impl Default for TextFilter {
    fn default() -> Self {
        Self::new(20)
    }
}

impl TextFilter {
    /// Filter using the default rules, keeping at most `max_lines`
    pub fn new(max_lines: usize) -> Self {
        Self {
            rules: DEFAULT_RULES.clone(),
            max_lines,
        }
    }

    /// Compact variant used for short previews
    pub fn compact() -> Self {
        Self::new(5)
    }

    /// Replace the rule set
    pub fn with_rules(mut self, rules: Vec<ScoringRule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn rules(&self) -> &[ScoringRule] {
        &self.rules
    }

    pub fn max_lines(&self) -> usize {
        self.max_lines
    }

    /// Clean up recognized text.
    ///
    /// Returns the fixed explanatory message for garbled input, the kept lines
    /// joined by newlines, or `None` when no line scores positive.
    pub fn apply(&self, raw: &str) -> Option<String> {
        if is_garbled(raw) {
            return Some(GARBLED_TEXT_MESSAGE.to_string());
        }

        let mut scored: Vec<(i32, &str)> = raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| (score_line(line, &self.rules), line))
            .filter(|(score, _)| *score > 0)
            .collect();

        // Stable sort keeps reading order among equal scores
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        let mut kept: Vec<&str> = Vec::new();
        for (_, line) in scored {
            if kept.len() >= self.max_lines {
                break;
            }
            if kept
                .iter()
                .any(|existing| similarity(existing, line) >= DUPLICATE_SIMILARITY)
            {
                continue;
            }
            kept.push(line);
        }

        if kept.is_empty() {
            None
        } else {
            Some(kept.join("\n"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule_names(line: &str) -> Vec<&'static str> {
        DEFAULT_RULES
            .iter()
            .filter(|r| r.applies(line))
            .map(|r| r.name)
            .collect()
    }

    #[test]
    fn test_engagement_and_ui_noise_score_negative() {
        assert!(score_line("12k likes", &DEFAULT_RULES) < 0);
        assert!(score_line("Follow", &DEFAULT_RULES) <= 0);
        assert!(score_line("@someone_handle", &DEFAULT_RULES) < 0);
        assert!(score_line("www.example.com/path", &DEFAULT_RULES) < 0);
        assert!(rule_names("1.2K comments").contains(&"engagement_count"));
    }

    #[test]
    fn test_sentences_score_positive() {
        let line = "The committee approved the new budget for the library this week.";
        let names = rule_names(line);
        assert!(names.contains(&"sentence"));
        assert!(names.contains(&"function_words"));
        assert!(names.contains(&"multi_word"));
        assert!(score_line(line, &DEFAULT_RULES) > 5);
    }

    #[test]
    fn test_mostly_symbols_rule() {
        assert!(rule_names("~~ ** ## ==").contains(&"mostly_symbols"));
        assert!(!rule_names("Plain words here").contains(&"mostly_symbols"));
    }

    #[test]
    fn test_filter_drops_social_noise() {
        let raw = "john_doe\n@john_doe\nFollow\nThe weather in the mountains was cold and clear this morning.\n12k likes\n340 comments\nShare";
        let filtered = TextFilter::default().apply(raw).unwrap();
        assert_eq!(
            filtered,
            "The weather in the mountains was cold and clear this morning."
        );
    }

    #[test]
    fn test_filter_orders_by_score_and_caps_lines() {
        let raw = "Short Title\nThis is a complete sentence about the topic at hand.\nAnother line with the details of the report.\nOne more";
        let filtered = TextFilter::new(2).apply(raw).unwrap();
        let lines: Vec<&str> = filtered.lines().collect();
        assert_eq!(lines.len(), 2);
        // The domain keyword puts the report line ahead of the plain sentence
        assert_eq!(lines[0], "Another line with the details of the report.");
        assert_eq!(lines[1], "This is a complete sentence about the topic at hand.");
    }

    #[test]
    fn test_compact_variant_keeps_five_lines() {
        let raw = [
            "The harbor was quiet before the storm arrived.",
            "Farmers in the valley planted wheat this spring.",
            "Our team shipped the release on a Friday evening.",
            "A small bakery opened near the train station.",
            "Students gathered in the hall for the final exam.",
            "Rain is expected across the region on Sunday.",
            "The museum extended its opening hours for summer.",
            "Volunteers cleaned the riverbank over the weekend.",
            "Prices for fresh fruit rose sharply in March.",
            "The orchestra performed to a sold out audience.",
        ]
        .join("\n");
        let filtered = TextFilter::compact().apply(&raw).unwrap();
        assert_eq!(filtered.lines().count(), 5);
    }

    #[test]
    fn test_filter_drops_repeated_lines() {
        let raw = "The quick brown fox jumps over the lazy dog.\nThe quick brown fox jumps over the lazy dog!\nA different sentence with the other content.";
        let filtered = TextFilter::default().apply(raw).unwrap();
        assert_eq!(filtered.lines().count(), 2);
    }

    #[test]
    fn test_filter_returns_none_without_positive_lines() {
        assert_eq!(TextFilter::default().apply("like\nshare\n12 views"), None);
        assert_eq!(TextFilter::default().apply(""), None);
    }

    #[test]
    fn test_garbled_output_returns_fixed_message() {
        let raw = "~ ^^ ¤ §§ ¶ ** {} ||";
        assert!(is_garbled(raw));
        assert_eq!(
            TextFilter::default().apply(raw).as_deref(),
            Some(GARBLED_TEXT_MESSAGE)
        );
    }

    #[test]
    fn test_garbled_requires_few_real_words() {
        // Plenty of symbols, but enough real words to be worth filtering
        assert!(!is_garbled("Price list ~~ ** ^^ ++ == for today"));
        // High symbol ratio with only short tokens
        assert!(is_garbled("a. b, -- !! ?? ::"));
        assert!(!is_garbled("Hello World"));
        assert!(!is_garbled(""));
    }

    #[test]
    fn test_custom_rules_replace_defaults() {
        let filter = TextFilter::new(10).with_rules(vec![ScoringRule::pattern(
            "numbers",
            r"^\d+$",
            1,
        )]);
        assert_eq!(filter.rules().len(), 1);
        assert_eq!(filter.apply("abc\n42\nxyz").as_deref(), Some("42"));
    }
}
