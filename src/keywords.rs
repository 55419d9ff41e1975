//! Query keyword extraction.

/// Characters stripped from both ends of every token.
const PUNCTUATION: &[char] = &[
    '.', ',', '!', '?', ';', ':', '(', ')', '[', ']', '{', '}', '"', '\'', '-',
];

/// Function words ignored when matching, in Chinese and English.
const STOP_WORDS: &[&str] = &[
    "的", "是", "在", "有", "和", "与", "或", "但", "然后", "如何", "什么", "怎么", "怎样",
    "how", "to", "what", "is", "are", "the", "a", "an", "and", "or", "but", "then",
];

/// Split a query into lowercase keywords.
///
/// Tokens are whitespace-separated, trimmed of surrounding punctuation, and
/// dropped when shorter than two characters or on the stop-word list.
/// Order is preserved and duplicates are kept.
pub fn extract_keywords(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(|word| word.trim_matches(PUNCTUATION))
        .filter(|word| word.chars().count() >= 2)
        .map(|word| word.to_lowercase())
        .filter(|word| !STOP_WORDS.contains(&word.as_str()))
        .collect()
}
