/// Tokenization shared by the keyword signal, the graph signal and the hashing embedder.
///
/// Lowercase, split on anything that is not alphanumeric, drop stopwords and
/// single-character tokens, then fold simple plurals so "costs" matches "cost".

use std::collections::HashSet;

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "can", "do", "does", "for", "from",
    "has", "have", "how", "i", "if", "in", "into", "is", "it", "its", "me", "my", "of",
    "on", "or", "our", "so", "that", "the", "their", "them", "then", "there", "these",
    "this", "to", "us", "was", "we", "what", "when", "where", "which", "who", "why",
    "will", "with", "you", "your",
];

fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(&token)
}

fn fold_plural(token: &str) -> String {
    if token.len() > 4 && token.ends_with("ies") {
        format!("{}y", &token[..token.len() - 3])
    } else if token.len() > 3 && token.ends_with('s') && !token.ends_with("ss") {
        token[..token.len() - 1].to_string()
    } else {
        token.to_string()
    }
}

/// Split text into normalized index terms, preserving order and duplicates.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() > 1 && !is_stopword(t))
        .map(fold_plural)
        .collect()
}

/// Distinct normalized terms of `text`.
pub fn term_set(text: &str) -> HashSet<String> {
    tokenize(text).into_iter().collect()
}
