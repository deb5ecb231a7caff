//! Shared text segmentation and phrase-matching helpers.

use std::borrow::Cow;

use regex::Regex;

/// Fragments this short or shorter are not counted as sentences.
pub const MIN_SENTENCE_CHARS: usize = 10;

/// Fold typographic apostrophes so rule phrases like "it's" match either form.
#[must_use]
pub fn normalize(text: &str) -> Cow<'_, str> {
    if text.contains('\u{2019}') {
        Cow::Owned(text.replace('\u{2019}', "'"))
    } else {
        Cow::Borrowed(text)
    }
}

/// Split on `.`, `!` and `?`, trim, and drop fragments of `MIN_SENTENCE_CHARS` or fewer.
#[must_use]
pub fn sentences(text: &str) -> Vec<&str> {
    text.split(['.', '!', '?'])
        .map(str::trim)
        .filter(|fragment| fragment.chars().count() > MIN_SENTENCE_CHARS)
        .collect()
}

/// Whitespace-separated tokens that contain at least one letter or digit.
#[must_use]
pub fn word_count(text: &str) -> usize {
    text.split_whitespace()
        .filter(|token| token.chars().any(char::is_alphanumeric))
        .count()
}

/// Lowercased word tokens (letters and apostrophes) of a sentence or clause.
#[must_use]
pub fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphabetic() || c == '\''))
        .map(|token| token.trim_matches('\''))
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn phrase_pattern(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"\s+")
}

/// Case-insensitive, whole-word regex for a single phrase.
#[must_use]
pub fn phrase_regex(phrase: &str) -> Regex {
    Regex::new(&format!(r"(?i)\b{}\b", phrase_pattern(phrase)))
        .expect("escaped phrase is a valid regex")
}

/// Case-insensitive, whole-word alternation over `terms`. `None` when `terms` is empty.
///
/// Longer terms are tried first so "warm light" wins over "light".
#[must_use]
pub fn term_set_regex<S: AsRef<str>>(terms: &[S]) -> Option<Regex> {
    let mut patterns: Vec<String> = terms
        .iter()
        .map(AsRef::as_ref)
        .filter(|term| !term.trim().is_empty())
        .map(phrase_pattern)
        .collect();
    if patterns.is_empty() {
        return None;
    }
    patterns.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    patterns.dedup();
    let alternation = patterns.join("|");
    Some(Regex::new(&format!(r"(?i)\b(?:{alternation})\b")).expect("escaped terms form a valid regex"))
}

/// Non-overlapping match count, zero when there is no regex.
#[must_use]
pub fn count_matches(regex: Option<&Regex>, text: &str) -> usize {
    regex.map_or(0, |re| re.find_iter(text).count())
}
