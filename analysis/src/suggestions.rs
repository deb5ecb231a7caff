//! Functional (permissive) suggestion counting.

use regex::Regex;

use reverie_config::SuggestionRules;

use crate::text::{normalize, phrase_regex};

/// Counts every configured phrase on its own and sums the counts, so phrases
/// sharing words ("perhaps you can") each contribute.
#[derive(Debug, Clone)]
pub struct SuggestionCounter {
    phrases: Vec<Regex>,
}

impl SuggestionCounter {
    #[must_use]
    pub fn new(rules: &SuggestionRules) -> Self {
        Self {
            phrases: rules
                .phrases
                .iter()
                .filter(|phrase| !phrase.trim().is_empty())
                .map(|phrase| phrase_regex(phrase))
                .collect(),
        }
    }

    #[must_use]
    pub fn count(&self, text: &str) -> usize {
        let text = normalize(text);
        self.phrases
            .iter()
            .map(|regex| regex.find_iter(&text).count())
            .sum()
    }
}
