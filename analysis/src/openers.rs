//! Sentence-opener distribution for the variety check.

use std::collections::HashMap;

use crate::text::{normalize, sentences, words};

/// Number of leading words that make up an opener.
pub const OPENER_WORDS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opener {
    pub words: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenerProfile {
    pub total_sentences: usize,
    /// The most repeated opener, present only when some opener occurs at least twice.
    pub most_common: Option<Opener>,
}

impl OpenerProfile {
    #[must_use]
    pub fn of(text: &str) -> Self {
        let text = normalize(text);
        let sentences = sentences(&text);
        let mut counts: HashMap<String, usize> = HashMap::new();
        let mut first_seen: Vec<String> = Vec::new();

        for sentence in &sentences {
            let tokens = words(sentence);
            if tokens.len() < OPENER_WORDS {
                continue;
            }
            let opener = tokens[..OPENER_WORDS].join(" ");
            let count = counts.entry(opener.clone()).or_insert(0);
            if *count == 0 {
                first_seen.push(opener);
            }
            *count += 1;
        }

        // Iterate in first-seen order so ties resolve deterministically.
        let most_common = first_seen
            .into_iter()
            .filter_map(|opener| {
                let count = counts.get(&opener).copied().unwrap_or(0);
                (count >= 2).then_some(Opener {
                    words: opener,
                    count,
                })
            })
            .fold(None, |best: Option<Opener>, candidate| match best {
                Some(current) if current.count >= candidate.count => Some(current),
                _ => Some(candidate),
            });

        Self {
            total_sentences: sentences.len(),
            most_common,
        }
    }

    /// Share of sentences starting with the most common opener.
    #[must_use]
    pub fn top_share(&self) -> f64 {
        match &self.most_common {
            Some(opener) if self.total_sentences > 0 => {
                opener.count as f64 / self.total_sentences as f64
            }
            _ => 0.0,
        }
    }
}
