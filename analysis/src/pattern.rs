//! Phrase-repetition scoring ("diversity").

use regex::Regex;

use reverie_config::DiversityRules;
use reverie_types::{OverusedPattern, PatternAnalysis};

use crate::DiversityStrategy;
use crate::text::{normalize, phrase_regex, sentences};

const REWRITE_PENALTY: i64 = 16;
/// A single phrase counted more often than this triggers the extreme penalty.
const EXTREME_COUNT: usize = 50;
const EXTREME_PENALTY_CAP: i64 = 50;
/// Flagged occurrences beyond this many start costing volume penalty.
const VOLUME_ALLOWANCE: usize = 3;
const VOLUME_PENALTY_STEP: i64 = 2;
const VOLUME_PENALTY_CAP: i64 = 20;

#[derive(Debug, Clone)]
struct CompiledPhrase {
    phrase: String,
    threshold: usize,
    alternatives: Vec<String>,
    regex: Regex,
}

/// Counts each configured phrase across the whole text and scores repetition.
#[derive(Debug, Clone)]
pub struct PatternAnalyzer {
    phrases: Vec<CompiledPhrase>,
}

impl PatternAnalyzer {
    #[must_use]
    pub fn new(rules: &DiversityRules) -> Self {
        let phrases = rules
            .phrases
            .iter()
            .map(|rule| CompiledPhrase {
                phrase: rule.phrase.clone(),
                threshold: rule.threshold,
                alternatives: rule.alternatives.clone(),
                regex: phrase_regex(&rule.phrase),
            })
            .collect();
        Self { phrases }
    }

    #[must_use]
    pub fn analyze(&self, text: &str) -> PatternAnalysis {
        if text.trim().is_empty() {
            return PatternAnalysis::perfect();
        }
        let text = normalize(text);

        let mut overused: Vec<OverusedPattern> = self
            .phrases
            .iter()
            .filter_map(|compiled| {
                let count = compiled.regex.find_iter(&text).count();
                (count > 0).then(|| OverusedPattern {
                    pattern: compiled.phrase.clone(),
                    count,
                    threshold: compiled.threshold,
                    needs_rewrite: count >= compiled.threshold,
                    alternatives: compiled.alternatives.clone(),
                })
            })
            .collect();
        overused.sort_by(|a, b| b.count.cmp(&a.count));

        let diversity_score = score(&overused);
        tracing::debug!(
            patterns = overused.len(),
            flagged = overused.iter().filter(|p| p.needs_rewrite).count(),
            diversity_score,
            "Pattern analysis"
        );

        PatternAnalysis {
            overused_patterns: overused,
            total_sentences: sentences(&text).len(),
            diversity_score,
        }
    }
}

fn score(patterns: &[OverusedPattern]) -> u8 {
    let flagged: Vec<&OverusedPattern> = patterns.iter().filter(|p| p.needs_rewrite).collect();
    let mut score: i64 = 100 - REWRITE_PENALTY * flagged.len() as i64;

    let max_count = patterns.iter().map(|p| p.count).max().unwrap_or(0);
    if max_count > EXTREME_COUNT {
        score -= EXTREME_PENALTY_CAP.min((max_count / 2) as i64);
    }

    let flagged_total: usize = flagged.iter().map(|p| p.count).sum();
    if flagged_total > VOLUME_ALLOWANCE {
        score -= VOLUME_PENALTY_CAP.min((flagged_total - VOLUME_ALLOWANCE) as i64 * VOLUME_PENALTY_STEP);
    }

    score.clamp(0, 100) as u8
}

impl DiversityStrategy for PatternAnalyzer {
    fn analyze(&self, text: &str) -> PatternAnalysis {
        PatternAnalyzer::analyze(self, text)
    }
}
