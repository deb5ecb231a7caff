//! Deterministic linguistic-quality analyzers.
//!
//! Everything here is synchronous and side-effect free. Analyzers compile
//! their rule tables once at construction and are `Send + Sync`, so a single
//! [`Analyzers`] bundle can score any number of texts concurrently.
//!
//! Heuristics that are inherently approximate (phrase repetition, grammar,
//! emergence language, metaphor families) sit behind strategy traits so a
//! deployment can swap one without touching the Quality Guard.

mod emergence;
mod metaphor;
mod naturalness;
mod openers;
mod pattern;
mod suggestions;
pub mod text;

pub use emergence::{EmergenceSignals, LexicalEmergence};
pub use metaphor::{FamilyCount, FamilyLexicon, MetaphorProfile};
pub use naturalness::NaturalnessAnalyzer;
pub use openers::{OPENER_WORDS, Opener, OpenerProfile};
pub use pattern::PatternAnalyzer;
pub use suggestions::SuggestionCounter;

use reverie_config::RuleSet;
use reverie_types::{GrammarReport, PatternAnalysis};

/// Scores phrase repetition.
pub trait DiversityStrategy: Send + Sync {
    fn analyze(&self, text: &str) -> PatternAnalysis;
}

/// Scores robotic or ungrammatical phrasing.
pub trait NaturalnessStrategy: Send + Sync {
    fn analyze(&self, text: &str) -> GrammarReport;
}

/// Detects sleep and alertness language.
pub trait EmergenceStrategy: Send + Sync {
    fn detect(&self, text: &str) -> EmergenceSignals;
}

/// Groups metaphor vocabulary into families.
pub trait MetaphorStrategy: Send + Sync {
    fn profile(&self, text: &str) -> MetaphorProfile;
}

/// The full analyzer set used by the Quality Guard.
pub struct Analyzers {
    pub diversity: Box<dyn DiversityStrategy>,
    pub naturalness: Box<dyn NaturalnessStrategy>,
    pub emergence: Box<dyn EmergenceStrategy>,
    pub metaphor: Box<dyn MetaphorStrategy>,
    pub suggestions: SuggestionCounter,
}

impl Analyzers {
    /// Lexical analyzers compiled from `rules`.
    #[must_use]
    pub fn from_rules(rules: &RuleSet) -> Self {
        Self {
            diversity: Box::new(PatternAnalyzer::new(&rules.diversity)),
            naturalness: Box::new(NaturalnessAnalyzer::new(&rules.naturalness)),
            emergence: Box::new(LexicalEmergence::new(&rules.emergence)),
            metaphor: Box::new(FamilyLexicon::new(&rules.metaphors)),
            suggestions: SuggestionCounter::new(&rules.suggestions),
        }
    }

    pub fn with_diversity(mut self, strategy: impl DiversityStrategy + 'static) -> Self {
        self.diversity = Box::new(strategy);
        self
    }

    pub fn with_naturalness(mut self, strategy: impl NaturalnessStrategy + 'static) -> Self {
        self.naturalness = Box::new(strategy);
        self
    }

    pub fn with_emergence(mut self, strategy: impl EmergenceStrategy + 'static) -> Self {
        self.emergence = Box::new(strategy);
        self
    }

    pub fn with_metaphor(mut self, strategy: impl MetaphorStrategy + 'static) -> Self {
        self.metaphor = Box::new(strategy);
        self
    }
}

impl std::fmt::Debug for Analyzers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzers").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysAlert;

    impl EmergenceStrategy for AlwaysAlert {
        fn detect(&self, _text: &str) -> EmergenceSignals {
            EmergenceSignals {
                sleep_mentions: 0,
                alert_mentions: 1,
                first_alert: Some("alert".to_string()),
            }
        }
    }

    #[test]
    fn strategies_are_swappable() {
        let analyzers = Analyzers::from_rules(RuleSet::builtin()).with_emergence(AlwaysAlert);
        let signals = analyzers.emergence.detect("nothing here");
        assert_eq!(signals.alert_mentions, 1);
    }

    #[test]
    fn analyzers_are_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Analyzers>();
    }

    #[test]
    fn trait_objects_match_inherent_results() {
        let rules = RuleSet::builtin();
        let analyzers = Analyzers::from_rules(rules);
        let text = "Your chest rises. You might rest. You might drift.";
        assert_eq!(
            analyzers.diversity.analyze(text),
            PatternAnalyzer::new(&rules.diversity).analyze(text)
        );
        assert_eq!(
            analyzers.naturalness.analyze(text),
            NaturalnessAnalyzer::new(&rules.naturalness).analyze(text)
        );
    }
}
