//! Emergence-language detection.

use regex::Regex;

use reverie_config::EmergenceRules;
use reverie_types::EmergenceType;

use crate::EmergenceStrategy;
use crate::text::{normalize, term_set_regex};

/// What closing language a text contains.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmergenceSignals {
    pub sleep_mentions: usize,
    pub alert_mentions: usize,
    /// First alertness phrase found, lowercased, for report details.
    pub first_alert: Option<String>,
}

impl EmergenceSignals {
    /// Sleep mode needs sleep language and no alertness language; regular mode
    /// needs alertness language.
    #[must_use]
    pub fn matches(&self, emergence: EmergenceType) -> bool {
        match emergence {
            EmergenceType::Sleep => self.sleep_mentions > 0 && self.alert_mentions == 0,
            EmergenceType::Regular => self.alert_mentions > 0,
        }
    }

    /// Human-readable reason for the emergence check result.
    #[must_use]
    pub fn describe(&self, emergence: EmergenceType) -> String {
        match emergence {
            EmergenceType::Sleep => {
                let mut problems = Vec::new();
                if self.sleep_mentions == 0 {
                    problems.push("no sleep-transition language".to_string());
                }
                if self.alert_mentions > 0 {
                    let example = self.first_alert.as_deref().unwrap_or("alertness");
                    problems.push(format!(
                        "{} awakening phrase(s) such as \"{example}\" in a sleep script",
                        self.alert_mentions
                    ));
                }
                if problems.is_empty() {
                    format!(
                        "{} sleep-transition phrase(s), no awakening language",
                        self.sleep_mentions
                    )
                } else {
                    problems.join("; ")
                }
            }
            EmergenceType::Regular => {
                if self.alert_mentions > 0 {
                    format!("{} awakening phrase(s)", self.alert_mentions)
                } else {
                    "no awakening language to bring the listener back".to_string()
                }
            }
        }
    }
}

/// Term-list detector built from `[emergence]` rules.
#[derive(Debug, Clone)]
pub struct LexicalEmergence {
    sleep: Option<Regex>,
    alert: Option<Regex>,
}

impl LexicalEmergence {
    #[must_use]
    pub fn new(rules: &EmergenceRules) -> Self {
        Self {
            sleep: term_set_regex(&rules.sleep_terms),
            alert: term_set_regex(&rules.alert_terms),
        }
    }
}

impl EmergenceStrategy for LexicalEmergence {
    fn detect(&self, text: &str) -> EmergenceSignals {
        let text = normalize(text);
        let sleep_mentions = self
            .sleep
            .as_ref()
            .map_or(0, |re| re.find_iter(&text).count());

        let mut alert_mentions = 0;
        let mut first_alert = None;
        if let Some(re) = &self.alert {
            for found in re.find_iter(&text) {
                if first_alert.is_none() {
                    first_alert = Some(found.as_str().to_lowercase());
                }
                alert_mentions += 1;
            }
        }

        EmergenceSignals {
            sleep_mentions,
            alert_mentions,
            first_alert,
        }
    }
}

#[cfg(test)]
mod tests {
    use reverie_config::RuleSet;

    use super::*;

    fn detector() -> LexicalEmergence {
        LexicalEmergence::new(&RuleSet::builtin().emergence)
    }

    #[test]
    fn sleep_text_matches_sleep_mode() {
        let signals = detector().detect("Let yourself drift off into a deep and easy sleep.");
        assert!(signals.matches(EmergenceType::Sleep));
        assert!(!signals.matches(EmergenceType::Regular));
    }

    #[test]
    fn alert_language_breaks_sleep_mode_even_with_sleep_terms() {
        let detector = detector();
        for text in [
            "Drift into sleep, then feel wide awake.",
            "As you fall asleep you feel energized.",
        ] {
            let signals = detector.detect(text);
            assert!(signals.sleep_mentions > 0);
            assert!(!signals.matches(EmergenceType::Sleep), "{text}");
            assert!(
                signals.describe(EmergenceType::Sleep).contains("awakening"),
                "{text}"
            );
        }
    }

    #[test]
    fn regular_mode_needs_awakening() {
        let detector = detector();
        let alert = detector.detect("I will count up from one to five. Open your eyes, wide awake.");
        assert!(alert.matches(EmergenceType::Regular));
        assert_eq!(alert.first_alert.as_deref(), Some("count up"));

        let flat = detector.detect("Rest here quietly.");
        assert!(!flat.matches(EmergenceType::Regular));
        assert!(flat.describe(EmergenceType::Regular).starts_with("no awakening"));
    }

    #[test]
    fn sleep_mode_without_sleep_terms_fails() {
        let signals = detector().detect("Rest here quietly.");
        assert!(!signals.matches(EmergenceType::Sleep));
        assert_eq!(
            signals.describe(EmergenceType::Sleep),
            "no sleep-transition language"
        );
    }
}
