//! Quality Guard: score a script, repair it at most once, rescore.
//!
//! ```text
//! Scoring -> Passed
//!         -> Failed                       (retry not allowed)
//!         -> Repairing -> Rescoring -> Passed | Failed
//!                     -> Failed           (repair call errored; original report)
//! ```
//!
//! There is never a second repair call.

use std::fmt::Write as _;

use reverie_analysis::{Analyzers, OpenerProfile, text::word_count};
use reverie_config::{QualityThresholds, RuleSet};
use reverie_providers::{GenerationRequest, Generator, unwrap_text};
use reverie_types::{CheckKind, EmergenceType, PatternAnalysis, QualityCheck, QualityReport};

use crate::orchestrator::rewrite_guidance;

const REPAIR_SYSTEM_PROMPT: &str = "You are a careful editor of guided relaxation scripts. \
Make minimal, surgical edits that fix only the listed problems. Preserve everything else \
word for word: structure, imagery, pacing and length. Return only the full revised script.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Scoring,
    Passed,
    Repairing,
    Rescoring,
    Failed,
}

impl GuardState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scoring => "scoring",
            Self::Passed => "passed",
            Self::Repairing => "repairing",
            Self::Rescoring => "rescoring",
            Self::Failed => "failed",
        }
    }
}

fn enter(state: GuardState) {
    tracing::info!(state = state.as_str(), "Quality guard");
}

/// One script review.
#[derive(Debug, Clone, Copy)]
pub struct Review<'s> {
    pub script: &'s str,
    pub target_words: u32,
    pub emergence: EmergenceType,
    /// Whether a failing script may get its single repair call.
    pub allow_retry: bool,
}

impl<'s> Review<'s> {
    #[must_use]
    pub fn new(script: &'s str, target_words: u32, emergence: EmergenceType) -> Self {
        Self {
            script,
            target_words,
            emergence,
            allow_retry: true,
        }
    }

    pub fn allow_retry(mut self, allow: bool) -> Self {
        self.allow_retry = allow;
        self
    }
}

pub struct QualityGuard<'r> {
    rules: &'r RuleSet,
    analyzers: Analyzers,
    max_output_tokens: u32,
}

impl std::fmt::Debug for QualityGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QualityGuard")
            .field("rules_version", &self.rules.version)
            .field("max_output_tokens", &self.max_output_tokens)
            .finish_non_exhaustive()
    }
}

impl<'r> QualityGuard<'r> {
    #[must_use]
    pub fn new(rules: &'r RuleSet, max_output_tokens: u32) -> Self {
        Self::with_analyzers(rules, Analyzers::from_rules(rules), max_output_tokens)
    }

    #[must_use]
    pub fn with_analyzers(rules: &'r RuleSet, analyzers: Analyzers, max_output_tokens: u32) -> Self {
        Self {
            rules,
            analyzers,
            max_output_tokens,
        }
    }

    /// Phrase-repetition analysis alone; not one of the scored checks.
    #[must_use]
    pub fn diversity(&self, script: &str) -> PatternAnalysis {
        self.analyzers.diversity.analyze(script)
    }

    /// Run every check against `script`. Pure; never calls the collaborator.
    #[must_use]
    pub fn score(&self, script: &str, target_words: u32, emergence: EmergenceType) -> QualityReport {
        let quality = &self.rules.quality;
        let words = word_count(script);
        let suggestions = self.analyzers.suggestions.count(script);

        let checks = vec![
            self.emergence_check(script, emergence),
            self.suggestion_check(suggestions),
            self.word_count_check(words, target_words, suggestions),
            self.grammar_check(script),
            variety_check(script, quality),
            self.metaphor_frequency_check(script, words),
            self.metaphor_consistency_check(script),
        ];
        debug_assert_eq!(checks.len(), CheckKind::ALL.len());

        let passed = checks.iter().all(|check| check.passed);
        QualityReport {
            passed,
            score: QualityReport::aggregate_score(&checks),
            checks,
            final_script: script.to_string(),
            polish_message: None,
            diversity: self.diversity(script),
            rules_version: self.rules.version.clone(),
        }
    }

    /// Score, and if needed and allowed, repair once and rescore.
    ///
    /// A failed repair call is logged and the original report returned.
    pub async fn review(&self, review: Review<'_>, generator: &dyn Generator) -> QualityReport {
        enter(GuardState::Scoring);
        let initial = self.score(review.script, review.target_words, review.emergence);
        tracing::info!(
            score = initial.score,
            failed_checks = ?failed_names(&initial),
            "Scored script"
        );

        if initial.passed {
            enter(GuardState::Passed);
            return initial;
        }
        if !review.allow_retry {
            enter(GuardState::Failed);
            return initial;
        }

        enter(GuardState::Repairing);
        let prompt = repair_prompt(&initial);
        let request = GenerationRequest::new(REPAIR_SYSTEM_PROMPT, &prompt, self.max_output_tokens);
        let repaired = match generator.generate(request).await {
            Ok(raw) => unwrap_text(&raw).map_err(|err| err.to_string()),
            Err(err) => Err(err.to_string()),
        };
        let repaired = match repaired {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(error = %err, "Repair call failed; keeping the original result");
                enter(GuardState::Failed);
                return initial;
            }
        };

        enter(GuardState::Rescoring);
        let mut rescored = self.score(&repaired, review.target_words, review.emergence);
        rescored.polish_message = Some(polish_message(&initial, &rescored));
        enter(if rescored.passed {
            GuardState::Passed
        } else {
            GuardState::Failed
        });
        rescored
    }

    fn emergence_check(&self, script: &str, emergence: EmergenceType) -> QualityCheck {
        let signals = self.analyzers.emergence.detect(script);
        QualityCheck::new(
            CheckKind::EmergenceMatch,
            signals.matches(emergence),
            format!("{emergence} emergence: {}", signals.describe(emergence)),
        )
    }

    fn suggestion_check(&self, count: usize) -> QualityCheck {
        let minimum = self.rules.suggestions.minimum;
        QualityCheck::new(
            CheckKind::FunctionalSuggestions,
            count >= minimum,
            format!("{count} functional suggestions (minimum {minimum})"),
        )
    }

    fn word_count_check(&self, words: usize, target: u32, suggestions: usize) -> QualityCheck {
        let tolerance = self.rules.quality.word_count_tolerance;
        let leniency = self.rules.suggestions.leniency_threshold;
        // Slack absorbs float error so 15% of 100 is exactly 15 words.
        let slack = (f64::from(target) * tolerance + 1e-9).floor();
        let within = (words as f64 - f64::from(target)).abs() <= slack;

        if !within && suggestions > leniency {
            return QualityCheck::new(
                CheckKind::WordCount,
                true,
                format!(
                    "{words} words against a target of {target}; waived because {suggestions} suggestions exceed {leniency}"
                ),
            );
        }
        let slack = slack as u64;
        QualityCheck::new(
            CheckKind::WordCount,
            within,
            format!(
                "{words} words against a target of {target} (allowed {}-{})",
                u64::from(target).saturating_sub(slack),
                u64::from(target) + slack
            ),
        )
    }

    fn grammar_check(&self, script: &str) -> QualityCheck {
        let report = self.analyzers.naturalness.analyze(script);
        let mut details = format!("naturalness {}/100", report.score);
        for issue in &report.issues {
            let _ = write!(details, "; {}", issue.description);
        }
        QualityCheck::new(CheckKind::NaturalGrammar, report.is_natural, details)
    }

    fn metaphor_frequency_check(&self, script: &str, words: usize) -> QualityCheck {
        let cap = self.rules.quality.metaphor_cap(words);
        let profile = self.analyzers.metaphor.profile(script);
        match profile.dominant() {
            None => QualityCheck::new(CheckKind::MetaphorFrequency, true, "no metaphor vocabulary"),
            Some(family) => QualityCheck::new(
                CheckKind::MetaphorFrequency,
                family.count <= cap,
                format!("dominant family '{}' used {} times (cap {cap})", family.name, family.count),
            ),
        }
    }

    fn metaphor_consistency_check(&self, script: &str) -> QualityCheck {
        let quality = &self.rules.quality;
        let profile = self.analyzers.metaphor.profile(script);
        let present: Vec<&str> = profile.present().map(|f| f.name.as_str()).collect();
        if present.is_empty() {
            return QualityCheck::new(CheckKind::MetaphorConsistency, true, "no metaphor vocabulary");
        }
        let share = profile.dominant_share();
        let passed = share >= quality.dominant_family_share || present.len() <= quality.max_mixed_families;
        QualityCheck::new(
            CheckKind::MetaphorConsistency,
            passed,
            format!(
                "{} families present ({}); dominant share {:.0}%",
                present.len(),
                present.join(", "),
                share * 100.0
            ),
        )
    }
}

fn variety_check(script: &str, quality: &QualityThresholds) -> QualityCheck {
    let profile = OpenerProfile::of(script);
    let share = profile.top_share();
    let passed = share <= quality.max_opener_share;
    let details = match &profile.most_common {
        Some(opener) => format!(
            "most common opener \"{}\" starts {} of {} sentences ({:.0}%, max {:.0}%)",
            opener.words,
            opener.count,
            profile.total_sentences,
            share * 100.0,
            quality.max_opener_share * 100.0
        ),
        None => format!("no repeated openers across {} sentences", profile.total_sentences),
    };
    QualityCheck::new(CheckKind::SentenceVariety, passed, details)
}

fn failed_names(report: &QualityReport) -> Vec<&'static str> {
    report.failed_checks().map(|check| check.kind.as_str()).collect()
}

fn repair_prompt(report: &QualityReport) -> String {
    let mut prompt = String::from("Fix only these failed checks:\n");
    for check in report.failed_checks() {
        let _ = writeln!(prompt, "- {}: {}", check.kind, check.details);
    }
    let guidance = rewrite_guidance(&report.diversity);
    if !guidance.is_empty() {
        prompt.push_str("\nWhile editing, also thin out these repeated phrases:\n");
        prompt.push_str(&guidance);
    }
    let _ = write!(prompt, "\nScript:\n---\n{}", report.final_script);
    prompt
}

fn polish_message(before: &QualityReport, after: &QualityReport) -> String {
    let delta = i32::from(after.score) - i32::from(before.score);
    let outcome = if after.passed {
        "all checks now pass".to_string()
    } else {
        format!("still failing: {}", failed_names(after).join(", "))
    };
    format!(
        "Automatic repair moved the score from {} to {} ({delta:+}); {outcome}.",
        before.score, after.score
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> QualityGuard<'static> {
        QualityGuard::new(RuleSet::builtin(), 4_000)
    }

    fn check(report: &QualityReport, kind: CheckKind) -> &QualityCheck {
        report.check(kind).unwrap()
    }

    #[test]
    fn emergence_mismatch_fails_sleep_script() {
        let report = guard().score(
            "Let yourself drift into sleep. Then open your eyes, wide awake and energized.",
            20,
            EmergenceType::Sleep,
        );
        assert!(!check(&report, CheckKind::EmergenceMatch).passed);
        assert!(!report.passed);
    }

    #[test]
    fn word_count_tolerance() {
        let guard = guard();
        let script = "word ".repeat(115);
        let report = guard.score(&script, 100, EmergenceType::Regular);
        assert!(check(&report, CheckKind::WordCount).passed);

        let script = "word ".repeat(116);
        let report = guard.score(&script, 100, EmergenceType::Regular);
        assert!(!check(&report, CheckKind::WordCount).passed);

        let script = "word ".repeat(84);
        let report = guard.score(&script, 100, EmergenceType::Regular);
        assert!(!check(&report, CheckKind::WordCount).passed);
    }

    #[test]
    fn dense_suggestions_waive_word_count() {
        let script = "you might ".repeat(1001);
        let report = guard().score(&script, 100, EmergenceType::Regular);
        let word_count = check(&report, CheckKind::WordCount);
        assert!(word_count.passed);
        assert!(word_count.details.contains("waived"));
        assert!(check(&report, CheckKind::FunctionalSuggestions).passed);
    }

    #[test]
    fn repeated_openers_fail_variety() {
        let script = "As you breathe, soften now. As you breathe, let go now. \
                      Feel the floor beneath you. Hear the sounds around you.";
        let report = guard().score(script, 30, EmergenceType::Regular);
        let variety = check(&report, CheckKind::SentenceVariety);
        assert!(!variety.passed);
        assert!(variety.details.contains("\"as you breathe\""));
    }

    #[test]
    fn metaphor_checks() {
        let guard = guard();
        let overused = "The garden. ".repeat(9);
        let report = guard.score(&overused, 20, EmergenceType::Regular);
        assert!(!check(&report, CheckKind::MetaphorFrequency).passed);
        assert!(check(&report, CheckKind::MetaphorConsistency).passed);

        let mixed = "A garden path by the river in the light.";
        let report = guard.score(mixed, 10, EmergenceType::Regular);
        assert!(check(&report, CheckKind::MetaphorFrequency).passed);
        assert!(!check(&report, CheckKind::MetaphorConsistency).passed);

        let none = "Breathe in and out slowly.";
        let report = guard.score(none, 5, EmergenceType::Regular);
        assert!(check(&report, CheckKind::MetaphorFrequency).passed);
        assert!(check(&report, CheckKind::MetaphorConsistency).passed);
    }

    #[test]
    fn report_carries_diversity_and_version() {
        let report = guard().score("You might rest.", 3, EmergenceType::Regular);
        assert_eq!(report.rules_version, RuleSet::builtin().version);
        assert_eq!(report.diversity.overused_patterns[0].pattern, "you might");
        assert_eq!(report.checks.len(), 7);
        assert!(report.polish_message.is_none());
    }

    #[test]
    fn repair_prompt_lists_only_failures() {
        let report = guard().score("Rest here quietly now.", 4, EmergenceType::Regular);
        let prompt = repair_prompt(&report);
        assert!(prompt.contains("- emergence_match:"));
        assert!(prompt.contains("- functional_suggestions:"));
        assert!(!prompt.contains("- word_count:"));
        assert!(prompt.ends_with("---\nRest here quietly now."));
    }

    #[test]
    fn polish_message_reports_delta() {
        let guard = guard();
        let before = guard.score("Rest.", 100, EmergenceType::Regular);
        let mut after = before.clone();
        after.score = before.score + 14;
        let message = polish_message(&before, &after);
        assert!(message.contains("(+14)"), "{message}");
        assert!(message.contains("still failing"));
    }

    #[test]
    fn openers_seen_once_never_fail_variety() {
        // Each opener is a third of the sentences, but none repeats.
        let script = "Feel the floor beneath you. Hear the sounds around you. Rest your hands softly now.";
        let report = guard().score(script, 15, EmergenceType::Regular);
        let variety = check(&report, CheckKind::SentenceVariety);
        assert!(variety.passed);
        assert_eq!(variety.details, "no repeated openers across 3 sentences");
    }
}
