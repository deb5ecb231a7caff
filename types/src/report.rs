//! Analyzer outputs and the Quality Guard report.
//!
//! A failing check is data (`passed: false`), never an error.

use std::fmt;

use serde::{Deserialize, Serialize};

/// `GrammarReport::is_natural` holds iff the score reaches this value.
pub const NATURAL_THRESHOLD: u8 = 70;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverusedPattern {
    pub pattern: String,
    pub count: usize,
    pub threshold: usize,
    pub needs_rewrite: bool,
    /// Suggested substitutes, carried from the rule table.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternAnalysis {
    pub overused_patterns: Vec<OverusedPattern>,
    pub total_sentences: usize,
    pub diversity_score: u8,
}

impl PatternAnalysis {
    /// The result for text with nothing to flag.
    #[must_use]
    pub fn perfect() -> Self {
        Self {
            overused_patterns: Vec::new(),
            total_sentences: 0,
            diversity_score: 100,
        }
    }

    pub fn needing_rewrite(&self) -> impl Iterator<Item = &OverusedPattern> {
        self.overused_patterns.iter().filter(|p| p.needs_rewrite)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrammarIssueKind {
    MissingArticles,
    AwkwardConstructions,
    GenericPlurals,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Major,
    High,
}

impl Severity {
    /// Points removed from the naturalness score for one issue of this severity.
    #[must_use]
    pub const fn deduction(self) -> u8 {
        match self {
            Severity::Major => 35,
            Severity::High => 25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrammarIssue {
    #[serde(rename = "type")]
    pub kind: GrammarIssueKind,
    pub severity: Severity,
    pub description: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrammarReport {
    pub score: u8,
    pub issues: Vec<GrammarIssue>,
    pub is_natural: bool,
}

impl GrammarReport {
    /// Score the issues: 100 minus each issue's deduction, floored at 0.
    #[must_use]
    pub fn from_issues(issues: Vec<GrammarIssue>) -> Self {
        let deducted: u32 = issues
            .iter()
            .map(|issue| u32::from(issue.severity.deduction()))
            .sum();
        let score = 100u32.saturating_sub(deducted) as u8;
        Self {
            score,
            is_natural: score >= NATURAL_THRESHOLD,
            issues,
        }
    }
}

/// The rules the Quality Guard evaluates, in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    EmergenceMatch,
    FunctionalSuggestions,
    WordCount,
    NaturalGrammar,
    SentenceVariety,
    MetaphorFrequency,
    MetaphorConsistency,
}

impl CheckKind {
    pub const ALL: [CheckKind; 7] = [
        CheckKind::EmergenceMatch,
        CheckKind::FunctionalSuggestions,
        CheckKind::WordCount,
        CheckKind::NaturalGrammar,
        CheckKind::SentenceVariety,
        CheckKind::MetaphorFrequency,
        CheckKind::MetaphorConsistency,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            CheckKind::EmergenceMatch => "emergence_match",
            CheckKind::FunctionalSuggestions => "functional_suggestions",
            CheckKind::WordCount => "word_count",
            CheckKind::NaturalGrammar => "natural_grammar",
            CheckKind::SentenceVariety => "sentence_variety",
            CheckKind::MetaphorFrequency => "metaphor_frequency",
            CheckKind::MetaphorConsistency => "metaphor_consistency",
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityCheck {
    #[serde(rename = "name")]
    pub kind: CheckKind,
    pub passed: bool,
    pub details: String,
}

impl QualityCheck {
    #[must_use]
    pub fn new(kind: CheckKind, passed: bool, details: impl Into<String>) -> Self {
        Self {
            kind,
            passed,
            details: details.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityReport {
    pub passed: bool,
    pub score: u8,
    pub checks: Vec<QualityCheck>,
    pub final_script: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polish_message: Option<String>,
    /// Advisory only; diversity is not one of the scored checks.
    pub diversity: PatternAnalysis,
    pub rules_version: String,
}

impl QualityReport {
    /// `round(100 * passed / total)`; an empty check list scores 100.
    #[must_use]
    pub fn aggregate_score(checks: &[QualityCheck]) -> u8 {
        if checks.is_empty() {
            return 100;
        }
        let passed = checks.iter().filter(|check| check.passed).count();
        ((passed as f64 * 100.0) / checks.len() as f64).round() as u8
    }

    pub fn failed_checks(&self) -> impl Iterator<Item = &QualityCheck> {
        self.checks.iter().filter(|check| !check.passed)
    }

    #[must_use]
    pub fn check(&self, kind: CheckKind) -> Option<&QualityCheck> {
        self.checks.iter().find(|check| check.kind == kind)
    }
}
