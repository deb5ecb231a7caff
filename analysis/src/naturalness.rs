//! Heuristic detection of robotic or ungrammatical phrasing.
//!
//! Three independent sub-checks, each producing at most one issue:
//! bare body nouns before a verb, hedging filler phrases, and abstract
//! plurals with nothing to anchor them.

use std::collections::HashSet;

use regex::Regex;

use reverie_config::NaturalnessRules;
use reverie_types::{GrammarIssue, GrammarIssueKind, GrammarReport, Severity};

use crate::NaturalnessStrategy;
use crate::text::{count_matches, normalize, term_set_regex, words};

/// Flag missing articles when bare nouns occur more often than this.
const MISSING_ARTICLE_LIMIT: usize = 2;
const AWKWARD_LIMIT: usize = 1;
const GENERIC_PLURAL_LIMIT: usize = 3;
/// How many tokens back a determiner may sit ("the whole body", "your own breath").
const DETERMINER_WINDOW: usize = 2;

#[derive(Debug, Clone)]
pub struct NaturalnessAnalyzer {
    nouns: HashSet<String>,
    verbs: HashSet<String>,
    determiners: HashSet<String>,
    plurals: HashSet<String>,
    awkward: Option<Regex>,
}

fn lowercase_set(terms: &[String]) -> HashSet<String> {
    terms.iter().map(|term| term.trim().to_lowercase()).collect()
}

impl NaturalnessAnalyzer {
    #[must_use]
    pub fn new(rules: &NaturalnessRules) -> Self {
        Self {
            nouns: lowercase_set(&rules.article_nouns),
            verbs: lowercase_set(&rules.verbs),
            determiners: lowercase_set(&rules.determiners),
            plurals: lowercase_set(&rules.generic_plurals),
            awkward: term_set_regex(&rules.awkward_phrases),
        }
    }

    #[must_use]
    pub fn analyze(&self, text: &str) -> GrammarReport {
        if text.trim().is_empty() {
            return GrammarReport::from_issues(Vec::new());
        }
        let text = normalize(text);

        let mut bare_nouns = 0;
        let mut bare_plurals = 0;
        for clause in clauses(&text) {
            let tokens = words(clause);
            bare_nouns += self.count_bare_nouns(&tokens);
            bare_plurals += self.count_bare_plurals(&tokens);
        }
        let awkward = count_matches(self.awkward.as_ref(), &text);

        let mut issues = Vec::new();
        if bare_nouns > MISSING_ARTICLE_LIMIT {
            issues.push(GrammarIssue {
                kind: GrammarIssueKind::MissingArticles,
                severity: Severity::Major,
                description: format!(
                    "{bare_nouns} body or sensation nouns used without an article before a verb (e.g. \"chest rises\" instead of \"your chest rises\")"
                ),
                count: bare_nouns,
            });
        }
        if awkward > AWKWARD_LIMIT {
            issues.push(GrammarIssue {
                kind: GrammarIssueKind::AwkwardConstructions,
                severity: Severity::Major,
                description: format!(
                    "{awkward} hedging or filler constructions (\"seems to be\", \"kind of\", \"sort of\")"
                ),
                count: awkward,
            });
        }
        if bare_plurals > GENERIC_PLURAL_LIMIT {
            issues.push(GrammarIssue {
                kind: GrammarIssueKind::GenericPlurals,
                severity: Severity::High,
                description: format!(
                    "{bare_plurals} abstract plurals without a determiner (e.g. \"sensations\" instead of \"these sensations\")"
                ),
                count: bare_plurals,
            });
        }

        let report = GrammarReport::from_issues(issues);
        tracing::debug!(
            score = report.score,
            bare_nouns,
            awkward,
            bare_plurals,
            "Naturalness analysis"
        );
        report
    }

    fn is_anchored(&self, tokens: &[String], index: usize) -> bool {
        tokens[index.saturating_sub(DETERMINER_WINDOW)..index]
            .iter()
            .any(|token| self.determiners.contains(token) || is_possessive(token))
    }

    fn count_bare_nouns(&self, tokens: &[String]) -> usize {
        tokens
            .windows(2)
            .enumerate()
            .filter(|(index, pair)| {
                self.nouns.contains(&pair[0])
                    && self.verbs.contains(&pair[1])
                    && !self.is_anchored(tokens, *index)
            })
            .count()
    }

    fn count_bare_plurals(&self, tokens: &[String]) -> usize {
        tokens
            .iter()
            .enumerate()
            .filter(|(index, token)| self.plurals.contains(*token) && !self.is_anchored(tokens, *index))
            .count()
    }
}

/// Sentence-like spans; a determiner never reaches across one of these breaks.
fn clauses(text: &str) -> impl Iterator<Item = &str> {
    text.split(['.', '!', '?', ';', ':', '\n'])
        .map(str::trim)
        .filter(|clause| !clause.is_empty())
}

fn is_possessive(token: &str) -> bool {
    token.len() > 2 && token.ends_with("'s")
}

impl NaturalnessStrategy for NaturalnessAnalyzer {
    fn analyze(&self, text: &str) -> GrammarReport {
        NaturalnessAnalyzer::analyze(self, text)
    }
}
