//! Rule tables for the analyzers, the Quality Guard and the Directive Builder.
//!
//! A [`RuleSet`] is immutable configuration data. The built-in set is embedded
//! from `assets/default_rules.toml`; deployments that tune heuristics ship their
//! own file and bump `version` so reports say which tables scored them.

use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use reverie_types::ArcMetadata;

use crate::ConfigError;

const DEFAULT_RULES: &str = include_str!("../assets/default_rules.toml");

#[derive(Debug, Clone, Error, PartialEq)]
pub enum RuleSetError {
    #[error("rule set version must not be empty")]
    MissingVersion,
    #[error("{section}: empty phrase or term")]
    EmptyPhrase { section: &'static str },
    #[error("diversity phrase '{phrase}' has a zero threshold")]
    ZeroThreshold { phrase: String },
    #[error("{field} must be in (0, 1], got {value}")]
    ShareOutOfRange { field: &'static str, value: f64 },
    #[error("metaphor family at index {index} has no name")]
    UnnamedFamily { index: usize },
    #[error("duplicate metaphor family '{name}'")]
    DuplicateFamily { name: String },
    #[error("duplicate arc id '{id}'")]
    DuplicateArc { id: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhraseRule {
    pub phrase: String,
    pub threshold: usize,
    #[serde(default)]
    pub alternatives: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DiversityRules {
    pub phrases: Vec<PhraseRule>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NaturalnessRules {
    pub article_nouns: Vec<String>,
    pub verbs: Vec<String>,
    pub determiners: Vec<String>,
    pub awkward_phrases: Vec<String>,
    pub generic_plurals: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EmergenceRules {
    pub sleep_terms: Vec<String>,
    pub alert_terms: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionRules {
    pub phrases: Vec<String>,
    #[serde(default = "default_suggestion_minimum")]
    pub minimum: usize,
    /// Above this many suggestions the word-count check is waived.
    #[serde(default = "default_leniency_threshold")]
    pub leniency_threshold: usize,
}

const fn default_suggestion_minimum() -> usize {
    15
}

const fn default_leniency_threshold() -> usize {
    1000
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaphorFamily {
    pub name: String,
    pub terms: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetaphorRules {
    pub families: Vec<MetaphorFamily>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityThresholds {
    pub word_count_tolerance: f64,
    pub max_opener_share: f64,
    pub long_text_words: usize,
    pub long_text_metaphor_cap: usize,
    pub short_text_metaphor_cap: usize,
    pub dominant_family_share: f64,
    pub max_mixed_families: usize,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            word_count_tolerance: 0.15,
            max_opener_share: 0.12,
            long_text_words: 2500,
            long_text_metaphor_cap: 10,
            short_text_metaphor_cap: 8,
            dominant_family_share: 0.60,
            max_mixed_families: 2,
        }
    }
}

impl QualityThresholds {
    /// The dominant metaphor family's cap for a text of `words` words.
    #[must_use]
    pub fn metaphor_cap(&self, words: usize) -> usize {
        if words >= self.long_text_words {
            self.long_text_metaphor_cap
        } else {
            self.short_text_metaphor_cap
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principle {
    pub name: String,
    pub rationale: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArcDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub key_language: Vec<String>,
    #[serde(default)]
    pub prompt_integration: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    pub version: String,
    #[serde(default)]
    pub diversity: DiversityRules,
    #[serde(default)]
    pub naturalness: NaturalnessRules,
    #[serde(default)]
    pub emergence: EmergenceRules,
    pub suggestions: SuggestionRules,
    #[serde(default)]
    pub metaphors: MetaphorRules,
    #[serde(default)]
    pub quality: QualityThresholds,
    #[serde(default)]
    pub principles: Vec<Principle>,
    #[serde(default)]
    pub arcs: Vec<ArcDefinition>,
}

impl RuleSet {
    /// The embedded default rule set.
    #[must_use]
    pub fn builtin() -> &'static RuleSet {
        static BUILTIN: OnceLock<RuleSet> = OnceLock::new();
        BUILTIN.get_or_init(|| {
            let rules: RuleSet =
                toml::from_str(DEFAULT_RULES).expect("embedded default rules must parse");
            debug_assert!(rules.validate().is_ok(), "embedded default rules must validate");
            rules
        })
    }

    pub fn from_toml_str(content: &str) -> Result<RuleSet, RuleSetParseError> {
        let rules: RuleSet = toml::from_str(content).map_err(RuleSetParseError::Toml)?;
        rules.validate().map_err(RuleSetParseError::Invalid)?;
        Ok(rules)
    }

    /// Load and validate a rule file.
    pub fn load(path: &Path) -> Result<RuleSet, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read rule set at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match Self::from_toml_str(&content) {
            Ok(rules) => {
                tracing::debug!(path = %path.display(), version = %rules.version, "Loaded rule set");
                Ok(rules)
            }
            Err(RuleSetParseError::Toml(err)) => {
                tracing::warn!("Failed to parse rule set at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
            Err(RuleSetParseError::Invalid(err)) => Err(ConfigError::InvalidRules {
                path: path.to_path_buf(),
                source: err,
            }),
        }
    }

    pub fn validate(&self) -> Result<(), RuleSetError> {
        if self.version.trim().is_empty() {
            return Err(RuleSetError::MissingVersion);
        }

        for rule in &self.diversity.phrases {
            if rule.phrase.trim().is_empty() {
                return Err(RuleSetError::EmptyPhrase {
                    section: "diversity",
                });
            }
            if rule.threshold == 0 {
                return Err(RuleSetError::ZeroThreshold {
                    phrase: rule.phrase.clone(),
                });
            }
        }

        let term_lists: [(&'static str, &[String]); 8] = [
            ("naturalness.article_nouns", &self.naturalness.article_nouns),
            ("naturalness.verbs", &self.naturalness.verbs),
            ("naturalness.determiners", &self.naturalness.determiners),
            ("naturalness.awkward_phrases", &self.naturalness.awkward_phrases),
            ("naturalness.generic_plurals", &self.naturalness.generic_plurals),
            ("emergence.sleep_terms", &self.emergence.sleep_terms),
            ("emergence.alert_terms", &self.emergence.alert_terms),
            ("suggestions.phrases", &self.suggestions.phrases),
        ];
        for (section, terms) in term_lists {
            if terms.iter().any(|term| term.trim().is_empty()) {
                return Err(RuleSetError::EmptyPhrase { section });
            }
        }

        let mut families = HashSet::new();
        for (index, family) in self.metaphors.families.iter().enumerate() {
            if family.name.trim().is_empty() {
                return Err(RuleSetError::UnnamedFamily { index });
            }
            if !families.insert(family.name.as_str()) {
                return Err(RuleSetError::DuplicateFamily {
                    name: family.name.clone(),
                });
            }
            if family.terms.iter().any(|term| term.trim().is_empty()) {
                return Err(RuleSetError::EmptyPhrase {
                    section: "metaphors.families",
                });
            }
        }

        for (field, value) in [
            ("quality.word_count_tolerance", self.quality.word_count_tolerance),
            ("quality.max_opener_share", self.quality.max_opener_share),
            ("quality.dominant_family_share", self.quality.dominant_family_share),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(RuleSetError::ShareOutOfRange { field, value });
            }
        }

        let mut arcs = HashSet::new();
        for arc in &self.arcs {
            if !arcs.insert(arc.id.as_str()) {
                return Err(RuleSetError::DuplicateArc { id: arc.id.clone() });
            }
        }

        Ok(())
    }

    /// Look up arc metadata. Never fails: unknown ids resolve to [`ArcMetadata::fallback`].
    #[must_use]
    pub fn resolve_arc(&self, arc_id: &str) -> Option<ArcMetadata> {
        self.arcs.iter().find(|arc| arc.id == arc_id).map(|arc| ArcMetadata {
            name: arc.name.clone(),
            key_language: arc.key_language.clone(),
            prompt_integration: arc.prompt_integration.clone(),
        })
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::builtin().clone()
    }
}

#[derive(Debug, Error)]
pub enum RuleSetParseError {
    #[error("invalid rule set TOML: {0}")]
    Toml(toml::de::Error),
    #[error("invalid rule set: {0}")]
    Invalid(RuleSetError),
}
