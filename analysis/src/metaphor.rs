//! Metaphor-family counting.

use regex::Regex;

use reverie_config::MetaphorRules;

use crate::MetaphorStrategy;
use crate::text::{normalize, term_set_regex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyCount {
    pub name: String,
    pub count: usize,
}

/// Occurrences per metaphor family, in rule order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetaphorProfile {
    pub families: Vec<FamilyCount>,
}

impl MetaphorProfile {
    #[must_use]
    pub fn total(&self) -> usize {
        self.families.iter().map(|family| family.count).sum()
    }

    /// The most frequent family; the first one listed wins ties.
    #[must_use]
    pub fn dominant(&self) -> Option<&FamilyCount> {
        self.families
            .iter()
            .filter(|family| family.count > 0)
            .fold(None, |best: Option<&FamilyCount>, family| match best {
                Some(current) if current.count >= family.count => Some(current),
                _ => Some(family),
            })
    }

    /// Families with at least one occurrence.
    pub fn present(&self) -> impl Iterator<Item = &FamilyCount> {
        self.families.iter().filter(|family| family.count > 0)
    }

    /// Share of all metaphor mentions held by the dominant family, 0.0 when there are none.
    #[must_use]
    pub fn dominant_share(&self) -> f64 {
        let total = self.total();
        match self.dominant() {
            Some(family) if total > 0 => family.count as f64 / total as f64,
            _ => 0.0,
        }
    }
}

/// Term-list metaphor counter built from `[[metaphors.families]]`.
#[derive(Debug, Clone)]
pub struct FamilyLexicon {
    families: Vec<(String, Option<Regex>)>,
}

impl FamilyLexicon {
    #[must_use]
    pub fn new(rules: &MetaphorRules) -> Self {
        Self {
            families: rules
                .families
                .iter()
                .map(|family| (family.name.clone(), term_set_regex(&family.terms)))
                .collect(),
        }
    }
}

impl MetaphorStrategy for FamilyLexicon {
    fn profile(&self, text: &str) -> MetaphorProfile {
        let text = normalize(text);
        MetaphorProfile {
            families: self
                .families
                .iter()
                .map(|(name, regex)| FamilyCount {
                    name: name.clone(),
                    count: regex.as_ref().map_or(0, |re| re.find_iter(&text).count()),
                })
                .collect(),
        }
    }
}
