//! The generation contract: a journey with word budgets attached.

use serde::{Deserialize, Serialize};

use crate::DimensionOverrides;

/// Arc metadata resolved from the arc library.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArcMetadata {
    pub name: String,
    #[serde(default)]
    pub key_language: Vec<String>,
    #[serde(default)]
    pub prompt_integration: String,
}

impl ArcMetadata {
    /// Metadata for an arc id the library does not know: the id doubles as the name.
    #[must_use]
    pub fn fallback(arc_id: &str) -> Self {
        Self {
            name: arc_id.to_string(),
            key_language: Vec::new(),
            prompt_integration: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractStage {
    pub arc_id: String,
    pub weight: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition_goal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension_overrides: Option<DimensionOverrides>,
    #[serde(flatten)]
    pub arc: ArcMetadata,
    /// False when the arc id was missing from the library and metadata fell back.
    pub resolved: bool,
    pub word_budget: u32,
    pub cumulative_word_target: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationContract {
    pub target_words: u32,
    pub stages: Vec<ContractStage>,
}

impl GenerationContract {
    #[must_use]
    pub fn budgets(&self) -> Vec<u32> {
        self.stages.iter().map(|stage| stage.word_budget).collect()
    }

    #[must_use]
    pub fn cumulative_targets(&self) -> Vec<u32> {
        self.stages
            .iter()
            .map(|stage| stage.cumulative_word_target)
            .collect()
    }

    /// Cumulative target of the last stage; zero for an empty contract.
    #[must_use]
    pub fn final_target(&self) -> u32 {
        self.stages
            .last()
            .map_or(0, |stage| stage.cumulative_word_target)
    }

    #[must_use]
    pub fn is_exact(&self) -> bool {
        self.final_target() == self.target_words
    }
}
