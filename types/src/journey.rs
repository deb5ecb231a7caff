//! Journeys: ordered, weighted sequences of thematic stages.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Level;

pub const MIN_STAGES: usize = 1;
pub const MAX_STAGES: usize = 12;
/// Weights are percentages of the total word count.
pub const WEIGHT_TOTAL: u32 = 100;

/// Precondition violations. The planner does not enforce these; callers that
/// need exact budgets validate with [`Journey::check`] before planning.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JourneyError {
    #[error("journey must have between 1 and 12 stages, got {count}")]
    StageCount { count: usize },
    #[error("stage {index} weight {weight} is outside 0..=100")]
    WeightOutOfRange { index: usize, weight: u32 },
    #[error("stage weights must sum to 100, got {total}")]
    WeightTotal { total: u32 },
}

/// Per-stage adjustments to the session-wide dials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbolic_level: Option<Level>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trance_depth: Option<Level>,
}

impl DimensionOverrides {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbolic_level.is_none() && self.trance_depth.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    pub arc_id: String,
    pub weight: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition_goal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension_overrides: Option<DimensionOverrides>,
}

impl Stage {
    #[must_use]
    pub fn new(arc_id: impl Into<String>, weight: u32) -> Self {
        Self {
            arc_id: arc_id.into(),
            weight,
            transition_goal: None,
            dimension_overrides: None,
        }
    }

    #[must_use]
    pub fn with_transition_goal(mut self, goal: impl Into<String>) -> Self {
        self.transition_goal = Some(goal.into());
        self
    }

    #[must_use]
    pub fn with_overrides(mut self, overrides: DimensionOverrides) -> Self {
        self.dimension_overrides = Some(overrides);
        self
    }
}

/// Serialized as a bare array of stages.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Journey {
    pub stages: Vec<Stage>,
}

impl Journey {
    #[must_use]
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Sum of all stage weights, saturating.
    #[must_use]
    pub fn weight_total(&self) -> u32 {
        self.stages
            .iter()
            .fold(0u32, |acc, stage| acc.saturating_add(stage.weight))
    }

    /// Validate the stage count and weight preconditions.
    pub fn check(&self) -> Result<(), JourneyError> {
        let count = self.stages.len();
        if !(MIN_STAGES..=MAX_STAGES).contains(&count) {
            return Err(JourneyError::StageCount { count });
        }
        if let Some((index, stage)) = self
            .stages
            .iter()
            .enumerate()
            .find(|(_, stage)| stage.weight > WEIGHT_TOTAL)
        {
            return Err(JourneyError::WeightOutOfRange {
                index,
                weight: stage.weight,
            });
        }
        let total = self.weight_total();
        if total != WEIGHT_TOTAL {
            return Err(JourneyError::WeightTotal { total });
        }
        Ok(())
    }
}

impl FromIterator<Stage> for Journey {
    fn from_iter<I: IntoIterator<Item = Stage>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_accepts_weights_summing_to_hundred() {
        let journey = Journey::new(vec![Stage::new("a", 40), Stage::new("b", 60)]);
        assert!(journey.check().is_ok());
        assert_eq!(journey.weight_total(), 100);
    }

    #[test]
    fn check_rejects_empty_and_oversized_journeys() {
        assert_eq!(
            Journey::default().check(),
            Err(JourneyError::StageCount { count: 0 })
        );
        let stages: Journey = (0..13).map(|i| Stage::new(format!("s{i}"), 1)).collect();
        assert_eq!(stages.check(), Err(JourneyError::StageCount { count: 13 }));
    }

    #[test]
    fn check_rejects_bad_weight_total() {
        let journey = Journey::new(vec![Stage::new("a", 30), Stage::new("b", 30)]);
        assert_eq!(journey.check(), Err(JourneyError::WeightTotal { total: 60 }));
    }

    #[test]
    fn check_rejects_weight_above_hundred() {
        let journey = Journey::new(vec![Stage::new("a", 120)]);
        assert_eq!(
            journey.check(),
            Err(JourneyError::WeightOutOfRange {
                index: 0,
                weight: 120
            })
        );
    }

    #[test]
    fn stage_deserializes_camel_case() {
        let stage: Stage = serde_json::from_str(
            r#"{"arcId":"safe-place","weight":25,"transitionGoal":"settle","dimensionOverrides":{"tranceDepth":90}}"#,
        )
        .unwrap();
        assert_eq!(stage.arc_id, "safe-place");
        assert_eq!(stage.transition_goal.as_deref(), Some("settle"));
        let overrides = stage.dimension_overrides.unwrap();
        assert_eq!(overrides.trance_depth, Some(Level::new(90)));
        assert!(overrides.symbolic_level.is_none());
    }

    #[test]
    fn journey_is_a_bare_array() {
        let journey: Journey =
            serde_json::from_str(r#"[{"arcId":"a","weight":40},{"arcId":"b","weight":60}]"#)
                .unwrap();
        assert_eq!(journey.len(), 2);
        assert!(journey.check().is_ok());
        assert_eq!(
            serde_json::to_string(&journey).unwrap(),
            r#"[{"arcId":"a","weight":40},{"arcId":"b","weight":60}]"#
        );
    }
}
