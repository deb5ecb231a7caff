//! Budget Planner: journey weights to per-stage word budgets.
//!
//! When the journey satisfies its precondition (1..=12 stages, weights summing
//! to 100) the final cumulative target equals the requested total exactly: the
//! last stage absorbs the rounding remainder. Otherwise the formula is applied
//! literally to every stage and the shortfall or overshoot is reported, never
//! corrected.

use reverie_config::RuleSet;
use reverie_types::{ArcMetadata, ContractStage, GenerationContract, Journey, Stage};

/// A contract plus the advisory reasoning behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetPlan {
    pub contract: GenerationContract,
    /// Human-readable, ordered. Never parsed back.
    pub reasoning: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct BudgetPlanner<'r> {
    rules: &'r RuleSet,
}

/// `round(weight / 100 * total)`, halves rounding up.
fn rounded_share(weight: u32, total: u32) -> u32 {
    let scaled = u64::from(weight) * u64::from(total) * 2 + 100;
    u32::try_from(scaled / 200).unwrap_or(u32::MAX)
}

impl<'r> BudgetPlanner<'r> {
    #[must_use]
    pub fn new(rules: &'r RuleSet) -> Self {
        Self { rules }
    }

    /// Arc metadata for `arc_id`, falling back to the id itself. Never fails.
    #[must_use]
    pub fn resolve(&self, arc_id: &str) -> (ArcMetadata, bool) {
        match self.rules.resolve_arc(arc_id) {
            Some(arc) => (arc, true),
            None => (ArcMetadata::fallback(arc_id), false),
        }
    }

    #[must_use]
    pub fn plan(&self, journey: &Journey, target_words: u32) -> BudgetPlan {
        let stages = journey.stages();
        let mut reasoning = vec![format!(
            "Planning {} stage(s) for a {target_words}-word script.",
            stages.len()
        )];

        let precondition = journey.check();
        if let Err(err) = &precondition {
            tracing::warn!(
                stages = stages.len(),
                weight_total = journey.weight_total(),
                "Journey precondition not met: {err}"
            );
            reasoning.push(format!(
                "Precondition not met ({err}); budgets follow the weights literally and may not sum to {target_words}."
            ));
        }

        let mut budgets: Vec<u32> = stages
            .iter()
            .map(|stage| rounded_share(stage.weight, target_words))
            .collect();
        if precondition.is_ok() {
            absorb_remainder(&mut budgets, target_words, &mut reasoning);
        }

        let mut cumulative = 0u32;
        let contract_stages = stages
            .iter()
            .zip(&budgets)
            .enumerate()
            .map(|(index, (stage, &budget))| {
                cumulative = cumulative.saturating_add(budget);
                let (arc, resolved) = self.resolve(&stage.arc_id);
                reasoning.push(describe_stage(index + 1, stage, &arc, resolved, budget, cumulative));
                ContractStage {
                    arc_id: stage.arc_id.clone(),
                    weight: stage.weight,
                    transition_goal: stage.transition_goal.clone(),
                    dimension_overrides: stage.dimension_overrides.clone(),
                    arc,
                    resolved,
                    word_budget: budget,
                    cumulative_word_target: cumulative,
                }
            })
            .collect();

        let contract = GenerationContract {
            target_words,
            stages: contract_stages,
        };
        if !contract.is_exact() {
            reasoning.push(format!(
                "Budgets total {} words against a target of {target_words}.",
                contract.final_target()
            ));
        }
        tracing::debug!(
            stages = contract.stages.len(),
            budgets = ?contract.budgets(),
            exact = contract.is_exact(),
            "Planned word budgets"
        );

        BudgetPlan {
            contract,
            reasoning,
        }
    }
}

/// Make the budgets sum to `total` by recomputing the last stage.
///
/// If the earlier stages already overshoot (only possible when the last weight
/// is tiny and the total small), the excess is taken back from the latest
/// earlier stages first.
fn absorb_remainder(budgets: &mut [u32], total: u32, reasoning: &mut Vec<String>) {
    let Some((last, earlier)) = budgets.split_last_mut() else {
        return;
    };
    let earlier_sum: u64 = earlier.iter().map(|&b| u64::from(b)).sum();
    let formula = *last;

    if earlier_sum <= u64::from(total) {
        *last = total - earlier_sum as u32;
    } else {
        let mut excess = earlier_sum - u64::from(total);
        for budget in earlier.iter_mut().rev() {
            let take = excess.min(u64::from(*budget));
            *budget -= take as u32;
            excess -= take;
            if excess == 0 {
                break;
            }
        }
        *last = 0;
    }

    if *last != formula {
        let delta = i64::from(*last) - i64::from(formula);
        reasoning.push(format!(
            "Final stage absorbs a rounding remainder of {delta:+} word(s) so the total is exact."
        ));
    }
}

fn describe_stage(
    position: usize,
    stage: &Stage,
    arc: &ArcMetadata,
    resolved: bool,
    budget: u32,
    cumulative: u32,
) -> String {
    let mut line = if resolved {
        format!(
            "Stage {position}: {} ({}) at {}% -> {budget} words (through word {cumulative}).",
            arc.name, stage.arc_id, stage.weight
        )
    } else {
        format!(
            "Stage {position}: '{}' is not in the arc library, using the id as its name; {}% -> {budget} words (through word {cumulative}).",
            stage.arc_id, stage.weight
        )
    };
    if let Some(goal) = &stage.transition_goal {
        line.push_str(&format!(" Transition: {goal}."));
    }
    line
}

#[cfg(test)]
mod tests {
    use reverie_types::{DimensionOverrides, Level};

    use super::*;

    fn plan(weights: &[(&str, u32)], total: u32) -> BudgetPlan {
        let journey: Journey = weights
            .iter()
            .map(|(arc, weight)| Stage::new(*arc, *weight))
            .collect();
        BudgetPlanner::new(RuleSet::builtin()).plan(&journey, total)
    }

    #[test]
    fn two_stage_example() {
        let plan = plan(&[("a", 40), ("b", 60)], 1000);
        assert_eq!(plan.contract.budgets(), vec![400, 600]);
        assert_eq!(plan.contract.cumulative_targets(), vec![400, 1000]);
    }

    #[test]
    fn single_stage_gets_everything() {
        let plan = plan(&[("safe-place", 100)], 777);
        assert_eq!(plan.contract.budgets(), vec![777]);
        assert!(plan.contract.stages[0].resolved);
        assert_eq!(plan.contract.stages[0].arc.name, "Safe Place");
    }

    #[test]
    fn remainder_goes_to_last_stage() {
        let plan = plan(&[("a", 33), ("b", 33), ("c", 34)], 1001);
        // 330.33 -> 330, 330.33 -> 330, last = 1001 - 660
        assert_eq!(plan.contract.budgets(), vec![330, 330, 341]);
        assert_eq!(plan.contract.final_target(), 1001);
        assert!(plan.reasoning.iter().any(|line| line.contains("rounding remainder")));
    }

    #[test]
    fn exact_for_many_weightings() {
        let weightings: [&[u32]; 5] = [
            &[1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 89],
            &[50, 50],
            &[15, 15, 15, 15, 15, 25],
            &[99, 1],
            &[7, 13, 29, 51],
        ];
        for weights in weightings {
            let stages: Vec<(&str, u32)> = weights.iter().map(|w| ("x", *w)).collect();
            for total in [1, 3, 150, 999, 1000, 2501, 12_345] {
                let plan = plan(&stages, total);
                let sum: u32 = plan.contract.budgets().iter().sum();
                assert_eq!(sum, total, "{weights:?} @ {total}");
                assert_eq!(plan.contract.final_target(), total);
            }
        }
    }

    #[test]
    fn overshoot_is_taken_back_from_earlier_stages() {
        let plan = plan(&[("a", 50), ("b", 50), ("c", 0)], 1);
        // Formula gives [1, 1, 0]; exactness wins.
        assert_eq!(plan.contract.budgets(), vec![1, 0, 0]);
        assert_eq!(plan.contract.final_target(), 1);
    }

    #[test]
    fn unknown_arc_falls_back_to_id() {
        let plan = plan(&[("mystery", 100)], 500);
        let stage = &plan.contract.stages[0];
        assert!(!stage.resolved);
        assert_eq!(stage.arc.name, "mystery");
        assert!(stage.arc.key_language.is_empty());
        assert!(stage.arc.prompt_integration.is_empty());
        assert!(plan.reasoning.iter().any(|line| line.contains("not in the arc library")));
    }

    #[test]
    fn duplicate_arcs_resolve_independently() {
        let plan = plan(&[("body-scan", 50), ("body-scan", 50)], 800);
        assert_eq!(plan.contract.budgets(), vec![400, 400]);
        assert!(plan.contract.stages.iter().all(|stage| stage.resolved));
    }

    #[test]
    fn bad_weights_apply_formula_literally() {
        let plan = plan(&[("a", 30), ("b", 30)], 1000);
        assert_eq!(plan.contract.budgets(), vec![300, 300]);
        assert_eq!(plan.contract.final_target(), 600);
        assert!(!plan.contract.is_exact());
        assert!(plan.reasoning.iter().any(|line| line.starts_with("Precondition not met")));
    }

    #[test]
    fn empty_journey_plans_nothing() {
        let plan = plan(&[], 1000);
        assert!(plan.contract.stages.is_empty());
        assert_eq!(plan.contract.final_target(), 0);
        assert!(plan.reasoning.iter().any(|line| line.starts_with("Precondition not met")));
    }

    #[test]
    fn transition_goal_appears_in_reasoning() {
        let journey = Journey::new(vec![
            Stage::new("release", 100).with_transition_goal("lighter and ready to rest"),
        ]);
        let plan = BudgetPlanner::new(RuleSet::builtin()).plan(&journey, 300);
        assert!(plan.reasoning[1].contains("Transition: lighter and ready to rest."));
    }

    #[test]
    fn dimension_overrides_reach_the_contract() {
        let overrides = DimensionOverrides {
            symbolic_level: None,
            trance_depth: Some(Level::new(85)),
        };
        let journey = Journey::new(vec![
            Stage::new("body-scan", 60),
            Stage::new("sleep-descent", 40).with_overrides(overrides),
        ]);
        let plan = BudgetPlanner::new(RuleSet::builtin()).plan(&journey, 500);
        assert!(plan.contract.stages[0].dimension_overrides.is_none());
        assert_eq!(plan.contract.stages[1].dimension_overrides, Some(overrides));
    }
}
