//! End-to-end run: plan, directives, generation, quality guard.

use serde::{Deserialize, Serialize};

use reverie_config::RuleSet;
use reverie_providers::Generator;
use reverie_types::{ClientContext, GenerationContract, Journey, QualityReport};

use crate::directives::DirectiveBuilder;
use crate::guard::{QualityGuard, Review};
use crate::orchestrator::{Orchestrator, PipelineError};
use crate::planner::BudgetPlanner;

/// Output tokens per collaborator call when the caller does not say otherwise.
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 16_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    /// Outline, draft, polish.
    #[default]
    Staged,
    /// One call for the whole script.
    SinglePass,
}

/// What a caller asks the pipeline for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptRequest {
    pub journey: Journey,
    pub target_words: u32,
    #[serde(default)]
    pub context: ClientContext,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineOutcome {
    pub contract: GenerationContract,
    pub reasoning: Vec<String>,
    pub report: QualityReport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub mode: GenerationMode,
    /// Whether the Quality Guard may make its one repair call.
    pub allow_retry: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            mode: GenerationMode::Staged,
            allow_retry: true,
        }
    }
}

pub struct Pipeline<'a> {
    rules: &'a RuleSet,
    generator: &'a dyn Generator,
    max_output_tokens: u32,
}

impl std::fmt::Debug for Pipeline<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("rules_version", &self.rules.version)
            .field("max_output_tokens", &self.max_output_tokens)
            .finish_non_exhaustive()
    }
}

impl<'a> Pipeline<'a> {
    #[must_use]
    pub fn new(rules: &'a RuleSet, generator: &'a dyn Generator) -> Self {
        Self {
            rules,
            generator,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
        }
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    /// Run one request to a quality report.
    ///
    /// Collaborator failures during generation abort the run. A failed
    /// repair does not: the guard falls back to its first score.
    pub async fn run(
        &self,
        request: &ScriptRequest,
        options: RunOptions,
    ) -> Result<PipelineOutcome, PipelineError> {
        tracing::info!(
            stages = request.journey.len(),
            target_words = request.target_words,
            mode = ?options.mode,
            "Starting pipeline"
        );

        let plan = BudgetPlanner::new(self.rules).plan(&request.journey, request.target_words);
        let directives = DirectiveBuilder::new(self.rules).build(&request.context);
        let orchestrator = Orchestrator::new(
            self.generator,
            &directives,
            &request.context,
            &plan.contract,
            self.max_output_tokens,
        );
        let guard = QualityGuard::new(self.rules, self.max_output_tokens);

        let script = match options.mode {
            GenerationMode::Staged => {
                let outline = orchestrator.outline().await?;
                let draft = orchestrator.draft(&outline).await?;
                let diversity = guard.diversity(&draft);
                tracing::debug!(
                    diversity_score = diversity.diversity_score,
                    flagged = diversity.needing_rewrite().count(),
                    "Draft diversity"
                );
                orchestrator.polish(&draft, &diversity).await?
            }
            GenerationMode::SinglePass => orchestrator.single_pass().await?,
        };

        let review = Review::new(&script, request.target_words, request.context.emergence)
            .allow_retry(options.allow_retry);
        let report = guard.review(review, self.generator).await;
        tracing::info!(passed = report.passed, score = report.score, "Pipeline finished");

        Ok(PipelineOutcome {
            contract: plan.contract,
            reasoning: plan.reasoning,
            report,
        })
    }
}
