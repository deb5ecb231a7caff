//! Core engine for reverie - planning, orchestration and the quality guard.
//!
//! The flow for one request is strictly sequential:
//!
//! ```text
//! BudgetPlanner -> DirectiveBuilder -> Orchestrator (outline, draft, polish)
//!               -> QualityGuard (score, at most one repair, rescore)
//! ```
//!
//! The generation collaborator is the only suspension point. Nothing here
//! retries a collaborator call; transport retry lives in `reverie-providers`.

mod directives;
mod guard;
mod orchestrator;
mod pipeline;
mod planner;

pub use directives::{
    DEEP_TRANCE_ABOVE, DirectiveBuilder, Directives, LIGHT_TRANCE_BELOW, METAPHOR_SYMBOLIC_LEVEL,
    TranceTier, emergence_instruction,
};
pub use guard::{GuardState, QualityGuard, Review};
pub use orchestrator::{
    Orchestrator, Outline, OutlinePhase, Phase, PipelineError, PipelineStage, rewrite_guidance,
};
pub use pipeline::{
    DEFAULT_MAX_OUTPUT_TOKENS, GenerationMode, Pipeline, PipelineOutcome, RunOptions,
    ScriptRequest,
};
pub use planner::{BudgetPlan, BudgetPlanner};

pub use reverie_analysis::Analyzers;
pub use reverie_providers::{GenerationError, GenerationRequest, Generator};
