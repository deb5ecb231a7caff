//! End-to-end pipeline runs against a scripted collaborator.

use reverie_config::RuleSet;
use reverie_engine::{
    GenerationMode, Pipeline, PipelineError, PipelineStage, RunOptions, ScriptRequest,
};
use reverie_types::{ClientContext, Journey, Stage};

use crate::common::{
    FAILING_SCRIPT, OUTLINE_JSON, PASSING_SCRIPT, ScriptedGenerator, collaborator_down,
    passing_target, two_stage_journey,
};

fn request() -> ScriptRequest {
    ScriptRequest {
        journey: two_stage_journey(),
        target_words: passing_target(),
        context: ClientContext::default(),
    }
}

fn single_pass() -> RunOptions {
    RunOptions {
        mode: GenerationMode::SinglePass,
        ..RunOptions::default()
    }
}

#[tokio::test]
async fn staged_run_makes_three_calls_when_polish_passes() {
    let generator = ScriptedGenerator::replying(&[OUTLINE_JSON, "A rough draft.", PASSING_SCRIPT]);
    let rules = RuleSet::builtin();

    let outcome = Pipeline::new(rules, &generator)
        .run(&request(), RunOptions::default())
        .await
        .unwrap();

    assert_eq!(generator.calls(), 3);
    assert!(outcome.report.passed);
    assert_eq!(outcome.report.final_script, PASSING_SCRIPT);
    assert_eq!(outcome.contract.final_target(), passing_target());
    assert!(!outcome.reasoning.is_empty());

    let prompts = generator.prompts();
    assert!(prompts[0].contains("Breath Anchor"));
    assert!(prompts[1].contains("Deepening: Slow countdown from ten."));
    assert!(prompts[2].contains("A rough draft."));
}

#[tokio::test]
async fn staged_run_repairs_at_most_once() {
    let generator = ScriptedGenerator::replying(&[
        OUTLINE_JSON,
        "A rough draft.",
        FAILING_SCRIPT,
        PASSING_SCRIPT,
        PASSING_SCRIPT,
    ]);

    let outcome = Pipeline::new(RuleSet::builtin(), &generator)
        .run(&request(), RunOptions::default())
        .await
        .unwrap();

    assert_eq!(generator.calls(), 4);
    assert!(outcome.report.passed);
    assert!(outcome.report.polish_message.is_some());
}

#[tokio::test]
async fn single_pass_makes_one_call() {
    let generator = ScriptedGenerator::replying(&[PASSING_SCRIPT]);

    let outcome = Pipeline::new(RuleSet::builtin(), &generator)
        .run(&request(), single_pass())
        .await
        .unwrap();

    assert_eq!(generator.calls(), 1);
    assert!(outcome.report.passed);
}

#[tokio::test]
async fn single_pass_without_retry_reports_failure() {
    let generator = ScriptedGenerator::replying(&[FAILING_SCRIPT, PASSING_SCRIPT]);
    let options = RunOptions {
        allow_retry: false,
        ..single_pass()
    };

    let outcome = Pipeline::new(RuleSet::builtin(), &generator)
        .run(&request(), options)
        .await
        .unwrap();

    assert_eq!(generator.calls(), 1);
    assert!(!outcome.report.passed);
    assert!(outcome.report.score < 100);
}

#[tokio::test]
async fn malformed_outline_aborts_the_run() {
    let generator = ScriptedGenerator::replying(&["Induction: relax. Deepening: go down."]);

    let err = Pipeline::new(RuleSet::builtin(), &generator)
        .run(&request(), RunOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.stage(), PipelineStage::Outline);
    assert!(matches!(err, PipelineError::Response { .. }));
    assert_eq!(generator.calls(), 1);
}

#[tokio::test]
async fn collaborator_failure_names_the_stage() {
    let generator = ScriptedGenerator::new([Ok(OUTLINE_JSON.to_string()), Err(collaborator_down())]);

    let err = Pipeline::new(RuleSet::builtin(), &generator)
        .run(&request(), RunOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.stage(), PipelineStage::Draft);
    assert!(matches!(err, PipelineError::Generation { .. }));
    assert_eq!(generator.calls(), 2);
}

#[tokio::test]
async fn empty_polish_is_a_hard_error() {
    let generator = ScriptedGenerator::replying(&[OUTLINE_JSON, "A rough draft.", "   "]);

    let err = Pipeline::new(RuleSet::builtin(), &generator)
        .run(&request(), RunOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.stage(), PipelineStage::Polish);
    assert_eq!(generator.calls(), 3);
}

#[tokio::test]
async fn budgets_follow_the_journey() {
    let generator = ScriptedGenerator::replying(&[PASSING_SCRIPT]);
    let request = ScriptRequest {
        journey: Journey::new(vec![Stage::new("a", 40), Stage::new("b", 60)]),
        target_words: 1000,
        context: ClientContext::default(),
    };

    let outcome = Pipeline::new(RuleSet::builtin(), &generator)
        .run(&request, single_pass())
        .await
        .unwrap();

    assert_eq!(outcome.contract.budgets(), vec![400, 600]);
    assert_eq!(outcome.contract.cumulative_targets(), vec![400, 1000]);
}

#[test]
fn script_request_reads_camel_case_json() {
    let json = r#"{
        "journey": [{"arcId": "safe-place", "weight": 100}],
        "targetWords": 600,
        "context": {"emergence": "sleep", "symbolicLevel": 70}
    }"#;
    let request: ScriptRequest = serde_json::from_str(json).unwrap();
    assert_eq!(request.target_words, 600);
    assert_eq!(request.journey.len(), 1);
    assert_eq!(request.context.symbolic_level.get(), 70);
}
