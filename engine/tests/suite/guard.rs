//! Quality Guard review: short-circuit, single repair bound, fallback.

use reverie_config::RuleSet;
use reverie_engine::{QualityGuard, Review};
use reverie_types::{CheckKind, EmergenceType};

use crate::common::{
    FAILING_SCRIPT, PASSING_SCRIPT, ScriptedGenerator, collaborator_down, passing_target,
};

fn guard() -> QualityGuard<'static> {
    QualityGuard::new(RuleSet::builtin(), 4_000)
}

#[test]
fn fixture_passes_every_check() {
    let report = guard().score(PASSING_SCRIPT, passing_target(), EmergenceType::Regular);
    let failed: Vec<_> = report.failed_checks().collect();
    assert!(failed.is_empty(), "{failed:#?}");
    assert_eq!(report.score, 100);
}

#[tokio::test]
async fn passing_script_makes_no_calls() {
    let generator = ScriptedGenerator::replying(&["unused"]);
    let review = Review::new(PASSING_SCRIPT, passing_target(), EmergenceType::Regular);

    let report = guard().review(review, &generator).await;

    assert!(report.passed);
    assert_eq!(report.score, 100);
    assert_eq!(generator.calls(), 0);
    assert!(report.polish_message.is_none());
}

#[tokio::test]
async fn no_retry_means_no_calls() {
    let generator = ScriptedGenerator::replying(&[PASSING_SCRIPT]);
    let review = Review::new(FAILING_SCRIPT, passing_target(), EmergenceType::Regular)
        .allow_retry(false);

    let report = guard().review(review, &generator).await;

    assert!(!report.passed);
    assert_eq!(generator.calls(), 0);
    assert_eq!(report.final_script, FAILING_SCRIPT);
}

#[tokio::test]
async fn repair_is_called_exactly_once() {
    // Two replies queued; only the first may be consumed.
    let generator = ScriptedGenerator::replying(&[PASSING_SCRIPT, PASSING_SCRIPT]);
    let review = Review::new(FAILING_SCRIPT, passing_target(), EmergenceType::Regular);

    let report = guard().review(review, &generator).await;

    assert_eq!(generator.calls(), 1);
    assert!(report.passed);
    assert_eq!(report.final_script, PASSING_SCRIPT);
    let message = report.polish_message.as_deref().unwrap();
    assert!(message.contains("to 100"), "{message}");
    assert!(message.contains("all checks now pass"));

    let prompt = &generator.prompts()[0];
    assert!(prompt.contains("emergence_match"));
    assert!(prompt.contains("functional_suggestions"));
    assert!(prompt.ends_with(FAILING_SCRIPT));
}

#[tokio::test]
async fn repair_that_still_fails_is_not_retried() {
    let generator = ScriptedGenerator::replying(&["Still quiet here now.", PASSING_SCRIPT]);
    let review = Review::new(FAILING_SCRIPT, passing_target(), EmergenceType::Regular);

    let report = guard().review(review, &generator).await;

    assert_eq!(generator.calls(), 1);
    assert!(!report.passed);
    assert_eq!(report.final_script, "Still quiet here now.");
    assert!(report.polish_message.unwrap().contains("still failing"));
}

#[tokio::test]
async fn failed_repair_returns_original_report() {
    let rules = RuleSet::builtin();
    let guard = QualityGuard::new(rules, 4_000);
    let original = guard.score(FAILING_SCRIPT, passing_target(), EmergenceType::Regular);

    let generator = ScriptedGenerator::new([Err(collaborator_down())]);
    let review = Review::new(FAILING_SCRIPT, passing_target(), EmergenceType::Regular);
    let report = guard.review(review, &generator).await;

    assert_eq!(generator.calls(), 1);
    assert_eq!(report, original);
}

#[tokio::test]
async fn empty_repair_reply_returns_original_report() {
    let guard = guard();
    let original = guard.score(FAILING_SCRIPT, passing_target(), EmergenceType::Regular);

    let generator = ScriptedGenerator::replying(&["```\n\n```"]);
    let review = Review::new(FAILING_SCRIPT, passing_target(), EmergenceType::Regular);
    let report = guard.review(review, &generator).await;

    assert_eq!(generator.calls(), 1);
    assert_eq!(report, original);
}

#[test]
fn sleep_script_with_awakening_language_fails_emergence() {
    let script = "Let yourself drift off to sleep now, and when you wake up you'll feel energized.";
    let report = guard().score(script, 15, EmergenceType::Sleep);
    let check = report.check(CheckKind::EmergenceMatch).unwrap();
    assert!(!check.passed);
    assert!(check.details.contains("in a sleep script"), "{}", check.details);
}
