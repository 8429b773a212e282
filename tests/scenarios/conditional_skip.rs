//! Test: Conditional Skip - gated steps and skip propagation

use crate::helpers::*;
use serde_json::json;
use skillflow::core::{RunStatus, SkipReason, StepDefinition};
use skillflow::projection::{Binding, InputProjector, Projection};
use std::sync::Arc;

fn steps(condition: &str) -> Vec<StepDefinition> {
    vec![
        step("step1", 1, json!({"case_id": "string"})),
        step("step2", 2, json!({"covered": "boolean"})),
        step("step3", 3, json!({"met": "boolean"})),
        step("step4", 4, json!({"decision": "string"})),
        step("step5", 5, json!({"letter": "string"})).with_condition(condition).unwrap(),
        step("step6", 6, json!({"appeal": "string"})),
    ]
}

fn projector() -> InputProjector {
    chain_projector(&["step1", "step2", "step3", "step4", "step5", "step6"])
}

fn provider(decision: &str) -> ScriptedProvider {
    ScriptedProvider::new()
        .reply("step1", json!({"case_id": "PA-7"}))
        .reply("step2", json!({"covered": true}))
        .reply("step3", json!({"met": false}))
        .reply("step4", json!({"decision": decision}))
        .reply("step5", json!({"letter": "Dear member"}))
        .reply("step6", json!({"appeal": "We disagree"}))
}

/// Scenario: step 5 gated on a DENY decision, step 4 approves
#[tokio::test]
async fn test_false_condition_skips_and_propagates() {
    let provider = Arc::new(provider("APPROVE"));
    let engine = engine(
        registry(steps(r#"step4.decision == "DENY""#)),
        provider.clone(),
        projector(),
    );

    let result = engine.run(case_documents()).await;

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(
        assert_skipped(&result, "step5"),
        &SkipReason::ConditionFalse {
            condition: r#"step4.decision == "DENY""#.to_string()
        }
    );
    assert_eq!(
        assert_skipped(&result, "step6"),
        &SkipReason::MissingDependency {
            dependency: "step5".to_string()
        }
    );
    assert_eq!(result.downstream_skipped_by("step5"), vec!["step6"]);
    assert!(!result.outputs.contains_key("step5"));
    assert!(!result.outputs.contains_key("step6"));
    assert!(!provider.calls().contains(&"step5".to_string()));
    assert!(!provider.calls().contains(&"step6".to_string()));
}

#[tokio::test]
async fn test_true_condition_runs_gated_steps() {
    let provider = Arc::new(provider("DENY"));
    let engine = engine(
        registry(steps(r#"step4.decision == "DENY""#)),
        provider.clone(),
        projector(),
    );

    let result = engine.run(case_documents()).await;

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.accepted().len(), 6);
    assert_eq!(assert_accepted(&result, "step6"), &json!({"appeal": "We disagree"}));
}

#[tokio::test]
async fn test_missing_condition_field_is_false() {
    let provider = Arc::new(provider("DENY"));
    let engine = engine(
        registry(steps(r#"step4.outcome == "DENY""#)),
        provider.clone(),
        projector(),
    );

    let result = engine.run(case_documents()).await;

    assert!(matches!(
        assert_skipped(&result, "step5"),
        SkipReason::ConditionFalse { .. }
    ));
    assert_eq!(result.status, RunStatus::Completed);
}

#[tokio::test]
async fn test_not_equals_and_truthy_conditions() {
    let registry = registry(vec![
        step("step1", 1, json!({"case_id": "string"})),
        step("step2", 2, json!({"covered": "boolean"})),
        step("pend_notice", 3, json!({"text": "string"}))
            .with_condition(r#"step1.case_id != "PA-7""#)
            .unwrap(),
        step("coverage_memo", 4, json!({"text": "string"}))
            .with_condition("step2.covered")
            .unwrap(),
        step("gap_memo", 5, json!({"text": "string"}))
            .with_condition("!step2.covered")
            .unwrap(),
    ]);
    let projector = InputProjector::new().with_fallback(Projection::accumulated());
    let provider = Arc::new(
        ScriptedProvider::new()
            .reply("step1", json!({"case_id": "PA-7"}))
            .reply("step2", json!({"covered": true}))
            .reply("coverage_memo", json!({"text": "covered"})),
    );

    let result = engine(registry, provider, projector).run(case_documents()).await;

    assert_skipped(&result, "pend_notice");
    assert_accepted(&result, "coverage_memo");
    assert_skipped(&result, "gap_memo");
}

#[tokio::test]
async fn test_field_default_does_not_hide_missing_step() {
    // A field binding only defaults missing fields, never a missing payload
    let registry = registry(vec![
        step("step1", 1, json!({"case_id": "string"})),
        step("letter", 2, json!({"text": "string"}))
            .with_condition(r#"step1.case_id == "none""#)
            .unwrap(),
        step("archive", 3, json!({"ok": "boolean"})),
    ]);
    let projector = InputProjector::new()
        .with_rule("step1", Projection::new().bind("documents", Binding::Documents))
        .with_rule("letter", Projection::new().bind("case", Binding::payload("step1")))
        .with_rule(
            "archive",
            Projection::new().bind("text", Binding::field("letter", "text", json!("n/a"))),
        );
    let provider = Arc::new(ScriptedProvider::new().reply("step1", json!({"case_id": "PA-9"})));

    let result = engine(registry, provider, projector).run(case_documents()).await;

    assert_skipped(&result, "letter");
    assert_eq!(
        assert_skipped(&result, "archive"),
        &SkipReason::MissingDependency {
            dependency: "letter".to_string()
        }
    );
}
