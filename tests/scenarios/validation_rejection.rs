//! Test: Validation Rejection - the schema gate and its consequences

use crate::helpers::*;
use serde_json::json;
use skillflow::core::{RunStatus, SkipReason, StepDefinition, StepErrorKind, StepState, ViolationKind};
use skillflow::projection::{Binding, InputProjector, Projection};
use std::sync::Arc;

fn steps() -> Vec<StepDefinition> {
    vec![
        step("intake", 1, json!({"case_id": "string", "procedures": [{"code": "string"}]})),
        step("coverage", 2, json!({"coverage_eligible": "boolean", "coverage_basis": "string"})),
        step("decision", 3, json!({"decision": "string"})),
        step("letter", 4, json!({"text": "string"})),
        step("coding", 5, json!({"codes_valid": "boolean"})),
    ]
}

/// `coding` depends only on `intake`; everything else chains on `coverage`
fn projector() -> InputProjector {
    InputProjector::new()
        .with_rule("intake", Projection::new().bind("documents", Binding::Documents))
        .with_rule("coverage", Projection::new().bind("case", Binding::payload("intake")))
        .with_rule(
            "decision",
            Projection::new().bind(
                "coverage_eligible",
                Binding::field("coverage", "coverage_eligible", json!(false)),
            ),
        )
        .with_rule("letter", Projection::new().bind("decision", Binding::payload("decision")))
        .with_rule(
            "coding",
            Projection::new().bind("procedures", Binding::field("intake", "procedures", json!([]))),
        )
}

fn provider() -> ScriptedProvider {
    ScriptedProvider::new()
        .reply("intake", json!({"case_id": "PA-3", "procedures": [{"code": "62323"}]}))
        // coverage_basis is missing
        .reply("coverage", json!({"coverage_eligible": true}))
        .reply("coding", json!({"codes_valid": true}))
}

/// Scenario: step 2 misses a required field, no retry configured
#[tokio::test]
async fn test_missing_field_rejects_and_skips_dependents() {
    let provider = Arc::new(provider());
    let engine = engine(registry(steps()), provider.clone(), projector());

    let result = engine.run(case_documents()).await;

    let detail = assert_rejected(&result, "coverage", StepErrorKind::ValidationError);
    assert!(detail.contains("$.coverage_basis: missing required field"), "{}", detail);
    match result.state("coverage") {
        Some(StepState::Rejected { violations, attempts, .. }) => {
            assert_eq!(*attempts, 1);
            assert_eq!(violations.len(), 1);
            assert_eq!(violations[0].path, "$.coverage_basis");
            assert_eq!(violations[0].kind, ViolationKind::Missing);
        }
        other => panic!("unexpected state {:?}", other),
    }

    assert_eq!(
        assert_skipped(&result, "decision"),
        &SkipReason::MissingDependency {
            dependency: "coverage".to_string()
        }
    );
    assert_eq!(
        assert_skipped(&result, "letter"),
        &SkipReason::MissingDependency {
            dependency: "decision".to_string()
        }
    );

    // A step that does not depend on the rejected one still runs
    assert_accepted(&result, "coding");
    assert_eq!(result.status, RunStatus::Completed);
    assert!(!result.outputs.contains_key("coverage"));
    assert_eq!(provider.requests_for("coverage").len(), 1);
}

#[tokio::test]
async fn test_summary_explains_rejection() {
    let engine = engine(registry(steps()), Arc::new(provider()), projector());

    let result = engine.run(case_documents()).await;

    let summary = result.summary();
    assert_eq!(summary.len(), 1);
    assert!(summary[0].starts_with("coverage rejected (ValidationError): schema validation failed"));
    assert!(summary[0].ends_with("skipped as a result: decision"));
}

#[tokio::test]
async fn test_type_mismatch_is_reported() {
    let provider = Arc::new(
        ScriptedProvider::new()
            .reply("intake", json!({"case_id": 42, "procedures": [{"code": "62323"}, {"code": 77003}]})),
    );
    let engine = engine(registry(steps()), provider, projector());

    let result = engine.run(case_documents()).await;

    match result.state("intake") {
        Some(StepState::Rejected { violations, .. }) => {
            let paths: Vec<&str> = violations.iter().map(|v| v.path.as_str()).collect();
            assert_eq!(paths, vec!["$.case_id", "$.procedures[1].code"]);
            assert!(violations.iter().all(|v| matches!(
                &v.kind,
                ViolationKind::TypeMismatch { expected, found } if expected == "string" && found == "number"
            )));
        }
        other => panic!("unexpected state {:?}", other),
    }
    // Nothing downstream can run without the intake payload
    assert_eq!(result.skipped().len(), 4);
    assert!(result.outputs.is_empty());
}

#[tokio::test]
async fn test_mandatory_dependent_halts_run() {
    let mut steps = steps();
    steps[2] = step("decision", 3, json!({"decision": "string"})).mandatory();
    let provider = Arc::new(provider());
    let engine = engine(registry(steps), provider.clone(), projector());

    let result = engine.run(case_documents()).await;

    assert_eq!(result.status, RunStatus::Halted);
    let detail = assert_rejected(&result, "decision", StepErrorKind::MissingDependency);
    assert!(detail.contains("coverage"));
    let halt = result.halted.as_ref().unwrap();
    assert_eq!(halt.step, "decision");
    assert_eq!(halt.kind, StepErrorKind::MissingDependency);

    assert_eq!(assert_skipped(&result, "letter"), &SkipReason::RunHalted);
    assert_eq!(assert_skipped(&result, "coding"), &SkipReason::RunHalted);
    assert!(!provider.calls().contains(&"coding".to_string()));
}

#[tokio::test]
async fn test_non_object_output_is_rejected() {
    let provider = Arc::new(ScriptedProvider::new().reply("intake", json!(["PA-3"])));
    let engine = engine(registry(steps()), provider, projector());

    let result = engine.run(case_documents()).await;

    let detail = assert_rejected(&result, "intake", StepErrorKind::ValidationError);
    assert!(detail.contains("$: expected object, found array"), "{}", detail);
}
