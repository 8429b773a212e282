//! Test: Tool Gaps - skipped and failed lookups degrade to "unverified"

use crate::helpers::*;
use serde_json::json;
use skillflow::core::{StepDefinition, StepState};
use skillflow::persistence::{AuditLog, InMemoryAuditLog};
use skillflow::projection::{Binding, InputProjector, Projection};
use skillflow::tools::{ToolDispatcher, ToolSpec, ToolStatus};
use std::sync::Arc;

fn steps() -> Vec<StepDefinition> {
    vec![
        step("intake", 1, json!({"provider": "object", "diagnoses": ["string"]})),
        step("validate", 2, json!({"provider_valid": "boolean", "issues": ["string"]})).with_tools(),
    ]
}

fn projector() -> InputProjector {
    InputProjector::new()
        .with_rule("intake", Projection::new().bind("documents", Binding::Documents))
        .with_rule(
            "validate",
            Projection::new()
                .bind("provider", Binding::field("intake", "provider", json!({})))
                .bind("diagnoses", Binding::field("intake", "diagnoses", json!([]))),
        )
}

fn dispatcher(backend: Arc<MockToolBackend>, audit: Arc<InMemoryAuditLog>) -> ToolDispatcher {
    ToolDispatcher::new(Some(backend))
        .with_tool(ToolSpec::new("lookup_npi", "NPI registry").arg("npi", "provider.npi"))
        .with_tool(ToolSpec::new("lookup_icd10", "ICD-10 lookup").arg("code", "diagnoses[]"))
        .permit("validate", ["lookup_npi", "lookup_icd10"])
        .with_audit_log(audit)
}

/// Scenario: the logical input lacks the field a declared tool requires
#[tokio::test]
async fn test_missing_tool_argument_is_a_gap_not_a_failure() {
    let backend = Arc::new(MockToolBackend::new());
    let audit = Arc::new(InMemoryAuditLog::new());
    let provider = Arc::new(
        ScriptedProvider::new()
            .reply("intake", json!({"provider": {"name": "Dr. Smith"}, "diagnoses": ["M54.16"]}))
            .reply(
                "validate",
                json!({"provider_valid": false, "issues": ["provider NPI unverified"]}),
            ),
    );
    let engine = builder(registry(steps()), provider.clone(), projector())
        .tools(dispatcher(backend.clone(), audit.clone()))
        .build()
        .unwrap();

    let result = engine.run(case_documents()).await;

    // The step still reaches ACCEPTED
    match result.state("validate") {
        Some(StepState::Accepted {
            tool_gaps,
            unverified,
            ..
        }) => {
            assert_eq!(tool_gaps.len(), 1);
            assert_eq!(tool_gaps[0].tool, "lookup_npi");
            assert!(tool_gaps[0].reason.contains("npi"));
            assert!(*unverified);
        }
        other => panic!("unexpected state {:?}", other),
    }

    // The NPI lookup was never invoked, the ICD-10 lookup was
    assert_eq!(backend.calls_to("lookup_npi"), 0);
    assert_eq!(backend.calls_to("lookup_icd10"), 1);

    // The provider was told about the skipped lookup
    let request = &provider.requests_for("validate")[0];
    assert!(request.uses_tools);
    assert!(request.has_tool_gaps());
    assert!(request.tool_outcomes.iter().any(|o| o.tool == "lookup_npi"
        && o.status
            == ToolStatus::Skipped {
                missing_argument: "npi".to_string()
            }));

    // Every attempt is audited with the invoking step
    let entries = audit.entries(result.run_id).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e.step_identifier == "validate"));
    assert!(entries.iter().any(|e| e.tool == "lookup_npi" && e.status.label() == "skipped"));
}

#[tokio::test]
async fn test_failed_lookup_is_unverified() {
    let backend = Arc::new(MockToolBackend::new().with_failure("lookup_npi", "registry unavailable"));
    let audit = Arc::new(InMemoryAuditLog::new());
    let provider = Arc::new(
        ScriptedProvider::new()
            .reply(
                "intake",
                json!({"provider": {"npi": "1234567893"}, "diagnoses": ["M54.16", "M51.26"]}),
            )
            .reply("validate", json!({"provider_valid": true, "issues": []})),
    );
    let engine = builder(registry(steps()), provider.clone(), projector())
        .tools(dispatcher(backend.clone(), audit.clone()))
        .build()
        .unwrap();

    let result = engine.run(case_documents()).await;

    assert_eq!(backend.calls_to("lookup_npi"), 1);
    // One call per diagnosis code
    assert_eq!(backend.calls_to("lookup_icd10"), 2);

    let request = &provider.requests_for("validate")[0];
    let npi = request
        .tool_outcomes
        .iter()
        .find(|o| o.tool == "lookup_npi")
        .unwrap();
    assert_eq!(npi.args["npi"], json!("1234567893"));
    assert!(matches!(&npi.status, ToolStatus::Unverified { error } if error.contains("registry unavailable")));

    match result.state("validate") {
        Some(StepState::Accepted { tool_gaps, unverified, .. }) => {
            assert_eq!(tool_gaps.len(), 1);
            assert!(tool_gaps[0].reason.starts_with("unverified"));
            assert!(!*unverified);
        }
        other => panic!("unexpected state {:?}", other),
    }
    assert_eq!(audit.entries(result.run_id).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_steps_without_tools_never_call_them() {
    let backend = Arc::new(MockToolBackend::new());
    let provider = Arc::new(
        ScriptedProvider::new()
            .reply("intake", json!({"provider": {"npi": "1"}, "diagnoses": ["M54.16"]}))
            .reply("validate", json!({"provider_valid": true, "issues": []})),
    );
    let engine = builder(registry(steps()), provider.clone(), projector())
        .tools(dispatcher(backend.clone(), Arc::new(InMemoryAuditLog::new())))
        .build()
        .unwrap();

    engine.run(case_documents()).await;

    assert!(provider.requests_for("intake")[0].tool_outcomes.is_empty());
    assert_eq!(backend.calls().len(), 2);
}

#[test]
fn test_tool_grant_to_non_tool_step_is_refused() {
    let steps = vec![
        step("intake", 1, json!({"provider": "object"})),
        step("validate", 2, json!({"provider_valid": "boolean"})),
    ];
    let err = builder(registry(steps), Arc::new(ScriptedProvider::new()), projector())
        .tools(dispatcher(
            Arc::new(MockToolBackend::new()),
            Arc::new(InMemoryAuditLog::new()),
        ))
        .build()
        .err()
        .unwrap();
    assert!(err.to_string().contains("uses_tools"), "{}", err);
}
