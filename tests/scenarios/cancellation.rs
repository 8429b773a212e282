//! Test: Cancellation - an operator cancel halts the run at a step boundary
//! or interrupts the step in flight

use crate::helpers::*;
use serde_json::json;
use skillflow::core::{RunStatus, SkipReason, StepDefinition, StepErrorKind};
use skillflow::execution::{CancelHandle, ExecutionEvent};
use skillflow::projection::{Binding, InputProjector, Projection};
use std::sync::Arc;
use std::time::Duration;

fn three_steps() -> Vec<StepDefinition> {
    vec![
        step("intake", 1, json!({"summary": "string"})),
        step("review", 2, json!({"finding": "string"})),
        step("decide", 3, json!({"decision": "string"})),
    ]
}

#[tokio::test]
async fn test_cancel_interrupts_running_step() {
    let provider = Arc::new(
        ScriptedProvider::new()
            .reply("intake", json!({"summary": "never used"}))
            .with_delay(Duration::from_secs(30)),
    );
    let engine = engine(
        registry(three_steps()),
        provider.clone(),
        chain_projector(&["intake", "review", "decide"]),
    );

    let cancel = CancelHandle::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let result = engine.run_with_cancel(case_documents(), &cancel).await;

    assert_eq!(result.status, RunStatus::Halted);
    let detail = assert_rejected(&result, "intake", StepErrorKind::Cancelled);
    assert!(detail.contains("cancelled"));
    assert_eq!(*assert_skipped(&result, "review"), SkipReason::RunHalted);
    assert_eq!(*assert_skipped(&result, "decide"), SkipReason::RunHalted);

    let halt = result.halted.as_ref().unwrap();
    assert_eq!(halt.step, "intake");
    assert_eq!(halt.kind, StepErrorKind::Cancelled);

    // Nothing reached the store
    assert!(result.outputs.is_empty());
    assert_eq!(provider.calls(), vec!["intake"]);
}

#[tokio::test]
async fn test_cancel_between_steps_keeps_accepted_output() {
    let provider = Arc::new(
        ScriptedProvider::new()
            .reply("intake", json!({"summary": "L4-L5 radiculopathy"}))
            .reply("review", json!({"finding": "unused"})),
    );
    let cancel = CancelHandle::new();
    let trigger = cancel.clone();
    let engine = builder(
        registry(three_steps()),
        provider.clone(),
        chain_projector(&["intake", "review", "decide"]),
    )
    .on_event(move |event| {
        if matches!(event, ExecutionEvent::StepAccepted { step, .. } if step == "intake") {
            trigger.cancel();
        }
    })
    .build()
    .unwrap();

    let result = engine.run_with_cancel(case_documents(), &cancel).await;

    assert_eq!(result.status, RunStatus::Halted);
    assert_accepted(&result, "intake");
    assert_eq!(*assert_skipped(&result, "review"), SkipReason::RunHalted);
    assert_eq!(*assert_skipped(&result, "decide"), SkipReason::RunHalted);

    let halt = result.halted.as_ref().unwrap();
    assert_eq!(halt.step, "review");
    assert_eq!(halt.kind, StepErrorKind::Cancelled);

    assert_eq!(result.outputs.len(), 1);
    assert_eq!(provider.calls(), vec!["intake"]);
}

#[tokio::test]
async fn test_cancelled_before_start_runs_nothing() {
    let provider = Arc::new(ScriptedProvider::new());
    let engine = engine(
        registry(three_steps()),
        provider.clone(),
        chain_projector(&["intake", "review", "decide"]),
    );
    let cancel = CancelHandle::new();
    cancel.cancel();

    let result = engine.run_with_cancel(case_documents(), &cancel).await;

    assert!(result.is_halted());
    assert_eq!(result.skipped(), vec!["intake", "review", "decide"]);
    assert_eq!(result.halted.as_ref().unwrap().step, "intake");
    assert!(provider.calls().is_empty());
}

#[tokio::test]
async fn test_step_timeout_follows_rejection_policy() {
    let provider = Arc::new(
        ScriptedProvider::new()
            .reply("intake", json!({"summary": "late"}))
            .reply("audit", json!({"note": "independent"}))
            .with_delay(Duration::from_secs(2)),
    );
    let steps = vec![
        step("intake", 1, json!({"summary": "string"})).with_timeout(1),
        step("audit", 2, json!({"note": "string"})),
    ];
    let projector = InputProjector::new()
        .with_rule("intake", Projection::new().bind("documents", Binding::Documents))
        .with_rule("audit", Projection::new().bind("documents", Binding::Documents));
    let engine = engine(registry(steps), provider.clone(), projector);

    let result = engine.run(case_documents()).await;

    let detail = assert_rejected(&result, "intake", StepErrorKind::Cancelled);
    assert!(detail.contains("timed out after 1 seconds"));
    // A timeout is not an operator cancel, so the independent step still runs
    assert_accepted(&result, "audit");
    assert_eq!(result.status, RunStatus::Completed);
}
