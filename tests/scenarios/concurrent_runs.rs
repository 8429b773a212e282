//! Test: Concurrent Runs - one engine, many isolated runs

use crate::helpers::*;
use async_trait::async_trait;
use serde_json::{json, Value};
use skillflow::agent::{ReasoningError, ReasoningProvider, ReasoningRequest};
use skillflow::core::RawInput;
use std::collections::HashSet;
use std::sync::Arc;

/// Copies the case id from the documents (first step) or from the
/// previous payload (later steps), yielding in between so runs interleave
struct CaseEcho;

#[async_trait]
impl ReasoningProvider for CaseEcho {
    async fn reason(&self, request: &ReasoningRequest) -> Result<Value, ReasoningError> {
        tokio::task::yield_now().await;
        let case_id = match request.input.get("previous") {
            Some(previous) => previous["case_id"].clone(),
            None => request.input["documents"][0]["text"].clone(),
        };
        tokio::task::yield_now().await;
        Ok(json!({"case_id": case_id, "step": request.step_identifier}))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_runs_do_not_share_state() {
    let ids = ["intake", "review", "decide"];
    let steps = ids
        .iter()
        .enumerate()
        .map(|(i, id)| step(id, i as u32 + 1, json!({"case_id": "string", "step": "string"})))
        .collect();
    let engine = Arc::new(engine(registry(steps), Arc::new(CaseEcho), chain_projector(&ids)));

    let handles: Vec<_> = (0..10)
        .map(|n| {
            let engine = engine.clone();
            tokio::spawn(async move {
                let case_id = format!("PA-2024-{:03}", n);
                let input = RawInput::new().with_document("referral_fax.txt", case_id.clone());
                (case_id, engine.run(input).await)
            })
        })
        .collect();

    let mut run_ids = HashSet::new();
    for handle in handles {
        let (case_id, result) = handle.await.unwrap();
        assert!(result.is_completed());
        assert!(run_ids.insert(result.run_id), "run ids must be unique");
        assert_eq!(result.outputs.len(), 3);
        for id in ids {
            assert_eq!(result.outputs[id]["case_id"], case_id.as_str());
            assert_eq!(result.outputs[id]["step"], id);
        }
    }
    assert_eq!(run_ids.len(), 10);
}

#[tokio::test]
async fn test_sequential_runs_start_from_empty_store() {
    let provider = Arc::new(
        ScriptedProvider::new()
            .reply("intake", json!({"summary": "first"}))
            .reply("intake", json!({"summary": "second"})),
    );
    let steps = vec![step("intake", 1, json!({"summary": "string"}))];
    let engine = engine(registry(steps), provider.clone(), chain_projector(&["intake"]));

    let first = engine.run(case_documents()).await;
    let second = engine.run(case_documents()).await;

    assert_eq!(first.outputs["intake"]["summary"], "first");
    assert_eq!(second.outputs["intake"]["summary"], "second");
    assert_ne!(first.run_id, second.run_id);

    let requests = provider.requests_for("intake");
    assert_eq!(requests.len(), 2);
    assert_ne!(requests[0].run_id, requests[1].run_id);
}
