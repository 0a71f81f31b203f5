//! Tier-1 tool-use loop driven by a scripted model against the fake platform.

mod common;

use serde_json::json;
use std::sync::Arc;

use common::mocks::{call, say, video, ScriptedLlm};
use common::{persona, Harness, HarnessOptions};
use persona_core::constants::{ActionKind, PersonaRole, Tier};
use persona_core::decision::CycleOutcome;

const CLIP: &str = "a8Xk2LmQ";

async fn smart_harness(script: Vec<persona_core::llm::ChatMessage>) -> Harness {
    let harness = Harness::with(HarnessOptions {
        personas: vec![persona("sophia", Tier::Smart, PersonaRole::General)],
        llm: Arc::new(ScriptedLlm::new(script)),
        ..HarnessOptions::default()
    })
    .await;
    harness.platform.set_feed(vec![video(CLIP, "Sunset loop", "bob")]);
    harness
}

#[tokio::test]
async fn liking_the_same_video_twice_hits_the_platform_once() {
    let harness = smart_harness(vec![
        call("browse_feed", json!({})),
        call("like_video", json!({ "video_id": CLIP })),
        call("like_video", json!({ "video_id": CLIP })),
        call("done_for_now", json!({ "reason": "enough" })),
    ])
    .await;
    let brain = harness.brain("sophia").await;
    let client = harness.client("sophia");

    let report = harness.engine.run_smart_cycle(&brain, &client).await.unwrap();

    assert_eq!(report.outcome, CycleOutcome::Done);
    assert_eq!(report.dispatched, 4);
    assert_eq!(harness.platform.likes(), 1);
    let likes = harness
        .store
        .actions_for("sophia")
        .await
        .unwrap()
        .into_iter()
        .filter(|a| a.action_type == ActionKind::Like.as_str())
        .count();
    assert_eq!(likes, 1);
}

#[tokio::test]
async fn repeated_identical_calls_trip_the_loop_guard() {
    let harness = smart_harness(vec![
        call("browse_feed", json!({})),
        call("browse_feed", json!({})),
        call("browse_feed", json!({})),
        call("browse_feed", json!({})),
        call("browse_feed", json!({})),
    ])
    .await;
    let brain = harness.brain("sophia").await;
    let client = harness.client("sophia");

    let report = harness.engine.run_smart_cycle(&brain, &client).await.unwrap();

    assert_eq!(report.outcome, CycleOutcome::LoopGuard);
    assert_eq!(report.turns, 3);
    assert_eq!(report.dispatched, 2);
}

#[tokio::test]
async fn consecutive_errors_exhaust_the_budget() {
    let script = ["fly_away", "teleport", "fly_away", "teleport", "fly_away", "teleport"]
        .iter()
        .map(|name| call(name, json!({})))
        .collect();
    let harness = smart_harness(script).await;
    let brain = harness.brain("sophia").await;
    let client = harness.client("sophia");

    let report = harness.engine.run_smart_cycle(&brain, &client).await.unwrap();

    assert_eq!(report.outcome, CycleOutcome::ErrorBudget);
    assert_eq!(report.dispatched, 5);
    assert!(harness.platform.calls().is_empty());
}

#[tokio::test]
async fn a_silent_model_is_nudged_once_then_the_cycle_ends() {
    let harness = smart_harness(vec![say("I like videos."), say("Still just talking.")]).await;
    let brain = harness.brain("sophia").await;
    let client = harness.client("sophia");

    let report = harness.engine.run_smart_cycle(&brain, &client).await.unwrap();

    assert_eq!(report.outcome, CycleOutcome::NoToolCalls);
    assert_eq!(report.turns, 2);
    assert_eq!(report.dispatched, 0);
}

#[tokio::test]
async fn comment_tool_posts_and_records_the_comment() {
    let harness = smart_harness(vec![
        call("browse_feed", json!({})),
        call("comment_on_video", json!({ "video_id": CLIP, "comment": "  Gorgeous colors!  " })),
    ])
    .await;
    let brain = harness.brain("sophia").await;
    let client = harness.client("sophia");

    let report = harness.engine.run_smart_cycle(&brain, &client).await.unwrap();

    assert_eq!(report.outcome, CycleOutcome::Done);
    let comments = harness.platform.comments();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].1, CLIP);
    assert_eq!(comments[0].2, "Gorgeous colors!");
    assert!(brain.already_commented_on(CLIP).await.unwrap());
}

#[tokio::test]
async fn comment_tool_respects_the_ledger_cooldown_and_placeholder_ids() {
    let harness = smart_harness(vec![
        call("browse_feed", json!({})),
        call("comment_on_video", json!({ "video_id": CLIP, "comment": "Again!" })),
        call("comment_on_video", json!({ "video_id": "video_123", "comment": "Made up" })),
    ])
    .await;
    let brain = harness.brain("sophia").await;
    brain
        .record_action(ActionKind::Comment, Some(CLIP), None, Some("First time"))
        .await
        .unwrap();
    let client = harness.client("sophia");

    harness.engine.run_smart_cycle(&brain, &client).await.unwrap();

    assert!(harness.platform.comments().is_empty());
}

#[tokio::test]
async fn total_llm_outage_fails_only_the_cycle() {
    let harness = Harness::with(HarnessOptions {
        personas: vec![persona("sophia", Tier::Smart, PersonaRole::General)],
        llm: Arc::new(ScriptedLlm::unavailable()),
        ..HarnessOptions::default()
    })
    .await;
    let brain = harness.brain("sophia").await;
    let client = harness.client("sophia");

    let result = harness.engine.run_smart_cycle(&brain, &client).await;

    assert!(result.is_err());
    assert!(harness.platform.calls().is_empty());
}
