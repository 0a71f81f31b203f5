//! State that must survive a restart: schedules, the action ledger and known videos.

mod common;

use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use common::{persona, start_time, Harness, HarnessOptions};
use persona_core::constants::{ActionKind, PersonaRole, Tier};
use persona_core::models::ActorScheduleState;
use persona_core::utils::{Clock, ManualClock};

fn file_options(dir: &TempDir) -> HarnessOptions {
    let path = dir.path().join("persona-state.db");
    HarnessOptions {
        personas: vec![persona("alpha", Tier::Standard, PersonaRole::General)],
        database_url: format!("sqlite://{}", path.display()),
        ..HarnessOptions::default()
    }
}

#[tokio::test]
async fn schedule_ledger_and_known_videos_survive_a_restart() {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::new(start_time()));

    let first = Harness::with_clock(file_options(&dir), clock.clone()).await;
    let brain = first.brain("alpha").await;
    brain.compute_next_wake().await.unwrap();
    let wake = brain.snapshot().next_wake_ts;
    brain
        .record_action(ActionKind::Comment, Some("K9pQ2xL"), Some("bob"), Some("Lovely light."))
        .await
        .unwrap();
    brain
        .record_action(ActionKind::Upload, Some("up0001"), None, Some("Morning walk"))
        .await
        .unwrap();
    assert!(first.engine.known_videos().track("Kv00001").await.unwrap());
    first.store.shutdown().await;
    drop(brain);
    drop(first);

    clock.advance(Duration::from_secs(60));
    let second = Harness::with_clock(file_options(&dir), clock.clone()).await;
    let brain = second.brain("alpha").await;

    assert_eq!(brain.snapshot().next_wake_ts, wake);
    assert_eq!(brain.videos_uploaded(), 1);
    assert!(brain.already_commented_on("K9pQ2xL").await.unwrap());
    assert!(second.engine.known_videos().contains("Kv00001"));
    assert!(!second.engine.known_videos().track("Kv00001").await.unwrap());

    let ledger = second.store.actions_for("alpha").await.unwrap();
    assert_eq!(ledger.len(), 2);
    assert_eq!(ledger[0].target_actor.as_deref(), Some("bob"));
}

#[tokio::test]
async fn a_corrupt_far_future_wake_is_redrawn_within_the_interval() {
    let harness = Harness::new().await;
    let now = harness.clock.epoch_secs();
    let mut state = ActorScheduleState::new("alpha");
    state.next_wake_ts = now + 30.0 * 86_400.0;
    harness.store.save_actor_state(state).await.unwrap();

    let brain = harness.brain("alpha").await;

    let wait = brain.seconds_until_wake();
    assert!((3600.0..=7200.0).contains(&wait), "redrawn wake {wait}");
}

#[tokio::test]
async fn a_past_wake_is_staggered_shortly_into_the_future() {
    let harness = Harness::new().await;
    let mut state = ActorScheduleState::new("alpha");
    state.next_wake_ts = harness.clock.epoch_secs() - 900.0;
    state.videos_uploaded = 4;
    harness.store.save_actor_state(state).await.unwrap();

    let brain = harness.brain("alpha").await;

    assert!(!brain.is_due());
    assert!((30.0..=600.0).contains(&brain.seconds_until_wake()));
    assert_eq!(brain.videos_uploaded(), 4);
}
