//! Orchestration loop: bootstrap, single-run mode, health snapshot and shutdown.

mod common;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;
use tower::ServiceExt;

use common::mocks::{story, video, MockConnector, ScriptedLlm};
use common::{persona, start_time, Harness, HarnessOptions};
use persona_core::clients::VideoGenerator;
use persona_core::config::{DecisionConfig, PacingConfig, RateLimitConfig};
use persona_core::constants::{PersonaRole, Tier};
use persona_core::error::{MediaError, MediaResult, PersonaError};
use persona_core::orchestration::PersonaDaemon;
use persona_core::utils::Clock;
use persona_core::web::{create_app, WebState};

/// Past the longest startup stagger, so every restored persona is due
const PAST_STAGGER: Duration = Duration::from_secs(601);

/// Requests daemon shutdown from inside an action, then reports itself offline
#[derive(Default)]
struct ShutdownMidAction {
    daemon: OnceLock<Weak<PersonaDaemon>>,
}

#[async_trait]
impl VideoGenerator for ShutdownMidAction {
    async fn generate(&self, _prompt: &str, _actor: &str) -> MediaResult<PathBuf> {
        if let Some(daemon) = self.daemon.get().and_then(Weak::upgrade) {
            daemon.shutdown();
        }
        Err(MediaError::Unavailable("generator offline".to_string()))
    }
}

#[tokio::test]
async fn bootstrap_skips_personas_without_a_key() {
    let mut keyless = persona("ghost", Tier::Standard, PersonaRole::General);
    keyless.api_key = None;
    let harness = Harness::with(HarnessOptions {
        personas: vec![persona("alpha", Tier::Standard, PersonaRole::General), keyless],
        ..HarnessOptions::default()
    })
    .await;

    let daemon = PersonaDaemon::bootstrap(harness.services(PacingConfig::default()))
        .await
        .unwrap();

    assert_eq!(daemon.actor_ids(), vec!["alpha".to_string()]);
    assert!(daemon.brain("ghost").is_none());
}

#[tokio::test]
async fn bootstrap_registers_keyless_personas_when_enabled() {
    let mut keyless = persona("ghost", Tier::Standard, PersonaRole::General);
    keyless.api_key = None;
    let harness = Harness::with(HarnessOptions {
        personas: vec![keyless],
        ..HarnessOptions::default()
    })
    .await;
    let mut services = harness.services(PacingConfig::default());
    services.auto_register = true;
    services.connector = Arc::new(MockConnector {
        state: harness.platform.clone(),
        issued_key: Some("issued-ghost".to_string()),
    });

    let daemon = PersonaDaemon::bootstrap(services).await.unwrap();

    assert_eq!(daemon.actor_ids(), vec!["ghost".to_string()]);
    assert_eq!(harness.registry.api_key("ghost").as_deref(), Some("issued-ghost"));
}

#[tokio::test]
async fn bootstrap_fails_when_nobody_can_act() {
    let mut keyless = persona("ghost", Tier::Standard, PersonaRole::General);
    keyless.api_key = None;
    let harness = Harness::with(HarnessOptions {
        personas: vec![keyless],
        ..HarnessOptions::default()
    })
    .await;

    let result = PersonaDaemon::bootstrap(harness.services(PacingConfig::default())).await;

    assert!(matches!(result, Err(PersonaError::InvalidState(_))));
}

#[tokio::test]
async fn run_once_executes_at_most_the_configured_number_of_actions() {
    let llm = Arc::new(ScriptedLlm::new(Vec::new()));
    let harness = Harness::with(HarnessOptions {
        personas: vec![
            persona("desk", Tier::Standard, PersonaRole::News),
            persona("sky", Tier::Standard, PersonaRole::Weather),
            persona("janitor", Tier::Standard, PersonaRole::Moderation),
            persona("sophia", Tier::Smart, PersonaRole::General),
        ],
        llm: llm.clone(),
        stories: vec![story("Harbor festival returns")],
        ..HarnessOptions::default()
    })
    .await;
    let daemon = PersonaDaemon::bootstrap(harness.services(PacingConfig {
        run_once_max_actions: 3,
        ..PacingConfig::default()
    }))
    .await
    .unwrap();
    harness.clock.advance(PAST_STAGGER);

    let succeeded = daemon.run_once().await.unwrap();

    assert_eq!(succeeded, 3);
    assert_eq!(harness.platform.uploads().len(), 2);
    // the smart persona was fourth in line and never ran
    assert_eq!(llm.tool_turns.load(Ordering::SeqCst), 0);
    // every due persona was rescheduled, including the one that did not run
    for id in daemon.actor_ids() {
        assert!(daemon.brain(&id).unwrap().seconds_until_wake() > 0.0, "{id} still due");
    }
}

#[tokio::test]
async fn run_once_skips_tier_two_actions_the_governor_holds_back() {
    let harness = Harness::with(HarnessOptions {
        personas: vec![persona("alpha", Tier::Standard, PersonaRole::General)],
        decision: DecisionConfig {
            browse_probability: 1.0,
            payload_probability: 0.0,
            ..DecisionConfig::default()
        },
        rate_limits: RateLimitConfig {
            max_actions_per_hour: 1,
            ..RateLimitConfig::default()
        },
        ..HarnessOptions::default()
    })
    .await;
    harness.platform.set_feed(vec![video("Bb22222", "Bob's garden", "bob")]);
    harness.engine.governor().record_action();
    let daemon = PersonaDaemon::bootstrap(harness.services(PacingConfig::default()))
        .await
        .unwrap();
    harness.clock.advance(PAST_STAGGER);

    let succeeded = daemon.run_once().await.unwrap();

    assert_eq!(succeeded, 0);
    assert!(harness.platform.comments().is_empty());
}

#[tokio::test]
async fn health_snapshot_reports_every_active_persona() {
    let harness = Harness::with(HarnessOptions {
        personas: vec![
            persona("alpha", Tier::Standard, PersonaRole::General),
            persona("sophia", Tier::Smart, PersonaRole::General),
        ],
        ..HarnessOptions::default()
    })
    .await;
    let daemon = PersonaDaemon::bootstrap(harness.services(PacingConfig::default()))
        .await
        .unwrap();
    harness.engine.governor().record_action();
    harness.clock.advance(Duration::from_secs(120));

    let snapshot = daemon.health_snapshot().await;

    assert!(snapshot.ok);
    assert_eq!(snapshot.bots, 2);
    assert_eq!(snapshot.uptime_s, 120);
    assert_eq!(snapshot.actions_last_hour, 1);
    assert_eq!(snapshot.videos_today, 0);

    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(json["bot_status"]["sophia"]["tier"], "smart");
    assert_eq!(json["bot_status"]["alpha"]["tier"], "standard");
    assert_eq!(json["bot_status"]["alpha"]["comments_1h"], 0);
}

#[tokio::test]
async fn health_endpoint_serves_json_and_404s_everything_else() {
    let harness = Harness::new().await;
    let daemon = Arc::new(
        PersonaDaemon::bootstrap(harness.services(PacingConfig::default()))
            .await
            .unwrap(),
    );
    let app = create_app(Arc::new(WebState::new(daemon)));

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["ok"], true);
    assert_eq!(json["bots"], 1);

    let response = app
        .oneshot(Request::builder().uri("/admin").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_stops_a_running_loop() {
    let harness = Harness::with(HarnessOptions {
        personas: vec![
            persona("alpha", Tier::Standard, PersonaRole::General),
            persona("bob", Tier::Standard, PersonaRole::General),
            persona("sophia", Tier::Smart, PersonaRole::General),
        ],
        rate_limits: RateLimitConfig {
            max_actions_per_hour: 4,
            ..RateLimitConfig::default()
        },
        ..HarnessOptions::default()
    })
    .await;
    harness.platform.set_feed(vec![
        video("Aa11111", "One", "carol"),
        video("Bb22222", "Two", "dave"),
        video("Cc33333", "Three", "erin"),
    ]);
    let daemon = Arc::new(
        PersonaDaemon::bootstrap(harness.services(PacingConfig::default()))
            .await
            .unwrap(),
    );

    let runner = tokio::spawn({
        let daemon = daemon.clone();
        async move { daemon.run().await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    daemon.shutdown();

    tokio::time::timeout(Duration::from_secs(10), runner)
        .await
        .expect("loop did not stop")
        .unwrap();
    assert!(!daemon.is_running());
    assert!(harness.clock.now() > start_time());
}

#[tokio::test]
async fn uploads_seen_while_browsing_still_trigger_reactions() {
    let harness = Harness::with(HarnessOptions {
        personas: vec![
            persona("alpha", Tier::Standard, PersonaRole::General),
            persona("bob", Tier::Standard, PersonaRole::General),
        ],
        decision: DecisionConfig {
            reaction_probability: 1.0,
            payload_probability: 0.0,
            ..DecisionConfig::default()
        },
        ..HarnessOptions::default()
    })
    .await;
    let daemon = PersonaDaemon::bootstrap(harness.services(PacingConfig::default()))
        .await
        .unwrap();
    harness.platform.set_feed(vec![video("Nw12345", "Fresh upload", "carol")]);

    // bob browses first, which puts the upload into the known-video cache
    let bob = daemon.brain("bob").unwrap().clone();
    assert!(harness.engine.browse(&bob, &harness.client("bob")).await.unwrap());
    assert!(harness.engine.known_videos().contains("Nw12345"));

    let fresh = daemon.poll_new_activity().await;
    let ids: Vec<&str> = fresh.iter().map(|v| v.video_id.as_str()).collect();
    assert_eq!(ids, vec!["Nw12345"]);

    let reactions = daemon.reactive_candidates(&fresh).await.unwrap();
    let actors: Vec<&str> = reactions.iter().map(|action| action.actor()).collect();
    assert_eq!(actors, vec!["alpha"]);

    // reported once only
    assert!(daemon.poll_new_activity().await.is_empty());
}

#[tokio::test]
async fn uploads_known_before_a_restart_are_not_reported_as_new() {
    let harness = Harness::new().await;
    assert!(harness.engine.known_videos().track("Old0001").await.unwrap());
    harness.platform.set_feed(vec![
        video("Old0001", "Yesterday", "carol"),
        video("New0002", "Today", "carol"),
    ]);
    let daemon = PersonaDaemon::bootstrap(harness.services(PacingConfig::default()))
        .await
        .unwrap();

    let fresh = daemon.poll_new_activity().await;

    assert_eq!(fresh.len(), 1);
    assert_eq!(fresh[0].video_id, "New0002");
}

#[tokio::test]
async fn shutdown_during_an_action_skips_the_remaining_pauses() {
    let generator = Arc::new(ShutdownMidAction::default());
    let harness = Harness::with(HarnessOptions {
        decision: DecisionConfig {
            browse_probability: 0.0,
            video_chance_medium: 1.0,
            payload_probability: 0.0,
            ..DecisionConfig::default()
        },
        generator: generator.clone(),
        ..HarnessOptions::default()
    })
    .await;
    let daemon = Arc::new(
        PersonaDaemon::bootstrap(harness.services(PacingConfig::default()))
            .await
            .unwrap(),
    );
    assert!(generator.daemon.set(Arc::downgrade(&daemon)).is_ok());
    harness.clock.advance(PAST_STAGGER);

    tokio::time::timeout(Duration::from_secs(10), daemon.run())
        .await
        .expect("loop did not stop");

    // the upload finished on the compositor fallback
    assert_eq!(harness.platform.uploads().len(), 1);
    assert!(!daemon.is_running());
    // neither the post-action delay nor the poll delay was slept
    assert_eq!(harness.clock.now(), start_time() + chrono::Duration::seconds(601));
}

#[tokio::test]
async fn shutdown_before_run_returns_without_pausing() {
    let harness = Harness::new().await;
    let daemon = PersonaDaemon::bootstrap(harness.services(PacingConfig::default()))
        .await
        .unwrap();

    daemon.shutdown();
    tokio::time::timeout(Duration::from_secs(10), daemon.run())
        .await
        .expect("loop did not stop");

    assert!(!daemon.is_running());
    assert_eq!(harness.clock.now(), start_time());
    assert!(harness.platform.calls().is_empty());
}
