//! Tier-2 and role cycles: ledger cooldowns, quotas and role dedup windows.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::mocks::{story, video, FakeModeration};
use common::{persona, Harness, HarnessOptions};
use persona_core::clients::{ScanHit, ScanReport};
use persona_core::config::RateLimitConfig;
use persona_core::constants::{ActionKind, PersonaRole, Tier};
use persona_core::decision::city_key;

const DAY: Duration = Duration::from_secs(86_400);

fn alpha_only() -> HarnessOptions {
    HarnessOptions {
        personas: vec![
            persona("alpha", Tier::Standard, PersonaRole::General),
            persona("bob", Tier::Standard, PersonaRole::General),
        ],
        ..HarnessOptions::default()
    }
}

#[tokio::test]
async fn browse_skips_own_videos_and_honors_the_daily_cooldown() {
    let harness = Harness::with(alpha_only()).await;
    harness.platform.set_feed(vec![
        video("Own0001", "My own upload", "alpha"),
        video("K9pQ2xL", "Bob's garden", "bob"),
    ]);
    let brain = harness.brain("alpha").await;
    let client = harness.client("alpha");

    assert!(harness.engine.browse(&brain, &client).await.unwrap());
    let comments = harness.platform.comments();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].0, "alpha");
    assert_eq!(comments[0].1, "K9pQ2xL");

    // only candidate is on cooldown
    assert!(!harness.engine.browse(&brain, &client).await.unwrap());

    harness.clock.advance(Duration::from_secs(23 * 3600));
    assert!(!harness.engine.browse(&brain, &client).await.unwrap());

    harness.clock.advance(Duration::from_secs(3601));
    assert!(harness.engine.browse(&brain, &client).await.unwrap());
    assert_eq!(harness.platform.comments().len(), 2);
}

#[tokio::test]
async fn hourly_comment_cap_blocks_further_comments() {
    let harness = Harness::with(HarnessOptions {
        rate_limits: RateLimitConfig {
            max_comments_per_actor_per_hour: 2,
            ..RateLimitConfig::default()
        },
        ..alpha_only()
    })
    .await;
    harness.platform.set_feed(vec![
        video("Aa11111", "One", "bob"),
        video("Bb22222", "Two", "bob"),
        video("Cc33333", "Three", "bob"),
    ]);
    let brain = harness.brain("alpha").await;
    let client = harness.client("alpha");

    assert!(harness.engine.browse(&brain, &client).await.unwrap());
    assert!(harness.engine.browse(&brain, &client).await.unwrap());
    assert!(!harness.engine.browse(&brain, &client).await.unwrap());
    assert!(!brain.can_comment().await.unwrap());
    assert_eq!(brain.comments_last_hour().await.unwrap(), 2);

    harness.clock.advance(Duration::from_secs(3601));
    assert!(brain.can_comment().await.unwrap());
}

#[tokio::test]
async fn react_rechecks_the_ledger_before_commenting() {
    let harness = Harness::with(alpha_only()).await;
    let clip = video("Zz99999", "Fresh upload", "bob");
    harness.platform.set_feed(vec![clip.clone()]);
    let brain = harness.brain("alpha").await;
    let client = harness.client("alpha");

    assert!(harness.engine.react(&brain, &client, &clip).await.unwrap());
    assert!(!harness.engine.react(&brain, &client, &clip).await.unwrap());
    assert_eq!(harness.platform.comments().len(), 1);
}

#[tokio::test]
async fn generated_videos_fall_back_to_a_text_card_and_count_uploads() {
    let harness = Harness::with(alpha_only()).await;
    let brain = harness.brain("alpha").await;
    let client = harness.client("alpha");

    let uploaded = harness.engine.generate_video(&brain, &client).await.unwrap();

    assert!(uploaded.is_some());
    assert_eq!(brain.videos_uploaded(), 1);
    assert_eq!(harness.compositor.cards.lock().len(), 1);
    let uploads = harness.platform.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].0, "alpha");
}

#[tokio::test]
async fn generation_stops_once_the_daily_video_quota_is_spent() {
    let harness = Harness::with(HarnessOptions {
        rate_limits: RateLimitConfig {
            max_videos_per_day: 1,
            ..RateLimitConfig::default()
        },
        ..alpha_only()
    })
    .await;
    harness.engine.governor().record_video();
    let brain = harness.brain("alpha").await;
    let client = harness.client("alpha");

    assert!(harness.engine.generate_video(&brain, &client).await.unwrap().is_none());
    assert!(harness.platform.uploads().is_empty());
}

#[tokio::test]
async fn weather_covers_each_city_once_per_day() {
    let harness = Harness::with(HarnessOptions {
        personas: vec![persona("sky", Tier::Standard, PersonaRole::Weather)],
        ..HarnessOptions::default()
    })
    .await;
    let brain = harness.brain("sky").await;
    let client = harness.client("sky");

    let first = harness.engine.run_weather_cycle(&brain, &client).await.unwrap();
    assert!(first.is_some());
    let second = harness.engine.run_weather_cycle(&brain, &client).await.unwrap();
    assert!(second.is_none());

    let uploads = harness.platform.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].2.as_deref(), Some("weather"));
    let keys = brain
        .recent_action_texts(ActionKind::WeatherUpload, 2 * DAY)
        .await
        .unwrap();
    assert_eq!(keys, vec![city_key("Denver", "2026-03-02")]);

    harness.clock.advance(DAY);
    assert!(harness.engine.run_weather_cycle(&brain, &client).await.unwrap().is_some());
    assert_eq!(harness.compositor.weather_cards.lock().len(), 2);
}

#[tokio::test]
async fn news_never_repeats_a_headline_within_the_window() {
    let harness = Harness::with(HarnessOptions {
        personas: vec![persona("desk", Tier::Standard, PersonaRole::News)],
        stories: vec![story("Rivers rise in the valley"), story("New bridge opens")],
        ..HarnessOptions::default()
    })
    .await;
    let brain = harness.brain("desk").await;
    let client = harness.client("desk");

    for _ in 0..2 {
        assert!(harness.engine.run_news_cycle(&brain, &client).await.unwrap().is_some());
    }
    assert!(harness.engine.run_news_cycle(&brain, &client).await.unwrap().is_none());

    let titles: Vec<String> = harness.platform.uploads().into_iter().map(|u| u.1).collect();
    assert_eq!(
        titles,
        vec![
            "BREAKING: Rivers rise in the valley".to_string(),
            "BREAKING: New bridge opens".to_string()
        ]
    );
    // avatar is unavailable, so both segments were text cards
    let cards = harness.compositor.cards.lock();
    assert_eq!(cards.len(), 2);
    assert_eq!(cards[0].lines[0], "BREAKING NEWS");
}

#[tokio::test]
async fn moderation_without_an_admin_key_does_nothing() {
    let harness = Harness::with(HarnessOptions {
        personas: vec![persona("janitor", Tier::Standard, PersonaRole::Moderation)],
        ..HarnessOptions::default()
    })
    .await;
    let brain = harness.brain("janitor").await;
    let client = harness.client("janitor");

    let report = harness.engine.run_moderation_sweep(&brain, &client).await.unwrap();

    assert!(report.skipped);
    assert_eq!(report.enforcement_actions(), 0);
    assert!(harness.store.actions_for("janitor").await.unwrap().is_empty());
}

#[tokio::test]
async fn moderation_nukes_flagged_agents_and_bans_bursts_outside_the_roster() {
    let moderation = Arc::new(FakeModeration {
        admin_key: true,
        scan: ScanReport {
            flagged: 1,
            results: vec![ScanHit {
                agent: "scammer".to_string(),
                matched_term: "free crypto".to_string(),
            }],
        },
        ..FakeModeration::default()
    });
    let harness = Harness::with(HarnessOptions {
        personas: vec![
            persona("janitor", Tier::Standard, PersonaRole::Moderation),
            persona("alpha", Tier::Standard, PersonaRole::General),
        ],
        moderation: moderation.clone(),
        ..HarnessOptions::default()
    })
    .await;
    harness.platform.set_feed(vec![
        video("Fl00001", "Buy now", "flooder"),
        video("Fl00002", "Buy now", "flooder"),
        video("Fl00003", "Buy now", "flooder"),
        video("Al00001", "Hi", "alpha"),
        video("Al00002", "Hi", "alpha"),
        video("Al00003", "Hi", "alpha"),
    ]);
    let brain = harness.brain("janitor").await;
    let client = harness.client("janitor");

    let report = harness.engine.run_moderation_sweep(&brain, &client).await.unwrap();

    assert_eq!(report.nuked, 1);
    assert_eq!(report.banned, 1);
    assert_eq!(*moderation.nuked.lock(), vec!["scammer".to_string()]);
    assert_eq!(*moderation.banned.lock(), vec!["flooder".to_string()]);
    let ledger = harness.store.actions_for("janitor").await.unwrap();
    assert_eq!(ledger.len(), 2);
    assert!(ledger.iter().all(|a| a.action_type == ActionKind::Moderation.as_str()));
}
