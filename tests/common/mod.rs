//! Shared harness: an in-memory store, a virtual clock, and a decision engine
//! wired entirely to in-process fakes.
#![allow(dead_code)]

pub mod mocks;

use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;

use persona_core::clients::{ContentBlocklist, PlatformClient, VideoGenerator};
use persona_core::config::{
    CityConfig, DecisionConfig, LlmConfig, NewsConfig, PacingConfig, Palette, PersonaConfig, RateLimitConfig,
    SchedulingConfig, WeatherConfig,
};
use persona_core::constants::{ActivityClass, PersonaRole, Tier};
use persona_core::database::StateStore;
use persona_core::decision::{CommentWriter, ContentSources, DecisionEngine, EngineDeps, EngineSettings, MediaBackends};
use persona_core::llm::{LlmBackend, LlmClientPool};
use persona_core::orchestration::{ActivityGovernor, ActorBrain, BrainSettings, DaemonServices, KnownVideoCache};
use persona_core::registry::ActorRegistry;
use persona_core::utils::{shared_rng, Clock, ManualClock};

use mocks::*;

/// Monday 2026-03-02 15:00 UTC, inside the peak band
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 15, 0, 0).unwrap()
}

pub fn persona(id: &str, tier: Tier, role: PersonaRole) -> PersonaConfig {
    PersonaConfig {
        id: id.to_string(),
        display_name: format!("{id} display"),
        activity: ActivityClass::Medium,
        tier,
        role,
        interval_min_secs: 3600,
        interval_max_secs: 7200,
        personality: format!("You are {id}."),
        video_prompts: Vec::new(),
        video_titles: Vec::new(),
        hidden_messages: Vec::new(),
        hidden_tag: None,
        api_key: Some(format!("key-{id}")),
        palette: Palette::default(),
    }
}

pub fn city(name: &str, state: &str) -> CityConfig {
    CityConfig {
        name: name.to_string(),
        state: state.to_string(),
        latitude: 40.0,
        longitude: -100.0,
    }
}

/// Knobs for building a [`Harness`]
pub struct HarnessOptions {
    pub personas: Vec<PersonaConfig>,
    pub llm: Arc<dyn LlmBackend>,
    pub database_url: String,
    pub decision: DecisionConfig,
    pub rate_limits: RateLimitConfig,
    pub stories: Vec<persona_core::models::Story>,
    pub cities: Vec<CityConfig>,
    pub moderation: Arc<FakeModeration>,
    pub blocklist: Vec<String>,
    pub generator: Arc<dyn VideoGenerator>,
    pub seed: u64,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            personas: vec![persona("alpha", Tier::Standard, PersonaRole::General)],
            llm: Arc::new(ScriptedLlm::new(Vec::new())),
            database_url: "sqlite::memory:".to_string(),
            decision: DecisionConfig {
                payload_probability: 0.0,
                ..DecisionConfig::default()
            },
            rate_limits: RateLimitConfig::default(),
            stories: Vec::new(),
            cities: vec![city("Denver", "CO")],
            moderation: Arc::new(FakeModeration::default()),
            blocklist: Vec::new(),
            generator: Arc::new(UnavailableGenerator),
            seed: 7,
        }
    }
}

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub store: StateStore,
    pub engine: Arc<DecisionEngine>,
    pub registry: Arc<ActorRegistry>,
    pub platform: Arc<PlatformState>,
    pub compositor: Arc<RecordingCompositor>,
    pub moderation: Arc<FakeModeration>,
    pub brain_settings: BrainSettings,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with(HarnessOptions::default()).await
    }

    pub async fn with(options: HarnessOptions) -> Self {
        Self::with_clock(options, Arc::new(ManualClock::new(start_time()))).await
    }

    pub async fn with_clock(options: HarnessOptions, clock: Arc<ManualClock>) -> Self {
        let dyn_clock: Arc<dyn Clock> = clock.clone();
        let rng = shared_rng(Some(options.seed));
        let store = StateStore::open(&options.database_url, 64).await.unwrap();
        let registry = Arc::new(ActorRegistry::from_personas(&options.personas));
        let known_videos = Arc::new(KnownVideoCache::load(store.clone(), dyn_clock.clone()).await.unwrap());
        let governor = Arc::new(ActivityGovernor::new(options.rate_limits.clone(), dyn_clock.clone()));
        let compositor = Arc::new(RecordingCompositor::default());

        let engine = DecisionEngine::new(EngineDeps {
            writer: CommentWriter::new(
                LlmClientPool::with_backends(vec![options.llm]),
                rng.clone(),
                &options.decision,
                &LlmConfig::default(),
            ),
            known_videos,
            governor,
            registry: registry.clone(),
            media: MediaBackends {
                generator: options.generator,
                compositor: compositor.clone(),
                avatar: Arc::new(UnavailableAvatar),
            },
            sources: ContentSources {
                news: Arc::new(StaticNews(options.stories)),
                weather: Arc::new(StaticWeather),
                moderation: options.moderation.clone(),
            },
            blocklist: ContentBlocklist::new(&options.blocklist),
            clock: dyn_clock,
            rng,
            settings: EngineSettings {
                decision: options.decision,
                news: NewsConfig::default(),
                weather: WeatherConfig {
                    cities: options.cities,
                    ..WeatherConfig::default()
                },
                spam_threshold: 3,
                feed_sample_size: 50,
            },
        });

        Self {
            clock,
            store,
            engine: Arc::new(engine),
            registry,
            platform: Arc::new(PlatformState::default()),
            compositor,
            moderation: options.moderation,
            brain_settings: BrainSettings {
                max_comments_per_hour: options.rate_limits.max_comments_per_actor_per_hour,
                comment_cooldown: options.rate_limits.comment_cooldown(),
                scheduling: SchedulingConfig::default(),
            },
        }
    }

    pub async fn brain(&self, actor_id: &str) -> ActorBrain {
        let profile = self.registry.get(actor_id).unwrap();
        ActorBrain::restore(
            profile,
            self.store.clone(),
            self.engine.clock().clone(),
            self.engine.rng().clone(),
            self.brain_settings.clone(),
        )
        .await
        .unwrap()
    }

    pub fn client(&self, actor_id: &str) -> MockPlatform {
        MockPlatform::new(actor_id, self.platform.clone())
    }

    pub fn client_dyn(&self, actor_id: &str) -> Arc<dyn PlatformClient> {
        Arc::new(self.client(actor_id))
    }

    /// Services for a daemon driven by this harness
    pub fn services(&self, pacing: PacingConfig) -> DaemonServices {
        DaemonServices {
            store: self.store.clone(),
            registry: self.registry.clone(),
            connector: Arc::new(MockConnector {
                state: self.platform.clone(),
                issued_key: None,
            }),
            engine: self.engine.clone(),
            brain_settings: self.brain_settings.clone(),
            pacing,
            auto_register: false,
        }
    }
}
