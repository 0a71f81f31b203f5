//! # Persona Daemon
//!
//! The orchestration loop. One control task repeats until shutdown:
//!
//! 1. poll the platform feed for uploads this loop has not seen yet
//! 2. plan reactions to new videos from other personas (Tier-2 only)
//! 3. plan spontaneous actions for every persona whose wake is due, then reschedule it
//! 4. prioritize role and smart cycles, shuffle the rest, execute sequentially
//! 5. sleep a randomized poll interval
//!
//! Actions within an iteration never run concurrently. The governor is consulted
//! before every non-exempt action; once it holds back, the rest of the iteration's
//! non-exempt actions are deferred. Cancellation is cooperative: the running flag is
//! checked between actions and every sleep races a latched shutdown signal, so an
//! in-flight action always finishes and no pause starts after shutdown.
//!
//! New-upload detection keeps its own seen-set. The shared known-video cache is also
//! fed by browsing and tool calls, so it cannot tell the poll what is new.

use chrono::{DateTime, Utc};
use dashmap::DashSet;
use futures::future::join_all;
use rand::Rng;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::actions::{prioritize, PlannedAction};
use super::brain::{ActorBrain, BrainSettings};
use super::governor::ActivityGovernor;
use super::known_videos::KnownVideoCache;
use crate::clients::{
    ComfyJobGenerator, ContentBlocklist, FfmpegCompositor, HttpAvatarRenderer, HttpModerationClient,
    HttpPlatformConnector, JsonFeedNewsSource, OpenMeteoWeatherSource, PlatformClient, PlatformConnector,
};
use crate::config::{DaemonConfig, PacingConfig, PlatformConfig};
use crate::constants::{PersonaRole, Tier};
use crate::database::StateStore;
use crate::decision::{
    CommentWriter, ContentSources, DecisionEngine, EngineDeps, EngineSettings, MediaBackends,
};
use crate::error::{ClientError, PersonaError, Result};
use crate::llm::LlmClientPool;
use crate::models::Video;
use crate::registry::ActorRegistry;
use crate::utils::{shared_rng, Clock, SharedRng, SystemClock};

/// Everything the daemon is built from
pub struct DaemonServices {
    pub store: StateStore,
    pub registry: Arc<ActorRegistry>,
    pub connector: Arc<dyn PlatformConnector>,
    pub engine: Arc<DecisionEngine>,
    pub brain_settings: BrainSettings,
    pub pacing: PacingConfig,
    pub auto_register: bool,
}

impl DaemonServices {
    /// Wire the production HTTP clients, store and engine from configuration
    pub async fn from_config(config: &DaemonConfig) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let rng = shared_rng(config.scheduling.rng_seed);
        let store = StateStore::open(&config.state.database_url, config.state.channel_capacity).await?;
        let registry = Arc::new(ActorRegistry::from_personas(&config.personas));

        let llm = LlmClientPool::from_config(&config.llm)?;
        let media_http = media_http_client(&config.platform)?;
        let media = MediaBackends {
            generator: Arc::new(ComfyJobGenerator::new(
                &config.media,
                media_http.clone(),
                clock.clone(),
                rng.clone(),
            )),
            compositor: Arc::new(FfmpegCompositor::from_config(&config.media)),
            avatar: Arc::new(HttpAvatarRenderer::new(&config.media, media_http, clock.clone())),
        };
        let sources = ContentSources {
            news: Arc::new(JsonFeedNewsSource::from_config(&config.platform, &config.news)?),
            weather: Arc::new(OpenMeteoWeatherSource::from_config(&config.platform, &config.weather)?),
            moderation: Arc::new(HttpModerationClient::from_config(&config.platform, &config.moderation)?),
        };
        let connector: Arc<dyn PlatformConnector> = Arc::new(HttpPlatformConnector::from_config(&config.platform)?);

        let known_videos = Arc::new(KnownVideoCache::load(store.clone(), clock.clone()).await?);
        let governor = Arc::new(ActivityGovernor::new(config.rate_limits.clone(), clock.clone()));

        let engine = DecisionEngine::new(EngineDeps {
            writer: CommentWriter::new(llm, rng.clone(), &config.decision, &config.llm),
            known_videos,
            governor,
            registry: registry.clone(),
            media,
            sources,
            blocklist: ContentBlocklist::new(&config.moderation.blocklist),
            clock,
            rng,
            settings: EngineSettings::from_config(config),
        });

        Ok(Self {
            store,
            registry,
            connector,
            engine: Arc::new(engine),
            brain_settings: BrainSettings::from_config(config),
            pacing: config.pacing.clone(),
            auto_register: config.platform.auto_register,
        })
    }
}

fn media_http_client(platform: &PlatformConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(platform.connect_timeout())
        .timeout(platform.upload_timeout())
        .user_agent(platform.user_agent.clone())
        .build()
        .map_err(|e| PersonaError::Platform(ClientError::from_reqwest("build_media_client", e)))
}

/// One active persona: its brain plus an authenticated client
struct ActorSlot {
    brain: Arc<ActorBrain>,
    client: Arc<dyn PlatformClient>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BotStatus {
    pub tier: Tier,
    pub next_wake_in: i64,
    pub comments_1h: i64,
}

/// Read-only summary served by the health endpoint
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub ok: bool,
    pub bots: usize,
    pub uptime_s: i64,
    pub actions_last_hour: usize,
    pub videos_today: u32,
    pub bot_status: BTreeMap<String, BotStatus>,
}

pub struct PersonaDaemon {
    store: StateStore,
    engine: Arc<DecisionEngine>,
    actors: Vec<ActorSlot>,
    index: HashMap<String, usize>,
    pacing: PacingConfig,
    running: Arc<AtomicBool>,
    shutdown_tx: watch::Sender<bool>,
    /// Video ids the feed poll has already reported
    polled: DashSet<String>,
    iterations: AtomicU64,
    started_at: DateTime<Utc>,
}

impl std::fmt::Debug for PersonaDaemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersonaDaemon")
            .field("actors", &self.index.len())
            .field("running", &self.running.load(Ordering::Acquire))
            .field("iterations", &self.iterations.load(Ordering::Relaxed))
            .finish()
    }
}

impl PersonaDaemon {
    /// Resolve keys, restore every brain from the store, and warm the LLM pool.
    ///
    /// Personas the configuration left without a key self-register with the platform
    /// when that is enabled; a persona still without a key is skipped.
    pub async fn bootstrap(services: DaemonServices) -> Result<Self> {
        let DaemonServices {
            store,
            registry,
            connector,
            engine,
            brain_settings,
            pacing,
            auto_register,
        } = services;

        let mut actors = Vec::new();
        let mut index = HashMap::new();
        for profile in registry.profiles() {
            let id = profile.id.clone();
            if registry.api_key(&id).is_none() && auto_register {
                match connector.register(&id, &profile.display_name).await {
                    Ok(key) => {
                        registry.backfill_api_key(&id, key);
                        info!(actor = %id, "📇 REGISTRY: Registered persona with the platform");
                    }
                    Err(err) => warn!(actor = %id, error = %err, "📇 REGISTRY: Registration failed"),
                }
            }
            let Some(key) = registry.api_key(&id) else {
                warn!(actor = %id, "📇 REGISTRY: No API key, skipping persona");
                continue;
            };

            let brain = ActorBrain::restore(
                profile.clone(),
                store.clone(),
                engine.clock().clone(),
                engine.rng().clone(),
                brain_settings.clone(),
            )
            .await?;
            let client = connector.client_for(&id, Some(&key));
            index.insert(id, actors.len());
            actors.push(ActorSlot {
                brain: Arc::new(brain),
                client,
            });
        }

        if actors.is_empty() {
            return Err(PersonaError::InvalidState("no persona has an API key".to_string()));
        }

        match engine.writer().llm().warm_up().await {
            Some(label) => info!(backend = %label, "🧩 LLM_POOL: Warm-up complete"),
            None => warn!("🧩 LLM_POOL: Warm-up failed on every backend"),
        }

        let smart = actors
            .iter()
            .filter(|slot| slot.brain.profile().tier == Tier::Smart)
            .count();
        info!(
            personas = actors.len(),
            smart = smart,
            standard = actors.len() - smart,
            known_videos = engine.known_videos().len(),
            "🚀 DAEMON: Bootstrapped"
        );

        // ids persisted before a restart are not new uploads
        let polled: DashSet<String> = engine.known_videos().ids().into_iter().collect();
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            store,
            started_at: engine.clock().now(),
            engine,
            actors,
            index,
            pacing,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
            polled,
            iterations: AtomicU64::new(0),
        })
    }

    pub fn engine(&self) -> &Arc<DecisionEngine> {
        &self.engine
    }

    pub fn brain(&self, actor_id: &str) -> Option<&Arc<ActorBrain>> {
        self.index.get(actor_id).map(|&i| &self.actors[i].brain)
    }

    pub fn actor_ids(&self) -> Vec<String> {
        self.actors.iter().map(|slot| slot.brain.id().to_string()).collect()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn slot(&self, actor_id: &str) -> Result<&ActorSlot> {
        self.index
            .get(actor_id)
            .map(|&i| &self.actors[i])
            .ok_or_else(|| PersonaError::UnknownActor(actor_id.to_string()))
    }

    fn rng(&self) -> &SharedRng {
        self.engine.rng()
    }

    fn roll(&self) -> f64 {
        self.rng().lock().gen()
    }

    /// Feed page 1 filtered to ids no earlier poll has reported.
    ///
    /// Every listed id also goes into the known-video cache for id screening.
    pub async fn poll_new_activity(&self) -> Vec<Video> {
        let Some(slot) = self.actors.first() else {
            return Vec::new();
        };
        let videos = match slot.client.feed(1).await {
            Ok(videos) => videos,
            Err(err) => {
                debug!(error = %err, "Feed poll failed");
                return Vec::new();
            }
        };
        self.engine.known_videos().track_all(&videos).await;
        videos
            .into_iter()
            .filter(|video| !video.video_id.is_empty() && self.polled.insert(video.video_id.clone()))
            .collect()
    }

    /// Each eligible Tier-2 persona reacts to each new video with a fixed probability
    pub async fn reactive_candidates(&self, videos: &[Video]) -> Result<Vec<PlannedAction>> {
        let probability = self.engine.settings().decision.reaction_probability;
        let mut planned = Vec::new();
        for video in videos {
            for slot in &self.actors {
                let brain = &slot.brain;
                let profile = brain.profile();
                if profile.tier != Tier::Standard || profile.role != PersonaRole::General {
                    continue;
                }
                if video.agent_name == brain.id() || video.video_id.is_empty() {
                    continue;
                }
                if brain.already_commented_on(&video.video_id).await? || !brain.can_comment().await? {
                    continue;
                }
                if self.roll() < probability {
                    planned.push(PlannedAction::React {
                        actor: brain.id().to_string(),
                        video: video.clone(),
                    });
                }
            }
        }
        Ok(planned)
    }

    /// Actions for every persona whose wake is due; each due persona is rescheduled
    pub async fn spontaneous_actions(&self) -> Result<Vec<PlannedAction>> {
        let decision = &self.engine.settings().decision;
        let mut planned = Vec::new();
        for slot in &self.actors {
            let brain = &slot.brain;
            if !brain.is_due() {
                continue;
            }
            let actor = brain.id().to_string();
            let profile = brain.profile();
            match (profile.role, profile.tier) {
                (PersonaRole::News, _) => planned.push(PlannedAction::NewsCycle { actor }),
                (PersonaRole::Weather, _) => planned.push(PlannedAction::WeatherCycle { actor }),
                (PersonaRole::Moderation, _) => planned.push(PlannedAction::ModerationSweep { actor }),
                (PersonaRole::General, Tier::Smart) => planned.push(PlannedAction::SmartCycle { actor }),
                (PersonaRole::General, Tier::Standard) => {
                    if brain.can_comment().await? && self.roll() < decision.browse_probability {
                        planned.push(PlannedAction::Browse { actor: actor.clone() });
                    }
                    if self.roll() < decision.video_chance(profile.activity)
                        && self.engine.governor().can_generate_video()
                    {
                        planned.push(PlannedAction::GenerateVideo { actor });
                    }
                }
            }

            let delay = brain.compute_next_wake().await?;
            debug!(actor = %brain.id(), next_wake_in_min = delay / 60.0, "⏰ WAKE: Rescheduled");
        }
        Ok(planned)
    }

    /// Run one planned action; returns whether it did something
    pub async fn execute(&self, action: &PlannedAction) -> bool {
        match self.try_execute(action).await {
            Ok(done) => done,
            Err(err) => {
                error!(action = %action, error = %err, "❌ ACTION: Failed");
                false
            }
        }
    }

    async fn try_execute(&self, action: &PlannedAction) -> Result<bool> {
        let slot = self.slot(action.actor())?;
        let brain = slot.brain.as_ref();
        let client = slot.client.as_ref();
        let governor = self.engine.governor();
        info!(action = %action, "▶️ ACTION: Starting");

        let done = match action {
            PlannedAction::ModerationSweep { .. } => {
                let report = self.engine.run_moderation_sweep(brain, client).await?;
                brain.mark_active().await?;
                if report.enforcement_actions() > 0 {
                    warn!(actor = %brain.id(), actions = report.enforcement_actions(), "🧹 MODERATION: Enforcement taken");
                }
                true
            }
            PlannedAction::SmartCycle { .. } => {
                let report = self.engine.run_smart_cycle(brain, client).await?;
                debug!(actor = %brain.id(), outcome = %report.outcome, turns = report.turns, "Smart cycle report");
                brain.mark_active().await?;
                governor.record_action();
                true
            }
            PlannedAction::NewsCycle { .. } | PlannedAction::WeatherCycle { .. } => {
                let uploaded = if matches!(action, PlannedAction::NewsCycle { .. }) {
                    self.engine.run_news_cycle(brain, client).await?
                } else {
                    self.engine.run_weather_cycle(brain, client).await?
                };
                if uploaded.is_some() {
                    governor.record_action();
                    governor.record_video();
                }
                uploaded.is_some()
            }
            PlannedAction::React { video, .. } => {
                let done = self.engine.react(brain, client, video).await?;
                if done {
                    governor.record_action();
                }
                done
            }
            PlannedAction::Browse { .. } => {
                let done = self.engine.browse(brain, client).await?;
                if done {
                    governor.record_action();
                }
                done
            }
            PlannedAction::GenerateVideo { .. } => {
                let uploaded = self.engine.generate_video(brain, client).await?;
                if uploaded.is_some() {
                    governor.record_action();
                    governor.record_video();
                }
                uploaded.is_some()
            }
        };
        Ok(done)
    }

    async fn plan(&self) -> Result<Vec<PlannedAction>> {
        let new_videos = self.poll_new_activity().await;
        if !new_videos.is_empty() {
            info!(count = new_videos.len(), "📼 KNOWN_VIDEOS: New videos detected");
        }
        let mut planned = self.reactive_candidates(&new_videos).await?;
        planned.extend(self.spontaneous_actions().await?);
        Ok(prioritize(planned, self.rng()))
    }

    /// One poll/plan/execute pass; returns the number of actions that did something
    pub async fn run_iteration(&self) -> Result<usize> {
        let ordered = self.plan().await?;
        let mut succeeded = 0;
        for action in &ordered {
            if !self.is_running() {
                break;
            }
            if !action.is_exempt() && !self.engine.governor().can_act() {
                debug!(action = %action, "🚦 GOVERNOR: Deferring remaining actions");
                break;
            }
            if self.execute(action).await {
                succeeded += 1;
                let delay = self.post_action_delay();
                debug!(delay_secs = delay.as_secs_f64(), "Pausing between actions");
                if !self.pause(delay).await {
                    break;
                }
            }
        }
        Ok(succeeded)
    }

    /// Single pass for smoke testing: at most `run_once_max_actions` actions attempted
    pub async fn run_once(&self) -> Result<usize> {
        info!("🚀 DAEMON: Single run mode");
        let new_videos = self.poll_new_activity().await;
        let mut planned = self.spontaneous_actions().await?;
        planned.extend(self.reactive_candidates(&new_videos).await?);

        let mut succeeded = 0;
        for action in planned.iter().take(self.pacing.run_once_max_actions) {
            if !action.is_exempt() && !self.engine.governor().can_act() {
                debug!(action = %action, "🚦 GOVERNOR: Skipping");
                continue;
            }
            if self.execute(action).await {
                succeeded += 1;
            }
        }
        self.flush_state().await;
        Ok(succeeded)
    }

    /// Loop until [`shutdown`](Self::shutdown); iteration errors are logged and slept off
    pub async fn run(&self) {
        if self.shutdown_requested() {
            info!("🛑 DAEMON: Shutdown already requested, not starting");
            return;
        }
        self.running.store(true, Ordering::Release);
        info!(personas = self.actors.len(), "🚀 DAEMON: Orchestration loop started");

        while self.is_running() && !self.shutdown_requested() {
            let iteration = self.iterations.fetch_add(1, Ordering::Relaxed) + 1;
            let wait = match self.run_iteration().await {
                Ok(succeeded) => {
                    if succeeded > 0 {
                        debug!(iteration = iteration, succeeded = succeeded, "Iteration complete");
                    }
                    if self.pacing.status_every_iterations > 0 && iteration % self.pacing.status_every_iterations == 0 {
                        self.log_status(iteration);
                    }
                    self.poll_delay()
                }
                Err(err) => {
                    error!(iteration = iteration, error = %err, "❌ DAEMON: Iteration failed");
                    Duration::from_secs(self.pacing.loop_error_sleep_secs)
                }
            };
            if !self.pause(wait).await {
                break;
            }
        }

        self.flush_state().await;
        info!("🛑 DAEMON: Orchestration loop stopped");
    }

    /// Ask the loop to stop after the in-flight action
    pub fn shutdown(&self) {
        info!("🛑 DAEMON: Shutdown requested");
        self.running.store(false, Ordering::Release);
        self.shutdown_tx.send_replace(true);
    }

    fn shutdown_requested(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Best-effort persist of every persona's state
    pub async fn flush_state(&self) {
        let results = join_all(self.actors.iter().map(|slot| async move {
            (slot.brain.id(), slot.brain.persist().await)
        }))
        .await;
        for (actor, result) in results {
            if let Err(err) = result {
                warn!(actor = %actor, error = %err, "Failed to flush persona state");
            }
        }
    }

    /// Close the store after flushing
    pub async fn close(&self) {
        self.flush_state().await;
        self.store.shutdown().await;
    }

    fn log_status(&self, iteration: u64) {
        let governor = self.engine.governor();
        info!(
            iteration = iteration,
            actions_last_hour = governor.actions_last_hour(),
            videos_today = governor.videos_today(),
            known_videos = self.engine.known_videos().len(),
            "📊 DAEMON: Status"
        );
    }

    fn post_action_delay(&self) -> Duration {
        let gap = self.engine.governor().min_action_gap_secs() as f64;
        let upper = (gap * self.pacing.action_delay_factor).max(gap);
        if upper <= gap {
            return Duration::from_secs_f64(gap);
        }
        Duration::from_secs_f64(self.rng().lock().gen_range(gap..=upper))
    }

    fn poll_delay(&self) -> Duration {
        let (min, max) = (self.pacing.poll_min_secs, self.pacing.poll_max_secs.max(self.pacing.poll_min_secs));
        Duration::from_secs(self.rng().lock().gen_range(min..=max))
    }

    /// Sleep on the engine clock unless shutdown arrives first; `false` on shutdown.
    ///
    /// The signal is latched, so a shutdown requested before the pause began skips it.
    async fn pause(&self, duration: Duration) -> bool {
        let mut stop = self.shutdown_tx.subscribe();
        if *stop.borrow_and_update() || !self.is_running() {
            return false;
        }
        if duration.is_zero() {
            return true;
        }
        tokio::select! {
            _ = self.engine.clock().sleep(duration) => self.is_running(),
            _ = stop.wait_for(|stopped| *stopped) => false,
        }
    }

    /// Counters for the health endpoint
    pub async fn health_snapshot(&self) -> HealthSnapshot {
        let governor = self.engine.governor();
        let mut bot_status = BTreeMap::new();
        for slot in &self.actors {
            let brain = &slot.brain;
            let comments_1h = brain.comments_last_hour().await.unwrap_or_default();
            bot_status.insert(
                brain.id().to_string(),
                BotStatus {
                    tier: brain.profile().tier,
                    next_wake_in: brain.seconds_until_wake().round() as i64,
                    comments_1h,
                },
            );
        }
        let uptime = self.engine.clock().now() - self.started_at;
        HealthSnapshot {
            ok: true,
            bots: self.actors.len(),
            uptime_s: uptime.num_seconds(),
            actions_last_hour: governor.actions_last_hour(),
            videos_today: governor.videos_today(),
            bot_status,
        }
    }
}
