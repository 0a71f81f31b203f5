//! # Decision Engine
//!
//! Shared context for every cycle a persona can run on a wake. The cycle procedures
//! themselves live in sibling modules as `impl DecisionEngine` blocks:
//!
//! - [`smart_cycle`](super::smart_cycle): Tier-1 bounded tool-use loop
//! - [`standard_cycle`](super::standard_cycle): Tier-2 browse, react and generate-and-upload
//! - [`news_cycle`](super::news_cycle), [`weather_cycle`](super::weather_cycle),
//!   [`moderation`](super::moderation): specialized role cycles
//!
//! The engine owns no per-actor state. Schedules and ledgers go through the
//! [`ActorBrain`](crate::orchestration::ActorBrain) handed to each cycle, and global
//! counters through the shared [`ActivityGovernor`].

use std::fmt;
use std::sync::Arc;

use crate::clients::{
    AvatarRenderer, ContentBlocklist, FrameCompositor, ModerationClient, NewsSource, VideoGenerator,
    WeatherSource,
};
use crate::config::{DaemonConfig, DecisionConfig, NewsConfig, WeatherConfig};
use crate::orchestration::{ActivityGovernor, KnownVideoCache};
use crate::registry::ActorRegistry;
use crate::utils::{Clock, SharedRng};

use super::comments::CommentWriter;
use super::screening::{screen_video_id, IdRejection, IdScreen};
use super::tool_router::ToolRouter;
use super::tools::default_tool_router;

/// Media renderers, each best-effort with the compositor as the local fallback
#[derive(Clone)]
pub struct MediaBackends {
    pub generator: Arc<dyn VideoGenerator>,
    pub compositor: Arc<dyn FrameCompositor>,
    pub avatar: Arc<dyn AvatarRenderer>,
}

/// Feeds consumed by the role cycles
#[derive(Clone)]
pub struct ContentSources {
    pub news: Arc<dyn NewsSource>,
    pub weather: Arc<dyn WeatherSource>,
    pub moderation: Arc<dyn ModerationClient>,
}

/// Tunables the cycles read, copied out of [`DaemonConfig`]
#[derive(Debug, Clone, Default)]
pub struct EngineSettings {
    pub decision: DecisionConfig,
    pub news: NewsConfig,
    pub weather: WeatherConfig,
    pub spam_threshold: usize,
    pub feed_sample_size: u32,
}

impl EngineSettings {
    pub fn from_config(config: &DaemonConfig) -> Self {
        Self {
            decision: config.decision.clone(),
            news: config.news.clone(),
            weather: config.weather.clone(),
            spam_threshold: config.moderation.spam_threshold,
            feed_sample_size: config.moderation.feed_sample_size,
        }
    }
}

/// Everything needed to build a [`DecisionEngine`]
pub struct EngineDeps {
    pub writer: CommentWriter,
    pub known_videos: Arc<KnownVideoCache>,
    pub governor: Arc<ActivityGovernor>,
    pub registry: Arc<ActorRegistry>,
    pub media: MediaBackends,
    pub sources: ContentSources,
    pub blocklist: ContentBlocklist,
    pub clock: Arc<dyn Clock>,
    pub rng: SharedRng,
    pub settings: EngineSettings,
}

pub struct DecisionEngine {
    pub(super) writer: CommentWriter,
    pub(super) tools: ToolRouter,
    pub(super) known_videos: Arc<KnownVideoCache>,
    pub(super) governor: Arc<ActivityGovernor>,
    pub(super) registry: Arc<ActorRegistry>,
    pub(super) media: MediaBackends,
    pub(super) sources: ContentSources,
    pub(super) blocklist: ContentBlocklist,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) rng: SharedRng,
    pub(super) settings: EngineSettings,
}

impl fmt::Debug for DecisionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecisionEngine")
            .field("tools", &self.tools)
            .field("known_videos", &self.known_videos.len())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl DecisionEngine {
    /// Build an engine with the default tool catalog registered
    pub fn new(deps: EngineDeps) -> Self {
        Self::with_tools(deps, default_tool_router())
    }

    pub fn with_tools(deps: EngineDeps, tools: ToolRouter) -> Self {
        Self {
            writer: deps.writer,
            tools,
            known_videos: deps.known_videos,
            governor: deps.governor,
            registry: deps.registry,
            media: deps.media,
            sources: deps.sources,
            blocklist: deps.blocklist,
            clock: deps.clock,
            rng: deps.rng,
            settings: deps.settings,
        }
    }

    pub fn writer(&self) -> &CommentWriter {
        &self.writer
    }

    pub fn tools(&self) -> &ToolRouter {
        &self.tools
    }

    pub fn known_videos(&self) -> &Arc<KnownVideoCache> {
        &self.known_videos
    }

    pub fn governor(&self) -> &Arc<ActivityGovernor> {
        &self.governor
    }

    pub fn registry(&self) -> &Arc<ActorRegistry> {
        &self.registry
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn rng(&self) -> &SharedRng {
        &self.rng
    }

    /// Screen a model-supplied id against the placeholder patterns and the cache
    pub fn screen(&self, video_id: &str) -> Result<IdScreen, IdRejection> {
        screen_video_id(video_id, &self.known_videos, self.settings.decision.strict_known_ids)
    }

    /// First blocklist term matched by outgoing text, if any
    pub fn blocked_term(&self, text: &str) -> Option<String> {
        self.blocklist.first_match(text)
    }
}
