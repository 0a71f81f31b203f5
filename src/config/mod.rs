//! # Persona Daemon Configuration System
//!
//! Layered, validated configuration for the daemon.
//!
//! ## Architecture
//!
//! - **Built-in defaults**: every section implements `Default` with the production tunables
//! - **File layer**: `config/persona-daemon.toml` (or an explicit path) overrides defaults
//! - **Environment layer**: `PERSONA__<SECTION>__<FIELD>` overrides the file
//! - **Explicit Validation**: [`DaemonConfig::validate`] rejects inconsistent values up front
//!
//! ## Usage
//!
//! ```rust,no_run
//! use persona_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load(None)?;
//! let gap = manager.config().rate_limits.min_action_gap();
//! let roster = manager.config().personas.len();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{defaults, ActivityClass, PersonaRole, Tier};

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring `config/persona-daemon.toml`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Content platform endpoint and client timeouts
    pub platform: PlatformConfig,

    /// Language-model backends and sampling settings
    pub llm: LlmConfig,

    /// Global and per-actor rate ceilings
    pub rate_limits: RateLimitConfig,

    /// Wake scheduling: diurnal windows, startup stagger, RNG seed
    pub scheduling: SchedulingConfig,

    /// Decision engine bounds and probabilities
    pub decision: DecisionConfig,

    /// Main loop pacing
    pub pacing: PacingConfig,

    /// Media generation backends and local compositor
    pub media: MediaConfig,

    /// Headline source for the news persona
    pub news: NewsConfig,

    /// Forecast source and city list for the weather persona
    pub weather: WeatherConfig,

    /// Admin API access for the moderation persona
    pub moderation: ModerationConfig,

    /// Durable state store
    pub state: StateConfig,

    /// Read-only health endpoint
    pub health: HealthConfig,

    /// Structured logging output
    pub logging: LoggingConfig,

    /// The persona roster
    pub personas: Vec<PersonaConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PlatformConfig {
    pub base_url: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub upload_timeout_secs: u64,
    pub user_agent: String,
    /// Self-register personas that have no API key at startup
    pub auto_register: bool,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            base_url: "https://bottube.ai".to_string(),
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            upload_timeout_secs: 300,
            user_agent: format!("persona-daemon/{}", env!("CARGO_PKG_VERSION")),
            auto_register: true,
        }
    }
}

impl PlatformConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }
}

/// One language-model endpoint
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LlmBackendConfig {
    pub url: String,
    pub model: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Tried in order; duplicates by (url, model) are dropped
    pub backends: Vec<LlmBackendConfig>,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub completion_max_tokens: u32,
    pub completion_temperature: f64,
    pub tool_temperature: f64,
    pub tool_num_predict: u32,
    pub warm_up: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backends: vec![
                LlmBackendConfig {
                    url: "http://localhost:11434".to_string(),
                    model: "qwen2.5:14b".to_string(),
                },
                LlmBackendConfig {
                    url: "http://localhost:11434".to_string(),
                    model: "qwen2.5:3b".to_string(),
                },
            ],
            connect_timeout_secs: 5,
            request_timeout_secs: 90,
            completion_max_tokens: 250,
            completion_temperature: 0.95,
            tool_temperature: 0.8,
            tool_num_predict: 512,
            warm_up: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_actions_per_hour: usize,
    pub min_action_gap_secs: u64,
    pub burst_threshold: usize,
    pub burst_window_secs: u64,
    pub max_videos_per_day: u32,
    pub max_comments_per_actor_per_hour: i64,
    pub comment_cooldown_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_actions_per_hour: defaults::MAX_ACTIONS_PER_HOUR,
            min_action_gap_secs: defaults::MIN_ACTION_GAP_SECS,
            burst_threshold: defaults::BURST_THRESHOLD,
            burst_window_secs: defaults::BURST_WINDOW_SECS,
            max_videos_per_day: defaults::MAX_VIDEOS_PER_DAY,
            max_comments_per_actor_per_hour: defaults::MAX_COMMENTS_PER_ACTOR_PER_HOUR,
            comment_cooldown_secs: defaults::SAME_VIDEO_COOLDOWN_SECS,
        }
    }
}

impl RateLimitConfig {
    pub fn min_action_gap(&self) -> Duration {
        Duration::from_secs(self.min_action_gap_secs)
    }

    pub fn comment_cooldown(&self) -> Duration {
        Duration::from_secs(self.comment_cooldown_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulingConfig {
    /// UTC hours, inclusive on both ends
    pub quiet_start_hour: u32,
    pub quiet_end_hour: u32,
    pub quiet_multiplier: f64,
    pub peak_start_hour: u32,
    pub peak_end_hour: u32,
    pub peak_multiplier: f64,
    pub startup_stagger_min_secs: u64,
    pub startup_stagger_max_secs: u64,
    /// Fixed seed for reproducible runs; entropy-seeded when absent
    pub rng_seed: Option<u64>,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            quiet_start_hour: defaults::QUIET_START_HOUR,
            quiet_end_hour: defaults::QUIET_END_HOUR,
            quiet_multiplier: defaults::QUIET_MULTIPLIER,
            peak_start_hour: defaults::PEAK_START_HOUR,
            peak_end_hour: defaults::PEAK_END_HOUR,
            peak_multiplier: defaults::PEAK_MULTIPLIER,
            startup_stagger_min_secs: defaults::STARTUP_STAGGER_MIN_SECS,
            startup_stagger_max_secs: defaults::STARTUP_STAGGER_MAX_SECS,
            rng_seed: None,
        }
    }
}

impl SchedulingConfig {
    /// Multiplier for the given UTC hour
    pub fn diurnal_multiplier(&self, hour: u32) -> f64 {
        if (self.quiet_start_hour..=self.quiet_end_hour).contains(&hour) {
            self.quiet_multiplier
        } else if (self.peak_start_hour..=self.peak_end_hour).contains(&hour) {
            self.peak_multiplier
        } else {
            1.0
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DecisionConfig {
    pub max_smart_turns: usize,
    pub loop_guard_repeats: usize,
    pub error_budget: usize,
    pub nudge_turn_limit: usize,
    pub payload_probability: f64,
    pub reaction_probability: f64,
    pub browse_probability: f64,
    pub video_chance_high: f64,
    pub video_chance_medium: f64,
    pub video_chance_low: f64,
    pub comment_max_chars: usize,
    /// Reject ids missing from the known-video cache instead of warning
    pub strict_known_ids: bool,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            max_smart_turns: defaults::MAX_SMART_TURNS,
            loop_guard_repeats: defaults::LOOP_GUARD_REPEATS,
            error_budget: defaults::ERROR_BUDGET,
            nudge_turn_limit: defaults::NUDGE_TURN_LIMIT,
            payload_probability: defaults::PAYLOAD_PROBABILITY,
            reaction_probability: defaults::REACTION_PROBABILITY,
            browse_probability: defaults::BROWSE_PROBABILITY,
            video_chance_high: defaults::VIDEO_CHANCE_HIGH,
            video_chance_medium: defaults::VIDEO_CHANCE_MEDIUM,
            video_chance_low: defaults::VIDEO_CHANCE_LOW,
            comment_max_chars: defaults::COMMENT_MAX_CHARS,
            strict_known_ids: false,
        }
    }
}

impl DecisionConfig {
    pub fn video_chance(&self, activity: ActivityClass) -> f64 {
        match activity {
            ActivityClass::High => self.video_chance_high,
            ActivityClass::Medium => self.video_chance_medium,
            ActivityClass::Low => self.video_chance_low,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PacingConfig {
    pub poll_min_secs: u64,
    pub poll_max_secs: u64,
    /// Post-action delay is drawn from [gap, factor * gap]
    pub action_delay_factor: f64,
    pub loop_error_sleep_secs: u64,
    pub status_every_iterations: u64,
    pub run_once_max_actions: usize,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            poll_min_secs: defaults::POLL_MIN_SECS,
            poll_max_secs: defaults::POLL_MAX_SECS,
            action_delay_factor: 3.0,
            loop_error_sleep_secs: defaults::LOOP_ERROR_SLEEP_SECS,
            status_every_iterations: defaults::STATUS_EVERY_ITERATIONS,
            run_once_max_actions: defaults::RUN_ONCE_MAX_ACTIONS,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MediaConfig {
    /// ComfyUI-style job queue; generation falls back to the compositor when absent
    pub generator_url: Option<String>,
    pub poll_interval_secs: u64,
    pub deadline_secs: u64,
    pub ffmpeg_path: String,
    pub font_path: Option<PathBuf>,
    pub compositor_timeout_secs: u64,
    pub work_dir: PathBuf,
    pub avatar: AvatarConfig,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            generator_url: None,
            poll_interval_secs: defaults::MEDIA_POLL_INTERVAL_SECS,
            deadline_secs: defaults::MEDIA_DEADLINE_SECS,
            ffmpeg_path: "ffmpeg".to_string(),
            font_path: None,
            compositor_timeout_secs: 120,
            work_dir: std::env::temp_dir(),
            avatar: AvatarConfig::default(),
        }
    }
}

impl MediaConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

/// Talking-avatar render service used by the news persona
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AvatarConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub avatar_id: Option<String>,
    pub voice_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NewsConfig {
    /// JSON Feed endpoint supplying headlines
    pub feed_url: Option<String>,
    pub dedup_days: u64,
    pub script_max_chars: usize,
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            feed_url: None,
            dedup_days: defaults::NEWS_DEDUP_DAYS,
            script_max_chars: 600,
        }
    }
}

/// A forecast location
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CityConfig {
    pub name: String,
    pub state: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub api_url: String,
    pub dedup_days: u64,
    pub cities: Vec<CityConfig>,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        let cities = [
            ("New York", "NY", 40.7128, -74.0060),
            ("Los Angeles", "CA", 34.0522, -118.2437),
            ("Chicago", "IL", 41.8781, -87.6298),
            ("Houston", "TX", 29.7604, -95.3698),
            ("Phoenix", "AZ", 33.4484, -112.0740),
            ("Philadelphia", "PA", 39.9526, -75.1652),
            ("San Antonio", "TX", 29.4241, -98.4936),
            ("San Diego", "CA", 32.7157, -117.1611),
            ("Dallas", "TX", 32.7767, -96.7970),
            ("Austin", "TX", 30.2672, -97.7431),
            ("Seattle", "WA", 47.6062, -122.3321),
            ("Denver", "CO", 39.7392, -104.9903),
            ("Boston", "MA", 42.3601, -71.0589),
            ("Miami", "FL", 25.7617, -80.1918),
            ("Atlanta", "GA", 33.7490, -84.3880),
            ("Minneapolis", "MN", 44.9778, -93.2650),
            ("Portland", "OR", 45.5152, -122.6784),
            ("Las Vegas", "NV", 36.1699, -115.1398),
            ("Nashville", "TN", 36.1627, -86.7816),
            ("New Orleans", "LA", 29.9511, -90.0715),
        ]
        .into_iter()
        .map(|(name, state, latitude, longitude)| CityConfig {
            name: name.to_string(),
            state: state.to_string(),
            latitude,
            longitude,
        })
        .collect();

        Self {
            api_url: "https://api.open-meteo.com/v1/forecast".to_string(),
            dedup_days: defaults::WEATHER_DEDUP_DAYS,
            cities,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ModerationConfig {
    pub admin_key: Option<String>,
    /// Non-roster creators at or above this many videos in the sample are banned
    pub spam_threshold: usize,
    pub feed_sample_size: u32,
    /// Case-insensitive regex fragments for local content screening
    pub blocklist: Vec<String>,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            admin_key: None,
            spam_threshold: 10,
            feed_sample_size: 50,
            blocklist: [
                r"\bcsam\b",
                r"\bchild\s*(porn|sex|exploit|abuse)",
                r"\bjailbait\b",
                r"\bunderage\s*(sex|nude|porn)",
                r"\bbomb\s*making\b",
                r"\bsynthe(size|sis)\s*(meth|fentanyl|sarin|ricin|vx)\b",
                r"\bdoxx(ing|ed)?\b",
                r"\bswatt(ing|ed)?\b",
                r"\brevenge\s*porn\b",
                r"\banimal\s*torture\b",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StateConfig {
    pub database_url: String,
    pub channel_capacity: usize,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://persona-state.db".to_string(),
            channel_capacity: 64,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    pub enabled: bool,
    pub bind_address: String,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "0.0.0.0:9200".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Overrides the environment-derived level; `RUST_LOG` wins over both
    pub level: Option<String>,
    pub directory: PathBuf,
    pub file_output: bool,
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: None,
            directory: PathBuf::from("log"),
            file_output: true,
            ansi: true,
        }
    }
}

/// Upload title/description pair. `#{n}` expands to the persona's next upload number
/// and `{city}` to the forecast city.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TitleTemplate {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// Background and text colors for locally composited videos
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Palette {
    pub background: String,
    pub text: String,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            background: "#1a1a2e".to_string(),
            text: "#ffffff".to_string(),
        }
    }
}

fn default_tier() -> Tier {
    Tier::Standard
}

/// One roster entry
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PersonaConfig {
    pub id: String,
    pub display_name: String,
    pub activity: ActivityClass,
    #[serde(default = "default_tier")]
    pub tier: Tier,
    #[serde(default)]
    pub role: PersonaRole,
    pub interval_min_secs: u64,
    pub interval_max_secs: u64,
    #[serde(default)]
    pub personality: String,
    #[serde(default)]
    pub video_prompts: Vec<String>,
    #[serde(default)]
    pub video_titles: Vec<TitleTemplate>,
    #[serde(default)]
    pub hidden_messages: Vec<String>,
    #[serde(default)]
    pub hidden_tag: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub palette: Palette,
}

impl DaemonConfig {
    /// Validate cross-field consistency
    pub fn validate(&self) -> ConfigResult<()> {
        if self.personas.is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "personas",
                "roster must contain at least one persona",
            ));
        }

        let mut seen = HashSet::new();
        for persona in &self.personas {
            if persona.id.trim().is_empty() {
                return Err(ConfigurationError::invalid_value(
                    "personas.id",
                    "",
                    "persona id cannot be empty",
                ));
            }
            if !seen.insert(persona.id.as_str()) {
                return Err(ConfigurationError::invalid_value(
                    "personas.id",
                    persona.id.clone(),
                    "duplicate persona id",
                ));
            }
            if persona.interval_min_secs == 0 || persona.interval_min_secs > persona.interval_max_secs {
                return Err(ConfigurationError::invalid_value(
                    format!("personas.{}.interval", persona.id),
                    format!("[{}, {}]", persona.interval_min_secs, persona.interval_max_secs),
                    "interval bounds must satisfy 0 < min <= max",
                ));
            }
        }

        if self.llm.backends.is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "llm.backends",
                "at least one language-model backend is required",
            ));
        }

        let limits = &self.rate_limits;
        for (field, value) in [
            ("rate_limits.max_actions_per_hour", limits.max_actions_per_hour as u64),
            ("rate_limits.burst_threshold", limits.burst_threshold as u64),
            ("rate_limits.burst_window_secs", limits.burst_window_secs),
            ("rate_limits.max_comments_per_actor_per_hour", limits.max_comments_per_actor_per_hour.max(0) as u64),
            ("decision.max_smart_turns", self.decision.max_smart_turns as u64),
            ("decision.loop_guard_repeats", self.decision.loop_guard_repeats as u64),
            ("decision.error_budget", self.decision.error_budget as u64),
        ] {
            if value == 0 {
                return Err(ConfigurationError::invalid_value(field, "0", "must be greater than zero"));
            }
        }

        let decision = &self.decision;
        for (field, p) in [
            ("decision.payload_probability", decision.payload_probability),
            ("decision.reaction_probability", decision.reaction_probability),
            ("decision.browse_probability", decision.browse_probability),
            ("decision.video_chance_high", decision.video_chance_high),
            ("decision.video_chance_medium", decision.video_chance_medium),
            ("decision.video_chance_low", decision.video_chance_low),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(ConfigurationError::invalid_value(
                    field,
                    p.to_string(),
                    "probability must be within [0, 1]",
                ));
            }
        }

        let sched = &self.scheduling;
        for (field, hour) in [
            ("scheduling.quiet_start_hour", sched.quiet_start_hour),
            ("scheduling.quiet_end_hour", sched.quiet_end_hour),
            ("scheduling.peak_start_hour", sched.peak_start_hour),
            ("scheduling.peak_end_hour", sched.peak_end_hour),
        ] {
            if hour > 23 {
                return Err(ConfigurationError::invalid_value(
                    field,
                    hour.to_string(),
                    "hour must be within 0..=23",
                ));
            }
        }
        if sched.startup_stagger_min_secs > sched.startup_stagger_max_secs {
            return Err(ConfigurationError::validation_error(
                "scheduling.startup_stagger_min_secs exceeds startup_stagger_max_secs",
            ));
        }

        if self.pacing.poll_min_secs > self.pacing.poll_max_secs {
            return Err(ConfigurationError::validation_error(
                "pacing.poll_min_secs exceeds pacing.poll_max_secs",
            ));
        }
        if self.pacing.action_delay_factor < 1.0 {
            return Err(ConfigurationError::invalid_value(
                "pacing.action_delay_factor",
                self.pacing.action_delay_factor.to_string(),
                "factor must be at least 1.0",
            ));
        }

        for pattern in &self.moderation.blocklist {
            if let Err(e) = regex::Regex::new(pattern) {
                return Err(ConfigurationError::invalid_value(
                    "moderation.blocklist",
                    pattern.clone(),
                    e.to_string(),
                ));
            }
        }

        Ok(())
    }
}
