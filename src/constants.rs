//! # System Constants
//!
//! Enums and default values that define the operational boundaries of the daemon:
//! persona classes, durable action kinds, and the rate/pacing defaults every
//! configuration section falls back to.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How chatty a persona is. Scales the mean wake interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityClass {
    Low,
    Medium,
    High,
}

impl ActivityClass {
    /// Multiplier applied to the midpoint of the wake interval bounds
    pub fn wake_multiplier(self) -> f64 {
        match self {
            Self::Low => 4.0,
            Self::Medium => 2.0,
            Self::High => 1.0,
        }
    }
}

impl fmt::Display for ActivityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

impl FromStr for ActivityClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(format!("Invalid activity class: {s}")),
        }
    }
}

/// Behavioral class of a persona
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Drives its own bounded tool-use loop
    Smart,
    /// Daemon-directed action selection
    Standard,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Smart => write!(f, "smart"),
            Self::Standard => write!(f, "standard"),
        }
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "smart" => Ok(Self::Smart),
            "standard" => Ok(Self::Standard),
            _ => Err(format!("Invalid tier: {s}")),
        }
    }
}

/// Special duty a persona carries in addition to its tier.
///
/// Personas with a non-general role run their dedicated cycle on every wake instead
/// of the tier's usual decision procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonaRole {
    #[default]
    General,
    News,
    Weather,
    Moderation,
}

impl fmt::Display for PersonaRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::General => write!(f, "general"),
            Self::News => write!(f, "news"),
            Self::Weather => write!(f, "weather"),
            Self::Moderation => write!(f, "moderation"),
        }
    }
}

/// Kinds of entries written to the durable action ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Comment,
    Like,
    Dislike,
    Subscribe,
    Upload,
    NewsUpload,
    WeatherUpload,
    Moderation,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Comment => "comment",
            Self::Like => "like",
            Self::Dislike => "dislike",
            Self::Subscribe => "subscribe",
            Self::Upload => "upload",
            Self::NewsUpload => "news_upload",
            Self::WeatherUpload => "weather_upload",
            Self::Moderation => "moderation",
        }
    }

    /// Uploads bump `videos_uploaded` and `last_video_ts`
    pub fn is_upload(self) -> bool {
        matches!(self, Self::Upload | Self::NewsUpload | Self::WeatherUpload)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "comment" => Ok(Self::Comment),
            "like" => Ok(Self::Like),
            "dislike" => Ok(Self::Dislike),
            "subscribe" => Ok(Self::Subscribe),
            "upload" => Ok(Self::Upload),
            "news_upload" => Ok(Self::NewsUpload),
            "weather_upload" => Ok(Self::WeatherUpload),
            "moderation" => Ok(Self::Moderation),
            _ => Err(format!("Invalid action kind: {s}")),
        }
    }
}

/// Default values for every tunable. Configuration sections fall back to these.
pub mod defaults {
    pub const MAX_ACTIONS_PER_HOUR: usize = 30;
    pub const MAX_COMMENTS_PER_ACTOR_PER_HOUR: i64 = 5;
    pub const MIN_ACTION_GAP_SECS: u64 = 30;
    pub const SAME_VIDEO_COOLDOWN_SECS: u64 = 86_400;
    pub const MAX_VIDEOS_PER_DAY: u32 = 6;
    pub const BURST_THRESHOLD: usize = 10;
    pub const BURST_WINDOW_SECS: u64 = 1_800;

    pub const MAX_SMART_TURNS: usize = 15;
    pub const LOOP_GUARD_REPEATS: usize = 3;
    pub const ERROR_BUDGET: usize = 5;
    pub const NUDGE_TURN_LIMIT: usize = 4;
    pub const PAYLOAD_PROBABILITY: f64 = 0.30;
    pub const REACTION_PROBABILITY: f64 = 0.40;
    pub const BROWSE_PROBABILITY: f64 = 0.30;
    pub const VIDEO_CHANCE_HIGH: f64 = 0.02;
    pub const VIDEO_CHANCE_MEDIUM: f64 = 0.01;
    pub const VIDEO_CHANCE_LOW: f64 = 0.003;
    pub const COMMENT_MAX_CHARS: usize = 500;

    pub const NEWS_DEDUP_DAYS: u64 = 7;
    pub const WEATHER_DEDUP_DAYS: u64 = 2;

    pub const MEDIA_DEADLINE_SECS: u64 = 600;
    pub const MEDIA_POLL_INTERVAL_SECS: u64 = 5;

    pub const POLL_MIN_SECS: u64 = 30;
    pub const POLL_MAX_SECS: u64 = 90;
    pub const LOOP_ERROR_SLEEP_SECS: u64 = 60;
    pub const STATUS_EVERY_ITERATIONS: u64 = 20;
    pub const RUN_ONCE_MAX_ACTIONS: usize = 3;

    pub const QUIET_START_HOUR: u32 = 2;
    pub const QUIET_END_HOUR: u32 = 8;
    pub const QUIET_MULTIPLIER: f64 = 2.0;
    pub const PEAK_START_HOUR: u32 = 14;
    pub const PEAK_END_HOUR: u32 = 22;
    pub const PEAK_MULTIPLIER: f64 = 0.7;

    pub const STARTUP_STAGGER_MIN_SECS: u64 = 30;
    pub const STARTUP_STAGGER_MAX_SECS: u64 = 600;
}

/// Identifier prefixes that only ever come from a model making ids up
pub const PLACEHOLDER_ID_PREFIXES: &[&str] = &["trending", "video", "vid_", "v10", "test", "example"];
