//! Planned actions for one loop iteration and their ordering.

use rand::seq::SliceRandom;
use std::fmt;

use crate::models::Video;
use crate::utils::SharedRng;

/// A unit of work the orchestration loop may execute this iteration
#[derive(Debug, Clone, PartialEq)]
pub enum PlannedAction {
    /// Admin sweep by a moderation persona
    ModerationSweep { actor: String },
    /// Tier-1 tool-use cycle
    SmartCycle { actor: String },
    NewsCycle { actor: String },
    WeatherCycle { actor: String },
    /// Standard-tier reaction to a freshly observed video
    React { actor: String, video: Video },
    /// Standard-tier browse and comment
    Browse { actor: String },
    GenerateVideo { actor: String },
}

impl PlannedAction {
    pub fn actor(&self) -> &str {
        match self {
            Self::ModerationSweep { actor }
            | Self::SmartCycle { actor }
            | Self::NewsCycle { actor }
            | Self::WeatherCycle { actor }
            | Self::React { actor, .. }
            | Self::Browse { actor }
            | Self::GenerateVideo { actor } => actor,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::ModerationSweep { .. } => "moderation",
            Self::SmartCycle { .. } => "smart_cycle",
            Self::NewsCycle { .. } => "news_cycle",
            Self::WeatherCycle { .. } => "weather_cycle",
            Self::React { .. } => "react",
            Self::Browse { .. } => "browse",
            Self::GenerateVideo { .. } => "generate_video",
        }
    }

    /// Exempt actions run ahead of everything else and skip the governor check
    pub fn is_exempt(&self) -> bool {
        matches!(
            self,
            Self::ModerationSweep { .. }
                | Self::SmartCycle { .. }
                | Self::NewsCycle { .. }
                | Self::WeatherCycle { .. }
        )
    }
}

impl fmt::Display for PlannedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::React { actor, video } => write!(f, "react({actor} -> {})", video.video_id),
            other => write!(f, "{}({})", other.kind(), other.actor()),
        }
    }
}

/// Exempt actions first in planning order, the rest shuffled
pub fn prioritize(actions: Vec<PlannedAction>, rng: &SharedRng) -> Vec<PlannedAction> {
    let (mut ordered, mut rest): (Vec<_>, Vec<_>) =
        actions.into_iter().partition(PlannedAction::is_exempt);
    rest.shuffle(&mut *rng.lock());
    ordered.extend(rest);
    ordered
}
