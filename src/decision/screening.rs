//! Screening of model-supplied video ids before any platform call.
//!
//! Ids matching a placeholder pattern are always rejected. An id outside the
//! known-video cache passes as [`IdScreen::Stale`] with a warning unless strict mode
//! is on, in which case it is rejected too.

use tracing::warn;

use crate::constants::PLACEHOLDER_ID_PREFIXES;
use crate::orchestration::KnownVideoCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdScreen {
    /// Observed from the platform during this process or a previous one
    Known,
    /// Plausible but never observed
    Stale,
}

/// Why an id was rejected; rendered into the tool result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdRejection(pub String);

impl std::fmt::Display for IdRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn looks_fabricated(video_id: &str) -> bool {
    let lowered = video_id.to_lowercase();
    PLACEHOLDER_ID_PREFIXES
        .iter()
        .any(|prefix| lowered.starts_with(prefix))
}

pub fn screen_video_id(video_id: &str, known: &KnownVideoCache, strict: bool) -> Result<IdScreen, IdRejection> {
    let video_id = video_id.trim();
    if video_id.is_empty() {
        return Err(IdRejection("video_id is required".to_string()));
    }
    if looks_fabricated(video_id) {
        return Err(IdRejection(format!("'{video_id}' is not a real video ID.")));
    }
    if known.is_empty() || known.contains(video_id) {
        return Ok(IdScreen::Known);
    }
    if strict {
        return Err(IdRejection(format!(
            "'{video_id}' was not returned by browse_feed, browse_trending or search_videos."
        )));
    }
    warn!(video_id = %video_id, "Video id not in known set (may be stale)");
    Ok(IdScreen::Stale)
}
