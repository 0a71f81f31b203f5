//! Process-wide set of video ids observed on the platform.
//!
//! Loaded from the store at startup and mirrored back on every insert, so ids seen
//! before a restart still count as known.

use dashmap::DashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::database::StateStore;
use crate::error::Result;
use crate::models::Video;
use crate::utils::Clock;

pub struct KnownVideoCache {
    ids: DashSet<String>,
    store: StateStore,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for KnownVideoCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnownVideoCache")
            .field("known", &self.ids.len())
            .finish()
    }
}

impl KnownVideoCache {
    pub async fn load(store: StateStore, clock: Arc<dyn Clock>) -> Result<Self> {
        let ids: DashSet<String> = store.load_known_videos().await?.into_iter().collect();
        debug!(known = ids.len(), "📼 KNOWN_VIDEOS: Loaded");
        Ok(Self { ids, store, clock })
    }

    pub fn contains(&self, video_id: &str) -> bool {
        self.ids.contains(video_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        self.ids.iter().map(|id| id.key().clone()).collect()
    }

    /// Insert an id. Returns `true` when the id was new to this process.
    pub async fn track(&self, video_id: &str) -> Result<bool> {
        if video_id.is_empty() || !self.ids.insert(video_id.to_string()) {
            return Ok(false);
        }
        self.store
            .track_video(video_id, self.clock.epoch_secs())
            .await?;
        Ok(true)
    }

    /// Track every video in a listing, returning the ones not seen before.
    ///
    /// Store failures are logged and do not drop the in-memory entry.
    pub async fn track_all(&self, videos: &[Video]) -> Vec<Video> {
        let mut fresh = Vec::new();
        for video in videos {
            match self.track(&video.video_id).await {
                Ok(true) => fresh.push(video.clone()),
                Ok(false) => {}
                Err(err) => {
                    warn!(video_id = %video.video_id, error = %err, "Failed to persist known video");
                    fresh.push(video.clone());
                }
            }
        }
        fresh
    }
}
