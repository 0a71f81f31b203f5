use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// A video id actually observed from the platform, stored in `known_videos`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct KnownVideo {
    pub video_id: String,
    pub first_seen: f64,
}

impl KnownVideo {
    /// Record an id; keeps the original `first_seen` if already present
    pub async fn track(pool: &SqlitePool, video_id: &str, seen_at: f64) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT OR IGNORE INTO known_videos (video_id, first_seen) VALUES (?, ?)")
            .bind(video_id)
            .bind(seen_at)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn all_ids(pool: &SqlitePool) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>("SELECT video_id FROM known_videos ORDER BY first_seen")
            .fetch_all(pool)
            .await
    }
}
