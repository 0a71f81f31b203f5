use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// Per-actor schedule state, mirrored in `actor_state`.
///
/// All timestamps are epoch seconds. `0.0` means "never".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ActorScheduleState {
    pub actor_id: String,
    pub last_action_ts: f64,
    pub last_comment_ts: f64,
    pub last_video_ts: f64,
    pub next_wake_ts: f64,
    pub videos_uploaded: i64,
}

impl ActorScheduleState {
    /// Fresh state for an actor with no persisted row
    pub fn new(actor_id: impl Into<String>) -> Self {
        Self {
            actor_id: actor_id.into(),
            last_action_ts: 0.0,
            last_comment_ts: 0.0,
            last_video_ts: 0.0,
            next_wake_ts: 0.0,
            videos_uploaded: 0,
        }
    }

    /// Load the persisted row for an actor
    pub async fn find(pool: &SqlitePool, actor_id: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT actor_id, last_action_ts, last_comment_ts, last_video_ts, next_wake_ts, videos_uploaded
            FROM actor_state
            WHERE actor_id = ?
            "#,
        )
        .bind(actor_id)
        .fetch_optional(pool)
        .await
    }

    /// Insert or replace the row. Writing the same state twice is a no-op in effect.
    pub async fn upsert(pool: &SqlitePool, state: &Self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO actor_state
                (actor_id, last_action_ts, last_comment_ts, last_video_ts, next_wake_ts, videos_uploaded)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(actor_id) DO UPDATE SET
                last_action_ts = excluded.last_action_ts,
                last_comment_ts = excluded.last_comment_ts,
                last_video_ts = excluded.last_video_ts,
                next_wake_ts = excluded.next_wake_ts,
                videos_uploaded = excluded.videos_uploaded
            "#,
        )
        .bind(&state.actor_id)
        .bind(state.last_action_ts)
        .bind(state.last_comment_ts)
        .bind(state.last_video_ts)
        .bind(state.next_wake_ts)
        .bind(state.videos_uploaded)
        .execute(pool)
        .await?;
        Ok(())
    }
}
