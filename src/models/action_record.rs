use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use crate::constants::ActionKind;

/// Append-only ledger entry, stored in `actor_actions`.
///
/// `text` carries the comment body for comments, and the dedup key (headline or
/// city hash) for news and weather uploads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ActionRecord {
    pub id: i64,
    pub actor_id: String,
    pub action_type: String,
    pub video_id: Option<String>,
    pub target_actor: Option<String>,
    pub timestamp: f64,
    pub text: Option<String>,
}

/// New ledger entry for creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewActionRecord {
    pub actor_id: String,
    pub kind: ActionKind,
    pub video_id: Option<String>,
    pub target_actor: Option<String>,
    pub timestamp: f64,
    pub text: Option<String>,
}

impl NewActionRecord {
    pub fn new(actor_id: impl Into<String>, kind: ActionKind, timestamp: f64) -> Self {
        Self {
            actor_id: actor_id.into(),
            kind,
            video_id: None,
            target_actor: None,
            timestamp,
            text: None,
        }
    }

    pub fn with_video(mut self, video_id: impl Into<String>) -> Self {
        self.video_id = Some(video_id.into());
        self
    }

    pub fn with_target_actor(mut self, target: impl Into<String>) -> Self {
        self.target_actor = Some(target.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

impl ActionRecord {
    /// Append a ledger entry, returning its id
    pub async fn create(pool: &SqlitePool, new: &NewActionRecord) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO actor_actions (actor_id, action_type, video_id, target_actor, timestamp, text)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&new.actor_id)
        .bind(new.kind.as_str())
        .bind(&new.video_id)
        .bind(&new.target_actor)
        .bind(new.timestamp)
        .bind(&new.text)
        .execute(pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Count an actor's entries of one kind strictly after `since`
    pub async fn count_since(
        pool: &SqlitePool,
        actor_id: &str,
        kind: ActionKind,
        since: f64,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM actor_actions WHERE actor_id = ? AND action_type = ? AND timestamp > ?",
        )
        .bind(actor_id)
        .bind(kind.as_str())
        .bind(since)
        .fetch_one(pool)
        .await
    }

    /// Whether an entry of `kind` on `video_id` exists strictly after `since`
    pub async fn exists_on_video_since(
        pool: &SqlitePool,
        actor_id: &str,
        kind: ActionKind,
        video_id: &str,
        since: f64,
    ) -> Result<bool, sqlx::Error> {
        let found = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM actor_actions
                WHERE actor_id = ? AND action_type = ? AND video_id = ? AND timestamp > ?
            )
            "#,
        )
        .bind(actor_id)
        .bind(kind.as_str())
        .bind(video_id)
        .bind(since)
        .fetch_one(pool)
        .await?;
        Ok(found != 0)
    }

    /// Text payloads of an actor's entries of one kind after `since`
    pub async fn texts_since(
        pool: &SqlitePool,
        actor_id: &str,
        kind: ActionKind,
        since: f64,
    ) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT text FROM actor_actions
            WHERE actor_id = ? AND action_type = ? AND timestamp > ? AND text IS NOT NULL
            ORDER BY timestamp
            "#,
        )
        .bind(actor_id)
        .bind(kind.as_str())
        .bind(since)
        .fetch_all(pool)
        .await
    }

    /// Full ledger for one actor, oldest first
    pub async fn list_for_actor(pool: &SqlitePool, actor_id: &str) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT id, actor_id, action_type, video_id, target_actor, timestamp, text
            FROM actor_actions
            WHERE actor_id = ?
            ORDER BY id
            "#,
        )
        .bind(actor_id)
        .fetch_all(pool)
        .await
    }

    pub fn kind(&self) -> Option<ActionKind> {
        self.action_type.parse().ok()
    }
}
