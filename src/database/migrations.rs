//! # Schema Setup
//!
//! The daemon owns three tables and creates them idempotently at startup. There is no
//! migration history: every statement is `IF NOT EXISTS`, so running the schema
//! against an existing database is a no-op.

use sqlx::SqlitePool;
use tracing::debug;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS actor_state (
    actor_id TEXT PRIMARY KEY,
    last_action_ts REAL NOT NULL DEFAULT 0,
    last_comment_ts REAL NOT NULL DEFAULT 0,
    last_video_ts REAL NOT NULL DEFAULT 0,
    next_wake_ts REAL NOT NULL DEFAULT 0,
    videos_uploaded INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS actor_actions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    actor_id TEXT NOT NULL,
    action_type TEXT NOT NULL,
    video_id TEXT,
    target_actor TEXT,
    timestamp REAL NOT NULL,
    text TEXT
);

CREATE INDEX IF NOT EXISTS idx_actions_actor_video
    ON actor_actions(actor_id, video_id);

CREATE INDEX IF NOT EXISTS idx_actions_timestamp
    ON actor_actions(timestamp);

CREATE TABLE IF NOT EXISTS known_videos (
    video_id TEXT PRIMARY KEY,
    first_seen REAL NOT NULL
);
"#;

/// Tables the daemon expects to exist after [`ensure_schema`]
pub const TABLES: &[&str] = &["actor_state", "actor_actions", "known_videos"];

/// Create all tables and indices if missing
pub async fn ensure_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    debug!("✅ SCHEMA: actor_state, actor_actions, known_videos ready");
    Ok(())
}

/// Check whether a table exists
pub async fn table_exists(pool: &SqlitePool, table: &str) -> Result<bool, sqlx::Error> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
    )
    .bind(table)
    .fetch_one(pool)
    .await?;
    Ok(count > 0)
}
