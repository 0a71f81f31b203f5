//! # Database Operations
//!
//! SQLite persistence for the daemon's only memory across restarts.
//!
//! ## Key Components
//!
//! - [`connect`] - opens a single-connection pool (WAL journal for file databases)
//! - [`migrations`] - idempotent schema creation
//! - [`store`] - the single-writer [`StateStore`] actor that owns the pool
//!
//! ## Concurrency
//!
//! The control loop and the health endpoint never touch the pool directly. Every read
//! and write is a message to the store actor, which executes them one at a time, so
//! SQLite never sees uncoordinated concurrent writers.

pub mod migrations;
pub mod store;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

pub use store::StateStore;

/// Whether a SQLite URL refers to an in-memory database
pub fn is_memory_url(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

/// Open a pool with exactly one connection.
///
/// One connection is all the single-writer store needs, and it keeps in-memory
/// databases alive for the lifetime of the pool.
pub async fn connect(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let memory = is_memory_url(database_url);
    let journal = if memory {
        SqliteJournalMode::Memory
    } else {
        SqliteJournalMode::Wal
    };

    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(journal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    info!(
        database_url = %database_url,
        in_memory = memory,
        "🗄️ DATABASE: Connected"
    );
    Ok(pool)
}
