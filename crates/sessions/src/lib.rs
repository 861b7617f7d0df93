//! Conversation and message persistence.
//!
//! Conversations are keyed by their canonical id and keep the routing fields
//! they were created with. Messages are append-only; the schema enforces one
//! response per user turn and rejects agent turns attributed to `system`.

pub mod conversation;
pub mod error;
pub mod message;
pub mod store;

pub use {
    conversation::{Conversation, ConversationStore, SqliteConversationStore},
    error::{Error, Result},
    message::{FallbackInfo, FallbackKind, MessageMetadata, PersistedMessage},
    store::{MessageStore, SqliteMessageStore},
};

const SCHEMA: &str = include_str!("../migrations/20260301000100_conversations.sql");

/// Run database migrations for the sessions crate.
///
/// Creates the `conversations` and `messages` tables. Call at startup before
/// using [`SqliteConversationStore`] or [`SqliteMessageStore`].
pub async fn run_migrations(pool: &sqlx::SqlitePool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .set_ignore_missing(true)
        .run(pool)
        .await?;
    Ok(())
}

/// Create the tables directly from the migration script, for in-memory
/// databases in tests.
#[doc(hidden)]
pub async fn init(pool: &sqlx::SqlitePool) -> anyhow::Result<()> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub(crate) async fn test_pool() -> sqlx::SqlitePool {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    init(&pool).await.unwrap();
    pool
}
