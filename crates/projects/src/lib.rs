//! Project rosters: projects, their teams, and their agents.
//!
//! Routing reads a project's agents in roster order, so every store keeps
//! insertion order stable across updates.

pub mod error;
pub mod store;

pub use {
    error::{Error, Result},
    store::{RosterStore, SqliteRosterStore, TomlRosterStore},
};

/// Run database migrations for the roster tables.
///
/// Call at startup before using [`SqliteRosterStore`].
pub async fn run_migrations(pool: &sqlx::SqlitePool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .set_ignore_missing(true)
        .run(pool)
        .await?;
    Ok(())
}
