use std::{path::PathBuf, sync::Arc};

use {
    anyhow::Context,
    huddle_config::HuddleConfig,
    huddle_projects::{RosterStore, SqliteRosterStore, TomlRosterStore},
    tracing::debug,
};

/// Open the configured database and bring every schema up to date.
pub async fn open_pool(config: &HuddleConfig) -> anyhow::Result<sqlx::SqlitePool> {
    let url = &config.storage.database_url;
    let pool = sqlx::SqlitePool::connect(url)
        .await
        .with_context(|| format!("failed to open database {url}"))?;
    huddle_projects::run_migrations(&pool).await?;
    huddle_sessions::run_migrations(&pool).await?;
    debug!(database_url = %url, "database ready");
    Ok(pool)
}

/// A TOML roster when a file is configured, otherwise the database roster.
pub async fn open_roster(
    config: &HuddleConfig,
    roster_path: Option<PathBuf>,
) -> anyhow::Result<Arc<dyn RosterStore>> {
    match roster_path {
        Some(path) => {
            debug!(path = %path.display(), "using TOML roster");
            Ok(Arc::new(TomlRosterStore::new(path)))
        },
        None => Ok(Arc::new(SqliteRosterStore::new(open_pool(config).await?))),
    }
}
