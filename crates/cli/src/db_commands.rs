use {clap::Subcommand, huddle_config::HuddleConfig, std::path::PathBuf};

use crate::stores::open_pool;

#[derive(Subcommand)]
pub enum DbAction {
    /// Run all pending database migrations.
    Migrate,
    /// Delete all messages and conversations but keep the roster.
    Clear,
    /// Delete the database file completely.
    Reset,
}

pub async fn handle_db(action: DbAction, config: &HuddleConfig) -> anyhow::Result<()> {
    match action {
        DbAction::Migrate => {
            open_pool(config).await?;
            println!("Migrations applied to {}.", config.storage.database_url);
            Ok(())
        },
        DbAction::Clear => clear(config).await,
        DbAction::Reset => reset(config),
    }
}

async fn clear(config: &HuddleConfig) -> anyhow::Result<()> {
    let pool = open_pool(config).await?;
    // Children before parents.
    for table in ["messages", "conversations"] {
        let result = sqlx::query(&format!("DELETE FROM {table}"))
            .execute(&pool)
            .await?;
        println!("Cleared {table} ({} rows)", result.rows_affected());
    }
    Ok(())
}

/// File path of a `sqlite:` connection string, ignoring query parameters.
fn sqlite_file(database_url: &str) -> Option<PathBuf> {
    let rest = database_url.strip_prefix("sqlite:")?;
    let rest = rest.trim_start_matches("//");
    let path = rest.split('?').next().unwrap_or_default();
    (!path.is_empty() && path != ":memory:").then(|| PathBuf::from(path))
}

fn reset(config: &HuddleConfig) -> anyhow::Result<()> {
    let Some(db) = sqlite_file(&config.storage.database_url) else {
        println!("Nothing to reset for {}.", config.storage.database_url);
        return Ok(());
    };

    let mut deleted = false;
    // Also delete WAL and SHM files that SQLite may have created.
    for suffix in ["", "-wal", "-shm"] {
        let path = PathBuf::from(format!("{}{suffix}", db.display()));
        if path.exists() {
            std::fs::remove_file(&path)?;
            println!("Deleted: {}", path.display());
            deleted = true;
        }
    }

    if deleted {
        println!("Database files deleted. Run `huddle db migrate` to recreate them.");
    } else {
        println!("No database files found.");
    }
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_file_from_url() {
        assert_eq!(
            sqlite_file("sqlite://huddle.db?mode=rwc"),
            Some(PathBuf::from("huddle.db"))
        );
        assert_eq!(
            sqlite_file("sqlite:/var/lib/huddle.db"),
            Some(PathBuf::from("/var/lib/huddle.db"))
        );
        assert_eq!(sqlite_file("sqlite::memory:"), None);
        assert_eq!(sqlite_file("postgres://localhost/huddle"), None);
    }
}
