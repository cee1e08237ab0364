//! SQLite connection pool for the repo-pulse store.
//!
//! One database file holds the project registry, the source-file index,
//! observed commits, and the job outbox. Webhook handlers insert small rows
//! from concurrent requests while a reindex batch may be mid-write, so the
//! pool runs WAL with a busy timeout rather than serializing writers in the
//! application.

use anyhow::Result;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::str::FromStr;
use std::time::Duration;

use crate::config::Config;

/// Open (creating if missing) the database at `[db].path`.
pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let db_path = &config.db.path;

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        // WAL survives process crashes at NORMAL; the index is rebuildable
        // from the repository anyway.
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(5))
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DbConfig, ServerConfig};

    #[tokio::test]
    async fn test_connect_creates_missing_parent_dirs() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = Config {
            db: DbConfig {
                path: tmp.path().join("nested/deeper/rpx.sqlite"),
            },
            github: Default::default(),
            summarizer: Default::default(),
            embedding: Default::default(),
            server: ServerConfig {
                bind: "127.0.0.1:0".into(),
                webhook_secret_env: "WEBHOOK_SECRET".into(),
            },
        };

        let pool = connect(&config).await.unwrap();
        let one: i64 = sqlx::query_scalar("SELECT 1").fetch_one(&pool).await.unwrap();
        assert_eq!(one, 1);
        assert!(config.db.path.exists());
    }
}
