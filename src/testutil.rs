//! Shared test fixtures: a migrated SQLite pool on a temp file.

use sqlx::SqlitePool;
use tempfile::TempDir;

use crate::config::{Config, DbConfig, ServerConfig};
use crate::{db, migrate};

/// Fresh pool with the full schema applied. Keep the `TempDir` alive for
/// the duration of the test.
pub async fn test_pool() -> (TempDir, SqlitePool) {
    let tmp = TempDir::new().unwrap();
    let config = Config {
        db: DbConfig {
            path: tmp.path().join("test.sqlite"),
        },
        github: Default::default(),
        summarizer: Default::default(),
        embedding: Default::default(),
        server: ServerConfig {
            bind: "127.0.0.1:0".into(),
            webhook_secret_env: "WEBHOOK_SECRET".into(),
        },
    };
    let pool = db::connect(&config).await.unwrap();
    migrate::apply_schema(&pool).await.unwrap();
    (tmp, pool)
}
