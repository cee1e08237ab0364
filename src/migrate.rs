use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create all tables and indexes. Idempotent.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    // Connected repositories. Soft-deleted via deleted_at; the structure
    // snapshot is an attached JSON blob guarded by analysis_version.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS projects (
            id TEXT PRIMARY KEY,
            owner TEXT NOT NULL,
            repo TEXT NOT NULL,
            default_branch TEXT NOT NULL DEFAULT 'main',
            repo_url TEXT NOT NULL,
            structure_json TEXT,
            analysis_version INTEGER NOT NULL DEFAULT 0,
            last_analyzed INTEGER,
            deleted_at INTEGER,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Index records: one row per (project, path); embedding is a BLOB of
    // little-endian f32 bytes.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS source_files (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            file_name TEXT NOT NULL,
            source_code TEXT NOT NULL,
            summary TEXT NOT NULL,
            embedding BLOB,
            updated_at INTEGER NOT NULL,
            UNIQUE(project_id, file_name),
            FOREIGN KEY (project_id) REFERENCES projects(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Observed commits; the uniqueness constraint is the idempotency guard
    // against webhook redelivery.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS commits (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            commit_hash TEXT NOT NULL,
            message TEXT NOT NULL,
            author_name TEXT NOT NULL,
            committed_at INTEGER NOT NULL,
            UNIQUE(project_id, commit_hash),
            FOREIGN KEY (project_id) REFERENCES projects(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Outbox backing the fire-and-forget job bus; a worker drains rows with
    // dispatched_at IS NULL.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            id TEXT PRIMARY KEY,
            event TEXT NOT NULL,
            payload_json TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            dispatched_at INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_projects_repo_url ON projects(repo_url)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_source_files_project_id ON source_files(project_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_commits_project_id ON commits(project_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_pending ON jobs(created_at) WHERE dispatched_at IS NULL")
        .execute(pool)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_apply_schema_is_idempotent() {
        // test_pool has already applied the schema once.
        let (_tmp, pool) = crate::testutil::test_pool().await;
        let project = crate::projects::create_project(&pool, "https://github.com/acme/widgets", "main")
            .await
            .unwrap();

        apply_schema(&pool).await.unwrap();

        // Existing rows survive the re-run.
        let found = crate::projects::get_projects_for_repository(
            &pool,
            "https://github.com/acme/widgets",
        )
        .await
        .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, project.id);

        // And the store stays writable afterwards.
        crate::projects::create_project(&pool, "https://github.com/acme/gadgets", "main")
            .await
            .unwrap();
    }
}
