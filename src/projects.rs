//! Project registry: create, look up, and soft-delete connected repositories.
//!
//! Shared by the webhook processors and the CLI. Repository lookup is an
//! exact `repo_url` equality match excluding soft-deleted rows — not fuzzy
//! and not case-insensitive, so callers must supply the canonical URL form.

use anyhow::{bail, Result};
use chrono::{TimeZone, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::github;
use crate::models::{Project, RepositoryReference};

/// Register a project for a repository URL.
pub async fn create_project(
    pool: &SqlitePool,
    repo_url: &str,
    default_branch: &str,
) -> Result<Project> {
    let (owner, repo) = github::parse_repository_url(repo_url);
    if owner.is_empty() || repo.is_empty() {
        bail!("Invalid repository URL: '{}'", repo_url);
    }

    let id = Uuid::new_v4().to_string();
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO projects (id, owner, repo, default_branch, repo_url, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&owner)
    .bind(&repo)
    .bind(default_branch)
    .bind(repo_url)
    .bind(now.timestamp())
    .execute(pool)
    .await?;

    Ok(Project {
        id,
        repository: RepositoryReference {
            owner,
            repo,
            default_branch: default_branch.to_string(),
        },
        repo_url: repo_url.to_string(),
        deleted_at: None,
        created_at: now,
    })
}

/// All live projects connected to a repository URL (exact match).
pub async fn get_projects_for_repository(
    pool: &SqlitePool,
    repo_url: &str,
) -> Result<Vec<Project>> {
    let rows: Vec<(String, String, String, String, String, Option<i64>, i64)> = sqlx::query_as(
        r#"
        SELECT id, owner, repo, default_branch, repo_url, deleted_at, created_at
        FROM projects
        WHERE repo_url = ? AND deleted_at IS NULL
        ORDER BY created_at
        "#,
    )
    .bind(repo_url)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(row_to_project).collect())
}

/// All live projects, for `rpx project list`.
pub async fn list_projects(pool: &SqlitePool) -> Result<Vec<Project>> {
    let rows: Vec<(String, String, String, String, String, Option<i64>, i64)> = sqlx::query_as(
        r#"
        SELECT id, owner, repo, default_branch, repo_url, deleted_at, created_at
        FROM projects
        WHERE deleted_at IS NULL
        ORDER BY created_at
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(row_to_project).collect())
}

/// Soft-delete every project connected to a repository URL.
///
/// Rows are never physically removed; returns the number marked.
pub async fn soft_delete_projects_for_repository(
    pool: &SqlitePool,
    repo_url: &str,
) -> Result<u64> {
    let now = Utc::now().timestamp();
    let result = sqlx::query(
        "UPDATE projects SET deleted_at = ? WHERE repo_url = ? AND deleted_at IS NULL",
    )
    .bind(now)
    .bind(repo_url)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

fn row_to_project(
    (id, owner, repo, default_branch, repo_url, deleted_at, created_at): (
        String,
        String,
        String,
        String,
        String,
        Option<i64>,
        i64,
    ),
) -> Project {
    Project {
        id,
        repository: RepositoryReference {
            owner,
            repo,
            default_branch,
        },
        repo_url,
        deleted_at,
        created_at: Utc
            .timestamp_opt(created_at, 0)
            .single()
            .unwrap_or_else(Utc::now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::test_pool;

    #[tokio::test]
    async fn test_create_and_lookup() {
        let (_tmp, pool) = test_pool().await;
        let url = "https://github.com/acme/widgets";

        let project = create_project(&pool, url, "main").await.unwrap();
        assert_eq!(project.repository.owner, "acme");
        assert_eq!(project.repository.repo, "widgets");

        let found = get_projects_for_repository(&pool, url).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, project.id);

        // Exact-match lookup: a differently cased URL finds nothing.
        let miss = get_projects_for_repository(&pool, "https://github.com/Acme/widgets")
            .await
            .unwrap();
        assert!(miss.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_url_rejected() {
        let (_tmp, pool) = test_pool().await;
        assert!(create_project(&pool, "https://github.com/just-owner", "main")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_soft_delete_hides_projects() {
        let (_tmp, pool) = test_pool().await;
        let url = "https://github.com/acme/widgets";
        create_project(&pool, url, "main").await.unwrap();
        create_project(&pool, url, "main").await.unwrap();

        let marked = soft_delete_projects_for_repository(&pool, url).await.unwrap();
        assert_eq!(marked, 2);

        assert!(get_projects_for_repository(&pool, url).await.unwrap().is_empty());

        // Rows still exist physically.
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM projects")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(total, 2);
    }
}
