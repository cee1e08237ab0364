//! Incremental file re-indexing.
//!
//! The [`FileProcessor`] keeps the `source_files` index in sync with the
//! repository after a change set: deleted files are removed, everything else
//! is re-fetched, re-summarized, and re-embedded. One outcome is reported
//! per path; a failure on one path never aborts the batch.
//!
//! Writes are two-step on purpose: scalar columns first, then the embedding
//! BLOB in a separate UPDATE, so a failed vector write leaves a readable row.

use anyhow::{anyhow, bail, Result};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::embedding::{vec_to_blob, Embedder};
use crate::github::{self, GitHubClient};
use crate::models::{ReindexOutcome, ReindexStatus, SourceFileRecord};
use crate::summarize::Summarizer;

/// Load one file's index record, without the embedding BLOB.
pub async fn load_indexed_file(
    pool: &SqlitePool,
    project_id: &str,
    file_name: &str,
) -> Result<Option<SourceFileRecord>> {
    let record = sqlx::query_as::<_, SourceFileRecord>(
        r#"
        SELECT id, project_id, file_name, source_code, summary, updated_at
        FROM source_files
        WHERE project_id = ? AND file_name = ?
        "#,
    )
    .bind(project_id)
    .bind(file_name)
    .fetch_optional(pool)
    .await?;

    Ok(record)
}

/// Drives summarize-embed-store for changed files.
pub struct FileProcessor {
    pool: SqlitePool,
    github: GitHubClient,
    summarizer: Arc<dyn Summarizer>,
    embedder: Arc<dyn Embedder>,
}

impl FileProcessor {
    pub fn new(
        pool: SqlitePool,
        github: GitHubClient,
        summarizer: Arc<dyn Summarizer>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            pool,
            github,
            summarizer,
            embedder,
        }
    }

    /// Re-index a batch of changed paths for one project.
    ///
    /// Never fails as a whole: each path resolves to one [`ReindexOutcome`],
    /// with per-path errors captured as [`ReindexStatus::Error`].
    pub async fn reindex_changed_files(
        &self,
        project_id: &str,
        repo_url: &str,
        changed_paths: &[String],
    ) -> Vec<ReindexOutcome> {
        let (owner, repo) = github::parse_repository_url(repo_url);
        let mut outcomes = Vec::with_capacity(changed_paths.len());

        for path in changed_paths {
            let outcome = match self.process_path(project_id, &owner, &repo, path).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(path = %path, error = %e, "reindex failed");
                    ReindexOutcome {
                        file_path: path.clone(),
                        status: ReindexStatus::Error,
                        detail: Some(e.to_string()),
                    }
                }
            };
            outcomes.push(outcome);
        }

        let count = |status: ReindexStatus| {
            outcomes.iter().filter(|o| o.status == status).count()
        };
        info!(
            project_id,
            reindexed = count(ReindexStatus::Reindexed),
            removed = count(ReindexStatus::Removed),
            skipped = count(ReindexStatus::Skipped),
            errors = count(ReindexStatus::Error),
            "reindex batch complete"
        );

        outcomes
    }

    async fn process_path(
        &self,
        project_id: &str,
        owner: &str,
        repo: &str,
        path: &str,
    ) -> Result<ReindexOutcome> {
        if owner.is_empty() || repo.is_empty() {
            bail!("Invalid repository reference");
        }

        if !self.github.check_file_exists(owner, repo, path).await {
            self.remove_file(project_id, path).await?;
            return Ok(ReindexOutcome {
                file_path: path.to_string(),
                status: ReindexStatus::Removed,
                detail: None,
            });
        }

        let content = match self.github.get_file_content(owner, repo, path).await {
            Some(content) => content,
            None => {
                warn!(path, "content unavailable, skipping");
                return Ok(ReindexOutcome {
                    file_path: path.to_string(),
                    status: ReindexStatus::Skipped,
                    detail: Some("content unavailable".to_string()),
                });
            }
        };

        let summary = self.summarizer.summarize(&content, path).await?;
        if summary.trim().is_empty() {
            return Ok(ReindexOutcome {
                file_path: path.to_string(),
                status: ReindexStatus::Skipped,
                detail: Some("empty summary".to_string()),
            });
        }

        let vector = self.embedder.embed(&summary).await?;
        self.store_file(project_id, path, &content, &summary, &vector)
            .await?;

        Ok(ReindexOutcome {
            file_path: path.to_string(),
            status: ReindexStatus::Reindexed,
            detail: None,
        })
    }

    async fn remove_file(&self, project_id: &str, path: &str) -> Result<()> {
        sqlx::query("DELETE FROM source_files WHERE project_id = ? AND file_name = ?")
            .bind(project_id)
            .bind(path)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn store_file(
        &self,
        project_id: &str,
        path: &str,
        content: &str,
        summary: &str,
        vector: &[f32],
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        let existing = load_indexed_file(&self.pool, project_id, path).await?;

        let id = match existing {
            Some(record) => {
                let id = record.id;
                sqlx::query(
                    "UPDATE source_files SET source_code = ?, summary = ?, updated_at = ? WHERE id = ?",
                )
                .bind(content)
                .bind(summary)
                .bind(now)
                .bind(&id)
                .execute(&self.pool)
                .await?;
                id
            }
            None => {
                let id = Uuid::new_v4().to_string();
                sqlx::query(
                    r#"
                    INSERT INTO source_files (id, project_id, file_name, source_code, summary, updated_at)
                    VALUES (?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&id)
                .bind(project_id)
                .bind(path)
                .bind(content)
                .bind(summary)
                .bind(now)
                .execute(&self.pool)
                .await?;
                id
            }
        };

        let result = sqlx::query("UPDATE source_files SET embedding = ? WHERE id = ?")
            .bind(vec_to_blob(vector))
            .bind(&id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() != 1 {
            return Err(anyhow!("embedding write affected no rows for {}", path));
        }

        Ok(())
    }
}
