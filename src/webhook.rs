//! Webhook event processors for push, pull request, repository, and release
//! events.
//!
//! Handlers do no indexing work inline. They validate the payload, persist
//! the minimum synchronous state (commit rows, index deletions, soft
//! deletes), and enqueue [`Job`]s for everything else. A push to any branch
//! other than a project's default branch is dropped entirely.
//!
//! Idempotency: commit rows are unique per `(project_id, commit_hash)`, so a
//! redelivered push neither duplicates the row nor re-enqueues commit
//! processing.

use anyhow::Result;
use serde::Deserialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::jobs::{Job, JobBus};
use crate::models::{CommitRecord, FileChangeSet, Project};
use crate::policy;
use crate::projects;

/// Observed commits for a project, newest first.
pub async fn recent_commits(
    pool: &SqlitePool,
    project_id: &str,
    limit: i64,
) -> Result<Vec<CommitRecord>> {
    let rows = sqlx::query_as::<_, CommitRecord>(
        r#"
        SELECT id, project_id, commit_hash, message, author_name, committed_at
        FROM commits
        WHERE project_id = ?
        ORDER BY committed_at DESC, commit_hash
        LIMIT ?
        "#,
    )
    .bind(project_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

// ============ Payload types ============

#[derive(Debug, Deserialize)]
pub struct RepositoryInfo {
    pub full_name: String,
    pub html_url: String,
    #[serde(default = "default_branch")]
    pub default_branch: String,
}

fn default_branch() -> String {
    "main".to_string()
}

#[derive(Debug, Deserialize)]
pub struct CommitAuthor {
    pub name: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct CommitInfo {
    pub id: String,
    pub message: String,
    pub author: CommitAuthor,
    #[serde(default)]
    pub added: Vec<String>,
    #[serde(default)]
    pub removed: Vec<String>,
    #[serde(default)]
    pub modified: Vec<String>,
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Deserialize)]
pub struct PushPayload {
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub repository: RepositoryInfo,
    #[serde(default)]
    pub commits: Vec<CommitInfo>,
    pub head_commit: Option<CommitInfo>,
}

#[derive(Debug, Deserialize)]
pub struct PullRequestInfo {
    pub number: i64,
    pub title: String,
    pub state: String,
    #[serde(default)]
    pub merged: bool,
    pub base: BranchRef,
    pub head: BranchRef,
}

#[derive(Debug, Deserialize)]
pub struct BranchRef {
    #[serde(rename = "ref")]
    pub git_ref: String,
}

#[derive(Debug, Deserialize)]
pub struct PullRequestPayload {
    pub action: String,
    pub repository: RepositoryInfo,
    pub pull_request: Option<PullRequestInfo>,
}

#[derive(Debug, Deserialize)]
pub struct RepositoryPayload {
    pub action: String,
    pub repository: RepositoryInfo,
}

#[derive(Debug, Deserialize)]
pub struct ReleaseInfo {
    pub tag_name: String,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReleasePayload {
    pub action: String,
    pub repository: RepositoryInfo,
    pub release: Option<ReleaseInfo>,
}

// ============ Processor ============

/// Dispatches incoming webhook payloads against all connected projects.
pub struct WebhookProcessor {
    pool: SqlitePool,
    bus: Arc<dyn JobBus>,
}

impl WebhookProcessor {
    pub fn new(pool: SqlitePool, bus: Arc<dyn JobBus>) -> Self {
        Self { pool, bus }
    }

    async fn projects_for(&self, repo_url: &str) -> Result<Vec<Project>> {
        projects::get_projects_for_repository(&self.pool, repo_url).await
    }

    /// Handle a `push` event.
    ///
    /// Only pushes to the repository's default branch are processed; every
    /// other ref is dropped without side effects. For each connected project:
    /// commits are recorded once each, removed paths are deleted from the
    /// index synchronously, added/modified paths go to the reindex queue, and
    /// a significant change set escalates to a full smart reindex.
    pub async fn handle_push_event(&self, payload: &PushPayload) -> Result<()> {
        let expected_ref = format!("refs/heads/{}", payload.repository.default_branch);
        if payload.git_ref != expected_ref {
            info!(
                repo = %payload.repository.full_name,
                git_ref = %payload.git_ref,
                "push to non-default branch, ignoring"
            );
            return Ok(());
        }

        let matched = self.projects_for(&payload.repository.html_url).await?;
        if matched.is_empty() {
            debug!(repo = %payload.repository.full_name, "push for unconnected repository");
            return Ok(());
        }

        for project in &matched {
            for commit in &payload.commits {
                if self.record_commit(&project.id, commit).await? {
                    self.bus
                        .send(Job::ProcessCommit {
                            project_id: project.id.clone(),
                            commit_hash: commit.id.clone(),
                            message: commit.message.clone(),
                            author_name: commit.author.name.clone(),
                            timestamp: parse_commit_timestamp(&commit.timestamp),
                        })
                        .await?;
                } else {
                    debug!(commit = %commit.id, "commit already recorded, skipping");
                }
            }

            // Changed paths come from the head commit only; intermediate
            // commits in the same push are covered by it.
            let Some(head) = &payload.head_commit else {
                continue;
            };

            let change_set = FileChangeSet {
                added: head.added.clone(),
                modified: head.modified.clone(),
                removed: head.removed.clone(),
            };

            for path in &change_set.removed {
                sqlx::query("DELETE FROM source_files WHERE project_id = ? AND file_name = ?")
                    .bind(&project.id)
                    .bind(path)
                    .execute(&self.pool)
                    .await?;
            }

            let mut to_reindex = change_set.added.clone();
            to_reindex.extend(change_set.modified.iter().cloned());
            if !to_reindex.is_empty() {
                self.bus
                    .send(Job::ReindexFiles {
                        project_id: project.id.clone(),
                        repo_url: payload.repository.html_url.clone(),
                        paths: to_reindex,
                    })
                    .await?;
            }

            if policy::should_trigger_reindexing(&change_set.all_paths()) {
                info!(project_id = %project.id, commit = %head.id, "significant change set, requesting smart reindex");
                self.bus
                    .send(Job::SmartReindex {
                        project_id: project.id.clone(),
                        commit_hash: head.id.clone(),
                        reason: "significant_changes".to_string(),
                    })
                    .await?;
            }
        }

        Ok(())
    }

    /// Insert a commit row unless one already exists. Returns whether the
    /// commit was newly recorded.
    async fn record_commit(&self, project_id: &str, commit: &CommitInfo) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO commits (id, project_id, commit_hash, message, author_name, committed_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(project_id)
        .bind(&commit.id)
        .bind(&commit.message)
        .bind(&commit.author.name)
        .bind(parse_commit_timestamp(&commit.timestamp))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Handle a `pull_request` event: one analysis job per connected project.
    pub async fn handle_pull_request_event(&self, payload: &PullRequestPayload) -> Result<()> {
        let Some(pr) = &payload.pull_request else {
            warn!(repo = %payload.repository.full_name, "pull_request event without pull_request body");
            return Ok(());
        };

        for project in self.projects_for(&payload.repository.html_url).await? {
            self.bus
                .send(Job::AnalyzePullRequest {
                    project_id: project.id,
                    number: pr.number,
                    action: payload.action.clone(),
                    title: pr.title.clone(),
                    state: pr.state.clone(),
                    merged: pr.merged,
                    base_ref: pr.base.git_ref.clone(),
                    head_ref: pr.head.git_ref.clone(),
                })
                .await?;
        }

        Ok(())
    }

    /// Handle a `repository` event. Only `deleted` has an effect: every
    /// connected project is soft-deleted.
    pub async fn handle_repository_event(&self, payload: &RepositoryPayload) -> Result<()> {
        if payload.action != "deleted" {
            debug!(action = %payload.action, "repository event ignored");
            return Ok(());
        }

        let marked = projects::soft_delete_projects_for_repository(
            &self.pool,
            &payload.repository.html_url,
        )
        .await?;
        info!(
            repo = %payload.repository.full_name,
            projects = marked,
            "repository deleted upstream, projects disconnected"
        );

        Ok(())
    }

    /// Handle a `release` event: one analysis job per connected project.
    pub async fn handle_release_event(&self, payload: &ReleasePayload) -> Result<()> {
        let Some(release) = &payload.release else {
            warn!(repo = %payload.repository.full_name, "release event without release body");
            return Ok(());
        };

        for project in self.projects_for(&payload.repository.html_url).await? {
            self.bus
                .send(Job::AnalyzeRelease {
                    project_id: project.id,
                    action: payload.action.clone(),
                    name: release.name.clone(),
                    tag: release.tag_name.clone(),
                })
                .await?;
        }

        Ok(())
    }
}

fn parse_commit_timestamp(raw: &str) -> i64 {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.timestamp())
        .unwrap_or_else(|_| chrono::Utc::now().timestamp())
}
