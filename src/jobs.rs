//! Typed job bus for asynchronous work dispatch.
//!
//! Webhook handlers never do indexing work inline; they emit [`Job`]s to a
//! [`JobBus`] and return. The production bus is an outbox table
//! ([`OutboxBus`]): `send` commits one row and returns, and a worker drains
//! undispatched rows later — fire-and-forget from the caller's perspective,
//! at-least-once overall. [`MemoryBus`] records jobs in memory for tests.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

/// A unit of asynchronous work, tagged with its wire event name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "job", rename_all = "snake_case")]
pub enum Job {
    /// Full structural re-analysis after a significant change set.
    SmartReindex {
        project_id: String,
        commit_hash: String,
        reason: String,
    },
    /// Deep processing of a newly observed commit.
    ProcessCommit {
        project_id: String,
        commit_hash: String,
        message: String,
        author_name: String,
        timestamp: i64,
    },
    /// Re-embed a set of added/modified paths.
    ReindexFiles {
        project_id: String,
        repo_url: String,
        paths: Vec<String>,
    },
    /// Analyze an opened/updated pull request.
    AnalyzePullRequest {
        project_id: String,
        number: i64,
        action: String,
        title: String,
        state: String,
        merged: bool,
        base_ref: String,
        head_ref: String,
    },
    /// Analyze a published release.
    AnalyzeRelease {
        project_id: String,
        action: String,
        name: Option<String>,
        tag: String,
    },
}

impl Job {
    /// Wire event name carried on the bus.
    pub fn event_name(&self) -> &'static str {
        match self {
            Job::SmartReindex { .. } => "project.smart.reindex.requested",
            Job::ProcessCommit { .. } => "project.commit.process.requested",
            Job::ReindexFiles { .. } => "project.files.reindex.requested",
            Job::AnalyzePullRequest { .. } => "pullrequest.analysis.requested",
            Job::AnalyzeRelease { .. } => "project.release.analysis.requested",
        }
    }
}

/// Fire-and-forget job submission.
#[async_trait]
pub trait JobBus: Send + Sync {
    async fn send(&self, job: Job) -> Result<()>;
}

/// Outbox-backed bus: each job is one row in the `jobs` table.
pub struct OutboxBus {
    pool: SqlitePool,
}

impl OutboxBus {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobBus for OutboxBus {
    async fn send(&self, job: Job) -> Result<()> {
        let payload = serde_json::to_string(&job)?;
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            "INSERT INTO jobs (id, event, payload_json, created_at, dispatched_at) VALUES (?, ?, ?, ?, NULL)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(job.event_name())
        .bind(payload)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// A pending outbox row, as shown by `rpx jobs`.
#[derive(Debug, Clone)]
pub struct PendingJob {
    pub id: String,
    pub event: String,
    pub payload_json: String,
    pub created_at: i64,
}

/// List undispatched outbox rows, oldest first.
pub async fn list_pending(pool: &SqlitePool) -> Result<Vec<PendingJob>> {
    let rows: Vec<(String, String, String, i64)> = sqlx::query_as(
        "SELECT id, event, payload_json, created_at FROM jobs WHERE dispatched_at IS NULL ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(id, event, payload_json, created_at)| PendingJob {
            id,
            event,
            payload_json,
            created_at,
        })
        .collect())
}

/// In-memory bus for tests: records every sent job in order.
#[derive(Default)]
pub struct MemoryBus {
    sent: std::sync::Mutex<Vec<Job>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all jobs sent so far.
    pub fn sent(&self) -> Vec<Job> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobBus for MemoryBus {
    async fn send(&self, job: Job) -> Result<()> {
        self.sent.lock().unwrap().push(job);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_match_wire_contract() {
        let smart = Job::SmartReindex {
            project_id: "p1".into(),
            commit_hash: "abc".into(),
            reason: "significant_changes".into(),
        };
        assert_eq!(smart.event_name(), "project.smart.reindex.requested");

        let commit = Job::ProcessCommit {
            project_id: "p1".into(),
            commit_hash: "abc".into(),
            message: "fix".into(),
            author_name: "dev".into(),
            timestamp: 0,
        };
        assert_eq!(commit.event_name(), "project.commit.process.requested");

        let files = Job::ReindexFiles {
            project_id: "p1".into(),
            repo_url: "https://github.com/a/b".into(),
            paths: vec!["src/a.ts".into()],
        };
        assert_eq!(files.event_name(), "project.files.reindex.requested");

        let pr = Job::AnalyzePullRequest {
            project_id: "p1".into(),
            number: 7,
            action: "opened".into(),
            title: "t".into(),
            state: "open".into(),
            merged: false,
            base_ref: "main".into(),
            head_ref: "feature".into(),
        };
        assert_eq!(pr.event_name(), "pullrequest.analysis.requested");

        let release = Job::AnalyzeRelease {
            project_id: "p1".into(),
            action: "published".into(),
            name: Some("v1".into()),
            tag: "v1.0.0".into(),
        };
        assert_eq!(release.event_name(), "project.release.analysis.requested");
    }

    #[test]
    fn test_job_payload_roundtrip() {
        let job = Job::ReindexFiles {
            project_id: "p1".into(),
            repo_url: "https://github.com/a/b".into(),
            paths: vec!["src/a.ts".into(), "src/b.ts".into()],
        };
        let payload = serde_json::to_string(&job).unwrap();
        let back: Job = serde_json::from_str(&payload).unwrap();
        assert_eq!(back, job);
    }

    #[tokio::test]
    async fn test_memory_bus_records_in_order() {
        let bus = MemoryBus::new();
        bus.send(Job::SmartReindex {
            project_id: "p1".into(),
            commit_hash: "a".into(),
            reason: "significant_changes".into(),
        })
        .await
        .unwrap();
        bus.send(Job::AnalyzeRelease {
            project_id: "p1".into(),
            action: "published".into(),
            name: None,
            tag: "v2".into(),
        })
        .await
        .unwrap();

        let sent = bus.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].event_name(), "project.smart.reindex.requested");
        assert_eq!(sent[1].event_name(), "project.release.analysis.requested");
    }
}
