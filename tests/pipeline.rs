//! End-to-end pipeline test: webhook delivery through the processors into
//! the database and the outbox.

use std::sync::Arc;

use repo_pulse::config::{Config, DbConfig, ServerConfig};
use repo_pulse::jobs::{self, OutboxBus};
use repo_pulse::webhook::{
    CommitAuthor, CommitInfo, PushPayload, RepositoryInfo, RepositoryPayload, WebhookProcessor,
};
use repo_pulse::{db, migrate, projects};

const REPO_URL: &str = "https://github.com/acme/widgets";

async fn setup() -> (tempfile::TempDir, sqlx::SqlitePool) {
    let tmp = tempfile::TempDir::new().unwrap();
    let config = Config {
        db: DbConfig {
            path: tmp.path().join("pipeline.sqlite"),
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

fn repo_info() -> RepositoryInfo {
    RepositoryInfo {
        full_name: "acme/widgets".into(),
        html_url: REPO_URL.into(),
        default_branch: "main".into(),
    }
}

fn head_commit() -> CommitInfo {
    CommitInfo {
        id: "deadbeef".into(),
        message: "replace build system".into(),
        author: CommitAuthor {
            name: "dev".into(),
            email: "dev@example.com".into(),
        },
        added: vec!["package.json".into(), "src/new.ts".into()],
        modified: vec!["src/app.ts".into()],
        removed: vec!["src/old.ts".into()],
        timestamp: "2024-05-01T12:00:00Z".into(),
    }
}

#[tokio::test]
async fn push_flows_into_outbox_and_index() {
    let (_tmp, pool) = setup().await;
    let project = projects::create_project(&pool, REPO_URL, "main")
        .await
        .unwrap();

    // Stale index row for the path this push removes.
    sqlx::query(
        "INSERT INTO source_files (id, project_id, file_name, source_code, summary, updated_at) VALUES ('f1', ?, 'src/old.ts', 'x', 's', 0)",
    )
    .bind(&project.id)
    .execute(&pool)
    .await
    .unwrap();

    let processor = WebhookProcessor::new(pool.clone(), Arc::new(OutboxBus::new(pool.clone())));
    let payload = PushPayload {
        git_ref: "refs/heads/main".into(),
        repository: repo_info(),
        commits: vec![head_commit()],
        head_commit: Some(head_commit()),
    };
    processor.handle_push_event(&payload).await.unwrap();

    // Commit recorded once.
    let commits: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM commits WHERE project_id = ?")
        .bind(&project.id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(commits, 1);

    // Removed path is gone from the index synchronously.
    let stale: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM source_files WHERE file_name = 'src/old.ts'")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(stale, 0);

    // Outbox holds commit processing, file reindex, and (package.json is a
    // significant path) a smart reindex request.
    let pending = jobs::list_pending(&pool).await.unwrap();
    let events: Vec<&str> = pending.iter().map(|j| j.event.as_str()).collect();
    assert!(events.contains(&"project.commit.process.requested"));
    assert!(events.contains(&"project.files.reindex.requested"));
    assert!(events.contains(&"project.smart.reindex.requested"));

    // Redelivery adds nothing for the already-recorded commit.
    processor.handle_push_event(&payload).await.unwrap();
    let commits_after: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM commits WHERE project_id = ?")
            .bind(&project.id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(commits_after, 1);
    let commit_jobs = jobs::list_pending(&pool)
        .await
        .unwrap()
        .iter()
        .filter(|j| j.event == "project.commit.process.requested")
        .count();
    assert_eq!(commit_jobs, 1);
}

#[tokio::test]
async fn repository_deletion_disconnects_projects() {
    let (_tmp, pool) = setup().await;
    projects::create_project(&pool, REPO_URL, "main")
        .await
        .unwrap();

    let processor = WebhookProcessor::new(pool.clone(), Arc::new(OutboxBus::new(pool.clone())));
    processor
        .handle_repository_event(&RepositoryPayload {
            action: "deleted".into(),
            repository: repo_info(),
        })
        .await
        .unwrap();

    assert!(projects::get_projects_for_repository(&pool, REPO_URL)
        .await
        .unwrap()
        .is_empty());
    assert!(jobs::list_pending(&pool).await.unwrap().is_empty());
}
