//! Repository structure analysis.
//!
//! Walks the full recursive tree of a repository, classifies every file
//! through the pattern detector, and produces a [`CodebaseStructure`]
//! snapshot: categorized path lists, detected framework, language breakdown,
//! and directory list. The snapshot is persisted onto the project row as a
//! JSON blob and is also the input for key-file prioritization.
//!
//! Errors from the GitHub client (repository not found, rate limit)
//! propagate uncaught; analysis is not retried internally.

use anyhow::{bail, Result};
use sqlx::SqlitePool;
use tracing::info;

use crate::github::{self, GitHubClient, TreeEntry};
use crate::models::CodebaseStructure;
use crate::patterns;

/// Attempts before giving up on a snapshot version conflict.
const PERSIST_RETRIES: u32 = 3;

/// Analyze a repository and persist the snapshot onto the project row.
pub async fn analyze_codebase_structure(
    pool: &SqlitePool,
    client: &GitHubClient,
    project_id: &str,
    repo_url: &str,
) -> Result<CodebaseStructure> {
    let (owner, repo) = github::parse_repository_url(repo_url);
    if owner.is_empty() || repo.is_empty() {
        bail!("Invalid repository URL: '{}'", repo_url);
    }

    let languages = client.get_repository_languages(&owner, &repo).await?;
    let tree = client.get_repository_tree(&owner, &repo).await?;

    let structure = categorize_tree(languages, &tree);

    info!(
        project_id,
        framework = %structure.framework,
        total_files = structure.total_files,
        "codebase structure analyzed"
    );

    persist_snapshot(pool, project_id, &structure).await?;
    Ok(structure)
}

/// Classify every blob in the tree. Pure; no I/O.
///
/// A file may land in several categories — each predicate appends
/// independently, except for the core/test exclusion built into
/// [`patterns::is_core_file`].
pub fn categorize_tree(
    languages: std::collections::BTreeMap<String, i64>,
    tree: &[TreeEntry],
) -> CodebaseStructure {
    let all_paths: Vec<&str> = tree.iter().map(|e| e.path.as_str()).collect();
    let framework = patterns::detect_framework(&all_paths).to_string();

    let mut structure = CodebaseStructure {
        languages,
        framework: framework.clone(),
        last_analyzed: chrono::Utc::now().timestamp(),
        ..Default::default()
    };

    for entry in tree {
        if entry.kind == "tree" {
            structure.directories.push(entry.path.clone());
            continue;
        }
        if entry.kind != "blob" {
            continue;
        }

        structure.total_files += 1;
        let path = entry.path.as_str();

        if patterns::is_config_file(path) {
            structure.config_files.push(path.to_string());
        }
        if patterns::is_entry_point(path) {
            structure.entry_points.push(path.to_string());
        }
        if patterns::is_core_file(path, &framework) {
            structure.core_files.push(path.to_string());
        }
        if patterns::is_api_file(path) {
            structure.api_files.push(path.to_string());
        }
        if patterns::is_schema_file(path) {
            structure.schema_files.push(path.to_string());
        }
        if patterns::is_test_file(path) {
            structure.test_files.push(path.to_string());
        }
        if patterns::is_documentation_file(path) {
            structure.doc_files.push(path.to_string());
        }
    }

    structure
}

/// Merge the snapshot into the project's stored analysis blob.
///
/// Read-modify-write guarded by `analysis_version`: unknown keys in the
/// existing blob are preserved, snapshot keys overwrite, and a concurrent
/// writer bumps the version and forces a re-read. Bails after
/// [`PERSIST_RETRIES`] conflicts instead of silently losing an update.
pub async fn persist_snapshot(
    pool: &SqlitePool,
    project_id: &str,
    structure: &CodebaseStructure,
) -> Result<()> {
    for _ in 0..PERSIST_RETRIES {
        let row: Option<(Option<String>, i64)> =
            sqlx::query_as("SELECT structure_json, analysis_version FROM projects WHERE id = ?")
                .bind(project_id)
                .fetch_optional(pool)
                .await?;

        let (existing_json, version) = match row {
            Some(r) => r,
            None => bail!("Unknown project: {}", project_id),
        };

        let mut blob: serde_json::Value = existing_json
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_else(|| serde_json::json!({}));

        let snapshot = serde_json::to_value(structure)?;
        if let (Some(target), Some(fields)) = (blob.as_object_mut(), snapshot.as_object()) {
            for (key, value) in fields {
                target.insert(key.clone(), value.clone());
            }
        } else {
            blob = snapshot;
        }

        let result = sqlx::query(
            r#"
            UPDATE projects
            SET structure_json = ?, last_analyzed = ?, analysis_version = analysis_version + 1
            WHERE id = ? AND analysis_version = ?
            "#,
        )
        .bind(blob.to_string())
        .bind(structure.last_analyzed)
        .bind(project_id)
        .bind(version)
        .execute(pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }
        // Version moved under us; re-read and try again.
    }

    bail!(
        "Snapshot write for project {} kept conflicting after {} attempts",
        project_id,
        PERSIST_RETRIES
    )
}

/// Load the last persisted snapshot, if any.
pub async fn load_snapshot(
    pool: &SqlitePool,
    project_id: &str,
) -> Result<Option<CodebaseStructure>> {
    let json: Option<Option<String>> =
        sqlx::query_scalar("SELECT structure_json FROM projects WHERE id = ?")
            .bind(project_id)
            .fetch_optional(pool)
            .await?;

    Ok(json
        .flatten()
        .and_then(|s| serde_json::from_str(&s).ok()))
}

/// Analyze and derive the prioritized key-file list.
pub async fn identify_key_files(
    pool: &SqlitePool,
    client: &GitHubClient,
    project_id: &str,
    repo_url: &str,
) -> Result<(Vec<String>, CodebaseStructure)> {
    let structure = analyze_codebase_structure(pool, client, project_id, repo_url).await?;
    let key_files = key_files_from(&structure);
    Ok((key_files, structure))
}

/// De-duplicated union of config, entry-point, core, API, and schema files.
///
/// First-seen order is preserved as a soft priority ranking for downstream
/// indexing order.
pub fn key_files_from(structure: &CodebaseStructure) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut key_files = Vec::new();

    let groups = [
        &structure.config_files,
        &structure.entry_points,
        &structure.core_files,
        &structure.api_files,
        &structure.schema_files,
    ];

    for group in groups {
        for path in group {
            if seen.insert(path.clone()) {
                key_files.push(path.clone());
            }
        }
    }

    key_files
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(path: &str) -> TreeEntry {
        TreeEntry {
            path: path.to_string(),
            kind: "blob".to_string(),
            sha: "0".to_string(),
            size: Some(1),
        }
    }

    fn dir(path: &str) -> TreeEntry {
        TreeEntry {
            path: path.to_string(),
            kind: "tree".to_string(),
            sha: "0".to_string(),
            size: None,
        }
    }

    fn sample_tree() -> Vec<TreeEntry> {
        vec![
            dir("src"),
            dir("pages"),
            blob("next.config.js"),
            blob("package.json"),
            blob("src/index.ts"),
            blob("src/utils/date.ts"),
            blob("src/utils/date.test.ts"),
            blob("pages/api/users.ts"),
            blob("prisma/schema.prisma"),
            blob("README.md"),
        ]
    }

    #[test]
    fn test_categorize_tree() {
        let structure = categorize_tree(Default::default(), &sample_tree());

        assert_eq!(structure.framework, "nextjs");
        assert_eq!(structure.total_files, 8);
        assert_eq!(structure.directories, vec!["src", "pages"]);
        assert!(structure.config_files.contains(&"package.json".to_string()));
        assert!(structure.entry_points.contains(&"src/index.ts".to_string()));
        assert!(structure.core_files.contains(&"src/utils/date.ts".to_string()));
        assert!(structure.api_files.contains(&"pages/api/users.ts".to_string()));
        assert!(structure.schema_files.contains(&"prisma/schema.prisma".to_string()));
        assert!(structure.doc_files.contains(&"README.md".to_string()));
        // Core/test exclusion holds through categorization.
        assert!(structure.test_files.contains(&"src/utils/date.test.ts".to_string()));
        assert!(!structure.core_files.contains(&"src/utils/date.test.ts".to_string()));
    }

    #[test]
    fn test_key_files_priority_and_dedup() {
        let mut structure = CodebaseStructure::default();
        structure.config_files = vec!["package.json".into()];
        structure.entry_points = vec!["src/index.ts".into()];
        // Entry point also matches core; union must keep first occurrence.
        structure.core_files = vec!["src/index.ts".into(), "src/utils/date.ts".into()];
        structure.api_files = vec!["pages/api/users.ts".into()];
        structure.schema_files = vec!["prisma/schema.prisma".into()];

        let key_files = key_files_from(&structure);
        assert_eq!(
            key_files,
            vec![
                "package.json",
                "src/index.ts",
                "src/utils/date.ts",
                "pages/api/users.ts",
                "prisma/schema.prisma",
            ]
        );
    }

    #[tokio::test]
    async fn test_persist_and_reload_snapshot() {
        let (_tmp, pool) = crate::testutil::test_pool().await;
        let project = crate::projects::create_project(
            &pool,
            "https://github.com/acme/widgets",
            "main",
        )
        .await
        .unwrap();

        let structure = categorize_tree(Default::default(), &sample_tree());
        persist_snapshot(&pool, &project.id, &structure).await.unwrap();

        let loaded = load_snapshot(&pool, &project.id).await.unwrap().unwrap();
        assert_eq!(loaded.framework, "nextjs");
        assert_eq!(loaded.total_files, structure.total_files);

        // A second run replaces the snapshot and bumps the version.
        persist_snapshot(&pool, &project.id, &structure).await.unwrap();
        let version: i64 =
            sqlx::query_scalar("SELECT analysis_version FROM projects WHERE id = ?")
                .bind(&project.id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(version, 2);
    }

    #[tokio::test]
    async fn test_persist_unknown_project_fails() {
        let (_tmp, pool) = crate::testutil::test_pool().await;
        let structure = CodebaseStructure::default();
        assert!(persist_snapshot(&pool, "missing", &structure).await.is_err());
    }
}
