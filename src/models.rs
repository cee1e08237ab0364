//! Core data models used throughout repo-pulse.
//!
//! These types represent the projects, index records, change sets, and diff
//! structures that flow through the re-indexing and impact-analysis pipeline.
//! Records (`Project`, `SourceFileRecord`, `CommitRecord`) are persisted in
//! SQLite; everything under "transient values" is computed on demand and
//! never stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifies a remote Git repository. Immutable once a project is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryReference {
    pub owner: String,
    pub repo: String,
    pub default_branch: String,
}

/// A connected repository. Soft-deleted (never physically removed) when the
/// upstream repository is deleted.
#[derive(Debug, Clone)]
pub struct Project {
    pub id: String,
    pub repository: RepositoryReference,
    pub repo_url: String,
    pub deleted_at: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// One file's searchable representation: at most one record per
/// `(project_id, file_name)`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SourceFileRecord {
    pub id: String,
    pub project_id: String,
    pub file_name: String,
    pub source_code: String,
    pub summary: String,
    pub updated_at: i64,
}

/// An observed commit. Re-delivery of the same webhook must not create a
/// duplicate; uniqueness holds on `(project_id, commit_hash)`.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CommitRecord {
    pub id: String,
    pub project_id: String,
    pub commit_hash: String,
    pub message: String,
    pub author_name: String,
    pub committed_at: i64,
}

/// Categorized file lists produced by the structure analyzer. Replaced
/// wholesale on each analysis run. Categories are not mutually exclusive
/// except where a predicate explicitly excludes another (core vs. test).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodebaseStructure {
    pub languages: std::collections::BTreeMap<String, i64>,
    pub config_files: Vec<String>,
    pub entry_points: Vec<String>,
    pub core_files: Vec<String>,
    pub api_files: Vec<String>,
    pub schema_files: Vec<String>,
    pub test_files: Vec<String>,
    pub doc_files: Vec<String>,
    pub framework: String,
    pub total_files: usize,
    pub directories: Vec<String>,
    pub last_analyzed: i64,
}

/// Paths touched by a push, derived from a webhook payload and consumed
/// immediately by the file processor and the reindexing policy.
#[derive(Debug, Clone, Default)]
pub struct FileChangeSet {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub removed: Vec<String>,
}

impl FileChangeSet {
    /// Union of added, modified, and removed paths, in that order.
    pub fn all_paths(&self) -> Vec<String> {
        let mut paths =
            Vec::with_capacity(self.added.len() + self.modified.len() + self.removed.len());
        paths.extend(self.added.iter().cloned());
        paths.extend(self.modified.iter().cloned());
        paths.extend(self.removed.iter().cloned());
        paths
    }
}

/// Outcome of processing one changed path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReindexStatus {
    Reindexed,
    Removed,
    Skipped,
    Error,
}

/// One entry per input path from `FileProcessor::reindex_changed_files`.
#[derive(Debug, Clone, Serialize)]
pub struct ReindexOutcome {
    pub file_path: String,
    pub status: ReindexStatus,
    /// Error or skip reason; `None` for reindexed/removed.
    pub detail: Option<String>,
}

// ============ Diff structures (transient) ============

/// Kind of a single line within a hunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffLineKind {
    Add,
    Remove,
    Context,
}

/// One physical line of a hunk with its old/new line numbers where they apply.
#[derive(Debug, Clone, Serialize)]
pub struct DiffLine {
    pub kind: DiffLineKind,
    pub text: String,
    pub old_line_number: Option<usize>,
    pub new_line_number: Option<usize>,
}

/// A contiguous block of changed lines plus bounded trailing context.
#[derive(Debug, Clone, Serialize)]
pub struct Hunk {
    pub old_start: usize,
    pub old_line_count: usize,
    pub new_start: usize,
    pub new_line_count: usize,
    pub lines: Vec<DiffLine>,
}

/// Insertion/deletion totals over an entire diff (not per hunk).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffStats {
    pub insertions: usize,
    pub deletions: usize,
    pub total_changes: usize,
}

/// Structural diff between two full-text versions of one file.
#[derive(Debug, Clone, Serialize)]
pub struct FileDiff {
    pub file_name: String,
    pub original_content: String,
    pub modified_content: String,
    pub unified_diff: String,
    pub hunks: Vec<Hunk>,
    pub stats: DiffStats,
}

// ============ Semantic diff (transient) ============

/// Classified kinds of change detected by the semantic pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    FunctionAddition,
    FunctionRemoval,
    DependencyChange,
}

/// Risk classification from the change-to-size ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// A detected alteration to a function's call signature between versions.
#[derive(Debug, Clone, Serialize)]
pub struct BreakingChange {
    pub kind: String,
    pub item: String,
    pub old_signature: String,
    pub new_signature: String,
}

/// A recommended category of testing with a priority tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestingRequirement {
    pub kind: String,
    pub priority: String,
}

/// Aggregate impact assessment attached to a [`SemanticDiff`].
#[derive(Debug, Clone, Serialize)]
pub struct ImpactAssessment {
    pub risk_level: RiskLevel,
    pub affected_areas: Vec<String>,
    pub breaking_changes: Vec<BreakingChange>,
    pub testing_required: Vec<TestingRequirement>,
}

/// A [`FileDiff`] layered with change classification and impact analysis.
#[derive(Debug, Clone, Serialize)]
pub struct SemanticDiff {
    #[serde(flatten)]
    pub diff: FileDiff,
    pub change_types: Vec<ChangeType>,
    pub impact: ImpactAssessment,
    pub recommendations: Vec<String>,
}
