//! Reindexing policy gate.
//!
//! A cheap, pure, synchronous decision used by the webhook handlers: small
//! incidental changes get indexed immediately per file, while dependency
//! bumps, config changes, or large pushes likely invalidate cached structural
//! assumptions (framework detection, key-file list) and warrant enqueueing a
//! fuller smart-reindex job on top of the per-file updates.

use once_cell::sync::Lazy;
use regex::Regex;

/// Pushes touching more files than this always trigger a smart reindex.
const CHANGED_FILE_THRESHOLD: usize = 10;

/// Paths whose change invalidates structural assumptions about the repo.
static SIGNIFICANT_RULES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(^|/)package\.json$",
        r"(^|/)(package-lock\.json|yarn\.lock|pnpm-lock\.yaml)$",
        r"(^|/)Dockerfile(\..+)?$",
        r"(^|/)docker-compose[\w.-]*\.ya?ml$",
        r"(^|/)\.env(\..+)?$",
        r"(^|/)tsconfig(\.\w+)?\.json$",
        r"(^|/)tailwind\.config\.(js|cjs|mjs|ts)$",
        r"(^|/)(next|nuxt|vue|vite|svelte)\.config\.(js|cjs|mjs|ts)$",
        r"(^|/)prisma/schema\.prisma$",
        r"(^|/)src/.+\.(js|jsx|ts|tsx)$",
    ]
    .iter()
    .map(|r| Regex::new(r).expect("invalid significance rule"))
    .collect()
});

/// Decide whether a changed-path set warrants a full smart-reindex job.
///
/// Returns true if any path matches a significant pattern, or if the change
/// volume exceeds [`CHANGED_FILE_THRESHOLD`].
pub fn should_trigger_reindexing<S: AsRef<str>>(changed_paths: &[S]) -> bool {
    if changed_paths.len() > CHANGED_FILE_THRESHOLD {
        return true;
    }

    changed_paths
        .iter()
        .any(|path| SIGNIFICANT_RULES.iter().any(|r| r.is_match(path.as_ref())))
}
