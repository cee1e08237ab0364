//! Semantic diff layer: change classification and impact analysis.
//!
//! Layers on top of [`crate::diff::generate_file_diff`] to classify what a
//! change does (function additions/removals, dependency changes), score its
//! risk, tag affected areas, list breaking signature changes, and produce
//! testing recommendations.
//!
//! Code structure is recovered by pattern matching, not parsing. The
//! [`CodeStructureExtractor`] trait isolates the regex heuristics so they can
//! be swapped for a real per-language parser without touching the risk
//! scoring or reporting logic. The default [`RegexExtractor`] recognizes
//! three call shapes (named declarations, arrow-function const assignments,
//! and bare `name(...) {` method forms) and will both under- and over-match
//! on edge cases; treat its output as a signal, not ground truth.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::diff::generate_file_diff;
use crate::models::{
    BreakingChange, ChangeType, ImpactAssessment, RiskLevel, SemanticDiff, TestingRequirement,
};

/// Change-volume bound above which integration testing is recommended.
const INTEGRATION_TEST_THRESHOLD: usize = 10;

/// A captured function name and its parameter-list text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSignature {
    pub name: String,
    pub signature: String,
}

/// Recovers code structure (functions, imports, exports) from source text.
pub trait CodeStructureExtractor {
    /// Extract `{name, signature}` pairs; first occurrence per name wins.
    fn extract_functions(&self, source: &str) -> Vec<FunctionSignature>;
    /// Count import statements (`from '...'` forms).
    fn count_imports(&self, source: &str) -> usize;
    /// Count exported symbols (`export ... function|class|const|let|var name`).
    fn count_exports(&self, source: &str) -> usize;
}

/// Default heuristic extractor for JS/TS-shaped source.
#[derive(Debug, Default)]
pub struct RegexExtractor;

static FN_DECLARATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"function\s+(\w+)\s*\(([^)]*)\)").unwrap());
static FN_ARROW_CONST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:const|let|var)\s+(\w+)\s*=\s*(?:async\s+)?\(([^)]*)\)\s*=>").unwrap()
});
static FN_METHOD_LIKE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\w+)\s*\(([^)]*)\)\s*\{").unwrap());
static IMPORT_FROM: Lazy<Regex> = Lazy::new(|| Regex::new(r#"from\s+['"][^'"]+['"]"#).unwrap());
static EXPORT_SYMBOL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"export\s+(?:default\s+)?(?:async\s+)?(?:function|class|const|let|var)\s+\w+")
        .unwrap()
});

impl CodeStructureExtractor for RegexExtractor {
    fn extract_functions(&self, source: &str) -> Vec<FunctionSignature> {
        let mut seen = std::collections::HashSet::new();
        let mut functions = Vec::new();

        // Declarations and arrow consts are more reliable than the bare
        // method form, so they run first and claim the name.
        for pattern in [&FN_DECLARATION, &FN_ARROW_CONST, &FN_METHOD_LIKE] {
            for caps in pattern.captures_iter(source) {
                let name = caps[1].to_string();
                if seen.insert(name.clone()) {
                    functions.push(FunctionSignature {
                        name,
                        signature: caps[2].trim().to_string(),
                    });
                }
            }
        }

        functions
    }

    fn count_imports(&self, source: &str) -> usize {
        IMPORT_FROM.find_iter(source).count()
    }

    fn count_exports(&self, source: &str) -> usize {
        EXPORT_SYMBOL.find_iter(source).count()
    }
}

/// Compute a semantic diff with the default [`RegexExtractor`].
pub fn generate_semantic_diff(file_name: &str, original: &str, modified: &str) -> SemanticDiff {
    generate_semantic_diff_with(&RegexExtractor, file_name, original, modified)
}

/// Compute a semantic diff with a caller-supplied extractor.
pub fn generate_semantic_diff_with(
    extractor: &dyn CodeStructureExtractor,
    file_name: &str,
    original: &str,
    modified: &str,
) -> SemanticDiff {
    let diff = generate_file_diff(file_name, original, modified);

    let original_fns = extractor.extract_functions(original);
    let modified_fns = extractor.extract_functions(modified);

    let change_types = classify_changes(extractor, &original_fns, &modified_fns, original, modified);
    let breaking_changes = detect_breaking_changes(&original_fns, &modified_fns);

    let risk_level = score_risk(diff.stats.total_changes, original);
    let affected_areas = tag_affected_areas(extractor, original, modified);
    let testing_required = testing_requirements(diff.stats.total_changes, original, modified);
    let recommendations = build_recommendations(risk_level, &change_types, &affected_areas);

    SemanticDiff {
        diff,
        change_types,
        impact: ImpactAssessment {
            risk_level,
            affected_areas,
            breaking_changes,
            testing_required,
        },
        recommendations,
    }
}

/// Diff the function-name sets and compare import counts.
///
/// Matching is by name only, so a rename registers as one addition and one
/// removal, never a modification.
fn classify_changes(
    extractor: &dyn CodeStructureExtractor,
    original_fns: &[FunctionSignature],
    modified_fns: &[FunctionSignature],
    original: &str,
    modified: &str,
) -> Vec<ChangeType> {
    let original_names: std::collections::HashSet<&str> =
        original_fns.iter().map(|f| f.name.as_str()).collect();
    let modified_names: std::collections::HashSet<&str> =
        modified_fns.iter().map(|f| f.name.as_str()).collect();

    let mut changes = Vec::new();

    for f in modified_fns {
        if !original_names.contains(f.name.as_str()) {
            changes.push(ChangeType::FunctionAddition);
        }
    }
    for f in original_fns {
        if !modified_names.contains(f.name.as_str()) {
            changes.push(ChangeType::FunctionRemoval);
        }
    }

    if extractor.count_imports(original) != extractor.count_imports(modified) {
        changes.push(ChangeType::DependencyChange);
    }

    changes
}

/// For functions present in both versions, flag differing signature text.
///
/// The capture is regex-based, so whitespace-only reformatting is
/// indistinguishable from a real parameter change and will be flagged.
fn detect_breaking_changes(
    original_fns: &[FunctionSignature],
    modified_fns: &[FunctionSignature],
) -> Vec<BreakingChange> {
    let mut breaking = Vec::new();

    for old_fn in original_fns {
        if let Some(new_fn) = modified_fns.iter().find(|f| f.name == old_fn.name) {
            if old_fn.signature != new_fn.signature {
                breaking.push(BreakingChange {
                    kind: "function_signature_change".to_string(),
                    item: old_fn.name.clone(),
                    old_signature: old_fn.signature.clone(),
                    new_signature: new_fn.signature.clone(),
                });
            }
        }
    }

    breaking
}

/// Ratio of changed lines to original length: >0.5 high, >0.2 medium.
fn score_risk(total_changes: usize, original: &str) -> RiskLevel {
    let original_lines = original.lines().count().max(1);
    let ratio = total_changes as f64 / original_lines as f64;

    if ratio > 0.5 {
        RiskLevel::High
    } else if ratio > 0.2 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Heuristic area tags.
///
/// The schema/configuration checks are substring matches on the original
/// text only and are not scoped to any line, so a file mentioning "config"
/// in a comment will be tagged. Known source of false positives.
fn tag_affected_areas(
    extractor: &dyn CodeStructureExtractor,
    original: &str,
    modified: &str,
) -> Vec<String> {
    let mut areas = Vec::new();

    if extractor.count_exports(original) != extractor.count_exports(modified) {
        areas.push("public_api".to_string());
    }
    if original.contains("schema") || original.contains("model") {
        areas.push("database_schema".to_string());
    }
    if original.contains("config") || original.contains("env") {
        areas.push("configuration".to_string());
    }

    areas
}

fn testing_requirements(
    total_changes: usize,
    original: &str,
    modified: &str,
) -> Vec<TestingRequirement> {
    let mut required = Vec::new();

    if total_changes > INTEGRATION_TEST_THRESHOLD {
        required.push(TestingRequirement {
            kind: "integration_testing".to_string(),
            priority: "high".to_string(),
        });
    }
    if original.contains("async") || modified.contains("async") {
        required.push(TestingRequirement {
            kind: "async_testing".to_string(),
            priority: "medium".to_string(),
        });
    }

    required
}

fn build_recommendations(
    risk: RiskLevel,
    change_types: &[ChangeType],
    affected_areas: &[String],
) -> Vec<String> {
    let mut recommendations = Vec::new();

    if risk == RiskLevel::High {
        recommendations.push(
            "High-risk change: consider splitting into smaller increments and testing \
             each thoroughly before release."
                .to_string(),
        );
    }
    if change_types.contains(&ChangeType::FunctionRemoval) {
        recommendations
            .push("Functions were removed: verify no remaining call sites reference them.".to_string());
    }
    if affected_areas.iter().any(|a| a == "public_api") {
        recommendations.push(
            "Public API surface changed: update documentation and notify consumers.".to_string(),
        );
    }

    recommendations
}
