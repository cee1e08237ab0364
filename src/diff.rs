//! Line-level diff engine.
//!
//! Produces three views over two full-text versions of a file:
//! a unified-diff text (standard patch format), a hunk-structured line diff
//! with old/new line numbers, and aggregate insertion/deletion stats.
//!
//! The line operation sequence comes from the `similar` crate; hunk
//! reconstruction is done here so that the bounded trailing-context rule is
//! explicit: when an unchanged block follows a change, at most 3 context
//! lines are appended before the hunk is closed, and the remaining unchanged
//! lines advance the counters without being materialized. Callers must not
//! assume every original line appears in some hunk's `lines` array.

use similar::{ChangeTag, TextDiff};

use crate::models::{DiffLine, DiffLineKind, DiffStats, FileDiff, Hunk};

/// Trailing context lines kept in a hunk after a changed block.
const CONTEXT_LINES: usize = 3;

/// Input for [`generate_multi_file_diff`].
#[derive(Debug, Clone)]
pub struct FileVersions {
    pub file_name: String,
    pub original: String,
    pub modified: String,
}

/// Compute the structural diff between two versions of one file.
pub fn generate_file_diff(file_name: &str, original: &str, modified: &str) -> FileDiff {
    let text_diff = TextDiff::from_lines(original, modified);

    let unified_diff = text_diff
        .unified_diff()
        .context_radius(CONTEXT_LINES)
        .header(&format!("a/{}", file_name), &format!("b/{}", file_name))
        .to_string();

    let blocks = coalesce_blocks(&text_diff);
    let hunks = build_hunks(&blocks);
    let stats = compute_stats(&blocks);

    FileDiff {
        file_name: file_name.to_string(),
        original_content: original.to_string(),
        modified_content: modified.to_string(),
        unified_diff,
        hunks,
        stats,
    }
}

/// Per-file map over [`generate_file_diff`]; files are independent.
pub fn generate_multi_file_diff(files: &[FileVersions]) -> Vec<FileDiff> {
    files
        .iter()
        .map(|f| generate_file_diff(&f.file_name, &f.original, &f.modified))
        .collect()
}

/// A run of consecutive lines sharing one diff tag.
struct Block {
    tag: ChangeTag,
    lines: Vec<String>,
}

/// Coalesce the per-line change sequence into blocks of equal tag.
fn coalesce_blocks<'a>(diff: &TextDiff<'a, 'a, '_, str>) -> Vec<Block> {
    let mut blocks: Vec<Block> = Vec::new();

    for change in diff.iter_all_changes() {
        let text = change
            .value()
            .trim_end_matches('\n')
            .trim_end_matches('\r')
            .to_string();

        match blocks.last_mut() {
            Some(block) if block.tag == change.tag() => block.lines.push(text),
            _ => blocks.push(Block {
                tag: change.tag(),
                lines: vec![text],
            }),
        }
    }

    blocks
}

/// Reconstruct hunks from the block sequence.
///
/// Old/new line counters start at 1. A changed block opens a hunk (if none is
/// open) at the current counter positions. An unchanged block while a hunk is
/// open contributes up to [`CONTEXT_LINES`] trailing context lines and then
/// closes the hunk; its remaining lines only advance the counters. A trailing
/// open hunk is flushed as-is at end of input.
fn build_hunks(blocks: &[Block]) -> Vec<Hunk> {
    let mut hunks = Vec::new();
    let mut open: Option<Hunk> = None;
    let mut old_line: usize = 1;
    let mut new_line: usize = 1;

    for block in blocks {
        match block.tag {
            ChangeTag::Delete => {
                let hunk = open.get_or_insert_with(|| new_hunk(old_line, new_line));
                for text in &block.lines {
                    hunk.lines.push(DiffLine {
                        kind: DiffLineKind::Remove,
                        text: text.clone(),
                        old_line_number: Some(old_line),
                        new_line_number: None,
                    });
                    old_line += 1;
                }
            }
            ChangeTag::Insert => {
                let hunk = open.get_or_insert_with(|| new_hunk(old_line, new_line));
                for text in &block.lines {
                    hunk.lines.push(DiffLine {
                        kind: DiffLineKind::Add,
                        text: text.clone(),
                        old_line_number: None,
                        new_line_number: Some(new_line),
                    });
                    new_line += 1;
                }
            }
            ChangeTag::Equal => {
                if let Some(mut hunk) = open.take() {
                    let context = block.lines.len().min(CONTEXT_LINES);
                    for text in &block.lines[..context] {
                        hunk.lines.push(DiffLine {
                            kind: DiffLineKind::Context,
                            text: text.clone(),
                            old_line_number: Some(old_line),
                            new_line_number: Some(new_line),
                        });
                        old_line += 1;
                        new_line += 1;
                    }
                    close_hunk(&mut hunk, old_line, new_line);
                    hunks.push(hunk);

                    // Skip past the rest of the unchanged block.
                    let remaining = block.lines.len() - context;
                    old_line += remaining;
                    new_line += remaining;
                } else {
                    old_line += block.lines.len();
                    new_line += block.lines.len();
                }
            }
        }
    }

    if let Some(mut hunk) = open.take() {
        close_hunk(&mut hunk, old_line, new_line);
        hunks.push(hunk);
    }

    hunks
}

fn new_hunk(old_start: usize, new_start: usize) -> Hunk {
    Hunk {
        old_start,
        old_line_count: 0,
        new_start,
        new_line_count: 0,
        lines: Vec::new(),
    }
}

fn close_hunk(hunk: &mut Hunk, old_line: usize, new_line: usize) {
    // Counters only advanced for lines belonging to this hunk since it opened.
    hunk.old_line_count = old_line - hunk.old_start;
    hunk.new_line_count = new_line - hunk.new_start;
}

/// Count added and removed lines over the whole diff, not per hunk.
fn compute_stats(blocks: &[Block]) -> DiffStats {
    let mut insertions = 0;
    let mut deletions = 0;

    for block in blocks {
        match block.tag {
            ChangeTag::Insert => insertions += block.lines.len(),
            ChangeTag::Delete => deletions += block.lines.len(),
            ChangeTag::Equal => {}
        }
    }

    DiffStats {
        insertions,
        deletions,
        total_changes: insertions + deletions,
    }
}
