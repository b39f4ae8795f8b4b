// /////////////////////////////////////////////////////////////////////////////
// Textforge
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Preview Diffs
//!
//! Line-based diff construction for preview mode. Output is
//! unified-diff-like: one `@@ -start,len +start,len @@` header per change
//! run, `-`/`+` prefixed lines, no context lines, capped at
//! [`MAX_DIFF_HUNKS`] hunks per file with a trailing truncation count.
//!
//! The change script comes from a longest-common-subsequence alignment of
//! the two line arrays. Pathologically large files (beyond the quadratic
//! table budget) fall back to a single whole-file hunk.

use textforge_domain::{DiffHunk, FileDiff};
use textforge_domain::entities::edit_results::MAX_DIFF_HUNKS;

/// LCS table budget; beyond `old_lines * new_lines` cells the diff falls
/// back to one coarse hunk.
const LCS_CELL_BUDGET: usize = 4_000_000;

/// Builds the preview diff between two versions of a file.
pub fn build_diff(old: &str, new: &str) -> FileDiff {
    if old == new {
        return FileDiff::default();
    }

    let old_lines: Vec<&str> = old.lines().collect();
    let new_lines: Vec<&str> = new.lines().collect();

    if old_lines.len().saturating_mul(new_lines.len()) > LCS_CELL_BUDGET {
        return coarse_diff(&old_lines, &new_lines);
    }

    let hunks = change_runs(&old_lines, &new_lines);
    cap_hunks(hunks)
}

/// One contiguous run of changed lines.
struct ChangeRun {
    old_start: usize, // 0-based index into old_lines
    new_start: usize,
    removed: Vec<String>,
    added: Vec<String>,
}

impl ChangeRun {
    fn into_hunk(self) -> DiffHunk {
        let header = format!(
            "@@ -{},{} +{},{} @@",
            self.old_start + 1,
            self.removed.len(),
            self.new_start + 1,
            self.added.len()
        );
        let mut lines = Vec::with_capacity(self.removed.len() + self.added.len());
        lines.extend(self.removed.into_iter().map(|l| format!("-{}", l)));
        lines.extend(self.added.into_iter().map(|l| format!("+{}", l)));
        DiffHunk { header, lines }
    }
}

/// Computes the change runs from an LCS alignment.
fn change_runs(old_lines: &[&str], new_lines: &[&str]) -> Vec<DiffHunk> {
    // Standard LCS length table, (n+1) x (m+1)
    let n = old_lines.len();
    let m = new_lines.len();
    let mut table = vec![0u32; (n + 1) * (m + 1)];
    let idx = |i: usize, j: usize| i * (m + 1) + j;

    for i in (0..n).rev() {
        for j in (0..m).rev() {
            table[idx(i, j)] = if old_lines[i] == new_lines[j] {
                table[idx(i + 1, j + 1)] + 1
            } else {
                table[idx(i + 1, j)].max(table[idx(i, j + 1)])
            };
        }
    }

    // Walk the table, grouping consecutive removals/additions
    let mut hunks = Vec::new();
    let mut run: Option<ChangeRun> = None;
    let (mut i, mut j) = (0usize, 0usize);

    while i < n || j < m {
        if i < n && j < m && old_lines[i] == new_lines[j] {
            if let Some(done) = run.take() {
                hunks.push(done.into_hunk());
            }
            i += 1;
            j += 1;
        } else {
            let take_old = j >= m || (i < n && table[idx(i + 1, j)] >= table[idx(i, j + 1)]);
            let current = run.get_or_insert_with(|| ChangeRun {
                old_start: i,
                new_start: j,
                removed: Vec::new(),
                added: Vec::new(),
            });
            if take_old {
                current.removed.push(old_lines[i].to_string());
                i += 1;
            } else {
                current.added.push(new_lines[j].to_string());
                j += 1;
            }
        }
    }
    if let Some(done) = run.take() {
        hunks.push(done.into_hunk());
    }
    hunks
}

/// Whole-file fallback for inputs beyond the LCS budget.
fn coarse_diff(old_lines: &[&str], new_lines: &[&str]) -> FileDiff {
    let run = ChangeRun {
        old_start: 0,
        new_start: 0,
        removed: old_lines.iter().map(|l| l.to_string()).collect(),
        added: new_lines.iter().map(|l| l.to_string()).collect(),
    };
    FileDiff {
        hunks: vec![run.into_hunk()],
        truncated_hunks: 0,
    }
}

fn cap_hunks(mut hunks: Vec<DiffHunk>) -> FileDiff {
    let truncated_hunks = hunks.len().saturating_sub(MAX_DIFF_HUNKS);
    hunks.truncate(MAX_DIFF_HUNKS);
    FileDiff { hunks, truncated_hunks }
}
