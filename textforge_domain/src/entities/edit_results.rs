// /////////////////////////////////////////////////////////////////////////////
// Textforge
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Bulk-Edit Results
//!
//! Structured result types returned by the bulk-edit engine: per-file
//! outcomes, aggregate totals, preview diffs, validation issues, and
//! impact estimates. Results are plain serializable data so the
//! out-of-scope dispatcher can forward them to any transport.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::value_objects::operation_id::OperationId;
use crate::value_objects::rollback_id::RollbackId;

/// Maximum hunks carried per file in preview mode; the remainder is
/// reported as a count.
pub const MAX_DIFF_HUNKS: usize = 10;

/// Aggregate counters for one bulk operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditTotals {
    /// Files matched by resolution
    pub matched: u64,
    /// Files actually dispatched
    pub processed: u64,
    /// Files edited successfully
    pub success: u64,
    /// Files that failed
    pub failed: u64,
    /// Files skipped (condition false, resolver filter, dependency gate)
    pub skipped: u64,
    /// Total individual changes applied
    pub changes: u64,
    /// Bytes read across all files
    pub bytes_in: u64,
    /// Bytes written across all files
    pub bytes_out: u64,
}

impl EditTotals {
    /// Folds one per-file result into the totals.
    pub fn absorb(&mut self, file: &FileEditResult) {
        self.processed += 1;
        if file.skipped {
            self.skipped += 1;
        } else if file.success {
            self.success += 1;
        } else {
            self.failed += 1;
        }
        self.changes += file.changes_applied;
        self.bytes_in += file.original_size;
        self.bytes_out += file.new_size;
    }
}

/// One hunk of a preview diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffHunk {
    /// `@@ -start,len +start,len @@` style header
    pub header: String,
    /// `-`/`+`/space prefixed lines
    pub lines: Vec<String>,
}

/// A unified-style diff for one file, capped at [`MAX_DIFF_HUNKS`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FileDiff {
    /// Rendered hunks, at most [`MAX_DIFF_HUNKS`]
    pub hunks: Vec<DiffHunk>,
    /// Hunks beyond the cap, reported as a trailing count
    pub truncated_hunks: usize,
}

impl FileDiff {
    /// Whether the diff carries any change
    pub fn is_empty(&self) -> bool {
        self.hunks.is_empty() && self.truncated_hunks == 0
    }
}

/// The outcome of editing (or previewing) one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEditResult {
    /// Absolute file path
    pub path: PathBuf,
    /// Whether the edit succeeded (skipped files count as successful no-ops)
    pub success: bool,
    /// Failure message, if any
    pub error: Option<String>,
    /// Number of individual changes applied
    pub changes_applied: u64,
    /// File size before the edit
    pub original_size: u64,
    /// File size after the edit
    pub new_size: u64,
    /// When the per-file pass began
    pub started: DateTime<Utc>,
    /// When the per-file pass ended
    pub ended: DateTime<Utc>,
    /// Whether a snapshot covers this file
    pub backup_created: bool,
    /// Whether the file was skipped rather than edited
    pub skipped: bool,
    /// Why the file was skipped
    pub skip_reason: Option<String>,
    /// Preview diff; only populated in preview mode
    pub diff: Option<FileDiff>,
}

impl FileEditResult {
    /// Starts a result for a file about to be processed.
    pub fn begin(path: PathBuf) -> Self {
        let now = Utc::now();
        Self {
            path,
            success: false,
            error: None,
            changes_applied: 0,
            original_size: 0,
            new_size: 0,
            started: now,
            ended: now,
            backup_created: false,
            skipped: false,
            skip_reason: None,
            diff: None,
        }
    }

    /// Finishes the result successfully.
    pub fn succeed(mut self, changes: u64, original_size: u64, new_size: u64) -> Self {
        self.success = true;
        self.changes_applied = changes;
        self.original_size = original_size;
        self.new_size = new_size;
        self.ended = Utc::now();
        self
    }

    /// Finishes the result as a failure.
    pub fn fail(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self.ended = Utc::now();
        self
    }

    /// Finishes the result as skipped.
    pub fn skip(mut self, reason: impl Into<String>) -> Self {
        self.success = true;
        self.skipped = true;
        self.skip_reason = Some(reason.into());
        self.ended = Utc::now();
        self
    }
}

/// Structured summary of one bulk operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkEditSummary {
    /// Operation identifier
    pub operation_id: OperationId,
    /// When dispatch began
    pub started: DateTime<Utc>,
    /// When the last file finished
    pub ended: DateTime<Utc>,
    /// Aggregate counters
    pub totals: EditTotals,
    /// Per-file outcomes
    pub per_file: Vec<FileEditResult>,
    /// Operation-level errors (pre-dispatch failures, stop-on-error)
    pub errors: Vec<String>,
    /// Snapshot session covering the operation, when backups were requested
    pub rollback_id: Option<RollbackId>,
    /// Whether this summary reports a dry run
    pub preview: bool,
}

impl BulkEditSummary {
    /// Creates an empty summary for an operation.
    pub fn begin(operation_id: OperationId) -> Self {
        let now = Utc::now();
        Self {
            operation_id,
            started: now,
            ended: now,
            totals: EditTotals::default(),
            per_file: Vec::new(),
            errors: Vec::new(),
            rollback_id: None,
            preview: false,
        }
    }

    /// Absorbs a per-file result into the totals and the result list.
    pub fn push_file(&mut self, file: FileEditResult) {
        self.totals.absorb(&file);
        self.per_file.push(file);
    }

    /// Closes the summary, stamping the end time.
    pub fn finish(mut self) -> Self {
        self.ended = Utc::now();
        self
    }

    /// Files whose content changed
    pub fn modified_files(&self) -> u64 {
        self.per_file
            .iter()
            .filter(|f| f.success && !f.skipped && f.changes_applied > 0)
            .count() as u64
    }
}

/// Severity of a validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IssueSeverity {
    Error,
    Warning,
}

/// A single validation finding on the request surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// How severe the finding is
    pub severity: IssueSeverity,
    /// Human-readable description
    pub message: String,
    /// Which part of the request the finding refers to
    pub location: Option<String>,
}

impl ValidationIssue {
    /// Creates an error-severity issue
    pub fn error(message: impl Into<String>, location: Option<String>) -> Self {
        Self {
            severity: IssueSeverity::Error,
            message: message.into(),
            location,
        }
    }

    /// Creates a warning-severity issue
    pub fn warning(message: impl Into<String>, location: Option<String>) -> Self {
        Self {
            severity: IssueSeverity::Warning,
            message: message.into(),
            location,
        }
    }
}

/// Size-metadata-only estimate of an operation's blast radius.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactEstimate {
    /// Files the request would touch
    pub files: u64,
    /// Sum of their sizes in bytes
    pub total_bytes: u64,
    /// Human-readable total (for report surfaces)
    pub total_size_display: String,
    /// File counts keyed by lowercase extension
    pub by_extension: BTreeMap<String, u64>,
    /// Whether the change is flagged as large
    pub large_change: bool,
    /// Advisory notes
    pub warnings: Vec<String>,
}
