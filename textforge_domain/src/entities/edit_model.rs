// /////////////////////////////////////////////////////////////////////////////
// Textforge
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Edit Model
//!
//! This module defines the tagged-union edit model consumed by the
//! bulk-edit engine: edits, predicates, refactor patterns, composite
//! operations, and the request envelope that carries them. Every model is a
//! sum type dispatched by exhaustive `match`; there is no open-class
//! polymorphism anywhere in the edit path.
//!
//! ## Coordinate System
//!
//! Edits address text with **1-based lines** and **0-based character
//! columns**. Ranges are end-exclusive. Applying a list of edits to one
//! file happens in a single pass from the bottom-most range upward, so
//! earlier offsets are never invalidated by later replacements.
//!
//! ## Pattern Compilation
//!
//! All user-supplied patterns compile through [`compile_pattern`], which
//! applies a compile-size limit as the guard against pathological
//! expressions. The `regex` crate's matching is linear-time by
//! construction, so a pattern that compiles cannot run away at match time.

use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::EngineError;

/// Compile-size cap for user-supplied patterns (10 MB).
///
/// Serves as the ReDoS guard: expansion beyond this fails compilation
/// up front instead of consuming unbounded memory or time.
const PATTERN_SIZE_LIMIT: usize = 10 * 1024 * 1024;

/// The kind of operation that produced a result or snapshot session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationKind {
    BulkReplace,
    ConditionalEdit,
    BatchRefactor,
    MultiFileEdit,
    StreamTransform,
    Imported,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            OperationKind::BulkReplace => "bulk_replace",
            OperationKind::ConditionalEdit => "conditional_edit",
            OperationKind::BatchRefactor => "batch_refactor",
            OperationKind::MultiFileEdit => "multi_file_edit",
            OperationKind::StreamTransform => "stream_transform",
            OperationKind::Imported => "imported",
        };
        write!(f, "{}", label)
    }
}

/// Regex compilation flags exposed on the caller surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegexFlags {
    /// Case-insensitive matching
    pub case_insensitive: bool,
    /// `^`/`$` match line boundaries
    pub multi_line: bool,
    /// `.` also matches `\n`
    pub dot_matches_newline: bool,
}

/// Compiles a user-supplied pattern with the engine's guard limits.
///
/// # Errors
/// Returns `EngineError::InvalidRequest` when the pattern is malformed or
/// its compiled form exceeds the size cap. Always a pre-dispatch failure.
pub fn compile_pattern(pattern: &str, flags: RegexFlags) -> Result<Regex, EngineError> {
    RegexBuilder::new(pattern)
        .case_insensitive(flags.case_insensitive)
        .multi_line(flags.multi_line)
        .dot_matches_new_line(flags.dot_matches_newline)
        .size_limit(PATTERN_SIZE_LIMIT)
        .build()
        .map_err(EngineError::from)
}

/// A single text edit with explicit range semantics.
///
/// Lines are 1-based, columns are 0-based character offsets, and ranges
/// are end-exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TextEdit {
    /// Insert `text` before the character at `(line, column)`
    Insert { line: usize, column: usize, text: String },
    /// Remove the range `[(start_line, start_column), (end_line, end_column))`
    Delete {
        start_line: usize,
        start_column: usize,
        end_line: usize,
        end_column: usize,
    },
    /// Replace the range with `text`
    Replace {
        start_line: usize,
        start_column: usize,
        end_line: usize,
        end_column: usize,
        text: String,
    },
}

impl TextEdit {
    /// The position the edit starts at, used for bottom-up ordering
    pub fn start(&self) -> (usize, usize) {
        match self {
            TextEdit::Insert { line, column, .. } => (*line, *column),
            TextEdit::Delete {
                start_line, start_column, ..
            }
            | TextEdit::Replace {
                start_line, start_column, ..
            } => (*start_line, *start_column),
        }
    }

    /// Validates range well-formedness.
    ///
    /// # Errors
    /// Returns `EngineError::ValidationError` for 0 line numbers or ranges
    /// whose end precedes their start.
    pub fn validate(&self) -> Result<(), EngineError> {
        let check_range = |sl: usize, sc: usize, el: usize, ec: usize| {
            if sl == 0 || el == 0 {
                return Err(EngineError::ValidationError(
                    "Edit line numbers are 1-based; 0 is not a valid line".to_string(),
                ));
            }
            if (el, ec) < (sl, sc) {
                return Err(EngineError::ValidationError(format!(
                    "Edit range end ({}, {}) precedes start ({}, {})",
                    el, ec, sl, sc
                )));
            }
            Ok(())
        };

        match self {
            TextEdit::Insert { line, .. } => {
                if *line == 0 {
                    return Err(EngineError::ValidationError(
                        "Edit line numbers are 1-based; 0 is not a valid line".to_string(),
                    ));
                }
                Ok(())
            }
            TextEdit::Delete {
                start_line,
                start_column,
                end_line,
                end_column,
            } => check_range(*start_line, *start_column, *end_line, *end_column),
            TextEdit::Replace {
                start_line,
                start_column,
                end_line,
                end_column,
                ..
            } => check_range(*start_line, *start_column, *end_line, *end_column),
        }
    }
}

/// Converts a `(line, column)` coordinate into a byte offset in `content`.
///
/// Coordinates beyond the end of a line clamp to the line end; lines beyond
/// the end of the file clamp to the content end.
fn byte_offset(content: &str, line: usize, column: usize) -> usize {
    debug_assert!(line >= 1);
    let mut remaining_lines = line - 1;
    let mut offset = 0usize;

    for (idx, ch) in content.char_indices() {
        if remaining_lines == 0 {
            break;
        }
        if ch == '\n' {
            remaining_lines -= 1;
            offset = idx + 1;
        }
    }
    if remaining_lines > 0 {
        return content.len();
    }

    // Walk `column` characters into the line, stopping at the newline
    let line_str = &content[offset..];
    let mut chars_walked = 0usize;
    for (idx, ch) in line_str.char_indices() {
        if chars_walked == column || ch == '\n' {
            return offset + idx;
        }
        chars_walked += 1;
    }
    content.len()
}

/// Applies a list of edits to `content` in a single bottom-up pass.
///
/// Edits are sorted by start position descending, so applying one edit
/// never shifts the offsets of those still pending. Overlapping ranges are
/// applied in that same order without merging.
///
/// # Errors
/// Returns the first validation error found; content is never partially
/// modified on error.
pub fn apply_edits(content: &str, edits: &[TextEdit]) -> Result<String, EngineError> {
    for edit in edits {
        edit.validate()?;
    }

    let mut ordered: Vec<&TextEdit> = edits.iter().collect();
    ordered.sort_by_key(|e| std::cmp::Reverse(e.start()));

    let mut result = content.to_string();
    for edit in ordered {
        match edit {
            TextEdit::Insert { line, column, text } => {
                let at = byte_offset(&result, *line, *column);
                result.insert_str(at, text);
            }
            TextEdit::Delete {
                start_line,
                start_column,
                end_line,
                end_column,
            } => {
                let from = byte_offset(&result, *start_line, *start_column);
                let to = byte_offset(&result, *end_line, *end_column).max(from);
                result.replace_range(from..to, "");
            }
            TextEdit::Replace {
                start_line,
                start_column,
                end_line,
                end_column,
                text,
            } => {
                let from = byte_offset(&result, *start_line, *start_column);
                let to = byte_offset(&result, *end_line, *end_column).max(from);
                result.replace_range(from..to, text);
            }
        }
    }
    Ok(result)
}

/// Observable facts about a file, used by predicate evaluation.
#[derive(Debug, Clone)]
pub struct FileFacts {
    /// Absolute path of the file
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
    /// Last-modified time, when the filesystem reports one
    pub modified: Option<DateTime<Utc>>,
}

impl FileFacts {
    /// Creates facts for a path
    pub fn new(path: impl Into<PathBuf>, size: u64, modified: Option<DateTime<Utc>>) -> Self {
        Self {
            path: path.into(),
            size,
            modified,
        }
    }
}

/// A predicate over `(content, path, metadata)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EditCondition {
    /// Content contains the literal text
    Contains { text: String },
    /// Content matches the regular expression
    Matches { pattern: String },
    /// File size lies in `[min_bytes, max_bytes]`
    SizeBetween { min_bytes: u64, max_bytes: u64 },
    /// File was modified strictly after the instant
    ModifiedAfter { date: DateTime<Utc> },
    /// File extension equals (case-insensitive, without the dot)
    ExtensionIs { extension: String },
    /// The path's string form contains the substring
    PathContains { substring: String },
}

/// A condition with optional negation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionSpec {
    /// The predicate to evaluate
    pub condition: EditCondition,
    /// Invert the predicate's result
    #[serde(default)]
    pub negate: bool,
}

impl ConditionSpec {
    /// Wraps a condition without negation
    pub fn new(condition: EditCondition) -> Self {
        Self {
            condition,
            negate: false,
        }
    }

    /// Wraps a negated condition
    pub fn negated(condition: EditCondition) -> Self {
        Self { condition, negate: true }
    }

    /// Checks that the condition is statically well-formed.
    pub fn validate(&self) -> Result<(), EngineError> {
        match &self.condition {
            EditCondition::Matches { pattern } => {
                compile_pattern(pattern, RegexFlags::default())?;
                Ok(())
            }
            EditCondition::SizeBetween { min_bytes, max_bytes } => {
                if min_bytes > max_bytes {
                    return Err(EngineError::ValidationError(format!(
                        "Size range is inverted: min {} > max {}",
                        min_bytes, max_bytes
                    )));
                }
                Ok(())
            }
            EditCondition::Contains { text } if text.is_empty() => Err(EngineError::ValidationError(
                "Contains condition requires non-empty text".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Evaluates the predicate against file content and facts.
    pub fn evaluate(&self, content: &str, facts: &FileFacts) -> Result<bool, EngineError> {
        let raw = match &self.condition {
            EditCondition::Contains { text } => content.contains(text.as_str()),
            EditCondition::Matches { pattern } => {
                let regex = compile_pattern(pattern, RegexFlags::default())?;
                regex.is_match(content)
            }
            EditCondition::SizeBetween { min_bytes, max_bytes } => {
                facts.size >= *min_bytes && facts.size <= *max_bytes
            }
            EditCondition::ModifiedAfter { date } => match facts.modified {
                Some(modified) => modified > *date,
                None => false,
            },
            EditCondition::ExtensionIs { extension } => facts
                .path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case(extension))
                .unwrap_or(false),
            EditCondition::PathContains { substring } => facts.path.to_string_lossy().contains(substring.as_str()),
        };
        Ok(if self.negate { !raw } else { raw })
    }
}

/// How a refactor pattern's target is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RefactorKind {
    /// Target is a regular expression, replacement may use `$n` groups
    Regex,
    /// Target is matched literally
    Literal,
    /// Target is matched literally on word boundaries
    WholeWord,
}

/// A higher-level pattern description for batch refactoring.
///
/// The core contract: absence of matches leaves a file byte-identical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefactorPattern {
    /// How `target_pattern` is interpreted
    pub kind: RefactorKind,
    /// The pattern to search for
    pub target_pattern: String,
    /// The replacement text
    pub replacement_pattern: String,
}

impl RefactorPattern {
    /// Compiles the pattern into the regex that implements it.
    pub fn to_regex(&self) -> Result<Regex, EngineError> {
        let pattern = match self.kind {
            RefactorKind::Regex => self.target_pattern.clone(),
            RefactorKind::Literal => regex::escape(&self.target_pattern),
            RefactorKind::WholeWord => format!(r"\b{}\b", regex::escape(&self.target_pattern)),
        };
        compile_pattern(&pattern, RegexFlags::default())
    }

    /// The replacement string as passed to the regex engine.
    ///
    /// Literal kinds disable `$n` expansion so replacement text is taken
    /// verbatim.
    pub fn replacement(&self) -> std::borrow::Cow<'_, str> {
        match self.kind {
            RefactorKind::Regex => std::borrow::Cow::Borrowed(self.replacement_pattern.as_str()),
            RefactorKind::Literal | RefactorKind::WholeWord => {
                std::borrow::Cow::Owned(self.replacement_pattern.replace('$', "$$"))
            }
        }
    }

    /// Checks that the pattern compiles.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.target_pattern.is_empty() {
            return Err(EngineError::ValidationError(
                "Refactor target pattern must not be empty".to_string(),
            ));
        }
        self.to_regex().map(|_| ())
    }
}

/// One operation inside a composite multi-file edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditOperation {
    /// Name other operations reference in `depends_on`
    pub name: String,
    /// Paths, directories, or globs this operation touches
    pub file_patterns: Vec<String>,
    /// Optional gate evaluated per file
    pub condition: Option<ConditionSpec>,
    /// Edits applied to each matching file
    pub edits: Vec<TextEdit>,
    /// Ascending execution order; ties keep request order (stable sort)
    pub priority: i32,
    /// Names of operations that must succeed before this one runs
    #[serde(default)]
    pub depends_on: Vec<String>,
}

/// Options shared by every bulk-edit operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkEditOptions {
    /// Snapshot the resolved set before editing
    pub create_backup: bool,
    /// Cap on concurrent per-file edits; processor count when absent
    pub max_parallelism: Option<usize>,
    /// Abort remaining work on the first file failure
    pub stop_on_first_error: bool,
    /// Include hidden files when resolving patterns
    pub include_hidden: bool,
    /// Glob patterns excluded from resolution
    pub exclude_patterns: Vec<String>,
    /// Files larger than this are skipped at resolve time
    pub max_file_size: Option<u64>,
}

impl Default for BulkEditOptions {
    fn default() -> Self {
        Self {
            create_backup: true,
            max_parallelism: None,
            stop_on_first_error: false,
            include_hidden: false,
            exclude_patterns: Vec::new(),
            max_file_size: None,
        }
    }
}

/// The request envelope accepted by the bulk-edit engine.
///
/// `preview`, `validate`, and `estimate_impact` take the same envelope as
/// the mutating entry points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "camelCase")]
pub enum BulkEditRequest {
    /// Regex search and replace across files
    Replace {
        files: Vec<String>,
        pattern: String,
        replacement: String,
        #[serde(default)]
        flags: RegexFlags,
        #[serde(default)]
        options: BulkEditOptions,
    },
    /// Predicate-gated edit list
    Conditional {
        files: Vec<String>,
        condition: ConditionSpec,
        edits: Vec<TextEdit>,
        #[serde(default)]
        options: BulkEditOptions,
    },
    /// Pattern-described refactor
    Refactor {
        files: Vec<String>,
        pattern: RefactorPattern,
        #[serde(default)]
        options: BulkEditOptions,
    },
    /// Ordered composite of operations
    MultiFile {
        operations: Vec<EditOperation>,
        #[serde(default)]
        options: BulkEditOptions,
    },
}

impl BulkEditRequest {
    /// The options attached to this request
    pub fn options(&self) -> &BulkEditOptions {
        match self {
            BulkEditRequest::Replace { options, .. }
            | BulkEditRequest::Conditional { options, .. }
            | BulkEditRequest::Refactor { options, .. }
            | BulkEditRequest::MultiFile { options, .. } => options,
        }
    }

    /// The operation kind this request maps to
    pub fn kind(&self) -> OperationKind {
        match self {
            BulkEditRequest::Replace { .. } => OperationKind::BulkReplace,
            BulkEditRequest::Conditional { .. } => OperationKind::ConditionalEdit,
            BulkEditRequest::Refactor { .. } => OperationKind::BatchRefactor,
            BulkEditRequest::MultiFile { .. } => OperationKind::MultiFileEdit,
        }
    }

    /// Every file pattern the request references
    pub fn file_patterns(&self) -> Vec<&str> {
        match self {
            BulkEditRequest::Replace { files, .. }
            | BulkEditRequest::Conditional { files, .. }
            | BulkEditRequest::Refactor { files, .. } => files.iter().map(String::as_str).collect(),
            BulkEditRequest::MultiFile { operations, .. } => operations
                .iter()
                .flat_map(|op| op.file_patterns.iter().map(String::as_str))
                .collect(),
        }
    }
}

/// Extension helper shared by the resolver and impact estimation.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| "(none)".to_string())
}
