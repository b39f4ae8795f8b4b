// /////////////////////////////////////////////////////////////////////////////
// Textforge
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pattern Expansion Port
//!
//! The capability through which engines expand path/glob inputs into a
//! de-duplicated, filtered set of absolute file paths. Resolution never
//! fails an operation: per-entry errors are logged and the entry skipped,
//! and filtered files are reported with reasons so the engine can surface
//! them as skips.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Filters applied during resolution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternFilter {
    /// Include hidden files (leading-dot base names)
    pub include_hidden: bool,
    /// Glob patterns to exclude
    pub exclude_patterns: Vec<String>,
    /// Files larger than this are skipped with a reason
    pub max_file_size: Option<u64>,
    /// Glob applied to files found during directory expansion
    pub file_pattern: Option<String>,
    /// Whether directory expansion recurses; defaults to true
    pub recursive: Option<bool>,
}

impl PatternFilter {
    /// Effective recursion flag
    pub fn is_recursive(&self) -> bool {
        self.recursive.unwrap_or(true)
    }
}

/// An input the resolver filtered out, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEntry {
    /// The path (or pattern) that was skipped
    pub path: PathBuf,
    /// Why it was skipped
    pub reason: String,
}

/// The outcome of resolving a list of inputs.
#[derive(Debug, Clone, Default)]
pub struct ResolvedSet {
    /// De-duplicated absolute file paths, in first-seen order
    pub files: Vec<PathBuf>,
    /// Entries filtered out, with reasons
    pub skipped: Vec<SkippedEntry>,
}

impl ResolvedSet {
    /// Whether resolution produced no usable files
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Capability port for file-pattern expansion.
#[async_trait]
pub trait PatternPort: Send + Sync {
    /// Expands `patterns` (paths, directories, globs - interpreted in that
    /// order per entry) into a resolved set.
    async fn resolve(&self, patterns: &[String], filter: &PatternFilter) -> ResolvedSet;
}
