// /////////////////////////////////////////////////////////////////////////////
// Textforge
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pattern Resolver
//!
//! Expands a list of path/glob inputs into a de-duplicated, filtered set
//! of absolute file paths. Each input string is interpreted, in order, as:
//!
//! 1. an existing file path - included as-is;
//! 2. an existing directory - expanded to the regular files under it
//!    (recursively unless the filter says otherwise);
//! 3. a glob pattern - matched relative to the working directory, or from
//!    its own root when the pattern is absolute.
//!
//! Filters: hidden files (leading-dot base names) are excluded unless the
//! filter opts in; caller exclude-globs and the max-file-size cap remove
//! entries with a recorded reason.
//!
//! Errors resolving a single entry are logged and skipped; resolution
//! never fails the operation.

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use textforge_domain::{PatternFilter, PatternPort, ResolvedSet, SkippedEntry};

/// Filesystem-backed pattern resolver.
#[derive(Debug, Default, Clone)]
pub struct PatternResolver;

impl PatternResolver {
    /// Creates a resolver
    pub fn new() -> Self {
        Self
    }
}

fn is_hidden_name(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

fn absolutize(path: &Path) -> PathBuf {
    if let Ok(canonical) = std::fs::canonicalize(path) {
        return canonical;
    }
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().map(|cwd| cwd.join(path)).unwrap_or_else(|_| path.to_path_buf())
    }
}

struct ResolutionPass<'a> {
    filter: &'a PatternFilter,
    excludes: Vec<glob::Pattern>,
    file_pattern: Option<glob::Pattern>,
    seen: HashSet<PathBuf>,
    out: ResolvedSet,
}

impl<'a> ResolutionPass<'a> {
    fn new(filter: &'a PatternFilter) -> Self {
        let excludes = filter
            .exclude_patterns
            .iter()
            .filter_map(|p| match glob::Pattern::new(p) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    tracing::warn!("Ignoring invalid exclude pattern '{}': {}", p, e);
                    None
                }
            })
            .collect();
        let file_pattern = filter.file_pattern.as_deref().and_then(|p| match glob::Pattern::new(p) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                tracing::warn!("Ignoring invalid file pattern '{}': {}", p, e);
                None
            }
        });
        Self {
            filter,
            excludes,
            file_pattern,
            seen: HashSet::new(),
            out: ResolvedSet::default(),
        }
    }

    fn skip(&mut self, path: PathBuf, reason: impl Into<String>) {
        self.out.skipped.push(SkippedEntry {
            path,
            reason: reason.into(),
        });
    }

    /// Applies the filter chain to one candidate file.
    fn consider(&mut self, path: &Path) {
        let absolute = absolutize(path);
        if !self.seen.insert(absolute.clone()) {
            return; // dedup by absolute path
        }

        if !self.filter.include_hidden && is_hidden_name(&absolute) {
            self.skip(absolute, "hidden file");
            return;
        }

        let as_string = absolute.to_string_lossy().into_owned();
        if self.excludes.iter().any(|p| {
            p.matches(&as_string)
                || absolute
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| p.matches(n))
                    .unwrap_or(false)
        }) {
            self.skip(absolute, "excluded by pattern");
            return;
        }

        if let Some(max) = self.filter.max_file_size {
            match std::fs::metadata(&absolute) {
                Ok(metadata) if metadata.len() > max => {
                    self.skip(absolute, format!("exceeds max file size ({} > {} bytes)", metadata.len(), max));
                    return;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("Failed to stat {}: {}", absolute.display(), e);
                    self.skip(absolute, format!("stat failed: {}", e));
                    return;
                }
            }
        }

        self.out.files.push(absolute);
    }

    fn expand_directory(&mut self, dir: &Path) {
        let max_depth = if self.filter.is_recursive() { usize::MAX } else { 1 };
        let include_hidden = self.filter.include_hidden;

        let walker = walkdir::WalkDir::new(dir)
            .max_depth(max_depth)
            .follow_links(false)
            .into_iter()
            .filter_entry(move |entry| {
                // Never descend into hidden directories unless opted in
                include_hidden || entry.depth() == 0 || !is_hidden_name(entry.path())
            });

        for entry in walker {
            match entry {
                Ok(entry) if entry.file_type().is_file() => {
                    if let Some(pattern) = &self.file_pattern {
                        let name = entry.file_name().to_string_lossy();
                        if !pattern.matches(&name) {
                            continue;
                        }
                    }
                    self.consider(entry.path());
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("Error walking {}: {}", dir.display(), e);
                }
            }
        }
    }

    fn expand_glob(&mut self, pattern: &str) {
        match glob::glob(pattern) {
            Ok(matches) => {
                for result in matches {
                    match result {
                        Ok(path) if path.is_file() => self.consider(&path),
                        Ok(_) => {}
                        Err(e) => {
                            tracing::warn!("Glob entry error under '{}': {}", pattern, e);
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!("Invalid glob pattern '{}': {}", pattern, e);
                self.skip(PathBuf::from(pattern), format!("invalid glob pattern: {}", e));
            }
        }
    }

    fn run(mut self, patterns: &[String]) -> ResolvedSet {
        for raw in patterns {
            let path = Path::new(raw);
            if path.is_file() {
                self.consider(path);
            } else if path.is_dir() {
                self.expand_directory(path);
            } else if raw.contains('*') || raw.contains('?') || raw.contains('[') {
                self.expand_glob(raw);
            } else {
                tracing::debug!("Input '{}' matched nothing", raw);
                self.skip(PathBuf::from(raw), "no such file or directory");
            }
        }
        self.out
    }
}

/// Synchronous resolution core, shared with blocking contexts.
pub fn resolve_blocking(patterns: &[String], filter: &PatternFilter) -> ResolvedSet {
    ResolutionPass::new(filter).run(patterns)
}

#[async_trait]
impl PatternPort for PatternResolver {
    async fn resolve(&self, patterns: &[String], filter: &PatternFilter) -> ResolvedSet {
        let patterns = patterns.to_vec();
        let filter = filter.clone();
        tokio::task::spawn_blocking(move || resolve_blocking(&patterns, &filter))
            .await
            .unwrap_or_default()
    }
}
