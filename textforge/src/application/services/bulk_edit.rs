// /////////////////////////////////////////////////////////////////////////////
// Textforge
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Bulk-Edit Engine
//!
//! Orchestrates parallel per-file edit passes: regex replace, condition-
//! guarded edits, pattern refactors, and ordered multi-operation
//! composites. Every entry point shares the same outer shape:
//!
//! 1. **Resolve** the file set through the pattern port
//! 2. **Snapshot** the entire resolved set once, when backups are requested
//! 3. **Fan out** per-file edits, bounded by `min(processors,
//!    max_parallelism)` and the global CPU budget
//! 4. **Aggregate** per-file results into a structured summary
//!
//! ## Error Model
//!
//! Nothing throws across the caller surface. Pre-dispatch failures (bad
//! regex, malformed ranges) produce a summary with a single top-level
//! error and zero processed files. Per-file failures are carried in the
//! per-file results and halt the operation only when `stop_on_first_error`
//! is set. Cancellation is observed before the snapshot, between dispatch
//! iterations, and at the start of each per-file pass.
//!
//! ## Writes
//!
//! Changed content is staged into scratch space and renamed over the
//! original (copy + delete when the rename crosses filesystems), with the
//! engine's standard 3-attempt backoff on transient I/O errors. A file
//! whose content is unchanged is never rewritten.

use futures::StreamExt;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use textforge_bootstrap::shutdown::CancellationToken;
use textforge_domain::entities::edit_model::{apply_edits, compile_pattern, extension_of, FileFacts};
use textforge_domain::entities::progress::PHASE_FAILED;
use textforge_domain::{
    BulkEditOptions, BulkEditRequest, BulkEditSummary, ConditionSpec, EditOperation, FileEditResult, ImpactEstimate,
    IssueSeverity, OperationId, OperationKind, PatternFilter, PatternPort, ProgressPort, RegexFlags, ResolvedSet,
    ScratchSpace, SnapshotStore, TextEdit, ValidationIssue,
};
use textforge_domain::entities::progress::ProgressUpdate;

use crate::application::services::diff::build_diff;
use crate::infrastructure::runtime::ResourceGovernor;

/// Attempts for staging writes on transient I/O errors
const WRITE_RETRIES: u32 = 3;
/// Base backoff between write attempts
const WRITE_BACKOFF: Duration = Duration::from_millis(100);

/// File-count threshold above which an impact estimate is flagged large
const LARGE_CHANGE_FILES: u64 = 100;
/// Byte threshold above which an impact estimate is flagged large
const LARGE_CHANGE_BYTES: u64 = 50 * 1024 * 1024;

/// A compiled per-file edit pass.
///
/// Compilation happens once, before any dispatch; invalid patterns never
/// reach a file.
enum EditPass {
    Replace { regex: Regex, replacement: String },
    Guarded {
        condition: Option<ConditionSpec>,
        edits: Vec<TextEdit>,
    },
}

/// What one pass decided for one file.
enum PassOutcome {
    Changed { new_content: String, changes: u64 },
    Unchanged,
    Skipped { reason: String },
}

impl EditPass {
    fn apply(&self, content: &str, facts: &FileFacts) -> Result<PassOutcome, textforge_domain::EngineError> {
        match self {
            EditPass::Replace { regex, replacement } => {
                let changes = regex.find_iter(content).count() as u64;
                if changes == 0 {
                    return Ok(PassOutcome::Unchanged);
                }
                let new_content = regex.replace_all(content, replacement.as_str()).into_owned();
                Ok(PassOutcome::Changed { new_content, changes })
            }
            EditPass::Guarded { condition, edits } => {
                if let Some(condition) = condition {
                    if !condition.evaluate(content, facts)? {
                        return Ok(PassOutcome::Skipped {
                            reason: "condition not met".to_string(),
                        });
                    }
                }
                if edits.is_empty() {
                    return Ok(PassOutcome::Unchanged);
                }
                let new_content = apply_edits(content, edits)?;
                Ok(PassOutcome::Changed {
                    new_content,
                    changes: edits.len() as u64,
                })
            }
        }
    }
}

/// The compiled form of a request, ready for dispatch.
enum CompiledRequest {
    Single {
        patterns: Vec<String>,
        pass: Arc<EditPass>,
    },
    Multi {
        /// Stably sorted by ascending priority
        operations: Vec<EditOperation>,
    },
}

/// The parallel bulk-editing engine.
pub struct BulkEditEngine {
    snapshots: Arc<dyn SnapshotStore>,
    progress: Arc<dyn ProgressPort>,
    resolver: Arc<dyn PatternPort>,
    scratch: Arc<dyn ScratchSpace>,
    governor: Arc<ResourceGovernor>,
}

impl BulkEditEngine {
    /// Wires the engine to its capabilities.
    pub fn new(
        snapshots: Arc<dyn SnapshotStore>,
        progress: Arc<dyn ProgressPort>,
        resolver: Arc<dyn PatternPort>,
        scratch: Arc<dyn ScratchSpace>,
        governor: Arc<ResourceGovernor>,
    ) -> Self {
        Self {
            snapshots,
            progress,
            resolver,
            scratch,
            governor,
        }
    }

    /// Regex search and replace across a file set.
    pub async fn bulk_replace(
        &self,
        files: Vec<String>,
        pattern: &str,
        replacement: &str,
        flags: RegexFlags,
        options: BulkEditOptions,
    ) -> BulkEditSummary {
        self.execute(BulkEditRequest::Replace {
            files,
            pattern: pattern.to_string(),
            replacement: replacement.to_string(),
            flags,
            options,
        })
        .await
    }

    /// Predicate-gated edit list across a file set.
    pub async fn conditional_edit(
        &self,
        files: Vec<String>,
        condition: ConditionSpec,
        edits: Vec<TextEdit>,
        options: BulkEditOptions,
    ) -> BulkEditSummary {
        self.execute(BulkEditRequest::Conditional {
            files,
            condition,
            edits,
            options,
        })
        .await
    }

    /// Pattern-described refactor across a file set.
    pub async fn batch_refactor(
        &self,
        files: Vec<String>,
        pattern: textforge_domain::RefactorPattern,
        options: BulkEditOptions,
    ) -> BulkEditSummary {
        self.execute(BulkEditRequest::Refactor { files, pattern, options }).await
    }

    /// Ordered composite of edit operations.
    pub async fn multi_file_edit(&self, operations: Vec<EditOperation>, options: BulkEditOptions) -> BulkEditSummary {
        self.execute(BulkEditRequest::MultiFile { operations, options }).await
    }

    /// Executes a request with a fresh cancellation token.
    pub async fn execute(&self, request: BulkEditRequest) -> BulkEditSummary {
        self.execute_cancellable(request, CancellationToken::new()).await
    }

    /// Executes a request under a caller-supplied cancellation token.
    pub async fn execute_cancellable(&self, request: BulkEditRequest, token: CancellationToken) -> BulkEditSummary {
        self.run(request, false, token).await
    }

    /// Dry run: same resolution and per-file passes, no writes and no
    /// snapshots; per-file results carry diffs.
    pub async fn preview(&self, request: BulkEditRequest) -> BulkEditSummary {
        self.run(request, true, CancellationToken::new()).await
    }

    async fn run(&self, request: BulkEditRequest, preview: bool, token: CancellationToken) -> BulkEditSummary {
        let operation_id = OperationId::new();
        let kind = request.kind();
        let options = request.options().clone();

        let mut summary = BulkEditSummary::begin(operation_id);
        summary.preview = preview;

        self.progress.create(operation_id, &kind.to_string(), 0);

        let compiled = match compile_request(&request) {
            Ok(compiled) => compiled,
            Err(e) => {
                // Pre-dispatch failure: single top-level error, zero files
                tracing::warn!("Bulk edit {} rejected: {}", operation_id, e);
                summary.errors.push(e.to_string());
                self.progress.fail(operation_id);
                return summary.finish();
            }
        };

        match compiled {
            CompiledRequest::Single { patterns, pass } => {
                self.run_single(&mut summary, operation_id, kind, &patterns, pass, &options, preview, &token)
                    .await;
            }
            CompiledRequest::Multi { operations } => {
                self.run_multi(&mut summary, operation_id, kind, operations, &options, preview, &token)
                    .await;
            }
        }

        if summary.errors.is_empty() {
            self.progress.complete(operation_id);
        } else {
            self.progress.set_phase(operation_id, PHASE_FAILED);
        }
        summary.finish()
    }

    fn filter_from(options: &BulkEditOptions) -> PatternFilter {
        PatternFilter {
            include_hidden: options.include_hidden,
            exclude_patterns: options.exclude_patterns.clone(),
            max_file_size: options.max_file_size,
            file_pattern: None,
            recursive: None,
        }
    }

    fn absorb_resolver_skips(summary: &mut BulkEditSummary, resolved: &ResolvedSet) {
        for entry in &resolved.skipped {
            summary.push_file(FileEditResult::begin(entry.path.clone()).skip(entry.reason.clone()));
        }
    }

    /// Snapshots the resolved set; returns the paths whose snapshot failed
    /// (they are excluded from dispatch) or an operation-level error.
    async fn snapshot_set(
        &self,
        summary: &mut BulkEditSummary,
        operation_id: OperationId,
        kind: OperationKind,
        files: &[PathBuf],
    ) -> Result<HashSet<PathBuf>, ()> {
        self.progress.set_phase(operation_id, "Snapshotting");
        match self.snapshots.create_session(operation_id, kind, files).await {
            Ok(outcome) => {
                summary.rollback_id = Some(outcome.session.rollback_id);
                let mut excluded = HashSet::new();
                for (path, reason) in outcome.failures {
                    excluded.insert(path.clone());
                    summary.push_file(
                        FileEditResult::begin(path).fail(format!("snapshot failed, file not edited: {}", reason)),
                    );
                }
                Ok(excluded)
            }
            Err(e) => {
                summary.errors.push(format!("snapshot session failed: {}", e));
                Err(())
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_single(
        &self,
        summary: &mut BulkEditSummary,
        operation_id: OperationId,
        kind: OperationKind,
        patterns: &[String],
        pass: Arc<EditPass>,
        options: &BulkEditOptions,
        preview: bool,
        token: &CancellationToken,
    ) {
        self.progress.set_phase(operation_id, "Resolving");
        let resolved = self.resolver.resolve(patterns, &Self::filter_from(options)).await;
        summary.totals.matched = resolved.files.len() as u64;
        Self::absorb_resolver_skips(summary, &resolved);

        if resolved.files.is_empty() {
            // Zero-file success: no session is created
            tracing::debug!("Bulk edit {} resolved no files", operation_id);
            return;
        }
        self.progress
            .set_totals(operation_id, 0, resolved.files.len() as u64);

        let mut excluded = HashSet::new();
        let backup = options.create_backup && !preview;
        if backup {
            if token.is_cancelled() {
                summary.errors.push("cancelled before snapshot".to_string());
                return;
            }
            match self.snapshot_set(summary, operation_id, kind, &resolved.files).await {
                Ok(failed_paths) => excluded = failed_paths,
                Err(()) => return,
            }
        }

        self.progress
            .set_phase(operation_id, if preview { "Previewing" } else { "Editing" });
        let dispatch: Vec<PathBuf> = resolved.files.into_iter().filter(|f| !excluded.contains(f)).collect();
        self.dispatch_files(summary, operation_id, dispatch, pass, options, preview, backup, token)
            .await;
    }

    /// Fans one pass out over a file list; returns true when the operation
    /// should halt (stop-on-error or cancellation).
    #[allow(clippy::too_many_arguments)]
    async fn dispatch_files(
        &self,
        summary: &mut BulkEditSummary,
        operation_id: OperationId,
        files: Vec<PathBuf>,
        pass: Arc<EditPass>,
        options: &BulkEditOptions,
        preview: bool,
        backup_created: bool,
        token: &CancellationToken,
    ) -> bool {
        let width = self.governor.dispatch_width(options.max_parallelism);
        let mut stream = futures::stream::iter(files.into_iter().map(|path| {
            let pass = Arc::clone(&pass);
            let token = token.clone();
            self.edit_one(operation_id, path, pass, preview, backup_created, token)
        }))
        .buffer_unordered(width);

        let mut halted = false;
        let mut done = 0u64;
        while let Some(result) = stream.next().await {
            let failed = !result.success && !result.skipped;
            done += 1;
            summary.push_file(result);
            self.progress.update(
                operation_id,
                ProgressUpdate {
                    bytes_done: summary.totals.bytes_in,
                    chunks_done: Some(done),
                    items_done: Some(done),
                    ..Default::default()
                },
            );

            if failed && options.stop_on_first_error {
                summary.errors.push("halted on first error".to_string());
                halted = true;
                break;
            }
            if token.is_cancelled() {
                summary.errors.push("cancelled".to_string());
                halted = true;
                break;
            }
        }
        halted
    }

    /// One per-file pass: read, apply, stage-write when changed.
    async fn edit_one(
        &self,
        operation_id: OperationId,
        path: PathBuf,
        pass: Arc<EditPass>,
        preview: bool,
        backup_created: bool,
        token: CancellationToken,
    ) -> FileEditResult {
        let mut result = FileEditResult::begin(path.clone());
        result.backup_created = backup_created;

        if token.is_cancelled() {
            return result.skip("cancelled before dispatch");
        }

        let _cpu = match self.governor.acquire_cpu().await {
            Ok(permit) => permit,
            Err(e) => return result.fail(e.to_string()),
        };

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) => return result.fail(format!("stat failed: {}", e)),
        };
        let facts = FileFacts::new(
            path.clone(),
            metadata.len(),
            metadata.modified().ok().map(chrono::DateTime::from),
        );

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) => return result.fail(format!("read failed: {}", e)),
        };
        let original_size = bytes.len() as u64;
        let content = match String::from_utf8(bytes) {
            Ok(content) => content,
            Err(_) => return result.fail("file is not valid UTF-8 text"),
        };

        let outcome = match pass.apply(&content, &facts) {
            Ok(outcome) => outcome,
            Err(e) => return result.fail(e.to_string()),
        };

        match outcome {
            PassOutcome::Skipped { reason } => {
                result.original_size = original_size;
                result.skip(reason)
            }
            PassOutcome::Unchanged => result.succeed(0, original_size, original_size),
            PassOutcome::Changed { new_content, changes } => {
                let new_size = new_content.len() as u64;
                if preview {
                    result.diff = Some(build_diff(&content, &new_content));
                    return result.succeed(changes, original_size, new_size);
                }
                if new_content == content {
                    // Substitutions happened but produced identical bytes
                    return result.succeed(changes, original_size, original_size);
                }
                match self.stage_write(operation_id, &path, new_content.as_bytes()).await {
                    Ok(()) => result.succeed(changes, original_size, new_size),
                    Err(e) => result.fail(format!("write failed: {}", e)),
                }
            }
        }
    }

    /// Stages content into scratch space and moves it over the target.
    async fn stage_write(
        &self,
        operation_id: OperationId,
        path: &Path,
        content: &[u8],
    ) -> Result<(), textforge_domain::EngineError> {
        let extension = path.extension().and_then(|e| e.to_str());
        let mut attempt = 1u32;
        loop {
            let staged = self
                .scratch
                .create_file(Some("edit"), extension, Some(operation_id))
                .await?;
            let write_result = write_and_move(&staged, path, content).await;
            // Deregister the staged path; the file itself was renamed away
            // (or is deleted here on failure)
            self.scratch.delete(&staged).await;

            match write_result {
                Ok(()) => return Ok(()),
                Err(e) if e.is_recoverable() && attempt < WRITE_RETRIES => {
                    tracing::warn!("Write attempt {}/{} for {} failed: {}", attempt, WRITE_RETRIES, path.display(), e);
                    tokio::time::sleep(WRITE_BACKOFF * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_multi(
        &self,
        summary: &mut BulkEditSummary,
        operation_id: OperationId,
        kind: OperationKind,
        operations: Vec<EditOperation>,
        options: &BulkEditOptions,
        preview: bool,
        token: &CancellationToken,
    ) {
        self.progress.set_phase(operation_id, "Resolving");
        let filter = Self::filter_from(options);

        // Resolve every operation's file set up front; the union feeds one
        // snapshot covering the whole composite
        let mut resolutions: Vec<(EditOperation, ResolvedSet)> = Vec::with_capacity(operations.len());
        let mut union: Vec<PathBuf> = Vec::new();
        let mut seen: HashSet<PathBuf> = HashSet::new();
        for edit_op in operations {
            let resolved = self.resolver.resolve(&edit_op.file_patterns, &filter).await;
            Self::absorb_resolver_skips(summary, &resolved);
            for file in &resolved.files {
                if seen.insert(file.clone()) {
                    union.push(file.clone());
                }
            }
            resolutions.push((edit_op, resolved));
        }
        summary.totals.matched = union.len() as u64;

        if union.is_empty() {
            return;
        }
        self.progress.set_totals(operation_id, 0, union.len() as u64);

        let mut excluded = HashSet::new();
        let backup = options.create_backup && !preview;
        if backup {
            if token.is_cancelled() {
                summary.errors.push("cancelled before snapshot".to_string());
                return;
            }
            match self.snapshot_set(summary, operation_id, kind, &union).await {
                Ok(failed_paths) => excluded = failed_paths,
                Err(()) => return,
            }
        }

        self.progress
            .set_phase(operation_id, if preview { "Previewing" } else { "Editing" });

        // Lower priorities complete before any file of a higher priority
        // begins; ties keep request order
        let mut ordered = resolutions;
        ordered.sort_by_key(|(op, _)| op.priority);

        let mut failed_ops: HashSet<String> = HashSet::new();
        for (edit_op, resolved) in ordered {
            if token.is_cancelled() {
                summary.errors.push("cancelled".to_string());
                return;
            }

            if let Some(dep) = edit_op.depends_on.iter().find(|d| failed_ops.contains(*d)) {
                for file in &resolved.files {
                    summary.push_file(
                        FileEditResult::begin(file.clone())
                            .skip(format!("dependency '{}' failed", dep)),
                    );
                }
                // A skipped operation cannot satisfy its own dependents
                failed_ops.insert(edit_op.name.clone());
                continue;
            }

            let pass = Arc::new(EditPass::Guarded {
                condition: edit_op.condition.clone(),
                edits: edit_op.edits.clone(),
            });
            let files: Vec<PathBuf> = resolved.files.into_iter().filter(|f| !excluded.contains(f)).collect();

            let before_failures = summary.totals.failed;
            let halted = self
                .dispatch_files(summary, operation_id, files, pass, options, preview, backup, token)
                .await;
            let op_failed = summary.totals.failed > before_failures;

            if op_failed {
                failed_ops.insert(edit_op.name.clone());
                if options.stop_on_first_error {
                    summary
                        .errors
                        .push(format!("halted after operation '{}' failed", edit_op.name));
                    return;
                }
            }
            if halted {
                return;
            }
        }
    }

    /// Static inspection of a request's surface: regex compilation, file
    /// resolution, range well-formedness, dependency references.
    pub async fn validate(&self, request: &BulkEditRequest) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        match request {
            BulkEditRequest::Replace { pattern, flags, .. } => {
                if let Err(e) = compile_pattern(pattern, *flags) {
                    issues.push(ValidationIssue::error(e.to_string(), Some("pattern".to_string())));
                }
            }
            BulkEditRequest::Conditional { condition, edits, .. } => {
                if let Err(e) = condition.validate() {
                    issues.push(ValidationIssue::error(e.to_string(), Some("condition".to_string())));
                }
                if edits.is_empty() {
                    issues.push(ValidationIssue::warning(
                        "edit list is empty; matching files will be left unchanged",
                        Some("edits".to_string()),
                    ));
                }
                for (index, edit) in edits.iter().enumerate() {
                    if let Err(e) = edit.validate() {
                        issues.push(ValidationIssue::error(e.to_string(), Some(format!("edits[{}]", index))));
                    }
                }
            }
            BulkEditRequest::Refactor { pattern, .. } => {
                if let Err(e) = pattern.validate() {
                    issues.push(ValidationIssue::error(e.to_string(), Some("pattern".to_string())));
                }
            }
            BulkEditRequest::MultiFile { operations, .. } => {
                if operations.is_empty() {
                    issues.push(ValidationIssue::error(
                        "multi-file edit requires at least one operation",
                        Some("operations".to_string()),
                    ));
                }
                let mut names = HashSet::new();
                for op in operations {
                    if !names.insert(op.name.as_str()) {
                        issues.push(ValidationIssue::error(
                            format!("duplicate operation name '{}'", op.name),
                            Some("operations".to_string()),
                        ));
                    }
                }
                for op in operations {
                    for dep in &op.depends_on {
                        if !operations.iter().any(|o| &o.name == dep) {
                            issues.push(ValidationIssue::error(
                                format!("operation '{}' depends on unknown operation '{}'", op.name, dep),
                                Some(format!("operations['{}']", op.name)),
                            ));
                        }
                    }
                    if let Some(condition) = &op.condition {
                        if let Err(e) = condition.validate() {
                            issues.push(ValidationIssue::error(
                                e.to_string(),
                                Some(format!("operations['{}'].condition", op.name)),
                            ));
                        }
                    }
                    for (index, edit) in op.edits.iter().enumerate() {
                        if let Err(e) = edit.validate() {
                            issues.push(ValidationIssue::error(
                                e.to_string(),
                                Some(format!("operations['{}'].edits[{}]", op.name, index)),
                            ));
                        }
                    }
                }
            }
        }

        let resolved = self
            .resolver
            .resolve(
                &request.file_patterns().iter().map(|s| s.to_string()).collect::<Vec<_>>(),
                &Self::filter_from(request.options()),
            )
            .await;
        if resolved.is_empty() {
            issues.push(ValidationIssue::error(
                "file patterns resolve to no files",
                Some("files".to_string()),
            ));
        }

        if request.options().max_parallelism == Some(0) {
            issues.push(ValidationIssue::warning(
                "max_parallelism of 0 is clamped to 1",
                Some("options.max_parallelism".to_string()),
            ));
        }

        issues
    }

    /// Size-metadata-only estimate of the operation's blast radius; file
    /// bodies are never read.
    pub async fn estimate_impact(&self, request: &BulkEditRequest) -> ImpactEstimate {
        let resolved = self
            .resolver
            .resolve(
                &request.file_patterns().iter().map(|s| s.to_string()).collect::<Vec<_>>(),
                &Self::filter_from(request.options()),
            )
            .await;

        let mut total_bytes = 0u64;
        let mut by_extension: BTreeMap<String, u64> = BTreeMap::new();
        for file in &resolved.files {
            if let Ok(metadata) = tokio::fs::metadata(file).await {
                total_bytes += metadata.len();
            }
            *by_extension.entry(extension_of(file)).or_insert(0) += 1;
        }

        let files = resolved.files.len() as u64;
        let large_change = files > LARGE_CHANGE_FILES || total_bytes > LARGE_CHANGE_BYTES;

        let mut warnings = Vec::new();
        if large_change {
            warnings.push(format!("large change: {} files, {} bytes", files, total_bytes));
        }
        if !request.options().create_backup {
            warnings.push("backups are disabled; this operation will not be reversible".to_string());
        }

        let total_size_display = byte_unit::Byte::from_u64(total_bytes)
            .get_appropriate_unit(byte_unit::UnitType::Binary)
            .to_string();

        ImpactEstimate {
            files,
            total_bytes,
            total_size_display,
            by_extension,
            large_change,
            warnings,
        }
    }
}

/// Compiles the request surface; any error here is pre-dispatch.
fn compile_request(request: &BulkEditRequest) -> Result<CompiledRequest, textforge_domain::EngineError> {
    match request {
        BulkEditRequest::Replace {
            files,
            pattern,
            replacement,
            flags,
            ..
        } => {
            let regex = compile_pattern(pattern, *flags)?;
            Ok(CompiledRequest::Single {
                patterns: files.clone(),
                pass: Arc::new(EditPass::Replace {
                    regex,
                    replacement: replacement.clone(),
                }),
            })
        }
        BulkEditRequest::Conditional {
            files,
            condition,
            edits,
            ..
        } => {
            condition.validate()?;
            for edit in edits {
                edit.validate()?;
            }
            Ok(CompiledRequest::Single {
                patterns: files.clone(),
                pass: Arc::new(EditPass::Guarded {
                    condition: Some(condition.clone()),
                    edits: edits.clone(),
                }),
            })
        }
        BulkEditRequest::Refactor { files, pattern, .. } => {
            let regex = pattern.to_regex()?;
            Ok(CompiledRequest::Single {
                patterns: files.clone(),
                pass: Arc::new(EditPass::Replace {
                    regex,
                    replacement: pattern.replacement().into_owned(),
                }),
            })
        }
        BulkEditRequest::MultiFile { operations, .. } => {
            if operations.is_empty() {
                return Err(textforge_domain::EngineError::InvalidRequest(
                    "multi-file edit requires at least one operation".to_string(),
                ));
            }
            let mut names = HashSet::new();
            for op in operations {
                if !names.insert(op.name.as_str()) {
                    return Err(textforge_domain::EngineError::InvalidRequest(format!(
                        "duplicate operation name '{}'",
                        op.name
                    )));
                }
            }
            for op in operations {
                for dep in &op.depends_on {
                    if !operations.iter().any(|o| &o.name == dep) {
                        return Err(textforge_domain::EngineError::InvalidRequest(format!(
                            "operation '{}' depends on unknown operation '{}'",
                            op.name, dep
                        )));
                    }
                }
                if let Some(condition) = &op.condition {
                    condition.validate()?;
                }
                for edit in &op.edits {
                    edit.validate()?;
                }
            }
            Ok(CompiledRequest::Multi {
                operations: operations.clone(),
            })
        }
    }
}

/// Writes staged content and moves it over the target, falling back to
/// copy + delete when the rename crosses filesystems.
async fn write_and_move(staged: &Path, target: &Path, content: &[u8]) -> Result<(), textforge_domain::EngineError> {
    tokio::fs::write(staged, content)
        .await
        .map_err(|e| textforge_domain::EngineError::IoError(format!("staging write failed: {}", e)))?;

    match tokio::fs::rename(staged, target).await {
        Ok(()) => Ok(()),
        Err(_) => {
            tokio::fs::copy(staged, target)
                .await
                .map_err(|e| textforge_domain::EngineError::IoError(format!("staged copy failed: {}", e)))?;
            let _ = tokio::fs::remove_file(staged).await;
            Ok(())
        }
    }
}

/// Severity helper for callers that only need a pass/fail view of
/// validation output.
pub fn has_errors(issues: &[ValidationIssue]) -> bool {
    issues.iter().any(|issue| issue.severity == IssueSeverity::Error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use textforge_domain::EditCondition;

    fn facts() -> FileFacts {
        FileFacts::new("/w/test.txt", 20, None)
    }

    #[test]
    fn test_replace_pass_counts_substitutions() {
        let pass = EditPass::Replace {
            regex: Regex::new("hello").unwrap(),
            replacement: "hi".to_string(),
        };
        match pass.apply("hellohello", &facts()).unwrap() {
            PassOutcome::Changed { new_content, changes } => {
                assert_eq!(new_content, "hihi");
                assert_eq!(changes, 2);
            }
            _ => panic!("expected change"),
        }
    }

    #[test]
    fn test_replace_pass_no_match_is_unchanged() {
        let pass = EditPass::Replace {
            regex: Regex::new("absent").unwrap(),
            replacement: "x".to_string(),
        };
        assert!(matches!(pass.apply("content", &facts()).unwrap(), PassOutcome::Unchanged));
    }

    #[test]
    fn test_guarded_pass_skips_when_condition_false() {
        let pass = EditPass::Guarded {
            condition: Some(ConditionSpec::new(EditCondition::Contains {
                text: "class".to_string(),
            })),
            edits: vec![TextEdit::Insert {
                line: 1,
                column: 0,
                text: "x".to_string(),
            }],
        };
        match pass.apply("no match here", &facts()).unwrap() {
            PassOutcome::Skipped { reason } => assert_eq!(reason, "condition not met"),
            _ => panic!("expected skip"),
        }
    }

    #[test]
    fn test_compile_rejects_bad_regex_pre_dispatch() {
        let request = BulkEditRequest::Replace {
            files: vec!["*.txt".to_string()],
            pattern: "[unclosed".to_string(),
            replacement: String::new(),
            flags: RegexFlags::default(),
            options: BulkEditOptions::default(),
        };
        assert!(compile_request(&request).is_err());
    }

    #[test]
    fn test_compile_rejects_unknown_dependency() {
        let request = BulkEditRequest::MultiFile {
            operations: vec![EditOperation {
                name: "a".to_string(),
                file_patterns: vec!["x".to_string()],
                condition: None,
                edits: vec![],
                priority: 1,
                depends_on: vec!["missing".to_string()],
            }],
            options: BulkEditOptions::default(),
        };
        assert!(compile_request(&request).is_err());
    }

    #[test]
    fn test_multi_sort_is_stable_by_priority() {
        let ops = vec![
            EditOperation {
                name: "b-first".into(),
                file_patterns: vec![],
                condition: None,
                edits: vec![],
                priority: 2,
                depends_on: vec![],
            },
            EditOperation {
                name: "a".into(),
                file_patterns: vec![],
                condition: None,
                edits: vec![],
                priority: 1,
                depends_on: vec![],
            },
            EditOperation {
                name: "b-second".into(),
                file_patterns: vec![],
                condition: None,
                edits: vec![],
                priority: 2,
                depends_on: vec![],
            },
        ];
        let mut sorted = ops.clone();
        sorted.sort_by_key(|o| o.priority);
        let names: Vec<&str> = sorted.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b-first", "b-second"]);
    }
}
