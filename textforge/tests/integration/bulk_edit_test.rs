// /////////////////////////////////////////////////////////////////////////////
// Textforge
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Bulk-edit engine workflows: replace, conditional, multi-operation
//! ordering, preview, validation, and impact estimation.

use std::path::Path;

use textforge_bootstrap::shutdown::CancellationToken;
use textforge_domain::{
    BulkEditOptions, BulkEditRequest, BulkEditSummary, ConditionSpec, EditCondition, EditOperation, FileEditResult,
    IssueSeverity, RefactorKind, RefactorPattern, RegexFlags, SnapshotStore, TextEdit,
};

use super::common::{as_patterns, Harness};

fn result_for<'a>(summary: &'a BulkEditSummary, path: &Path) -> &'a FileEditResult {
    summary
        .per_file
        .iter()
        .find(|r| r.path == path)
        .unwrap_or_else(|| panic!("no result for {}", path.display()))
}

#[tokio::test]
async fn regex_replace_three_files_with_rollback() {
    let harness = Harness::new().await;
    let a = harness.write_file("a.txt", "hello").await;
    let b = harness.write_file("b.txt", "hellohello").await;
    let c = harness.write_file("c.txt", "bye").await;

    let summary = harness
        .engine
        .bulk_replace(
            as_patterns(&[a.clone(), b.clone(), c.clone()]),
            "hello",
            "hi",
            RegexFlags::default(),
            BulkEditOptions::default(),
        )
        .await;

    assert!(summary.errors.is_empty(), "unexpected errors: {:?}", summary.errors);
    assert_eq!(harness.read_file(&a).await, b"hi");
    assert_eq!(harness.read_file(&b).await, b"hihi");
    assert_eq!(harness.read_file(&c).await, b"bye");

    assert_eq!(result_for(&summary, &a).changes_applied, 1);
    assert_eq!(result_for(&summary, &b).changes_applied, 2);
    assert_eq!(result_for(&summary, &c).changes_applied, 0);
    assert_eq!(summary.modified_files(), 2);
    assert_eq!(summary.totals.matched, 3);

    // The snapshot covers the whole set and restores the originals
    let rollback_id = summary.rollback_id.expect("rollback session");
    let report = harness.store.restore(rollback_id).await.unwrap();
    assert!(report.success);
    assert_eq!(harness.read_file(&a).await, b"hello");
    assert_eq!(harness.read_file(&b).await, b"hellohello");
    assert_eq!(harness.read_file(&c).await, b"bye");
}

#[tokio::test]
async fn no_match_leaves_files_byte_identical() {
    let harness = Harness::new().await;
    let a = harness.write_file("a.txt", "alpha beta\n").await;
    let b = harness.write_file("b.txt", "gamma delta\n").await;

    let summary = harness
        .engine
        .bulk_replace(
            as_patterns(&[a.clone(), b.clone()]),
            "never-present",
            "x",
            RegexFlags::default(),
            BulkEditOptions::default(),
        )
        .await;

    assert!(summary.errors.is_empty());
    assert_eq!(summary.modified_files(), 0);
    for result in &summary.per_file {
        assert!(result.success);
        assert_eq!(result.changes_applied, 0);
    }
    assert_eq!(harness.read_file(&a).await, b"alpha beta\n");
    assert_eq!(harness.read_file(&b).await, b"gamma delta\n");
}

#[tokio::test]
async fn conditional_edit_skips_non_matching_files() {
    let harness = Harness::new().await;
    let x = harness.write_file("x.cs", "public class X {}").await;
    let y = harness.write_file("y.md", "nope").await;

    let summary = harness
        .engine
        .conditional_edit(
            as_patterns(&[x.clone(), y.clone()]),
            ConditionSpec::new(EditCondition::Contains {
                text: "class".to_string(),
            }),
            vec![TextEdit::Replace {
                start_line: 1,
                start_column: 7,
                end_line: 1,
                end_column: 12,
                text: "interface".to_string(),
            }],
            BulkEditOptions::default(),
        )
        .await;

    assert!(summary.errors.is_empty());
    assert_eq!(harness.read_file(&x).await, b"public interface X {}");
    assert_eq!(harness.read_file(&y).await, b"nope");

    assert_eq!(summary.totals.success, 1);
    assert_eq!(summary.totals.skipped, 1);
    assert_eq!(summary.totals.failed, 0);
    assert_eq!(
        result_for(&summary, &y).skip_reason.as_deref(),
        Some("condition not met")
    );
}

#[tokio::test]
async fn batch_refactor_whole_word_only() {
    let harness = Harness::new().await;
    let src = harness
        .write_file("lib.rs", "let count = counter + count;\n")
        .await;

    let summary = harness
        .engine
        .batch_refactor(
            as_patterns(&[src.clone()]),
            RefactorPattern {
                kind: RefactorKind::WholeWord,
                target_pattern: "count".to_string(),
                replacement_pattern: "total".to_string(),
            },
            BulkEditOptions::default(),
        )
        .await;

    assert!(summary.errors.is_empty());
    assert_eq!(harness.read_file(&src).await, b"let total = counter + total;\n");
    assert_eq!(result_for(&summary, &src).changes_applied, 2);
}

#[tokio::test]
async fn multi_file_edit_respects_priority_order() {
    let harness = Harness::new().await;
    let a = harness.write_file("a.txt", "first\n").await;
    let b = harness.write_file("b.txt", "second\n").await;

    let operations = vec![
        EditOperation {
            name: "op-b".to_string(),
            file_patterns: as_patterns(&[b.clone()]),
            condition: None,
            edits: vec![TextEdit::Insert {
                line: 1,
                column: 0,
                text: "B:".to_string(),
            }],
            priority: 2,
            depends_on: vec![],
        },
        EditOperation {
            name: "op-a".to_string(),
            file_patterns: as_patterns(&[a.clone()]),
            condition: None,
            edits: vec![TextEdit::Insert {
                line: 1,
                column: 0,
                text: "A:".to_string(),
            }],
            priority: 1,
            depends_on: vec![],
        },
    ];

    let summary = harness.engine.multi_file_edit(operations, BulkEditOptions::default()).await;

    assert!(summary.errors.is_empty());
    assert_eq!(harness.read_file(&a).await, b"A:first\n");
    assert_eq!(harness.read_file(&b).await, b"B:second\n");

    // Lower priority completes before any file of the higher one begins
    let a_result = result_for(&summary, &a);
    let b_result = result_for(&summary, &b);
    assert!(a_result.ended <= b_result.started);
}

#[tokio::test]
async fn multi_file_edit_stop_on_first_error_skips_later_operations() {
    let harness = Harness::new().await;
    // Invalid UTF-8 forces a per-file read failure in the first operation
    let broken = harness.write_file("broken.bin", vec![0xff, 0xfe, 0x00, 0x80]).await;
    let untouched = harness.write_file("later.txt", "unchanged\n").await;

    let operations = vec![
        EditOperation {
            name: "first".to_string(),
            file_patterns: as_patterns(&[broken.clone()]),
            condition: None,
            edits: vec![TextEdit::Insert {
                line: 1,
                column: 0,
                text: "x".to_string(),
            }],
            priority: 1,
            depends_on: vec![],
        },
        EditOperation {
            name: "second".to_string(),
            file_patterns: as_patterns(&[untouched.clone()]),
            condition: None,
            edits: vec![TextEdit::Insert {
                line: 1,
                column: 0,
                text: "x".to_string(),
            }],
            priority: 2,
            depends_on: vec![],
        },
    ];

    let summary = harness
        .engine
        .multi_file_edit(
            operations,
            BulkEditOptions {
                stop_on_first_error: true,
                ..Default::default()
            },
        )
        .await;

    assert!(!summary.errors.is_empty());
    assert_eq!(summary.totals.failed, 1);
    // The second operation was never dispatched
    assert!(!summary.per_file.iter().any(|r| r.path == untouched));
    assert_eq!(harness.read_file(&untouched).await, b"unchanged\n");
}

#[tokio::test]
async fn multi_file_edit_dependency_gating() {
    let harness = Harness::new().await;
    let broken = harness.write_file("broken.bin", vec![0xff, 0xfe]).await;
    let dependent = harness.write_file("dependent.txt", "keep\n").await;

    let operations = vec![
        EditOperation {
            name: "base".to_string(),
            file_patterns: as_patterns(&[broken.clone()]),
            condition: None,
            edits: vec![TextEdit::Insert {
                line: 1,
                column: 0,
                text: "x".to_string(),
            }],
            priority: 1,
            depends_on: vec![],
        },
        EditOperation {
            name: "follow-up".to_string(),
            file_patterns: as_patterns(&[dependent.clone()]),
            condition: None,
            edits: vec![TextEdit::Insert {
                line: 1,
                column: 0,
                text: "x".to_string(),
            }],
            priority: 2,
            depends_on: vec!["base".to_string()],
        },
    ];

    let summary = harness.engine.multi_file_edit(operations, BulkEditOptions::default()).await;

    let dep_result = result_for(&summary, &dependent);
    assert!(dep_result.skipped);
    assert!(dep_result.skip_reason.as_deref().unwrap().contains("base"));
    assert_eq!(harness.read_file(&dependent).await, b"keep\n");
}

#[tokio::test]
async fn invalid_regex_fails_before_dispatch() {
    let harness = Harness::new().await;
    let a = harness.write_file("a.txt", "content").await;

    let summary = harness
        .engine
        .bulk_replace(
            as_patterns(&[a.clone()]),
            "[unclosed",
            "x",
            RegexFlags::default(),
            BulkEditOptions::default(),
        )
        .await;

    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.totals.processed, 0);
    assert!(summary.rollback_id.is_none());
    assert_eq!(harness.read_file(&a).await, b"content");
}

#[tokio::test]
async fn empty_file_set_is_zero_file_success() {
    let harness = Harness::new().await;

    let summary = harness
        .engine
        .bulk_replace(
            vec![harness.workspace.join("missing-*.txt").to_string_lossy().to_string()],
            "x",
            "y",
            RegexFlags::default(),
            BulkEditOptions::default(),
        )
        .await;

    assert!(summary.errors.is_empty());
    assert_eq!(summary.totals.matched, 0);
    assert!(summary.rollback_id.is_none(), "no session for an empty set");
    assert!(harness.store.list().await.is_empty());
}

#[tokio::test]
async fn preview_mutates_nothing_and_carries_diffs() {
    let harness = Harness::new().await;
    let a = harness.write_file("a.txt", "hello world\n").await;

    let summary = harness
        .engine
        .preview(BulkEditRequest::Replace {
            files: as_patterns(&[a.clone()]),
            pattern: "hello".to_string(),
            replacement: "hi".to_string(),
            flags: RegexFlags::default(),
            options: BulkEditOptions::default(),
        })
        .await;

    assert!(summary.preview);
    assert!(summary.errors.is_empty());
    // No writes, no snapshots
    assert_eq!(harness.read_file(&a).await, b"hello world\n");
    assert!(summary.rollback_id.is_none());
    assert!(harness.store.list().await.is_empty());

    let result = result_for(&summary, &a);
    assert_eq!(result.changes_applied, 1);
    let diff = result.diff.as_ref().expect("preview diff");
    assert_eq!(diff.hunks.len(), 1);
    assert!(diff.hunks[0].lines.contains(&"-hello world".to_string()));
    assert!(diff.hunks[0].lines.contains(&"+hi world".to_string()));
}

#[tokio::test]
async fn cancellation_after_snapshot_leaves_restorable_noop_session() {
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::Arc;
    use textforge_domain::{
        EngineError, IntegrityReport, OperationId, OperationKind, PatternPort, ProgressPort, RestoreReport,
        RollbackId, RollbackSession, ScratchSpace, SnapshotOutcome, StoreStats,
    };

    /// Delegating store that cancels the operation the moment the
    /// snapshot session is complete.
    struct CancelAfterSnapshot {
        inner: Arc<dyn SnapshotStore>,
        token: CancellationToken,
    }

    #[async_trait]
    impl SnapshotStore for CancelAfterSnapshot {
        async fn create_session(
            &self,
            operation_id: OperationId,
            kind: OperationKind,
            files: &[PathBuf],
        ) -> Result<SnapshotOutcome, EngineError> {
            let outcome = self.inner.create_session(operation_id, kind, files).await?;
            self.token.cancel();
            Ok(outcome)
        }
        async fn restore(&self, id: RollbackId) -> Result<RestoreReport, EngineError> {
            self.inner.restore(id).await
        }
        async fn verify(&self, id: RollbackId) -> Result<IntegrityReport, EngineError> {
            self.inner.verify(id).await
        }
        async fn get(&self, id: RollbackId) -> Option<RollbackSession> {
            self.inner.get(id).await
        }
        async fn list(&self) -> Vec<RollbackSession> {
            self.inner.list().await
        }
        async fn history(&self, limit: usize) -> Vec<RollbackSession> {
            self.inner.history(limit).await
        }
        async fn delete(&self, id: RollbackId) -> Result<bool, EngineError> {
            self.inner.delete(id).await
        }
        async fn cleanup_expired(&self) -> Result<usize, EngineError> {
            self.inner.cleanup_expired().await
        }
        async fn export(&self, id: RollbackId, destination: &Path) -> Result<(), EngineError> {
            self.inner.export(id, destination).await
        }
        async fn import(&self, source: &Path) -> Result<RollbackSession, EngineError> {
            self.inner.import(source).await
        }
        async fn stats(&self) -> StoreStats {
            self.inner.stats().await
        }
    }

    let harness = Harness::new().await;
    let a = harness.write_file("a.txt", "pristine").await;

    let token = CancellationToken::new();
    let engine = textforge::application::services::BulkEditEngine::new(
        Arc::new(CancelAfterSnapshot {
            inner: Arc::clone(&harness.store) as Arc<dyn SnapshotStore>,
            token: token.clone(),
        }),
        Arc::clone(&harness.progress) as Arc<dyn ProgressPort>,
        Arc::new(textforge::infrastructure::services::PatternResolver::new()) as Arc<dyn PatternPort>,
        Arc::clone(&harness.scratch) as Arc<dyn ScratchSpace>,
        Arc::clone(&harness.governor),
    );

    let summary = engine
        .execute_cancellable(
            BulkEditRequest::Replace {
                files: as_patterns(&[a.clone()]),
                pattern: "pristine".to_string(),
                replacement: "tainted".to_string(),
                flags: RegexFlags::default(),
                options: BulkEditOptions::default(),
            },
            token,
        )
        .await;

    // The snapshot exists, no edit was applied
    let rollback_id = summary.rollback_id.expect("session created before cancel");
    assert_eq!(harness.read_file(&a).await, b"pristine");
    assert_eq!(summary.modified_files(), 0);

    // A subsequent rollback is a byte-level no-op
    let report = harness.store.restore(rollback_id).await.unwrap();
    assert!(report.success);
    assert_eq!(harness.read_file(&a).await, b"pristine");
}

#[tokio::test]
async fn file_deleted_between_resolve_and_dispatch_fails_per_file() {
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::Arc;
    use textforge_domain::{PatternFilter, PatternPort, ProgressPort, ResolvedSet, ScratchSpace};

    /// Resolver that hands back a path which no longer exists, simulating
    /// a file deleted between resolution and dispatch.
    struct StaleResolver {
        live: PathBuf,
        ghost: PathBuf,
    }

    #[async_trait]
    impl PatternPort for StaleResolver {
        async fn resolve(&self, _patterns: &[String], _filter: &PatternFilter) -> ResolvedSet {
            ResolvedSet {
                files: vec![self.live.clone(), self.ghost.clone()],
                skipped: Vec::new(),
            }
        }
    }

    let harness = Harness::new().await;
    let live = harness.write_file("live.txt", "hello").await;
    let ghost = harness.workspace.join("deleted.txt");

    let engine = textforge::application::services::BulkEditEngine::new(
        Arc::clone(&harness.store) as Arc<dyn SnapshotStore>,
        Arc::clone(&harness.progress) as Arc<dyn ProgressPort>,
        Arc::new(StaleResolver {
            live: live.clone(),
            ghost: ghost.clone(),
        }),
        Arc::clone(&harness.scratch) as Arc<dyn ScratchSpace>,
        Arc::clone(&harness.governor),
    );

    let summary = engine
        .bulk_replace(
            vec!["ignored-by-fake".to_string()],
            "hello",
            "hi",
            RegexFlags::default(),
            BulkEditOptions::default(),
        )
        .await;

    // The live file was edited; the ghost produced a per-file failure and
    // nothing crashed or halted the operation
    assert!(summary.errors.is_empty());
    assert_eq!(harness.read_file(&live).await, b"hi");
    assert_eq!(summary.totals.success, 1);
    assert_eq!(summary.totals.failed, 1);
    let ghost_result = result_for(&summary, &ghost);
    assert!(!ghost_result.success);
    assert!(ghost_result.error.is_some());
}

#[tokio::test]
async fn validate_reports_issues_with_severity() {
    let harness = Harness::new().await;
    let a = harness.write_file("a.txt", "text").await;

    // Bad regex plus resolvable files: one error about the pattern
    let issues = harness
        .engine
        .validate(&BulkEditRequest::Replace {
            files: as_patterns(&[a.clone()]),
            pattern: "[broken".to_string(),
            replacement: String::new(),
            flags: RegexFlags::default(),
            options: BulkEditOptions::default(),
        })
        .await;
    assert!(issues
        .iter()
        .any(|i| i.severity == IssueSeverity::Error && i.location.as_deref() == Some("pattern")));

    // Empty resolution: an error about the file set
    let issues = harness
        .engine
        .validate(&BulkEditRequest::Replace {
            files: vec![harness.workspace.join("*.nothing").to_string_lossy().to_string()],
            pattern: "fine".to_string(),
            replacement: String::new(),
            flags: RegexFlags::default(),
            options: BulkEditOptions::default(),
        })
        .await;
    assert!(issues
        .iter()
        .any(|i| i.severity == IssueSeverity::Error && i.message.contains("no files")));

    // Well-formed request: no errors
    let issues = harness
        .engine
        .validate(&BulkEditRequest::Replace {
            files: as_patterns(&[a]),
            pattern: "fine".to_string(),
            replacement: String::new(),
            flags: RegexFlags::default(),
            options: BulkEditOptions::default(),
        })
        .await;
    assert!(!issues.iter().any(|i| i.severity == IssueSeverity::Error));
}

#[tokio::test]
async fn impact_estimation_counts_without_reading_bodies() {
    let harness = Harness::new().await;
    harness.write_file("one.rs", "x".repeat(100)).await;
    harness.write_file("two.rs", "y".repeat(50)).await;
    harness.write_file("notes.md", "z".repeat(25)).await;

    let estimate = harness
        .engine
        .estimate_impact(&BulkEditRequest::Replace {
            files: vec![harness.workspace.to_string_lossy().to_string()],
            pattern: "x".to_string(),
            replacement: "y".to_string(),
            flags: RegexFlags::default(),
            options: BulkEditOptions::default(),
        })
        .await;

    assert_eq!(estimate.files, 3);
    assert_eq!(estimate.total_bytes, 175);
    assert_eq!(estimate.by_extension.get("rs"), Some(&2));
    assert_eq!(estimate.by_extension.get("md"), Some(&1));
    assert!(!estimate.large_change);
}
