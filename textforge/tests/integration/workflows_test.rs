// /////////////////////////////////////////////////////////////////////////////
// Textforge
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Cross-service workflows: glob-driven edits, scratch hygiene, restored
//! session cleanup, and property checks over the progress tracker.

use proptest::prelude::*;
use std::time::Duration;

use textforge::infrastructure::services::ProgressTracker;
use textforge_domain::entities::progress::ProgressUpdate;
use textforge_domain::{BulkEditOptions, OperationId, ProgressPort, RegexFlags, ScratchSpace, SnapshotStore};

use super::common::Harness;

#[tokio::test]
async fn glob_driven_edit_skips_hidden_and_excluded() {
    let harness = Harness::new().await;
    let kept = harness.write_file("kept.rs", "old_name()").await;
    let hidden = harness.write_file(".secret.rs", "old_name()").await;
    let excluded = harness.write_file("vendor.rs", "old_name()").await;

    let summary = harness
        .engine
        .bulk_replace(
            vec![harness.workspace.join("*.rs").to_string_lossy().to_string()],
            "old_name",
            "new_name",
            RegexFlags::default(),
            BulkEditOptions {
                exclude_patterns: vec!["vendor*".to_string()],
                ..Default::default()
            },
        )
        .await;

    assert!(summary.errors.is_empty());
    assert_eq!(harness.read_file(&kept).await, b"new_name()");
    assert_eq!(harness.read_file(&hidden).await, b"old_name()");
    assert_eq!(harness.read_file(&excluded).await, b"old_name()");
    assert_eq!(summary.totals.skipped, 2);
}

#[tokio::test]
async fn bulk_edit_leaves_no_scratch_files_behind() {
    let harness = Harness::new().await;
    let a = harness.write_file("a.txt", "rewrite me").await;
    let b = harness.write_file("b.txt", "rewrite me too").await;

    let summary = harness
        .engine
        .bulk_replace(
            vec![
                a.to_string_lossy().to_string(),
                b.to_string_lossy().to_string(),
            ],
            "rewrite",
            "rewrote",
            RegexFlags::default(),
            BulkEditOptions::default(),
        )
        .await;
    assert_eq!(summary.modified_files(), 2);

    // Staged write files were renamed away and deregistered
    let stats = harness.scratch.stats();
    assert_eq!(stats.tracked_files, 0);
    assert_eq!(stats.delete_errors, 0);
}

#[tokio::test]
async fn restored_session_is_eventually_deleted_from_disk() {
    let harness = Harness::new().await;
    let file = harness.write_file("target.txt", "before").await;

    let outcome = harness
        .store
        .create_session(OperationId::new(), textforge_domain::OperationKind::BulkReplace, &[file.clone()])
        .await
        .unwrap();
    let session_dir = outcome.session.session_dir.clone();
    let id = outcome.session.rollback_id;

    harness.write_file("target.txt", "after").await;
    let report = harness.store.restore(id).await.unwrap();
    assert!(report.success);
    assert_eq!(harness.read_file(&file).await, b"before");

    // Deletion is asynchronous and best-effort; poll briefly
    let mut deleted = false;
    for _ in 0..50 {
        if !session_dir.exists() {
            deleted = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(deleted, "restored session dir should be deleted asynchronously");
}

#[tokio::test]
async fn progress_records_follow_bulk_operations() {
    let harness = Harness::new().await;
    let a = harness.write_file("tracked.txt", "content content").await;

    let summary = harness
        .engine
        .bulk_replace(
            vec![a.to_string_lossy().to_string()],
            "content",
            "tracked",
            RegexFlags::default(),
            BulkEditOptions::default(),
        )
        .await;

    let record = harness
        .progress
        .get(summary.operation_id)
        .expect("record for the operation");
    assert!(record.is_terminal());
    assert_eq!(record.phase, "Completed");
    assert_eq!(record.items_done, 1);
    // Terminal records drop out of the active view
    assert!(harness.progress.active().iter().all(|r| r.operation_id != summary.operation_id));
}

proptest! {
    /// For any update sequence, per-operation counters never decrease.
    #[test]
    fn progress_counters_are_monotone(updates in proptest::collection::vec(0u64..10_000, 1..40)) {
        let tracker = ProgressTracker::new();
        let op = OperationId::new();
        tracker.create(op, "property", 0);

        let mut high_water = 0u64;
        for bytes in updates {
            tracker.update(
                op,
                ProgressUpdate {
                    bytes_done: bytes,
                    chunks_done: Some(bytes / 7),
                    ..Default::default()
                },
            );
            let record = tracker.get(op).unwrap();
            prop_assert!(record.bytes_done >= high_water);
            high_water = record.bytes_done;
            prop_assert!(record.bytes_done >= bytes.min(high_water));
        }
    }

    /// ETA derivation never divides by zero, whatever the caller reports.
    #[test]
    fn progress_eta_is_always_finite(total in 0u64..1_000_000, updates in proptest::collection::vec(0u64..1_000_000, 1..20)) {
        let tracker = ProgressTracker::new();
        let op = OperationId::new();
        tracker.create(op, "eta-property", total);

        for bytes in updates {
            tracker.update(
                op,
                ProgressUpdate {
                    bytes_done: bytes,
                    ..Default::default()
                },
            );
        }
        let record = tracker.get(op).unwrap();
        if let Some(eta) = record.eta_seconds {
            prop_assert!(eta.is_finite());
            prop_assert!(eta >= 0.0);
        }
        if total > 0 {
            prop_assert!(record.bytes_done <= total);
        }
    }
}
