// /////////////////////////////////////////////////////////////////////////////
// Textforge
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Rollback store workflows: snapshot soundness, restore faithfulness,
//! integrity verification, expiry, export/import, and startup recovery.

use textforge::infrastructure::repositories::FilesystemRollbackStore;
use textforge_domain::services::checksum::sha256_hex;
use textforge_domain::{FileIntegrityStatus, OperationId, OperationKind, SnapshotStore};

use super::common::Harness;

#[tokio::test]
async fn snapshot_verify_restore_round_trip_is_byte_identical() {
    let harness = Harness::new().await;
    let a = harness.write_file("src/a.rs", "fn a() {}\n").await;
    let b = harness.write_file("src/deep/b.rs", "fn b() {}\n").await;

    let outcome = harness
        .store
        .create_session(OperationId::new(), OperationKind::BulkReplace, &[a.clone(), b.clone()])
        .await
        .unwrap();
    assert!(outcome.failures.is_empty());
    let id = outcome.session.rollback_id;

    // Snapshot soundness: every backup hashes to the recorded checksum
    for snapshot in &outcome.session.files {
        let bytes = harness.read_file(&snapshot.backup_path).await;
        assert_eq!(sha256_hex(&bytes), snapshot.original_checksum);
    }

    let verify = harness.store.verify(id).await.unwrap();
    assert!(verify.success);
    assert_eq!(verify.verified, 2);

    // Mutate the workspace, then restore
    harness.write_file("src/a.rs", "fn a() { panic!() }\n").await;
    tokio::fs::remove_file(&b).await.unwrap();

    let report = harness.store.restore(id).await.unwrap();
    assert!(report.success);
    assert_eq!(report.restored, 2);
    assert_eq!(harness.read_file(&a).await, b"fn a() {}\n");
    assert_eq!(harness.read_file(&b).await, b"fn b() {}\n");
}

#[tokio::test]
async fn corrupted_backup_is_detected_and_never_restored() {
    let harness = Harness::new().await;
    let good = harness.write_file("good.txt", "good content").await;
    let victim = harness.write_file("victim.txt", "victim content").await;

    let outcome = harness
        .store
        .create_session(OperationId::new(), OperationKind::ConditionalEdit, &[good.clone(), victim.clone()])
        .await
        .unwrap();
    let id = outcome.session.rollback_id;

    // Externally truncate the victim's backup
    let victim_backup = outcome
        .session
        .files
        .iter()
        .find(|s| s.original_path == victim)
        .unwrap()
        .backup_path
        .clone();
    tokio::fs::write(&victim_backup, b"trunc").await.unwrap();

    let verify = harness.store.verify(id).await.unwrap();
    assert!(!verify.success);
    assert_eq!(verify.corrupted, 1);
    assert_eq!(verify.missing, 0);
    assert_eq!(verify.verified, 1);
    assert!(verify
        .per_file
        .iter()
        .any(|f| f.original_path == victim && f.status == FileIntegrityStatus::Corrupted));

    // Mutate both originals; restore must fix `good` and refuse `victim`
    harness.write_file("good.txt", "mutated good").await;
    harness.write_file("victim.txt", "mutated victim").await;

    let report = harness.store.restore(id).await.unwrap();
    assert!(!report.success);
    assert_eq!(report.restored, 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, victim);

    assert_eq!(harness.read_file(&good).await, b"good content");
    // The corrupted backup never touches the original
    assert_eq!(harness.read_file(&victim).await, b"mutated victim");
}

#[tokio::test]
async fn missing_backup_reported_as_missing() {
    let harness = Harness::new().await;
    let file = harness.write_file("gone.txt", "content").await;

    let outcome = harness
        .store
        .create_session(OperationId::new(), OperationKind::BulkReplace, &[file])
        .await
        .unwrap();
    let id = outcome.session.rollback_id;

    tokio::fs::remove_file(&outcome.session.files[0].backup_path)
        .await
        .unwrap();

    let verify = harness.store.verify(id).await.unwrap();
    assert!(!verify.success);
    assert_eq!(verify.missing, 1);
}

#[tokio::test]
async fn zero_retention_sessions_expire_immediately() {
    let harness = Harness::with_config(|config| config.retention_days = 0).await;
    let file = harness.write_file("ephemeral.txt", "short lived").await;

    let outcome = harness
        .store
        .create_session(OperationId::new(), OperationKind::BulkReplace, &[file])
        .await
        .unwrap();
    let id = outcome.session.rollback_id;
    let session_dir = outcome.session.session_dir.clone();

    // Expired sessions are excluded from restorable listings
    assert!(harness.store.list().await.is_empty());

    let removed = harness.store.cleanup_expired().await.unwrap();
    assert_eq!(removed, 1);
    assert!(!session_dir.exists());
    assert!(harness.store.get(id).await.is_none());

    // Idempotent: a second sweep removes nothing
    assert_eq!(harness.store.cleanup_expired().await.unwrap(), 0);
}

#[tokio::test]
async fn cleanup_is_idempotent_for_live_sessions() {
    let harness = Harness::new().await;
    let file = harness.write_file("durable.txt", "content").await;
    harness
        .store
        .create_session(OperationId::new(), OperationKind::BulkReplace, &[file])
        .await
        .unwrap();

    assert_eq!(harness.store.cleanup_expired().await.unwrap(), 0);
    assert_eq!(harness.store.cleanup_expired().await.unwrap(), 0);
    assert_eq!(harness.store.list().await.len(), 1);
}

#[tokio::test]
async fn export_import_preserves_snapshot_records() {
    let harness = Harness::new().await;
    let file = harness.write_file("exported.txt", "exported content").await;

    let outcome = harness
        .store
        .create_session(OperationId::new(), OperationKind::BatchRefactor, &[file.clone()])
        .await
        .unwrap();
    let original = outcome.session;

    let export_path = harness.dir.path().join("exports").join("session.json");
    harness.store.export(original.rollback_id, &export_path).await.unwrap();

    let imported = harness.store.import(&export_path).await.unwrap();
    assert_ne!(imported.rollback_id, original.rollback_id);
    assert_eq!(imported.operation_id, original.operation_id);
    assert_eq!(imported.files, original.files);
    assert_eq!(imported.total_size, original.total_size);

    // The imported session restores through the original backup files
    harness.write_file("exported.txt", "mutated").await;
    let report = harness.store.restore(imported.rollback_id).await.unwrap();
    assert!(report.success);
    assert_eq!(harness.read_file(&file).await, b"exported content");
}

#[tokio::test]
async fn startup_scan_recovers_existing_sessions() {
    let harness = Harness::new().await;
    let file = harness.write_file("persisted.txt", "persisted").await;

    let outcome = harness
        .store
        .create_session(OperationId::new(), OperationKind::MultiFileEdit, &[file.clone()])
        .await
        .unwrap();
    let id = outcome.session.rollback_id;

    // A second store over the same root sees the session
    let reopened = FilesystemRollbackStore::from_config(&harness.config).await.unwrap();
    let recovered = reopened.get(id).await.expect("session recovered from disk");
    assert_eq!(recovered.files.len(), 1);
    assert!(reopened.list().await.iter().any(|s| s.rollback_id == id));

    // And can restore it
    harness.write_file("persisted.txt", "changed").await;
    let report = reopened.restore(id).await.unwrap();
    assert!(report.success);
    assert_eq!(harness.read_file(&file).await, b"persisted");
}

#[tokio::test]
async fn history_and_stats_account_for_sessions() {
    let harness = Harness::new().await;
    let a = harness.write_file("a.txt", vec![b'a'; 100]).await;
    let b = harness.write_file("b.txt", vec![b'b'; 50]).await;

    harness
        .store
        .create_session(OperationId::new(), OperationKind::BulkReplace, &[a])
        .await
        .unwrap();
    harness
        .store
        .create_session(OperationId::new(), OperationKind::BulkReplace, &[b])
        .await
        .unwrap();

    let history = harness.store.history(10).await;
    assert_eq!(history.len(), 2);
    assert!(history[0].created_at >= history[1].created_at);
    assert_eq!(harness.store.history(1).await.len(), 1);

    let stats = harness.store.stats().await;
    assert_eq!(stats.sessions, 2);
    assert_eq!(stats.files, 2);
    assert_eq!(stats.total_bytes, 150);
}
