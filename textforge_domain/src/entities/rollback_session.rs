// /////////////////////////////////////////////////////////////////////////////
// Textforge
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Rollback Session
//!
//! This module defines the durable data model of the rollback store: the
//! per-file snapshot record and the session that owns a set of them.
//!
//! ## Durable Layout
//!
//! A session lives in its own directory under the rollback root:
//!
//! ```text
//! <root>/<rollback_id>/
//!   rollback-metadata.json
//!   <uuid>.<ext>      one per backed-up file
//!   ...
//! ```
//!
//! The metadata document is canonical JSON with camelCase keys for
//! interoperability with non-Rust callers; [`RollbackSession`] serializes to
//! exactly that document.
//!
//! ## Invariants
//!
//! - At snapshot time `original_checksum == backup_checksum`, verified by
//!   re-hashing the copied bytes
//! - `backup_path` lies under the session directory (or an adopted path for
//!   imported sessions) and is never reused
//! - A session is restorable iff it has not expired and its metadata
//!   document is present and parses
//! - `total_size` equals the sum of all `backup_size` fields

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::value_objects::operation_id::OperationId;
use crate::value_objects::rollback_id::RollbackId;

use super::edit_model::OperationKind;

/// File name of the per-session metadata document
pub const ROLLBACK_METADATA_FILE: &str = "rollback-metadata.json";

/// Default session retention
pub const DEFAULT_RETENTION_DAYS: i64 = 7;

/// A verified snapshot of one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSnapshot {
    /// Absolute path of the file that was snapshotted
    pub original_path: PathBuf,
    /// Where the backup copy lives (empty for `was_created` records)
    pub backup_path: PathBuf,
    /// SHA-256 of the original at snapshot time (hex; empty if absent)
    pub original_checksum: String,
    /// SHA-256 of the backup copy (hex; must equal `original_checksum`)
    pub backup_checksum: String,
    /// Size of the backup copy in bytes
    pub backup_size: u64,
    /// When the snapshot was taken
    pub created: DateTime<Utc>,
    /// True when the original did not exist at snapshot time; restoring
    /// such a record deletes the file to recreate the pre-operation state
    pub was_created: bool,
    /// True when the operation deleted the original after the snapshot
    pub was_deleted: bool,
}

impl FileSnapshot {
    /// Builds a snapshot record for a file that existed at snapshot time.
    pub fn backed_up(
        original_path: PathBuf,
        backup_path: PathBuf,
        checksum: String,
        backup_size: u64,
    ) -> Self {
        Self {
            original_path,
            backup_path,
            original_checksum: checksum.clone(),
            backup_checksum: checksum,
            backup_size,
            created: Utc::now(),
            was_created: false,
            was_deleted: false,
        }
    }

    /// Builds a snapshot record for a file that did not exist at snapshot
    /// time. Checksums are empty by invariant.
    pub fn absent(original_path: PathBuf) -> Self {
        Self {
            original_path,
            backup_path: PathBuf::new(),
            original_checksum: String::new(),
            backup_checksum: String::new(),
            backup_size: 0,
            created: Utc::now(),
            was_created: true,
            was_deleted: false,
        }
    }

    /// Whether this record has backing bytes on disk
    pub fn has_backup(&self) -> bool {
        !self.was_created && !self.backup_path.as_os_str().is_empty()
    }
}

/// A named, checksum-verified snapshot of a set of files, restorable until
/// its expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackSession {
    /// Session identifier; also the session directory name
    pub rollback_id: RollbackId,
    /// Operation that requested the snapshot
    pub operation_id: OperationId,
    /// Kind of operation that requested the snapshot
    pub operation_kind: OperationKind,
    /// Directory exclusively owned by this session until deletion
    pub session_dir: PathBuf,
    /// Snapshot records, one per attempted file
    pub files: Vec<FileSnapshot>,
    /// When the session was created
    pub created_at: DateTime<Utc>,
    /// When the session stops being restorable
    pub expires_at: DateTime<Utc>,
    /// Sum of all backup sizes in bytes
    pub total_size: u64,
}

impl RollbackSession {
    /// Creates an empty session rooted at `session_dir` with the default
    /// retention.
    pub fn new(operation_id: OperationId, operation_kind: OperationKind, session_dir: PathBuf) -> Self {
        Self::with_retention(
            operation_id,
            operation_kind,
            session_dir,
            Duration::days(DEFAULT_RETENTION_DAYS),
        )
    }

    /// Creates an empty session with an explicit retention period.
    pub fn with_retention(
        operation_id: OperationId,
        operation_kind: OperationKind,
        session_dir: PathBuf,
        retention: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            rollback_id: RollbackId::new(),
            operation_id,
            operation_kind,
            session_dir,
            files: Vec::new(),
            created_at: now,
            expires_at: now + retention,
            total_size: 0,
        }
    }

    /// Appends a snapshot record and updates `total_size`.
    pub fn push_snapshot(&mut self, snapshot: FileSnapshot) {
        self.total_size += snapshot.backup_size;
        self.files.push(snapshot);
    }

    /// Whether the retention window has passed
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Whether the session may still be restored
    pub fn is_restorable(&self, now: DateTime<Utc>) -> bool {
        !self.is_expired(now)
    }

    /// Path of the session's metadata document
    pub fn metadata_path(&self) -> PathBuf {
        self.session_dir.join(ROLLBACK_METADATA_FILE)
    }

    /// Number of records with backing bytes
    pub fn backed_up_count(&self) -> usize {
        self.files.iter().filter(|f| f.has_backup()).count()
    }

    /// Re-keys the session with a fresh id and directory, keeping the file
    /// list. Used by import, which adopts metadata without copying backups.
    pub fn adopted(mut self, session_dir: PathBuf) -> Self {
        self.rollback_id = RollbackId::new();
        self.session_dir = session_dir;
        self
    }
}

/// Verifies that a path lies underneath a session directory.
///
/// Imported sessions reference adopted paths outside the directory, so the
/// check is applied only to sessions created locally.
pub fn backup_path_is_contained(session_dir: &Path, backup_path: &Path) -> bool {
    backup_path.starts_with(session_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> RollbackSession {
        RollbackSession::new(
            OperationId::new(),
            OperationKind::BulkReplace,
            PathBuf::from("/tmp/rollbacks/abc"),
        )
    }

    #[test]
    fn test_total_size_tracks_snapshots() {
        let mut s = session();
        s.push_snapshot(FileSnapshot::backed_up(
            PathBuf::from("/w/a.txt"),
            PathBuf::from("/tmp/rollbacks/abc/1.txt"),
            "aa".repeat(32),
            100,
        ));
        s.push_snapshot(FileSnapshot::backed_up(
            PathBuf::from("/w/b.txt"),
            PathBuf::from("/tmp/rollbacks/abc/2.txt"),
            "bb".repeat(32),
            250,
        ));
        assert_eq!(s.total_size, 350);
        assert_eq!(s.backed_up_count(), 2);
    }

    #[test]
    fn test_absent_snapshot_invariants() {
        let snap = FileSnapshot::absent(PathBuf::from("/w/new.txt"));
        assert!(snap.was_created);
        assert!(snap.original_checksum.is_empty());
        assert!(snap.backup_checksum.is_empty());
        assert!(!snap.has_backup());
    }

    #[test]
    fn test_expiry() {
        let mut s = session();
        assert!(s.is_restorable(Utc::now()));

        s.expires_at = Utc::now() - Duration::seconds(1);
        assert!(s.is_expired(Utc::now()));
        assert!(!s.is_restorable(Utc::now()));
    }

    #[test]
    fn test_zero_retention_expires_immediately() {
        let s = RollbackSession::with_retention(
            OperationId::new(),
            OperationKind::BulkReplace,
            PathBuf::from("/tmp/r/x"),
            Duration::zero(),
        );
        assert!(s.is_expired(Utc::now()));
    }

    #[test]
    fn test_metadata_document_uses_camel_case() {
        let mut s = session();
        s.push_snapshot(FileSnapshot::backed_up(
            PathBuf::from("/w/a.txt"),
            PathBuf::from("/tmp/rollbacks/abc/1.txt"),
            "cc".repeat(32),
            10,
        ));
        let json = serde_json::to_string(&s).unwrap();
        assert!(json.contains("\"rollbackId\""));
        assert!(json.contains("\"operationKind\""));
        assert!(json.contains("\"originalChecksum\""));
        assert!(json.contains("\"wasCreated\""));
        assert!(!json.contains("\"rollback_id\""));
    }

    #[test]
    fn test_adopted_session_gets_fresh_id() {
        let s = session();
        let original_id = s.rollback_id;
        let adopted = s.adopted(PathBuf::from("/tmp/rollbacks/imported"));
        assert_ne!(adopted.rollback_id, original_id);
        assert_eq!(adopted.session_dir, PathBuf::from("/tmp/rollbacks/imported"));
    }

    #[test]
    fn test_backup_path_containment() {
        let dir = Path::new("/tmp/rollbacks/abc");
        assert!(backup_path_is_contained(dir, Path::new("/tmp/rollbacks/abc/1.txt")));
        assert!(!backup_path_is_contained(dir, Path::new("/tmp/other/1.txt")));
    }
}
