// /////////////////////////////////////////////////////////////////////////////
// Textforge
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Snapshot Store Port
//!
//! The capability through which the bulk-edit engine (and callers) talk to
//! the rollback store: create verified snapshots before mutating files,
//! restore or verify them later, and manage retention.
//!
//! The port is intentionally narrow - engines cannot reach the store's
//! filesystem layout, only sessions and reports - so tests substitute an
//! in-memory fake and the store implementation can evolve its on-disk
//! format independently.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::entities::edit_model::OperationKind;
use crate::entities::rollback_session::RollbackSession;
use crate::error::EngineError;
use crate::value_objects::operation_id::OperationId;
use crate::value_objects::rollback_id::RollbackId;

/// Outcome of creating one snapshot session.
///
/// Per-file copy and integrity failures never fail the call; they are
/// carried here so the engine can surface them as file-level errors while
/// the session itself stays usable for the files that did snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotOutcome {
    /// The session, containing records for every file that snapshotted
    pub session: RollbackSession,
    /// Files that could not be snapshotted, with reasons
    pub failures: Vec<(PathBuf, String)>,
}

/// Outcome of restoring one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreReport {
    /// The session that was restored
    pub rollback_id: RollbackId,
    /// Files restored to their snapshot state
    pub restored: u64,
    /// Files that could not be restored, with reasons
    pub failed: Vec<(PathBuf, String)>,
    /// Whether every file restored cleanly
    pub success: bool,
}

/// Integrity status of one backup file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FileIntegrityStatus {
    /// Backup present and checksum matches
    Verified,
    /// Backup present but checksum differs
    Corrupted,
    /// Backup file is gone
    Missing,
}

/// Per-file integrity result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileIntegrity {
    /// Original path the backup covers
    pub original_path: PathBuf,
    /// Verification outcome
    pub status: FileIntegrityStatus,
}

/// Aggregate integrity report for one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityReport {
    /// The session that was verified
    pub rollback_id: RollbackId,
    /// Count of verified backups
    pub verified: u64,
    /// Count of corrupted backups
    pub corrupted: u64,
    /// Count of missing backups
    pub missing: u64,
    /// Whether every backup verified
    pub success: bool,
    /// Per-file outcomes
    pub per_file: Vec<FileIntegrity>,
}

/// Disk-usage accounting across all sessions.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StoreStats {
    /// Number of live sessions
    pub sessions: u64,
    /// Number of snapshot records across sessions
    pub files: u64,
    /// Total backup bytes on disk
    pub total_bytes: u64,
}

/// Capability port for checksum-verified snapshots with durable metadata.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Snapshots a set of files into a new session.
    ///
    /// Missing files are recorded as `was_created`; per-file copy or
    /// integrity failures are carried in the outcome without failing the
    /// call. The session becomes restorable once its metadata document is
    /// written.
    async fn create_session(
        &self,
        operation_id: OperationId,
        kind: OperationKind,
        files: &[PathBuf],
    ) -> Result<SnapshotOutcome, EngineError>;

    /// Restores every snapshot of a session to its original path.
    async fn restore(&self, id: RollbackId) -> Result<RestoreReport, EngineError>;

    /// Recomputes backup checksums without touching originals.
    async fn verify(&self, id: RollbackId) -> Result<IntegrityReport, EngineError>;

    /// Looks up a session by id.
    async fn get(&self, id: RollbackId) -> Option<RollbackSession>;

    /// Lists restorable sessions.
    async fn list(&self) -> Vec<RollbackSession>;

    /// Lists recent sessions newest-first, including near-expiry ones.
    async fn history(&self, limit: usize) -> Vec<RollbackSession>;

    /// Deletes a session and its backing directory. Returns whether the
    /// session existed.
    async fn delete(&self, id: RollbackId) -> Result<bool, EngineError>;

    /// Removes expired sessions; returns how many were removed. Idempotent.
    async fn cleanup_expired(&self) -> Result<usize, EngineError>;

    /// Writes the session's metadata document to a caller-chosen path.
    async fn export(&self, id: RollbackId, destination: &Path) -> Result<(), EngineError>;

    /// Adopts a metadata document under a fresh id. Backup files are not
    /// copied; the imported session is restorable only while the original
    /// backup paths exist and match.
    async fn import(&self, source: &Path) -> Result<RollbackSession, EngineError>;

    /// Disk-usage accounting across all sessions.
    async fn stats(&self) -> StoreStats;
}
