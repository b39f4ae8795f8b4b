// /////////////////////////////////////////////////////////////////////////////
// Textforge
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Scratch Space Port
//!
//! The capability through which engines obtain temp files and directories.
//! The implementation owns a private scratch root; a path is "temp" iff it
//! lies under that root *and* appears in the manager's index.
//!
//! Failure contract: deletion errors are logged and counted by the
//! implementation, never propagated; deleting a missing file is silent
//! success.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::EngineError;
use crate::value_objects::operation_id::OperationId;

/// Index statistics for the scratch space.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ScratchStats {
    /// Tracked temp files
    pub tracked_files: u64,
    /// Tracked temp directories
    pub tracked_dirs: u64,
    /// Deletion errors swallowed so far
    pub delete_errors: u64,
    /// Entries reclaimed by sweeps so far
    pub swept_entries: u64,
}

/// Capability port for temp-file lifecycle management.
#[async_trait]
pub trait ScratchSpace: Send + Sync {
    /// Creates and registers a temp file; returns its path.
    async fn create_file(
        &self,
        prefix: Option<&str>,
        extension: Option<&str>,
        operation_id: Option<OperationId>,
    ) -> Result<PathBuf, EngineError>;

    /// Creates and registers a temp directory; returns its path.
    async fn create_dir(&self, prefix: Option<&str>, operation_id: Option<OperationId>)
        -> Result<PathBuf, EngineError>;

    /// Reserves and registers a path without creating anything on disk.
    fn path_for(&self, prefix: Option<&str>, extension: Option<&str>, operation_id: Option<OperationId>) -> PathBuf;

    /// Registers an externally created path for tracked cleanup.
    fn register(&self, path: &Path, operation_id: Option<OperationId>);

    /// Lists paths registered against an operation.
    fn list_for(&self, operation_id: OperationId) -> Vec<PathBuf>;

    /// Deletes one tracked path. Missing files are silent success; errors
    /// are swallowed and counted. Returns whether the path was tracked.
    async fn delete(&self, path: &Path) -> bool;

    /// Deletes everything registered against an operation; returns count.
    async fn cleanup_operation(&self, operation_id: OperationId) -> usize;

    /// Deletes entries older than `age`; `Duration::ZERO` sweeps all.
    async fn cleanup_older_than(&self, age: Duration) -> usize;

    /// Whether a path is tracked temp space.
    fn is_temp(&self, path: &Path) -> bool;

    /// Index statistics.
    fn stats(&self) -> ScratchStats;

    /// Total bytes currently occupied by tracked files.
    async fn total_size(&self) -> u64;
}
