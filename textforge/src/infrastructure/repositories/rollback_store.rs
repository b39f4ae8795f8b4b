// /////////////////////////////////////////////////////////////////////////////
// Textforge
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Filesystem Rollback Store
//!
//! Durable, checksum-verified snapshots with write-then-verify semantics.
//! No transactional filesystem is assumed: every backup copy is re-read
//! and re-hashed after writing, and a session only becomes restorable once
//! its metadata document lands in the session directory.
//!
//! ## On-Disk Layout
//!
//! ```text
//! <root>/<rollback_id>/
//!   rollback-metadata.json
//!   <uuid>.<ext>      one per backed-up file
//! ```
//!
//! ## Concurrency
//!
//! Snapshot copies run under a global copy semaphore (default 10); restore
//! parallelism is bounded by processor count. The in-memory index is a
//! `RwLock<HashMap>` held only for map access, never across I/O.
//!
//! ## Failure Model
//!
//! Transient I/O errors during a copy are retried (3 attempts, 100ms x
//! attempt backoff). A checksum mismatch after copy is an integrity
//! failure - no retry, the file is reported failed and the session
//! continues with the others. The same rule applies at restore time.

use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Semaphore;
use uuid::Uuid;

use async_trait::async_trait;
use textforge_domain::services::checksum::StreamingChecksum;
use textforge_domain::{
    EngineError, FileIntegrity, FileIntegrityStatus, FileSnapshot, IntegrityReport, OperationId, OperationKind,
    RestoreReport, RollbackId, RollbackSession, SnapshotOutcome, SnapshotStore, StoreStats, ROLLBACK_METADATA_FILE,
};

use crate::infrastructure::config::EngineConfig;

/// Buffer size for streaming copy-and-hash
const COPY_BUFFER: usize = 64 * 1024;

/// Base backoff between copy attempts
const RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// Filesystem-backed implementation of the snapshot capability.
pub struct FilesystemRollbackStore {
    root: PathBuf,
    retention: chrono::Duration,
    copy_retries: u32,
    copy_semaphore: Arc<Semaphore>,
    restore_width: usize,
    index: RwLock<HashMap<RollbackId, RollbackSession>>,
}

impl FilesystemRollbackStore {
    /// Opens the store, creating the root directory and scanning it for
    /// existing restorable sessions.
    pub async fn open(
        root: PathBuf,
        retention: chrono::Duration,
        snapshot_concurrency: usize,
        copy_retries: u32,
    ) -> Result<Self, EngineError> {
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| EngineError::IoError(format!("Failed to create rollback root {}: {}", root.display(), e)))?;

        let restore_width = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
        let store = Self {
            root,
            retention,
            copy_retries: copy_retries.max(1),
            copy_semaphore: Arc::new(Semaphore::new(snapshot_concurrency.max(1))),
            restore_width,
            index: RwLock::new(HashMap::new()),
        };
        store.scan_existing().await;
        Ok(store)
    }

    /// Opens the store with settings from the engine configuration.
    pub async fn from_config(config: &EngineConfig) -> Result<Self, EngineError> {
        Self::open(
            config.rollback_root(),
            config.retention(),
            config.snapshot_concurrency,
            config.copy_retries,
        )
        .await
    }

    /// Populates the index from session directories already on disk.
    async fn scan_existing(&self) {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Failed to scan rollback root {}: {}", self.root.display(), e);
                return;
            }
        };

        let mut loaded = 0usize;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let dir = entry.path();
            if !dir.is_dir() {
                continue;
            }
            match load_session(&dir).await {
                Ok(session) if session.is_restorable(Utc::now()) => {
                    self.index.write().insert(session.rollback_id, session);
                    loaded += 1;
                }
                Ok(_) => {
                    // Expired; left for cleanup_expired
                }
                Err(e) => {
                    tracing::warn!("Ignoring unreadable session dir {}: {}", dir.display(), e);
                }
            }
        }
        if loaded > 0 {
            tracing::info!("Rollback store loaded {} restorable sessions from {}", loaded, self.root.display());
        }
    }

    fn cached(&self, id: RollbackId) -> Option<RollbackSession> {
        self.index.read().get(&id).cloned()
    }

    /// Index lookup with a disk fallback for sessions written by an
    /// earlier process.
    async fn get_or_load(&self, id: RollbackId) -> Option<RollbackSession> {
        if let Some(session) = self.cached(id) {
            return Some(session);
        }
        let dir = self.root.join(id.to_string());
        match load_session(&dir).await {
            Ok(session) => {
                self.index.write().insert(session.rollback_id, session.clone());
                Some(session)
            }
            Err(_) => None,
        }
    }

    /// Streams one file into the session directory, hashing both sides.
    async fn copy_once(&self, source: &Path, destination: &Path) -> Result<(String, String, u64), EngineError> {
        let mut reader = tokio::fs::File::open(source)
            .await
            .map_err(|e| EngineError::IoError(format!("Failed to open {}: {}", source.display(), e)))?;
        let mut writer = tokio::fs::File::create(destination)
            .await
            .map_err(|e| EngineError::IoError(format!("Failed to create {}: {}", destination.display(), e)))?;

        let mut source_hash = StreamingChecksum::new();
        let mut buffer = vec![0u8; COPY_BUFFER];
        let mut copied = 0u64;
        loop {
            let n = reader
                .read(&mut buffer)
                .await
                .map_err(|e| EngineError::IoError(format!("Read failed for {}: {}", source.display(), e)))?;
            if n == 0 {
                break;
            }
            source_hash.update(&buffer[..n]);
            writer
                .write_all(&buffer[..n])
                .await
                .map_err(|e| EngineError::IoError(format!("Write failed for {}: {}", destination.display(), e)))?;
            copied += n as u64;
        }
        writer
            .flush()
            .await
            .map_err(|e| EngineError::IoError(format!("Flush failed for {}: {}", destination.display(), e)))?;
        drop(writer);

        // Write-then-verify: re-read the copy and hash what actually landed
        let backup_checksum = hash_file(destination).await?;
        Ok((source_hash.finalize(), backup_checksum, copied))
    }

    async fn copy_with_retry(&self, source: &Path, destination: &Path) -> Result<(String, String, u64), EngineError> {
        let mut attempt = 1u32;
        loop {
            match self.copy_once(source, destination).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_recoverable() && attempt < self.copy_retries => {
                    tracing::warn!(
                        "Snapshot copy attempt {}/{} for {} failed: {}",
                        attempt,
                        self.copy_retries,
                        source.display(),
                        e
                    );
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Snapshots one file into the session directory.
    async fn snapshot_one(&self, session_dir: &Path, file: &Path) -> Result<FileSnapshot, (PathBuf, String)> {
        let _permit = self
            .copy_semaphore
            .acquire()
            .await
            .map_err(|_| (file.to_path_buf(), "copy semaphore closed".to_string()))?;

        if !tokio::fs::try_exists(file).await.unwrap_or(false) {
            tracing::debug!("Snapshot target {} does not exist; recording as created", file.display());
            return Ok(FileSnapshot::absent(file.to_path_buf()));
        }

        let extension = file
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_default();
        let backup_path = session_dir.join(format!("{}{}", Uuid::new_v4(), extension));

        let (source_checksum, backup_checksum, size) = self
            .copy_with_retry(file, &backup_path)
            .await
            .map_err(|e| (file.to_path_buf(), e.to_string()))?;

        if source_checksum != backup_checksum {
            let _ = tokio::fs::remove_file(&backup_path).await;
            return Err((
                file.to_path_buf(),
                format!(
                    "integrity mismatch after copy: source {} backup {}",
                    source_checksum, backup_checksum
                ),
            ));
        }

        Ok(FileSnapshot::backed_up(
            file.to_path_buf(),
            backup_path,
            source_checksum,
            size,
        ))
    }

    /// Restores one snapshot record to its original location.
    async fn restore_one(snapshot: &FileSnapshot) -> Result<(), String> {
        if snapshot.was_created {
            // The file did not exist before the operation; restore deletes it
            match tokio::fs::remove_file(&snapshot.original_path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(format!("failed to remove created file: {}", e)),
            }
        } else {
            if !tokio::fs::try_exists(&snapshot.backup_path).await.unwrap_or(false) {
                return Err("backup file missing".to_string());
            }
            let actual = hash_file(&snapshot.backup_path).await.map_err(|e| e.to_string())?;
            if actual != snapshot.backup_checksum {
                return Err(format!(
                    "backup integrity mismatch: stored {} actual {}",
                    snapshot.backup_checksum, actual
                ));
            }

            if let Some(parent) = snapshot.original_path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| format!("failed to create target dir: {}", e))?;
            }
            tokio::fs::copy(&snapshot.backup_path, &snapshot.original_path)
                .await
                .map_err(|e| format!("restore copy failed: {}", e))?;
            Ok(())
        }
    }

    async fn remove_session_dir(dir: &Path) {
        if let Err(e) = tokio::fs::remove_dir_all(dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to delete session dir {}: {}", dir.display(), e);
            }
        }
    }
}

/// Hashes a file's current content.
async fn hash_file(path: &Path) -> Result<String, EngineError> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| EngineError::IoError(format!("Failed to open {}: {}", path.display(), e)))?;
    let mut hash = StreamingChecksum::new();
    let mut buffer = vec![0u8; COPY_BUFFER];
    loop {
        let n = file
            .read(&mut buffer)
            .await
            .map_err(|e| EngineError::IoError(format!("Read failed for {}: {}", path.display(), e)))?;
        if n == 0 {
            break;
        }
        hash.update(&buffer[..n]);
    }
    Ok(hash.finalize())
}

/// Loads and parses a session's metadata document.
async fn load_session(dir: &Path) -> Result<RollbackSession, EngineError> {
    let metadata_path = dir.join(ROLLBACK_METADATA_FILE);
    let bytes = tokio::fs::read(&metadata_path)
        .await
        .map_err(|e| EngineError::IoError(format!("Failed to read {}: {}", metadata_path.display(), e)))?;
    let session: RollbackSession = serde_json::from_slice(&bytes)?;
    Ok(session)
}

/// Writes a session's metadata document; the session becomes restorable
/// at this moment.
async fn write_metadata(session: &RollbackSession) -> Result<(), EngineError> {
    let bytes = serde_json::to_vec_pretty(session)?;
    tokio::fs::write(session.metadata_path(), bytes)
        .await
        .map_err(|e| EngineError::IoError(format!("Failed to write session metadata: {}", e)))?;
    Ok(())
}

#[async_trait]
impl SnapshotStore for FilesystemRollbackStore {
    async fn create_session(
        &self,
        operation_id: OperationId,
        kind: OperationKind,
        files: &[PathBuf],
    ) -> Result<SnapshotOutcome, EngineError> {
        let mut session =
            RollbackSession::with_retention(operation_id, kind, PathBuf::new(), self.retention);
        session.session_dir = self.root.join(session.rollback_id.to_string());

        tokio::fs::create_dir_all(&session.session_dir).await.map_err(|e| {
            EngineError::IoError(format!(
                "Failed to create session dir {}: {}",
                session.session_dir.display(),
                e
            ))
        })?;

        let session_dir = session.session_dir.clone();
        let attempts = futures::future::join_all(files.iter().map(|file| self.snapshot_one(&session_dir, file))).await;

        let mut failures = Vec::new();
        for attempt in attempts {
            match attempt {
                Ok(snapshot) => session.push_snapshot(snapshot),
                Err(failure) => failures.push(failure),
            }
        }

        write_metadata(&session).await?;
        self.index.write().insert(session.rollback_id, session.clone());

        tracing::info!(
            "Created rollback session {} for {} ({} backed up, {} failed, {} bytes)",
            session.rollback_id,
            kind,
            session.backed_up_count(),
            failures.len(),
            session.total_size
        );
        Ok(SnapshotOutcome { session, failures })
    }

    async fn restore(&self, id: RollbackId) -> Result<RestoreReport, EngineError> {
        let session = self
            .get_or_load(id)
            .await
            .ok_or_else(|| EngineError::RollbackNotFound(id.to_string()))?;
        if !session.is_restorable(Utc::now()) {
            return Err(EngineError::RollbackNotFound(format!("{} has expired", id)));
        }

        let width = Arc::new(Semaphore::new(self.restore_width));
        let attempts = futures::future::join_all(session.files.iter().map(|snapshot| {
            let width = Arc::clone(&width);
            async move {
                let _permit = width.acquire().await;
                (snapshot, Self::restore_one(snapshot).await)
            }
        }))
        .await;

        let mut restored = 0u64;
        let mut failed = Vec::new();
        for (snapshot, outcome) in attempts {
            match outcome {
                Ok(()) => restored += 1,
                Err(reason) => failed.push((snapshot.original_path.clone(), reason)),
            }
        }

        let success = failed.is_empty();
        if success {
            // Best-effort asynchronous deletion; the session may stay
            // visible in listings briefly
            let dir = session.session_dir.clone();
            self.index.write().remove(&id);
            tokio::spawn(async move {
                Self::remove_session_dir(&dir).await;
            });
            tracing::info!("Rollback {} restored {} files, session deleted", id, restored);
        } else {
            tracing::warn!("Rollback {} restored {} files with {} failures", id, restored, failed.len());
        }

        Ok(RestoreReport {
            rollback_id: id,
            restored,
            failed,
            success,
        })
    }

    async fn verify(&self, id: RollbackId) -> Result<IntegrityReport, EngineError> {
        let session = self
            .get_or_load(id)
            .await
            .ok_or_else(|| EngineError::RollbackNotFound(id.to_string()))?;

        let mut per_file = Vec::with_capacity(session.files.len());
        let (mut verified, mut corrupted, mut missing) = (0u64, 0u64, 0u64);

        for snapshot in &session.files {
            let status = if !snapshot.has_backup() {
                // Nothing on disk to verify for a was_created record
                FileIntegrityStatus::Verified
            } else if !tokio::fs::try_exists(&snapshot.backup_path).await.unwrap_or(false) {
                FileIntegrityStatus::Missing
            } else {
                match hash_file(&snapshot.backup_path).await {
                    Ok(actual) if actual == snapshot.backup_checksum => FileIntegrityStatus::Verified,
                    Ok(_) => FileIntegrityStatus::Corrupted,
                    Err(_) => FileIntegrityStatus::Missing,
                }
            };
            match status {
                FileIntegrityStatus::Verified => verified += 1,
                FileIntegrityStatus::Corrupted => corrupted += 1,
                FileIntegrityStatus::Missing => missing += 1,
            }
            per_file.push(FileIntegrity {
                original_path: snapshot.original_path.clone(),
                status,
            });
        }

        Ok(IntegrityReport {
            rollback_id: id,
            verified,
            corrupted,
            missing,
            success: corrupted == 0 && missing == 0,
            per_file,
        })
    }

    async fn get(&self, id: RollbackId) -> Option<RollbackSession> {
        self.get_or_load(id).await
    }

    async fn list(&self) -> Vec<RollbackSession> {
        let now = Utc::now();
        self.index
            .read()
            .values()
            .filter(|s| s.is_restorable(now))
            .cloned()
            .collect()
    }

    async fn history(&self, limit: usize) -> Vec<RollbackSession> {
        let mut sessions: Vec<RollbackSession> = self.index.read().values().cloned().collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        sessions.truncate(limit);
        sessions
    }

    async fn delete(&self, id: RollbackId) -> Result<bool, EngineError> {
        let session = self.index.write().remove(&id);
        let dir = match session {
            Some(session) => session.session_dir,
            None => {
                let dir = self.root.join(id.to_string());
                if !tokio::fs::try_exists(&dir).await.unwrap_or(false) {
                    return Ok(false);
                }
                dir
            }
        };
        Self::remove_session_dir(&dir).await;
        Ok(true)
    }

    async fn cleanup_expired(&self) -> Result<usize, EngineError> {
        let now = Utc::now();
        let mut removed = 0usize;

        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| EngineError::IoError(format!("Failed to read rollback root: {}", e)))?;

        while let Ok(Some(entry)) = entries.next_entry().await {
            let dir = entry.path();
            if !dir.is_dir() {
                continue;
            }
            let expired_session = match load_session(&dir).await {
                Ok(session) if session.is_expired(now) => Some(session.rollback_id),
                Ok(_) => None,
                Err(e) => {
                    // No parseable metadata document: not restorable
                    tracing::warn!("Removing non-restorable session dir {}: {}", dir.display(), e);
                    Self::remove_session_dir(&dir).await;
                    removed += 1;
                    None
                }
            };
            if let Some(id) = expired_session {
                self.index.write().remove(&id);
                Self::remove_session_dir(&dir).await;
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::info!("Expired-session cleanup removed {} sessions", removed);
        }
        Ok(removed)
    }

    async fn export(&self, id: RollbackId, destination: &Path) -> Result<(), EngineError> {
        let session = self
            .get_or_load(id)
            .await
            .ok_or_else(|| EngineError::RollbackNotFound(id.to_string()))?;

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| EngineError::IoError(format!("Failed to create export dir: {}", e)))?;
        }
        tokio::fs::copy(session.metadata_path(), destination)
            .await
            .map_err(|e| EngineError::IoError(format!("Export copy failed: {}", e)))?;
        Ok(())
    }

    async fn import(&self, source: &Path) -> Result<RollbackSession, EngineError> {
        let bytes = tokio::fs::read(source)
            .await
            .map_err(|e| EngineError::IoError(format!("Failed to read {}: {}", source.display(), e)))?;
        let original: RollbackSession = serde_json::from_slice(&bytes)?;

        // Fresh identity; backup files stay where the document points
        let mut session = original.adopted(PathBuf::new());
        session.session_dir = self.root.join(session.rollback_id.to_string());

        tokio::fs::create_dir_all(&session.session_dir)
            .await
            .map_err(|e| EngineError::IoError(format!("Failed to create imported session dir: {}", e)))?;
        write_metadata(&session).await?;

        self.index.write().insert(session.rollback_id, session.clone());
        tracing::info!("Imported rollback session {} from {}", session.rollback_id, source.display());
        Ok(session)
    }

    async fn stats(&self) -> StoreStats {
        let index = self.index.read();
        StoreStats {
            sessions: index.len() as u64,
            files: index.values().map(|s| s.files.len() as u64).sum(),
            total_bytes: index.values().map(|s| s.total_size).sum(),
        }
    }
}
