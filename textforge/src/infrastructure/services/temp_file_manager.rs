// /////////////////////////////////////////////////////////////////////////////
// Textforge
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Temp-File Manager
//!
//! Owns the engines' private scratch directory and the lifecycle of every
//! file inside it: creation, per-operation grouping, explicit release, and
//! the age-based background sweep.
//!
//! ## Naming
//!
//! Paths are allocated as `<prefix>_<random-128-bit-hex>.<ext>` under the
//! scratch root. The 128-bit random component makes collisions impossible
//! within any practical lifetime, so allocation never probes for free
//! names.
//!
//! ## Ownership
//!
//! The scratch root is owned exclusively by this manager. A path is "temp"
//! iff it is prefix-contained by the root *and* present in the index;
//! foreign files under the root are never touched by sweeps.
//!
//! ## Failure Contract
//!
//! Deletion errors are logged and counted, never propagated. Deleting a
//! path whose file is already gone is silent success.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use textforge_bootstrap::shutdown::CancellationToken;
use textforge_domain::{EngineError, OperationId, ScratchSpace, ScratchStats};

/// One tracked scratch entry.
#[derive(Debug, Clone)]
struct TempEntry {
    operation_id: Option<OperationId>,
    created_at: DateTime<Utc>,
    is_dir: bool,
}

/// Filesystem-backed scratch space with a background age sweeper.
pub struct TempFileManager {
    root: PathBuf,
    index: RwLock<HashMap<PathBuf, TempEntry>>,
    delete_errors: AtomicU64,
    swept_entries: AtomicU64,
}

impl TempFileManager {
    /// Creates the manager, ensuring the scratch root exists.
    pub fn new(root: PathBuf) -> Result<Self, EngineError> {
        std::fs::create_dir_all(&root)
            .map_err(|e| EngineError::IoError(format!("Failed to create scratch root {}: {}", root.display(), e)))?;
        Ok(Self {
            root,
            index: RwLock::new(HashMap::new()),
            delete_errors: AtomicU64::new(0),
            swept_entries: AtomicU64::new(0),
        })
    }

    /// The scratch root this manager owns
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Allocates a collision-free path under the root.
    fn allocate_name(&self, prefix: Option<&str>, extension: Option<&str>) -> PathBuf {
        let prefix = prefix.unwrap_or("tmp");
        let random: u128 = rand::random();
        let name = match extension {
            Some(ext) => format!("{}_{:032x}.{}", prefix, random, ext.trim_start_matches('.')),
            None => format!("{}_{:032x}", prefix, random),
        };
        self.root.join(name)
    }

    fn track(&self, path: PathBuf, operation_id: Option<OperationId>, is_dir: bool) {
        self.index.write().insert(
            path,
            TempEntry {
                operation_id,
                created_at: Utc::now(),
                is_dir,
            },
        );
    }

    /// Removes one path from disk, honoring the failure contract. The
    /// index entry is dropped either way so failed deletes cannot pin the
    /// index forever.
    async fn remove_from_disk(&self, path: &Path, is_dir: bool) {
        let result = if is_dir {
            tokio::fs::remove_dir_all(path).await
        } else {
            tokio::fs::remove_file(path).await
        };
        match result {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                self.delete_errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Failed to delete temp path {}: {}", path.display(), e);
            }
        }
    }

    /// Spawns the background sweeper.
    ///
    /// Runs every `interval`, reclaiming entries older than `max_age`. On
    /// cancellation it force-sweeps with age `ZERO` (the shutdown path) and
    /// exits.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        max_age: Duration,
        token: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately; skip it
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let swept = manager.cleanup_older_than(max_age).await;
                        if swept > 0 {
                            tracing::debug!("Temp sweeper reclaimed {} entries", swept);
                        }
                    }
                    _ = token.cancelled() => {
                        let swept = manager.cleanup_older_than(Duration::ZERO).await;
                        tracing::info!("Temp sweeper shutting down, force-swept {} entries", swept);
                        break;
                    }
                }
            }
        })
    }
}

#[async_trait]
impl ScratchSpace for TempFileManager {
    async fn create_file(
        &self,
        prefix: Option<&str>,
        extension: Option<&str>,
        operation_id: Option<OperationId>,
    ) -> Result<PathBuf, EngineError> {
        let path = self.allocate_name(prefix, extension);
        tokio::fs::File::create(&path)
            .await
            .map_err(|e| EngineError::IoError(format!("Failed to create temp file {}: {}", path.display(), e)))?;
        self.track(path.clone(), operation_id, false);
        Ok(path)
    }

    async fn create_dir(
        &self,
        prefix: Option<&str>,
        operation_id: Option<OperationId>,
    ) -> Result<PathBuf, EngineError> {
        let path = self.allocate_name(prefix, None);
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|e| EngineError::IoError(format!("Failed to create temp dir {}: {}", path.display(), e)))?;
        self.track(path.clone(), operation_id, true);
        Ok(path)
    }

    fn path_for(&self, prefix: Option<&str>, extension: Option<&str>, operation_id: Option<OperationId>) -> PathBuf {
        let path = self.allocate_name(prefix, extension);
        self.track(path.clone(), operation_id, false);
        path
    }

    fn register(&self, path: &Path, operation_id: Option<OperationId>) {
        let is_dir = path.is_dir();
        self.track(path.to_path_buf(), operation_id, is_dir);
    }

    fn list_for(&self, operation_id: OperationId) -> Vec<PathBuf> {
        self.index
            .read()
            .iter()
            .filter(|(_, entry)| entry.operation_id == Some(operation_id))
            .map(|(path, _)| path.clone())
            .collect()
    }

    async fn delete(&self, path: &Path) -> bool {
        let entry = self.index.write().remove(path);
        match entry {
            Some(entry) => {
                self.remove_from_disk(path, entry.is_dir).await;
                true
            }
            None => false,
        }
    }

    async fn cleanup_operation(&self, operation_id: OperationId) -> usize {
        let victims: Vec<(PathBuf, TempEntry)> = {
            let mut index = self.index.write();
            let paths: Vec<PathBuf> = index
                .iter()
                .filter(|(_, entry)| entry.operation_id == Some(operation_id))
                .map(|(path, _)| path.clone())
                .collect();
            paths
                .into_iter()
                .filter_map(|p| index.remove(&p).map(|e| (p, e)))
                .collect()
        };

        for (path, entry) in &victims {
            self.remove_from_disk(path, entry.is_dir).await;
        }
        self.swept_entries.fetch_add(victims.len() as u64, Ordering::Relaxed);
        victims.len()
    }

    async fn cleanup_older_than(&self, age: Duration) -> usize {
        let cutoff = Utc::now() - chrono::Duration::from_std(age).unwrap_or_else(|_| chrono::Duration::zero());
        let victims: Vec<(PathBuf, TempEntry)> = {
            let mut index = self.index.write();
            let paths: Vec<PathBuf> = index
                .iter()
                .filter(|(_, entry)| entry.created_at <= cutoff)
                .map(|(path, _)| path.clone())
                .collect();
            paths
                .into_iter()
                .filter_map(|p| index.remove(&p).map(|e| (p, e)))
                .collect()
        };

        for (path, entry) in &victims {
            self.remove_from_disk(path, entry.is_dir).await;
        }
        self.swept_entries.fetch_add(victims.len() as u64, Ordering::Relaxed);
        victims.len()
    }

    fn is_temp(&self, path: &Path) -> bool {
        path.starts_with(&self.root) && self.index.read().contains_key(path)
    }

    fn stats(&self) -> ScratchStats {
        let index = self.index.read();
        let tracked_dirs = index.values().filter(|e| e.is_dir).count() as u64;
        ScratchStats {
            tracked_files: index.len() as u64 - tracked_dirs,
            tracked_dirs,
            delete_errors: self.delete_errors.load(Ordering::Relaxed),
            swept_entries: self.swept_entries.load(Ordering::Relaxed),
        }
    }

    async fn total_size(&self) -> u64 {
        let paths: Vec<PathBuf> = self.index.read().keys().cloned().collect();
        let mut total = 0u64;
        for path in paths {
            if let Ok(metadata) = tokio::fs::metadata(&path).await {
                if metadata.is_file() {
                    total += metadata.len();
                }
            }
        }
        total
    }
}
