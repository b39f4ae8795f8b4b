// /////////////////////////////////////////////////////////////////////////////
// Textforge
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Shared fixtures for the integration suite: a fully wired engine stack
//! rooted in a fresh temp directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use textforge::application::services::{BulkEditEngine, StreamOperationManager, StreamingProcessor};
use textforge::infrastructure::config::EngineConfig;
use textforge::infrastructure::repositories::FilesystemRollbackStore;
use textforge::infrastructure::runtime::ResourceGovernor;
use textforge::infrastructure::services::{PatternResolver, ProgressTracker, TempFileManager};
use textforge_domain::{PatternPort, ProgressPort, ScratchSpace, SnapshotStore};

/// A fully wired engine stack over a throwaway directory tree.
pub struct Harness {
    pub dir: TempDir,
    pub workspace: PathBuf,
    pub config: EngineConfig,
    pub store: Arc<FilesystemRollbackStore>,
    pub progress: Arc<ProgressTracker>,
    pub scratch: Arc<TempFileManager>,
    pub governor: Arc<ResourceGovernor>,
    pub engine: BulkEditEngine,
    pub processor: Arc<StreamingProcessor>,
    pub manager: Arc<StreamOperationManager>,
}

impl Harness {
    /// Builds a harness with default engine configuration.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Builds a harness after letting the caller adjust the configuration.
    pub async fn with_config(adjust: impl FnOnce(&mut EngineConfig)) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let workspace = dir.path().join("workspace");
        tokio::fs::create_dir_all(&workspace).await.expect("workspace");

        let mut config = EngineConfig {
            scratch_root: Some(dir.path().join("scratch")),
            rollback_root: Some(dir.path().join("rollbacks")),
            checkpoint_root: Some(dir.path().join("checkpoints")),
            ..Default::default()
        };
        adjust(&mut config);

        let governor = Arc::new(ResourceGovernor::default());
        let scratch = Arc::new(TempFileManager::new(config.scratch_root()).expect("scratch root"));
        let progress = Arc::new(ProgressTracker::new());
        let resolver = Arc::new(PatternResolver::new());
        let store = Arc::new(FilesystemRollbackStore::from_config(&config).await.expect("store"));

        let engine = BulkEditEngine::new(
            Arc::clone(&store) as Arc<dyn SnapshotStore>,
            Arc::clone(&progress) as Arc<dyn ProgressPort>,
            Arc::clone(&resolver) as Arc<dyn PatternPort>,
            Arc::clone(&scratch) as Arc<dyn ScratchSpace>,
            Arc::clone(&governor),
        );
        let processor = Arc::new(StreamingProcessor::new(
            Arc::clone(&progress) as Arc<dyn ProgressPort>,
            Arc::clone(&scratch) as Arc<dyn ScratchSpace>,
            Arc::clone(&resolver) as Arc<dyn PatternPort>,
            Arc::clone(&governor),
            &config,
        ));
        let manager = Arc::new(StreamOperationManager::new(
            Arc::clone(&processor),
            Arc::clone(&progress) as Arc<dyn ProgressPort>,
            Arc::clone(&scratch) as Arc<dyn ScratchSpace>,
            &governor,
        ));

        Self {
            dir,
            workspace,
            config,
            store,
            progress,
            scratch,
            governor,
            engine,
            processor,
            manager,
        }
    }

    /// Writes a file into the workspace and returns its path.
    pub async fn write_file(&self, name: &str, content: impl AsRef<[u8]>) -> PathBuf {
        let path = self.workspace.join(name);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.expect("parent dirs");
        }
        tokio::fs::write(&path, content.as_ref()).await.expect("write fixture");
        path
    }

    /// Reads a workspace file as bytes.
    pub async fn read_file(&self, path: &Path) -> Vec<u8> {
        tokio::fs::read(path).await.expect("read fixture")
    }
}

/// Path list as strings, the shape the engine surface accepts.
pub fn as_patterns(paths: &[PathBuf]) -> Vec<String> {
    paths.iter().map(|p| p.to_string_lossy().to_string()).collect()
}
