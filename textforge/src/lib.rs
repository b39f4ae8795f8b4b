// /////////////////////////////////////////////////////////////////////////////
// Textforge
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

// Production code safety enforced via CI and `make lint-strict`
// (lib/bins checked separately from tests - tests may use unwrap/expect)

//! # Textforge
//!
//! Parallel bulk-editing and resumable streaming file-processing engines
//! with durable, checksum-verified rollback. This crate hosts the
//! application services and the infrastructure behind them; the pure
//! domain model lives in `textforge-domain`.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Application Layer                          │
//! │  BulkEditEngine · StreamingProcessor · OperationManager     │
//! └─────────────────────────────────────────────────────────────┘
//!                                │ capability ports
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Domain Layer                             │
//! │  Edit Model · Sessions · Checkpoints · Progress · Ports     │
//! └─────────────────────────────────────────────────────────────┘
//!                                ▲ implemented by
//! ┌─────────────────────────────────────────────────────────────┐
//! │                Infrastructure Layer                         │
//! │  RollbackStore · TempFileManager · ProgressTracker          │
//! │  PatternResolver · Processors · ResourceGovernor · Config   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Core Concepts
//!
//! ### Bulk Edits
//! Regex replace, condition-guarded edits, pattern refactors, and ordered
//! multi-operation composites fan out per file under a bounded dispatch
//! width. When backups are requested, the entire resolved set is
//! snapshotted once - SHA-256-verified - before the first write, and the
//! summary carries the rollback id.
//!
//! ### Streaming
//! Files are processed as ordered chunks through pluggable processors
//! (line, regex, CSV, binary), with progress tracking, periodic durable
//! checkpoints, pause/resume/cancel, and byte-identical replay from any
//! checkpoint for deterministic processors.
//!
//! ### Rollback
//! Sessions live under a private root, one directory per session, with a
//! canonical JSON metadata document. Restore re-verifies every backup
//! checksum before copying anything back.
//!
//! ## Wiring Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use textforge::application::services::BulkEditEngine;
//! use textforge::infrastructure::config::EngineConfig;
//! use textforge::infrastructure::repositories::FilesystemRollbackStore;
//! use textforge::infrastructure::runtime::ResourceGovernor;
//! use textforge::infrastructure::services::{PatternResolver, ProgressTracker, TempFileManager};
//!
//! # async fn wire() -> Result<(), textforge_domain::EngineError> {
//! let config = EngineConfig::default();
//! let governor = Arc::new(ResourceGovernor::default());
//! let scratch = Arc::new(TempFileManager::new(config.scratch_root())?);
//! let progress = Arc::new(ProgressTracker::new());
//! let resolver = Arc::new(PatternResolver::new());
//! let store = Arc::new(FilesystemRollbackStore::from_config(&config).await?);
//!
//! let engine = BulkEditEngine::new(store, progress, resolver, scratch, governor);
//! # let _ = engine;
//! # Ok(())
//! # }
//! ```

pub mod application;
pub mod infrastructure;

// Re-export the engine surface
pub use application::services::{BulkEditEngine, PipelineControl, StreamOperationManager, StreamingProcessor};
pub use infrastructure::config::EngineConfig;
pub use infrastructure::repositories::FilesystemRollbackStore;
pub use infrastructure::runtime::ResourceGovernor;
pub use infrastructure::services::{PatternResolver, ProgressTracker, TempFileManager};
