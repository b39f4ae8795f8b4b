// /////////////////////////////////////////////////////////////////////////////
// Textforge
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Engine Configuration
//!
//! Declarative configuration for the engines, loadable from TOML. Every
//! field has a default matching the engine constants, so an empty document
//! (or no document at all) yields a fully working configuration.
//!
//! ## Example
//!
//! ```toml
//! retention_days = 7
//! default_chunk_size = 65536
//! snapshot_concurrency = 10
//!
//! [sweep]
//! temp_interval_secs = 600
//! temp_max_age_secs = 7200
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use textforge_domain::{ChunkSize, EngineError};

/// Background sweep cadence and horizons.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SweepConfig {
    /// How often the temp-file sweeper runs
    pub temp_interval_secs: u64,
    /// Age beyond which swept temp entries are reclaimed
    pub temp_max_age_secs: u64,
    /// How often terminal progress records are aged out
    pub progress_interval_secs: u64,
    /// Age beyond which untouched progress records are removed
    pub progress_max_age_secs: u64,
    /// How often terminal stream operations are cleaned up
    pub operation_interval_secs: u64,
    /// Age beyond which terminal stream operations are removed
    pub operation_max_age_secs: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            temp_interval_secs: 600,       // every 10 minutes
            temp_max_age_secs: 2 * 3600,   // 2 hour horizon
            progress_interval_secs: 300,   // every 5 minutes
            progress_max_age_secs: 3600,
            operation_interval_secs: 600,  // every 10 minutes
            operation_max_age_secs: 2 * 3600,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Scratch root; `$TMP/textforge/streaming` when absent
    pub scratch_root: Option<PathBuf>,
    /// Rollback root; `$TMP/textforge/rollbacks` when absent
    pub rollback_root: Option<PathBuf>,
    /// Checkpoint root; `$TMP/textforge/checkpoints` when absent
    pub checkpoint_root: Option<PathBuf>,
    /// Rollback session retention in days
    pub retention_days: i64,
    /// Default streaming chunk size in bytes
    pub default_chunk_size: usize,
    /// Concurrent snapshot copies
    pub snapshot_concurrency: usize,
    /// Copy attempts on transient I/O errors
    pub copy_retries: u32,
    /// Chunks between automatic checkpoints
    pub checkpoint_interval_chunks: u64,
    /// Checkpoints retained per operation
    pub max_checkpoints: usize,
    /// Background sweep settings
    pub sweep: SweepConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scratch_root: None,
            rollback_root: None,
            checkpoint_root: None,
            retention_days: 7,
            default_chunk_size: ChunkSize::DEFAULT_SIZE,
            snapshot_concurrency: 10,
            copy_retries: 3,
            checkpoint_interval_chunks: 100,
            max_checkpoints: 10,
            sweep: SweepConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parses a configuration from a TOML document.
    pub fn from_toml_str(document: &str) -> Result<Self, EngineError> {
        let config: EngineConfig = toml::from_str(document)
            .map_err(|e| EngineError::InvalidConfiguration(format!("Failed to parse engine config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, EngineError> {
        let document = std::fs::read_to_string(path)
            .map_err(|e| EngineError::InvalidConfiguration(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&document)
    }

    /// Checks cross-field constraints.
    pub fn validate(&self) -> Result<(), EngineError> {
        ChunkSize::new(self.default_chunk_size)?;
        if self.retention_days < 0 {
            return Err(EngineError::InvalidConfiguration(
                "retention_days must not be negative".to_string(),
            ));
        }
        if self.snapshot_concurrency == 0 {
            return Err(EngineError::InvalidConfiguration(
                "snapshot_concurrency must be at least 1".to_string(),
            ));
        }
        if self.max_checkpoints == 0 {
            return Err(EngineError::InvalidConfiguration(
                "max_checkpoints must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Effective scratch root
    pub fn scratch_root(&self) -> PathBuf {
        self.scratch_root
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("textforge").join("streaming"))
    }

    /// Effective rollback root
    pub fn rollback_root(&self) -> PathBuf {
        self.rollback_root
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("textforge").join("rollbacks"))
    }

    /// Effective checkpoint root
    pub fn checkpoint_root(&self) -> PathBuf {
        self.checkpoint_root
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("textforge").join("checkpoints"))
    }

    /// Rollback retention as a chrono duration
    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.retention_days)
    }

    /// Default chunk size as a validated value object
    pub fn chunk_size(&self) -> ChunkSize {
        // Validated at load time; default is always in range
        ChunkSize::new(self.default_chunk_size).unwrap_or_default()
    }

    /// Temp sweep interval
    pub fn temp_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep.temp_interval_secs)
    }

    /// Temp sweep age horizon
    pub fn temp_max_age(&self) -> Duration {
        Duration::from_secs(self.sweep.temp_max_age_secs)
    }
}
