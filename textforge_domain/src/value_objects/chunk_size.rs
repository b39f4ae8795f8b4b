// /////////////////////////////////////////////////////////////////////////////
// Textforge
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Chunk Size Value Object
//!
//! Type-safe representation of the chunk size used by the streaming
//! pipeline. The chunk size bounds memory usage per in-flight chunk and is
//! part of a processor's determinism contract: resumed runs replay with the
//! same chunk size to produce byte-identical output.
//!
//! ## Validation Rules
//!
//! - Minimum: 64 bytes (smaller chunks make checkpoint overhead dominate)
//! - Maximum: 256 MiB (bounds per-chunk memory)
//! - Default: 64 KiB, the pipeline's standard read size

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Validated chunk size for streaming reads.
///
/// Construction enforces the domain bounds, so a `ChunkSize` in hand is
/// always usable by the pipeline without further checking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkSize {
    bytes: usize,
}

impl ChunkSize {
    /// Minimum allowed chunk size in bytes
    pub const MIN_SIZE: usize = 64;

    /// Maximum allowed chunk size in bytes (256 MiB)
    pub const MAX_SIZE: usize = 256 * 1024 * 1024;

    /// Default chunk size in bytes (64 KiB)
    pub const DEFAULT_SIZE: usize = 64 * 1024;

    /// Creates a new chunk size, validating the domain bounds.
    ///
    /// # Errors
    /// Returns `EngineError::InvalidConfiguration` when `bytes` falls
    /// outside `[MIN_SIZE, MAX_SIZE]`.
    pub fn new(bytes: usize) -> Result<Self, EngineError> {
        if bytes < Self::MIN_SIZE {
            return Err(EngineError::InvalidConfiguration(format!(
                "Chunk size {} is below minimum {}",
                bytes,
                Self::MIN_SIZE
            )));
        }
        if bytes > Self::MAX_SIZE {
            return Err(EngineError::InvalidConfiguration(format!(
                "Chunk size {} exceeds maximum {}",
                bytes,
                Self::MAX_SIZE
            )));
        }
        Ok(Self { bytes })
    }

    /// Creates a chunk size from kibibytes
    pub fn from_kib(kib: usize) -> Result<Self, EngineError> {
        Self::new(kib * 1024)
    }

    /// Creates a chunk size from mebibytes
    pub fn from_mib(mib: usize) -> Result<Self, EngineError> {
        Self::new(mib * 1024 * 1024)
    }

    /// Gets the size in bytes
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    /// Number of chunks needed to cover a file of `file_size` bytes
    pub fn chunks_needed(&self, file_size: u64) -> u64 {
        if file_size == 0 {
            return 0;
        }
        file_size.div_ceil(self.bytes as u64)
    }
}

impl Default for ChunkSize {
    fn default() -> Self {
        Self {
            bytes: Self::DEFAULT_SIZE,
        }
    }
}

impl std::fmt::Display for ChunkSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.bytes >= 1024 * 1024 {
            write!(f, "{:.1} MiB", (self.bytes as f64) / (1024.0 * 1024.0))
        } else if self.bytes >= 1024 {
            write!(f, "{:.1} KiB", (self.bytes as f64) / 1024.0)
        } else {
            write!(f, "{} B", self.bytes)
        }
    }
}
