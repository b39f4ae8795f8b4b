// /////////////////////////////////////////////////////////////////////////////
// Textforge
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Stream Chunk Value Object
//!
//! This module provides the immutable unit of work for the streaming
//! pipeline: a bounded, contiguous byte range of a file together with its
//! position metadata.
//!
//! ## Overview
//!
//! Chunks enable:
//!
//! - **Bounded memory**: Files are processed without being loaded whole
//! - **Strict ordering**: Within one file, chunks are processed in file
//!   order; `index` and `position` make that order explicit
//! - **Checkpointing**: A checkpoint records the position after the last
//!   durable chunk; replay resumes from exactly that byte
//! - **Granular accounting**: Progress is updated per chunk
//!
//! ## Immutability
//!
//! `StreamChunk` is a value object: processors never mutate a chunk in
//! place, they produce output bytes for the sink. The `with_data` builder
//! exists for tests and adapters that need a structurally identical chunk
//! with different payload.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::EngineError;

/// A bounded contiguous byte range of a file, processed as one unit.
///
/// Invariants:
/// - `position` is the byte offset of `data[0]` in the source file
/// - `index` is the 0-based ordinal of this chunk within the file
/// - only the final chunk of a file may be empty
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamChunk {
    index: u64,
    position: u64,
    data: Vec<u8>,
    is_last: bool,
    metadata: HashMap<String, String>,
}

impl StreamChunk {
    /// Creates a new chunk.
    ///
    /// # Errors
    /// Returns `EngineError::InvalidRequest` when `data` is empty and the
    /// chunk is not marked as the last of its file.
    pub fn new(index: u64, position: u64, data: Vec<u8>, is_last: bool) -> Result<Self, EngineError> {
        if data.is_empty() && !is_last {
            return Err(EngineError::InvalidRequest(
                "Only the final chunk of a file may be empty".to_string(),
            ));
        }

        Ok(Self {
            index,
            position,
            data,
            is_last,
            metadata: HashMap::new(),
        })
    }

    /// Gets the 0-based chunk ordinal within the file
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Gets the byte offset of this chunk in the source file
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Gets the chunk payload
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Gets the payload length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Checks whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Checks whether this is the final chunk of its file
    pub fn is_last(&self) -> bool {
        self.is_last
    }

    /// Gets the chunk metadata map
    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    /// Returns a new chunk with the given payload, preserving position
    /// metadata. Used by adapters that re-wrap processed bytes.
    pub fn with_data(&self, data: Vec<u8>) -> Result<Self, EngineError> {
        if data.is_empty() && !self.is_last {
            return Err(EngineError::InvalidRequest(
                "Only the final chunk of a file may be empty".to_string(),
            ));
        }
        Ok(Self {
            index: self.index,
            position: self.position,
            data,
            is_last: self.is_last,
            metadata: self.metadata.clone(),
        })
    }

    /// Returns a new chunk with an extra metadata entry
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Byte offset of the first byte *after* this chunk.
    ///
    /// A checkpoint taken after this chunk records this value as its
    /// position, which by construction lies on a chunk boundary.
    pub fn end_position(&self) -> u64 {
        self.position + self.data.len() as u64
    }

    /// SHA-256 checksum of the payload, hex-encoded
    pub fn sha256_hex(&self) -> String {
        crate::services::checksum::sha256_hex(&self.data)
    }
}
