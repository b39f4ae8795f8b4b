// /////////////////////////////////////////////////////////////////////////////
// Textforge
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Byte-level passthrough processor. Useful for bulk copy/compress flows
//! where the sink options (compression, output mapping) do the work and
//! the chunk itself is untouched.

use serde::Deserialize;

use textforge_domain::{ChunkProcessor, EngineError, ProcessedChunk, ProcessorInfo, ProcessorKind, StreamChunk};

const RATE_BPS: u64 = 400 * 1024 * 1024;

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct BinaryOptions {}

fn parse_options(options: &serde_json::Value) -> Result<BinaryOptions, EngineError> {
    if options.is_null() {
        return Ok(BinaryOptions::default());
    }
    serde_json::from_value(options.clone())
        .map_err(|e| EngineError::ValidationError(format!("Invalid binary processor options: {}", e)))
}

/// Passthrough chunk transformation with byte accounting.
#[derive(Debug, Default)]
pub struct BinaryProcessor;

impl BinaryProcessor {
    /// Creates the processor
    pub fn new() -> Self {
        Self
    }
}

impl ChunkProcessor for BinaryProcessor {
    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Binary
    }

    fn validate_options(&self, options: &serde_json::Value) -> Result<(), EngineError> {
        parse_options(options).map(|_| ())
    }

    fn process(&self, chunk: &StreamChunk, options: &serde_json::Value) -> Result<ProcessedChunk, EngineError> {
        parse_options(options)?;
        Ok(ProcessedChunk::passthrough(chunk.data().to_vec()))
    }

    fn info(&self) -> ProcessorInfo {
        ProcessorInfo {
            kind: ProcessorKind::Binary,
            description: "Byte-level passthrough with accounting".to_string(),
            options_summary: "{}".to_string(),
            rate_bps: RATE_BPS,
        }
    }
}
