// /////////////////////////////////////////////////////////////////////////////
// Textforge
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Chunk Processor Port
//!
//! The pluggable transformation seam of the streaming pipeline. A chunk
//! processor is a synchronous, CPU-bound function from `(chunk, options)`
//! to processed bytes; the pipeline owns all I/O, ordering, and
//! checkpointing around it.
//!
//! ## Contract
//!
//! - `validate_options` is called once, before any dispatch; a request with
//!   invalid options fails up front and no file is touched
//! - `process` must be deterministic in `(chunk bytes, chunk position,
//!   options)` for checkpoint resume to reproduce identical output
//! - Processors never perform I/O and never block on locks
//!
//! ## Kinds
//!
//! The processor set is a closed enum ([`ProcessorKind`]): line, regex,
//! CSV, and binary. Dispatch is by exhaustive match over the registry; an
//! unknown kind is a request error, not a fallback.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::EngineError;
use crate::value_objects::stream_chunk::StreamChunk;

/// Enumerated chunk processor kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorKind {
    /// Line-oriented text transforms (case, trim)
    Line,
    /// Regex search and replace over chunk text
    Regex,
    /// Delimiter-separated value rewriting
    Csv,
    /// Byte-level passthrough with accounting
    Binary,
}

impl ProcessorKind {
    /// All processor kinds, in registry order
    pub fn all() -> [ProcessorKind; 4] {
        [ProcessorKind::Line, ProcessorKind::Regex, ProcessorKind::Csv, ProcessorKind::Binary]
    }
}

impl std::fmt::Display for ProcessorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ProcessorKind::Line => "line",
            ProcessorKind::Regex => "regex",
            ProcessorKind::Csv => "csv",
            ProcessorKind::Binary => "binary",
        };
        write!(f, "{}", label)
    }
}

impl FromStr for ProcessorKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "line" => Ok(ProcessorKind::Line),
            "regex" => Ok(ProcessorKind::Regex),
            "csv" => Ok(ProcessorKind::Csv),
            "binary" => Ok(ProcessorKind::Binary),
            other => Err(EngineError::InvalidRequest(format!(
                "Unknown processor type '{}'. Available: line, regex, csv, binary",
                other
            ))),
        }
    }
}

/// Output of one processor invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedChunk {
    /// Bytes to write to the sink
    pub data: Vec<u8>,
    /// Complete lines observed in this chunk
    pub lines: u64,
    /// Processor-defined items observed (records, matches)
    pub items: u64,
}

impl ProcessedChunk {
    /// Wraps output bytes with zero counters
    pub fn passthrough(data: Vec<u8>) -> Self {
        Self {
            data,
            lines: 0,
            items: 0,
        }
    }
}

/// Registry metadata describing one processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorInfo {
    /// The processor kind
    pub kind: ProcessorKind,
    /// One-line description
    pub description: String,
    /// Summary of the accepted options object
    pub options_summary: String,
    /// Heuristic throughput in bytes per second, used by estimation
    pub rate_bps: u64,
}

/// A pluggable chunk transformation.
///
/// Implementations are stateless between chunks: everything a resumed run
/// needs must be derivable from `(chunk, options)`.
pub trait ChunkProcessor: Send + Sync {
    /// The kind this processor implements
    fn kind(&self) -> ProcessorKind;

    /// Validates the request's options object.
    ///
    /// # Errors
    /// Returns `EngineError::ValidationError` describing the first problem
    /// found. Called before any dispatch.
    fn validate_options(&self, options: &serde_json::Value) -> Result<(), EngineError>;

    /// Transforms one chunk.
    ///
    /// # Errors
    /// Returns `EngineError::ProcessingFailed` on unprocessable input.
    fn process(&self, chunk: &StreamChunk, options: &serde_json::Value) -> Result<ProcessedChunk, EngineError>;

    /// Registry metadata (description, options summary, rate heuristic)
    fn info(&self) -> ProcessorInfo;
}
