// /////////////////////////////////////////////////////////////////////////////
// Textforge
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Streaming Requests and Results
//!
//! Request and result shapes for the streaming processor. Requests are
//! plain serializable data: the operation manager persists them inside the
//! stream operation entity, and resuming a job replays the original
//! request against a checkpoint.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::services::chunk_processor::ProcessorKind;
use crate::value_objects::chunk_size::ChunkSize;
use crate::value_objects::operation_id::OperationId;

/// Optional compression applied to the output sink.
///
/// Compressed output is written as independently decodable members (gzip)
/// or frames (zstd), one per chunk, so append-mode resume keeps the output
/// stream valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompressionKind {
    #[default]
    None,
    Gzip,
    Zstd,
}

impl CompressionKind {
    /// Extension suffix conventionally appended to compressed outputs
    pub fn extension_suffix(&self) -> Option<&'static str> {
        match self {
            CompressionKind::None => None,
            CompressionKind::Gzip => Some("gz"),
            CompressionKind::Zstd => Some("zst"),
        }
    }
}

/// Request to run one file through the chunked transformation pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessFileRequest {
    /// Input file to read
    pub input_path: PathBuf,
    /// Output sink; when absent the engine allocates a scratch file
    pub output_path: Option<PathBuf>,
    /// Which chunk processor transforms the data
    pub processor: ProcessorKind,
    /// Processor-specific options, validated before dispatch
    pub options: serde_json::Value,
    /// Chunk size override; engine default when absent
    pub chunk_size: Option<ChunkSize>,
    /// Optional output compression
    pub compression: CompressionKind,
    /// Whether to emit checkpoints during processing
    pub enable_checkpoints: bool,
    /// Human-readable job name for progress listings
    pub name: Option<String>,
}

impl ProcessFileRequest {
    /// Creates a minimal request with engine defaults.
    pub fn new(input_path: PathBuf, processor: ProcessorKind) -> Self {
        Self {
            input_path,
            output_path: None,
            processor,
            options: serde_json::Value::Null,
            chunk_size: None,
            compression: CompressionKind::None,
            enable_checkpoints: false,
            name: None,
        }
    }

    /// Sets the output path
    pub fn with_output(mut self, output_path: PathBuf) -> Self {
        self.output_path = Some(output_path);
        self
    }

    /// Sets processor options
    pub fn with_options(mut self, options: serde_json::Value) -> Self {
        self.options = options;
        self
    }

    /// Sets the chunk size
    pub fn with_chunk_size(mut self, chunk_size: ChunkSize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    /// Enables checkpoint emission
    pub fn with_checkpoints(mut self) -> Self {
        self.enable_checkpoints = true;
        self
    }

    /// Sets output compression
    pub fn with_compression(mut self, compression: CompressionKind) -> Self {
        self.compression = compression;
        self
    }

    /// Sets the job name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Effective chunk size for this request
    pub fn effective_chunk_size(&self) -> ChunkSize {
        self.chunk_size.unwrap_or_default()
    }
}

/// Request to fan a transformation out over many files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkTransformRequest {
    /// Paths, directories, or glob patterns to expand
    pub inputs: Vec<String>,
    /// Directory receiving the transformed outputs
    pub output_dir: PathBuf,
    /// Which chunk processor transforms the data
    pub processor: ProcessorKind,
    /// Processor-specific options
    pub options: serde_json::Value,
    /// Degree-of-parallelism cap; processor count when absent
    pub parallelism: Option<usize>,
    /// Whether output paths mirror the inputs' relative structure
    pub preserve_dirs: bool,
    /// Glob filter applied when expanding directories
    pub file_pattern: Option<String>,
    /// Whether directory expansion recurses
    pub recursive: bool,
    /// Chunk size override
    pub chunk_size: Option<ChunkSize>,
    /// Optional output compression
    pub compression: CompressionKind,
}

impl BulkTransformRequest {
    /// Creates a bulk request with engine defaults.
    pub fn new(inputs: Vec<String>, output_dir: PathBuf, processor: ProcessorKind) -> Self {
        Self {
            inputs,
            output_dir,
            processor,
            options: serde_json::Value::Null,
            parallelism: None,
            preserve_dirs: false,
            file_pattern: None,
            recursive: true,
            chunk_size: None,
            compression: CompressionKind::None,
        }
    }
}

/// Result of processing one file through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessFileResult {
    /// Operation the run belonged to
    pub operation_id: OperationId,
    /// Input that was read
    pub input_path: PathBuf,
    /// Output that was written
    pub output_path: PathBuf,
    /// Bytes read from the input
    pub bytes_in: u64,
    /// Bytes written to the output
    pub bytes_out: u64,
    /// Chunks processed
    pub chunks: u64,
    /// Lines observed by the processor
    pub lines: u64,
    /// Items (processor-defined units) observed
    pub items: u64,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
    /// Number of checkpoints emitted
    pub checkpoints_emitted: u64,
}

/// Aggregate result of a bulk fan-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkTransformResult {
    /// Operation the fan-out ran under
    pub operation_id: OperationId,
    /// Files that completed successfully
    pub succeeded: Vec<ProcessFileResult>,
    /// Files that failed, with their error messages
    pub failed: Vec<(PathBuf, String)>,
    /// Inputs the resolver skipped, with reasons
    pub skipped: Vec<(PathBuf, String)>,
    /// Total bytes read across all successful files
    pub total_bytes_in: u64,
    /// Total bytes written across all successful files
    pub total_bytes_out: u64,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
}

/// Coarse duration estimate for a processing request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingEstimate {
    /// Input size the estimate was computed from
    pub input_bytes: u64,
    /// Heuristic processor throughput used, bytes per second
    pub assumed_rate_bps: u64,
    /// Estimated duration in seconds
    pub estimated_seconds: f64,
    /// Estimated chunk count at the effective chunk size
    pub estimated_chunks: u64,
}
