// /////////////////////////////////////////////////////////////////////////////
// Textforge
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Chunk Processors
//!
//! The four built-in chunk processors behind the streaming pipeline's
//! registry: line, regex, CSV, and binary. Each is a stateless, CPU-bound
//! transformation validated up front; the pipeline owns all I/O around
//! them.

pub mod binary;
pub mod csv;
pub mod line;
pub mod regex;

use std::collections::HashMap;
use std::sync::Arc;

use textforge_domain::{ChunkProcessor, ProcessorKind};

pub use binary::BinaryProcessor;
pub use csv::CsvProcessor;
pub use line::LineProcessor;
pub use regex::RegexChunkProcessor;

/// Builds the registry of built-in processors keyed by kind.
pub fn default_registry() -> HashMap<ProcessorKind, Arc<dyn ChunkProcessor>> {
    let mut registry: HashMap<ProcessorKind, Arc<dyn ChunkProcessor>> = HashMap::new();
    registry.insert(ProcessorKind::Line, Arc::new(LineProcessor::new()));
    registry.insert(ProcessorKind::Regex, Arc::new(RegexChunkProcessor::new()));
    registry.insert(ProcessorKind::Csv, Arc::new(CsvProcessor::new()));
    registry.insert(ProcessorKind::Binary, Arc::new(BinaryProcessor::new()));
    registry
}

/// Counts complete lines in a chunk payload.
pub(crate) fn count_lines(data: &[u8]) -> u64 {
    data.iter().filter(|b| **b == b'\n').count() as u64
}
