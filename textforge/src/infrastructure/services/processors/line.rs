// /////////////////////////////////////////////////////////////////////////////
// Textforge
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Line Processor
//!
//! Line-oriented text transforms applied per chunk. Transforms operate on
//! ASCII bytes, which keeps the output a pure function of the chunk bytes
//! regardless of where chunk boundaries fall inside multi-byte sequences.

use serde::Deserialize;

use textforge_domain::{ChunkProcessor, EngineError, ProcessedChunk, ProcessorInfo, ProcessorKind, StreamChunk};

use super::count_lines;

/// Heuristic throughput for estimation, bytes per second
const RATE_BPS: u64 = 150 * 1024 * 1024;

/// Which transform to apply to each line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum LineTransform {
    /// Pass lines through unchanged
    #[default]
    None,
    /// ASCII-uppercase every byte
    Uppercase,
    /// ASCII-lowercase every byte
    Lowercase,
    /// Strip trailing spaces and tabs before each newline
    TrimTrailing,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
struct LineOptions {
    transform: LineTransform,
}

fn parse_options(options: &serde_json::Value) -> Result<LineOptions, EngineError> {
    if options.is_null() {
        return Ok(LineOptions::default());
    }
    serde_json::from_value(options.clone())
        .map_err(|e| EngineError::ValidationError(format!("Invalid line processor options: {}", e)))
}

/// Line-oriented chunk transformation.
#[derive(Debug, Default)]
pub struct LineProcessor;

impl LineProcessor {
    /// Creates the processor
    pub fn new() -> Self {
        Self
    }
}

fn trim_trailing(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut line_start = 0usize;
    for (i, byte) in data.iter().enumerate() {
        if *byte == b'\n' {
            let mut end = i;
            while end > line_start && (data[end - 1] == b' ' || data[end - 1] == b'\t') {
                end -= 1;
            }
            out.extend_from_slice(&data[line_start..end]);
            out.push(b'\n');
            line_start = i + 1;
        }
    }
    // Trailing partial line is passed through untrimmed; the next chunk
    // owns its newline
    out.extend_from_slice(&data[line_start..]);
    out
}

impl ChunkProcessor for LineProcessor {
    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Line
    }

    fn validate_options(&self, options: &serde_json::Value) -> Result<(), EngineError> {
        parse_options(options).map(|_| ())
    }

    fn process(&self, chunk: &StreamChunk, options: &serde_json::Value) -> Result<ProcessedChunk, EngineError> {
        let options = parse_options(options)?;
        let lines = count_lines(chunk.data());

        let data = match options.transform {
            LineTransform::None => chunk.data().to_vec(),
            LineTransform::Uppercase => chunk.data().to_ascii_uppercase(),
            LineTransform::Lowercase => chunk.data().to_ascii_lowercase(),
            LineTransform::TrimTrailing => trim_trailing(chunk.data()),
        };

        Ok(ProcessedChunk { data, lines, items: lines })
    }

    fn info(&self) -> ProcessorInfo {
        ProcessorInfo {
            kind: ProcessorKind::Line,
            description: "Line-oriented text transforms (case folding, trailing-whitespace trim)".to_string(),
            options_summary: "{ transform: none | uppercase | lowercase | trim_trailing }".to_string(),
            rate_bps: RATE_BPS,
        }
    }
}
