// /////////////////////////////////////////////////////////////////////////////
// Textforge
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Regex Processor
//!
//! Regex search-and-replace over chunk text. Matching is confined to one
//! chunk at a time: a pattern can never observe bytes across a chunk
//! boundary, which is what keeps the transform deterministic in chunk size
//! (the resume contract) at the cost of missing straddling matches.

use serde::Deserialize;

use textforge_domain::entities::edit_model::{compile_pattern, RegexFlags};
use textforge_domain::{ChunkProcessor, EngineError, ProcessedChunk, ProcessorInfo, ProcessorKind, StreamChunk};

use super::count_lines;

const RATE_BPS: u64 = 80 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegexOptions {
    pattern: String,
    #[serde(default)]
    replacement: String,
    #[serde(default)]
    case_insensitive: bool,
}

fn parse_options(options: &serde_json::Value) -> Result<RegexOptions, EngineError> {
    let parsed: RegexOptions = serde_json::from_value(options.clone())
        .map_err(|e| EngineError::ValidationError(format!("Invalid regex processor options: {}", e)))?;
    if parsed.pattern.is_empty() {
        return Err(EngineError::ValidationError(
            "Regex processor requires a non-empty 'pattern'".to_string(),
        ));
    }
    Ok(parsed)
}

/// Regex search-and-replace chunk transformation.
#[derive(Debug, Default)]
pub struct RegexChunkProcessor;

impl RegexChunkProcessor {
    /// Creates the processor
    pub fn new() -> Self {
        Self
    }
}

impl ChunkProcessor for RegexChunkProcessor {
    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Regex
    }

    fn validate_options(&self, options: &serde_json::Value) -> Result<(), EngineError> {
        let parsed = parse_options(options)?;
        let flags = RegexFlags {
            case_insensitive: parsed.case_insensitive,
            ..Default::default()
        };
        compile_pattern(&parsed.pattern, flags)
            .map_err(|e| EngineError::ValidationError(e.to_string()))
            .map(|_| ())
    }

    fn process(&self, chunk: &StreamChunk, options: &serde_json::Value) -> Result<ProcessedChunk, EngineError> {
        let parsed = parse_options(options)?;
        let flags = RegexFlags {
            case_insensitive: parsed.case_insensitive,
            ..Default::default()
        };
        let regex = compile_pattern(&parsed.pattern, flags)?;

        let text = String::from_utf8_lossy(chunk.data());
        let matches = regex.find_iter(&text).count() as u64;
        let replaced = regex.replace_all(&text, parsed.replacement.as_str());

        Ok(ProcessedChunk {
            data: replaced.into_owned().into_bytes(),
            lines: count_lines(chunk.data()),
            items: matches,
        })
    }

    fn info(&self) -> ProcessorInfo {
        ProcessorInfo {
            kind: ProcessorKind::Regex,
            description: "Regex search and replace over chunk text".to_string(),
            options_summary: "{ pattern: <regex>, replacement?: string, case_insensitive?: bool }".to_string(),
            rate_bps: RATE_BPS,
        }
    }
}
