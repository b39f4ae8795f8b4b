// /////////////////////////////////////////////////////////////////////////////
// Textforge
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # CSV Processor
//!
//! Delimiter-separated value rewriting: delimiter substitution and field
//! trimming, applied line by line within a chunk. Fields are split
//! naively on the delimiter byte; quoted-field awareness is a processor
//! option the engine does not need for its own flows.

use serde::Deserialize;

use textforge_domain::{ChunkProcessor, EngineError, ProcessedChunk, ProcessorInfo, ProcessorKind, StreamChunk};

use super::count_lines;

const RATE_BPS: u64 = 60 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
struct CsvOptions {
    delimiter: String,
    to_delimiter: Option<String>,
    trim_fields: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: ",".to_string(),
            to_delimiter: None,
            trim_fields: false,
        }
    }
}

fn parse_options(options: &serde_json::Value) -> Result<CsvOptions, EngineError> {
    let parsed: CsvOptions = if options.is_null() {
        CsvOptions::default()
    } else {
        serde_json::from_value(options.clone())
            .map_err(|e| EngineError::ValidationError(format!("Invalid csv processor options: {}", e)))?
    };

    if parsed.delimiter.len() != 1 {
        return Err(EngineError::ValidationError(
            "csv 'delimiter' must be a single character".to_string(),
        ));
    }
    if let Some(to) = &parsed.to_delimiter {
        if to.len() != 1 {
            return Err(EngineError::ValidationError(
                "csv 'to_delimiter' must be a single character".to_string(),
            ));
        }
    }
    Ok(parsed)
}

/// Delimiter rewriting chunk transformation.
#[derive(Debug, Default)]
pub struct CsvProcessor;

impl CsvProcessor {
    /// Creates the processor
    pub fn new() -> Self {
        Self
    }
}

impl ChunkProcessor for CsvProcessor {
    fn kind(&self) -> ProcessorKind {
        ProcessorKind::Csv
    }

    fn validate_options(&self, options: &serde_json::Value) -> Result<(), EngineError> {
        parse_options(options).map(|_| ())
    }

    fn process(&self, chunk: &StreamChunk, options: &serde_json::Value) -> Result<ProcessedChunk, EngineError> {
        let parsed = parse_options(options)?;
        let from = parsed.delimiter.chars().next().unwrap_or(',');
        let to = parsed
            .to_delimiter
            .as_ref()
            .and_then(|d| d.chars().next())
            .unwrap_or(from);

        let text = String::from_utf8_lossy(chunk.data());
        let mut records = 0u64;
        let mut out = String::with_capacity(text.len());

        for segment in text.split_inclusive('\n') {
            let (line, newline) = match segment.strip_suffix('\n') {
                Some(line) => (line, "\n"),
                None => (segment, ""),
            };
            if !line.is_empty() {
                records += 1;
            }
            let mut first = true;
            for field in line.split(from) {
                if !first {
                    out.push(to);
                }
                first = false;
                if parsed.trim_fields {
                    out.push_str(field.trim());
                } else {
                    out.push_str(field);
                }
            }
            out.push_str(newline);
        }

        Ok(ProcessedChunk {
            data: out.into_bytes(),
            lines: count_lines(chunk.data()),
            items: records,
        })
    }

    fn info(&self) -> ProcessorInfo {
        ProcessorInfo {
            kind: ProcessorKind::Csv,
            description: "Delimiter-separated value rewriting (delimiter substitution, field trim)".to_string(),
            options_summary: "{ delimiter?: char, to_delimiter?: char, trim_fields?: bool }".to_string(),
            rate_bps: RATE_BPS,
        }
    }
}
