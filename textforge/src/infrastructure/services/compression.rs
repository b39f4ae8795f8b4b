// /////////////////////////////////////////////////////////////////////////////
// Textforge
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Sink Compression
//!
//! Optional compression for the streaming sink. Each processed chunk is
//! encoded as an independently decodable unit - a gzip member or a zstd
//! frame - and the units are concatenated in the output file. Both formats
//! define concatenation as a valid stream, which is what makes append-mode
//! checkpoint resume possible: a resumed run appends fresh members/frames
//! after a truncation to the checkpointed length.

use std::io::Write;

use textforge_domain::{CompressionKind, EngineError};

/// Zstd level used for chunk frames; the crate's default effort.
const ZSTD_LEVEL: i32 = 3;

/// Encodes one chunk for the sink.
///
/// `CompressionKind::None` returns the input unchanged.
pub fn compress_chunk(data: &[u8], kind: CompressionKind) -> Result<Vec<u8>, EngineError> {
    match kind {
        CompressionKind::None => Ok(data.to_vec()),
        CompressionKind::Gzip => {
            let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
            encoder
                .write_all(data)
                .and_then(|_| encoder.finish())
                .map_err(|e| EngineError::ProcessingFailed(format!("gzip encoding failed: {}", e)))
        }
        CompressionKind::Zstd => zstd::bulk::compress(data, ZSTD_LEVEL)
            .map_err(|e| EngineError::ProcessingFailed(format!("zstd encoding failed: {}", e))),
    }
}

/// Decodes a whole sink produced by [`compress_chunk`] concatenation.
///
/// Used by verification paths and tests; the engines themselves never need
/// to re-read their own output.
pub fn decompress_all(data: &[u8], kind: CompressionKind) -> Result<Vec<u8>, EngineError> {
    match kind {
        CompressionKind::None => Ok(data.to_vec()),
        CompressionKind::Gzip => {
            use std::io::Read;
            let mut decoder = flate2::read::MultiGzDecoder::new(data);
            let mut out = Vec::new();
            decoder
                .read_to_end(&mut out)
                .map_err(|e| EngineError::ProcessingFailed(format!("gzip decoding failed: {}", e)))?;
            Ok(out)
        }
        CompressionKind::Zstd => {
            zstd::stream::decode_all(data).map_err(|e| EngineError::ProcessingFailed(format!("zstd decoding failed: {}", e)))
        }
    }
}
