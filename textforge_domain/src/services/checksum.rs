// /////////////////////////////////////////////////////////////////////////////
// Textforge
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Checksum Service
//!
//! SHA-256 checksum calculation for snapshot verification and restore-time
//! integrity checks. Checksums are a domain concern: the rollback store's
//! core invariant - a snapshot is only valid when source and copy hash
//! identically - is expressed in these terms.
//!
//! Two shapes are provided:
//!
//! - [`sha256_hex`] for in-memory buffers
//! - [`StreamingChecksum`] for incremental hashing while copying, so large
//!   files are never held in memory just to be hashed

use sha2::{Digest, Sha256};

/// SHA-256 of a buffer, lowercase hex encoded.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Incremental SHA-256 state for streaming hashing.
///
/// Feed bytes as they are read or written; `finalize` yields the same hex
/// digest [`sha256_hex`] would produce over the concatenation.
#[derive(Debug, Default)]
pub struct StreamingChecksum {
    hasher: Sha256,
    bytes_hashed: u64,
}

impl StreamingChecksum {
    /// Creates an empty checksum state
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorbs a block of bytes
    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
        self.bytes_hashed += data.len() as u64;
    }

    /// Total bytes absorbed so far
    pub fn bytes_hashed(&self) -> u64 {
        self.bytes_hashed
    }

    /// Consumes the state and returns the lowercase hex digest
    pub fn finalize(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // SHA-256("") and SHA-256("abc") from FIPS 180-2 test vectors
    const EMPTY_DIGEST: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
    const ABC_DIGEST: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

    #[test]
    fn test_known_vectors() {
        assert_eq!(sha256_hex(b""), EMPTY_DIGEST);
        assert_eq!(sha256_hex(b"abc"), ABC_DIGEST);
    }

    #[test]
    fn test_streaming_matches_one_shot() {
        let mut streaming = StreamingChecksum::new();
        streaming.update(b"a");
        streaming.update(b"b");
        streaming.update(b"c");
        assert_eq!(streaming.bytes_hashed(), 3);
        assert_eq!(streaming.finalize(), ABC_DIGEST);
    }

    #[test]
    fn test_different_content_differs() {
        assert_ne!(sha256_hex(b"hello"), sha256_hex(b"hellO"));
    }
}
