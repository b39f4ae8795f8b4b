// /////////////////////////////////////////////////////////////////////////////
// Textforge
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Domain services and capability ports.
//!
//! The checksum service is pure domain logic. The remaining modules define
//! the narrow interfaces (ports) the engines consume - snapshots, progress,
//! scratch space, pattern expansion, chunk processing - so infrastructure
//! can implement them and tests can substitute in-memory fakes.

pub mod checksum;
pub mod chunk_processor;
pub mod pattern_port;
pub mod progress_port;
pub mod scratch_space;
pub mod snapshot_store;

pub use checksum::{sha256_hex, StreamingChecksum};
pub use chunk_processor::{ChunkProcessor, ProcessedChunk, ProcessorInfo, ProcessorKind};
pub use pattern_port::{PatternFilter, PatternPort, ResolvedSet, SkippedEntry};
pub use progress_port::ProgressPort;
pub use scratch_space::{ScratchSpace, ScratchStats};
pub use snapshot_store::{
    FileIntegrity, FileIntegrityStatus, IntegrityReport, RestoreReport, SnapshotOutcome, SnapshotStore, StoreStats,
};
