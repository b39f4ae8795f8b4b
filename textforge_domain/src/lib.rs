// /////////////////////////////////////////////////////////////////////////////
// Textforge
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Textforge Domain
//!
//! The textforge domain represents the core business logic and rules of the
//! bulk-editing and streaming file-processing engines. It is completely
//! independent of external concerns like file systems, schedulers, or the
//! request dispatcher that fronts the engines.
//!
//! ## Module Structure
//!
//! - `error` - The [`EngineError`] hierarchy shared by every component
//! - `value_objects` - Immutable, self-validating values (ids, chunk sizes,
//!   stream chunks)
//! - `entities` - Identity-bearing state: progress records, rollback
//!   sessions, stream operations, and the edit model with its result types
//! - `services` - Checksum logic and the capability ports the engines
//!   consume (snapshots, progress, scratch space, pattern expansion, chunk
//!   processing)
//!
//! ## Value Objects
//!
//! Value objects are immutable and defined by their attributes:
//!
//! - [`OperationId`], [`RollbackId`], [`CheckpointId`]: type-safe UUID
//!   identifiers
//! - [`ChunkSize`]: validated chunk size for the streaming pipeline
//! - [`StreamChunk`]: a bounded contiguous byte range of a file, processed
//!   as one unit
//!
//! ## Entities
//!
//! Entities carry identity through state changes:
//!
//! - [`ProgressRecord`]: per-operation progress with speed and ETA estimates
//! - [`RollbackSession`] / [`FileSnapshot`]: checksum-verified snapshots of
//!   a set of files, restorable until expiry
//! - [`StreamOperation`] / [`StreamCheckpoint`]: lifecycle state and durable
//!   replay points for streaming jobs
//!
//! ## Variants Over Inheritance
//!
//! The edit model ([`TextEdit`]), condition model ([`EditCondition`]),
//! refactor pattern kinds, processor kinds, and operation statuses are all
//! tagged unions dispatched by exhaustive `match`. No open-class
//! polymorphism exists in the domain.
//!
//! ## Capability Ports
//!
//! The engines consume narrow interfaces so tests can substitute in-memory
//! fakes: [`SnapshotStore`], [`ProgressPort`], [`ScratchSpace`],
//! [`PatternPort`], and [`ChunkProcessor`]. Stores never call back into
//! engines; the dependency arrow points one way.

pub mod entities;
pub mod error;
pub mod services;
pub mod value_objects;

// Re-export commonly used types at the crate root
pub use error::EngineError;

pub use value_objects::chunk_size::ChunkSize;
pub use value_objects::checkpoint_id::CheckpointId;
pub use value_objects::operation_id::OperationId;
pub use value_objects::rollback_id::RollbackId;
pub use value_objects::stream_chunk::StreamChunk;

pub use entities::edit_model::{
    BulkEditOptions, BulkEditRequest, ConditionSpec, EditCondition, EditOperation, OperationKind, RefactorKind,
    RefactorPattern, RegexFlags, TextEdit,
};
pub use entities::edit_results::{
    BulkEditSummary, DiffHunk, EditTotals, FileDiff, FileEditResult, ImpactEstimate, IssueSeverity, ValidationIssue,
};
pub use entities::progress::{ProgressRecord, ProgressUpdate};
pub use entities::rollback_session::{FileSnapshot, RollbackSession, ROLLBACK_METADATA_FILE};
pub use entities::stream_operation::{StreamCheckpoint, StreamOperation, StreamStatus};
pub use entities::stream_request::{
    BulkTransformRequest, BulkTransformResult, CompressionKind, ProcessFileRequest, ProcessFileResult,
    ProcessingEstimate,
};

pub use services::chunk_processor::{ChunkProcessor, ProcessedChunk, ProcessorInfo, ProcessorKind};
pub use services::pattern_port::{PatternFilter, PatternPort, ResolvedSet, SkippedEntry};
pub use services::progress_port::ProgressPort;
pub use services::scratch_space::{ScratchSpace, ScratchStats};
pub use services::snapshot_store::{
    FileIntegrity, FileIntegrityStatus, IntegrityReport, RestoreReport, SnapshotOutcome, SnapshotStore, StoreStats,
};
