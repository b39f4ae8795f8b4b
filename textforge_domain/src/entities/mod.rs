// /////////////////////////////////////////////////////////////////////////////
// Textforge
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Entities for the textforge domain.
//!
//! Entities have a distinct identity that persists through state changes:
//! a progress record follows its operation, a rollback session follows its
//! id from snapshot to restore to expiry, a stream operation walks its
//! status state machine.

pub mod edit_model;
pub mod edit_results;
pub mod progress;
pub mod rollback_session;
pub mod stream_operation;
pub mod stream_request;

pub use edit_model::{
    BulkEditOptions, BulkEditRequest, ConditionSpec, EditCondition, EditOperation, OperationKind, RefactorKind,
    RefactorPattern, RegexFlags, TextEdit,
};
pub use edit_results::{
    BulkEditSummary, DiffHunk, EditTotals, FileDiff, FileEditResult, ImpactEstimate, IssueSeverity, ValidationIssue,
};
pub use progress::{ProgressRecord, ProgressUpdate};
pub use rollback_session::{FileSnapshot, RollbackSession, ROLLBACK_METADATA_FILE};
pub use stream_operation::{StreamCheckpoint, StreamOperation, StreamStatus};
pub use stream_request::{BulkTransformRequest, CompressionKind, ProcessFileRequest, ProcessFileResult, ProcessingEstimate};
