// /////////////////////////////////////////////////////////////////////////////
// Textforge
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Stream Operation Lifecycle
//!
//! This module defines the lifecycle entity for streaming jobs and the
//! durable checkpoint from which work can be replayed.
//!
//! ## State Machine
//!
//! ```text
//! created → running → {completed | failed | cancelled}
//! running → paused → resumed → running
//! ```
//!
//! Terminal statuses (`completed`, `failed`, `cancelled`) freeze
//! `completed_at`; any further transition attempt is rejected. `resumed` is
//! a transient acknowledgement state between `paused` and `running` kept
//! for caller visibility.
//!
//! ## Checkpoints
//!
//! A checkpoint records the input position after the last durably written
//! chunk. `position_bytes` always lies on a chunk boundary, so replaying
//! from it with the same processor, options, and chunk size yields output
//! byte-identical to an uninterrupted run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::EngineError;
use crate::value_objects::checkpoint_id::CheckpointId;
use crate::value_objects::operation_id::OperationId;

use super::stream_request::ProcessFileRequest;

/// Custom-state key recording the output length at checkpoint time.
///
/// Resume truncates the output to this length before appending, which keeps
/// interrupted and clean runs byte-identical for deterministic processors.
pub const CHECKPOINT_OUTPUT_POSITION_KEY: &str = "output_position";

/// Lifecycle status of a streaming operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamStatus {
    Created,
    Running,
    Paused,
    Resumed,
    Completed,
    Failed,
    Cancelled,
}

impl StreamStatus {
    /// Whether this status ends the lifecycle
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamStatus::Completed | StreamStatus::Failed | StreamStatus::Cancelled)
    }

    /// Whether a transition from `self` to `next` is legal
    pub fn can_transition_to(&self, next: StreamStatus) -> bool {
        use StreamStatus::*;
        match (self, next) {
            (Created, Running) => true,
            (Created, Cancelled) => true,
            (Running, Completed) | (Running, Failed) | (Running, Cancelled) => true,
            (Running, Paused) => true,
            (Paused, Resumed) => true,
            (Paused, Cancelled) => true,
            (Resumed, Running) => true,
            (Resumed, Cancelled) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            StreamStatus::Created => "created",
            StreamStatus::Running => "running",
            StreamStatus::Paused => "paused",
            StreamStatus::Resumed => "resumed",
            StreamStatus::Completed => "completed",
            StreamStatus::Failed => "failed",
            StreamStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", label)
    }
}

/// A durable record from which streaming work can be replayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamCheckpoint {
    /// Checkpoint identifier (also part of the on-disk file name)
    pub checkpoint_id: CheckpointId,
    /// When the checkpoint was emitted
    pub created_at: DateTime<Utc>,
    /// Input byte offset of the next chunk to read; lies on a chunk boundary
    pub position_bytes: u64,
    /// Chunks durably processed before this checkpoint
    pub chunks_done: u64,
    /// Lines durably processed before this checkpoint
    pub lines_done: u64,
    /// Processor-specific replay state
    pub custom_state: HashMap<String, String>,
    /// Input file the checkpoint belongs to
    pub file_path: PathBuf,
}

impl StreamCheckpoint {
    /// Creates a checkpoint at the given input position.
    pub fn new(file_path: PathBuf, position_bytes: u64, chunks_done: u64, lines_done: u64) -> Self {
        Self {
            checkpoint_id: CheckpointId::new(),
            created_at: Utc::now(),
            position_bytes,
            chunks_done,
            lines_done,
            custom_state: HashMap::new(),
            file_path,
        }
    }

    /// Records the output length at checkpoint time.
    pub fn with_output_position(mut self, output_position: u64) -> Self {
        self.custom_state
            .insert(CHECKPOINT_OUTPUT_POSITION_KEY.to_string(), output_position.to_string());
        self
    }

    /// Output length recorded at checkpoint time, if present.
    pub fn output_position(&self) -> Option<u64> {
        self.custom_state
            .get(CHECKPOINT_OUTPUT_POSITION_KEY)
            .and_then(|v| v.parse().ok())
    }

    /// On-disk file name for this checkpoint
    pub fn file_name(&self) -> String {
        format!("checkpoint_{}.json", self.checkpoint_id)
    }
}

/// Lifecycle entity for one streaming job.
///
/// The cancellation handle is runtime state owned by the operation manager,
/// not part of the durable entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamOperation {
    /// Operation identifier
    pub operation_id: OperationId,
    /// Human-readable name
    pub name: String,
    /// The request this operation executes
    pub request: ProcessFileRequest,
    /// Current lifecycle status
    pub status: StreamStatus,
    /// When the operation was registered
    pub created_at: DateTime<Utc>,
    /// When dispatch first began
    pub started_at: Option<DateTime<Utc>>,
    /// Frozen on the first transition into a terminal status
    pub completed_at: Option<DateTime<Utc>>,
    /// Most recent checkpoint, if any
    pub last_checkpoint: Option<StreamCheckpoint>,
    /// When the most recent checkpoint was emitted
    pub last_checkpoint_at: Option<DateTime<Utc>>,
    /// Temp files recorded against this operation for cleanup
    pub temp_files: Vec<PathBuf>,
    /// Failure message for `failed` operations
    pub error: Option<String>,
}

impl StreamOperation {
    /// Registers a new operation in the `created` state.
    pub fn new(name: impl Into<String>, request: ProcessFileRequest) -> Self {
        Self {
            operation_id: OperationId::new(),
            name: name.into(),
            request,
            status: StreamStatus::Created,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            last_checkpoint: None,
            last_checkpoint_at: None,
            temp_files: Vec::new(),
            error: None,
        }
    }

    /// Attempts a status transition, enforcing the state machine.
    ///
    /// # Errors
    /// Returns `EngineError::InvalidRequest` for illegal transitions,
    /// including any transition out of a terminal status.
    pub fn transition(&mut self, next: StreamStatus) -> Result<(), EngineError> {
        if !self.status.can_transition_to(next) {
            return Err(EngineError::InvalidRequest(format!(
                "Illegal stream status transition {} -> {} for operation {}",
                self.status, next, self.operation_id
            )));
        }

        self.status = next;
        match next {
            StreamStatus::Running if self.started_at.is_none() => {
                self.started_at = Some(Utc::now());
            }
            s if s.is_terminal() => {
                self.completed_at = Some(Utc::now());
            }
            _ => {}
        }
        Ok(())
    }

    /// Records a freshly emitted checkpoint.
    pub fn record_checkpoint(&mut self, checkpoint: StreamCheckpoint) {
        self.last_checkpoint_at = Some(checkpoint.created_at);
        self.last_checkpoint = Some(checkpoint);
    }

    /// Registers a temp file for cleanup when the operation is removed.
    pub fn record_temp_file(&mut self, path: PathBuf) {
        self.temp_files.push(path);
    }

    /// Whether the operation has ended
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::chunk_processor::ProcessorKind;

    fn request() -> ProcessFileRequest {
        ProcessFileRequest::new(PathBuf::from("/in/data.bin"), ProcessorKind::Binary)
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut op = StreamOperation::new("copy", request());
        assert_eq!(op.status, StreamStatus::Created);

        op.transition(StreamStatus::Running).unwrap();
        assert!(op.started_at.is_some());
        assert!(op.completed_at.is_none());

        op.transition(StreamStatus::Completed).unwrap();
        assert!(op.completed_at.is_some());
        assert!(op.is_terminal());
    }

    #[test]
    fn test_pause_resume_cycle() {
        let mut op = StreamOperation::new("pausable", request());
        op.transition(StreamStatus::Running).unwrap();
        op.transition(StreamStatus::Paused).unwrap();
        op.transition(StreamStatus::Resumed).unwrap();
        op.transition(StreamStatus::Running).unwrap();
        op.transition(StreamStatus::Cancelled).unwrap();
        assert!(op.is_terminal());
    }

    #[test]
    fn test_terminal_states_are_frozen() {
        let mut op = StreamOperation::new("done", request());
        op.transition(StreamStatus::Running).unwrap();
        op.transition(StreamStatus::Completed).unwrap();
        let frozen = op.completed_at;

        assert!(op.transition(StreamStatus::Running).is_err());
        assert!(op.transition(StreamStatus::Cancelled).is_err());
        assert_eq!(op.completed_at, frozen);
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        let mut op = StreamOperation::new("strict", request());
        // created -> paused is not legal
        assert!(op.transition(StreamStatus::Paused).is_err());
        // created -> completed is not legal
        assert!(op.transition(StreamStatus::Completed).is_err());
    }

    #[test]
    fn test_started_at_set_once() {
        let mut op = StreamOperation::new("restart", request());
        op.transition(StreamStatus::Running).unwrap();
        let first_start = op.started_at;
        op.transition(StreamStatus::Paused).unwrap();
        op.transition(StreamStatus::Resumed).unwrap();
        op.transition(StreamStatus::Running).unwrap();
        assert_eq!(op.started_at, first_start);
    }

    #[test]
    fn test_checkpoint_round_trip() {
        let cp = StreamCheckpoint::new(PathBuf::from("/in/data.bin"), 655360, 10, 0).with_output_position(1234);
        assert_eq!(cp.output_position(), Some(1234));

        let json = serde_json::to_string(&cp).unwrap();
        let back: StreamCheckpoint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cp);
        assert!(back.file_name().starts_with("checkpoint_"));
        assert!(back.file_name().ends_with(".json"));
    }

    #[test]
    fn test_record_checkpoint_updates_timestamps() {
        let mut op = StreamOperation::new("checkpointed", request());
        op.transition(StreamStatus::Running).unwrap();
        let cp = StreamCheckpoint::new(PathBuf::from("/in/data.bin"), 65536, 1, 0);
        let at = cp.created_at;
        op.record_checkpoint(cp);
        assert_eq!(op.last_checkpoint_at, Some(at));
        assert!(op.last_checkpoint.is_some());
    }
}
