// /////////////////////////////////////////////////////////////////////////////
// Textforge
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Stream Operation Manager
//!
//! Lifecycle management for streaming jobs around the streaming processor:
//! create, start, pause, resume, cancel, forced checkpoint, resume-from-
//! checkpoint, listing, and automatic cleanup.
//!
//! ## Lifecycle
//!
//! ```text
//! created → running → {completed | failed | cancelled}
//! running → paused → resumed → running
//! ```
//!
//! `start` draws a permit from a processor-count-bounded pool and releases
//! it on the terminal transition, so at most processor-count jobs stream
//! concurrently regardless of how many are registered. Cancellation is
//! cooperative: the pipeline observes it at the next chunk boundary.
//!
//! ## Cleanup
//!
//! A background loop (every 10 minutes, 2-hour horizon by default) removes
//! terminal operations, their temp files, their checkpoints, and their
//! progress records.

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use textforge_bootstrap::shutdown::CancellationToken;
use textforge_domain::{
    EngineError, OperationId, ProcessFileRequest, ProgressPort, ScratchSpace, StreamOperation, StreamStatus,
};

use crate::application::services::stream_processor::{PipelineControl, StreamingProcessor};
use crate::infrastructure::runtime::ResourceGovernor;

/// One registered job: the durable entity plus its runtime handles.
struct ManagedOperation {
    entity: RwLock<StreamOperation>,
    control: PipelineControl,
    handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl ManagedOperation {
    fn status(&self) -> StreamStatus {
        self.entity.read().status
    }

    fn transition(&self, next: StreamStatus) -> Result<(), EngineError> {
        self.entity.write().transition(next)
    }
}

/// Lifecycle manager wrapping the streaming processor.
pub struct StreamOperationManager {
    processor: Arc<StreamingProcessor>,
    progress: Arc<dyn ProgressPort>,
    scratch: Arc<dyn ScratchSpace>,
    operations: RwLock<HashMap<OperationId, Arc<ManagedOperation>>>,
    start_permits: Arc<Semaphore>,
}

impl StreamOperationManager {
    /// Wires the manager; the concurrency cap equals the governor's CPU
    /// token count (the processor-count budget).
    pub fn new(
        processor: Arc<StreamingProcessor>,
        progress: Arc<dyn ProgressPort>,
        scratch: Arc<dyn ScratchSpace>,
        governor: &ResourceGovernor,
    ) -> Self {
        Self {
            processor,
            progress,
            scratch,
            operations: RwLock::new(HashMap::new()),
            start_permits: Arc::new(Semaphore::new(governor.cpu_token_count())),
        }
    }

    fn managed(&self, operation_id: OperationId) -> Result<Arc<ManagedOperation>, EngineError> {
        self.operations
            .read()
            .get(&operation_id)
            .cloned()
            .ok_or_else(|| EngineError::OperationNotFound(operation_id.to_string()))
    }

    /// Registers a new job in the `created` state.
    pub fn create(&self, name: impl Into<String>, request: ProcessFileRequest) -> OperationId {
        let entity = StreamOperation::new(name, request);
        let operation_id = entity.operation_id;
        let managed = Arc::new(ManagedOperation {
            entity: RwLock::new(entity),
            control: PipelineControl::new(),
            handle: Mutex::new(None),
        });
        self.operations.write().insert(operation_id, managed);
        tracing::debug!("Registered stream operation {}", operation_id);
        operation_id
    }

    /// Starts a created job. The spawned task acquires a concurrency
    /// permit before streaming and releases it on its terminal transition.
    pub fn start(&self, operation_id: OperationId) -> Result<(), EngineError> {
        let managed = self.managed(operation_id)?;
        if managed.status() != StreamStatus::Created {
            return Err(EngineError::InvalidRequest(format!(
                "operation {} cannot start from status {}",
                operation_id,
                managed.status()
            )));
        }
        let handle = self.spawn_run(operation_id, Arc::clone(&managed), None);
        *managed.handle.lock() = Some(handle);
        Ok(())
    }

    fn spawn_run(
        &self,
        operation_id: OperationId,
        managed: Arc<ManagedOperation>,
        resume: Option<textforge_domain::StreamCheckpoint>,
    ) -> tokio::task::JoinHandle<()> {
        let processor = Arc::clone(&self.processor);
        let permits = Arc::clone(&self.start_permits);

        tokio::spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };

            if managed.control.is_cancelled() {
                let _ = managed.transition(StreamStatus::Cancelled);
                return;
            }
            if managed.transition(StreamStatus::Running).is_err() {
                return;
            }

            let request = managed.entity.read().request.clone();
            let outcome = match resume {
                Some(checkpoint) => {
                    processor
                        .resume_file(&request, operation_id, checkpoint, &managed.control)
                        .await
                }
                None => processor.process_file(&request, operation_id, &managed.control).await,
            };

            let latest = processor.latest_checkpoint(operation_id).await;
            let mut entity = managed.entity.write();
            if let Some(checkpoint) = latest {
                entity.record_checkpoint(checkpoint);
            }
            // A pipeline can reach EOF between a pause request and the next
            // suspension point; unwind the pause before the terminal
            // transition
            if entity.status == StreamStatus::Paused {
                let _ = entity.transition(StreamStatus::Resumed);
                let _ = entity.transition(StreamStatus::Running);
            }
            match outcome {
                Ok(result) => {
                    entity.record_temp_file(result.output_path.clone());
                    let _ = entity.transition(StreamStatus::Completed);
                    tracing::info!(
                        "Stream operation {} completed: {} bytes in, {} bytes out",
                        operation_id,
                        result.bytes_in,
                        result.bytes_out
                    );
                }
                Err(e) if e.is_cancellation() => {
                    let _ = entity.transition(StreamStatus::Cancelled);
                    tracing::info!("Stream operation {} cancelled", operation_id);
                }
                Err(e) => {
                    entity.error = Some(e.to_string());
                    let _ = entity.transition(StreamStatus::Failed);
                    tracing::warn!("Stream operation {} failed: {}", operation_id, e);
                }
            }
        })
    }

    /// Freezes dispatch of new chunks; in-memory state and the last
    /// checkpoint survive.
    pub fn pause(&self, operation_id: OperationId) -> Result<(), EngineError> {
        let managed = self.managed(operation_id)?;
        managed.transition(StreamStatus::Paused)?;
        managed.control.pause();
        Ok(())
    }

    /// Resumes a paused job in place.
    pub fn resume(&self, operation_id: OperationId) -> Result<(), EngineError> {
        let managed = self.managed(operation_id)?;
        managed.transition(StreamStatus::Resumed)?;
        managed.transition(StreamStatus::Running)?;
        managed.control.resume();
        Ok(())
    }

    /// Signals cancellation; the pipeline unwinds at its next suspension
    /// point. Jobs that never started transition immediately.
    pub fn cancel(&self, operation_id: OperationId) -> Result<(), EngineError> {
        let managed = self.managed(operation_id)?;
        let status = managed.status();
        if status.is_terminal() {
            return Err(EngineError::InvalidRequest(format!(
                "operation {} already ended with status {}",
                operation_id, status
            )));
        }
        managed.control.cancel();
        if status == StreamStatus::Created && managed.handle.lock().is_none() {
            let _ = managed.transition(StreamStatus::Cancelled);
        }
        Ok(())
    }

    /// Requests an immediate checkpoint at the next chunk boundary.
    pub fn checkpoint(&self, operation_id: OperationId) -> Result<(), EngineError> {
        let managed = self.managed(operation_id)?;
        if managed.status() != StreamStatus::Running {
            return Err(EngineError::InvalidRequest(format!(
                "operation {} is not running",
                operation_id
            )));
        }
        managed.control.request_checkpoint();
        Ok(())
    }

    /// Replays a job from one of its retained checkpoints as a fresh
    /// operation; returns the new operation id.
    pub async fn resume_from(
        &self,
        operation_id: OperationId,
        checkpoint_id: &str,
    ) -> Result<OperationId, EngineError> {
        let managed = self.managed(operation_id)?;
        if !managed.status().is_terminal() {
            return Err(EngineError::InvalidRequest(format!(
                "operation {} is still {}; cancel it before replaying",
                operation_id,
                managed.status()
            )));
        }

        let checkpoint = self.processor.load_checkpoint(operation_id, checkpoint_id).await?;
        let (name, request) = {
            let entity = managed.entity.read();
            (format!("{} (resumed)", entity.name), entity.request.clone())
        };

        let new_id = self.create(name, request);
        let new_managed = self.managed(new_id)?;
        let handle = self.spawn_run(new_id, Arc::clone(&new_managed), Some(checkpoint));
        *new_managed.handle.lock() = Some(handle);
        Ok(new_id)
    }

    /// Snapshot of one operation, with its freshest on-disk checkpoint.
    pub async fn get(&self, operation_id: OperationId) -> Option<StreamOperation> {
        let managed = self.operations.read().get(&operation_id).cloned()?;
        let latest = self.processor.latest_checkpoint(operation_id).await;
        let mut entity = managed.entity.read().clone();
        if let Some(checkpoint) = latest {
            let newer = entity
                .last_checkpoint_at
                .map(|at| checkpoint.created_at > at)
                .unwrap_or(true);
            if newer {
                entity.record_checkpoint(checkpoint);
            }
        }
        Some(entity)
    }

    /// Monotonic snapshot of registered operations, newest first.
    pub fn list(&self, max: usize, include_done: bool) -> Vec<StreamOperation> {
        let mut operations: Vec<StreamOperation> = self
            .operations
            .read()
            .values()
            .map(|managed| managed.entity.read().clone())
            .filter(|entity| include_done || !entity.is_terminal())
            .collect();
        operations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        operations.truncate(max);
        operations
    }

    /// Waits for a job's task to finish; test and shutdown helper.
    pub async fn join(&self, operation_id: OperationId) -> Result<(), EngineError> {
        let managed = self.managed(operation_id)?;
        let handle = managed.handle.lock().take();
        if let Some(handle) = handle {
            handle
                .await
                .map_err(|e| EngineError::InternalError(format!("operation task panicked: {}", e)))?;
        }
        Ok(())
    }

    /// Removes terminal operations older than `horizon`, reclaiming their
    /// temp files, checkpoints, and progress records.
    pub async fn cleanup(&self, horizon: Duration) -> usize {
        let cutoff = Utc::now() - chrono::Duration::from_std(horizon).unwrap_or_else(|_| chrono::Duration::zero());
        let victims: Vec<(OperationId, Vec<std::path::PathBuf>)> = {
            let operations = self.operations.read();
            operations
                .iter()
                .filter(|(_, managed)| {
                    let entity = managed.entity.read();
                    entity.is_terminal() && entity.completed_at.map(|at| at <= cutoff).unwrap_or(false)
                })
                .map(|(id, managed)| (*id, managed.entity.read().temp_files.clone()))
                .collect()
        };

        for (operation_id, temp_files) in &victims {
            self.scratch.cleanup_operation(*operation_id).await;
            for path in temp_files {
                self.scratch.delete(path).await;
            }
            self.processor.remove_checkpoints(*operation_id).await;
            self.progress.remove(*operation_id);
            self.operations.write().remove(operation_id);
        }

        if !victims.is_empty() {
            tracing::info!("Operation cleanup removed {} terminal operations", victims.len());
        }
        victims.len()
    }

    /// Spawns the periodic cleanup loop.
    pub fn spawn_cleanup(
        self: &Arc<Self>,
        interval: Duration,
        horizon: Duration,
        token: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        manager.cleanup(horizon).await;
                    }
                    _ = token.cancelled() => break,
                }
            }
        })
    }

    /// Cancels every live operation; the shutdown path.
    pub fn shutdown(&self) {
        let live: Vec<Arc<ManagedOperation>> = self
            .operations
            .read()
            .values()
            .filter(|managed| !managed.status().is_terminal())
            .cloned()
            .collect();
        for managed in live {
            managed.control.cancel();
        }
    }
}
