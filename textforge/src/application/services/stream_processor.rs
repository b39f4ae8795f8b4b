// /////////////////////////////////////////////////////////////////////////////
// Textforge
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Streaming File Processor
//!
//! Chunked read-transform-write pipeline with pluggable processors,
//! checkpoint emission, resume from checkpoint, and bulk fan-out.
//!
//! ## Pipeline Shape
//!
//! ```text
//! read chunk -> processor -> (compress) -> write -> progress -> checkpoint?
//! ```
//!
//! Within one file, chunks are processed strictly in file order and output
//! bytes are written in that same order. Cancellation and pause are
//! observed at chunk boundaries - after a read, before the next read -
//! which are the pipeline's cooperative suspension points.
//!
//! ## Checkpoints
//!
//! Every 100 chunks (and at EOF, and on explicit request) the pipeline
//! flushes the sink and writes `checkpoint_<id>.json` under the
//! operation's checkpoint directory, retaining at most the last 10. A
//! checkpoint records the input position (always a chunk boundary), the
//! counters, and the output length at flush time.
//!
//! ## Resume
//!
//! Resume seeks the input to `position_bytes`, truncates the output to the
//! recorded output length, and appends. For a processor deterministic in
//! `(chunk bytes, options)` the resumed output is byte-identical to an
//! uninterrupted run.

use futures::StreamExt;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Notify;

use textforge_bootstrap::shutdown::CancellationToken;
use textforge_domain::entities::progress::ProgressUpdate;
use textforge_domain::entities::stream_operation::CHECKPOINT_OUTPUT_POSITION_KEY;
use textforge_domain::{
    BulkTransformRequest, BulkTransformResult, ChunkProcessor, EngineError, OperationId, PatternFilter, PatternPort,
    ProcessFileRequest, ProcessFileResult, ProcessingEstimate, ProcessorInfo, ProcessorKind, ProgressPort,
    ScratchSpace, StreamCheckpoint, StreamChunk,
};

use crate::infrastructure::config::EngineConfig;
use crate::infrastructure::runtime::ResourceGovernor;
use crate::infrastructure::services::compression::compress_chunk;
use crate::infrastructure::services::processors::default_registry;

/// Custom-state key carrying the items counter across a resume
const CHECKPOINT_ITEMS_KEY: &str = "items_done";

/// Cooperative control surface for one pipeline run.
///
/// Cancellation uses the bootstrap token; pause parks the pipeline at the
/// next chunk boundary until resumed (or cancelled). A forced checkpoint
/// request is honored at the next boundary regardless of the periodic
/// interval.
#[derive(Clone)]
pub struct PipelineControl {
    cancel: CancellationToken,
    paused: Arc<AtomicBool>,
    resume_notify: Arc<Notify>,
    checkpoint_requested: Arc<AtomicBool>,
}

impl PipelineControl {
    /// Creates an idle control surface
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            paused: Arc::new(AtomicBool::new(false)),
            resume_notify: Arc::new(Notify::new()),
            checkpoint_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The cancellation token driving this run
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Signals cancellation; observed at the next suspension point
    pub fn cancel(&self) {
        self.cancel.cancel();
        // Unpark a paused pipeline so it can observe the cancel
        self.resume_notify.notify_waiters();
    }

    /// Whether cancellation was signalled
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Freezes dispatch of new chunks at the next boundary
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    /// Unfreezes a paused pipeline
    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.resume_notify.notify_waiters();
    }

    /// Whether the pipeline is paused
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Requests a checkpoint at the next chunk boundary
    pub fn request_checkpoint(&self) {
        self.checkpoint_requested.store(true, Ordering::SeqCst);
    }

    fn take_checkpoint_request(&self) -> bool {
        self.checkpoint_requested.swap(false, Ordering::SeqCst)
    }

    /// Parks while paused; returns a cancellation error if cancelled
    /// while parked.
    async fn wait_if_paused(&self) -> Result<(), EngineError> {
        while self.is_paused() {
            if self.is_cancelled() {
                return Err(EngineError::Cancelled("cancelled while paused".to_string()));
            }
            let notified = self.resume_notify.notified();
            tokio::pin!(notified);
            // Register for wakeups before the final flag check, so a
            // resume() landing in between is not lost
            notified.as_mut().enable();
            if !self.is_paused() || self.is_cancelled() {
                continue;
            }
            notified.await;
        }
        if self.is_cancelled() {
            return Err(EngineError::Cancelled("operation cancelled".to_string()));
        }
        Ok(())
    }
}

impl Default for PipelineControl {
    fn default() -> Self {
        Self::new()
    }
}

/// The chunked streaming processor.
pub struct StreamingProcessor {
    processors: HashMap<ProcessorKind, Arc<dyn ChunkProcessor>>,
    progress: Arc<dyn ProgressPort>,
    scratch: Arc<dyn ScratchSpace>,
    resolver: Arc<dyn PatternPort>,
    governor: Arc<ResourceGovernor>,
    checkpoint_root: PathBuf,
    checkpoint_interval: u64,
    max_checkpoints: usize,
}

impl StreamingProcessor {
    /// Wires the processor to its capabilities and configuration.
    pub fn new(
        progress: Arc<dyn ProgressPort>,
        scratch: Arc<dyn ScratchSpace>,
        resolver: Arc<dyn PatternPort>,
        governor: Arc<ResourceGovernor>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            processors: default_registry(),
            progress,
            scratch,
            resolver,
            governor,
            checkpoint_root: config.checkpoint_root(),
            checkpoint_interval: config.checkpoint_interval_chunks.max(1),
            max_checkpoints: config.max_checkpoints.max(1),
        }
    }

    /// Registry metadata for every available processor.
    pub fn available_processors(&self) -> Vec<ProcessorInfo> {
        ProcessorKind::all()
            .iter()
            .filter_map(|kind| self.processors.get(kind))
            .map(|p| p.info())
            .collect()
    }

    /// Coarse duration estimate from per-processor rate heuristics; reads
    /// only size metadata.
    pub async fn estimate(&self, request: &ProcessFileRequest) -> Result<ProcessingEstimate, EngineError> {
        let processor = self.lookup(request.processor)?;
        let input_bytes = tokio::fs::metadata(&request.input_path)
            .await
            .map_err(|e| EngineError::IoError(format!("Failed to stat {}: {}", request.input_path.display(), e)))?
            .len();

        let rate = processor.info().rate_bps.max(1);
        Ok(ProcessingEstimate {
            input_bytes,
            assumed_rate_bps: rate,
            estimated_seconds: input_bytes as f64 / rate as f64,
            estimated_chunks: request.effective_chunk_size().chunks_needed(input_bytes),
        })
    }

    fn lookup(&self, kind: ProcessorKind) -> Result<Arc<dyn ChunkProcessor>, EngineError> {
        self.processors
            .get(&kind)
            .cloned()
            .ok_or_else(|| EngineError::InvalidRequest(format!("No processor registered for kind '{}'", kind)))
    }

    /// Validates a request's surface: processor registered, options valid,
    /// input readable.
    async fn validate_request(&self, request: &ProcessFileRequest) -> Result<Arc<dyn ChunkProcessor>, EngineError> {
        let processor = self.lookup(request.processor)?;
        processor.validate_options(&request.options)?;
        if !tokio::fs::try_exists(&request.input_path).await.unwrap_or(false) {
            return Err(EngineError::InvalidRequest(format!(
                "Input file {} does not exist",
                request.input_path.display()
            )));
        }
        Ok(processor)
    }

    /// Runs a request from the beginning.
    pub async fn process_file(
        &self,
        request: &ProcessFileRequest,
        operation_id: OperationId,
        control: &PipelineControl,
    ) -> Result<ProcessFileResult, EngineError> {
        self.run_pipeline(request, operation_id, control, None).await
    }

    /// Replays a request from a checkpoint.
    pub async fn resume_file(
        &self,
        request: &ProcessFileRequest,
        operation_id: OperationId,
        checkpoint: StreamCheckpoint,
        control: &PipelineControl,
    ) -> Result<ProcessFileResult, EngineError> {
        if checkpoint.file_path != request.input_path {
            return Err(EngineError::CheckpointMissing(format!(
                "checkpoint belongs to {}, not {}",
                checkpoint.file_path.display(),
                request.input_path.display()
            )));
        }
        self.run_pipeline(request, operation_id, control, Some(checkpoint)).await
    }

    async fn run_pipeline(
        &self,
        request: &ProcessFileRequest,
        operation_id: OperationId,
        control: &PipelineControl,
        resume: Option<StreamCheckpoint>,
    ) -> Result<ProcessFileResult, EngineError> {
        let processor = self.validate_request(request).await?;
        let chunk_size = request.effective_chunk_size().bytes();
        let started = std::time::Instant::now();

        let input_size = tokio::fs::metadata(&request.input_path)
            .await
            .map_err(|e| EngineError::IoError(format!("Failed to stat input: {}", e)))?
            .len();

        let output_path = match &request.output_path {
            Some(path) => path.clone(),
            None => {
                let extension = request
                    .compression
                    .extension_suffix()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "out".to_string());
                self.scratch
                    .create_file(Some("stream_out"), Some(&extension), Some(operation_id))
                    .await?
            }
        };

        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| EngineError::IoError(format!("Failed to create output dir: {}", e)))?;
        }

        let mut input = tokio::fs::File::open(&request.input_path)
            .await
            .map_err(|e| EngineError::IoError(format!("Failed to open input: {}", e)))?;

        // Counters, either fresh or replayed from the checkpoint
        let (mut position, mut chunks_done, mut lines_done, mut items_done, mut bytes_out) = match &resume {
            Some(cp) => {
                let items = cp
                    .custom_state
                    .get(CHECKPOINT_ITEMS_KEY)
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(0u64);
                (cp.position_bytes, cp.chunks_done, cp.lines_done, items, cp.output_position().unwrap_or(0))
            }
            None => (0, 0, 0, 0, 0),
        };

        let mut output = match &resume {
            Some(_) => {
                // Truncate to the checkpointed length, then append
                let file = tokio::fs::OpenOptions::new()
                    .write(true)
                    .create(true)
                    .open(&output_path)
                    .await
                    .map_err(|e| EngineError::IoError(format!("Failed to open output: {}", e)))?;
                file.set_len(bytes_out)
                    .await
                    .map_err(|e| EngineError::IoError(format!("Failed to truncate output: {}", e)))?;
                let mut file = file;
                file.seek(std::io::SeekFrom::End(0))
                    .await
                    .map_err(|e| EngineError::IoError(format!("Failed to seek output: {}", e)))?;
                file
            }
            None => tokio::fs::File::create(&output_path)
                .await
                .map_err(|e| EngineError::IoError(format!("Failed to create output: {}", e)))?,
        };

        if resume.is_some() {
            input
                .seek(std::io::SeekFrom::Start(position))
                .await
                .map_err(|e| EngineError::IoError(format!("Failed to seek input: {}", e)))?;
        }

        // Everything fallible from here on marks the record failed, so a
        // progress reader never sees an abandoned in-flight record
        let name = request
            .name
            .clone()
            .unwrap_or_else(|| format!("stream:{}", request.processor));
        if self.progress.get(operation_id).is_none() {
            self.progress.create(operation_id, &name, input_size);
        }
        self.progress
            .set_totals(operation_id, input_size, request.effective_chunk_size().chunks_needed(input_size));
        self.progress
            .set_phase(operation_id, if resume.is_some() { "Resumed" } else { "Processing" });

        let outcome = self
            .chunk_loop(
                ChunkLoopState {
                    request,
                    processor: processor.as_ref(),
                    operation_id,
                    control,
                    input_size,
                    chunk_size,
                },
                &mut input,
                &mut output,
                &mut position,
                &mut chunks_done,
                &mut lines_done,
                &mut items_done,
                &mut bytes_out,
            )
            .await;

        // Flush even when the loop errored: partial output stays durable
        let flushed = output
            .flush()
            .await
            .map_err(|e| EngineError::IoError(format!("Failed to flush output: {}", e)));

        let mut checkpoints_emitted = match (outcome, flushed) {
            (Ok(count), Ok(())) => count,
            (Err(e), _) | (Ok(_), Err(e)) => {
                self.progress.fail(operation_id);
                return Err(e);
            }
        };

        if request.enable_checkpoints {
            // Final checkpoint at EOF
            match self
                .emit_checkpoint(operation_id, request, position, chunks_done, lines_done, items_done, bytes_out)
                .await
            {
                Ok(_) => checkpoints_emitted += 1,
                Err(e) => {
                    self.progress.fail(operation_id);
                    return Err(e);
                }
            }
        }

        self.progress.complete(operation_id);
        Ok(ProcessFileResult {
            operation_id,
            input_path: request.input_path.clone(),
            output_path,
            bytes_in: position,
            bytes_out,
            chunks: chunks_done,
            lines: lines_done,
            items: items_done,
            duration_ms: started.elapsed().as_millis() as u64,
            checkpoints_emitted,
        })
    }

    /// The read-process-write loop. Returns the number of periodic/forced
    /// checkpoints emitted.
    #[allow(clippy::too_many_arguments)]
    async fn chunk_loop(
        &self,
        state: ChunkLoopState<'_>,
        input: &mut tokio::fs::File,
        output: &mut tokio::fs::File,
        position: &mut u64,
        chunks_done: &mut u64,
        lines_done: &mut u64,
        items_done: &mut u64,
        bytes_out: &mut u64,
    ) -> Result<u64, EngineError> {
        let mut buffer = vec![0u8; state.chunk_size];
        let mut checkpoints_emitted = 0u64;

        loop {
            if state.control.is_cancelled() {
                // Partial output stays where it is; scratch reclaims it
                return Err(EngineError::Cancelled("operation cancelled".to_string()));
            }
            state.control.wait_if_paused().await?;

            let n = read_full(input, &mut buffer)
                .await
                .map_err(|e| EngineError::IoError(format!("Read failed: {}", e)))?;
            if n == 0 {
                return Ok(checkpoints_emitted);
            }
            let is_last = *position + n as u64 >= state.input_size;
            let chunk = StreamChunk::new(*chunks_done, *position, buffer[..n].to_vec(), is_last)?;

            let processed = {
                // CPU token bounds concurrent processing across operations
                let _cpu = self.governor.acquire_cpu().await?;
                state.processor.process(&chunk, &state.request.options)?
            };
            let encoded = compress_chunk(&processed.data, state.request.compression)?;

            output
                .write_all(&encoded)
                .await
                .map_err(|e| EngineError::IoError(format!("Write failed: {}", e)))?;

            *position += n as u64;
            *chunks_done += 1;
            *lines_done += processed.lines;
            *items_done += processed.items;
            *bytes_out += encoded.len() as u64;

            self.progress.update(
                state.operation_id,
                ProgressUpdate {
                    bytes_done: *position,
                    chunks_done: Some(*chunks_done),
                    lines_done: Some(*lines_done),
                    items_done: Some(*items_done),
                },
            );

            let periodic = state.request.enable_checkpoints && chunks_done.is_multiple_of(self.checkpoint_interval);
            let forced = state.control.take_checkpoint_request();
            if periodic || forced {
                output
                    .flush()
                    .await
                    .map_err(|e| EngineError::IoError(format!("Flush failed: {}", e)))?;
                self.emit_checkpoint(
                    state.operation_id,
                    state.request,
                    *position,
                    *chunks_done,
                    *lines_done,
                    *items_done,
                    *bytes_out,
                )
                .await?;
                checkpoints_emitted += 1;
            }

            if is_last {
                return Ok(checkpoints_emitted);
            }
        }
    }

    /// Directory holding one operation's checkpoints
    pub fn checkpoint_dir(&self, operation_id: OperationId) -> PathBuf {
        self.checkpoint_root.join(operation_id.to_string())
    }

    #[allow(clippy::too_many_arguments)]
    async fn emit_checkpoint(
        &self,
        operation_id: OperationId,
        request: &ProcessFileRequest,
        position: u64,
        chunks_done: u64,
        lines_done: u64,
        items_done: u64,
        bytes_out: u64,
    ) -> Result<StreamCheckpoint, EngineError> {
        let mut checkpoint = StreamCheckpoint::new(request.input_path.clone(), position, chunks_done, lines_done);
        checkpoint
            .custom_state
            .insert(CHECKPOINT_OUTPUT_POSITION_KEY.to_string(), bytes_out.to_string());
        checkpoint
            .custom_state
            .insert(CHECKPOINT_ITEMS_KEY.to_string(), items_done.to_string());

        let dir = self.checkpoint_dir(operation_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| EngineError::IoError(format!("Failed to create checkpoint dir: {}", e)))?;
        let path = dir.join(checkpoint.file_name());
        let bytes = serde_json::to_vec_pretty(&checkpoint)?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| EngineError::IoError(format!("Failed to write checkpoint: {}", e)))?;

        self.prune_checkpoints(&dir).await;
        tracing::debug!(
            "Checkpoint {} for operation {} at input byte {}",
            checkpoint.checkpoint_id,
            operation_id,
            position
        );
        Ok(checkpoint)
    }

    /// Keeps at most `max_checkpoints` files, dropping the oldest.
    async fn prune_checkpoints(&self, dir: &Path) {
        let mut checkpoints = self.read_checkpoints(dir).await;
        if checkpoints.len() <= self.max_checkpoints {
            return;
        }
        checkpoints.sort_by_key(|cp| cp.created_at);
        let excess = checkpoints.len() - self.max_checkpoints;
        for checkpoint in checkpoints.into_iter().take(excess) {
            let path = dir.join(checkpoint.file_name());
            if let Err(e) = tokio::fs::remove_file(&path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("Failed to prune checkpoint {}: {}", path.display(), e);
                }
            }
        }
    }

    async fn read_checkpoints(&self, dir: &Path) -> Vec<StreamCheckpoint> {
        let mut out = Vec::new();
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(_) => return out,
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            let is_checkpoint = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("checkpoint_") && n.ends_with(".json"))
                .unwrap_or(false);
            if !is_checkpoint {
                continue;
            }
            match tokio::fs::read(&path).await {
                Ok(bytes) => match serde_json::from_slice::<StreamCheckpoint>(&bytes) {
                    Ok(checkpoint) => out.push(checkpoint),
                    Err(e) => tracing::warn!("Ignoring unreadable checkpoint {}: {}", path.display(), e),
                },
                Err(e) => tracing::warn!("Failed to read checkpoint {}: {}", path.display(), e),
            }
        }
        out
    }

    /// Loads a specific checkpoint of an operation.
    pub async fn load_checkpoint(
        &self,
        operation_id: OperationId,
        checkpoint_id: &str,
    ) -> Result<StreamCheckpoint, EngineError> {
        let dir = self.checkpoint_dir(operation_id);
        let path = dir.join(format!("checkpoint_{}.json", checkpoint_id));
        let bytes = tokio::fs::read(&path).await.map_err(|_| {
            EngineError::CheckpointMissing(format!("checkpoint {} of operation {}", checkpoint_id, operation_id))
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Most recent checkpoint of an operation, if any.
    pub async fn latest_checkpoint(&self, operation_id: OperationId) -> Option<StreamCheckpoint> {
        let mut checkpoints = self.read_checkpoints(&self.checkpoint_dir(operation_id)).await;
        checkpoints.sort_by_key(|cp| cp.created_at);
        checkpoints.pop()
    }

    /// All retained checkpoints of an operation, oldest first.
    pub async fn list_checkpoints(&self, operation_id: OperationId) -> Vec<StreamCheckpoint> {
        let mut checkpoints = self.read_checkpoints(&self.checkpoint_dir(operation_id)).await;
        checkpoints.sort_by_key(|cp| cp.created_at);
        checkpoints
    }

    /// Removes an operation's checkpoint directory.
    pub async fn remove_checkpoints(&self, operation_id: OperationId) {
        let dir = self.checkpoint_dir(operation_id);
        if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to remove checkpoint dir {}: {}", dir.display(), e);
            }
        }
    }

    /// Fans a transformation out over many files.
    pub async fn bulk_transform(&self, request: &BulkTransformRequest) -> Result<BulkTransformResult, EngineError> {
        self.bulk_transform_cancellable(request, &PipelineControl::new()).await
    }

    /// Bulk fan-out under a caller-supplied control surface.
    pub async fn bulk_transform_cancellable(
        &self,
        request: &BulkTransformRequest,
        control: &PipelineControl,
    ) -> Result<BulkTransformResult, EngineError> {
        // Processor and options are validated once, before any dispatch
        let processor = self.lookup(request.processor)?;
        processor.validate_options(&request.options)?;

        let started = std::time::Instant::now();
        let operation_id = OperationId::new();
        self.progress
            .create(operation_id, &format!("bulk_transform:{}", request.processor), 0);
        self.progress.set_phase(operation_id, "Resolving");

        let filter = PatternFilter {
            include_hidden: false,
            exclude_patterns: Vec::new(),
            max_file_size: None,
            file_pattern: request.file_pattern.clone(),
            recursive: Some(request.recursive),
        };
        let resolved = self.resolver.resolve(&request.inputs, &filter).await;
        let skipped: Vec<(PathBuf, String)> = resolved
            .skipped
            .into_iter()
            .map(|entry| (entry.path, entry.reason))
            .collect();

        tokio::fs::create_dir_all(&request.output_dir)
            .await
            .map_err(|e| EngineError::IoError(format!("Failed to create output dir: {}", e)))?;

        self.progress.set_totals(operation_id, 0, resolved.files.len() as u64);
        self.progress.set_phase(operation_id, "Processing");

        let base = common_ancestor(&resolved.files);
        let width = self.governor.dispatch_width(request.parallelism);

        let mut stream = futures::stream::iter(resolved.files.into_iter().map(|input| {
            let output = self.map_output_path(request, base.as_deref(), &input);
            let file_request = ProcessFileRequest {
                input_path: input.clone(),
                output_path: Some(output),
                processor: request.processor,
                options: request.options.clone(),
                chunk_size: request.chunk_size,
                compression: request.compression,
                enable_checkpoints: false,
                name: None,
            };
            let control = control.clone();
            async move {
                // Per-file child operation; the bulk operation tracks items
                let child = OperationId::new();
                let outcome = self.run_pipeline(&file_request, child, &control, None).await;
                self.progress.remove(child);
                (input, outcome)
            }
        }))
        .buffer_unordered(width);

        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        let mut done = 0u64;
        while let Some((input, outcome)) = stream.next().await {
            done += 1;
            self.progress.update(
                operation_id,
                ProgressUpdate {
                    bytes_done: 0,
                    chunks_done: Some(done),
                    items_done: Some(done),
                    ..Default::default()
                },
            );
            match outcome {
                Ok(result) => succeeded.push(result),
                Err(e) => failed.push((input, e.to_string())),
            }
            if control.is_cancelled() {
                break;
            }
        }

        if control.is_cancelled() {
            self.progress.fail(operation_id);
        } else {
            self.progress.complete(operation_id);
        }

        Ok(BulkTransformResult {
            operation_id,
            total_bytes_in: succeeded.iter().map(|r| r.bytes_in).sum(),
            total_bytes_out: succeeded.iter().map(|r| r.bytes_out).sum(),
            succeeded,
            failed,
            skipped,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Maps an input into the output directory, mirroring relative
    /// structure when requested.
    fn map_output_path(&self, request: &BulkTransformRequest, base: Option<&Path>, input: &Path) -> PathBuf {
        let relative: PathBuf = if request.preserve_dirs {
            match base.and_then(|b| input.strip_prefix(b).ok()) {
                Some(rel) => rel.to_path_buf(),
                None => PathBuf::from(input.file_name().unwrap_or_default()),
            }
        } else {
            PathBuf::from(input.file_name().unwrap_or_default())
        };

        let mut output = request.output_dir.join(relative);
        if let Some(suffix) = request.compression.extension_suffix() {
            let name = output
                .file_name()
                .map(|n| format!("{}.{}", n.to_string_lossy(), suffix))
                .unwrap_or_else(|| format!("output.{}", suffix));
            output.set_file_name(name);
        }
        output
    }
}

/// Shared read-only state for one chunk loop invocation.
struct ChunkLoopState<'a> {
    request: &'a ProcessFileRequest,
    processor: &'a dyn ChunkProcessor,
    operation_id: OperationId,
    control: &'a PipelineControl,
    input_size: u64,
    chunk_size: usize,
}

/// Reads until the buffer is full or EOF, so chunk boundaries are a pure
/// function of chunk size.
async fn read_full(file: &mut tokio::fs::File, buffer: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0usize;
    while filled < buffer.len() {
        let n = file.read(&mut buffer[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Deepest common ancestor of a set of absolute paths.
fn common_ancestor(paths: &[PathBuf]) -> Option<PathBuf> {
    let first = paths.first()?;
    let mut ancestor = first.parent()?.to_path_buf();
    for path in &paths[1..] {
        while !path.starts_with(&ancestor) {
            ancestor = ancestor.parent()?.to_path_buf();
        }
    }
    Some(ancestor)
}
