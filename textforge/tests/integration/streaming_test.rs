// /////////////////////////////////////////////////////////////////////////////
// Textforge
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Streaming processor workflows: end-to-end transforms, checkpoint
//! resume byte-equality, retention, bulk fan-out, and estimation.

use textforge::application::services::PipelineControl;
use textforge::infrastructure::services::compression::decompress_all;
use textforge_domain::{
    BulkTransformRequest, ChunkSize, CompressionKind, EngineError, OperationId, ProcessFileRequest, ProcessorKind,
};

use super::common::Harness;

/// A harness whose pipeline checkpoints after every chunk.
async fn checkpointing_harness() -> Harness {
    Harness::with_config(|config| config.checkpoint_interval_chunks = 1).await
}

fn small_chunks() -> ChunkSize {
    ChunkSize::new(256).unwrap()
}

/// Ten chunks of deterministic lowercase text.
fn sample_text() -> Vec<u8> {
    let mut text = Vec::new();
    let mut line = 0usize;
    while text.len() < 10 * 256 {
        text.extend_from_slice(format!("line {:04} of streaming text\n", line).as_bytes());
        line += 1;
    }
    text.truncate(10 * 256);
    text
}

#[tokio::test]
async fn line_processor_end_to_end() {
    let harness = Harness::new().await;
    let input = harness.write_file("input.txt", "hello\nworld\n").await;
    let output = harness.workspace.join("output.txt");

    let request = ProcessFileRequest::new(input, ProcessorKind::Line)
        .with_output(output.clone())
        .with_options(serde_json::json!({"transform": "uppercase"}));

    let result = harness
        .processor
        .process_file(&request, OperationId::new(), &PipelineControl::new())
        .await
        .unwrap();

    assert_eq!(harness.read_file(&output).await, b"HELLO\nWORLD\n");
    assert_eq!(result.bytes_in, 12);
    assert_eq!(result.lines, 2);
    assert_eq!(result.chunks, 1);
}

#[tokio::test]
async fn interrupted_run_resumed_from_checkpoint_is_byte_identical() {
    let harness = checkpointing_harness().await;
    let payload = sample_text();
    let input = harness.write_file("big.txt", &payload).await;

    // Clean run with per-chunk checkpoints
    let clean_output = harness.workspace.join("clean.out");
    let request = ProcessFileRequest::new(input.clone(), ProcessorKind::Line)
        .with_output(clean_output.clone())
        .with_options(serde_json::json!({"transform": "uppercase"}))
        .with_chunk_size(small_chunks())
        .with_checkpoints();

    let clean_op = OperationId::new();
    let clean = harness
        .processor
        .process_file(&request, clean_op, &PipelineControl::new())
        .await
        .unwrap();
    assert_eq!(clean.chunks, 10);
    let clean_bytes = harness.read_file(&clean_output).await;
    assert_eq!(clean_bytes.len(), payload.len());

    // Chunk 5's checkpoint survived retention (only the oldest was pruned)
    let checkpoints = harness.processor.list_checkpoints(clean_op).await;
    assert!(checkpoints.len() <= 10);
    let cp5 = checkpoints
        .iter()
        .find(|cp| cp.chunks_done == 5)
        .expect("checkpoint after chunk 5")
        .clone();
    assert_eq!(cp5.position_bytes, 5 * 256);

    // Simulate a crash after the checkpoint: output holds the checkpointed
    // prefix plus garbage written past it
    let resumed_output = harness.workspace.join("resumed.out");
    let mut partial = clean_bytes[..cp5.output_position().unwrap() as usize].to_vec();
    partial.extend_from_slice(b"GARBAGE PAST THE CHECKPOINT");
    tokio::fs::write(&resumed_output, &partial).await.unwrap();

    let resume_request = ProcessFileRequest::new(input, ProcessorKind::Line)
        .with_output(resumed_output.clone())
        .with_options(serde_json::json!({"transform": "uppercase"}))
        .with_chunk_size(small_chunks())
        .with_checkpoints();

    let resumed = harness
        .processor
        .resume_file(&resume_request, OperationId::new(), cp5, &PipelineControl::new())
        .await
        .unwrap();

    // Byte-equal to the uninterrupted run
    assert_eq!(harness.read_file(&resumed_output).await, clean_bytes);
    assert_eq!(resumed.chunks, 10);
    assert_eq!(resumed.bytes_in, payload.len() as u64);
}

#[tokio::test]
async fn checkpoint_retention_keeps_at_most_ten() {
    let harness = checkpointing_harness().await;
    // 25 chunks of 64 bytes
    let payload = vec![b'x'; 25 * 64];
    let input = harness.write_file("many_chunks.bin", &payload).await;

    let request = ProcessFileRequest::new(input, ProcessorKind::Binary)
        .with_output(harness.workspace.join("many_chunks.out"))
        .with_chunk_size(ChunkSize::new(64).unwrap())
        .with_checkpoints();

    let op = OperationId::new();
    let result = harness
        .processor
        .process_file(&request, op, &PipelineControl::new())
        .await
        .unwrap();
    assert_eq!(result.chunks, 25);
    // 25 periodic checkpoints plus the final one were emitted
    assert_eq!(result.checkpoints_emitted, 26);

    let retained = harness.processor.list_checkpoints(op).await;
    assert_eq!(retained.len(), 10, "retention keeps exactly the last 10");
    // The newest retained checkpoint is the final one
    assert_eq!(retained.last().unwrap().position_bytes, payload.len() as u64);
}

#[tokio::test]
async fn cancelled_control_fails_with_cancellation() {
    let harness = Harness::new().await;
    let input = harness.write_file("input.txt", "data").await;

    let control = PipelineControl::new();
    control.cancel();

    let request = ProcessFileRequest::new(input, ProcessorKind::Binary)
        .with_output(harness.workspace.join("never.out"));
    let err = harness
        .processor
        .process_file(&request, OperationId::new(), &control)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Cancelled(_)));
}

#[tokio::test]
async fn invalid_processor_options_fail_before_any_file_io() {
    let harness = Harness::new().await;
    let input = harness.write_file("input.txt", "data").await;
    let output = harness.workspace.join("untouched.out");

    // Regex processor requires a pattern
    let request = ProcessFileRequest::new(input, ProcessorKind::Regex).with_output(output.clone());
    let err = harness
        .processor
        .process_file(&request, OperationId::new(), &PipelineControl::new())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ValidationError(_)));
    assert!(!output.exists(), "output must not be created for an invalid request");
}

#[tokio::test]
async fn missing_checkpoint_on_resume_is_an_error() {
    let harness = Harness::new().await;
    let err = harness
        .processor
        .load_checkpoint(OperationId::new(), "00000000-0000-0000-0000-000000000000")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::CheckpointMissing(_)));
}

#[tokio::test]
async fn bulk_transform_preserves_directory_structure() {
    let harness = Harness::new().await;
    harness.write_file("in/top.txt", "top\n").await;
    harness.write_file("in/nested/deep.txt", "deep\n").await;
    let input_dir = harness.workspace.join("in");
    let output_dir = harness.workspace.join("out");

    let mut request = BulkTransformRequest::new(
        vec![input_dir.to_string_lossy().to_string()],
        output_dir.clone(),
        ProcessorKind::Line,
    );
    request.options = serde_json::json!({"transform": "uppercase"});
    request.preserve_dirs = true;

    let result = harness.processor.bulk_transform(&request).await.unwrap();
    assert_eq!(result.succeeded.len(), 2);
    assert!(result.failed.is_empty());

    assert_eq!(harness.read_file(&output_dir.join("top.txt")).await, b"TOP\n");
    assert_eq!(
        harness.read_file(&output_dir.join("nested/deep.txt")).await,
        b"DEEP\n"
    );
}

#[tokio::test]
async fn bulk_transform_flat_mapping_and_file_pattern() {
    let harness = Harness::new().await;
    harness.write_file("in/a.txt", "a").await;
    harness.write_file("in/b.log", "b").await;
    let input_dir = harness.workspace.join("in");
    let output_dir = harness.workspace.join("flat");

    let mut request = BulkTransformRequest::new(
        vec![input_dir.to_string_lossy().to_string()],
        output_dir.clone(),
        ProcessorKind::Binary,
    );
    request.file_pattern = Some("*.txt".to_string());

    let result = harness.processor.bulk_transform(&request).await.unwrap();
    assert_eq!(result.succeeded.len(), 1);
    assert!(output_dir.join("a.txt").exists());
    assert!(!output_dir.join("b.log").exists());
}

#[tokio::test]
async fn compressed_output_decodes_to_the_transformed_bytes() {
    let harness = Harness::new().await;
    let payload = sample_text();
    harness.write_file("in/data.txt", &payload).await;
    let input_dir = harness.workspace.join("in");
    let output_dir = harness.workspace.join("gz");

    let mut request = BulkTransformRequest::new(
        vec![input_dir.to_string_lossy().to_string()],
        output_dir.clone(),
        ProcessorKind::Binary,
    );
    request.compression = CompressionKind::Gzip;
    request.chunk_size = Some(small_chunks());

    let result = harness.processor.bulk_transform(&request).await.unwrap();
    assert_eq!(result.succeeded.len(), 1);

    let compressed = harness.read_file(&output_dir.join("data.txt.gz")).await;
    let decoded = decompress_all(&compressed, CompressionKind::Gzip).unwrap();
    assert_eq!(decoded, payload);
}

#[tokio::test]
async fn estimate_uses_size_metadata_and_rate_heuristics() {
    let harness = Harness::new().await;
    let input = harness.write_file("estimate.bin", vec![0u8; 1000]).await;

    let request = ProcessFileRequest::new(input, ProcessorKind::Binary).with_chunk_size(small_chunks());
    let estimate = harness.processor.estimate(&request).await.unwrap();

    assert_eq!(estimate.input_bytes, 1000);
    assert_eq!(estimate.estimated_chunks, 4);
    assert!(estimate.assumed_rate_bps > 0);
    assert!(estimate.estimated_seconds > 0.0);
}

#[tokio::test]
async fn managed_operation_lifecycle_end_to_end() {
    use textforge_domain::StreamStatus;

    let harness = Harness::new().await;
    let input = harness.write_file("managed.txt", "lifecycle\n").await;

    let id = harness
        .manager
        .create("managed copy", ProcessFileRequest::new(input, ProcessorKind::Binary));
    harness.manager.start(id).unwrap();
    harness.manager.join(id).await.unwrap();

    let operation = harness.manager.get(id).await.unwrap();
    assert_eq!(operation.status, StreamStatus::Completed);
    assert!(operation.started_at.is_some());
    assert!(operation.completed_at.is_some());
    assert!(harness.manager.list(10, true).iter().any(|o| o.operation_id == id));
}

#[tokio::test]
async fn available_processors_lists_all_kinds() {
    let harness = Harness::new().await;
    let processors = harness.processor.available_processors();
    assert_eq!(processors.len(), 4);
    for kind in ProcessorKind::all() {
        assert!(processors.iter().any(|p| p.kind == kind));
    }
}
