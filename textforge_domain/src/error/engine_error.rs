// /////////////////////////////////////////////////////////////////////////////
// Textforge
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Error System
//!
//! This module provides the hierarchical error system shared by every
//! textforge component. It categorizes failures, provides actionable error
//! messages, and supports both automated recovery decisions and
//! human-readable diagnostics.
//!
//! ## Error Architecture
//!
//! Errors are organized into logical categories:
//!
//! #### Request Errors
//! - **InvalidRequest**: Malformed request surface (bad regex, empty file
//!   set, unsupported operation type) - always pre-dispatch
//! - **InvalidConfiguration**: Malformed engine configuration
//! - **ValidationError**: Well-formedness failures in edit ranges or
//!   processor options
//!
//! #### Processing Errors
//! - **ProcessingFailed**: General per-file or per-chunk processing failure
//! - **IntegrityError**: Checksum mismatch at snapshot or restore time
//! - **IoError**: File system failures (retried where transient)
//!
//! #### Lifecycle Errors
//! - **Cancelled**: Cooperative cancellation observed at a suspension point
//! - **OperationNotFound** / **RollbackNotFound**: Unknown identifiers
//! - **CheckpointMissing**: Resume requested without a usable checkpoint
//!
//! #### System Errors
//! - **ResourceExhausted**: Semaphore/permit or disk-space exhaustion
//! - **TimeoutError**: Wall-clock guard fired
//! - **SerializationError**: Metadata or checkpoint document (de)serialization
//! - **InternalError**: Unexpected failures that indicate a bug
//!
//! ## Error Handling Strategy
//!
//! File-level failures never abort a bulk operation (unless
//! `stop_on_first_error` is set); they are carried in the per-file results.
//! The aggregate carries an error only for pre-dispatch failures. Nothing
//! panics across the caller surface.

use thiserror::Error;

/// Domain-specific errors for the bulk-edit and streaming engines.
///
/// Each variant includes a descriptive message and is designed to provide
/// clear information about what went wrong and potentially how to fix it.
///
/// ## Design Principles
///
/// - **Specific**: Each error type represents a specific failure mode
/// - **Actionable**: Error messages provide enough context for debugging
/// - **Categorized**: Errors are grouped by type for systematic handling
/// - **Recoverable**: Some errors indicate retry-able conditions
#[derive(Error, Debug, Clone)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Processing failed: {0}")]
    ProcessingFailed(String),

    #[error("Integrity check failed: {0}")]
    IntegrityError(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("Timeout error: {0}")]
    TimeoutError(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Operation not found: {0}")]
    OperationNotFound(String),

    #[error("Rollback session not found: {0}")]
    RollbackNotFound(String),

    #[error("Checkpoint missing: {0}")]
    CheckpointMissing(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl EngineError {
    /// Creates a new configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Creates a new invalid-request error
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Creates a new processing error
    pub fn processing_failed(msg: impl Into<String>) -> Self {
        Self::ProcessingFailed(msg.into())
    }

    /// Creates a new integrity error
    pub fn integrity_error(msg: impl Into<String>) -> Self {
        Self::IntegrityError(msg.into())
    }

    /// Creates a new IO error
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::IoError(msg.into())
    }

    /// Creates a new cancellation error
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    /// Creates a new internal error
    pub fn internal_error(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }

    /// Checks if the error is recoverable
    ///
    /// Recoverable errors indicate transient conditions worth retrying;
    /// the snapshot copy path uses this to decide whether to back off.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EngineError::TimeoutError(_) | EngineError::ResourceExhausted(_) | EngineError::IoError(_)
        )
    }

    /// Checks if the error was caused by cooperative cancellation
    pub fn is_cancellation(&self) -> bool {
        matches!(self, EngineError::Cancelled(_))
    }

    /// Checks if the error is an integrity (checksum) failure
    pub fn is_integrity_error(&self) -> bool {
        matches!(self, EngineError::IntegrityError(_))
    }

    /// Checks if the error halts an operation before any file dispatch
    pub fn is_pre_dispatch(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidRequest(_) | EngineError::InvalidConfiguration(_) | EngineError::ValidationError(_)
        )
    }
}

impl From<std::io::Error> for EngineError {
    fn from(error: std::io::Error) -> Self {
        EngineError::IoError(error.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(error: serde_json::Error) -> Self {
        EngineError::SerializationError(error.to_string())
    }
}

impl From<regex::Error> for EngineError {
    fn from(error: regex::Error) -> Self {
        EngineError::InvalidRequest(format!("Invalid regular expression: {}", error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = EngineError::InvalidRequest("empty file set".to_string());
        assert_eq!(err.to_string(), "Invalid request: empty file set");

        let err = EngineError::IntegrityError("checksum mismatch".to_string());
        assert_eq!(err.to_string(), "Integrity check failed: checksum mismatch");
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(EngineError::IoError("disk hiccup".into()).is_recoverable());
        assert!(EngineError::TimeoutError("slow device".into()).is_recoverable());
        assert!(EngineError::ResourceExhausted("no permits".into()).is_recoverable());

        assert!(!EngineError::IntegrityError("bad checksum".into()).is_recoverable());
        assert!(!EngineError::InvalidRequest("bad regex".into()).is_recoverable());
        assert!(!EngineError::Cancelled("user".into()).is_recoverable());
    }

    #[test]
    fn test_pre_dispatch_classification() {
        assert!(EngineError::InvalidRequest("bad regex".into()).is_pre_dispatch());
        assert!(EngineError::ValidationError("bad range".into()).is_pre_dispatch());
        assert!(!EngineError::IoError("copy failed".into()).is_pre_dispatch());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: EngineError = io_err.into();
        assert!(matches!(err, EngineError::IoError(_)));
    }

    #[test]
    fn test_regex_error_conversion() {
        let bad = regex::Regex::new("[unclosed").unwrap_err();
        let err: EngineError = bad.into();
        assert!(matches!(err, EngineError::InvalidRequest(_)));
        assert!(err.is_pre_dispatch());
    }
}
