// /////////////////////////////////////////////////////////////////////////////
// Textforge
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Bootstrap Logger
//!
//! Logging abstraction for the bootstrap phase: wiring the stores,
//! starting the background sweepers, tearing the engines down.
//!
//! ## Design
//!
//! The trait has a single required method, [`BootstrapLogger::log`],
//! taking an explicit [`LogLevel`]; the per-level helpers are provided on
//! top of it. That keeps implementations one function long and lets test
//! doubles capture level and message together.
//!
//! Three implementations ship with the crate:
//!
//! - [`ConsoleLogger`] - routes through `tracing`, attaching the wiring
//!   stage as a structured field so a subscriber can filter setup noise
//!   from engine traffic
//! - [`MemoryLogger`] - collects lines for assertions in wiring tests
//! - [`NoOpLogger`] - discards everything
//!
//! ## Usage
//!
//! ```rust
//! use textforge_bootstrap::logger::{BootstrapLogger, ConsoleLogger};
//!
//! let logger = ConsoleLogger::for_stage("store-recovery");
//! logger.info("scanning rollback root for restorable sessions");
//! logger.debug("3 session directories found");
//! ```

use std::fmt;
use std::sync::Mutex;

/// Verbosity of one bootstrap log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        write!(f, "{}", label)
    }
}

/// Bootstrap logging abstraction.
///
/// Implement [`log`](Self::log); the level helpers are provided.
pub trait BootstrapLogger: Send + Sync {
    /// Emits one line at the given level.
    fn log(&self, level: LogLevel, message: &str);

    /// Fatal problems that will abort engine wiring.
    fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }

    /// Non-fatal problems (missing optional config, ignorable sweep
    /// failures).
    fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    /// Normal wiring progress.
    fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    /// Detailed diagnostics.
    fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }
}

/// Tracing-backed logger for production wiring.
///
/// Lines land under the `textforge_bootstrap` target with the wiring
/// stage as a structured field.
pub struct ConsoleLogger {
    stage: String,
}

impl ConsoleLogger {
    /// Creates a logger for the overall startup stage
    pub fn new() -> Self {
        Self::for_stage("startup")
    }

    /// Creates a logger labelled with a specific wiring stage
    pub fn for_stage(stage: impl Into<String>) -> Self {
        Self { stage: stage.into() }
    }

    /// The stage this logger labels its lines with
    pub fn stage(&self) -> &str {
        &self.stage
    }
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl BootstrapLogger for ConsoleLogger {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Error => {
                tracing::error!(target: "textforge_bootstrap", stage = %self.stage, "{}", message)
            }
            LogLevel::Warn => {
                tracing::warn!(target: "textforge_bootstrap", stage = %self.stage, "{}", message)
            }
            LogLevel::Info => {
                tracing::info!(target: "textforge_bootstrap", stage = %self.stage, "{}", message)
            }
            LogLevel::Debug => {
                tracing::debug!(target: "textforge_bootstrap", stage = %self.stage, "{}", message)
            }
        }
    }
}

/// In-memory logger for asserting on wiring behavior in tests.
#[derive(Default)]
pub struct MemoryLogger {
    lines: Mutex<Vec<(LogLevel, String)>>,
}

impl MemoryLogger {
    /// Creates an empty memory logger
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the captured lines, in emission order
    pub fn lines(&self) -> Vec<(LogLevel, String)> {
        self.lines.lock().map(|lines| lines.clone()).unwrap_or_default()
    }

    /// Whether any captured line at `level` contains `needle`
    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.lines()
            .iter()
            .any(|(l, message)| *l == level && message.contains(needle))
    }
}

impl BootstrapLogger for MemoryLogger {
    fn log(&self, level: LogLevel, message: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push((level, message.to_string()));
        }
    }
}

/// Logger that discards every line.
pub struct NoOpLogger;

impl NoOpLogger {
    /// Creates a no-op logger
    pub fn new() -> Self {
        Self
    }
}

impl Default for NoOpLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl BootstrapLogger for NoOpLogger {
    fn log(&self, _level: LogLevel, _message: &str) {}
}
