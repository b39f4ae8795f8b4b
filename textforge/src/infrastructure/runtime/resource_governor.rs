// /////////////////////////////////////////////////////////////////////////////
// Textforge
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Resource Governor
//!
//! Process-wide resource coordination for the engines. The process hosts a
//! single scheduler: every per-file dispatch in the bulk-edit engine, the
//! streaming fan-out, and the stream operation manager draws from the same
//! processor-count-bounded budget, so running several bulk operations
//! concurrently cannot oversubscribe the machine.
//!
//! ## Design
//!
//! Two token pools, implemented as counting semaphores:
//!
//! - **CPU tokens** gate per-file/per-chunk work. The pool size equals the
//!   processor count.
//! - **I/O tokens** gate concurrent file copies (snapshot creation and
//!   restore), where device queue depth - not core count - is the limit.
//!
//! Permits are RAII guards: dropping one releases the token, so an
//! unwinding task (error or cancellation) can never leak budget. No lock
//! is held across I/O; the semaphores only gate dispatch count.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use textforge_domain::EngineError;

/// Default I/O token count; a mid-range SSD queue depth.
const DEFAULT_IO_TOKENS: usize = 12;

/// Configuration for the resource governor.
#[derive(Debug, Clone, Default)]
pub struct GovernorConfig {
    /// Override for the CPU token pool; processor count when absent
    pub cpu_tokens: Option<usize>,
    /// Override for the I/O token pool
    pub io_tokens: Option<usize>,
}

/// Process-wide dispatch budget shared by every engine.
pub struct ResourceGovernor {
    cpu_tokens: Arc<Semaphore>,
    io_tokens: Arc<Semaphore>,
    cpu_token_count: usize,
    io_token_count: usize,
}

impl ResourceGovernor {
    /// Creates a governor with the given configuration.
    pub fn new(config: GovernorConfig) -> Self {
        let processors = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
        let cpu_token_count = config.cpu_tokens.unwrap_or(processors).max(1);
        let io_token_count = config.io_tokens.unwrap_or(DEFAULT_IO_TOKENS).max(1);

        Self {
            cpu_tokens: Arc::new(Semaphore::new(cpu_token_count)),
            io_tokens: Arc::new(Semaphore::new(io_token_count)),
            cpu_token_count,
            io_token_count,
        }
    }

    /// Creates a governor sized from the host's processor count.
    pub fn from_processors() -> Self {
        Self::new(GovernorConfig::default())
    }

    /// Acquires a CPU token, waiting when the budget is saturated.
    ///
    /// The returned permit is owned, so tasks spawned onto the runtime can
    /// carry it across `await` points; it releases on drop.
    pub async fn acquire_cpu(&self) -> Result<OwnedSemaphorePermit, EngineError> {
        self.cpu_tokens
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| EngineError::InternalError("CPU token semaphore closed".to_string()))
    }

    /// Acquires an I/O token for a file copy.
    pub async fn acquire_io(&self) -> Result<OwnedSemaphorePermit, EngineError> {
        self.io_tokens
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| EngineError::InternalError("I/O token semaphore closed".to_string()))
    }

    /// Size of the CPU token pool (the dispatch parallelism budget)
    pub fn cpu_token_count(&self) -> usize {
        self.cpu_token_count
    }

    /// Size of the I/O token pool
    pub fn io_token_count(&self) -> usize {
        self.io_token_count
    }

    /// CPU tokens currently unclaimed; visibility into saturation
    pub fn cpu_tokens_available(&self) -> usize {
        self.cpu_tokens.available_permits()
    }

    /// I/O tokens currently unclaimed
    pub fn io_tokens_available(&self) -> usize {
        self.io_tokens.available_permits()
    }

    /// Effective per-operation dispatch width: the request's cap bounded by
    /// the global budget.
    pub fn dispatch_width(&self, requested: Option<usize>) -> usize {
        match requested {
            Some(cap) => cap.clamp(1, self.cpu_token_count),
            None => self.cpu_token_count,
        }
    }
}

impl Default for ResourceGovernor {
    fn default() -> Self {
        Self::from_processors()
    }
}
