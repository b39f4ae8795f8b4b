// /////////////////////////////////////////////////////////////////////////////
// Textforge
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Operation Identifier
//!
//! Type-safe identifier for externally visible units of work. Every bulk
//! edit, streaming job, and bulk transform is identified by an
//! [`OperationId`], which callers use to poll progress, cancel, pause, or
//! resume.
//!
//! ## Design
//!
//! - **Type Safety**: An `OperationId` cannot be confused with a
//!   [`crate::RollbackId`] even though both wrap UUIDs
//! - **Immutable**: Once created, an id never changes
//! - **Serializable**: Serializes as a plain UUID string for
//!   interoperability with callers and metadata documents

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::EngineError;

/// Type-safe identifier for an externally visible operation.
///
/// Generated as a fresh v4 UUID. Callers treat it as opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(Uuid);

impl OperationId {
    /// Creates a new random operation id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OperationId {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| EngineError::InvalidRequest(format!("Invalid operation id '{}': {}", s, e)))
    }
}
