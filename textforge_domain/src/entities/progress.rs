// /////////////////////////////////////////////////////////////////////////////
// Textforge
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Operation Progress
//!
//! This module provides the per-operation progress record tracked by the
//! progress tracker. It owns the derived quantities - throughput and ETA -
//! so that callers only ever report raw counters.
//!
//! ## Invariants
//!
//! - Counters (`bytes_done`, `chunks_done`, `lines_done`, `items_done`)
//!   are non-decreasing across updates
//! - `bytes_done <= bytes_total` whenever `bytes_total > 0`
//! - `eta_seconds` is derived from the running speed estimate, never stored
//!   directly by the caller
//! - Speed estimation never divides by zero: same-instant updates reuse the
//!   previous estimate
//!
//! ## Speed Estimation
//!
//! Throughput is an exponential moving average of the instantaneous rate
//! between consecutive updates (weight 0.3 on the newest sample). The EMA
//! smooths bursty chunk completion without the memory cost of a sliding
//! window.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::value_objects::operation_id::OperationId;

/// Phase label for a freshly created record
pub const PHASE_INITIALIZING: &str = "Initializing";
/// Phase label for a successfully finished record
pub const PHASE_COMPLETED: &str = "Completed";
/// Phase label for a failed record
pub const PHASE_FAILED: &str = "Failed";

/// EMA weight applied to the newest speed sample
const SPEED_SMOOTHING: f64 = 0.3;

/// A raw progress report from an engine.
///
/// All counters are absolute ("done so far"), not deltas. `None` leaves the
/// corresponding counter untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressUpdate {
    /// Absolute bytes completed
    pub bytes_done: u64,
    /// Absolute chunks completed
    pub chunks_done: Option<u64>,
    /// Absolute lines completed
    pub lines_done: Option<u64>,
    /// Absolute items completed
    pub items_done: Option<u64>,
}

/// Progress snapshot for one operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressRecord {
    /// Operation this record belongs to
    pub operation_id: OperationId,
    /// Human-readable operation name
    pub name: String,
    /// Bytes completed so far
    pub bytes_done: u64,
    /// Total bytes expected (0 when unknown)
    pub bytes_total: u64,
    /// Chunks completed so far
    pub chunks_done: u64,
    /// Total chunks expected (0 when unknown)
    pub chunks_total: u64,
    /// Lines completed so far
    pub lines_done: u64,
    /// Items completed so far
    pub items_done: u64,
    /// Current phase label
    pub phase: String,
    /// When the record was created
    pub started_at: DateTime<Utc>,
    /// When the record last changed
    pub last_updated: DateTime<Utc>,
    /// Smoothed throughput estimate in bytes per second
    pub speed_bps: f64,
    /// Estimated seconds to completion, derived from `speed_bps`
    pub eta_seconds: Option<f64>,
    /// Free-form metadata attached by the engine
    pub metadata: HashMap<String, String>,
}

impl ProgressRecord {
    /// Creates a record in the `Initializing` phase.
    pub fn new(operation_id: OperationId, name: impl Into<String>, bytes_total: u64) -> Self {
        let now = Utc::now();
        Self {
            operation_id,
            name: name.into(),
            bytes_done: 0,
            bytes_total,
            chunks_done: 0,
            chunks_total: 0,
            lines_done: 0,
            items_done: 0,
            phase: PHASE_INITIALIZING.to_string(),
            started_at: now,
            last_updated: now,
            speed_bps: 0.0,
            eta_seconds: None,
            metadata: HashMap::new(),
        }
    }

    /// Applies a raw update, enforcing monotonicity and recomputing the
    /// speed estimate from the delta since the previous update.
    pub fn apply(&mut self, update: ProgressUpdate, now: DateTime<Utc>) {
        let new_bytes = update.bytes_done.max(self.bytes_done);
        let new_bytes = if self.bytes_total > 0 {
            new_bytes.min(self.bytes_total)
        } else {
            new_bytes
        };

        let delta_bytes = new_bytes - self.bytes_done;
        let delta_secs = (now - self.last_updated).num_milliseconds() as f64 / 1000.0;

        if delta_bytes > 0 && delta_secs > 0.0 {
            let instantaneous = delta_bytes as f64 / delta_secs;
            self.speed_bps = if self.speed_bps == 0.0 {
                instantaneous
            } else {
                SPEED_SMOOTHING * instantaneous + (1.0 - SPEED_SMOOTHING) * self.speed_bps
            };
        }

        self.bytes_done = new_bytes;
        if let Some(chunks) = update.chunks_done {
            self.chunks_done = chunks.max(self.chunks_done);
        }
        if let Some(lines) = update.lines_done {
            self.lines_done = lines.max(self.lines_done);
        }
        if let Some(items) = update.items_done {
            self.items_done = items.max(self.items_done);
        }
        self.last_updated = now;
        self.eta_seconds = self.derive_eta();
    }

    /// Sets the expected totals once they are known (after resolution).
    pub fn set_totals(&mut self, bytes_total: u64, chunks_total: u64) {
        self.bytes_total = bytes_total;
        self.chunks_total = chunks_total;
        self.last_updated = Utc::now();
    }

    /// Moves the record into a new phase.
    pub fn set_phase(&mut self, phase: impl Into<String>) {
        self.phase = phase.into();
        self.last_updated = Utc::now();
    }

    /// Marks the record completed; completed records are excluded from
    /// `active()` listings and become eligible for aged cleanup.
    pub fn complete(&mut self) {
        self.phase = PHASE_COMPLETED.to_string();
        self.eta_seconds = Some(0.0);
        self.last_updated = Utc::now();
    }

    /// Marks the record failed.
    pub fn fail(&mut self) {
        self.phase = PHASE_FAILED.to_string();
        self.eta_seconds = None;
        self.last_updated = Utc::now();
    }

    /// Whether the record is in a terminal phase
    pub fn is_terminal(&self) -> bool {
        self.phase == PHASE_COMPLETED || self.phase == PHASE_FAILED
    }

    /// Completion percentage in `[0, 100]`, 0 when the total is unknown
    pub fn percent(&self) -> f64 {
        if self.bytes_total == 0 {
            0.0
        } else {
            (self.bytes_done as f64 / self.bytes_total as f64) * 100.0
        }
    }

    fn derive_eta(&self) -> Option<f64> {
        if self.bytes_total == 0 || self.speed_bps <= 0.0 {
            return None;
        }
        let remaining = self.bytes_total.saturating_sub(self.bytes_done);
        Some(remaining as f64 / self.speed_bps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record() -> ProgressRecord {
        ProgressRecord::new(OperationId::new(), "test-op", 1000)
    }

    #[test]
    fn test_new_record_initializing() {
        let rec = record();
        assert_eq!(rec.phase, PHASE_INITIALIZING);
        assert_eq!(rec.bytes_done, 0);
        assert!(!rec.is_terminal());
        assert!(rec.eta_seconds.is_none());
    }

    #[test]
    fn test_update_monotonic_counters() {
        let mut rec = record();
        let t1 = rec.last_updated + Duration::milliseconds(100);
        rec.apply(
            ProgressUpdate {
                bytes_done: 500,
                chunks_done: Some(5),
                ..Default::default()
            },
            t1,
        );
        assert_eq!(rec.bytes_done, 500);
        assert_eq!(rec.chunks_done, 5);

        // A stale (smaller) report must not move counters backwards
        let t2 = t1 + Duration::milliseconds(100);
        rec.apply(
            ProgressUpdate {
                bytes_done: 300,
                chunks_done: Some(3),
                ..Default::default()
            },
            t2,
        );
        assert_eq!(rec.bytes_done, 500);
        assert_eq!(rec.chunks_done, 5);
    }

    #[test]
    fn test_bytes_done_capped_by_total() {
        let mut rec = record();
        let t = rec.last_updated + Duration::milliseconds(50);
        rec.apply(
            ProgressUpdate {
                bytes_done: 5000,
                ..Default::default()
            },
            t,
        );
        assert_eq!(rec.bytes_done, 1000);
    }

    #[test]
    fn test_speed_and_eta() {
        let mut rec = record();
        let t = rec.last_updated + Duration::seconds(1);
        rec.apply(
            ProgressUpdate {
                bytes_done: 500,
                ..Default::default()
            },
            t,
        );
        assert!(rec.speed_bps > 0.0);
        let eta = rec.eta_seconds.unwrap();
        assert!(eta > 0.0);
    }

    #[test]
    fn test_same_instant_update_does_not_divide_by_zero() {
        let mut rec = record();
        let t = rec.last_updated;
        rec.apply(
            ProgressUpdate {
                bytes_done: 500,
                ..Default::default()
            },
            t,
        );
        // No panic, speed stays at its prior value
        assert_eq!(rec.speed_bps, 0.0);
        assert_eq!(rec.bytes_done, 500);
    }

    #[test]
    fn test_complete_and_fail_are_terminal() {
        let mut rec = record();
        rec.complete();
        assert!(rec.is_terminal());
        assert_eq!(rec.eta_seconds, Some(0.0));

        let mut rec = record();
        rec.fail();
        assert!(rec.is_terminal());
    }

    #[test]
    fn test_percent() {
        let mut rec = record();
        let t = rec.last_updated + Duration::milliseconds(10);
        rec.apply(
            ProgressUpdate {
                bytes_done: 250,
                ..Default::default()
            },
            t,
        );
        assert!((rec.percent() - 25.0).abs() < f64::EPSILON);

        let unknown = ProgressRecord::new(OperationId::new(), "unknown-total", 0);
        assert_eq!(unknown.percent(), 0.0);
    }
}
