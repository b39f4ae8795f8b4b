// /////////////////////////////////////////////////////////////////////////////
// Textforge
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Progress Tracker
//!
//! Thread-safe map of `operation_id -> progress record`. Engines report
//! raw counters; the record derives throughput and ETA.
//!
//! ## Locking Discipline
//!
//! The outer map is guarded by an `RwLock` held only for map operations;
//! each record sits behind its own mutex. Updates to a single operation
//! are therefore serialized, while updates across operations proceed in
//! parallel. No lock is ever held across I/O.
//!
//! ## Aging
//!
//! Records untouched for longer than a configurable horizon are removed by
//! [`ProgressTracker::cleanup_older_than`], driven by a 5-minute background
//! timer spawned with [`ProgressTracker::spawn_cleanup`].

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use textforge_bootstrap::shutdown::CancellationToken;
use textforge_domain::entities::progress::{ProgressRecord, ProgressUpdate};
use textforge_domain::{OperationId, ProgressPort};

/// In-memory progress tracker with per-record locking.
#[derive(Default)]
pub struct ProgressTracker {
    records: RwLock<HashMap<OperationId, Arc<Mutex<ProgressRecord>>>>,
}

impl ProgressTracker {
    /// Creates an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, operation_id: OperationId) -> Option<Arc<Mutex<ProgressRecord>>> {
        self.records.read().get(&operation_id).cloned()
    }

    /// Spawns the periodic aged-record cleanup.
    pub fn spawn_cleanup(
        self: &Arc<Self>,
        interval: Duration,
        max_age: Duration,
        token: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let tracker = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = tracker.cleanup_older_than(max_age);
                        if removed > 0 {
                            tracing::debug!("Progress cleanup removed {} aged records", removed);
                        }
                    }
                    _ = token.cancelled() => break,
                }
            }
        })
    }
}

impl ProgressPort for ProgressTracker {
    fn create(&self, operation_id: OperationId, name: &str, bytes_total: u64) {
        let record = ProgressRecord::new(operation_id, name, bytes_total);
        self.records
            .write()
            .insert(operation_id, Arc::new(Mutex::new(record)));
    }

    fn set_totals(&self, operation_id: OperationId, bytes_total: u64, chunks_total: u64) {
        if let Some(record) = self.record(operation_id) {
            record.lock().set_totals(bytes_total, chunks_total);
        }
    }

    fn update(&self, operation_id: OperationId, update: ProgressUpdate) {
        if let Some(record) = self.record(operation_id) {
            record.lock().apply(update, Utc::now());
        }
    }

    fn set_phase(&self, operation_id: OperationId, phase: &str) {
        if let Some(record) = self.record(operation_id) {
            record.lock().set_phase(phase);
        }
    }

    fn add_metadata(&self, operation_id: OperationId, key: &str, value: &str) {
        if let Some(record) = self.record(operation_id) {
            record.lock().metadata.insert(key.to_string(), value.to_string());
        }
    }

    fn complete(&self, operation_id: OperationId) {
        if let Some(record) = self.record(operation_id) {
            record.lock().complete();
        }
    }

    fn fail(&self, operation_id: OperationId) {
        if let Some(record) = self.record(operation_id) {
            record.lock().fail();
        }
    }

    fn remove(&self, operation_id: OperationId) -> bool {
        self.records.write().remove(&operation_id).is_some()
    }

    fn get(&self, operation_id: OperationId) -> Option<ProgressRecord> {
        self.record(operation_id).map(|record| record.lock().clone())
    }

    fn active(&self) -> Vec<ProgressRecord> {
        let records: Vec<Arc<Mutex<ProgressRecord>>> = self.records.read().values().cloned().collect();
        records
            .into_iter()
            .map(|record| record.lock().clone())
            .filter(|record| !record.is_terminal())
            .collect()
    }

    fn cleanup_older_than(&self, age: Duration) -> usize {
        let cutoff = Utc::now() - chrono::Duration::from_std(age).unwrap_or_else(|_| chrono::Duration::zero());
        let stale: Vec<OperationId> = {
            let records = self.records.read();
            records
                .iter()
                .filter(|(_, record)| record.lock().last_updated < cutoff)
                .map(|(id, _)| *id)
                .collect()
        };

        let mut records = self.records.write();
        let mut removed = 0;
        for id in stale {
            if records.remove(&id).is_some() {
                removed += 1;
            }
        }
        removed
    }
}
