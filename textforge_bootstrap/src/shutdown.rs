// /////////////////////////////////////////////////////////////////////////////
// Textforge
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Shutdown Coordination
//!
//! Cancellation and drain tracking for the engines' long-lived components.
//!
//! ## Model
//!
//! Two cooperating pieces:
//!
//! - [`CancellationToken`] - a clonable one-shot flag built on a `watch`
//!   channel. Cancelling publishes `true` exactly once; every clone sees
//!   it, whether it was already parked in `cancelled().await` or merely
//!   polls `is_cancelled()` at its next suspension point. The same type
//!   serves as the per-operation cancel handle of the streaming engine.
//! - [`ShutdownCoordinator`] - counts the components that still have
//!   cleanup to run. A component (temp-file sweeper, progress cleanup
//!   loop, operation cleanup loop) takes a [`DrainGuard`] at spawn time
//!   and simply drops it once its final sweep is done; `shutdown()`
//!   cancels the shared token and then waits, bounded by the grace
//!   period, for the pending count to reach zero.
//!
//! There is no completion callback to remember to call: dropping the
//! guard is the completion signal, so a component that unwinds through an
//! error still counts as drained.
//!
//! ## Usage
//!
//! ```rust
//! use textforge_bootstrap::shutdown::ShutdownCoordinator;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let coordinator = ShutdownCoordinator::new(Duration::from_secs(5));
//!
//!     let token = coordinator.token();
//!     let guard = coordinator.register("temp-sweeper");
//!     tokio::spawn(async move {
//!         token.cancelled().await;
//!         // final zero-age sweep of scratch space would run here
//!         drop(guard);
//!     });
//!
//!     let drained = coordinator.shutdown().await;
//!     assert!(drained);
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Default grace period for component draining (in seconds)
pub const DEFAULT_GRACE_PERIOD_SECS: u64 = 5;

/// One-shot cancellation flag shared between an issuer and any number of
/// observers.
///
/// Clones observe the same underlying channel, so cancelling any clone
/// cancels them all. The flag only ever moves from un-cancelled to
/// cancelled; there is no reset.
#[derive(Clone)]
pub struct CancellationToken {
    observer: watch::Receiver<bool>,
    trigger: Arc<watch::Sender<bool>>,
}

impl CancellationToken {
    /// Creates a new, un-cancelled token
    pub fn new() -> Self {
        let (trigger, observer) = watch::channel(false);
        Self {
            observer,
            trigger: Arc::new(trigger),
        }
    }

    /// Publishes cancellation to every clone. Idempotent.
    pub fn cancel(&self) {
        // A send can only fail with no receivers, and self holds one
        let _ = self.trigger.send(true);
    }

    /// Checks the flag without waiting.
    ///
    /// Engines call this at every cooperative suspension point: chunk
    /// boundaries, per-file dispatch iterations, snapshot copies.
    pub fn is_cancelled(&self) -> bool {
        *self.observer.borrow()
    }

    /// Completes once the token is cancelled; immediately when it already
    /// was.
    pub async fn cancelled(&self) {
        let mut observer = self.observer.clone();
        // wait_for checks the current value first, so a token cancelled
        // before the call resolves without parking
        let _ = observer.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII marker held by a component that still has cleanup to run.
///
/// Dropping the guard is the drain signal; an unwinding task drains like
/// a well-behaved one.
pub struct DrainGuard {
    pending: Arc<watch::Sender<usize>>,
    component: String,
}

impl Drop for DrainGuard {
    fn drop(&mut self) {
        self.pending.send_modify(|count| *count = count.saturating_sub(1));
        tracing::debug!(component = %self.component, "engine component drained");
    }
}

/// Tracks component draining around engine teardown.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    grace_period: Duration,
    pending: Arc<watch::Sender<usize>>,
}

impl ShutdownCoordinator {
    /// Creates a coordinator with the given drain grace period.
    pub fn new(grace_period: Duration) -> Self {
        let (pending, _observer) = watch::channel(0usize);
        Self {
            token: CancellationToken::new(),
            grace_period,
            pending: Arc::new(pending),
        }
    }

    /// The token components watch for the shutdown signal.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Registers a component that must drain before the process exits.
    ///
    /// Hold the returned guard for the component's lifetime and drop it
    /// after the final cleanup pass.
    pub fn register(&self, component: &str) -> DrainGuard {
        self.pending.send_modify(|count| *count += 1);
        tracing::debug!(component = %component, "engine component registered for drain tracking");
        DrainGuard {
            pending: Arc::clone(&self.pending),
            component: component.to_string(),
        }
    }

    /// Number of components that have not drained yet.
    pub fn pending_components(&self) -> usize {
        *self.pending.subscribe().borrow()
    }

    /// Whether the shutdown signal has been issued.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancels the token and waits up to the grace period for every
    /// registered component to drain. Returns whether they all did.
    pub async fn shutdown(&self) -> bool {
        tracing::info!(
            pending = self.pending_components(),
            grace_period = ?self.grace_period,
            "engine shutdown requested"
        );
        self.token.cancel();
        self.drain(self.grace_period).await
    }

    /// Waits up to `timeout` for the pending count to reach zero.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let mut observer = self.pending.subscribe();
        let result = tokio::time::timeout(timeout, observer.wait_for(|count| *count == 0)).await;
        match result {
            Ok(_) => {
                tracing::info!("all engine components drained");
                true
            }
            Err(_) => {
                tracing::warn!(
                    pending = self.pending_components(),
                    "drain grace period elapsed with components still pending"
                );
                false
            }
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_GRACE_PERIOD_SECS))
    }
}
