//! In-flight request coalescing.
//!
//! When multiple read requests arrive for the same request key before the
//! first settles, only one underlying transfer runs - all other callers
//! receive the same outcome.
//!
//! # Architecture
//!
//! ```text
//! Caller A ─┐
//!           │                             Retry
//! Caller B ─┼──► InFlightTable ─────────► Loop
//!           │        │                      │
//! Caller C ─┘        │                      │
//!                    ▼                      ▼
//!              [A, B, C all          [One transfer]
//!               receive same                │
//!               outcome]◄───────────────────┘
//! ```
//!
//! # Implementation
//!
//! Uses `DashMap` for lock-free concurrent access; the entry API makes
//! check-and-register atomic under parallel callers. Statistics use atomic
//! counters.

use crate::error::ApiError;
use crate::key::RequestKey;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::debug;

/// Settled outcome of a shared transfer, broadcast to every joined caller.
pub type TransferOutcome = Result<Arc<Value>, ApiError>;

/// Tracks in-flight read transfers for request coalescing.
///
/// Thread-safe structure that tracks which request keys currently have a
/// transfer running, allowing duplicate requests to wait for the same
/// outcome instead of starting duplicate transfers.
pub struct InFlightTable {
    /// In-flight transfers: key -> broadcast sender for the outcome
    in_flight: DashMap<RequestKey, broadcast::Sender<TransferOutcome>>,
    /// Statistics using atomic counters for lock-free updates
    total_requests: AtomicU64,
    coalesced_requests: AtomicU64,
    started_transfers: AtomicU64,
}

/// Statistics for monitoring coalescing effectiveness.
#[derive(Debug, Default, Clone)]
pub struct CoalesceStats {
    /// Total registrations received
    pub total_requests: u64,
    /// Registrations that joined an existing transfer
    pub coalesced_requests: u64,
    /// Registrations that started a new transfer
    pub started_transfers: u64,
}

impl CoalesceStats {
    /// Returns the coalescing ratio (0.0 to 1.0).
    pub fn coalescing_ratio(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.coalesced_requests as f64 / self.total_requests as f64
        }
    }
}

/// Result of attempting to register a request.
pub enum Registration {
    /// First request for this key - the caller must run the transfer and
    /// call `complete()` when it settles
    Leader,
    /// A transfer is already running - wait on this receiver for its outcome
    Joined(broadcast::Receiver<TransferOutcome>),
}

impl Registration {
    /// Returns true if this registration must run the transfer.
    pub fn is_leader(&self) -> bool {
        matches!(self, Registration::Leader)
    }
}

impl InFlightTable {
    /// Create an empty in-flight table.
    pub fn new() -> Self {
        Self {
            in_flight: DashMap::new(),
            total_requests: AtomicU64::new(0),
            coalesced_requests: AtomicU64::new(0),
            started_transfers: AtomicU64::new(0),
        }
    }

    /// Attempt to register a read request for the given key.
    ///
    /// Returns [`Registration::Leader`] if no transfer is in flight for the
    /// key, meaning the caller should run it and call `complete()` when it
    /// settles. Returns [`Registration::Joined`] with a receiver if another
    /// transfer is already in flight.
    ///
    /// The check and the registration are a single atomic operation, so at
    /// most one concurrent transfer exists per key even under parallel
    /// callers.
    pub fn register(&self, key: RequestKey) -> Registration {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        match self.in_flight.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(entry) => {
                let rx = entry.get().subscribe();
                self.coalesced_requests.fetch_add(1, Ordering::Relaxed);
                debug!(key = %entry.key(), "joining in-flight transfer");
                Registration::Joined(rx)
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                // Capacity of 16 - typical case is 1-4 concurrent callers per key
                let (tx, _rx) = broadcast::channel(16);
                debug!(key = %entry.key(), "starting new transfer");
                entry.insert(tx);
                self.started_transfers.fetch_add(1, Ordering::Relaxed);
                Registration::Leader
            }
        }
    }

    /// Complete a transfer, broadcasting the outcome to all joined waiters.
    ///
    /// The entry is removed unconditionally whether the outcome is success
    /// or failure; a later request for the same key starts a new transfer.
    pub fn complete(&self, key: &RequestKey, outcome: TransferOutcome) {
        if let Some((_, tx)) = self.in_flight.remove(key) {
            let waiters = tx.receiver_count();
            // Ignore send errors - all receivers may have been dropped
            let _ = tx.send(outcome);

            if waiters > 0 {
                debug!(key = %key, waiters, "broadcast outcome to coalesced waiters");
            }
        }
    }

    /// Returns the number of currently in-flight read transfers.
    pub fn pending_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Returns a snapshot of the current statistics.
    pub fn stats(&self) -> CoalesceStats {
        CoalesceStats {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            coalesced_requests: self.coalesced_requests.load(Ordering::Relaxed),
            started_transfers: self.started_transfers.load(Ordering::Relaxed),
        }
    }
}

impl Default for InFlightTable {
    fn default() -> Self {
        Self::new()
    }
}
