//! # Ingestion Loop
//!
//! A self-scheduling task that pulls a batch from a [`SourceAdapter`],
//! inserts each candidate into the [`RecordStore`] and sleeps for a fixed
//! interval measured from the end of the cycle.
//!
//! ## State machine:
//! `Idle → Fetching → Inserting → Sleeping → Idle`, with no terminal state.
//! The loop only exits when its `CancellationToken` is cancelled.
//!
//! ## Failure isolation:
//! - An adapter error or an empty batch goes from `Fetching` straight to
//!   `Sleeping`.
//! - A duplicate insert is counted as already known, not as an error.
//! - Any other store error is logged and that candidate skipped. There is no
//!   retry within the cycle; the adapter re-offers the candidate next time if
//!   it still produces it.
//!
//! Run exactly one loop per process. Two loops against the same store only
//! stay consistent through the store's `(location, time)` constraint.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::SourceAdapter;
use crate::store::{RecordStore, StoreError};

/// Phase of the ingestion cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Fetching,
    Inserting,
    Sleeping,
}

impl LoopState {
    /// Whether the loop may move from `self` to `next`.
    ///
    /// A failed or empty fetch skips `Inserting`. A lone [`IngestionLoop::run_cycle`]
    /// returns to `Idle` without sleeping.
    pub fn can_move_to(self, next: LoopState) -> bool {
        use LoopState::*;
        matches!(
            (self, next),
            (Idle, Fetching)
                | (Fetching, Inserting)
                | (Fetching, Sleeping)
                | (Fetching, Idle)
                | (Inserting, Sleeping)
                | (Inserting, Idle)
                | (Sleeping, Idle)
        )
    }
}

/// Outcome of one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Candidates the adapter produced.
    pub fetched: usize,
    /// Newly persisted records.
    pub inserted: usize,
    /// Candidates the store already knew.
    pub duplicates: usize,
    /// Candidates skipped after a non-duplicate store error.
    pub failed: usize,
    /// Raw records the adapter dropped as malformed.
    pub rejected: usize,
    /// The adapter failed and the cycle was treated as empty.
    pub adapter_failed: bool,
}

pub struct IngestionLoop {
    adapter: Box<dyn SourceAdapter>,
    store: Arc<dyn RecordStore>,
    interval: Duration,
    state: LoopState,
}

impl IngestionLoop {
    pub fn new(
        adapter: Box<dyn SourceAdapter>,
        store: Arc<dyn RecordStore>,
        interval: Duration,
    ) -> Self {
        Self {
            adapter,
            store,
            interval,
            state: LoopState::Idle,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    fn transition(&mut self, next: LoopState) {
        debug_assert!(
            self.state.can_move_to(next),
            "illegal ingestion transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!(from = ?self.state, to = ?next, "ingestion state");
        self.state = next;
    }

    /// Runs a single fetch and insert pass and returns to `Idle`.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let report = self.cycle().await;
        self.transition(LoopState::Idle);
        report
    }

    /// Fetches and inserts one batch, leaving the state at `Fetching` or
    /// `Inserting` for the caller to move on from.
    async fn cycle(&mut self) -> CycleReport {
        let started = Instant::now();
        let mut report = CycleReport::default();

        self.transition(LoopState::Fetching);
        let batch = match self.adapter.produce_batch().await {
            Ok(batch) => batch,
            Err(e) => {
                warn!(source = self.adapter.name(), "Fetch failed, skipping cycle: {}", e);
                report.adapter_failed = true;
                return report;
            }
        };
        report.fetched = batch.candidates.len();
        report.rejected = batch.rejected;

        if batch.is_empty() {
            info!(source = self.adapter.name(), rejected = report.rejected, "No data fetched.");
            return report;
        }

        self.transition(LoopState::Inserting);
        for candidate in &batch.candidates {
            match self.store.insert(candidate).await {
                Ok(row) => {
                    debug!(id = row.id, location = %row.location, magnitude = row.magnitude, "Inserted earthquake");
                    report.inserted += 1;
                }
                Err(StoreError::Duplicate { .. }) => report.duplicates += 1,
                Err(e) => {
                    error!(location = %candidate.location, time = %candidate.time, "Failed to insert earthquake record: {}", e);
                    report.failed += 1;
                }
            }
        }

        info!(
            source = self.adapter.name(),
            fetched = report.fetched,
            inserted = report.inserted,
            duplicates = report.duplicates,
            failed = report.failed,
            rejected = report.rejected,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Inserted {} new records into the database.",
            report.inserted
        );
        report
    }

    /// # Main Execution Loop
    ///
    /// Cycles until `shutdown` is cancelled. Cancellation is observed before
    /// each cycle and while sleeping; an in-flight cycle runs to completion
    /// so no insert is interrupted midway.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!(
            source = self.adapter.name(),
            interval_secs = self.interval.as_secs(),
            "Ingestion loop started."
        );

        while !shutdown.is_cancelled() {
            self.cycle().await;

            self.transition(LoopState::Sleeping);
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
            self.transition(LoopState::Idle);
        }

        if self.state != LoopState::Idle {
            self.transition(LoopState::Idle);
        }
        info!(source = self.adapter.name(), "Ingestion loop stopped.");
    }
}
