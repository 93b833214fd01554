//! Bounded-concurrency probe scheduler
//!
//! All probes of a batch start together; an [`AdmissionGate`] caps how many
//! are doing network I/O at once. Results come back in input order.

use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::{info, warn};

use super::stream_prober::{LivenessCheck, ProbeOutcome};
use crate::errors::{AppError, AppResult};
use crate::models::ChannelRecord;

/// Counting gate shared by the probes of one run. Cloning shares the slots.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    slots: Arc<Semaphore>,
    capacity: usize,
}

impl AdmissionGate {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait for a free slot; the slot is released when the permit drops
    pub async fn acquire(&self) -> AppResult<SemaphorePermit<'_>> {
        self.slots
            .acquire()
            .await
            .map_err(|e| AppError::internal(format!("Admission gate closed: {e}")))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }
}

pub struct ProbeScheduler {
    checker: Arc<dyn LivenessCheck>,
    gate: AdmissionGate,
}

impl ProbeScheduler {
    pub fn new(checker: Arc<dyn LivenessCheck>, gate: AdmissionGate) -> Self {
        Self { checker, gate }
    }

    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    /// Probe every record; `outcomes[i]` belongs to `records[i]`
    pub async fn run(&self, records: &[ChannelRecord]) -> Vec<ProbeOutcome> {
        info!(
            "Probing {} channels, at most {} at a time",
            records.len(),
            self.gate.capacity()
        );

        let outcomes = join_all(records.iter().map(|record| self.check_one(record))).await;

        let reachable = outcomes.iter().filter(|o| o.reachable).count();
        info!("Probe finished: {}/{} reachable", reachable, outcomes.len());
        outcomes
    }

    /// Same as [`run`](Self::run), reduced to liveness flags
    pub async fn run_flags(&self, records: &[ChannelRecord]) -> Vec<bool> {
        self.run(records)
            .await
            .into_iter()
            .map(|outcome| outcome.reachable)
            .collect()
    }

    async fn check_one(&self, record: &ChannelRecord) -> ProbeOutcome {
        let _permit = match self.gate.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                warn!("{}", e);
                return ProbeOutcome::unreachable();
            }
        };
        self.checker.check(record).await
    }
}
