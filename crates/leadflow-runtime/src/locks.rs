//! Per-lead mutual exclusion
//!
//! Read-modify-write sequences on a lead (fetch tags, decide, write) hold the
//! lead's guard for their whole duration. Runs touching different leads never
//! contend; there is no engine-wide lock.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// Entries beyond this count trigger a prune of idle locks
const PRUNE_THRESHOLD: usize = 1024;

#[derive(Debug, Default)]
pub struct LeadLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Held while a lead is being mutated
#[derive(Debug)]
pub struct LeadGuard {
    lead_id: String,
    _guard: OwnedMutexGuard<()>,
}

impl LeadGuard {
    pub fn lead_id(&self) -> &str {
        &self.lead_id
    }
}

impl LeadLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to a lead
    pub async fn lock(&self, lead_id: &str) -> LeadGuard {
        if self.locks.len() > PRUNE_THRESHOLD {
            self.prune();
        }

        let mutex = self
            .locks
            .entry(lead_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();

        LeadGuard {
            lead_id: lead_id.to_string(),
            _guard: mutex.lock_owned().await,
        }
    }

    /// Drop locks nobody holds or waits on
    pub fn prune(&self) {
        let before = self.locks.len();
        self.locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
        debug!("Pruned {} idle lead locks", before - self.locks.len());
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
