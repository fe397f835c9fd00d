//! Per-dataset publish lease. A dataset is either unlocked or locked by
//! one owner until an expiry instant; the expiry exists so a leaked guard
//! cannot wedge the dataset forever. In-process only: one process runs
//! all attempts against a given registry.

use datapress_model::DatasetId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug)]
struct LeaseEntry {
    owner: u64,
    expires_at: Instant,
}

pub struct LeaseTable {
    ttl: Duration,
    entries: Mutex<HashMap<DatasetId, LeaseEntry>>,
    next_owner: AtomicU64,
}

impl LeaseTable {
    #[must_use]
    pub fn new(ttl: Duration) -> Arc<Self> {
        Arc::new(Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
            next_owner: AtomicU64::new(0),
        })
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<DatasetId, LeaseEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Takes the lease if the dataset is unlocked or its lease expired.
    /// `None` means another attempt holds it.
    pub fn acquire(self: &Arc<Self>, dataset: &DatasetId) -> Option<LeaseGuard> {
        let now = Instant::now();
        let owner = self.next_owner.fetch_add(1, Ordering::Relaxed);
        let mut entries = self.entries();
        if let Some(entry) = entries.get(dataset) {
            if entry.expires_at > now {
                return None;
            }
        }
        entries.insert(
            dataset.clone(),
            LeaseEntry {
                owner,
                expires_at: now + self.ttl,
            },
        );
        Some(LeaseGuard {
            table: Arc::clone(self),
            dataset: dataset.clone(),
            owner,
        })
    }

    #[must_use]
    pub fn is_held(&self, dataset: &DatasetId) -> bool {
        let now = Instant::now();
        self.entries()
            .get(dataset)
            .is_some_and(|entry| entry.expires_at > now)
    }

    fn release(&self, dataset: &DatasetId, owner: u64) {
        let mut entries = self.entries();
        // An expired lease may have been taken over; only the current
        // owner gets to remove the entry.
        if entries.get(dataset).is_some_and(|entry| entry.owner == owner) {
            entries.remove(dataset);
        }
    }
}

/// Held lease, released on drop.
pub struct LeaseGuard {
    table: Arc<LeaseTable>,
    dataset: DatasetId,
    owner: u64,
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        self.table.release(&self.dataset, self.owner);
    }
}
