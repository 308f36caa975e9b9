use std::time::{Duration, Instant};
use dashmap::DashMap;
use crate::ledger::snapshot::LedgerSnapshot;
use crate::types::ids::PaymentId;

struct CachedSnapshot {
    fetched_at: Instant,
    snapshot: LedgerSnapshot,
}

/// Time-bounded snapshot cache. Owned by whoever builds the engine; there is no
/// process-wide instance.
pub struct SnapshotCache {
    ttl: Duration,
    entries: DashMap<PaymentId, CachedSnapshot>,
}

impl SnapshotCache {
    pub fn new(ttl: Duration) -> Self {
        SnapshotCache {
            ttl,
            entries: DashMap::new(),
        }
    }

    pub fn get(&self, payment_id: &PaymentId) -> Option<LedgerSnapshot> {
        if let Some(entry) = self.entries.get(payment_id) {
            if entry.fetched_at.elapsed() <= self.ttl {
                return Some(entry.snapshot.clone());
            }
        } else {
            return None;
        }

        // expired
        self.entries.remove(payment_id);
        None
    }

    pub fn insert(&self, snapshot: LedgerSnapshot) {
        self.entries.insert(
            snapshot.payment_id.clone(),
            CachedSnapshot {
                fetched_at: Instant::now(),
                snapshot,
            },
        );
    }

    /// Drop expired entries, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.fetched_at.elapsed() <= self.ttl);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
