//! Bounded, time-expiring holder of the most recently persisted deposits.
//!
//! Backs the realtime read path. Entries are derived from what was just
//! written to storage and are never the source of truth.

use crate::deposit::DepositRecord;
use crate::error::NoData;
use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub record: DepositRecord,
    /// `None` when the TTL reaches past the clock's range: never expires.
    pub expires_at: Option<Instant>,
}

#[derive(Debug)]
pub struct RecentDepositCache {
    entries: Mutex<VecDeque<CacheEntry>>,
    capacity: NonZeroUsize,
    ttl: Duration,
}

impl RecentDepositCache {
    pub fn new(capacity: NonZeroUsize, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.get())),
            capacity,
            ttl,
        }
    }

    /// Evicts the oldest entries down to `capacity - 1` before inserting,
    /// under the same lock, so readers never see more than `capacity`.
    pub fn push(&self, record: DepositRecord) {
        let expires_at = Instant::now().checked_add(self.ttl);
        let mut entries = self.lock();
        while entries.len() >= self.capacity.get() {
            entries.pop_front();
        }
        entries.push_back(CacheEntry { record, expires_at });
    }

    /// Newest entry, unless the cache is empty or that entry has expired.
    pub fn most_recent(&self) -> Result<DepositRecord, NoData> {
        let entries = self.lock();
        match entries.back() {
            Some(entry) if entry.expires_at.map_or(true, |at| Instant::now() < at) => {
                Ok(entry.record.clone())
            }
            _ => Err(NoData),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
