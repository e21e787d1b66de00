//! In-memory verification cache with a fixed TTL.
//!
//! Keyed by lower-cased proxy address. Entries are never evicted, only treated
//! as stale once older than the TTL; the next lookup overwrites them. All data
//! is lost when the process exits.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::record::VerificationRecord;

/// Default time-to-live for cached records.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Source of "now" for TTL checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        if let Ok(by) = chrono::Duration::from_std(by) {
            *now += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Process-wide verification cache.
///
/// Each `get` / `put` holds the map lock for its whole duration, so a single
/// key is never observed half-written.
pub struct VerificationCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, VerificationRecord>>,
}

impl VerificationCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the record if present and younger than the TTL.
    pub fn get(&self, address: &str) -> Option<VerificationRecord> {
        let key = address.to_ascii_lowercase();
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let record = entries.get(&key)?;
        let age = self.clock.now().signed_duration_since(record.observed_at);
        // A record from the "future" (clock skew) counts as fresh.
        let fresh = age.to_std().map(|age| age < self.ttl).unwrap_or(true);
        fresh.then(|| record.clone())
    }

    /// Overwrite the entry for `address`, stamping `observed_at = now`.
    pub fn put(&self, address: &str, mut record: VerificationRecord) -> VerificationRecord {
        record.observed_at = self.clock.now();
        let key = address.to_ascii_lowercase();
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, record.clone());
        record
    }

    /// Number of entries, stale ones included.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for VerificationCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{StatusSource, VerificationStatus};

    const ADDR: &str = "0xAbCdEf0000000000000000000000000000000001";

    fn setup() -> (Arc<ManualClock>, VerificationCache) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = VerificationCache::with_clock(DEFAULT_TTL, clock.clone());
        (clock, cache)
    }

    fn record(status: VerificationStatus) -> VerificationRecord {
        VerificationRecord::new(ADDR.to_ascii_lowercase(), status, StatusSource::Api)
    }

    #[test]
    fn put_then_get_within_ttl() {
        let (clock, cache) = setup();
        let stored = cache.put(ADDR, record(VerificationStatus::AlreadyVerified));
        assert_eq!(stored.observed_at, clock.now());

        clock.advance(Duration::from_secs(299));
        assert_eq!(cache.get(ADDR), Some(stored));
    }

    #[test]
    fn miss_once_ttl_elapsed() {
        let (clock, cache) = setup();
        cache.put(ADDR, record(VerificationStatus::NotVerified));
        clock.advance(Duration::from_secs(300));
        assert!(cache.get(ADDR).is_none());
        // Stale entries are kept until overwritten.
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn keys_are_case_insensitive() {
        let (_clock, cache) = setup();
        cache.put(ADDR, record(VerificationStatus::Ok));
        assert!(cache.get(&ADDR.to_ascii_lowercase()).is_some());
        assert!(cache.get(&ADDR.to_ascii_uppercase().replacen("0X", "0x", 1)).is_some());
    }

    #[test]
    fn put_overwrites_and_refreshes() {
        let (clock, cache) = setup();
        cache.put(ADDR, record(VerificationStatus::NotVerified));
        clock.advance(Duration::from_secs(400));
        assert!(cache.get(ADDR).is_none());

        cache.put(ADDR, record(VerificationStatus::AlreadyVerified));
        let hit = cache.get(ADDR).unwrap();
        assert_eq!(hit.status, VerificationStatus::AlreadyVerified);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn miss_on_unknown_address() {
        let cache = VerificationCache::default();
        assert!(cache.is_empty());
        assert!(cache.get(ADDR).is_none());
        assert_eq!(cache.ttl(), Duration::from_secs(300));
    }
}
