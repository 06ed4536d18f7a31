//! Process-wide TTL cache for per-source readings.
//!
//! One `TtlCache` exists per signal family, created at startup and handed to
//! the aggregator (never reached through a global). Keys combine the query
//! coordinate rounded to 2 decimal degrees with the source rank, so nearby
//! requests share entries per source.
//!
//! Expired entries are deliberately kept around (bounded by
//! `MAX_STALE_RETENTION`): they are the last-resort answer when a refresh
//! fails. Concurrent refreshes of the same key are last-writer-wins.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// How long an expired entry stays available for stale fallback before it is
/// dropped on the next insert, in seconds.
const MAX_STALE_RETENTION_SECS: i64 = 24 * 3600;

/// Cache key: coordinate rounded to a stable 2-decimal-degree precision,
/// plus the source rank within the family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Latitude in hundredths of a degree
    lat_cdeg: i32,
    /// Longitude in hundredths of a degree
    lon_cdeg: i32,
    rank: u8,
}

impl CacheKey {
    pub fn new(lat: f64, lon: f64, rank: u8) -> Self {
        Self {
            lat_cdeg: (lat * 100.0).round() as i32,
            lon_cdeg: (lon * 100.0).round() as i32,
            rank,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<T> {
    value: T,
    stored_at: DateTime<Utc>,
    ttl: Duration,
}

impl<T> CacheEntry<T> {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now - self.stored_at < self.ttl
    }
}

/// Shared-state TTL cache; cloning shares the underlying store.
#[derive(Debug, Clone)]
pub struct TtlCache<T> {
    ttl: Duration,
    entries: Arc<RwLock<HashMap<CacheKey, CacheEntry<T>>>>,
}

impl<T: Clone> TtlCache<T> {
    /// Create a cache whose entries stay fresh for `ttl_secs` seconds.
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            ttl: Duration::seconds(ttl_secs as i64),
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Return the value for `key` if it is still within its TTL.
    pub async fn get_fresh(&self, key: CacheKey) -> Option<T> {
        self.get_fresh_at(key, Utc::now()).await
    }

    pub(crate) async fn get_fresh_at(&self, key: CacheKey, now: DateTime<Utc>) -> Option<T> {
        let entries = self.entries.read().await;
        entries
            .get(&key)
            .filter(|e| e.is_fresh(now))
            .map(|e| e.value.clone())
    }

    /// Return the value for `key` regardless of age. Last-resort lookup when
    /// a refresh has already failed; the caller is responsible for flagging
    /// the result as stale.
    pub async fn get_stale(&self, key: CacheKey) -> Option<T> {
        let entries = self.entries.read().await;
        entries.get(&key).map(|e| e.value.clone())
    }

    /// Store a value under `key`, restarting its TTL.
    pub async fn insert(&self, key: CacheKey, value: T) {
        self.insert_at(key, value, Utc::now()).await;
    }

    pub(crate) async fn insert_at(&self, key: CacheKey, value: T, now: DateTime<Utc>) {
        let mut entries = self.entries.write().await;
        // Opportunistic pruning of entries too old even for stale fallback
        entries.retain(|_, e| now - e.stored_at < Duration::seconds(MAX_STALE_RETENTION_SECS));
        entries.insert(
            key,
            CacheEntry {
                value,
                stored_at: now,
                ttl: self.ttl,
            },
        );
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
