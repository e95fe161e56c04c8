//! Time-windowed memoization of transfer fetches.
//!
//! Identical fetch arguments within the TTL window (five minutes by default)
//! are answered from memory instead of the network. The key is the full,
//! canonicalized argument tuple; the value is the immutable record list plus
//! the instant it was fetched. Expired entries are never returned.
//!
//! The cache lives as long as its [`CachedFetcher`]. The CLI builds one per
//! process, so repeat hits only happen for library callers that keep a
//! fetcher alive across calls.
//!
//! The map is guarded by a [`Mutex`] that is never held across an `.await`.
//! Two concurrent misses for the same key will both hit the network; the
//! second result simply replaces the first.
//!
//! # Example
//!
//! ```no_run
//! use usdt_reconciliation::cache::{CachedFetcher, FetchCache};
//! use usdt_reconciliation::config::Config;
//! use usdt_reconciliation::explorer::ExplorerClient;
//! use usdt_reconciliation::fetcher::FetchParams;
//! use usdt_reconciliation::error::ReconResult;
//!
//! # async fn example() -> ReconResult<()> {
//! let client = ExplorerClient::new(&Config::load()?)?;
//! let fetcher = CachedFetcher::new(client, FetchCache::default());
//!
//! let first = fetcher.fetch(&FetchParams::default()).await?;
//! let second = fetcher.fetch(&FetchParams::default()).await?; // served from cache
//! assert_eq!(first.len(), second.len());
//! # Ok(())
//! # }
//! ```

use crate::error::ReconResult;
use crate::explorer::{ExplorerClient, SortOrder};
use crate::fetcher::{fetch_transfers, FetchParams};
use crate::normalize::TransferRecord;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

/// Default freshness window.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Shared, immutable record list.
pub type SharedRecords = Arc<[TransferRecord]>;

/// Canonical fetch arguments.
///
/// `min_value` is stored as bits after canonicalization, so a zero
/// threshold and no threshold share one entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    api_key: String,
    chain_id: u64,
    start_block: u64,
    end_block: u64,
    page_size: u32,
    max_pages: u32,
    min_value_bits: Option<u64>,
    sort: SortOrder,
    inter_page_delay: Duration,
}

impl CacheKey {
    /// Build the key for one client and parameter set.
    #[must_use]
    pub fn new(client: &ExplorerClient, params: &FetchParams) -> Self {
        Self {
            api_key: client.api_key().to_string(),
            chain_id: client.chain_id(),
            start_block: params.start_block,
            end_block: params.end_block,
            page_size: params.page_size,
            max_pages: params.max_pages,
            min_value_bits: params.effective_min_value().map(f64::to_bits),
            sort: params.sort,
            inter_page_delay: params.inter_page_delay,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    records: SharedRecords,
    fetched_at: Instant,
}

/// TTL cache of fetch results.
#[derive(Debug)]
pub struct FetchCache {
    ttl: Duration,
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl FetchCache {
    /// Create a cache with the given freshness window.
    ///
    /// A zero TTL disables caching.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Freshness window.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a fresh entry.
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<SharedRecords> {
        self.get_at(key, Instant::now())
    }

    /// Look up an entry as of `now`, evicting it if expired.
    #[must_use]
    pub fn get_at(&self, key: &CacheKey, now: Instant) -> Option<SharedRecords> {
        let mut entries = self.lock();
        let entry = entries.get(key)?;

        if now.saturating_duration_since(entry.fetched_at) < self.ttl {
            return Some(Arc::clone(&entry.records));
        }

        entries.remove(key);
        None
    }

    /// Store a result fetched now.
    pub fn insert(&self, key: CacheKey, records: SharedRecords) {
        self.insert_at(key, records, Instant::now());
    }

    /// Store a result fetched at `fetched_at`.
    ///
    /// Entries already expired at `fetched_at` are dropped first, so the map
    /// only grows with fresh results.
    pub fn insert_at(&self, key: CacheKey, records: SharedRecords, fetched_at: Instant) {
        let mut entries = self.lock();
        let purged = self.retain_fresh(&mut entries, fetched_at);
        if purged > 0 {
            debug!(purged, "Expired cache entries dropped");
        }
        entries.insert(
            key,
            CacheEntry {
                records,
                fetched_at,
            },
        );
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    /// Drop entries expired as of `now`.
    pub fn purge_expired_at(&self, now: Instant) -> usize {
        let mut entries = self.lock();
        self.retain_fresh(&mut entries, now)
    }

    /// Number of stored entries, fresh or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Remove everything.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn retain_fresh(&self, entries: &mut HashMap<CacheKey, CacheEntry>, now: Instant) -> usize {
        let before = entries.len();
        entries.retain(|_, entry| now.saturating_duration_since(entry.fetched_at) < self.ttl);
        before - entries.len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, CacheEntry>> {
        // Entries are replaced whole, so a poisoned map is still consistent.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for FetchCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

/// Explorer client with a result cache in front of it.
pub struct CachedFetcher {
    client: ExplorerClient,
    cache: FetchCache,
}

impl CachedFetcher {
    /// Combine a client and a cache.
    #[must_use]
    pub const fn new(client: ExplorerClient, cache: FetchCache) -> Self {
        Self { client, cache }
    }

    /// Underlying client.
    #[must_use]
    pub const fn client(&self) -> &ExplorerClient {
        &self.client
    }

    /// Underlying cache.
    #[must_use]
    pub const fn cache(&self) -> &FetchCache {
        &self.cache
    }

    /// Fetch transfers, reusing a fresh cached result for identical arguments.
    ///
    /// Failures are not cached.
    ///
    /// # Errors
    ///
    /// Same as [`fetch_transfers`].
    pub async fn fetch(&self, params: &FetchParams) -> ReconResult<SharedRecords> {
        let key = CacheKey::new(&self.client, params);

        if let Some(records) = self.cache.get(&key) {
            debug!(records = records.len(), "Transfer cache hit");
            return Ok(records);
        }

        let records: SharedRecords = fetch_transfers(&self.client, params).await?.into();
        self.cache.insert(key, Arc::clone(&records));
        Ok(records)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::Config;
    use chrono::DateTime;

    fn client() -> ExplorerClient {
        ExplorerClient::new(&Config::new("key", 1, "http://localhost:1/v2/api")).unwrap()
    }

    fn records(n: usize) -> SharedRecords {
        (0..n)
            .map(|i| TransferRecord {
                from_address: format!("0xfrom{i}"),
                to_address: "0xto".to_string(),
                amount: 1.0,
                tx_hash: format!("0xhash{i}"),
                timestamp: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
                fee: 0.001,
            })
            .collect()
    }

    #[test]
    fn test_hit_within_ttl_and_eviction_after() {
        let cache = FetchCache::new(Duration::from_secs(300));
        let key = CacheKey::new(&client(), &FetchParams::default());
        let t0 = Instant::now();

        cache.insert_at(key.clone(), records(3), t0);

        let hit = cache.get_at(&key, t0 + Duration::from_secs(299));
        assert_eq!(hit.map(|r| r.len()), Some(3));

        assert!(cache.get_at(&key, t0 + Duration::from_secs(300)).is_none());
        assert!(cache.is_empty(), "expired entry should be evicted on lookup");
    }

    #[test]
    fn test_zero_ttl_never_hits() {
        let cache = FetchCache::new(Duration::ZERO);
        let key = CacheKey::new(&client(), &FetchParams::default());
        let t0 = Instant::now();

        cache.insert_at(key.clone(), records(1), t0);
        assert!(cache.get_at(&key, t0).is_none());
    }

    #[test]
    fn test_keys_differ_by_arguments() {
        let client = client();
        let base = CacheKey::new(&client, &FetchParams::default());
        let more_pages = CacheKey::new(
            &client,
            &FetchParams {
                max_pages: 6,
                ..FetchParams::default()
            },
        );
        let filtered = CacheKey::new(
            &client,
            &FetchParams {
                min_value: Some(10.0),
                ..FetchParams::default()
            },
        );
        assert_ne!(base, more_pages);
        assert_ne!(base, filtered);

        let other_chain =
            ExplorerClient::new(&Config::new("key", 137, "http://localhost:1")).unwrap();
        assert_ne!(base, CacheKey::new(&other_chain, &FetchParams::default()));
    }

    #[test]
    fn test_zero_min_value_shares_key_with_no_filter() {
        let client = client();
        let none = CacheKey::new(&client, &FetchParams::default());
        let zero = CacheKey::new(
            &client,
            &FetchParams {
                min_value: Some(0.0),
                ..FetchParams::default()
            },
        );
        assert_eq!(none, zero);
    }

    #[test]
    fn test_purge_expired() {
        let cache = FetchCache::new(Duration::from_secs(60));
        let client = client();
        let t0 = Instant::now();

        let old = CacheKey::new(&client, &FetchParams::default());
        let fresh = CacheKey::new(
            &client,
            &FetchParams {
                max_pages: 2,
                ..FetchParams::default()
            },
        );
        cache.insert_at(old, records(1), t0);
        cache.insert_at(fresh.clone(), records(2), t0 + Duration::from_secs(50));

        let removed = cache.purge_expired_at(t0 + Duration::from_secs(70));
        assert_eq!(removed, 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get_at(&fresh, t0 + Duration::from_secs(70)).is_some());
    }

    #[test]
    fn test_insert_drops_expired_entries() {
        let cache = FetchCache::new(Duration::from_secs(60));
        let client = client();
        let t0 = Instant::now();

        let old = CacheKey::new(&client, &FetchParams::default());
        let new = CacheKey::new(
            &client,
            &FetchParams {
                max_pages: 3,
                ..FetchParams::default()
            },
        );
        cache.insert_at(old.clone(), records(1), t0);
        cache.insert_at(new.clone(), records(2), t0 + Duration::from_secs(61));

        assert_eq!(cache.len(), 1);
        assert!(cache.get_at(&new, t0 + Duration::from_secs(61)).is_some());
        assert!(cache.get_at(&old, t0).is_none());
    }

    #[test]
    fn test_cached_records_are_shared_not_copied() {
        let cache = FetchCache::default();
        let key = CacheKey::new(&client(), &FetchParams::default());
        let original = records(2);

        cache.insert(key.clone(), Arc::clone(&original));
        let hit = cache.get(&key).unwrap();
        assert!(Arc::ptr_eq(&original, &hit));
    }
}
