//! TTL response cache over a key-value storage backend.

use chrono::Duration;
use color_eyre::{eyre::eyre, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use super::storage::KeyValueStorage;
use super::traits::{CacheEntry, Clock, SystemClock};

/// Prefix shared by every cache key in storage.
pub const CACHE_PREFIX: &str = "pulpit_cache:";

/// Response cache keyed by request endpoint.
///
/// Entries are opaque JSON. Anything that fails to parse on the way back
/// out is deleted and reported as a miss.
pub struct ResponseCache<S: KeyValueStorage> {
  storage: Arc<S>,
  ttl: Duration,
  clock: Arc<dyn Clock>,
}

impl<S: KeyValueStorage> ResponseCache<S> {
  /// Create a cache with the given time-to-live.
  pub fn new(storage: Arc<S>, ttl: Duration) -> Result<Self> {
    if ttl <= Duration::zero() {
      return Err(eyre!("Cache TTL must be positive, got {}ms", ttl.num_milliseconds()));
    }

    Ok(Self {
      storage,
      ttl,
      clock: Arc::new(SystemClock),
    })
  }

  /// Replace the clock used for expiry decisions.
  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }

  /// Storage key for an endpoint: prefix plus SHA256 of the endpoint.
  pub fn storage_key(endpoint: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(endpoint.as_bytes());
    format!("{}{}", CACHE_PREFIX, hex::encode(hasher.finalize()))
  }

  /// Store a payload, overwriting any previous entry for the endpoint.
  pub fn store(&self, endpoint: &str, payload: &Value) -> Result<()> {
    let now = self.clock.now();
    let entry = CacheEntry {
      key: Self::storage_key(endpoint),
      endpoint: endpoint.to_string(),
      payload: payload.clone(),
      stored_at: now,
      expires_at: now + self.ttl,
    };

    let data =
      serde_json::to_string(&entry).map_err(|e| eyre!("Failed to serialize cache entry: {}", e))?;
    self.storage.set(&entry.key, &data)?;

    tracing::trace!(endpoint, "cached response");
    Ok(())
  }

  /// Look up a live entry. Expired and corrupted entries are deleted.
  pub fn fetch_entry(&self, endpoint: &str) -> Option<CacheEntry> {
    let key = Self::storage_key(endpoint);

    let raw = match self.storage.get(&key) {
      Ok(Some(raw)) => raw,
      Ok(None) => return None,
      Err(e) => {
        tracing::warn!(endpoint, "cache read failed: {}", e);
        return None;
      }
    };

    let entry: CacheEntry = match serde_json::from_str(&raw) {
      Ok(entry) => entry,
      Err(e) => {
        tracing::warn!(endpoint, "dropping corrupted cache entry: {}", e);
        self.discard(&key);
        return None;
      }
    };

    if entry.is_expired(self.clock.now()) {
      tracing::debug!(endpoint, "cache entry expired");
      self.discard(&key);
      return None;
    }

    Some(entry)
  }

  /// Look up a live payload.
  pub fn fetch(&self, endpoint: &str) -> Option<Value> {
    self.fetch_entry(endpoint).map(|entry| entry.payload)
  }

  /// Remove every cache entry. Returns the count removed.
  pub fn clear(&self) -> Result<usize> {
    let removed = self.storage.remove_prefix(CACHE_PREFIX)?;
    tracing::info!(removed, "cleared response cache");
    Ok(removed)
  }

  /// Remove expired and unreadable entries. Returns the count removed.
  pub fn prune_expired(&self) -> Result<usize> {
    let now = self.clock.now();
    let mut removed = 0;

    for key in self.storage.keys_with_prefix(CACHE_PREFIX)? {
      let live = self
        .storage
        .get(&key)?
        .and_then(|raw| serde_json::from_str::<CacheEntry>(&raw).ok())
        .is_some_and(|entry| !entry.is_expired(now));

      if !live && self.storage.remove(&key)? {
        removed += 1;
      }
    }

    Ok(removed)
  }

  fn discard(&self, key: &str) {
    if let Err(e) = self.storage.remove(key) {
      tracing::warn!(key, "failed to delete cache entry: {}", e);
    }
  }
}

impl<S: KeyValueStorage> Clone for ResponseCache<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      ttl: self.ttl,
      clock: Arc::clone(&self.clock),
    }
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::cache::MemoryStorage;
  use chrono::{DateTime, TimeZone, Utc};
  use serde_json::json;
  use std::sync::Mutex;

  /// Clock that only moves when told to.
  pub(crate) struct ManualClock(Mutex<DateTime<Utc>>);

  impl ManualClock {
    pub(crate) fn new() -> Self {
      Self(Mutex::new(Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap()))
    }

    pub(crate) fn advance(&self, by: Duration) {
      let mut now = self.0.lock().unwrap();
      *now += by;
    }
  }

  impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
      *self.0.lock().unwrap()
    }
  }

  fn cache_with_clock(
    ttl: Duration,
  ) -> (
    ResponseCache<MemoryStorage>,
    Arc<ManualClock>,
    Arc<MemoryStorage>,
  ) {
    let storage = Arc::new(MemoryStorage::new());
    let clock = Arc::new(ManualClock::new());
    let cache = ResponseCache::new(Arc::clone(&storage), ttl)
      .unwrap()
      .with_clock(clock.clone());
    (cache, clock, storage)
  }

  #[test]
  fn test_rejects_non_positive_ttl() {
    let storage = Arc::new(MemoryStorage::new());
    assert!(ResponseCache::new(Arc::clone(&storage), Duration::zero()).is_err());
    assert!(ResponseCache::new(storage, Duration::milliseconds(-5)).is_err());
  }

  #[test]
  fn test_store_then_fetch() {
    let (cache, _, _) = cache_with_clock(Duration::minutes(5));
    cache.store("/devotionals", &json!([{"id": "1"}])).unwrap();

    let entry = cache.fetch_entry("/devotionals").unwrap();
    assert_eq!(entry.payload, json!([{"id": "1"}]));
    assert_eq!(entry.endpoint, "/devotionals");
    assert!(entry.expires_at > entry.stored_at);
  }

  #[test]
  fn test_store_overwrites() {
    let (cache, _, storage) = cache_with_clock(Duration::minutes(5));
    cache.store("/categories", &json!([1])).unwrap();
    cache.store("/categories", &json!([2])).unwrap();

    assert_eq!(cache.fetch("/categories"), Some(json!([2])));
    assert_eq!(storage.keys_with_prefix(CACHE_PREFIX).unwrap().len(), 1);
  }

  #[test]
  fn test_entry_expires_at_boundary_and_is_removed() {
    let (cache, clock, storage) = cache_with_clock(Duration::seconds(60));
    cache.store("/announcements", &json!({"a": 1})).unwrap();

    clock.advance(Duration::seconds(59));
    assert!(cache.fetch("/announcements").is_some());

    clock.advance(Duration::seconds(1));
    assert!(cache.fetch("/announcements").is_none());
    assert!(storage
      .get(&ResponseCache::<MemoryStorage>::storage_key("/announcements"))
      .unwrap()
      .is_none());
  }

  #[test]
  fn test_corrupted_entry_is_deleted() {
    let (cache, _, storage) = cache_with_clock(Duration::minutes(5));
    let key = ResponseCache::<MemoryStorage>::storage_key("/devotionals");
    storage.set(&key, "{not json").unwrap();

    assert!(cache.fetch("/devotionals").is_none());
    assert!(storage.get(&key).unwrap().is_none());
  }

  #[test]
  fn test_clear_only_touches_cache_prefix() {
    let (cache, _, storage) = cache_with_clock(Duration::minutes(5));
    cache.store("/a", &json!(1)).unwrap();
    cache.store("/b", &json!(2)).unwrap();
    storage.set("pulpit_sync_queue", "[]").unwrap();

    assert_eq!(cache.clear().unwrap(), 2);
    assert!(cache.fetch("/a").is_none());
    assert!(storage.get("pulpit_sync_queue").unwrap().is_some());
  }

  #[test]
  fn test_prune_expired() {
    let (cache, clock, storage) = cache_with_clock(Duration::seconds(10));
    cache.store("/old", &json!(1)).unwrap();
    clock.advance(Duration::seconds(6));
    cache.store("/new", &json!(2)).unwrap();
    storage.set(&format!("{}junk", CACHE_PREFIX), "???").unwrap();
    clock.advance(Duration::seconds(6));

    assert_eq!(cache.prune_expired().unwrap(), 2);
    assert_eq!(cache.fetch("/new"), Some(json!(2)));
  }
}
