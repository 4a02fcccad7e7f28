//! Two-tier response cache.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

use super::entry::CacheEntry;
use crate::config::CacheConfig;
use crate::store::KeyValueStore;

/// Prefix of every durable-tier key written by the cache.
pub const DURABLE_PREFIX: &str = "api_cache_";

/// Time source used for storing and expiring entries.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Counters exposed for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
  pub entries: usize,
  pub hits: u64,
  pub misses: u64,
  pub sets: u64,
  pub evictions: u64,
  pub invalidations: u64,
}

#[derive(Default)]
struct Counters {
  hits: AtomicU64,
  misses: AtomicU64,
  sets: AtomicU64,
  evictions: AtomicU64,
  invalidations: AtomicU64,
}

/// Response cache with an in-memory tier and a best-effort durable mirror.
///
/// The in-memory tier is authoritative for the lifetime of the process.
/// Failures of the durable tier are logged and never surface to callers.
///
/// Every async operation runs under one operation lock, durable awaits
/// included, so a lookup can never put back an entry that an invalidation
/// running alongside it has removed.
pub struct ResponseCache {
  config: CacheConfig,
  store: Arc<dyn KeyValueStore>,
  op: tokio::sync::Mutex<()>,
  memory: Mutex<HashMap<String, CacheEntry>>,
  counters: Counters,
  clock: Clock,
}

impl ResponseCache {
  pub fn new(config: CacheConfig, store: Arc<dyn KeyValueStore>) -> Self {
    Self {
      config,
      store,
      op: tokio::sync::Mutex::new(()),
      memory: Mutex::new(HashMap::new()),
      counters: Counters::default(),
      clock: Arc::new(Utc::now),
    }
  }

  /// Replace the time source.
  pub fn with_clock(mut self, clock: Clock) -> Self {
    self.clock = clock;
    self
  }

  pub fn config(&self) -> &CacheConfig {
    &self.config
  }

  fn now(&self) -> DateTime<Utc> {
    (self.clock)()
  }

  fn memory(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
    // Entries are plain data; a panic elsewhere cannot leave them half-written.
    self.memory.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn durable_key(key: &str) -> String {
    format!("{}{}", DURABLE_PREFIX, key)
  }

  /// Load every live durable entry into memory.
  ///
  /// Expired durable entries are removed along the way. Returns the number of
  /// entries loaded.
  pub async fn warm_start(&self) -> usize {
    if !self.config.enabled {
      return 0;
    }
    let _op = self.op.lock().await;

    let keys = match self.store.keys().await {
      Ok(keys) => keys,
      Err(e) => {
        warn!(error = %e, "Cache warm start failed to list durable keys");
        return 0;
      }
    };

    let now = self.now();
    let mut loaded = 0;
    for durable_key in keys {
      let Some(key) = durable_key.strip_prefix(DURABLE_PREFIX) else {
        continue;
      };

      match self.read_durable(key).await {
        Some(entry) if entry.is_live(now) => {
          self.memory().entry(key.to_string()).or_insert(entry);
          loaded += 1;
        }
        Some(_) => self.remove_durable(key).await,
        None => {}
      }
    }

    debug!(loaded, "Cache warm start complete");
    self.evict_oldest().await;
    loaded
  }

  /// Look up a live entry.
  ///
  /// A key missing from memory is looked up in the durable tier and, when
  /// still live, restored into memory (which may trigger eviction). Expired
  /// entries are purged by the lookup that finds them.
  pub async fn get(&self, key: &str) -> Option<Value> {
    if !self.config.enabled {
      return None;
    }
    let _op = self.op.lock().await;

    let in_memory = self.memory().get(key).cloned();
    let (entry, from_durable) = match in_memory {
      Some(entry) => (Some(entry), false),
      None => (self.read_durable(key).await, true),
    };

    let Some(entry) = entry else {
      self.counters.misses.fetch_add(1, Ordering::Relaxed);
      return None;
    };

    if !entry.is_live(self.now()) {
      debug!(key, "Cache entry expired");
      self.delete(key).await;
      self.counters.misses.fetch_add(1, Ordering::Relaxed);
      return None;
    }

    if from_durable {
      self.memory().insert(key.to_string(), entry.clone());
      self.evict_oldest().await;
    }

    self.counters.hits.fetch_add(1, Ordering::Relaxed);
    Some(entry.value)
  }

  /// Store `value` with the configured default TTL.
  pub async fn set(&self, key: &str, value: Value) {
    self.set_with_ttl(key, value, self.config.ttl()).await;
  }

  /// Store `value` with an explicit TTL, then relieve size pressure.
  pub async fn set_with_ttl(&self, key: &str, value: Value, ttl: Duration) {
    if !self.config.enabled {
      return;
    }
    let _op = self.op.lock().await;

    let entry = CacheEntry::new(value, self.now(), ttl);
    let encoded = serde_json::to_string(&entry);
    self.memory().insert(key.to_string(), entry);
    self.counters.sets.fetch_add(1, Ordering::Relaxed);

    match encoded {
      Ok(encoded) => {
        if let Err(e) = self.store.set_item(&Self::durable_key(key), &encoded).await {
          warn!(key, error = %e, "Cache storage failed");
        }
      }
      Err(e) => warn!(key, error = %e, "Cache entry could not be encoded"),
    }

    self.evict_oldest().await;
  }

  /// Evict the oldest entries once the cache holds more than `max_size`.
  ///
  /// Removes the oldest quarter of the entries (rounded down), or more if
  /// that is not enough to get back to `max_size`.
  pub async fn cleanup(&self) {
    let _op = self.op.lock().await;
    self.evict_oldest().await;
  }

  async fn evict_oldest(&self) {
    let evicted = {
      let mut memory = self.memory();
      let len = memory.len();
      if len <= self.config.max_size {
        return;
      }

      let mut by_age: Vec<(DateTime<Utc>, String)> = memory
        .iter()
        .map(|(key, entry)| (entry.stored_at, key.clone()))
        .collect();
      by_age.sort();

      let count = (len / 4).max(len - self.config.max_size);
      by_age.truncate(count);

      let evicted: Vec<String> = by_age.into_iter().map(|(_, key)| key).collect();
      for key in &evicted {
        memory.remove(key);
      }
      evicted
    };

    debug!(count = evicted.len(), "Cache cleanup evicted oldest entries");
    self
      .counters
      .evictions
      .fetch_add(evicted.len() as u64, Ordering::Relaxed);
    for key in &evicted {
      self.remove_durable(key).await;
    }
  }

  /// Remove every entry whose key starts with `prefix`, in both tiers.
  ///
  /// Returns the number of distinct keys removed.
  pub async fn invalidate(&self, prefix: &str) -> usize {
    let _op = self.op.lock().await;
    let mut removed: HashSet<String> = HashSet::new();
    self.memory().retain(|key, _| {
      if key.starts_with(prefix) {
        removed.insert(key.clone());
        false
      } else {
        true
      }
    });

    let durable_prefix = Self::durable_key(prefix);
    match self.store.keys().await {
      Ok(keys) => {
        for durable_key in keys.iter().filter(|k| k.starts_with(&durable_prefix)) {
          if let Err(e) = self.store.remove_item(durable_key).await {
            warn!(key = %durable_key, error = %e, "Cache invalidation failed to remove durable entry");
            continue;
          }
          if let Some(key) = durable_key.strip_prefix(DURABLE_PREFIX) {
            removed.insert(key.to_string());
          }
        }
      }
      Err(e) => warn!(prefix, error = %e, "Cache invalidation failed to list durable keys"),
    }

    debug!(prefix, count = removed.len(), "Cache invalidated");
    self.counters.invalidations.fetch_add(1, Ordering::Relaxed);
    removed.len()
  }

  /// Remove every entry from both tiers.
  pub async fn clear(&self) {
    let _op = self.op.lock().await;
    self.memory().clear();

    match self.store.keys().await {
      Ok(keys) => {
        for key in keys.iter().filter(|k| k.starts_with(DURABLE_PREFIX)) {
          if let Err(e) = self.store.remove_item(key).await {
            warn!(key = %key, error = %e, "Cache clear failed to remove durable entry");
          }
        }
      }
      Err(e) => warn!(error = %e, "Cache clear failed to list durable keys"),
    }
  }

  /// Number of entries in the in-memory tier, live or not yet purged.
  pub fn len(&self) -> usize {
    self.memory().len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn stats(&self) -> CacheStats {
    CacheStats {
      entries: self.len(),
      hits: self.counters.hits.load(Ordering::Relaxed),
      misses: self.counters.misses.load(Ordering::Relaxed),
      sets: self.counters.sets.load(Ordering::Relaxed),
      evictions: self.counters.evictions.load(Ordering::Relaxed),
      invalidations: self.counters.invalidations.load(Ordering::Relaxed),
    }
  }

  async fn delete(&self, key: &str) {
    self.memory().remove(key);
    self.remove_durable(key).await;
  }

  async fn read_durable(&self, key: &str) -> Option<CacheEntry> {
    let raw = match self.store.get_item(&Self::durable_key(key)).await {
      Ok(raw) => raw?,
      Err(e) => {
        warn!(key, error = %e, "Cache read from durable store failed");
        return None;
      }
    };

    match serde_json::from_str(&raw) {
      Ok(entry) => Some(entry),
      Err(e) => {
        warn!(key, error = %e, "Discarding unreadable durable cache entry");
        None
      }
    }
  }

  async fn remove_durable(&self, key: &str) {
    if let Err(e) = self.store.remove_item(&Self::durable_key(key)).await {
      warn!(key, error = %e, "Cache failed to remove durable entry");
    }
  }
}
