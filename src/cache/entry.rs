//! Cache entry type.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A cached response body and the metadata needed to expire it.
///
/// This is also the shape written to the durable tier, so a warm start can
/// rebuild the in-memory map from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
  /// The parsed response body
  pub value: Value,
  /// When the entry was stored
  #[serde(with = "chrono::serde::ts_milliseconds")]
  pub stored_at: DateTime<Utc>,
  /// Time-to-live in milliseconds
  ttl_ms: i64,
}

impl CacheEntry {
  pub fn new(value: Value, stored_at: DateTime<Utc>, ttl: Duration) -> Self {
    Self {
      value,
      stored_at,
      ttl_ms: ttl.num_milliseconds(),
    }
  }

  pub fn ttl(&self) -> Duration {
    Duration::milliseconds(self.ttl_ms)
  }

  /// An entry is live while its age does not exceed its TTL.
  pub fn is_live(&self, now: DateTime<Utc>) -> bool {
    now - self.stored_at <= self.ttl()
  }
}
