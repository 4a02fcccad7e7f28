//! The durable store contract.

use async_trait::async_trait;

use super::StorageError;

/// A string-keyed durable store, the equivalent of browser local storage.
///
/// Each write targets exactly one key; no transactions or atomic multi-key
/// writes are assumed. The methods are async so that a backend doing real
/// I/O can be awaited without blocking the caller.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
  /// Read the value stored under `key`, `None` when absent.
  async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

  /// Store `value` under `key`, replacing any previous value.
  async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

  /// Remove `key`. Removing an absent key is not an error.
  async fn remove_item(&self, key: &str) -> Result<(), StorageError>;

  /// All keys currently stored.
  async fn keys(&self) -> Result<Vec<String>, StorageError>;
}
