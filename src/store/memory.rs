//! In-memory store, lost when the process exits.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{KeyValueStore, StorageError};

/// Store backed by a `HashMap`.
#[derive(Default)]
pub struct MemoryStore {
  items: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
  async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
    let items = self.items.lock().map_err(|_| StorageError::LockPoisoned)?;
    Ok(items.get(key).cloned())
  }

  async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
    let mut items = self.items.lock().map_err(|_| StorageError::LockPoisoned)?;
    items.insert(key.to_string(), value.to_string());
    Ok(())
  }

  async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
    let mut items = self.items.lock().map_err(|_| StorageError::LockPoisoned)?;
    items.remove(key);
    Ok(())
  }

  async fn keys(&self) -> Result<Vec<String>, StorageError> {
    let items = self.items.lock().map_err(|_| StorageError::LockPoisoned)?;
    Ok(items.keys().cloned().collect())
  }
}
