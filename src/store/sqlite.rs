//! SQLite-backed durable store.

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use super::{KeyValueStore, StorageError};

/// Key-value store persisted in a single SQLite table.
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

impl SqliteStore {
  /// Open the store at the default location.
  pub fn open_default() -> Result<Self, StorageError> {
    let path = Self::default_path()?;
    Self::open(&path)
  }

  /// Open (or create) the store at `path`.
  pub fn open(path: &Path) -> Result<Self, StorageError> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }

    debug!(path = %path.display(), "Opening durable store");
    let conn = Connection::open(path)?;
    Self::with_connection(conn)
  }

  /// Open a store that lives only as long as this value.
  pub fn open_in_memory() -> Result<Self, StorageError> {
    Self::with_connection(Connection::open_in_memory()?)
  }

  fn with_connection(conn: Connection) -> Result<Self, StorageError> {
    conn.execute_batch(STORE_SCHEMA)?;
    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf, StorageError> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or(StorageError::NoDataDir)?;

    Ok(data_dir.join("shopsync").join("store.db"))
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
    self.conn.lock().map_err(|_| StorageError::LockPoisoned)
  }
}

const STORE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

#[async_trait]
impl KeyValueStore for SqliteStore {
  async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
    let conn = self.lock()?;
    let value = conn
      .query_row(
        "SELECT value FROM kv_store WHERE key = ?",
        params![key],
        |row| row.get(0),
      )
      .optional()?;
    Ok(value)
  }

  async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
    let conn = self.lock()?;
    conn.execute(
      "INSERT OR REPLACE INTO kv_store (key, value, updated_at)
       VALUES (?, ?, datetime('now'))",
      params![key, value],
    )?;
    Ok(())
  }

  async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
    let conn = self.lock()?;
    conn.execute("DELETE FROM kv_store WHERE key = ?", params![key])?;
    Ok(())
  }

  async fn keys(&self) -> Result<Vec<String>, StorageError> {
    let conn = self.lock()?;
    let mut stmt = conn.prepare("SELECT key FROM kv_store ORDER BY key")?;
    let keys = stmt
      .query_map([], |row| row.get(0))?
      .collect::<Result<Vec<String>, _>>()?;
    Ok(keys)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_set_get_remove() {
    let store = SqliteStore::open_in_memory().unwrap();
    assert_eq!(store.get_item("basket").await.unwrap(), None);

    store.set_item("basket", "[]").await.unwrap();
    assert_eq!(store.get_item("basket").await.unwrap().as_deref(), Some("[]"));

    store.set_item("basket", "[1]").await.unwrap();
    assert_eq!(store.get_item("basket").await.unwrap().as_deref(), Some("[1]"));

    store.remove_item("basket").await.unwrap();
    assert_eq!(store.get_item("basket").await.unwrap(), None);
  }

  #[tokio::test]
  async fn test_remove_missing_key_is_ok() {
    let store = SqliteStore::open_in_memory().unwrap();
    assert!(store.remove_item("nope").await.is_ok());
  }

  #[tokio::test]
  async fn test_keys_lists_everything() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.set_item("b", "2").await.unwrap();
    store.set_item("a", "1").await.unwrap();
    assert_eq!(store.keys().await.unwrap(), vec!["a", "b"]);
  }
}
