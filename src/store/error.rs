//! Storage error types.

use thiserror::Error;

/// Errors raised by a durable store backend.
///
/// These never reach the user: the response cache and the basket store log
/// them and carry on with their in-memory state.
#[derive(Error, Debug)]
pub enum StorageError {
  /// The SQLite backend rejected an operation.
  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  /// A stored value could not be (de)serialized.
  #[error("serialization error: {0}")]
  Serialize(#[from] serde_json::Error),

  /// Preparing the on-disk location failed.
  #[error("storage i/o error: {0}")]
  Io(#[from] std::io::Error),

  /// Another thread panicked while holding the store lock.
  #[error("store lock poisoned")]
  LockPoisoned,

  /// No default location could be determined for the store.
  #[error("could not determine data directory")]
  NoDataDir,
}
