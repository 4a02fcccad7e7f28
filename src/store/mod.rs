//! Durable key-value storage.
//!
//! The storefront keeps two kinds of state on the client: the guest basket and
//! the durable tier of the response cache. Both only need a string-keyed store
//! with no expiry of its own, so any backend implementing [`KeyValueStore`]
//! can be substituted:
//! - [`SqliteStore`] persists to a local SQLite database
//! - [`MemoryStore`] lives for the process lifetime (tests, `--ephemeral`)

mod error;
mod memory;
mod sqlite;
mod traits;

pub use error::StorageError;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::KeyValueStore;
