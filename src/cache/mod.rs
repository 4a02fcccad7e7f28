//! Response cache for read requests.
//!
//! This module provides a two-tier cache that:
//! - Keeps live entries in a process-wide in-memory map for fast lookups
//! - Mirrors every entry to a durable store so a restart can warm-start
//! - Expires entries lazily on lookup once their TTL has passed
//! - Relieves size pressure by evicting the oldest quarter of the entries
//! - Drops whole resource families when a write touches that resource

mod entry;
mod key;
mod response;

pub use entry::CacheEntry;
pub use key::CacheKey;
pub use response::{CacheStats, Clock, ResponseCache, DURABLE_PREFIX};
