//! Local persistence for offline support.
//!
//! This module provides:
//! - A key-value storage abstraction with SQLite and in-memory backends
//! - A TTL response cache for successful GET requests
//! - Result metadata describing whether data came from network or cache

mod layer;
mod storage;
mod traits;

pub use layer::{ResponseCache, CACHE_PREFIX};
pub use storage::{KeyValueStorage, MemoryStorage, SqliteStorage};
pub use traits::{CacheEntry, CacheResult, CacheSource, Clock, SystemClock};

#[cfg(test)]
pub(crate) use layer::tests::ManualClock;
