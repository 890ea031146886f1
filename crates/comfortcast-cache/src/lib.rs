//! Per-key TTL cache with single-flight loading.
//!
//! `CacheCoordinator` owns one entry per key (value, status and fetch time held
//! together), guarantees at most one loader runs per key at a time, and keeps
//! cumulative hit/miss/eviction counters that survive `evict_all`.

pub mod coordinator;
pub mod status;

pub use coordinator::{CacheCoordinator, Lookup, Resettable};
pub use status::{CacheEntry, CacheStatistics, CacheStatus, CacheStatusReport};
