use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a cache key, as of the most recent operation on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CacheStatus {
    /// Value was loaded because none was cached.
    Miss,
    /// Value was served from the cache.
    Hit,
    /// A cached value had outlived its TTL and was reloaded.
    Expired,
    /// The last load failed.
    Error,
    /// The key was explicitly evicted and has not been reloaded since.
    Evicted,
    /// Nothing is known about the key.
    NotCached,
    /// A synthesized record was served instead of cached or upstream data.
    /// Never recorded by the coordinator itself; callers attach it to responses.
    Fallback,
}

impl CacheStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Miss => "MISS",
            Self::Hit => "HIT",
            Self::Expired => "EXPIRED",
            Self::Error => "ERROR",
            Self::Evicted => "EVICTED",
            Self::NotCached => "NOT_CACHED",
            Self::Fallback => "FALLBACK",
        }
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time copy of one cache entry.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub key: String,
    pub value: Option<V>,
    pub status: CacheStatus,
    pub fetched_at: Option<DateTime<Utc>>,
    pub ttl_seconds: u64,
    pub is_expired: bool,
    pub last_error: Option<String>,
}

impl<V> CacheEntry<V> {
    /// Sentinel returned for keys the coordinator has never seen.
    pub fn not_cached(key: impl Into<String>, ttl_seconds: u64) -> Self {
        Self {
            key: key.into(),
            value: None,
            status: CacheStatus::NotCached,
            fetched_at: None,
            ttl_seconds,
            is_expired: true,
            last_error: None,
        }
    }

    pub fn is_cached(&self) -> bool {
        self.value.is_some()
    }
}

/// Serializable status of one key, without the value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStatusReport {
    pub city_id: String,
    pub cache_status: CacheStatus,
    pub ttl_seconds: u64,
    pub cache_key: String,
    pub is_expired: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// Cumulative counters since the coordinator was created.
///
/// `evict_all` clears data, never these counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStatistics {
    pub hit_count: u64,
    pub miss_count: u64,
    pub eviction_count: u64,
    pub load_success_count: u64,
    pub load_failure_count: u64,
    pub total_load_time_ms: u64,
    pub average_load_penalty_ms: f64,
    pub current_size: usize,
    pub hit_rate: f64,
    pub ttl_seconds: u64,
    pub cache_keys: Vec<String>,
}
