//! Single-flight cache coordinator.
//!
//! Each key owns a `Slot`: a short-lived state lock (value + status + fetch
//! time, always updated together) and an async gate held for the whole of a
//! load or eviction on that key. Readers never touch the gate, so a status
//! query or a fresh hit is never blocked by an in-flight upstream call, and
//! work on one key never contends with another.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::status::{CacheEntry, CacheStatistics, CacheStatus, CacheStatusReport};

/// Memoized state elsewhere in the process that must be dropped on `evict_all`.
pub trait Resettable: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Forget memoized state so the next access reloads it.
    fn reset(&self);
}

/// A value returned from [`CacheCoordinator::get_or_load`] with the status of that lookup.
#[derive(Debug, Clone)]
pub struct Lookup<V> {
    pub value: V,
    pub status: CacheStatus,
}

struct Stored<V> {
    value: V,
    fetched_at: DateTime<Utc>,
    loaded_at: Instant,
}

struct SlotState<V, E> {
    stored: Option<Stored<V>>,
    status: CacheStatus,
    /// Bumped every time a load completes, successfully or not.
    generation: u64,
    last_failure: Option<E>,
}

struct Slot<V, E> {
    state: Mutex<SlotState<V, E>>,
    /// Per-key loading marker. Held across the loader future and during eviction.
    gate: tokio::sync::Mutex<()>,
}

impl<V, E> Slot<V, E> {
    fn new() -> Self {
        Self {
            state: Mutex::new(SlotState {
                stored: None,
                status: CacheStatus::NotCached,
                generation: 0,
                last_failure: None,
            }),
            gate: tokio::sync::Mutex::new(()),
        }
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    load_success: AtomicU64,
    load_failure: AtomicU64,
    load_time_ms: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    fn read(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

/// Per-key TTL cache that runs at most one loader per key at a time.
pub struct CacheCoordinator<V, E> {
    namespace: String,
    ttl: Duration,
    slots: RwLock<HashMap<String, Arc<Slot<V, E>>>>,
    counters: Counters,
    reset_hooks: RwLock<Vec<Arc<dyn Resettable>>>,
}

impl<V, E> CacheCoordinator<V, E>
where
    V: Clone,
    E: Clone + fmt::Display,
{
    /// Create an empty coordinator. `namespace` prefixes the reported cache keys.
    pub fn new(namespace: impl Into<String>, ttl: Duration) -> Self {
        Self {
            namespace: namespace.into(),
            ttl,
            slots: RwLock::new(HashMap::new()),
            counters: Counters::default(),
            reset_hooks: RwLock::new(Vec::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Register state to be reset whenever `evict_all` runs.
    pub fn register_reset_hook(&self, hook: Arc<dyn Resettable>) {
        debug!("Registering cache reset hook: {}", hook.name());
        self.reset_hooks.write().push(hook);
    }

    fn cache_key(&self, key: &str) -> String {
        format!("{}::{}", self.namespace, key)
    }

    fn slot(&self, key: &str) -> Option<Arc<Slot<V, E>>> {
        self.slots.read().get(key).cloned()
    }

    fn slot_or_insert(&self, key: &str) -> Arc<Slot<V, E>> {
        if let Some(slot) = self.slot(key) {
            return slot;
        }
        self.slots
            .write()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Slot::new()))
            .clone()
    }

    fn is_fresh(&self, stored: &Stored<V>) -> bool {
        !self.ttl.is_zero() && stored.loaded_at.elapsed() <= self.ttl
    }

    /// Return the cached value for `key`, loading it with `loader` when absent,
    /// expired, or when `force_refresh` is set.
    ///
    /// Concurrent callers for the same key queue behind a single in-flight load
    /// and share its outcome, including a failure, instead of calling `loader`
    /// again.
    ///
    /// # Errors
    /// Returns the loader's error (or the error of the load this call waited on).
    pub async fn get_or_load<F, Fut>(
        &self,
        key: &str,
        force_refresh: bool,
        loader: F,
    ) -> Result<Lookup<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let slot = self.slot_or_insert(key);

        let seen_generation = {
            let mut state = slot.state.lock();
            if !force_refresh {
                let fresh = state
                    .stored
                    .as_ref()
                    .filter(|stored| self.is_fresh(stored))
                    .map(|stored| stored.value.clone());
                if let Some(value) = fresh {
                    state.status = CacheStatus::Hit;
                    Counters::bump(&self.counters.hits, 1);
                    debug!("Cache hit for {}", key);
                    return Ok(Lookup {
                        value,
                        status: CacheStatus::Hit,
                    });
                }
            }
            state.generation
        };

        let _gate = slot.gate.lock().await;

        let status = {
            let mut state = slot.state.lock();

            if state.generation != seen_generation {
                // A load finished while this call was queued: share its outcome.
                if let Some(failure) = state.last_failure.clone() {
                    Counters::bump(&self.counters.misses, 1);
                    debug!("Sharing failed load for {}: {}", key, failure);
                    return Err(failure);
                }
                let shared = state.stored.as_ref().map(|stored| stored.value.clone());
                if let Some(value) = shared {
                    let status = if force_refresh {
                        Counters::bump(&self.counters.misses, 1);
                        CacheStatus::Miss
                    } else {
                        Counters::bump(&self.counters.hits, 1);
                        state.status = CacheStatus::Hit;
                        CacheStatus::Hit
                    };
                    debug!("Sharing in-flight load for {} ({})", key, status);
                    return Ok(Lookup { value, status });
                }
            }

            if force_refresh && state.stored.take().is_some() {
                Counters::bump(&self.counters.evictions, 1);
                debug!("Forced refresh evicted {}", key);
            }

            let status = if state.stored.is_some() {
                CacheStatus::Expired
            } else {
                CacheStatus::Miss
            };
            state.status = status;
            status
        };

        Counters::bump(&self.counters.misses, 1);
        debug!("Cache {} for {}, loading", status, key);

        let started = Instant::now();
        let result = loader().await;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        Counters::bump(&self.counters.load_time_ms, elapsed_ms);

        let mut state = slot.state.lock();
        state.generation = state.generation.wrapping_add(1);

        match result {
            Ok(value) => {
                state.stored = Some(Stored {
                    value: value.clone(),
                    fetched_at: Utc::now(),
                    loaded_at: Instant::now(),
                });
                state.status = status;
                state.last_failure = None;
                Counters::bump(&self.counters.load_success, 1);
                debug!("Loaded {} in {}ms", key, elapsed_ms);
                Ok(Lookup { value, status })
            }
            Err(err) => {
                state.stored = None;
                state.status = CacheStatus::Error;
                state.last_failure = Some(err.clone());
                Counters::bump(&self.counters.load_failure, 1);
                warn!("Load failed for {}: {}", key, err);
                Err(err)
            }
        }
    }

    /// Snapshot of the entry for `key`, or the `NOT_CACHED` sentinel. Never waits on a load.
    pub fn get(&self, key: &str) -> CacheEntry<V> {
        let ttl_seconds = self.ttl.as_secs();
        let Some(slot) = self.slot(key) else {
            return CacheEntry::not_cached(key, ttl_seconds);
        };

        let state = slot.state.lock();
        CacheEntry {
            key: key.to_string(),
            value: state.stored.as_ref().map(|stored| stored.value.clone()),
            status: state.status,
            fetched_at: state.stored.as_ref().map(|stored| stored.fetched_at),
            ttl_seconds,
            is_expired: state.stored.as_ref().map_or(true, |stored| !self.is_fresh(stored)),
            last_error: state.last_failure.as_ref().map(ToString::to_string),
        }
    }

    /// Status of `key` including whether its value has outlived the TTL.
    pub fn status(&self, key: &str) -> CacheStatusReport {
        let entry = self.get(key);
        CacheStatusReport {
            city_id: entry.key,
            cache_status: entry.status,
            ttl_seconds: entry.ttl_seconds,
            cache_key: self.cache_key(key),
            is_expired: entry.is_expired,
            fetched_at: entry.fetched_at,
            last_error: entry.last_error,
        }
    }

    /// Remove the value for `key` and mark it `EVICTED`.
    ///
    /// Waits for an in-flight load on the same key. Returns true if a value was removed.
    pub async fn evict(&self, key: &str) -> bool {
        let Some(slot) = self.slot(key) else {
            debug!("Evict requested for unknown key {}", key);
            return false;
        };

        let _gate = slot.gate.lock().await;
        let mut state = slot.state.lock();
        let removed = state.stored.take().is_some();
        state.status = CacheStatus::Evicted;
        state.last_failure = None;

        if removed {
            Counters::bump(&self.counters.evictions, 1);
        }
        info!("Evicted {} (had value: {})", self.cache_key(key), removed);
        removed
    }

    /// Drop the slot for `key` if it holds no value and no other caller is using it.
    ///
    /// Used for keys that turned out not to exist, so they leave no entry behind
    /// and report `NOT_CACHED`. Returns true if the slot was removed.
    pub fn forget(&self, key: &str) -> bool {
        let mut slots = self.slots.write();
        let removable = slots
            .get(key)
            .is_some_and(|slot| Arc::strong_count(slot) == 1 && slot.state.lock().stored.is_none());
        if removable {
            slots.remove(key);
            debug!("Forgot empty slot {}", key);
        }
        removable
    }

    /// Clear every entry and run the registered reset hooks.
    ///
    /// Cumulative counters are kept. Returns the number of values removed.
    pub async fn evict_all(&self) -> usize {
        let slots: Vec<Arc<Slot<V, E>>> = self.slots.read().values().cloned().collect();

        let mut removed = 0usize;
        for slot in slots {
            let _gate = slot.gate.lock().await;
            let mut state = slot.state.lock();
            if state.stored.take().is_some() {
                removed += 1;
            }
            state.status = CacheStatus::NotCached;
            state.last_failure = None;
        }
        Counters::bump(&self.counters.evictions, removed as u64);

        let hooks: Vec<Arc<dyn Resettable>> = self.reset_hooks.read().clone();
        for hook in hooks {
            debug!("Resetting {}", hook.name());
            hook.reset();
        }

        info!("Cleared all {} entries ({} values removed)", self.namespace, removed);
        removed
    }

    /// Cumulative counters plus the current number of cached values.
    pub fn statistics(&self) -> CacheStatistics {
        let mut cache_keys: Vec<String> = self
            .slots
            .read()
            .iter()
            .filter(|(_, slot)| slot.state.lock().stored.is_some())
            .map(|(key, _)| key.clone())
            .collect();
        cache_keys.sort();

        let hit_count = Counters::read(&self.counters.hits);
        let miss_count = Counters::read(&self.counters.misses);
        let load_success_count = Counters::read(&self.counters.load_success);
        let load_failure_count = Counters::read(&self.counters.load_failure);
        let total_load_time_ms = Counters::read(&self.counters.load_time_ms);

        let lookups = hit_count + miss_count;
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            hit_count as f64 / lookups as f64
        };
        let loads = load_success_count + load_failure_count;
        let average_load_penalty_ms = if loads == 0 {
            0.0
        } else {
            total_load_time_ms as f64 / loads as f64
        };

        CacheStatistics {
            hit_count,
            miss_count,
            eviction_count: Counters::read(&self.counters.evictions),
            load_success_count,
            load_failure_count,
            total_load_time_ms,
            average_load_penalty_ms,
            current_size: cache_keys.len(),
            hit_rate,
            ttl_seconds: self.ttl.as_secs(),
            cache_keys,
        }
    }
}
