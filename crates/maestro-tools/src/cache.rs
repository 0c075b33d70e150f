//! TTL + capacity bounded cache for tool results.

use maestro_core::JsonMap;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CacheEntry {
    data: Value,
    created_at: Instant,
    expires_at: Instant,
}

/// Counters reported by [`ToolCache::stats`].
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub max_size: usize,
    pub default_ttl: Duration,
}

/// Key/value store for tool results, keyed by `(tool name, parameters)`.
///
/// Entries expire after their TTL. When the cache is full, the entry
/// with the oldest `created_at` is evicted before insert. Eviction is
/// by creation time, not last access, so a frequently-read old entry is
/// still the first to go. That policy is deliberate and pinned by tests.
#[derive(Debug)]
pub struct ToolCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    max_size: usize,
    default_ttl: Duration,
}

impl Default for ToolCache {
    fn default() -> Self {
        Self::new(100, Duration::from_secs(300))
    }
}

impl ToolCache {
    pub fn new(max_size: usize, default_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_size: max_size.max(1),
            default_ttl,
        }
    }

    /// Stable cache key: the tool name plus a digest of the parameters
    /// serialized with sorted keys (serde_json's default `Map` is
    /// BTree-backed, so serialization is already canonical).
    pub fn key(tool: &str, params: &JsonMap) -> String {
        let canonical = serde_json::to_vec(params).unwrap_or_default();
        let digest = Sha256::digest(&canonical);
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        format!("{tool}:{hex}")
    }

    /// Look up a cached value, evicting it on expiry.
    pub fn get(&self, tool: &str, params: &JsonMap) -> Option<Value> {
        let key = Self::key(tool, params);
        let mut entries = self.lock();
        match entries.get(&key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.data.clone()),
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    /// Insert a value, evicting the oldest-created entry first when the
    /// cache is at capacity.
    pub fn set(&self, tool: &str, params: &JsonMap, data: Value, ttl: Option<Duration>) {
        let key = Self::key(tool, params);
        let now = Instant::now();
        let mut entries = self.lock();
        if !entries.contains_key(&key) && entries.len() >= self.max_size {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.created_at)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
            }
        }
        entries.insert(
            key,
            CacheEntry {
                data,
                created_at: now,
                expires_at: now + ttl.unwrap_or(self.default_ttl),
            },
        );
    }

    /// Drop every entry, or only those belonging to one tool.
    pub fn invalidate(&self, tool: Option<&str>) {
        let mut entries = self.lock();
        match tool {
            Some(tool) => {
                let prefix = format!("{tool}:");
                entries.retain(|key, _| !key.starts_with(&prefix));
            }
            None => entries.clear(),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            max_size: self.max_size,
            default_ttl: self.default_ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        // A poisoned lock only means another thread panicked mid-insert;
        // the map itself is still usable.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}
