use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use webprobe_core::{AnalysisCache, PageAnalysis};

#[derive(Debug, Clone)]
struct CacheEntry {
    created_at: Instant,
    payload: PageAnalysis,
}

/// In-process analysis cache with lazy TTL expiry.
///
/// Entries are replaced wholesale on `put` (last write wins) and never mutated in place.
/// Nothing survives the process.
#[derive(Debug)]
pub struct MemoryCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn is_expired(&self, e: &CacheEntry, now: Instant) -> bool {
        now.saturating_duration_since(e.created_at) >= self.ttl
    }

    /// Eagerly drop expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut map = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = map.len();
        map.retain(|_, e| !self.is_expired(e, now));
        before - map.len()
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AnalysisCache for MemoryCache {
    fn get(&self, key: &str) -> Option<PageAnalysis> {
        let map = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let e = map.get(key)?;
        if self.is_expired(e, Instant::now()) {
            return None;
        }
        Some(e.payload.clone())
    }

    fn put(&self, key: &str, value: PageAnalysis) {
        let entry = CacheEntry {
            created_at: Instant::now(),
            payload: value,
        };
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), entry);
    }
}
