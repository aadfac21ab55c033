use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::clock::{SharedClock, SystemClock};
use crate::log_cache_operation;
use crate::models::ParsedQuizResult;

pub const DEFAULT_TTL_SECONDS: i64 = 3600;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub value: ParsedQuizResult,
    pub created_at: DateTime<Utc>,
    pub usage_count: u64,
}

/// In-memory response cache keyed by prompt hash.
///
/// Entries expire `ttl` after insertion. Expiry is lazy on `get` and swept in
/// bulk on `put`; hits bump `usage_count` but never influence eviction.
#[derive(Clone)]
pub struct QuizCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
    ttl: Duration,
    max_entries: Option<usize>,
    clock: SharedClock,
}

impl QuizCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, None, Arc::new(SystemClock))
    }

    /// `max_entries` adds an oldest-first size bound on top of TTL expiry;
    /// `None` keeps the cache TTL-only.
    pub fn with_clock(ttl: Duration, max_entries: Option<usize>, clock: SharedClock) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
            max_entries,
            clock,
        }
    }

    pub async fn get(&self, key: &str) -> Option<ParsedQuizResult> {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;

        match entries.get_mut(key) {
            None => {
                log_cache_operation!(miss, key = key);
                return None;
            }
            Some(entry) => {
                if !self.is_expired(entry, now) {
                    entry.usage_count += 1;
                    log_cache_operation!(hit, key = key, usage_count = entry.usage_count);
                    return Some(entry.value.clone());
                }
            }
        }

        entries.remove(key);
        log_cache_operation!(expired, key = key);
        None
    }

    pub async fn put(&self, key: &str, value: ParsedQuizResult) {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;

        self.cleanup_expired_entries(&mut entries, now);

        if let Some(max) = self.max_entries {
            while entries.len() >= max && !entries.contains_key(key) {
                if !Self::evict_oldest(&mut entries) {
                    break;
                }
            }
        }

        entries.insert(
            key.to_string(),
            CacheEntry {
                key: key.to_string(),
                value,
                created_at: now,
                usage_count: 1,
            },
        );

        log_cache_operation!(stored, key = key, size = entries.len());
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Snapshot of every entry for operational visibility
    pub async fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let entries = self.entries.read().await;

        let mut summaries: Vec<CacheEntrySummary> = entries
            .values()
            .map(|entry| CacheEntrySummary {
                hash: format!("{}...", entry.key.chars().take(8).collect::<String>()),
                usage_count: entry.usage_count,
                age_minutes: (now - entry.created_at).num_minutes(),
            })
            .collect();
        summaries.sort_by(|a, b| a.hash.cmp(&b.hash));

        CacheStats {
            size: entries.len(),
            expired_entries: entries.values().filter(|e| self.is_expired(e, now)).count(),
            ttl_seconds: self.ttl.num_seconds(),
            max_entries: self.max_entries,
            entries: summaries,
        }
    }

    fn is_expired(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        now - entry.created_at >= self.ttl
    }

    fn cleanup_expired_entries(&self, entries: &mut HashMap<String, CacheEntry>, now: DateTime<Utc>) {
        let before = entries.len();
        entries.retain(|_, entry| !self.is_expired(entry, now));
        let removed = before - entries.len();
        if removed > 0 {
            log_cache_operation!(swept, removed = removed);
        }
    }

    fn evict_oldest(entries: &mut HashMap<String, CacheEntry>) -> bool {
        let oldest = entries
            .values()
            .min_by_key(|entry| entry.created_at)
            .map(|entry| entry.key.clone());

        match oldest {
            Some(key) => {
                entries.remove(&key);
                log_cache_operation!(evicted, key = &key);
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub expired_entries: usize,
    pub ttl_seconds: i64,
    pub max_entries: Option<usize>,
    pub entries: Vec<CacheEntrySummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheEntrySummary {
    pub hash: String,
    pub usage_count: u64,
    pub age_minutes: i64,
}
