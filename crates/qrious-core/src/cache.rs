//! In-process TTL cache for resolution and analysis results.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::resolver::ResolutionResult;
use crate::scorer::AnalysisResult;

/// Which operation produced a cached value; part of the cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheOp {
    Resolve,
    Analyze,
}

impl CacheOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resolve => "resolve",
            Self::Analyze => "analyze",
        }
    }
}

impl fmt::Display for CacheOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fallback lifetime when a configured TTL overflows the clock.
pub const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

pub fn cache_key(op: CacheOp, url: &str) -> String {
    format!("{op}:{url}")
}

/// Values stored by the analyzer facade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedResult {
    Resolution(ResolutionResult),
    Analysis(Box<AnalysisResult>),
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Key/value store where every entry carries its own expiry.
///
/// Expired entries are never returned; they are dropped lazily on read and in bulk by
/// [`ResultCache::sweep`].
#[derive(Debug)]
pub struct ResultCache<V> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    default_ttl: Duration,
}

impl<V: Clone + Send + Sync + 'static> ResultCache<V> {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub async fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            entries.remove(key);
        }
        None
    }

    /// Insert or replace `key`; `ttl` overrides the default lifetime.
    ///
    /// A lifetime beyond what `Instant` can represent is capped at [`MAX_TTL`].
    pub async fn set(&self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        let now = Instant::now();
        let ttl = ttl.unwrap_or(self.default_ttl);
        let expires_at = now
            .checked_add(ttl)
            .or_else(|| now.checked_add(MAX_TTL))
            .unwrap_or(now);
        self.entries
            .write()
            .await
            .insert(key.into(), CacheEntry { value, expires_at });
    }

    pub async fn has(&self, key: &str) -> bool {
        self.get(key).await.is_some()
    }

    pub async fn delete(&self, key: &str) -> bool {
        self.entries.write().await.remove(key).is_some()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Remove every expired entry, returning how many were dropped.
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Sweep on a fixed interval until the cache is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                let removed = cache.sweep().await;
                if removed > 0 {
                    tracing::debug!(removed, "expired cache entries swept");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced_by_operation() {
        assert_eq!(
            cache_key(CacheOp::Resolve, "https://bit.ly/x"),
            "resolve:https://bit.ly/x"
        );
        assert_eq!(
            cache_key(CacheOp::Analyze, "https://bit.ly/x"),
            "analyze:https://bit.ly/x"
        );
    }

    #[tokio::test]
    async fn stores_and_returns_values() {
        let cache = ResultCache::new(Duration::from_secs(60));
        cache.set("a", 1u32, None).await;
        assert_eq!(cache.get("a").await, Some(1));
        assert!(cache.has("a").await);
        assert!(!cache.has("b").await);

        cache.set("a", 2, None).await;
        assert_eq!(cache.get("a").await, Some(2));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn expired_entries_are_never_returned() {
        let cache = ResultCache::new(Duration::from_secs(60));
        cache.set("stale", "v".to_string(), Some(Duration::ZERO)).await;
        assert_eq!(cache.get("stale").await, None);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn oversized_ttl_is_capped_instead_of_overflowing() {
        let cache = ResultCache::new(Duration::from_secs(u64::MAX));
        cache.set("forever", 1u8, None).await;
        cache.set("explicit", 2, Some(Duration::MAX)).await;
        assert_eq!(cache.get("forever").await, Some(1));
        assert_eq!(cache.get("explicit").await, Some(2));
        assert_eq!(cache.sweep().await, 0);
    }

    #[tokio::test]
    async fn sweep_removes_only_expired_entries() {
        let cache = ResultCache::new(Duration::ZERO);
        cache.set("old-1", 1u8, None).await;
        cache.set("old-2", 2, None).await;
        cache.set("fresh", 3, Some(Duration::from_secs(60))).await;
        assert_eq!(cache.sweep().await, 2);
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get("fresh").await, Some(3));
    }

    #[tokio::test]
    async fn delete_and_clear() {
        let cache = ResultCache::new(Duration::from_secs(60));
        cache.set("a", 1u8, None).await;
        cache.set("b", 2, None).await;
        assert!(cache.delete("a").await);
        assert!(!cache.delete("a").await);
        cache.clear().await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn sweeper_stops_when_cache_is_dropped() {
        let cache = Arc::new(ResultCache::<u8>::new(Duration::ZERO));
        let handle = cache.spawn_sweeper(Duration::from_millis(5));
        cache.set("gone", 1, None).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.len().await, 0);

        drop(cache);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper exits after the cache is dropped")
            .expect("sweeper task does not panic");
    }
}
