//! Reader/writer-locked query cache with TTL-bounded hits.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use parking_lot::RwLock;
use tokio::time::Instant;
use tracing::debug;

/// A locator result captured at a point in time.
///
/// Never mutated after insertion; readers holding an `Arc<CacheEntry>` keep a
/// stable view even if the query is refreshed or cleared meanwhile.
#[derive(Debug)]
pub struct CacheEntry {
    paths: Arc<[String]>,
    captured_at: Instant,
    captured_wall: DateTime<Local>,
}

impl CacheEntry {
    fn new(paths: Vec<String>, captured_at: Instant) -> Self {
        Self {
            paths: paths.into(),
            captured_at,
            captured_wall: Local::now(),
        }
    }

    /// Paths in locator ranking order, duplicates preserved.
    pub fn paths(&self) -> &Arc<[String]> {
        &self.paths
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    /// Wall-clock capture time, for display only.
    pub fn captured_wall(&self) -> DateTime<Local> {
        self.captured_wall
    }

    /// Age of the entry at `now`.
    pub fn age_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.captured_at)
    }

    fn is_fresh_at(&self, now: Instant, ttl: Duration) -> bool {
        self.age_at(now) < ttl
    }
}

/// Point-in-time description of one cache entry.
#[derive(Debug, Clone)]
pub struct CacheSnapshot {
    pub query: String,
    pub path_count: usize,
    pub captured_at: DateTime<Local>,
    pub age: Duration,
}

/// Maps a query string to its most recent locator result.
///
/// Keys are compared exactly: no case folding or whitespace trimming.
/// No I/O ever happens while the lock is held.
#[derive(Debug)]
pub struct QueryCache {
    entries: RwLock<HashMap<String, Arc<CacheEntry>>>,
    ttl: Duration,
}

impl QueryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the entry for `query` if it is younger than the TTL.
    pub fn get(&self, query: &str) -> Option<Arc<CacheEntry>> {
        self.get_at(query, Instant::now())
    }

    /// Same as [`QueryCache::get`] with an explicit clock reading.
    pub fn get_at(&self, query: &str, now: Instant) -> Option<Arc<CacheEntry>> {
        let entries = self.entries.read();
        entries
            .get(query)
            .filter(|entry| entry.is_fresh_at(now, self.ttl))
            .cloned()
    }

    /// Stores `paths` under `query`, replacing any previous entry.
    pub fn put(&self, query: &str, paths: Vec<String>) -> Arc<CacheEntry> {
        self.put_at(query, paths, Instant::now())
    }

    /// Same as [`QueryCache::put`] with an explicit clock reading.
    pub fn put_at(&self, query: &str, paths: Vec<String>, now: Instant) -> Arc<CacheEntry> {
        let entry = Arc::new(CacheEntry::new(paths, now));
        self.entries
            .write()
            .insert(query.to_string(), Arc::clone(&entry));
        debug!(
            "Cached {} paths for query '{}'",
            entry.paths.len(),
            query
        );
        entry
    }

    /// Removes every entry whose age at `now` is at least the TTL.
    ///
    /// Returns the number of entries removed.
    pub fn sweep(&self, now: Instant) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_fresh_at(now, self.ttl));
        before - entries.len()
    }

    /// Atomically empties the cache and returns how many entries it held.
    pub fn clear_all(&self) -> usize {
        let previous = std::mem::take(&mut *self.entries.write());
        previous.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Describes every stored entry, expired or not, sorted by query.
    pub fn snapshot(&self) -> Vec<CacheSnapshot> {
        let now = Instant::now();
        let entries: Vec<(String, Arc<CacheEntry>)> = self
            .entries
            .read()
            .iter()
            .map(|(query, entry)| (query.clone(), Arc::clone(entry)))
            .collect();

        let mut snapshots: Vec<CacheSnapshot> = entries
            .into_iter()
            .map(|(query, entry)| CacheSnapshot {
                query,
                path_count: entry.paths.len(),
                captured_at: entry.captured_wall,
                age: entry.age_at(now),
            })
            .collect();
        snapshots.sort_by(|a, b| a.query.cmp(&b.query));
        snapshots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(600);

    fn paths(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_get_within_ttl_returns_same_order_twice() {
        let cache = QueryCache::new(TTL);
        let start = Instant::now();
        cache.put_at("video", paths(&["/b", "/a", "/b"]), start);

        let first = cache.get_at("video", start + Duration::from_secs(10)).unwrap();
        let second = cache.get_at("video", start + Duration::from_secs(20)).unwrap();

        assert_eq!(&first.paths()[..], &paths(&["/b", "/a", "/b"])[..]);
        assert_eq!(first.paths(), second.paths());
    }

    #[test]
    fn test_get_at_ttl_is_a_miss() {
        let cache = QueryCache::new(TTL);
        let start = Instant::now();
        cache.put_at("video", paths(&["/a"]), start);

        assert!(cache.get_at("video", start + TTL - Duration::from_millis(1)).is_some());
        assert!(cache.get_at("video", start + TTL).is_none());
        assert!(cache.get_at("video", start + TTL * 2).is_none());
    }

    #[test]
    fn test_keys_are_exact() {
        let cache = QueryCache::new(TTL);
        cache.put("Video", paths(&["/a"]));

        assert!(cache.get("Video").is_some());
        assert!(cache.get("video").is_none());
        assert!(cache.get("Video ").is_none());
    }

    #[test]
    fn test_put_replaces_without_mutating_held_snapshot() {
        let cache = QueryCache::new(TTL);
        cache.put("q", paths(&["/old"]));
        let held = cache.get("q").unwrap();

        cache.put("q", paths(&["/new1", "/new2"]));

        assert_eq!(&held.paths()[..], &paths(&["/old"])[..]);
        assert_eq!(cache.get("q").unwrap().paths().len(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let cache = QueryCache::new(TTL);
        let start = Instant::now();
        cache.put_at("old", paths(&["/a"]), start);
        cache.put_at("fresh", paths(&["/b"]), start + Duration::from_secs(300));

        let removed = cache.sweep(start + TTL);

        assert_eq!(removed, 1);
        assert!(cache.get_at("fresh", start + TTL).is_some());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clear_all_reports_prior_count() {
        let cache = QueryCache::new(TTL);
        cache.put("a", paths(&["/a"]));
        cache.put("b", paths(&["/b"]));
        cache.put("c", Vec::new());

        assert_eq!(cache.clear_all(), 3);
        assert!(cache.is_empty());
        assert_eq!(cache.clear_all(), 0);
    }

    #[test]
    fn test_snapshot_is_sorted_and_counts_paths() {
        let cache = QueryCache::new(TTL);
        cache.put("zeta", paths(&["/1", "/2"]));
        cache.put("alpha", paths(&["/3"]));

        let snapshot = cache.snapshot();
        let queries: Vec<&str> = snapshot.iter().map(|s| s.query.as_str()).collect();

        assert_eq!(queries, vec!["alpha", "zeta"]);
        assert_eq!(snapshot[1].path_count, 2);
    }

    #[test]
    fn test_concurrent_readers_observe_identical_lists() {
        let cache = Arc::new(QueryCache::new(TTL));
        cache.put("shared", (0..1000).map(|i| format!("/f{i}")).collect());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.get("shared").unwrap().paths().clone())
            })
            .collect();

        let lists: Vec<Arc<[String]>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for list in &lists[1..] {
            assert_eq!(list, &lists[0]);
        }
    }
}
