//! LRU-TTL Store
//!
//! Bounded in-memory cache with O(1) get/set/delete and a background
//! expiration sweeper.
//!
//! # Design
//!
//! - One `parking_lot::Mutex` over the whole state: map, recency list,
//!   free pool, epoch.
//! - The doubly-linked recency list is index-based over a slot vector, MRU
//!   at the head; freed slots go to a free list and are reused before the
//!   vector grows.
//! - TTLs are durations measured from the store's epoch, not wall-clock
//!   deadlines; `reset` refreshes the epoch. A single subtraction decides
//!   expiry.
//! - The bound is entry count, never bytes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::debug;

use crate::error::{Error, Result};

struct Node<V> {
    key: String,
    value: V,
    /// Expiry as duration since the epoch; zero means no expiry.
    expires_in: Duration,
    prev: Option<usize>,
    next: Option<usize>,
}

struct Inner<V> {
    map: HashMap<String, usize>,
    slots: Vec<Option<Node<V>>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    epoch: Instant,
    max_size: usize,
}

impl<V> Inner<V> {
    fn detach(&mut self, idx: usize) {
        let (prev, next) = {
            let node = self.slots[idx].as_ref().expect("detach of free slot");
            (node.prev, node.next)
        };
        match prev {
            Some(p) => self.slots[p].as_mut().expect("list corrupt").next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slots[n].as_mut().expect("list corrupt").prev = prev,
            None => self.tail = prev,
        }
        let node = self.slots[idx].as_mut().expect("detach of free slot");
        node.prev = None;
        node.next = None;
    }

    fn push_front(&mut self, idx: usize) {
        let old_head = self.head;
        {
            let node = self.slots[idx].as_mut().expect("push of free slot");
            node.prev = None;
            node.next = old_head;
        }
        if let Some(h) = old_head {
            self.slots[h].as_mut().expect("list corrupt").prev = Some(idx);
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    /// Unlink a slot from both map and list and return it to the pool.
    fn remove_slot(&mut self, idx: usize) -> Node<V> {
        self.detach(idx);
        let node = self.slots[idx].take().expect("remove of free slot");
        self.map.remove(&node.key);
        self.free.push(idx);
        node
    }

    fn expired(&self, idx: usize, now_offset: Duration) -> bool {
        let node = self.slots[idx].as_ref().expect("expiry check of free slot");
        !node.expires_in.is_zero() && now_offset > node.expires_in
    }

    fn now_offset(&self) -> Duration {
        self.epoch.elapsed()
    }
}

/// Snapshot of store counters.
#[derive(Debug, Clone)]
pub struct StoreStats {
    /// Number of live entries
    pub entries: usize,
    /// Hit count
    pub hits: u64,
    /// Miss count
    pub misses: u64,
    /// Eviction count (capacity evictions, not TTL removals)
    pub evictions: u64,
}

/// Bounded LRU cache with epoch-anchored TTLs and a background sweeper.
///
/// Values must be cheap to clone; in this crate they are `Arc`s (L1) or
/// [`bytes::Bytes`] (the in-memory L2).
pub struct LruStore<V> {
    inner: Arc<Mutex<Inner<V>>>,
    stop: Mutex<Option<watch::Sender<()>>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<V: Clone + Send + 'static> LruStore<V> {
    /// Create a store bounded to `max_size` entries, sweeping expired
    /// entries every `sweep_interval`.
    ///
    /// The sweeper needs a tokio runtime; without one (or with a zero
    /// interval) expiry is still enforced on access.
    pub fn new(max_size: usize, sweep_interval: Duration) -> Self {
        let inner = Arc::new(Mutex::new(Inner {
            map: HashMap::new(),
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            epoch: Instant::now(),
            max_size: max_size.max(1),
        }));

        let stop = if !sweep_interval.is_zero() {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                let (tx, rx) = watch::channel(());
                handle.spawn(sweeper(Arc::downgrade(&inner), sweep_interval, rx));
                Some(tx)
            } else {
                None
            }
        } else {
            None
        };

        Self {
            inner,
            stop: Mutex::new(stop),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Look up `key`, refreshing its recency on a hit.
    ///
    /// Expired entries are removed on the way and reported as
    /// [`Error::NotFound`].
    pub fn get(&self, key: &str) -> Result<V> {
        let mut inner = self.inner.lock();

        let idx = match inner.map.get(key) {
            Some(&idx) => idx,
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return Err(Error::NotFound);
            }
        };

        let now_offset = inner.now_offset();
        if inner.expired(idx, now_offset) {
            inner.remove_slot(idx);
            self.misses.fetch_add(1, Ordering::Relaxed);
            return Err(Error::NotFound);
        }

        inner.detach(idx);
        inner.push_front(idx);
        self.hits.fetch_add(1, Ordering::Relaxed);
        Ok(inner.slots[idx].as_ref().expect("live slot").value.clone())
    }

    /// Insert or update `key`.
    ///
    /// A zero `ttl` means no expiry; otherwise the entry expires `ttl` after
    /// insertion. Inserting over capacity evicts from the tail.
    pub fn set(&self, key: &str, value: V, ttl: Duration) {
        let mut inner = self.inner.lock();

        let expires_in = if ttl.is_zero() {
            Duration::ZERO
        } else {
            inner.now_offset() + ttl
        };

        if let Some(&idx) = inner.map.get(key) {
            {
                let node = inner.slots[idx].as_mut().expect("live slot");
                node.value = value;
                node.expires_in = expires_in;
            }
            inner.detach(idx);
            inner.push_front(idx);
            return;
        }

        let idx = match inner.free.pop() {
            Some(idx) => {
                inner.slots[idx] = Some(Node {
                    key: key.to_string(),
                    value,
                    expires_in,
                    prev: None,
                    next: None,
                });
                idx
            }
            None => {
                inner.slots.push(Some(Node {
                    key: key.to_string(),
                    value,
                    expires_in,
                    prev: None,
                    next: None,
                }));
                inner.slots.len() - 1
            }
        };
        inner.push_front(idx);
        inner.map.insert(key.to_string(), idx);

        while inner.map.len() > inner.max_size {
            let tail = inner.tail.expect("non-empty store has a tail");
            inner.remove_slot(tail);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Remove `key`, or [`Error::NotFound`] when absent.
    pub fn delete(&self, key: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        match inner.map.get(key) {
            Some(&idx) => {
                inner.remove_slot(idx);
                Ok(())
            }
            None => Err(Error::NotFound),
        }
    }

    /// Drop all entries and refresh the epoch.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.map.clear();
        inner.slots.clear();
        inner.free.clear();
        inner.head = None;
        inner.tail = None;
        inner.epoch = Instant::now();
    }

    /// Stop the background sweeper. Idempotent.
    pub fn close(&self) {
        // Dropping the sender ends the sweeper's watch stream.
        self.stop.lock().take();
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().map.contains_key(key)
    }

    /// Counter snapshot.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

impl<V> Drop for LruStore<V> {
    fn drop(&mut self) {
        self.stop.lock().take();
    }
}

/// Periodically removes expired entries. Ends when the store is closed or
/// dropped.
async fn sweeper<V: Send>(
    inner: Weak<Mutex<Inner<V>>>,
    interval: Duration,
    mut stop: watch::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately; skip it.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            res = stop.changed() => {
                if res.is_err() {
                    return;
                }
            }
        }

        let Some(inner) = inner.upgrade() else {
            return;
        };
        let mut inner = inner.lock();
        let now_offset = inner.now_offset();
        let expired: Vec<usize> = inner
            .map
            .values()
            .copied()
            .filter(|&idx| inner.expired(idx, now_offset))
            .collect();
        let removed = expired.len();
        for idx in expired {
            inner.remove_slot(idx);
        }
        if removed > 0 {
            debug!(removed, "swept expired cache entries");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn store(max_size: usize) -> LruStore<String> {
        LruStore::new(max_size, Duration::from_secs(300))
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = store(8);
        cache.set("foo", "bar".to_string(), Duration::from_secs(5));
        assert_eq!(cache.get("foo").unwrap(), "bar");
    }

    #[tokio::test]
    async fn test_miss_is_not_found() {
        let cache = store(8);
        assert!(cache.get("absent").unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_lru_order_with_refresh() {
        // Capacity 3: insert a, b, c, touch a, insert d. b is the LRU and
        // must be the one evicted.
        let cache = store(3);
        cache.set("a", "1".into(), Duration::ZERO);
        cache.set("b", "2".into(), Duration::ZERO);
        cache.set("c", "3".into(), Duration::ZERO);

        cache.get("a").unwrap();
        cache.set("d", "4".into(), Duration::ZERO);

        assert!(cache.get("b").unwrap_err().is_not_found());
        assert!(cache.get("a").is_ok());
        assert!(cache.get("c").is_ok());
        assert!(cache.get("d").is_ok());
        assert_eq!(cache.len(), 3);
    }

    #[tokio::test]
    async fn test_capacity_bound() {
        let cache = store(2);
        cache.set("a", "1".into(), Duration::ZERO);
        cache.set("b", "2".into(), Duration::ZERO);
        cache.set("c", "3".into(), Duration::ZERO);

        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").unwrap_err().is_not_found());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[tokio::test]
    async fn test_update_in_place_keeps_size() {
        let cache = store(8);
        cache.set("k", "v1".into(), Duration::from_secs(5));
        cache.set("k", "v2".into(), Duration::from_secs(5));

        assert_eq!(cache.get("k").unwrap(), "v2");
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_ttl_expiry_on_get() {
        let cache = store(8);
        cache.set("foo", "bar".into(), Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(15)).await;
        assert!(cache.get("foo").unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_zero_ttl_never_expires() {
        let cache = store(8);
        cache.set("foo", "bar".into(), Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(15)).await;
        assert_eq!(cache.get("foo").unwrap(), "bar");
    }

    #[tokio::test]
    async fn test_sweeper_removes_without_access() {
        let cache: LruStore<String> = LruStore::new(8, Duration::from_millis(10));
        cache.set("foo", "bar".into(), Duration::from_millis(5));

        tokio::time::sleep(Duration::from_millis(50)).await;

        // The entry is gone from the map itself, not just masked on read.
        assert_eq!(cache.len(), 0);
        cache.close();
    }

    #[tokio::test]
    async fn test_delete() {
        let cache = store(8);
        cache.set("foo", "bar".into(), Duration::ZERO);
        cache.delete("foo").unwrap();
        assert!(cache.get("foo").unwrap_err().is_not_found());
        assert!(cache.delete("foo").unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_reset_refreshes_epoch() {
        let cache = store(8);
        cache.set("a", "1".into(), Duration::from_secs(5));
        cache.set("b", "2".into(), Duration::ZERO);
        cache.reset();

        assert_eq!(cache.len(), 0);
        assert!(cache.get("a").unwrap_err().is_not_found());

        // Entries inserted after the reset expire relative to the new epoch.
        cache.set("c", "3".into(), Duration::from_millis(20));
        assert_eq!(cache.get("c").unwrap(), "3");
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let cache = store(8);
        cache.close();
        cache.close();
    }

    #[tokio::test]
    async fn test_pool_reuse_keeps_entries_distinct() {
        // Churn enough through a small store that free slots get reused,
        // then verify no stale key/value leaks through.
        let cache = store(2);
        for i in 0..50 {
            cache.set(&format!("k{i}"), format!("v{i}"), Duration::ZERO);
        }
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("k49").unwrap(), "v49");
        assert_eq!(cache.get("k48").unwrap(), "v48");
        assert!(cache.get("k47").unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_stats_counters() {
        let cache = store(8);
        cache.set("a", "1".into(), Duration::ZERO);
        cache.get("a").unwrap();
        let _ = cache.get("nope");

        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_concurrent_access() {
        use std::sync::Arc;

        let cache = Arc::new(store(2000));
        let mut handles = Vec::new();
        for t in 0..8 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                for i in 0..200 {
                    let key = format!("k-{t}-{i}");
                    cache.set(&key, format!("v{i}"), Duration::from_secs(60));
                    cache.get(&key).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(cache.len(), 1600);
    }
}
