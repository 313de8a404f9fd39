//! Per-Key Mutual Exclusion
//!
//! [`KeyedMutex`] serializes work per logical key without holding a global
//! lock across the user's critical section: the registry mutex covers only
//! the indexing step, and the per-key mutex is acquired after it is
//! released. Entries are reference counted so a slot cannot be recycled
//! while any task is between those two steps, and retired inner mutexes go
//! to a free pool.
//!
//! The [`Lock`] trait is the port the orchestrator uses for stampede
//! protection; a distributed implementation (advisory locks, a lock
//! service) can be plugged in instead.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::error::{Error, Result};

/// Port for key-based mutual exclusion.
#[async_trait]
pub trait Lock: Send + Sync {
    /// Acquire the lock for `key`, blocking until it is available.
    async fn lock(&self, key: &str) -> Result<()>;

    /// Release the lock for `key`. Fails with
    /// [`Error::UnlockOfUnlocked`] when the key is not held.
    async fn unlock(&self, key: &str) -> Result<()>;
}

struct Slot {
    lock: Arc<AsyncMutex<()>>,
    /// Holders plus waiters. The slot stays in the registry while refs > 0.
    refs: i32,
    /// Guard of the current holder, parked here so `unlock` can release it.
    guard: Option<OwnedMutexGuard<()>>,
}

#[derive(Default)]
struct Registry {
    slots: HashMap<String, Slot>,
    pool: Vec<Arc<AsyncMutex<()>>>,
}

/// Reference-counted mutex family indexed by string key.
#[derive(Default)]
pub struct KeyedMutex {
    registry: Mutex<Registry>,
}

impl KeyedMutex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently registered (holders or waiters).
    pub fn len(&self) -> usize {
        self.registry.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Lock for KeyedMutex {
    async fn lock(&self, key: &str) -> Result<()> {
        let lock = {
            let mut reg = self.registry.lock();
            match reg.slots.get_mut(key) {
                Some(slot) => {
                    slot.refs += 1;
                    Arc::clone(&slot.lock)
                }
                None => {
                    let lock = reg.pool.pop().unwrap_or_default();
                    reg.slots.insert(
                        key.to_string(),
                        Slot {
                            lock: Arc::clone(&lock),
                            refs: 1,
                            guard: None,
                        },
                    );
                    lock
                }
            }
        };

        // May block; the registry lock is no longer held.
        let guard = lock.lock_owned().await;

        let mut reg = self.registry.lock();
        let slot = reg
            .slots
            .get_mut(key)
            .expect("slot pinned by non-zero refs");
        slot.guard = Some(guard);
        Ok(())
    }

    async fn unlock(&self, key: &str) -> Result<()> {
        let mut reg = self.registry.lock();

        let slot = reg
            .slots
            .get_mut(key)
            .ok_or_else(|| Error::UnlockOfUnlocked(key.to_string()))?;
        let guard = slot
            .guard
            .take()
            .ok_or_else(|| Error::UnlockOfUnlocked(key.to_string()))?;
        drop(guard);

        slot.refs -= 1;
        if slot.refs <= 0 {
            let slot = reg.slots.remove(key).expect("slot present");
            // Pool the inner mutex only once nothing else references it.
            if Arc::strong_count(&slot.lock) == 1 {
                reg.pool.push(slot.lock);
            }
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, AtomicI64, Ordering};
    use std::time::{Duration, Instant};

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_mutual_exclusion_single_key() {
        let km = Arc::new(KeyedMutex::new());
        let concurrently = Arc::new(AtomicI32::new(0));
        let max_concurrent = Arc::new(AtomicI32::new(0));

        let started = Instant::now();
        let mut handles = Vec::new();
        for _ in 0..50 {
            let km = Arc::clone(&km);
            let concurrently = Arc::clone(&concurrently);
            let max_concurrent = Arc::clone(&max_concurrent);
            handles.push(tokio::spawn(async move {
                km.lock("same-key").await.unwrap();
                let cur = concurrently.fetch_add(1, Ordering::SeqCst) + 1;
                max_concurrent.fetch_max(cur, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                concurrently.fetch_sub(1, Ordering::SeqCst);
                km.unlock("same-key").await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_concurrent.load(Ordering::SeqCst), 1);
        // 50 holders serialized at >= 5 ms each
        assert!(started.elapsed() >= Duration::from_millis(250));
        assert!(km.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_contended_keys_all_complete() {
        let km = Arc::new(KeyedMutex::new());
        let sum = Arc::new(AtomicI64::new(0));

        let mut handles = Vec::new();
        for _ in 0..100 {
            let km = Arc::clone(&km);
            let sum = Arc::clone(&sum);
            handles.push(tokio::spawn(async move {
                for i in 0..10 {
                    let key = format!("key-{i}");
                    km.lock(&key).await.unwrap();
                    sum.fetch_add(1, Ordering::SeqCst);
                    km.unlock(&key).await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(sum.load(Ordering::SeqCst), 1000);
        assert!(km.is_empty());
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block_each_other() {
        let km = KeyedMutex::new();
        km.lock("a").await.unwrap();
        // A second key is immediately acquirable while "a" is held.
        km.lock("b").await.unwrap();
        km.unlock("a").await.unwrap();
        km.unlock("b").await.unwrap();
    }

    #[tokio::test]
    async fn test_unlock_without_lock_fails() {
        let km = KeyedMutex::new();
        let err = km.unlock("no-key").await.unwrap_err();
        assert!(matches!(err, Error::UnlockOfUnlocked(_)));
    }

    #[tokio::test]
    async fn test_double_unlock_fails() {
        let km = KeyedMutex::new();
        km.lock("k").await.unwrap();
        km.unlock("k").await.unwrap();
        let err = km.unlock("k").await.unwrap_err();
        assert!(matches!(err, Error::UnlockOfUnlocked(_)));
    }

    #[tokio::test]
    async fn test_entries_are_pooled_and_reusable() {
        let km = KeyedMutex::new();
        for i in 0..32 {
            let key = format!("key-{i}");
            km.lock(&key).await.unwrap();
            km.unlock(&key).await.unwrap();
        }
        assert!(km.is_empty());

        // Recycled entries must behave like fresh ones.
        km.lock("again").await.unwrap();
        km.unlock("again").await.unwrap();
    }
}
