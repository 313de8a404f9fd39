//! In-process L2 storage
//!
//! Default [`Storage`] implementation backed by the same [`LruStore`] that
//! serves L1, holding codec-encoded bytes instead of typed values. Useful on
//! single-node deployments and in tests; shared deployments plug in a
//! networked implementation instead.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use super::store::{LruStore, StoreStats};
use super::Storage;
use crate::error::Result;

/// Byte-oriented [`Storage`] over a bounded [`LruStore`].
pub struct MemoryStorage {
    store: LruStore<Bytes>,
}

impl MemoryStorage {
    /// Create a storage bounded to `max_size` entries with the given sweep
    /// interval.
    pub fn new(max_size: usize, sweep_interval: Duration) -> Self {
        Self {
            store: LruStore::new(max_size, sweep_interval),
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Counter snapshot of the underlying store.
    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Bytes> {
        self.store.get(key)
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<()> {
        self.store.set(key, value, ttl);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.store.delete(key)
    }

    async fn reset(&self) -> Result<()> {
        self.store.reset();
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.store.close();
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
