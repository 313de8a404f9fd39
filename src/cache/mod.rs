//! Two-Tier Result Cache
//!
//! The layer caches query results twice:
//!
//! - L1 is a per-process [`LruStore`] holding typed results behind
//!   `Arc<dyn Any>`; hits skip deserialization entirely.
//! - L2 is any byte-oriented [`Storage`] implementation: the in-process
//!   [`MemoryStorage`], or something shared like a cache service.
//!
//! The orchestrator composes the two with the keyed mutex; this module only
//! owns the stores and the L2 contract.

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

use crate::error::Result;

mod memory;
mod store;

pub use memory::MemoryStorage;
pub use store::{LruStore, StoreStats};

/// Port for the shared byte-oriented cache tier.
///
/// Implementations are free to live in-process or across the network; the
/// orchestrator treats every call as best-effort and degrades misses and
/// decode failures silently.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Fetch the bytes stored under `key`, or [`Error::NotFound`].
    ///
    /// [`Error::NotFound`]: crate::Error::NotFound
    async fn get(&self, key: &str) -> Result<Bytes>;

    /// Store bytes under `key` for `ttl`; zero means no expiry.
    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<()>;

    /// Remove `key`, or [`Error::NotFound`] when absent.
    ///
    /// [`Error::NotFound`]: crate::Error::NotFound
    async fn delete(&self, key: &str) -> Result<()>;

    /// Drop every entry.
    async fn reset(&self) -> Result<()>;

    /// Release resources. Idempotent.
    async fn close(&self) -> Result<()>;
}
