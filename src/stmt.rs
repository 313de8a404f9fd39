//! Prepared-Statement Cache
//!
//! Memoizes prepared statements by query text so repeated calls never
//! re-prepare. Hits share a read lock; a miss takes the write lock for the
//! whole preparation, which also collapses concurrent first-preparations of
//! the same text into one driver round trip.
//!
//! Entries are never evicted during the client's lifetime; query-text
//! diversity is expected to be bounded by the application's statement set.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::db::{Database, Statement};
use crate::error::DbError;

/// Query text → prepared statement handle.
#[derive(Default)]
pub struct StatementCache {
    stmts: RwLock<HashMap<String, Arc<dyn Statement>>>,
}

impl StatementCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached statement for `query`, preparing and inserting it
    /// on first use. Preparation errors propagate unchanged and nothing is
    /// cached for them.
    pub async fn get(
        &self,
        db: &dyn Database,
        query: &str,
    ) -> Result<Arc<dyn Statement>, DbError> {
        if let Some(stmt) = self.stmts.read().await.get(query) {
            return Ok(Arc::clone(stmt));
        }

        let mut stmts = self.stmts.write().await;
        // Another task may have prepared it while we waited for the lock.
        if let Some(stmt) = stmts.get(query) {
            return Ok(Arc::clone(stmt));
        }

        let stmt = db.prepare(query).await?;
        stmts.insert(query.to_string(), Arc::clone(&stmt));
        Ok(stmt)
    }

    /// Close every cached handle, ignoring individual failures, and drop
    /// the cache contents.
    pub async fn close_all(&self) {
        let mut stmts = self.stmts.write().await;
        for (_, stmt) in stmts.drain() {
            let _ = stmt.close().await;
        }
    }

    /// Number of cached statements.
    pub async fn len(&self) -> usize {
        self.stmts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

// =============================================================================
// Tests
// =============================================================================
