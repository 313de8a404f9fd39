//! Database Ports
//!
//! The query layer never talks to a driver directly; it goes through these
//! traits so the real MySQL adapter, the in-crate mocks and anything else
//! can be swapped freely. The `Rows` contract is synchronous on purpose:
//! adapters buffer the result set, and row handlers iterate without holding
//! the executor.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DbError;
use crate::value::Value;

pub mod mock;

#[cfg(feature = "mysql")]
pub mod mysql;

/// Port for a database connection able to prepare statements.
#[async_trait]
pub trait Database: Send + Sync {
    /// Prepare a statement for the given query text.
    async fn prepare(&self, query: &str) -> Result<Arc<dyn Statement>, DbError>;

    /// Close the connection and release resources.
    async fn close(&self) -> Result<(), DbError>;
}

/// Port for a prepared statement, reusable with different arguments.
#[async_trait]
pub trait Statement: Send + Sync + std::fmt::Debug {
    /// Execute with the given arguments, returning a result-set iterator.
    async fn execute(&self, args: &[Value]) -> Result<Box<dyn Rows>, DbError>;

    /// Close the statement, releasing server-side resources.
    async fn close(&self) -> Result<(), DbError>;
}

/// Typed destination for a single scanned column.
#[derive(Debug)]
pub enum ScanTarget<'a> {
    Int(&'a mut i64),
    UInt(&'a mut u64),
    Float(&'a mut f64),
    Text(&'a mut String),
    Blob(&'a mut Vec<u8>),
    Bool(&'a mut bool),
    Timestamp(&'a mut DateTime<Utc>),
}

/// Result-set iterator handed to row handlers.
///
/// The orchestrator guarantees `close` is called on every exit path, so
/// handlers only need to `advance` and `scan`.
pub trait Rows: Send + std::fmt::Debug {
    /// Advance to the next row; false when the result set is exhausted.
    fn advance(&mut self) -> bool;

    /// Copy the current row's columns into the destinations, one per column.
    fn scan(&mut self, dest: &mut [ScanTarget<'_>]) -> Result<(), DbError>;

    /// Release the iterator. Safe to call more than once.
    fn close(&mut self) -> Result<(), DbError>;
}
