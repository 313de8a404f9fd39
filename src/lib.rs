//! tierquery - Two-Tier Cached Query Layer for MySQL
//!
//! A data-access middleware that serves repeated read-style queries at low
//! latency and low database load.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                            Client                                │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  L1 (typed, in-process)   │  L2 (bytes, pluggable)   │ Database  │
//! │  ┌─────────────────────┐  │  ┌────────────────────┐  │ ┌───────┐ │
//! │  │ LruStore            │  │  │ Storage trait      │  │ │ ports │ │
//! │  │ LRU + TTL + sweeper │  │  │ (MemoryStorage, …) │  │ │ + stmt│ │
//! │  └─────────────────────┘  │  └────────────────────┘  │ │ cache │ │
//! │             │             │            │             │ └───────┘ │
//! │             └─────────────┴── KeyedMutex ────────────┘           │
//! │                        (stampede protection)                     │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A request probes L1 (typed results, no deserialization), then L2
//! (codec-encoded bytes), and only on a double-checked miss under a per-key
//! lock does it reach the database, so N concurrent misses on one key cost
//! one query.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tierquery::{Client, DbError, Options, Params, Rows, ScanTarget, Value};
//!
//! # async fn example(db: Arc<dyn tierquery::Database>) -> Result<(), DbError> {
//! let client = Client::new(db, Options {
//!     database: "shop".into(),
//!     cache_enabled: true,
//!     ..Default::default()
//! });
//!
//! let params = Params {
//!     procedure: Some("product_get".into()),
//!     args: vec![Value::I64(746457348)],
//!     l2_ttl: Duration::from_secs(2),
//!     ..Default::default()
//! };
//!
//! let product = client
//!     .query(params, |rows: &mut dyn Rows| {
//!         let mut names = Vec::new();
//!         while rows.advance() {
//!             let mut name = String::new();
//!             rows.scan(&mut [ScanTarget::Text(&mut name)])?;
//!             names.push(name);
//!         }
//!         Ok(names)
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`cache`] - L1 store, L2 contract and the in-process L2
//! - [`client`] - the orchestrator and its configuration
//! - [`codec`] - serialization boundary between tiers
//! - [`db`] - database ports, mocks and the MySQL adapter
//! - [`error`] - error taxonomy
//! - [`key`] - cache-key construction
//! - [`lock`] - keyed mutual exclusion
//! - [`query`] - request parameters and query generation
//! - [`stmt`] - prepared-statement cache

pub mod cache;
pub mod client;
pub mod codec;
pub mod db;
pub mod error;
pub mod key;
pub mod lock;
pub mod query;
pub mod stmt;
mod value;

// Re-export commonly used types
pub use cache::{LruStore, MemoryStorage, Storage, StoreStats};
pub use client::{Client, Options};
pub use codec::{Bincode, Codec, Json, Msgpack};
pub use db::mock::{MockDatabase, MockRows, MockStatement};
pub use db::{Database, Rows, ScanTarget, Statement};
pub use error::{DbError, Error, Result};
pub use key::build_key;
pub use lock::{KeyedMutex, Lock};
pub use query::{generate_query, Params};
pub use stmt::StatementCache;
pub use value::Value;

#[cfg(feature = "mysql")]
pub use db::mysql::MySqlDatabase;
