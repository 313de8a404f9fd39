//! Mock database for tests
//!
//! Maps query text to canned statements, with call counters, configurable
//! errors and an optional artificial delay for timeout scenarios. Mirrors
//! what a real adapter does closely enough that the orchestrator tests can
//! exercise every path without a server.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{Database, Rows, ScanTarget, Statement};
use crate::error::DbError;
use crate::value::Value;

/// In-memory rows backed by a grid of [`Value`]s.
#[derive(Debug)]
pub struct MockRows {
    data: Vec<Vec<Value>>,
    idx: usize,
    closed: bool,
}

impl MockRows {
    pub fn new(data: Vec<Vec<Value>>) -> Self {
        Self {
            data,
            idx: 0,
            closed: false,
        }
    }
}

impl Rows for MockRows {
    fn advance(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.idx += 1;
        self.idx <= self.data.len()
    }

    fn scan(&mut self, dest: &mut [ScanTarget<'_>]) -> Result<(), DbError> {
        let row = self
            .data
            .get(self.idx.wrapping_sub(1))
            .ok_or_else(|| DbError::general("scan called before advance"))?;

        for (col, target) in row.iter().zip(dest.iter_mut()) {
            scan_value(col, target)?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), DbError> {
        self.closed = true;
        Ok(())
    }
}

fn scan_value(col: &Value, target: &mut ScanTarget<'_>) -> Result<(), DbError> {
    match (col, target) {
        (Value::I8(v), ScanTarget::Int(d)) => **d = i64::from(*v),
        (Value::I16(v), ScanTarget::Int(d)) => **d = i64::from(*v),
        (Value::I32(v), ScanTarget::Int(d)) => **d = i64::from(*v),
        (Value::I64(v), ScanTarget::Int(d)) => **d = *v,
        (Value::U8(v), ScanTarget::UInt(d)) => **d = u64::from(*v),
        (Value::U16(v), ScanTarget::UInt(d)) => **d = u64::from(*v),
        (Value::U32(v), ScanTarget::UInt(d)) => **d = u64::from(*v),
        (Value::U64(v), ScanTarget::UInt(d)) => **d = *v,
        (Value::F32(v), ScanTarget::Float(d)) => **d = f64::from(*v),
        (Value::F64(v), ScanTarget::Float(d)) => **d = *v,
        (Value::Str(v), ScanTarget::Text(d)) => **d = v.clone(),
        (Value::Bytes(v), ScanTarget::Blob(d)) => **d = v.clone(),
        (Value::Bool(v), ScanTarget::Bool(d)) => **d = *v,
        (Value::Timestamp(v), ScanTarget::Timestamp(d)) => **d = *v,
        (col, target) => {
            return Err(DbError::general(format!(
                "cannot scan {col:?} into {target:?}"
            )))
        }
    }
    Ok(())
}

/// Canned prepared statement.
///
/// `rows` is cloned into a fresh [`MockRows`] per execution; `error` makes
/// the execution fail; `delay` simulates a slow server so deadline handling
/// can be tested.
#[derive(Default, Debug)]
pub struct MockStatement {
    rows: Vec<Vec<Value>>,
    error: Option<DbError>,
    delay: Option<Duration>,
    executes: AtomicUsize,
}

impl MockStatement {
    pub fn with_rows(rows: Vec<Vec<Value>>) -> Self {
        Self {
            rows,
            ..Default::default()
        }
    }

    pub fn with_error(error: DbError) -> Self {
        Self {
            error: Some(error),
            ..Default::default()
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// How many times `execute` ran.
    pub fn executions(&self) -> usize {
        self.executes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Statement for MockStatement {
    async fn execute(&self, _args: &[Value]) -> Result<Box<dyn Rows>, DbError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.executes.fetch_add(1, Ordering::SeqCst);

        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        Ok(Box::new(MockRows::new(self.rows.clone())))
    }

    async fn close(&self) -> Result<(), DbError> {
        Ok(())
    }
}

/// Mock database mapping query text to statements.
#[derive(Debug)]
pub struct MockDatabase {
    stmts: Mutex<HashMap<String, Arc<MockStatement>>>,
    prepare_error: Mutex<Option<DbError>>,
    prepares: AtomicUsize,
    closed: AtomicBool,
}

impl Default for MockDatabase {
    fn default() -> Self {
        Self {
            stmts: Mutex::new(HashMap::new()),
            prepare_error: Mutex::new(None),
            prepares: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }
}

impl MockDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a statement for a query string.
    pub fn with_stmt(&self, query: impl Into<String>, stmt: Arc<MockStatement>) {
        self.stmts.lock().insert(query.into(), stmt);
    }

    /// Make every `prepare` fail with the given error.
    pub fn fail_prepare(&self, error: DbError) {
        *self.prepare_error.lock() = Some(error);
    }

    /// How many times `prepare` ran.
    pub fn prepares(&self) -> usize {
        self.prepares.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Database for MockDatabase {
    async fn prepare(&self, query: &str) -> Result<Arc<dyn Statement>, DbError> {
        if self.is_closed() {
            return Err(DbError::general("database is closed"));
        }
        if let Some(err) = self.prepare_error.lock().clone() {
            self.prepares.fetch_add(1, Ordering::SeqCst);
            return Err(err);
        }
        self.prepares.fetch_add(1, Ordering::SeqCst);

        let stmt = self
            .stmts
            .lock()
            .get(query)
            .cloned()
            .ok_or_else(|| DbError::general(format!("no statement registered for: {query}")))?;
        Ok(stmt)
    }

    async fn close(&self) -> Result<(), DbError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
