//! MySQL Driver Adapter
//!
//! Implements the database ports over `mysql_async`. Result sets are
//! fetched eagerly so the synchronous [`Rows`] contract holds; per-request
//! deadlines are enforced by the orchestrator, not here.
//!
//! Statement handles in `mysql_async` are connection-scoped, so this
//! adapter keeps the query text and leans on the driver's per-connection
//! statement cache: `prepare` validates the text once, and every execution
//! reuses the server-side statement for its connection.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use mysql_async::prelude::Queryable;
use mysql_async::{Opts, OptsBuilder, Pool, PoolConstraints, PoolOpts};

use super::{Database, Rows, ScanTarget, Statement};
use crate::client::Options;
use crate::error::DbError;
use crate::value::Value;

/// Pooled MySQL connection implementing the [`Database`] port.
pub struct MySqlDatabase {
    pool: Pool,
}

impl MySqlDatabase {
    /// Open a pool from the options and verify it with a ping.
    pub async fn connect(options: &Options) -> Result<Self, DbError> {
        let opts = if let Some(url) = &options.connection_string {
            Opts::from_url(url).map_err(|e| DbError::general(e.to_string()))?
        } else {
            // The driver has no read/write timeout knobs; they become
            // session variables, executed on every fresh connection.
            let mut init = vec![format!(
                "SET NAMES {} COLLATE {}",
                options.charset, options.collation
            )];
            let read_secs = options.read_timeout.as_secs();
            if read_secs > 0 {
                init.push(format!("SET SESSION net_read_timeout = {read_secs}"));
            }
            let write_secs = options.write_timeout.as_secs();
            if write_secs > 0 {
                init.push(format!("SET SESSION net_write_timeout = {write_secs}"));
            }

            let mut builder = OptsBuilder::default()
                .ip_or_hostname(options.host.clone())
                .tcp_port(options.port)
                .user(Some(options.username.clone()))
                .pass(Some(options.password.clone()))
                .db_name(Some(options.database.clone()))
                .tcp_connect_timeout(Some(options.connect_timeout))
                .init(init);
            if options.max_connections > 0 {
                let constraints = PoolConstraints::new(0, options.max_connections)
                    .ok_or_else(|| DbError::general("invalid max_connections"))?;
                builder =
                    builder.pool_opts(PoolOpts::default().with_constraints(constraints));
            }
            Opts::from(builder)
        };

        let pool = Pool::new(opts);
        let mut conn = pool.get_conn().await.map_err(map_driver_error)?;
        conn.ping().await.map_err(map_driver_error)?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl Database for MySqlDatabase {
    async fn prepare(&self, query: &str) -> Result<Arc<dyn Statement>, DbError> {
        let mut conn = self.pool.get_conn().await.map_err(map_driver_error)?;
        conn.prep(query).await.map_err(map_driver_error)?;
        Ok(Arc::new(MySqlStatement {
            pool: self.pool.clone(),
            query: query.to_string(),
        }))
    }

    async fn close(&self) -> Result<(), DbError> {
        self.pool.clone().disconnect().await.map_err(map_driver_error)
    }
}

#[derive(Debug)]
struct MySqlStatement {
    pool: Pool,
    query: String,
}

#[async_trait]
impl Statement for MySqlStatement {
    async fn execute(&self, args: &[Value]) -> Result<Box<dyn Rows>, DbError> {
        let mut conn = self.pool.get_conn().await.map_err(map_driver_error)?;
        let rows: Vec<mysql_async::Row> = conn
            .exec(self.query.as_str(), to_driver_params(args))
            .await
            .map_err(map_driver_error)?;
        Ok(Box::new(MySqlRows { rows, idx: 0 }))
    }

    async fn close(&self) -> Result<(), DbError> {
        // Server-side handles live in the driver's per-connection cache.
        Ok(())
    }
}

#[derive(Debug)]
struct MySqlRows {
    rows: Vec<mysql_async::Row>,
    idx: usize,
}

impl Rows for MySqlRows {
    fn advance(&mut self) -> bool {
        self.idx += 1;
        self.idx <= self.rows.len()
    }

    fn scan(&mut self, dest: &mut [ScanTarget<'_>]) -> Result<(), DbError> {
        let row = self
            .rows
            .get(self.idx.wrapping_sub(1))
            .ok_or_else(|| DbError::general("scan called before advance"))?;

        for (i, target) in dest.iter_mut().enumerate() {
            let value = row
                .as_ref(i)
                .ok_or_else(|| DbError::general(format!("no column at index {i}")))?;
            scan_driver_value(value, target)?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), DbError> {
        self.rows.clear();
        Ok(())
    }
}

fn scan_driver_value(
    value: &mysql_async::Value,
    target: &mut ScanTarget<'_>,
) -> Result<(), DbError> {
    use mysql_async::Value as V;

    match (value, target) {
        (V::Int(v), ScanTarget::Int(d)) => **d = *v,
        (V::UInt(v), ScanTarget::Int(d)) => **d = *v as i64,
        (V::Int(v), ScanTarget::UInt(d)) => **d = *v as u64,
        (V::UInt(v), ScanTarget::UInt(d)) => **d = *v,
        (V::Float(v), ScanTarget::Float(d)) => **d = f64::from(*v),
        (V::Double(v), ScanTarget::Float(d)) => **d = *v,
        (V::Bytes(v), ScanTarget::Text(d)) => {
            **d = String::from_utf8(v.clone())
                .map_err(|e| DbError::general(format!("non-utf8 text column: {e}")))?;
        }
        (V::Bytes(v), ScanTarget::Blob(d)) => **d = v.clone(),
        (V::Int(v), ScanTarget::Bool(d)) => **d = *v != 0,
        (V::Date(y, mo, day, h, mi, s, us), ScanTarget::Timestamp(d)) => {
            **d = Utc
                .with_ymd_and_hms(i32::from(*y), u32::from(*mo), u32::from(*day), u32::from(*h), u32::from(*mi), u32::from(*s))
                .single()
                .ok_or_else(|| DbError::general("invalid datetime column"))?
                + chrono::Duration::microseconds(i64::from(*us));
        }
        (value, target) => {
            return Err(DbError::general(format!(
                "cannot scan {value:?} into {target:?}"
            )))
        }
    }
    Ok(())
}

fn to_driver_params(args: &[Value]) -> mysql_async::Params {
    if args.is_empty() {
        return mysql_async::Params::Empty;
    }
    mysql_async::Params::Positional(args.iter().map(to_driver_value).collect())
}

fn to_driver_value(value: &Value) -> mysql_async::Value {
    use mysql_async::Value as V;

    match value {
        Value::I8(v) => V::Int(i64::from(*v)),
        Value::I16(v) => V::Int(i64::from(*v)),
        Value::I32(v) => V::Int(i64::from(*v)),
        Value::I64(v) => V::Int(*v),
        Value::U8(v) => V::UInt(u64::from(*v)),
        Value::U16(v) => V::UInt(u64::from(*v)),
        Value::U32(v) => V::UInt(u64::from(*v)),
        Value::U64(v) => V::UInt(*v),
        Value::F32(v) => V::Float(*v),
        Value::F64(v) => V::Double(*v),
        Value::Str(v) => V::Bytes(v.clone().into_bytes()),
        Value::Bytes(v) => V::Bytes(v.clone()),
        Value::Timestamp(v) => {
            use chrono::{Datelike, Timelike};
            V::Date(
                v.year() as u16,
                v.month() as u8,
                v.day() as u8,
                v.hour() as u8,
                v.minute() as u8,
                v.second() as u8,
                v.timestamp_subsec_micros(),
            )
        }
        Value::Bool(v) => V::Int(i64::from(*v)),
        Value::Json(v) => V::Bytes(v.to_string().into_bytes()),
    }
}

fn map_driver_error(err: mysql_async::Error) -> DbError {
    match err {
        mysql_async::Error::Server(server) => {
            let mut state = [0u8; 5];
            let bytes = server.state.as_bytes();
            if bytes.len() == 5 {
                state.copy_from_slice(bytes);
            }
            DbError::driver(server.code, state, server.message)
        }
        other => DbError::general(other.to_string()),
    }
}
