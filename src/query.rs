//! Request Parameters and Query Generation

use std::time::Duration;

use crate::value::Value;

/// Parameters for a single [`Client::query`] call.
///
/// Either `query` (raw SQL) or `procedure` (stored procedure name) names the
/// work; when both are absent the generated text degenerates to a bare
/// `CALL ()`. Empty strings are treated the same as `None` throughout.
///
/// [`Client::query`]: crate::Client::query
#[derive(Debug, Clone, Default)]
pub struct Params {
    /// Cache key override; when absent the key is derived from the request
    pub key: Option<String>,
    /// Database name for this call; falls back to the client's configured one
    pub database: Option<String>,
    /// Raw SQL text, used verbatim
    pub query: Option<String>,
    /// Stored procedure name, expanded to a `CALL` statement
    pub procedure: Option<String>,
    /// Ordered statement arguments
    pub args: Vec<Value>,
    /// Per-request deadline; zero means the 100 s default
    pub timeout: Duration,
    /// TTL for the shared (L2) tier; zero disables L2 caching for this call
    pub l2_ttl: Duration,
    /// TTL for the in-process (L1) tier; zero disables L1 caching
    pub l1_ttl: Duration,
}

impl Params {
    pub(crate) fn key(&self) -> Option<&str> {
        non_empty(&self.key)
    }

    pub(crate) fn database(&self) -> Option<&str> {
        non_empty(&self.database)
    }

    pub(crate) fn query(&self) -> Option<&str> {
        non_empty(&self.query)
    }

    pub(crate) fn procedure(&self) -> Option<&str> {
        non_empty(&self.procedure)
    }
}

fn non_empty(opt: &Option<String>) -> Option<&str> {
    opt.as_deref().filter(|s| !s.is_empty())
}

/// Produce the SQL text to prepare.
///
/// A raw query passes through unchanged; otherwise a stored-procedure call
/// is synthesized as `CALL <db.>proc(?, ?, ...)` with one placeholder per
/// argument. The buffer is sized exactly up front.
pub fn generate_query(params: &Params) -> String {
    if let Some(query) = params.query() {
        return query.to_string();
    }

    let proc = params.procedure().unwrap_or("");
    let db = params.database().unwrap_or("");
    let argc = params.args.len();

    // "CALL " + proc + "()" plus optional "db." and "?, " separators
    let mut size = 5 + proc.len() + 2;
    if !db.is_empty() {
        size += db.len() + 1;
    }
    if argc > 0 {
        size += argc * 3 - 2;
    }

    let mut out = String::with_capacity(size);
    out.push_str("CALL ");
    if !db.is_empty() {
        out.push_str(db);
        out.push('.');
    }
    out.push_str(proc);
    out.push('(');
    for i in 0..argc {
        if i > 0 {
            out.push_str(", ");
        }
        out.push('?');
    }
    out.push(')');
    out
}

// =============================================================================
// Tests
// =============================================================================
