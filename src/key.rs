//! Cache Key Construction
//!
//! Keys take the shape `database:query:arg1:arg2:...` where the query part
//! is the procedure name, or the 32-char hex MD5 of the raw SQL so huge
//! statements never leak into key space. The builder is a pure function of
//! its inputs; equal requests always produce equal keys.

use md5::{Digest, Md5};

use crate::query::Params;

const UNKNOWN_QUERY: &str = "unknown";

/// Build the cache key for a request.
///
/// `default_database` (the client's configured schema) is used when the
/// request does not name one. The output buffer is pre-sized from a
/// worst-case estimate so construction does not reallocate.
pub fn build_key(params: &Params, default_database: &str) -> String {
    let db = params.database().unwrap_or(default_database);

    let mut size = 0;
    if !db.is_empty() {
        size += db.len() + 1;
    }
    if let Some(proc) = params.procedure() {
        size += proc.len();
    } else if params.query().is_some() {
        // MD5 renders as 32 hex characters
        size += 32;
    } else {
        size += UNKNOWN_QUERY.len();
    }
    for arg in &params.args {
        size += 1 + arg.rendered_size_hint();
    }

    let mut key = String::with_capacity(size);

    if !db.is_empty() {
        key.push_str(db);
        key.push(':');
    }

    if let Some(proc) = params.procedure() {
        key.push_str(proc);
    } else if let Some(query) = params.query() {
        key.push_str(&hex::encode(Md5::digest(query.as_bytes())));
    } else {
        key.push_str(UNKNOWN_QUERY);
    }

    for arg in &params.args {
        key.push(':');
        arg.render_into(&mut key);
    }

    key
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use chrono::TimeZone;
    use chrono::Utc;
    use proptest::prelude::*;

    #[test]
    fn test_procedure_key() {
        let params = Params {
            database: Some("shop".into()),
            procedure: Some("product_get".into()),
            args: vec![Value::I64(746457348), Value::I32(20), Value::I32(350)],
            ..Default::default()
        };
        assert_eq!(
            build_key(&params, ""),
            "shop:product_get:746457348:20:350"
        );
    }

    #[test]
    fn test_raw_query_is_hashed() {
        let params = Params {
            database: Some("shop".into()),
            query: Some("SELECT * FROM users WHERE id = ?".into()),
            args: vec![Value::I32(42)],
            ..Default::default()
        };
        assert_eq!(
            build_key(&params, ""),
            "shop:f15e5e09c27c92be6ed2b586d171d68a:42"
        );
    }

    #[test]
    fn test_no_database_no_args() {
        let params = Params {
            procedure: Some("ping".into()),
            ..Default::default()
        };
        assert_eq!(build_key(&params, ""), "ping");
    }

    #[test]
    fn test_default_database_fallback() {
        let params = Params {
            procedure: Some("ping".into()),
            ..Default::default()
        };
        assert_eq!(build_key(&params, "app"), "app:ping");

        // A request-level database wins over the configured one.
        let params = Params {
            database: Some("other".into()),
            procedure: Some("ping".into()),
            ..Default::default()
        };
        assert_eq!(build_key(&params, "app"), "other:ping");
    }

    #[test]
    fn test_unknown_query_fallback() {
        let params = Params {
            database: Some("db".into()),
            args: vec![Value::Bool(true)],
            ..Default::default()
        };
        assert_eq!(build_key(&params, ""), "db:unknown:true");
    }

    #[test]
    fn test_mixed_argument_rendering() {
        let ts = Utc.with_ymd_and_hms(2024, 11, 17, 10, 0, 0).unwrap();
        let params = Params {
            database: Some("db".into()),
            procedure: Some("audit".into()),
            args: vec![
                Value::from("John Doe"),
                Value::Timestamp(ts),
                Value::F64(1.5),
                Value::from(b"blob".as_slice()),
            ],
            ..Default::default()
        };
        assert_eq!(
            build_key(&params, ""),
            "db:audit:John Doe:2024-11-17 10:00:00:1.5:blob"
        );
    }

    #[test]
    fn test_buffer_is_presized() {
        let params = Params {
            database: Some("shop".into()),
            query: Some("SELECT * FROM data WHERE content = ?".into()),
            args: vec![Value::from("A".repeat(1024).as_str())],
            ..Default::default()
        };
        let key = build_key(&params, "");
        assert_eq!(key.len(), key.capacity());
    }

    proptest! {
        // Equal inputs must yield equal outputs, regardless of content.
        #[test]
        fn prop_key_is_deterministic(
            db in "[a-z]{0,12}",
            query in ".{0,64}",
            ints in proptest::collection::vec(any::<i64>(), 0..8),
        ) {
            let params = Params {
                database: Some(db),
                query: Some(query),
                args: ints.into_iter().map(Value::I64).collect(),
                ..Default::default()
            };
            prop_assert_eq!(build_key(&params, "fallback"), build_key(&params, "fallback"));
        }

        // Distinct integer argument lists must not collide for one query.
        #[test]
        fn prop_distinct_args_distinct_keys(a in any::<i64>(), b in any::<i64>()) {
            prop_assume!(a != b);
            let mk = |v: i64| Params {
                procedure: Some("p".into()),
                args: vec![Value::I64(v)],
                ..Default::default()
            };
            prop_assert_ne!(build_key(&mk(a), ""), build_key(&mk(b), ""));
        }
    }
}
