//! Typed query arguments
//!
//! Arguments travel through the layer twice: once into the cache key, where
//! each value has a fixed textual rendering, and once into the database port
//! for statement execution. `Value` is the common currency for both.

use chrono::{DateTime, Utc};

/// Timestamp rendering used in cache keys and by adapters.
pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single query argument.
///
/// Integer widths are kept distinct so the adapter can bind the exact driver
/// type; the key rendering is decimal for all of them. `Json` is the
/// fallback for structured values and renders as compact JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Str(String),
    Bytes(Vec<u8>),
    Timestamp(DateTime<Utc>),
    Bool(bool),
    Json(serde_json::Value),
}

impl Value {
    /// Worst-case rendered length, used to pre-size the key buffer.
    pub(crate) fn rendered_size_hint(&self) -> usize {
        match self {
            // 20 digits covers i64::MIN including the sign
            Value::I8(_)
            | Value::I16(_)
            | Value::I32(_)
            | Value::I64(_)
            | Value::U8(_)
            | Value::U16(_)
            | Value::U32(_)
            | Value::U64(_) => 20,
            // shortest round-trip decimal stays under 24 chars
            Value::F32(_) | Value::F64(_) => 24,
            Value::Str(s) => s.len(),
            Value::Bytes(b) => b.len(),
            // "2006-01-02 15:04:05"
            Value::Timestamp(_) => 19,
            Value::Bool(_) => 5,
            Value::Json(_) => 64,
        }
    }

    /// Append the key rendering of this value to `buf`.
    pub(crate) fn render_into(&self, buf: &mut String) {
        use std::fmt::Write;

        match self {
            Value::I8(v) => {
                let _ = write!(buf, "{v}");
            }
            Value::I16(v) => {
                let _ = write!(buf, "{v}");
            }
            Value::I32(v) => {
                let _ = write!(buf, "{v}");
            }
            Value::I64(v) => {
                let _ = write!(buf, "{v}");
            }
            Value::U8(v) => {
                let _ = write!(buf, "{v}");
            }
            Value::U16(v) => {
                let _ = write!(buf, "{v}");
            }
            Value::U32(v) => {
                let _ = write!(buf, "{v}");
            }
            Value::U64(v) => {
                let _ = write!(buf, "{v}");
            }
            // `{}` on floats is the shortest decimal that round-trips
            Value::F32(v) => {
                let _ = write!(buf, "{v}");
            }
            Value::F64(v) => {
                let _ = write!(buf, "{v}");
            }
            Value::Str(s) => buf.push_str(s),
            Value::Bytes(b) => buf.push_str(&String::from_utf8_lossy(b)),
            Value::Timestamp(t) => {
                let _ = write!(buf, "{}", t.format(TIMESTAMP_FORMAT));
            }
            Value::Bool(v) => buf.push_str(if *v { "true" } else { "false" }),
            Value::Json(v) => {
                let _ = write!(buf, "{v}");
            }
        }
    }
}

macro_rules! impl_value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_value_from! {
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    String => Str,
    Vec<u8> => Bytes,
    bool => Bool,
    serde_json::Value => Json,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

// =============================================================================
// Tests
// =============================================================================
