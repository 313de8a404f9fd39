//! Error types for the two-tier query layer

use std::fmt;

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// MySQL error number reserved for conditions synthesized by this crate
/// (deadlock remaps, deadline expiry, serialization failures).
pub const SYNTHESIZED_ERRNO: u16 = 45000;

/// Driver error number MySQL reports for a transaction deadlock.
pub const ER_LOCK_DEADLOCK: u16 = 1213;

/// Errors that can occur in the query layer
#[derive(Error, Debug)]
pub enum Error {
    /// Key absent from a cache tier, or delete of an unknown key
    #[error("key not found")]
    NotFound,

    /// Unlock of a key that is not currently locked
    #[error("unlock of unlocked key: {0}")]
    UnlockOfUnlocked(String),

    /// Database error (driver-originated or synthesized)
    #[error(transparent)]
    Db(#[from] DbError),

    /// Codec marshal/unmarshal failure
    #[error("codec error: {0}")]
    Codec(String),

    /// L2 storage backend failure
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// True when the error means "no value", as opposed to a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound)
    }
}

/// Database error carrying the MySQL error number, the five-byte SQL state
/// (all zeroes when absent) and a message.
///
/// Two errors are considered equal when their numbers are equal; driver
/// codes are preserved verbatim and the crate reserves number 45000 for
/// synthesized conditions with a textual subtype.
#[derive(Debug, Clone, Eq)]
pub struct DbError {
    /// MySQL error number (0 when the underlying error carried none)
    pub number: u16,
    /// SQLSTATE bytes; `[0; 5]` means absent
    pub sql_state: [u8; 5],
    /// Descriptive message
    pub message: String,
}

impl DbError {
    /// Error without a driver number (number 0).
    pub fn general(message: impl Into<String>) -> Self {
        Self {
            number: 0,
            sql_state: [0; 5],
            message: message.into(),
        }
    }

    /// Driver error with a numeric code and optional SQL state.
    pub fn driver(number: u16, sql_state: [u8; 5], message: impl Into<String>) -> Self {
        Self {
            number,
            sql_state,
            message: message.into(),
        }
    }

    /// Synthesized deadlock error, remapped from driver error 1213.
    pub fn deadlock() -> Self {
        Self {
            number: SYNTHESIZED_ERRNO,
            sql_state: [0; 5],
            message: "DEADLOCK".to_string(),
        }
    }

    /// Synthesized error for a request that outlived its deadline.
    pub fn timeout() -> Self {
        Self {
            number: SYNTHESIZED_ERRNO,
            sql_state: [0; 5],
            message: "TIMEOUT".to_string(),
        }
    }

    /// Synthesized error for a codec failure while populating L2.
    pub fn serialize() -> Self {
        Self {
            number: SYNTHESIZED_ERRNO,
            sql_state: [0; 5],
            message: "SERIALIZE".to_string(),
        }
    }

    /// SQL state as a string slice, or None when absent.
    pub fn sql_state_str(&self) -> Option<&str> {
        if self.sql_state == [0; 5] {
            return None;
        }
        std::str::from_utf8(&self.sql_state).ok()
    }
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sql_state_str() {
            Some(state) => write!(f, "Error {} ({}): {}", self.number, state, self.message),
            None => write!(f, "Error {}: {}", self.number, self.message),
        }
    }
}

impl PartialEq for DbError {
    fn eq(&self, other: &Self) -> bool {
        self.number == other.number
    }
}

impl std::error::Error for DbError {}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_is_by_number_only() {
        let a = DbError::driver(1064, [0; 5], "syntax error near SELECT");
        let b = DbError::driver(1064, *b"42000", "different text");
        let c = DbError::driver(1065, [0; 5], "syntax error near SELECT");

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_display_without_state() {
        let err = DbError::general("boom");
        assert_eq!(err.to_string(), "Error 0: boom");
    }

    #[test]
    fn test_display_with_state() {
        let err = DbError::driver(1064, *b"42000", "syntax error");
        assert_eq!(err.to_string(), "Error 1064 (42000): syntax error");
    }

    #[test]
    fn test_synthesized_constructors() {
        assert_eq!(DbError::deadlock().number, SYNTHESIZED_ERRNO);
        assert_eq!(DbError::deadlock().message, "DEADLOCK");
        assert_eq!(DbError::timeout().message, "TIMEOUT");
        assert_eq!(DbError::serialize().message, "SERIALIZE");

        // All synthesized kinds share the reserved number, so they compare
        // equal; the subtype lives in the message.
        assert_eq!(DbError::deadlock(), DbError::timeout());
    }

    #[test]
    fn test_not_found_predicate() {
        assert!(Error::NotFound.is_not_found());
        assert!(!Error::Codec("x".into()).is_not_found());
    }
}
