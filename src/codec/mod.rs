//! Serialization Codecs
//!
//! L2 stores codec-encoded bytes while L1 stores typed references, so the
//! codec boundary is what lets the two tiers disagree about representation.
//! The orchestrator is generic over [`Codec`] with [`Msgpack`] as the
//! default; [`Json`] trades density for debuggability and [`Bincode`] is
//! the fastest of the three for homogeneous numeric payloads.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};

/// Serialization boundary between typed results and L2 bytes.
///
/// Implementations must be stateless and thread-safe; the orchestrator
/// shares one instance across all requests.
pub trait Codec: Send + Sync {
    /// Encode a value to bytes.
    fn marshal<T: Serialize>(&self, value: &T) -> Result<Vec<u8>>;

    /// Decode a value from bytes.
    fn unmarshal<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T>;
}

/// MessagePack codec (the default): compact and fast.
#[derive(Debug, Clone, Copy, Default)]
pub struct Msgpack;

impl Codec for Msgpack {
    fn marshal<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        rmp_serde::to_vec(value).map_err(|e| Error::Codec(e.to_string()))
    }

    fn unmarshal<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T> {
        rmp_serde::from_slice(data).map_err(|e| Error::Codec(e.to_string()))
    }
}

/// JSON codec: human-readable cache entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct Json;

impl Codec for Json {
    fn marshal<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| Error::Codec(e.to_string()))
    }

    fn unmarshal<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T> {
        serde_json::from_slice(data).map_err(|e| Error::Codec(e.to_string()))
    }
}

/// Bincode codec: dense binary for fixed-shape payloads.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bincode;

impl Codec for Bincode {
    fn marshal<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        bincode::serialize(value).map_err(|e| Error::Codec(e.to_string()))
    }

    fn unmarshal<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T> {
        bincode::deserialize(data).map_err(|e| Error::Codec(e.to_string()))
    }
}

// =============================================================================
// Tests
// =============================================================================
