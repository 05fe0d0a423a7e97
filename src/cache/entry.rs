//! Cache Entry Module
//!
//! Snapshot of a buffered response and the codec that turns it into the
//! opaque bytes handed to a store.

use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use bincode::config;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

/// Version byte written in front of every encoded entry.
pub const CODEC_VERSION: u8 = 1;

// == Cache Entry ==
/// A complete response captured on a cache miss.
///
/// Entries are never edited after creation; a fresh miss replaces the
/// whole entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// HTTP status code
    pub status: u16,
    /// Full response payload
    #[serde(with = "serde_bytes")]
    pub body: Vec<u8>,
    /// Header names with their values, both in response order
    pub headers: Vec<(String, Vec<Vec<u8>>)>,
    /// Absolute expiry, `None` = never expires
    #[serde(with = "chrono::serde::ts_nanoseconds_option")]
    pub expire_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    // == Constructor ==
    /// Captures a response's status, headers and body.
    ///
    /// # Arguments
    /// * `status` - Response status
    /// * `headers` - Response headers; multi-valued headers keep their order
    /// * `body` - Fully buffered body
    /// * `expire_at` - Absolute expiry or `None` for no expiry
    pub fn new(
        status: StatusCode,
        headers: &HeaderMap,
        body: Vec<u8>,
        expire_at: Option<DateTime<Utc>>,
    ) -> Self {
        let headers = headers
            .keys()
            .map(|name| {
                let values = headers
                    .get_all(name)
                    .iter()
                    .map(|v| v.as_bytes().to_vec())
                    .collect();
                (name.as_str().to_string(), values)
            })
            .collect();

        Self {
            status: status.as_u16(),
            body,
            headers,
            expire_at,
        }
    }

    // == Is Expired ==
    /// Checks expiry against `now`.
    ///
    /// An entry is expired once `now` reaches `expire_at`. Entries without
    /// an expiry never expire.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expire_at {
            Some(expire_at) => expire_at <= now,
            None => false,
        }
    }

    /// Checks expiry against the current time.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Returns the stored status as a `StatusCode`.
    pub fn status_code(&self) -> Result<StatusCode> {
        StatusCode::from_u16(self.status)
            .map_err(|_| CacheError::Decode(format!("invalid status code {}", self.status)))
    }

    /// Rebuilds the stored headers, appending values in their stored order.
    pub fn header_map(&self) -> Result<HeaderMap> {
        let mut map = HeaderMap::new();
        for (name, values) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| CacheError::Decode(format!("header name {:?}: {}", name, e)))?;
            for value in values {
                let value = HeaderValue::from_bytes(value)
                    .map_err(|e| CacheError::Decode(format!("header {}: {}", name, e)))?;
                map.append(name.clone(), value);
            }
        }
        Ok(map)
    }

    // == Codec ==
    /// Serializes the entry: version byte followed by the bincode payload.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut bytes = vec![CODEC_VERSION];
        bytes.extend(bincode::serde::encode_to_vec(self, config::standard())?);
        Ok(bytes)
    }

    /// Reconstructs an entry written by [`CacheEntry::encode`].
    ///
    /// # Errors
    /// * `CacheError::Decode` - empty input, unknown version, malformed or
    ///   trailing payload bytes, or an invalid status code
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (version, payload) = bytes
            .split_first()
            .ok_or_else(|| CacheError::Decode("empty entry".to_string()))?;

        if *version != CODEC_VERSION {
            return Err(CacheError::Decode(format!(
                "unknown codec version {}",
                version
            )));
        }

        let (entry, read): (CacheEntry, usize) =
            bincode::serde::decode_from_slice(payload, config::standard())?;
        if read != payload.len() {
            return Err(CacheError::Decode(format!(
                "{} trailing bytes after entry",
                payload.len() - read
            )));
        }

        entry.status_code()?;
        Ok(entry)
    }
}
