//! Request Fingerprint Module
//!
//! Derives the store key for a cacheable request.

use std::fmt;

use axum::http::{HeaderMap, Method, Uri};
use md5::{Digest, Md5};

/// Namespace prefix of every cache key.
pub const KEY_PREFIX: &str = "gin:cache:";

/// Headers folded into the fingerprint when none are configured.
pub const DEFAULT_FINGERPRINT_HEADERS: [&str; 5] = [
    "User-Agent",
    "Accept",
    "Accept-Encoding",
    "Accept-Language",
    "Cookie",
];

// == Cache Key ==
/// `gin:cache:` followed by the hex MD5 of the request fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Returns the key as stored.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// == Fingerprinter ==
/// Computes cache keys from request method, target and selected headers.
#[derive(Debug, Clone)]
pub struct Fingerprinter {
    headers: Vec<String>,
}

impl Default for Fingerprinter {
    fn default() -> Self {
        Self::new(DEFAULT_FINGERPRINT_HEADERS.iter().map(|h| h.to_string()))
    }
}

impl Fingerprinter {
    /// Creates a fingerprinter over the given header names, in order.
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
        }
    }

    /// Configured header names.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Returns the cache key for a request, or `None` if the method is not
    /// cacheable.
    ///
    /// The hashed input is the path and query exactly as received, then for
    /// each configured header present on the request its configured name
    /// followed by all of its values joined without a separator.
    pub fn fingerprint(
        &self,
        method: &Method,
        uri: &Uri,
        headers: &HeaderMap,
    ) -> Option<CacheKey> {
        if *method != Method::GET {
            return None;
        }

        let target = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");

        let mut hasher = Md5::new();
        hasher.update(target.as_bytes());
        for name in &self.headers {
            let mut values = headers.get_all(name.as_str()).iter().peekable();
            if values.peek().is_none() {
                continue;
            }
            hasher.update(name.as_bytes());
            for value in values {
                hasher.update(value.as_bytes());
            }
        }

        Some(CacheKey(format!(
            "{}{}",
            KEY_PREFIX,
            hex::encode(hasher.finalize())
        )))
    }
}
