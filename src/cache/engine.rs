//! Cache Engine Module
//!
//! Per-request flow: fingerprint, look up, check expiry, then either replay
//! the stored response or run downstream and capture what it produced.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::{Body, Bytes, HttpBody};
use axum::extract::Request;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, Uri};
use axum::response::Response;
use chrono::{DateTime, Utc};
use http_body::Frame;
use http_body_util::BodyExt;
use tracing::{debug, error, warn};

use crate::cache::stats::StatsCounters;
use crate::cache::{CacheEntry, CacheKey, CacheStats, Fingerprinter, KEY_PREFIX};
use crate::config::CacheOptions;
use crate::error::{CacheError, Result};
use crate::store::Store;

/// Header added to replayed responses.
pub const CACHE_STATUS_HEADER: HeaderName = HeaderName::from_static("x-cache-status");

// == Response Cache ==
/// The cache engine shared by all request handlers.
///
/// Holds the store only through the [`Store`] trait and takes no locks of its
/// own. Concurrent misses for one key all run downstream; the first `set`
/// wins and later writers are dropped.
///
/// Cloning is cheap, clones share the store and counters.
#[derive(Clone)]
pub struct ResponseCache {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn Store>,
    fingerprinter: Fingerprinter,
    ttl: Duration,
    max_body_size: usize,
    stats: StatsCounters,
}

impl ResponseCache {
    // == Constructor ==
    /// Creates an engine over `store`.
    ///
    /// # Arguments
    /// * `store` - Backend holding encoded entries
    /// * `options` - TTL, fingerprint headers and capture limit
    pub fn new(store: Arc<dyn Store>, options: CacheOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                fingerprinter: Fingerprinter::new(options.headers),
                ttl: options.ttl,
                max_body_size: options.max_body_size,
                stats: StatsCounters::default(),
            }),
        }
    }

    /// Returns the backing store.
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.inner.store
    }

    /// Returns a snapshot of the outcome counters.
    pub fn stats(&self) -> CacheStats {
        self.inner.stats.snapshot()
    }

    /// Computes the key for a request; `None` for non-GET methods.
    pub fn fingerprint(
        &self,
        method: &Method,
        uri: &Uri,
        headers: &HeaderMap,
    ) -> Option<CacheKey> {
        self.inner.fingerprinter.fingerprint(method, uri, headers)
    }

    /// Expiry for an entry captured at `now`.
    ///
    /// A zero TTL yields `None` (never expires). So does a TTL landing past
    /// the last instant the entry codec can hold, in 2262.
    pub fn expiry_from(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.inner.ttl.is_zero() {
            return None;
        }
        chrono::Duration::from_std(self.inner.ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .filter(|at| at.timestamp_nanos_opt().is_some())
    }

    // == Lookup ==
    /// Returns the usable entry for `key`, if any.
    ///
    /// Expired and undecodable entries are removed from the store and
    /// reported as absent.
    ///
    /// # Errors
    /// * `CacheError::Backend` - the store failed; nothing was changed
    pub fn lookup(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let bytes = match self.inner.store.get(key.as_str()) {
            Ok(bytes) => bytes,
            Err(err) if err.is_not_found() => return Ok(None),
            Err(err) => return Err(err),
        };

        match CacheEntry::decode(&bytes) {
            Ok(entry) if entry.is_expired() => {
                debug!(key = %key, "cache entry expired");
                self.inner.stats.record_expired();
                self.discard(key);
                Ok(None)
            }
            Ok(entry) => Ok(Some(entry)),
            Err(err) => {
                warn!(key = %key, error = %err, "dropping undecodable cache entry");
                self.inner.stats.record_error();
                self.discard(key);
                Ok(None)
            }
        }
    }

    // == Insert ==
    /// Encodes and creates the entry for `key`.
    ///
    /// Returns `false` when another writer created the key first; the
    /// existing entry is kept.
    pub fn insert(&self, key: &CacheKey, entry: &CacheEntry) -> Result<bool> {
        let bytes = entry.encode()?;
        match self.inner.store.set(key.as_str(), bytes) {
            Ok(()) => Ok(true),
            Err(err) if err.is_already_exists() => Ok(false),
            Err(err) => Err(err),
        }
    }

    // == Serve ==
    /// Answers `request` from the cache or through `downstream`.
    ///
    /// Replayed responses never reach `downstream`. On a miss the produced
    /// response is buffered, stored and handed back unchanged. Any cache
    /// failure falls back to serving uncached.
    pub async fn serve<F, Fut>(&self, request: Request, downstream: F) -> Response
    where
        F: FnOnce(Request) -> Fut,
        Fut: Future<Output = Response>,
    {
        let Some(key) = self.fingerprint(request.method(), request.uri(), request.headers())
        else {
            self.inner.stats.record_bypass();
            return downstream(request).await;
        };

        match self.lookup(&key) {
            Ok(Some(entry)) => match replay(entry) {
                Ok(response) => {
                    debug!(key = %key, "cache hit");
                    self.inner.stats.record_hit();
                    return response;
                }
                Err(err) => {
                    warn!(key = %key, error = %err, "dropping unreplayable cache entry");
                    self.inner.stats.record_error();
                    self.discard(&key);
                }
            },
            Ok(None) => {}
            Err(err) => {
                warn!(key = %key, error = %err, "cache lookup failed, serving uncached");
                self.inner.stats.record_error();
                return downstream(request).await;
            }
        }

        debug!(key = %key, "cache miss");
        self.inner.stats.record_miss();
        let response = downstream(request).await;
        self.capture(&key, response).await
    }

    // == Evict Expired ==
    /// Removes every expired or undecodable entry in the cache namespace.
    ///
    /// Meant for an optional periodic sweep; lookups already evict lazily.
    /// Returns the number of entries removed.
    pub fn evict_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let mut evicted = 0;

        for key in self.inner.store.keys()? {
            if !key.starts_with(KEY_PREFIX) {
                continue;
            }

            let bytes = match self.inner.store.get(&key) {
                Ok(bytes) => bytes,
                Err(err) if err.is_not_found() => continue,
                Err(err) => return Err(err),
            };

            let stale = match CacheEntry::decode(&bytes) {
                Ok(entry) => entry.is_expired_at(now),
                Err(_) => true,
            };
            if !stale {
                continue;
            }

            match self.inner.store.remove(&key) {
                Ok(()) => {
                    self.inner.stats.record_expired();
                    evicted += 1;
                }
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err),
            }
        }

        Ok(evicted)
    }

    /// Buffers a downstream response, stores it and rebuilds it for the client.
    ///
    /// Bodies that outgrow the capture limit, carry trailers or fail midway
    /// are handed on with the frames read so far in front of the rest.
    async fn capture(&self, key: &CacheKey, response: Response) -> Response {
        if exceeds_limit(&response, self.inner.max_body_size) {
            debug!(key = %key, "response body over capture limit, not cached");
            return response;
        }

        let (parts, mut body) = response.into_parts();
        let mut chunks: Vec<Bytes> = Vec::new();
        let mut size = 0usize;

        loop {
            let next = body.frame().await;
            match next {
                None => break,
                Some(Ok(frame)) => match frame.into_data() {
                    Ok(data) => {
                        size = size.saturating_add(data.len());
                        chunks.push(data);
                        if size > self.inner.max_body_size {
                            debug!(key = %key, "response body over capture limit, not cached");
                            let body = ReplayBody::new(chunks, None, Some(body), None);
                            return Response::from_parts(parts, Body::new(body));
                        }
                    }
                    Err(trailers) => {
                        debug!(key = %key, "response carries trailers, not cached");
                        let body = ReplayBody::new(chunks, Some(trailers), Some(body), None);
                        return Response::from_parts(parts, Body::new(body));
                    }
                },
                Some(Err(err)) => {
                    debug!(key = %key, error = %err, "response body failed, not cached");
                    let body = ReplayBody::new(chunks, None, None, Some(err));
                    return Response::from_parts(parts, Body::new(body));
                }
            }
        }

        let mut buffer = Vec::with_capacity(size);
        for chunk in &chunks {
            buffer.extend_from_slice(chunk);
        }
        let bytes = Bytes::from(buffer);

        let entry = CacheEntry::new(
            parts.status,
            &parts.headers,
            bytes.to_vec(),
            self.expiry_from(Utc::now()),
        );

        match self.insert(key, &entry) {
            Ok(true) => debug!(key = %key, status = entry.status, "response cached"),
            Ok(false) => debug!(key = %key, "concurrent writer cached first, discarding"),
            Err(err @ CacheError::Encode(_)) => {
                error!(key = %key, error = %err, "failed to encode cache entry");
                self.inner.stats.record_error();
            }
            Err(err) => {
                warn!(key = %key, error = %err, "failed to store cache entry");
                self.inner.stats.record_error();
            }
        }

        Response::from_parts(parts, Body::from(bytes))
    }

    /// Removes `key`, tolerating a concurrent removal.
    fn discard(&self, key: &CacheKey) {
        match self.inner.store.remove(key.as_str()) {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {}
            Err(err) => warn!(key = %key, error = %err, "failed to remove cache entry"),
        }
    }
}

/// Builds the client response for a stored entry.
fn replay(entry: CacheEntry) -> Result<Response> {
    let status = entry.status_code()?;
    let mut headers = entry.header_map()?;
    headers.insert(CACHE_STATUS_HEADER, HeaderValue::from_static("HIT"));

    let mut response = Response::new(Body::from(entry.body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}

// == Replay Body ==
/// Yields frames already pulled from a body, then whatever it has left.
///
/// A read error is re-raised after the buffered frames.
struct ReplayBody {
    read: VecDeque<Frame<Bytes>>,
    rest: Option<Body>,
    error: Option<axum::Error>,
}

impl ReplayBody {
    fn new(
        chunks: Vec<Bytes>,
        last: Option<Frame<Bytes>>,
        rest: Option<Body>,
        error: Option<axum::Error>,
    ) -> Self {
        let mut read: VecDeque<Frame<Bytes>> = chunks.into_iter().map(Frame::data).collect();
        read.extend(last);
        Self { read, rest, error }
    }
}

impl HttpBody for ReplayBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<std::result::Result<Frame<Bytes>, axum::Error>>> {
        let this = &mut *self;
        if let Some(frame) = this.read.pop_front() {
            return Poll::Ready(Some(Ok(frame)));
        }
        if let Some(err) = this.error.take() {
            return Poll::Ready(Some(Err(err)));
        }
        match this.rest.as_mut() {
            Some(rest) => Pin::new(rest).poll_frame(cx),
            None => Poll::Ready(None),
        }
    }

    fn is_end_stream(&self) -> bool {
        self.read.is_empty()
            && self.error.is_none()
            && self.rest.as_ref().map_or(true, |rest| rest.is_end_stream())
    }
}

/// True when the body is known up front to be larger than `limit`.
fn exceeds_limit(response: &Response, limit: usize) -> bool {
    let limit = limit as u64;
    let declared = response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    declared.is_some_and(|len| len > limit) || response.body().size_hint().lower() > limit
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread::sleep;

    /// Counts calls reaching the wrapped store.
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryStore,
        gets: AtomicUsize,
        sets: AtomicUsize,
    }

    impl Store for CountingStore {
        fn get(&self, key: &str) -> Result<Vec<u8>> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            self.inner.get(key)
        }
        fn set(&self, key: &str, value: Vec<u8>) -> Result<()> {
            self.sets.fetch_add(1, Ordering::SeqCst);
            self.inner.set(key, value)
        }
        fn update(&self, key: &str, value: Vec<u8>) -> Result<()> {
            self.inner.update(key, value)
        }
        fn remove(&self, key: &str) -> Result<()> {
            self.inner.remove(key)
        }
        fn keys(&self) -> Result<Vec<String>> {
            self.inner.keys()
        }
    }

    /// Fails every operation like a broken disk.
    struct BrokenStore;

    impl Store for BrokenStore {
        fn get(&self, _key: &str) -> Result<Vec<u8>> {
            Err(CacheError::Backend("disk unavailable".into()))
        }
        fn set(&self, _key: &str, _value: Vec<u8>) -> Result<()> {
            Err(CacheError::Backend("disk unavailable".into()))
        }
        fn update(&self, _key: &str, _value: Vec<u8>) -> Result<()> {
            Err(CacheError::Backend("disk unavailable".into()))
        }
        fn remove(&self, _key: &str) -> Result<()> {
            Err(CacheError::Backend("disk unavailable".into()))
        }
        fn keys(&self) -> Result<Vec<String>> {
            Err(CacheError::Backend("disk unavailable".into()))
        }
    }

    fn get_request(uri: &str) -> Request {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    async fn ok_handler(_req: Request) -> Response {
        (StatusCode::OK, [("x-origin", "handler")], "fresh").into_response()
    }

    async fn unreachable_handler(_req: Request) -> Response {
        panic!("downstream must not run on a hit")
    }

    fn engine(store: Arc<dyn Store>, ttl: Duration) -> ResponseCache {
        ResponseCache::new(store, CacheOptions::default().with_ttl(ttl))
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let cache = engine(Arc::new(MemoryStore::new()), Duration::ZERO);

        let first = cache.serve(get_request("/a"), ok_handler).await;
        assert!(first.headers().get(CACHE_STATUS_HEADER).is_none());
        assert_eq!(body_bytes(first).await, b"fresh");

        let second = cache.serve(get_request("/a"), unreachable_handler).await;
        assert_eq!(second.status(), StatusCode::OK);
        assert_eq!(second.headers().get(CACHE_STATUS_HEADER).unwrap(), "HIT");
        assert_eq!(second.headers().get("x-origin").unwrap(), "handler");
        assert_eq!(body_bytes(second).await, b"fresh");

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_non_get_never_touches_store() {
        let store = Arc::new(CountingStore::default());
        let cache = engine(store.clone(), Duration::ZERO);

        for method in [Method::POST, Method::PUT, Method::DELETE, Method::PATCH] {
            let request = Request::builder()
                .method(method)
                .uri("/a")
                .body(Body::empty())
                .unwrap();
            let response = cache.serve(request, ok_handler).await;
            assert_eq!(response.status(), StatusCode::OK);
        }

        assert_eq!(store.gets.load(Ordering::SeqCst), 0);
        assert_eq!(store.sets.load(Ordering::SeqCst), 0);
        assert!(store.inner.is_empty());
        assert_eq!(cache.stats().bypassed, 4);
    }

    #[test]
    fn test_expired_entry_removed_on_lookup() {
        let store = Arc::new(MemoryStore::new());
        let cache = engine(store.clone(), Duration::ZERO);
        let key = cache
            .fingerprint(&Method::GET, &"/a".parse().unwrap(), &HeaderMap::new())
            .unwrap();

        let past = Utc::now() - chrono::Duration::seconds(1);
        let stale = CacheEntry::new(StatusCode::OK, &HeaderMap::new(), b"old".to_vec(), Some(past));
        assert!(cache.insert(&key, &stale).unwrap());

        assert!(cache.lookup(&key).unwrap().is_none());
        assert!(matches!(
            store.get(key.as_str()),
            Err(CacheError::NotFound(_))
        ));
        assert_eq!(cache.stats().expired, 1);
    }

    #[tokio::test]
    async fn test_never_expiring_entry_replayed() {
        let cache = engine(Arc::new(MemoryStore::new()), Duration::ZERO);
        let key = cache
            .fingerprint(&Method::GET, &"/a".parse().unwrap(), &HeaderMap::new())
            .unwrap();

        cache.serve(get_request("/a"), ok_handler).await;
        let entry = cache.lookup(&key).unwrap().unwrap();
        assert!(entry.expire_at.is_none());

        sleep(Duration::from_millis(50));
        assert!(cache.lookup(&key).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_undecodable_entry_dropped() {
        let store = Arc::new(MemoryStore::new());
        let cache = engine(store.clone(), Duration::ZERO);
        let key = cache
            .fingerprint(&Method::GET, &"/a".parse().unwrap(), &HeaderMap::new())
            .unwrap();
        store.set(key.as_str(), vec![0xde, 0xad]).unwrap();

        let response = cache.serve(get_request("/a"), ok_handler).await;
        assert_eq!(body_bytes(response).await, b"fresh");

        // The garbage was replaced by a fresh entry
        let entry = cache.lookup(&key).unwrap().unwrap();
        assert_eq!(entry.body, b"fresh");
        assert_eq!(cache.stats().errors, 1);
    }

    #[tokio::test]
    async fn test_backend_failure_fails_open() {
        let cache = engine(Arc::new(BrokenStore), Duration::ZERO);

        let response = cache.serve(get_request("/a"), ok_handler).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, b"fresh");
        assert_eq!(cache.stats().errors, 1);
        assert!(cache.evict_expired().is_err());
    }

    #[test]
    fn test_losing_writer_discarded() {
        let store = Arc::new(MemoryStore::new());
        let cache = engine(store.clone(), Duration::ZERO);
        let key = cache
            .fingerprint(&Method::GET, &"/a".parse().unwrap(), &HeaderMap::new())
            .unwrap();

        let winner = CacheEntry::new(StatusCode::OK, &HeaderMap::new(), b"one".to_vec(), None);
        let loser = CacheEntry::new(StatusCode::OK, &HeaderMap::new(), b"two".to_vec(), None);
        assert!(cache.insert(&key, &winner).unwrap());
        assert!(!cache.insert(&key, &loser).unwrap());

        assert_eq!(cache.lookup(&key).unwrap().unwrap().body, b"one");
    }

    #[tokio::test]
    async fn test_oversized_body_not_cached() {
        let store = Arc::new(MemoryStore::new());
        let cache = ResponseCache::new(
            store.clone(),
            CacheOptions::default().with_max_body_size(4),
        );

        let response = cache.serve(get_request("/big"), ok_handler).await;
        assert_eq!(body_bytes(response).await, b"fresh");
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_streamed_body_over_limit_passes_through() {
        let store = Arc::new(MemoryStore::new());
        let cache = ResponseCache::new(
            store.clone(),
            CacheOptions::default().with_max_body_size(4),
        );

        let streamed = |_req: Request| async {
            let chunks = futures::stream::iter([
                Ok::<_, std::io::Error>("hello "),
                Ok("world"),
            ]);
            (StatusCode::OK, Body::from_stream(chunks)).into_response()
        };

        let response = cache.serve(get_request("/stream"), streamed).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await, b"hello world");
        assert!(store.is_empty());
        assert_eq!(cache.stats().errors, 0);
    }

    #[tokio::test]
    async fn test_streamed_body_within_limit_cached() {
        let store = Arc::new(MemoryStore::new());
        let cache = engine(store.clone(), Duration::ZERO);

        let streamed = |_req: Request| async {
            let chunks = futures::stream::iter([Ok::<_, std::io::Error>("ab"), Ok("cd")]);
            (StatusCode::OK, Body::from_stream(chunks)).into_response()
        };

        let first = cache.serve(get_request("/stream"), streamed).await;
        assert_eq!(body_bytes(first).await, b"abcd");
        assert_eq!(store.len(), 1);

        let second = cache.serve(get_request("/stream"), unreachable_handler).await;
        assert_eq!(body_bytes(second).await, b"abcd");
    }

    #[tokio::test]
    async fn test_downstream_body_error_reaches_client() {
        let store = Arc::new(MemoryStore::new());
        let cache = engine(store.clone(), Duration::ZERO);

        let broken = |_req: Request| async {
            let chunks = futures::stream::iter([
                Ok("partial"),
                Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "reset")),
            ]);
            (StatusCode::OK, Body::from_stream(chunks)).into_response()
        };

        let response = cache.serve(get_request("/broken"), broken).await;
        assert_eq!(response.status(), StatusCode::OK);

        let mut body = response.into_body();
        let first = body.frame().await.unwrap().unwrap().into_data().unwrap();
        assert_eq!(&first[..], b"partial");
        assert!(body.frame().await.unwrap().is_err());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_ttl_past_codec_range_never_expires() {
        let store = Arc::new(MemoryStore::new());
        let three_centuries = Duration::from_secs(300 * 365 * 24 * 60 * 60);
        let cache = engine(store.clone(), three_centuries);

        assert!(cache.expiry_from(Utc::now()).is_none());

        cache.serve(get_request("/a"), ok_handler).await;
        assert_eq!(store.len(), 1);
        assert_eq!(cache.stats().errors, 0);

        let replayed = cache.serve(get_request("/a"), unreachable_handler).await;
        assert_eq!(replayed.headers().get(CACHE_STATUS_HEADER).unwrap(), "HIT");
    }

    #[test]
    fn test_expiry_from_ttl() {
        let now = Utc::now();
        let never = engine(Arc::new(MemoryStore::new()), Duration::ZERO);
        assert!(never.expiry_from(now).is_none());

        let ttl = engine(Arc::new(MemoryStore::new()), Duration::from_millis(1500));
        assert_eq!(
            ttl.expiry_from(now).unwrap(),
            now + chrono::Duration::milliseconds(1500)
        );
    }

    #[test]
    fn test_evict_expired() {
        let store = Arc::new(MemoryStore::new());
        let cache = engine(store.clone(), Duration::ZERO);
        let past = Utc::now() - chrono::Duration::seconds(1);
        let future = Utc::now() + chrono::Duration::seconds(60);

        let entry = |expire_at| {
            CacheEntry::new(StatusCode::OK, &HeaderMap::new(), vec![], expire_at)
                .encode()
                .unwrap()
        };
        store.set("gin:cache:expired", entry(Some(past))).unwrap();
        store.set("gin:cache:fresh", entry(Some(future))).unwrap();
        store.set("gin:cache:forever", entry(None)).unwrap();
        store.set("gin:cache:garbage", vec![7]).unwrap();
        store.set("other:expired", entry(Some(past))).unwrap();

        assert_eq!(cache.evict_expired().unwrap(), 2);

        let mut keys = store.keys().unwrap();
        keys.sort();
        assert_eq!(
            keys,
            vec!["gin:cache:forever", "gin:cache:fresh", "other:expired"]
        );
    }
}
