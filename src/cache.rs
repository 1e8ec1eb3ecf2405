//! The cache engine (C9, spec.md §4.7/§6): freshness computation,
//! conditional-revalidation request rewriting, and 304 merging. Disk-cache
//! *bytes* storage is the external collaborator spec.md §1 names; this
//! module owns the policy (`CacheEngine`) and ships one in-process
//! reference [`CacheStore`] (`InMemoryCacheStore`), grounded on OkHttp's
//! `Cache`/`CacheStrategy` pair. [`crate::interceptor::cache::CacheInterceptor`]
//! is the pipeline stage that drives this engine; this module holds the
//! policy math and the storage trait so it's testable without a chain.

use std::{
    collections::HashMap,
    fmt,
    sync::Arc,
    time::{Duration, SystemTime},
};

use http::{HeaderMap, HeaderValue, Method, StatusCode, Version};
use parking_lot::Mutex;
use url::Url;

use crate::connection::Handshake;
use crate::request::Request;

/// Parsed `Cache-Control` directives relevant to freshness computation
/// (spec.md §4.7). Unknown directives are ignored, matching RFC 7234's
/// extensibility requirement.
#[derive(Debug, Clone, Default)]
pub struct CacheControl {
    pub no_store: bool,
    pub no_cache: bool,
    pub must_revalidate: bool,
    pub only_if_cached: bool,
    pub public: bool,
    pub private: bool,
    pub max_age: Option<Duration>,
    pub max_stale: Option<Duration>,
    pub min_fresh: Option<Duration>,
}

impl CacheControl {
    pub fn parse(headers: &HeaderMap) -> CacheControl {
        let mut cc = CacheControl::default();
        for value in headers.get_all(http::header::CACHE_CONTROL) {
            let Ok(s) = value.to_str() else { continue };
            for directive in s.split(',').map(|d| d.trim()) {
                let (name, arg) = match directive.split_once('=') {
                    Some((n, a)) => (n.trim(), Some(a.trim().trim_matches('"'))),
                    None => (directive, None),
                };
                match name.to_ascii_lowercase().as_str() {
                    "no-store" => cc.no_store = true,
                    "no-cache" => cc.no_cache = true,
                    "must-revalidate" => cc.must_revalidate = true,
                    "only-if-cached" => cc.only_if_cached = true,
                    "public" => cc.public = true,
                    "private" => cc.private = true,
                    "max-age" => cc.max_age = arg.and_then(|a| a.parse().ok()).map(Duration::from_secs),
                    "max-stale" => {
                        cc.max_stale = Some(arg.and_then(|a| a.parse().ok()).map(Duration::from_secs).unwrap_or(Duration::MAX))
                    }
                    "min-fresh" => cc.min_fresh = arg.and_then(|a| a.parse().ok()).map(Duration::from_secs),
                    _ => {}
                }
            }
        }
        cc
    }
}

/// A sibling-blobs cache entry (spec.md §6's cache layout): the metadata
/// needed to decide freshness and rebuild a [`crate::Response`], plus the
/// body bytes. Deliberately buffers the whole body rather than teeing a
/// stream into the store while also handing it to the caller — see
/// DESIGN.md's note on this simplification.
#[derive(Clone)]
pub struct CacheEntry {
    pub url: Url,
    pub request_method: Method,
    pub varying_request_headers: HeaderMap,
    pub status: StatusCode,
    pub version: Version,
    pub response_headers: HeaderMap,
    pub handshake: Option<Handshake>,
    pub sent_at: SystemTime,
    pub received_at: SystemTime,
    pub body: bytes::Bytes,
}

impl fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("url", &self.url)
            .field("status", &self.status)
            .field("body_len", &self.body.len())
            .finish()
    }
}

/// Byte storage for cache entries, keyed by a stable string derived from
/// the canonical request URL (spec.md §6). Disk-cache *bytes* are an
/// external collaborator (spec.md §1); this trait is the seam.
pub trait CacheStore: Send + Sync + fmt::Debug {
    fn get(&self, key: &str) -> Option<CacheEntry>;
    fn put(&self, key: String, entry: CacheEntry);
    fn remove(&self, key: &str);
    fn evict_all(&self);
}

/// The default, in-process reference store: a `parking_lot`-guarded map,
/// bounded by entry count rather than byte size (good enough for the
/// reference implementation; a size-bounded variant is a natural follow-up
/// if this ever needs to hold large bodies).
#[derive(Debug, Default)]
pub struct InMemoryCacheStore {
    entries: Mutex<HashMap<String, CacheEntry>>,
    max_entries: usize,
}

impl InMemoryCacheStore {
    pub fn new(max_entries: usize) -> Self {
        InMemoryCacheStore { entries: Mutex::new(HashMap::new()), max_entries }
    }
}

impl CacheStore for InMemoryCacheStore {
    fn get(&self, key: &str) -> Option<CacheEntry> {
        self.entries.lock().get(key).cloned()
    }

    fn put(&self, key: String, entry: CacheEntry) {
        let mut entries = self.entries.lock();
        if entries.len() >= self.max_entries && !entries.contains_key(&key) {
            // No real LRU bookkeeping for the in-memory store: evict an
            // arbitrary entry rather than grow unbounded. Embedders who
            // need LRU ordering implement `CacheStore` themselves.
            if let Some(victim) = entries.keys().next().cloned() {
                entries.remove(&victim);
            }
        }
        entries.insert(key, entry);
    }

    fn remove(&self, key: &str) {
        self.entries.lock().remove(key);
    }

    fn evict_all(&self) {
        self.entries.lock().clear();
    }
}

/// Computes a stable storage key for `url`: the canonical URL string.
/// `disk-cache`'s on-disk variant hashes this further into a filename; the
/// in-memory store uses it directly.
pub(crate) fn cache_key(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.into()
}

/// What the cache strategy decided to do for one request (spec.md §4.7's
/// `(network_request?, cached_response?)` pair, expressed as an enum since
/// Rust doesn't love "two optional, mutually-constrained fields").
pub(crate) enum Strategy {
    /// Serve `entry` without touching the network: it is fresh.
    Hit(CacheEntry),
    /// Issue `request` to the network. If `validate` is `Some`, a `304`
    /// response should be merged with it; if the network instead returns a
    /// full response, that response replaces the entry outright.
    Network { request: Request, validate: Option<CacheEntry> },
    /// The request said `only-if-cached` and nothing usable is stored.
    GatewayTimeout,
}

/// The cache engine (C9): computes freshness, rewrites requests into
/// conditional GETs, and persists cacheable responses. Holds no
/// request-scoped state; one instance is shared by every call through a
/// `Client` (`Arc`'d into `interceptor::CallContext`).
pub struct CacheEngine {
    store: Arc<dyn CacheStore>,
}

impl CacheEngine {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        CacheEngine { store }
    }

    /// A ready-to-use engine backed by [`InMemoryCacheStore`], bounded to
    /// `max_entries` entries.
    pub fn in_memory(max_entries: usize) -> Self {
        CacheEngine::new(Arc::new(InMemoryCacheStore::new(max_entries)))
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    /// Looks up a stored candidate for `request` and decides the strategy
    /// (spec.md §4.7). Only `GET` is consulted: other methods always go to
    /// the network (spec.md's "writable: only idempotent safe responses").
    pub(crate) fn strategy(&self, request: &Request) -> Strategy {
        if request.method() != Method::GET {
            return Strategy::Network { request: request.clone(), validate: None };
        }

        let request_cc = CacheControl::parse(request.headers());
        let key = cache_key(request.url());
        let candidate = self.store.get(&key).filter(|entry| vary_matches(entry, request.headers()));

        let Some(entry) = candidate else {
            if request_cc.only_if_cached {
                return Strategy::GatewayTimeout;
            }
            return Strategy::Network { request: request.clone(), validate: None };
        };

        if request_cc.no_store {
            // A `no-store` request never consults or updates the cache.
            return Strategy::Network { request: request.clone(), validate: None };
        }

        if is_fresh(&entry, &request_cc) {
            return Strategy::Hit(entry);
        }

        if request_cc.only_if_cached {
            return Strategy::GatewayTimeout;
        }

        match conditional_request(request, &entry) {
            Some(conditional) => Strategy::Network { request: conditional, validate: Some(entry) },
            None => Strategy::Network { request: request.clone(), validate: None },
        }
    }

    /// True if `response` may be written to the cache for `request`
    /// (spec.md §4.7's writable-status table and the authenticated-request
    /// exclusion).
    pub(crate) fn is_cacheable(&self, request: &Request, status: StatusCode, response_headers: &HeaderMap) -> bool {
        if request.method() != Method::GET {
            return false;
        }
        let response_cc = CacheControl::parse(response_headers);
        if response_cc.no_store {
            return false;
        }
        if request.headers().contains_key(http::header::AUTHORIZATION) && !response_cc.public {
            return false;
        }
        matches!(
            status,
            StatusCode::OK
                | StatusCode::NON_AUTHORITATIVE_INFORMATION
                | StatusCode::NO_CONTENT
                | StatusCode::MULTIPLE_CHOICES
                | StatusCode::MOVED_PERMANENTLY
                | StatusCode::PERMANENT_REDIRECT
                | StatusCode::NOT_FOUND
                | StatusCode::METHOD_NOT_ALLOWED
                | StatusCode::GONE
                | StatusCode::URI_TOO_LONG
                | StatusCode::NOT_IMPLEMENTED
        )
    }

    /// Writes a freshly fetched, cacheable response into the store,
    /// replacing any prior entry for this URL.
    pub(crate) fn put(&self, entry: CacheEntry) {
        self.store.put(cache_key(&entry.url), entry);
    }

    /// Merges a `304`'s headers onto `entry` (spec.md §4.7) and writes the
    /// result back, returning the merged headers for the response the
    /// caller sees.
    pub(crate) fn merge_and_store(&self, mut entry: CacheEntry, not_modified_headers: &HeaderMap) -> CacheEntry {
        entry.response_headers = crate::header_ext::merge_revalidation(&entry.response_headers, not_modified_headers);
        entry.received_at = SystemTime::now();
        self.put(entry.clone());
        entry
    }

    pub fn remove(&self, url: &Url) {
        self.store.remove(&cache_key(url));
    }

    pub fn evict_all(&self) {
        self.store.evict_all();
    }
}

impl fmt::Debug for CacheEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEngine").finish()
    }
}

/// The stored request's values for every field named by the stored
/// response's `Vary` header must match the new request's, or this is a
/// cache miss (spec.md §4.7).
fn vary_matches(entry: &CacheEntry, new_request_headers: &HeaderMap) -> bool {
    match entry.response_headers.get(http::header::VARY) {
        Some(vary) => crate::header_ext::vary_matches(vary, &entry.varying_request_headers, new_request_headers),
        None => true,
    }
}

/// RFC 7234 §4.2 freshness, simplified to the pieces spec.md names:
/// `max-age`/`Expires`/heuristic-via-`Last-Modified`, `min-fresh`,
/// `max-stale`, and the two `no-cache` forms (request or response).
/// Grounded on OkHttp's `CacheStrategy.Factory` age computation.
fn is_fresh(entry: &CacheEntry, request_cc: &CacheControl) -> bool {
    let response_cc = CacheControl::parse(&entry.response_headers);
    if response_cc.no_cache || request_cc.no_cache {
        return false;
    }

    let response_date = header_date(&entry.response_headers, http::header::DATE).unwrap_or(entry.received_at);
    let apparent_age = entry.received_at.duration_since(response_date).unwrap_or(Duration::ZERO);
    let resident_time = SystemTime::now().duration_since(entry.received_at).unwrap_or(Duration::ZERO);
    let current_age = apparent_age + resident_time;

    let mut freshness_lifetime = if let Some(max_age) = response_cc.max_age {
        max_age
    } else if let Some(expires) = header_date(&entry.response_headers, http::header::EXPIRES) {
        expires.duration_since(response_date).unwrap_or(Duration::ZERO)
    } else if let Some(last_modified) = header_date(&entry.response_headers, http::header::LAST_MODIFIED) {
        response_date.duration_since(last_modified).map(|d| d / 10).unwrap_or(Duration::ZERO)
    } else {
        Duration::ZERO
    };

    if !response_cc.must_revalidate {
        if let Some(max_stale) = request_cc.max_stale {
            freshness_lifetime = freshness_lifetime.saturating_add(max_stale);
        }
    }

    let min_fresh = request_cc.min_fresh.unwrap_or(Duration::ZERO);
    current_age + min_fresh < freshness_lifetime
}

fn header_date(headers: &HeaderMap, name: http::HeaderName) -> Option<SystemTime> {
    let value = headers.get(name)?;
    httpdate::parse_http_date(value.to_str().ok()?).ok()
}

/// Builds the conditional GET for a stale-but-validatable entry: `ETag` →
/// `If-None-Match`, `Last-Modified` → `If-Modified-Since` (spec.md §4.7).
/// Returns `None` if the entry has neither validator.
fn conditional_request(request: &Request, entry: &CacheEntry) -> Option<Request> {
    let etag = entry.response_headers.get(http::header::ETAG);
    let last_modified = entry.response_headers.get(http::header::LAST_MODIFIED);
    if etag.is_none() && last_modified.is_none() {
        return None;
    }
    let mut next = request.clone();
    if let Some(etag) = etag {
        next.headers_mut().insert(http::header::IF_NONE_MATCH, etag.clone());
    }
    if let Some(last_modified) = last_modified {
        next.headers_mut().insert(http::header::IF_MODIFIED_SINCE, last_modified.clone());
    }
    Some(next)
}

/// Captures which request headers this response's `Vary` (if any) names,
/// for storage alongside the entry (spec.md §6).
pub(crate) fn varying_headers(request_headers: &HeaderMap, response_headers: &HeaderMap) -> HeaderMap {
    let Some(vary) = response_headers.get(http::header::VARY) else {
        return HeaderMap::new();
    };
    let Ok(vary_str) = vary.to_str() else {
        return HeaderMap::new();
    };
    let mut captured = HeaderMap::new();
    for field in vary_str.split(',').map(|s| s.trim()) {
        let Ok(name) = http::HeaderName::from_bytes(field.as_bytes()) else { continue };
        for value in request_headers.get_all(&name) {
            captured.append(name.clone(), value.clone());
        }
    }
    captured
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_with_headers(headers: HeaderMap, body: &'static str) -> CacheEntry {
        CacheEntry {
            url: Url::parse("https://example.com/a").unwrap(),
            request_method: Method::GET,
            varying_request_headers: HeaderMap::new(),
            status: StatusCode::OK,
            version: Version::HTTP_11,
            response_headers: headers,
            handshake: None,
            sent_at: SystemTime::now(),
            received_at: SystemTime::now(),
            body: bytes::Bytes::from_static(body.as_bytes()),
        }
    }

    #[test]
    fn max_age_zero_is_immediately_stale() {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::CACHE_CONTROL, HeaderValue::from_static("max-age=0, must-revalidate"));
        headers.insert(http::header::ETAG, HeaderValue::from_static("v1"));
        let entry = entry_with_headers(headers, "A");
        assert!(!is_fresh(&entry, &CacheControl::default()));
    }

    #[test]
    fn max_age_large_is_fresh() {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::CACHE_CONTROL, HeaderValue::from_static("max-age=3600"));
        let entry = entry_with_headers(headers, "A");
        assert!(is_fresh(&entry, &CacheControl::default()));
    }

    #[test]
    fn conditional_request_uses_etag() {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::ETAG, HeaderValue::from_static("v1"));
        let entry = entry_with_headers(headers, "A");
        let request = Request::new(Method::GET, Url::parse("https://example.com/a").unwrap());
        let conditional = conditional_request(&request, &entry).unwrap();
        assert_eq!(conditional.headers().get(http::header::IF_NONE_MATCH).unwrap(), "v1");
    }

    #[test]
    fn no_validators_means_no_conditional_request() {
        let entry = entry_with_headers(HeaderMap::new(), "A");
        let request = Request::new(Method::GET, Url::parse("https://example.com/a").unwrap());
        assert!(conditional_request(&request, &entry).is_none());
    }

    #[test]
    fn cacheable_statuses_match_spec_table() {
        let engine = CacheEngine::in_memory(8);
        let request = Request::new(Method::GET, Url::parse("https://example.com/a").unwrap());
        assert!(engine.is_cacheable(&request, StatusCode::OK, &HeaderMap::new()));
        assert!(engine.is_cacheable(&request, StatusCode::NOT_FOUND, &HeaderMap::new()));
        assert!(!engine.is_cacheable(&request, StatusCode::INTERNAL_SERVER_ERROR, &HeaderMap::new()));
    }

    #[test]
    fn post_is_never_cacheable() {
        let engine = CacheEngine::in_memory(8);
        let request = Request::new(Method::POST, Url::parse("https://example.com/a").unwrap());
        assert!(!engine.is_cacheable(&request, StatusCode::OK, &HeaderMap::new()));
    }
}
