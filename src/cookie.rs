//! Cookie storage (spec.md §1: "cookie storage... remain pluggable
//! traits"). Grounded on `penumbra-x-rquest/src/cookie.rs`'s `Jar`/`CookieStore`
//! pair, renamed to the [`CookieJar`] shape [`crate::interceptor::bridge::BridgeInterceptor`]
//! drives (`cookie_header`/`store_from_response` rather than
//! `cookies`/`set_cookies`, since this crate attaches cookies as one
//! combined `Cookie` header value rather than handing the interceptor a
//! `Vec<HeaderValue>` to append itself).

use bytes::BufMut;
use http::{HeaderMap, HeaderValue};
use parking_lot::RwLock;
use url::Url;

/// A place to persist cookies across calls made through the same
/// [`crate::Client`]. [`Jar`] is the default, in-memory implementation;
/// embedders needing disk persistence implement this trait themselves
/// against whatever storage they like.
pub trait CookieJar: Send + Sync + std::fmt::Debug {
    /// Builds the `Cookie` header value to send with a request to `url`,
    /// or `None` if the jar has nothing for it.
    fn cookie_header(&self, url: &Url) -> Option<HeaderValue>;

    /// Stores every `Set-Cookie` header from a response received from
    /// `url`.
    fn store_from_response(&self, url: &Url, headers: &HeaderMap);
}

/// The default [`CookieJar`]: an in-memory store backed by the
/// `cookie_store` crate, guarded by a `parking_lot::RwLock` (the teacher
/// uses `antidote::RwLock` for poison-safety; we don't carry that
/// dependency elsewhere in the crate, and `parking_lot` — already pulled
/// in for the connection pool — gives the same non-poisoning lock).
#[derive(Debug)]
pub struct Jar(RwLock<cookie_store::CookieStore>);

impl Default for Jar {
    fn default() -> Self {
        Jar(RwLock::new(cookie_store::CookieStore::default()))
    }
}

impl Jar {
    pub fn new() -> Self {
        Jar::default()
    }

    /// Adds one `Set-Cookie`-formatted string directly to the jar, for
    /// seeding a [`Client`](crate::Client) with cookies before the first
    /// request.
    pub fn add_cookie_str(&self, cookie: &str, url: &Url) {
        let cookies = cookie_crate::Cookie::parse(cookie).ok().map(|c| c.into_owned()).into_iter();
        self.0.write().store_response_cookies(cookies, url);
    }

    pub fn remove(&self, name: &str, url: &Url) {
        if let Some(domain) = url.host_str() {
            self.0.write().remove(domain, url.path(), name);
        }
    }

    pub fn clear(&self) {
        self.0.write().clear();
    }
}

impl CookieJar for Jar {
    fn cookie_header(&self, url: &Url) -> Option<HeaderValue> {
        let store = self.0.read();
        let mut buf = bytes::BytesMut::new();
        for (name, value) in store.get_request_values(url) {
            if !buf.is_empty() {
                buf.put_slice(b"; ");
            }
            buf.put_slice(name.as_bytes());
            buf.put_slice(b"=");
            buf.put_slice(value.as_bytes());
        }
        if buf.is_empty() {
            return None;
        }
        HeaderValue::from_maybe_shared(buf.freeze()).ok()
    }

    fn store_from_response(&self, url: &Url, headers: &HeaderMap) {
        let cookies = headers
            .get_all(http::header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|s| cookie_crate::Cookie::parse(s).ok())
            .map(|c| c.into_owned());
        self.0.write().store_response_cookies(cookies, url);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stores_and_replays_a_cookie() {
        let jar = Jar::default();
        let url = Url::parse("https://example.com/").unwrap();
        jar.add_cookie_str("foo=bar", &url);
        let header = jar.cookie_header(&url).unwrap();
        assert_eq!(header.to_str().unwrap(), "foo=bar");
    }

    #[test]
    fn no_cookies_means_no_header() {
        let jar = Jar::default();
        let url = Url::parse("https://example.com/").unwrap();
        assert!(jar.cookie_header(&url).is_none());
    }

    #[test]
    fn store_from_response_reads_set_cookie() {
        let jar = Jar::default();
        let url = Url::parse("https://example.com/").unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(http::header::SET_COOKIE, HeaderValue::from_static("a=1"));
        headers.append(http::header::SET_COOKIE, HeaderValue::from_static("b=2"));
        jar.store_from_response(&url, &headers);
        let header = jar.cookie_header(&url).unwrap();
        let value = header.to_str().unwrap();
        assert!(value.contains("a=1"));
        assert!(value.contains("b=2"));
    }

    #[test]
    fn remove_drops_a_single_cookie() {
        let jar = Jar::default();
        let url = Url::parse("https://example.com/").unwrap();
        jar.add_cookie_str("foo=bar", &url);
        jar.remove("foo", &url);
        assert!(jar.cookie_header(&url).is_none());
    }
}
