//! Header helpers layered on top of `http::HeaderMap`.
//!
//! `http::HeaderMap` already gives us spec.md §3's required shape — an
//! ordered, duplicate-preserving, ASCII-case-insensitive multimap — so this
//! module only adds the handful of cross-cutting operations the engine
//! needs: basic-auth encoding (grounded on teacher's `util::basic_auth`),
//! hop-by-hop stripping for the 304-merge path (§4.7), and `Vary` matching.

use http::{HeaderMap, HeaderName, HeaderValue};

/// Builds a `Basic` `Authorization` header value, matching RFC 7617.
///
/// Grounded on `penumbra-x-rquest/src/util.rs::basic_auth`.
pub fn basic_auth<U, P>(username: U, password: Option<P>) -> HeaderValue
where
    U: std::fmt::Display,
    P: std::fmt::Display,
{
    use base64::{prelude::BASE64_STANDARD, write::EncoderWriter};
    use std::io::Write;

    let mut buf = b"Basic ".to_vec();
    {
        let mut encoder = EncoderWriter::new(&mut buf, &BASE64_STANDARD);
        let _ = write!(encoder, "{username}:");
        if let Some(password) = password {
            let _ = write!(encoder, "{password}");
        }
    }
    let mut header = HeaderValue::from_bytes(&buf).expect("base64 output is always a valid HeaderValue");
    header.set_sensitive(true);
    header
}

/// Headers that must never be copied verbatim across a hop: they describe
/// this specific connection, not the resource. Used when merging a 304 into
/// a cache entry (§4.7) and when building a cross-origin redirect request.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// True if `name` is a hop-by-hop header that should never be persisted into
/// a cache entry or copied across a redirect to a different origin.
pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.iter().any(|h| name.as_str().eq_ignore_ascii_case(h))
}

/// Response headers whose value from a 304 always overwrites the stored
/// value, per §4.7's merge rule.
const REVALIDATION_OVERWRITE: &[&str] = &[
    "etag",
    "cache-control",
    "date",
    "expires",
    "last-modified",
    "vary",
    "content-location",
];

pub fn overwritten_on_revalidation(name: &HeaderName) -> bool {
    REVALIDATION_OVERWRITE
        .iter()
        .any(|h| name.as_str().eq_ignore_ascii_case(h))
}

/// Merges a 304's headers onto a stored entry's headers per §4.7: start from
/// `stored`, then overwrite the fields named by [`overwritten_on_revalidation`]
/// with whatever the 304 carried (if any).
pub fn merge_revalidation(stored: &HeaderMap, not_modified: &HeaderMap) -> HeaderMap {
    let mut merged = stored.clone();
    for name in REVALIDATION_OVERWRITE {
        let name: HeaderName = name.parse().expect("static header name");
        merged.remove(&name);
        for value in not_modified.get_all(&name) {
            merged.append(name.clone(), value.clone());
        }
    }
    merged
}

/// Returns true iff, for every header field named in `vary`, the value(s) in
/// `stored_request` equal the value(s) in `new_request` — the §4.7 `Vary`
/// cache-selection rule. A `Vary: *` always misses.
pub fn vary_matches(vary: &HeaderValue, stored_request: &HeaderMap, new_request: &HeaderMap) -> bool {
    let Ok(vary_str) = vary.to_str() else {
        return false;
    };
    for field in vary_str.split(',').map(|s| s.trim()) {
        if field == "*" {
            return false;
        }
        let Ok(name) = HeaderName::from_bytes(field.as_bytes()) else {
            continue;
        };
        let stored: Vec<&[u8]> = stored_request.get_all(&name).iter().map(|v| v.as_bytes()).collect();
        let fresh: Vec<&[u8]> = new_request.get_all(&name).iter().map(|v| v.as_bytes()).collect();
        if stored != fresh {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_auth_encodes_user_and_pass() {
        let value = basic_auth("Aladdin", Some("open sesame"));
        assert_eq!(value, HeaderValue::from_static("Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ=="));
        assert!(value.is_sensitive());
    }

    #[test]
    fn vary_matches_identical_headers() {
        let mut stored = HeaderMap::new();
        stored.insert("accept-encoding", HeaderValue::from_static("gzip"));
        let mut fresh = HeaderMap::new();
        fresh.insert("accept-encoding", HeaderValue::from_static("gzip"));
        let vary = HeaderValue::from_static("Accept-Encoding");
        assert!(vary_matches(&vary, &stored, &fresh));
    }

    #[test]
    fn vary_mismatch_on_changed_header() {
        let mut stored = HeaderMap::new();
        stored.insert("accept-encoding", HeaderValue::from_static("gzip"));
        let mut fresh = HeaderMap::new();
        fresh.insert("accept-encoding", HeaderValue::from_static("br"));
        let vary = HeaderValue::from_static("Accept-Encoding");
        assert!(!vary_matches(&vary, &stored, &fresh));
    }

    #[test]
    fn vary_star_never_matches() {
        let stored = HeaderMap::new();
        let fresh = HeaderMap::new();
        let vary = HeaderValue::from_static("*");
        assert!(!vary_matches(&vary, &stored, &fresh));
    }
}
