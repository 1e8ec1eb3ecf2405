mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use http::{header, StatusCode};
use linkreq::Body;

/// A fresh response is served twice without a second network hit, then a
/// request past `max-age` revalidates and merges the `304` (spec.md §8
/// scenario 4, "conditional cache hit").
#[tokio::test]
async fn revalidates_with_etag_after_max_age_elapses() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counted = hits.clone();

    let server = support::server::http(move |req| {
        let hits = counted.clone();
        async move {
            let n = hits.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                http::Response::builder()
                    .status(StatusCode::OK)
                    .header(header::ETAG, "\"v1\"")
                    .header(header::CACHE_CONTROL, "max-age=0, must-revalidate")
                    .body(Body::from_bytes("hello"))
                    .unwrap()
            } else {
                assert_eq!(
                    req.headers().get(header::IF_NONE_MATCH).map(|v| v.to_str().unwrap()),
                    Some("\"v1\"")
                );
                http::Response::builder()
                    .status(StatusCode::NOT_MODIFIED)
                    .body(Body::empty())
                    .unwrap()
            }
        }
    });

    let client = linkreq::Client::builder().cache_in_memory(32).build().unwrap();
    let url = format!("http://{}/a", server.addr());

    let first = client.get(&url).send().await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    assert!(!first.is_from_cache());
    assert_eq!(first.bytes().await.unwrap(), "hello");

    let second = client.get(&url).send().await.unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    assert!(second.is_from_cache());
    assert!(second.network_response().is_some());
    assert!(second.cache_response().is_some());
    assert_eq!(second.network_response().unwrap().status(), StatusCode::NOT_MODIFIED);
    assert_eq!(second.bytes().await.unwrap(), "hello");

    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

/// A `no-store` response is never served from the cache on a second request.
#[tokio::test]
async fn no_store_response_is_never_cached() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counted = hits.clone();

    let server = support::server::http(move |_req| {
        let hits = counted.clone();
        async move {
            hits.fetch_add(1, Ordering::SeqCst);
            http::Response::builder()
                .status(StatusCode::OK)
                .header(header::CACHE_CONTROL, "no-store")
                .body(Body::from_bytes("fresh"))
                .unwrap()
        }
    });

    let client = linkreq::Client::builder().cache_in_memory(32).build().unwrap();
    let url = format!("http://{}/a", server.addr());

    let first = client.get(&url).send().await.unwrap();
    assert!(!first.is_from_cache());
    let second = client.get(&url).send().await.unwrap();
    assert!(!second.is_from_cache());

    assert_eq!(hits.load(Ordering::SeqCst), 2);
}
