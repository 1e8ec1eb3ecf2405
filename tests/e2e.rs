mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use http::{header, StatusCode};
use linkreq::{Authenticator, Body, Request};

/// The simplest possible call: one request, one response, no follow-ups
/// (spec.md §8 scenario 1).
#[tokio::test]
async fn simple_get_returns_status_headers_and_body() {
    let server = support::server::http(|req| async move {
        assert_eq!(req.method(), http::Method::GET);
        http::Response::builder()
            .status(StatusCode::OK)
            .header("x-served-by", "linkreq-test")
            .body(Body::from_bytes("hello, world"))
            .unwrap()
    });

    let client = linkreq::Client::new();
    let url = format!("http://{}/greeting", server.addr());
    let response = client.get(&url).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("x-served-by").unwrap(), "linkreq-test");
    assert_eq!(response.bytes().await.unwrap(), "hello, world");
}

/// An `Authenticator` retries exactly once on a `401`, adding
/// `Authorization`; the retried request succeeds (spec.md §8 scenario 3).
#[tokio::test]
async fn unauthorized_response_triggers_one_authenticated_retry() {
    struct StaticBearer;

    impl Authenticator for StaticBearer {
        fn authenticate<'a>(
            &'a self,
            response: &'a linkreq::Response,
        ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Option<Request>> + Send + 'a>> {
            Box::pin(async move {
                let mut request = Request::new(http::Method::GET, response.url().clone());
                request.headers_mut().insert(header::AUTHORIZATION, "Bearer secret-token".parse().unwrap());
                Some(request)
            })
        }
    }

    let attempts = Arc::new(AtomicUsize::new(0));
    let counted = attempts.clone();

    let server = support::server::http(move |req| {
        let attempts = counted.clone();
        async move {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                assert!(req.headers().get(header::AUTHORIZATION).is_none());
                http::Response::builder()
                    .status(StatusCode::UNAUTHORIZED)
                    .header(header::WWW_AUTHENTICATE, "Bearer")
                    .body(Body::empty())
                    .unwrap()
            } else {
                assert_eq!(
                    req.headers().get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()),
                    Some("Bearer secret-token")
                );
                http::Response::builder().status(StatusCode::OK).body(Body::from_bytes("welcome")).unwrap()
            }
        }
    });

    let client = linkreq::Client::builder().authenticator(StaticBearer).build().unwrap();
    let url = format!("http://{}/secret", server.addr());
    let response = client.get(&url).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.bytes().await.unwrap(), "welcome");
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

/// A second `401` after the retry is surfaced as-is: the engine challenges
/// at most once per call.
#[tokio::test]
async fn a_second_unauthorized_is_not_retried_again() {
    struct AlwaysRetry;

    impl Authenticator for AlwaysRetry {
        fn authenticate<'a>(
            &'a self,
            response: &'a linkreq::Response,
        ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Option<Request>> + Send + 'a>> {
            Box::pin(async move { Some(Request::new(http::Method::GET, response.url().clone())) })
        }
    }

    let attempts = Arc::new(AtomicUsize::new(0));
    let counted = attempts.clone();

    let server = support::server::http(move |_req| {
        let attempts = counted.clone();
        async move {
            attempts.fetch_add(1, Ordering::SeqCst);
            http::Response::builder().status(StatusCode::UNAUTHORIZED).body(Body::empty()).unwrap()
        }
    });

    let client = linkreq::Client::builder().authenticator(AlwaysRetry).build().unwrap();
    let url = format!("http://{}/secret", server.addr());
    let response = client.get(&url).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}
