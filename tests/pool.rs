mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use linkreq::Body;

/// Three sequential requests to the same origin reuse one pooled connection
/// (spec.md §8 scenario 2): the server observes a strictly increasing
/// per-connection sequence number, and the pool never holds more than one
/// idle connection for this single-origin client.
#[tokio::test]
async fn sequential_requests_reuse_one_connection() {
    let connections = Arc::new(AtomicUsize::new(0));
    let counter = connections.clone();

    let server = support::server::http(move |_req| {
        let connections = counter.clone();
        async move {
            let seq = connections.fetch_add(1, Ordering::SeqCst);
            http::Response::builder().status(200).body(Body::from_bytes(seq.to_string())).unwrap()
        }
    });

    let client = linkreq::Client::builder().pool_max_idle_per_host(1).build().unwrap();
    let url = format!("http://{}/", server.addr());

    for expected in 0..3u32 {
        let response = client.get(&url).send().await.unwrap();
        assert_eq!(response.status(), http::StatusCode::OK);
        let body = response.bytes().await.unwrap();
        assert_eq!(body, expected.to_string());
    }

    assert_eq!(client.connection_pool().idle_count(), 1);
}

/// Two different origins each get their own pooled connection.
#[tokio::test]
async fn distinct_origins_do_not_share_a_connection() {
    let server_a = support::server::http(|_req| async move { http::Response::builder().status(200).body(Body::from_bytes("a")).unwrap() });
    let server_b = support::server::http(|_req| async move { http::Response::builder().status(200).body(Body::from_bytes("b")).unwrap() });

    let client = linkreq::Client::builder().pool_max_idle_per_host(1).build().unwrap();

    let url_a = format!("http://{}/", server_a.addr());
    let url_b = format!("http://{}/", server_b.addr());

    client.get(&url_a).send().await.unwrap();
    client.get(&url_b).send().await.unwrap();

    assert_eq!(client.connection_pool().idle_count(), 2);
}
