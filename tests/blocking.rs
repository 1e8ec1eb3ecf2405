mod support;

use linkreq::blocking::Client;
use linkreq::Body;

/// The blocking façade runs its own background runtime: building a client
/// and sending a request must work from a plain thread that never touches
/// Tokio itself.
#[test]
fn blocking_client_sends_a_request_from_a_plain_thread() {
    let server = support::server::http(|_req| async move {
        http::Response::builder().status(200).body(Body::from_bytes("blocking hello")).unwrap()
    });

    let handle = std::thread::spawn(move || {
        let client = Client::new();
        let url = format!("http://{}/", server.addr());
        let response = client.get(&url).send().expect("request succeeds");
        assert_eq!(response.status(), http::StatusCode::OK);
        response
    });

    let response = handle.join().expect("blocking thread does not panic");
    let body = response.text().expect("body collects synchronously");
    assert_eq!(body, "blocking hello");
}

/// A client-level timeout shorter than the server's delay surfaces as a
/// timeout error rather than hanging the caller forever.
#[test]
fn blocking_client_honors_its_default_timeout() {
    let server = support::server::http(|_req| async move {
        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        http::Response::builder().status(200).body(Body::from_bytes("too slow")).unwrap()
    });

    let handle = std::thread::spawn(move || {
        let client = Client::builder().timeout(std::time::Duration::from_millis(50)).build().unwrap();
        let url = format!("http://{}/", server.addr());
        client.get(&url).send()
    });

    let result = handle.join().expect("blocking thread does not panic");
    let error = result.expect_err("slow server trips the default timeout");
    assert!(error.is_timeout());
}
