mod support;

use http::header;
use linkreq::Body;
use tokio::io::AsyncWriteExt;

async fn gzip_bytes(plain: &[u8]) -> Vec<u8> {
    let mut encoder = async_compression::tokio::write::GzipEncoder::new(Vec::new());
    encoder.write_all(plain).await.unwrap();
    encoder.shutdown().await.unwrap();
    encoder.into_inner()
}

/// The engine adds `Accept-Encoding: gzip` itself, so a gzip-encoded
/// response is transparently decoded and the caller never sees
/// `Content-Encoding` (spec.md §4.11).
#[tokio::test]
async fn transparently_decodes_a_gzip_response() {
    let encoded = gzip_bytes(b"hello, decompressed world").await;

    let server = support::server::http(move |req| {
        let encoded = encoded.clone();
        async move {
            assert!(req
                .headers()
                .get(header::ACCEPT_ENCODING)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .contains("gzip"));

            http::Response::builder()
                .status(200)
                .header(header::CONTENT_ENCODING, "gzip")
                .body(Body::from_bytes(encoded))
                .unwrap()
        }
    });

    let client = linkreq::Client::new();
    let url = format!("http://{}/", server.addr());
    let response = client.get(&url).send().await.unwrap();

    assert!(response.headers().get(header::CONTENT_ENCODING).is_none());
    let body = response.bytes().await.unwrap();
    assert_eq!(body, "hello, decompressed world");
}

/// A caller-supplied `Accept-Encoding` disables the transparent bridge: the
/// response is handed back exactly as the server sent it.
#[tokio::test]
async fn explicit_accept_encoding_disables_the_bridge() {
    let encoded = gzip_bytes(b"left alone").await;

    let server = support::server::http(move |_req| {
        let encoded = encoded.clone();
        async move {
            http::Response::builder()
                .status(200)
                .header(header::CONTENT_ENCODING, "gzip")
                .body(Body::from_bytes(encoded))
                .unwrap()
        }
    });

    let client = linkreq::Client::new();
    let url = format!("http://{}/", server.addr());
    let response = client.get(&url).header(header::ACCEPT_ENCODING, "identity").send().await.unwrap();

    assert_eq!(
        response.headers().get(header::CONTENT_ENCODING).and_then(|v| v.to_str().ok()),
        Some("gzip")
    );
}
