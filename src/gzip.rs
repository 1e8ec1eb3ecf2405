//! The transparent gzip bridge (spec.md §4.11): when the engine itself
//! added `Accept-Encoding: gzip` (tracked by
//! [`crate::interceptor::bridge::BridgeInterceptor`]'s `transparent_gzip`
//! flag) and the response comes back `Content-Encoding: gzip`, strip that
//! header and `Content-Length` and wrap the body in a streaming gunzip, so
//! callers see decoded bytes without opting into anything. Grounded on
//! `agentgateway`'s `http/compression` module for the
//! `async-compression`/`tokio-util` stream↔`AsyncRead` bridge.

use bytes::Bytes;
use futures_util::TryStreamExt;
use http::header;
use tokio::io::BufReader;
use tokio_util::io::{ReaderStream, StreamReader};

use crate::error::BoxError;
use crate::response::{Response, ResponseBodyStream};

/// Rewrites `response` in place if it is gzip-encoded: removes
/// `Content-Encoding`/`Content-Length` and swaps the body stream for a
/// decoding one. A response without `Content-Encoding: gzip` is left
/// untouched.
pub(crate) fn maybe_decode(response: &mut Response) {
    let is_gzip = response
        .headers()
        .get(header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("gzip"))
        .unwrap_or(false);
    if !is_gzip {
        return;
    }

    let Some(body) = response.take_body() else {
        return;
    };

    response.headers_mut().remove(header::CONTENT_ENCODING);
    response.headers_mut().remove(header::CONTENT_LENGTH);
    response.set_body(decode_stream(body));
}

/// Adapts a `Stream<Item = Result<Bytes, BoxError>>` into an `AsyncRead`
/// via `StreamReader`, decodes it through `async_compression`'s
/// `GzipDecoder`, and adapts the result back into the same stream shape
/// via `ReaderStream`.
fn decode_stream(body: ResponseBodyStream) -> ResponseBodyStream {
    let io_stream = body.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
    let reader = BufReader::new(StreamReader::new(io_stream));
    let decoder = async_compression::tokio::bufread::GzipDecoder::new(reader);
    let decoded = ReaderStream::new(decoder).map_err(|e| Box::new(e) as BoxError);
    Box::pin(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderMap, StatusCode, Version};
    use std::time::SystemTime;
    use tokio::io::AsyncWriteExt;

    async fn gzip_bytes(plain: &[u8]) -> Bytes {
        let mut encoder = async_compression::tokio::write::GzipEncoder::new(Vec::new());
        encoder.write_all(plain).await.unwrap();
        encoder.shutdown().await.unwrap();
        Bytes::from(encoder.into_inner())
    }

    #[tokio::test]
    async fn decodes_a_gzip_encoded_body() {
        let body = gzip_bytes(b"hello world").await;
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_ENCODING, "gzip".parse().unwrap());
        headers.insert(header::CONTENT_LENGTH, body.len().to_string().parse().unwrap());

        let stream: ResponseBodyStream = Box::pin(futures_util::stream::once(async move { Ok::<Bytes, BoxError>(body) }));
        let mut response = Response::new(
            url::Url::parse("https://example.com").unwrap(),
            StatusCode::OK,
            Version::HTTP_11,
            headers,
            stream,
            SystemTime::now(),
            SystemTime::now(),
        );

        maybe_decode(&mut response);
        assert!(response.headers().get(header::CONTENT_ENCODING).is_none());
        assert!(response.headers().get(header::CONTENT_LENGTH).is_none());

        let decoded = response.bytes().await.unwrap();
        assert_eq!(&decoded[..], b"hello world");
    }

    #[tokio::test]
    async fn leaves_plain_bodies_untouched() {
        let stream: ResponseBodyStream =
            Box::pin(futures_util::stream::once(async move { Ok::<Bytes, BoxError>(Bytes::from_static(b"plain")) }));
        let mut response = Response::new(
            url::Url::parse("https://example.com").unwrap(),
            StatusCode::OK,
            Version::HTTP_11,
            HeaderMap::new(),
            stream,
            SystemTime::now(),
            SystemTime::now(),
        );
        maybe_decode(&mut response);
        let decoded = response.bytes().await.unwrap();
        assert_eq!(&decoded[..], b"plain");
    }
}
