//! The response data model (spec.md §3).
//!
//! A `Response` is a lazy byte stream bound to exactly one exchange; its
//! body is closed exactly once (§8 universal invariant) and the trailers
//! promise resolves only after the body has been fully read. `prior_response`
//! chains through a redirect sequence, `network_response`/`cache_response`
//! record which half of a conditional-GET actually produced the bytes the
//! caller sees (§4.7 scenario 4).

use std::{net::SocketAddr, time::SystemTime};

use bytes::Bytes;
use futures_core::Stream;
use http::{HeaderMap, StatusCode, Version};
use url::Url;

use crate::{
    body::Trailers,
    connection::Handshake,
    error::{BoxError, Error},
};

pub(crate) type ResponseBodyStream = std::pin::Pin<Box<dyn Stream<Item = Result<Bytes, BoxError>> + Send>>;

/// A response to a completed (or in-flight-body) request.
///
/// Headers and status are available immediately once the exchange has read
/// the response headers; the body is read lazily via [`Response::bytes`],
/// [`Response::text`] or [`Response::chunk`].
pub struct Response {
    url: Url,
    status: StatusCode,
    version: Version,
    headers: HeaderMap,
    body: Option<ResponseBodyStream>,
    trailers: Trailers,
    handshake: Option<Handshake>,
    remote_addr: Option<SocketAddr>,
    sent_at: SystemTime,
    received_at: SystemTime,
    prior_response: Option<Box<Response>>,
    network_response: Option<Box<Response>>,
    cache_response: Option<Box<Response>>,
}

impl Response {
    pub(crate) fn new(
        url: Url,
        status: StatusCode,
        version: Version,
        headers: HeaderMap,
        body: ResponseBodyStream,
        sent_at: SystemTime,
        received_at: SystemTime,
    ) -> Self {
        Response {
            url,
            status,
            version,
            headers,
            body: Some(body),
            trailers: Trailers::default(),
            handshake: None,
            remote_addr: None,
            sent_at,
            received_at,
            prior_response: None,
            network_response: None,
            cache_response: None,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn handshake(&self) -> Option<&Handshake> {
        self.handshake.as_ref()
    }

    pub(crate) fn set_handshake(&mut self, handshake: Handshake) {
        self.handshake = Some(handshake);
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    pub(crate) fn set_remote_addr(&mut self, addr: SocketAddr) {
        self.remote_addr = Some(addr);
    }

    pub fn sent_at(&self) -> SystemTime {
        self.sent_at
    }

    pub fn received_at(&self) -> SystemTime {
        self.received_at
    }

    pub fn prior_response(&self) -> Option<&Response> {
        self.prior_response.as_deref()
    }

    pub(crate) fn set_prior_response(&mut self, prior: Response) {
        self.prior_response = Some(Box::new(prior));
    }

    pub fn network_response(&self) -> Option<&Response> {
        self.network_response.as_deref()
    }

    pub(crate) fn set_network_response(&mut self, network: Response) {
        self.network_response = Some(Box::new(network));
    }

    pub fn cache_response(&self) -> Option<&Response> {
        self.cache_response.as_deref()
    }

    pub(crate) fn set_cache_response(&mut self, cache: Response) {
        self.cache_response = Some(Box::new(cache));
    }

    /// True if any byte of this response's body came from the cache rather
    /// than the network (scenario 4: a 304 revalidation still counts).
    pub fn is_from_cache(&self) -> bool {
        self.cache_response.is_some()
    }

    /// Reads one more chunk of the body. Returns `Ok(None)` once the body
    /// (and, for chunked/HTTP-2 bodies, the trailers) has been fully
    /// consumed. The body stream is closed — its resources released — on
    /// the first `None` or `Err`.
    pub async fn chunk(&mut self) -> crate::Result<Option<Bytes>> {
        use futures_util::StreamExt;
        let Some(stream) = self.body.as_mut() else {
            return Ok(None);
        };
        match stream.next().await {
            Some(Ok(bytes)) => Ok(Some(bytes)),
            Some(Err(e)) => Err(Error::body(e)),
            None => {
                self.body = None;
                Ok(None)
            }
        }
    }

    /// Swaps in a new body stream wholesale, used by [`crate::gzip`] to
    /// replace a `Content-Encoding: gzip` body with a decoding wrapper
    /// around the original stream.
    pub(crate) fn set_body(&mut self, body: ResponseBodyStream) {
        self.body = Some(body);
    }

    /// Takes the body stream out, leaving the response bodyless. Used by
    /// [`crate::gzip`] to move the original (still-encoded) stream into a
    /// decoder without cloning it.
    pub(crate) fn take_body(&mut self) -> Option<ResponseBodyStream> {
        self.body.take()
    }

    /// Drains the body into one contiguous buffer.
    pub async fn bytes(mut self) -> crate::Result<Bytes> {
        let mut buf = Vec::new();
        while let Some(chunk) = self.chunk().await? {
            buf.extend_from_slice(&chunk);
        }
        Ok(Bytes::from(buf))
    }

    /// Drains the body and decodes it as UTF-8 text (replacing invalid
    /// sequences, matching `encoding_rs`'s lossy decode — the same
    /// fallback the teacher's response text() path uses).
    pub async fn text(self) -> crate::Result<String> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Trailers observed after the body has been fully read (chunked
    /// HTTP/1.1 or HTTP/2); `None` while the body is still open or if the
    /// exchange never produced trailers.
    pub fn trailers(&self) -> Option<&HeaderMap> {
        self.trailers.get()
    }

    pub(crate) fn set_trailers(&mut self, trailers: Trailers) {
        self.trailers = trailers;
    }

    /// Closes the body explicitly without reading it, releasing the
    /// underlying connection back to the pool (HTTP/1) or resetting the
    /// stream (HTTP/2) if it was not fully read.
    pub fn close(&mut self) {
        self.body = None;
    }

    /// Returns an error if the status is not a client/success code,
    /// consuming `self` the way `reqwest`'s `error_for_status` does.
    pub fn error_for_status(self) -> crate::Result<Self> {
        if self.status.is_client_error() || self.status.is_server_error() {
            let url = self.url.clone();
            Err(Error::new::<Error>(crate::error::Kind::Status(self.status), None).with_uri(
                url.as_str().parse().unwrap_or_else(|_| http::Uri::from_static("/")),
            ))
        } else {
            Ok(self)
        }
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("url", &self.url)
            .field("status", &self.status)
            .field("version", &self.version)
            .field("headers", &self.headers)
            .finish()
    }
}
