//! Synchronous wrapper over [`crate::Response`]'s async body-reading
//! methods, grounded on `penumbra-x-rquest/src/blocking/client.rs`'s
//! `block_on`-via-`Handle` pattern: metadata accessors are plain
//! pass-throughs, while `chunk`/`bytes`/`text` block the calling thread on
//! the background runtime captured at [`super::ClientBuilder::build`] time.

use std::fmt;
use std::net::SocketAddr;
use std::time::SystemTime;

use bytes::Bytes;
use http::{HeaderMap, StatusCode, Version};
use url::Url;

use crate::connection::Handshake;
use crate::Result;

/// Blocking equivalent of [`crate::Response`].
pub struct Response {
    inner: crate::Response,
    handle: tokio::runtime::Handle,
}

impl Response {
    pub(crate) fn new(inner: crate::Response, handle: tokio::runtime::Handle) -> Self {
        Response { inner, handle }
    }

    pub fn url(&self) -> &Url {
        self.inner.url()
    }

    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    pub fn version(&self) -> Version {
        self.inner.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    pub fn handshake(&self) -> Option<&Handshake> {
        self.inner.handshake()
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.inner.remote_addr()
    }

    pub fn sent_at(&self) -> SystemTime {
        self.inner.sent_at()
    }

    pub fn received_at(&self) -> SystemTime {
        self.inner.received_at()
    }

    pub fn is_from_cache(&self) -> bool {
        self.inner.is_from_cache()
    }

    /// Reads one more chunk of the body, blocking until it arrives.
    pub fn chunk(&mut self) -> Result<Option<Bytes>> {
        let fut = self.inner.chunk();
        self.handle.block_on(fut)
    }

    /// Drains the body into one contiguous buffer, blocking until done.
    pub fn bytes(self) -> Result<Bytes> {
        let Response { inner, handle } = self;
        handle.block_on(inner.bytes())
    }

    /// Drains the body and decodes it as UTF-8 text (lossily), blocking
    /// until done.
    pub fn text(self) -> Result<String> {
        let Response { inner, handle } = self;
        handle.block_on(inner.text())
    }

    pub fn error_for_status(self) -> Result<Self> {
        let Response { inner, handle } = self;
        inner.error_for_status().map(|inner| Response { inner, handle })
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("blocking::Response").field("url", self.url()).field("status", &self.status()).finish()
    }
}
