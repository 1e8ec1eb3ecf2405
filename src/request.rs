//! The immutable request description (spec.md §3) and the ergonomic
//! builder on top of it.
//!
//! Grounded on `penumbra-x-rquest/src/client/request.rs`: a `Request` holds
//! method/url/headers/body, a `RequestBuilder` defers construction errors
//! until `.send()` the way the teacher's `crate::Result<Request>` field
//! does, so `client.get(bad_url).header(..).send()` reports the error at
//! the point the caller actually asked for it instead of panicking eagerly.

use std::time::Duration;

use http::{Extensions, HeaderMap, HeaderValue, Method};
use url::Url;

use crate::{
    body::Body,
    client::Client,
    error::Error,
    header_ext,
    into_url::IntoUrl,
    response::Response,
};

/// A request which can be executed with [`Client::execute`].
///
/// Immutable once built: the engine clones a `Request` whenever a follow-up
/// (redirect, retry, authentication challenge) needs a rewritten copy.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Body>,
    extensions: Extensions,
    timeout: Option<Duration>,
    version: http::Version,
}

impl Request {
    /// Constructs a new, bodyless request.
    pub fn new(method: Method, url: Url) -> Self {
        Request {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            extensions: Extensions::new(),
            timeout: None,
            version: http::Version::default(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn method_mut(&mut self) -> &mut Method {
        &mut self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn url_mut(&mut self) -> &mut Url {
        &mut self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    pub fn body_mut(&mut self) -> &mut Option<Body> {
        &mut self.body
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn timeout_mut(&mut self) -> &mut Option<Duration> {
        &mut self.timeout
    }

    pub fn version(&self) -> http::Version {
        self.version
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// RFC 7231 §4.2.1/4.3: methods with a well-defined request body.
    /// Bodies on other methods are allowed by this engine (servers vary),
    /// but `GET`/`HEAD` bodies are dropped by the redirect engine on a
    /// 301/302/303 hop regardless.
    pub(crate) fn permits_request_body(&self) -> bool {
        !matches!(self.method, Method::GET | Method::HEAD)
    }

    /// A best-effort clone for a follow-up request: fails only if the body
    /// is present and not replayable.
    pub(crate) fn try_clone_for_followup(&self) -> Option<Request> {
        let body = match &self.body {
            None => None,
            Some(b) => Some(b.try_clone()?),
        };
        Some(Request {
            method: self.method.clone(),
            url: self.url.clone(),
            headers: self.headers.clone(),
            body,
            extensions: Extensions::new(),
            timeout: self.timeout,
            version: self.version,
        })
    }
}

/// A builder to construct a [`Request`].
///
/// Constructed via [`Client::get`]/[`Client::post`]/etc; never directly.
#[must_use = "RequestBuilder does nothing until you call `.send()`"]
pub struct RequestBuilder {
    client: Client,
    request: crate::Result<Request>,
}

impl RequestBuilder {
    pub(crate) fn new(client: Client, request: crate::Result<Request>) -> Self {
        RequestBuilder { client, request }
    }

    pub fn header<K, V>(mut self, key: K, value: V) -> Self
    where
        http::HeaderName: TryFrom<K>,
        <http::HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        if let Ok(req) = &mut self.request {
            match (http::HeaderName::try_from(key), HeaderValue::try_from(value)) {
                (Ok(name), Ok(value)) => {
                    req.headers.append(name, value);
                }
                (Err(e), _) => self.request = Err(Error::builder(e.into())),
                (_, Err(e)) => self.request = Err(Error::builder(e.into())),
            }
        }
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        if let Ok(req) = &mut self.request {
            crate::util::extend_headers(&mut req.headers, headers);
        }
        self
    }

    pub fn basic_auth<U, P>(self, username: U, password: Option<P>) -> Self
    where
        U: std::fmt::Display,
        P: std::fmt::Display,
    {
        self.header(http::header::AUTHORIZATION, header_ext::basic_auth(username, password))
    }

    pub fn bearer_auth<T: std::fmt::Display>(self, token: T) -> Self {
        let value = format!("Bearer {token}");
        self.header(http::header::AUTHORIZATION, value)
    }

    pub fn body<B: Into<Body>>(mut self, body: B) -> Self {
        if let Ok(req) = &mut self.request {
            req.body = Some(body.into());
        }
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        if let Ok(req) = &mut self.request {
            req.timeout = Some(timeout);
        }
        self
    }

    pub fn version(mut self, version: http::Version) -> Self {
        if let Ok(req) = &mut self.request {
            req.version = version;
        }
        self
    }

    /// Returns a copy of the `Request` this builder currently holds, or the
    /// construction error if one occurred.
    pub fn build(self) -> crate::Result<Request> {
        self.request
    }

    /// Dispatches the request on this builder's client and awaits the
    /// response. At most once per call — use [`Client::execute`] directly
    /// with [`Request::try_clone_for_followup`] to resend.
    pub async fn send(self) -> crate::Result<Response> {
        let RequestBuilder { client, request } = self;
        client.execute(request?).await
    }
}

impl std::fmt::Debug for RequestBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut b = f.debug_struct("RequestBuilder");
        match &self.request {
            Ok(req) => b.field("method", req.method()).field("url", req.url()),
            Err(err) => b.field("error", err),
        };
        b.finish()
    }
}

pub(crate) fn builder_from_url<U: IntoUrl>(client: Client, method: Method, url: U) -> RequestBuilder {
    let request = url.into_url().map(|url| Request::new(method, url));
    RequestBuilder::new(client, request)
}
