#![deny(missing_debug_implementations)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! # linkreq
//!
//! The request execution engine underneath an HTTP client: given an
//! immutable [`Request`] and a configured [`Client`], `linkreq` produces a
//! [`Response`] while transparently handling connection establishment, TLS
//! version fallback, HTTP/1.1 and HTTP/2 framing, connection pooling and
//! reuse, redirects, authentication challenges, cache validation, body
//! encoding/decoding, cancellation and error recovery.
//!
//! ```rust,no_run
//! # async fn run() -> Result<(), linkreq::Error> {
//! let client = linkreq::Client::builder().build()?;
//! let response = client.get("https://example.com").send().await?;
//! println!("{}", response.status());
//! # Ok(())
//! # }
//! ```
//!
//! URL parsing, cookie storage, disk-cache bytes, certificate pinning and
//! the TLS handshake primitive itself are consumed as pure interfaces; this
//! crate owns everything that coordinates them into one call either
//! completing with a delivered response, or failing once.

pub use http::{Method, StatusCode, Version, header};
pub use url::Url;

#[macro_use]
mod macros;

mod error;
pub use error::{Error, Kind, Result};

mod into_url;
pub use into_url::IntoUrl;

pub mod header_ext;

mod body;
pub use body::Body;

mod request;
pub use request::{Request, RequestBuilder};

mod response;
pub use response::Response;

mod address;
pub use address::Address;

mod auth;
pub use auth::{Authenticator, NoneAuthenticator};

pub mod proxy;
pub use proxy::Proxy;

pub mod dns;

mod route;
pub use route::{Route, RouteDatabase};

mod connection;
pub use connection::{Connection, Handshake};

mod net;

mod pool;
pub use pool::ConnectionPool;

mod proto;

mod exchange;

pub mod tls;

pub mod interceptor;

pub mod cache;
pub use cache::{CacheControl, CacheEngine};

mod dispatch;
pub use dispatch::{AsyncCall, Call};

pub mod event;
pub use event::{EventListener, NoopEventListener};

#[cfg(feature = "cookies")]
pub mod cookie;

#[cfg(feature = "gzip")]
mod gzip;

pub mod redirect;
pub mod retry;

mod client;
pub use client::{Client, ClientBuilder, Http1Config, Http2Config};

#[cfg(feature = "blocking")]
pub mod blocking;

mod util;

fn _assert_impls() {
    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}
    fn assert_clone<T: Clone>() {}

    assert_send::<Client>();
    assert_sync::<Client>();
    assert_clone::<Client>();

    assert_send::<Request>();
    assert_send::<RequestBuilder>();
    assert_send::<Response>();

    assert_send::<Error>();
    assert_sync::<Error>();
}
