//! Bridges the caller-facing [`crate::Request`] to network form: adds
//! `Host`, a default `User-Agent`, `Accept-Encoding: gzip` (when the
//! `gzip` feature is active and the caller didn't set their own), and
//! attaches cookies from the jar; on the way back it strips
//! `Content-Encoding`/`Content-Length` once the gzip bridge has
//! transparently decoded the body and merges `Set-Cookie` headers into
//! the jar. Grounded on OkHttp's `BridgeInterceptor`.

use http::header::{self, HeaderValue};

use super::{BoxFuture, Chain, Interceptor};
use crate::Result;

pub(crate) struct BridgeInterceptor {
    pub(crate) user_agent: HeaderValue,
}

impl Interceptor for BridgeInterceptor {
    fn intercept<'a>(&'a self, mut chain: Chain<'a>) -> BoxFuture<'a, Result<crate::Response>> {
        Box::pin(async move {
            let ctx = chain.context();

            #[cfg_attr(not(feature = "gzip"), allow(unused_mut))]
            let mut transparent_gzip = false;

            {
                let request = chain.request_mut();

                if request.headers().get(header::HOST).is_none() {
                    if let Some(host) = request.url().host_str() {
                        let value = match request.url().port() {
                            Some(port) => format!("{host}:{port}"),
                            None => host.to_string(),
                        };
                        if let Ok(value) = HeaderValue::from_str(&value) {
                            request.headers_mut().insert(header::HOST, value);
                        }
                    }
                }

                if request.headers().get(header::USER_AGENT).is_none() {
                    request.headers_mut().insert(header::USER_AGENT, self.user_agent.clone());
                }

                #[cfg(feature = "gzip")]
                {
                    if request.headers().get(header::ACCEPT_ENCODING).is_none() && request.headers().get(header::RANGE).is_none() {
                        request.headers_mut().insert(header::ACCEPT_ENCODING, HeaderValue::from_static("gzip"));
                        transparent_gzip = true;
                    }
                }

                #[cfg(feature = "cookies")]
                {
                    if let Some(jar) = ctx.cookie_jar.as_ref() {
                        if let Some(cookie_header) = jar.cookie_header(request.url()) {
                            request.headers_mut().insert(header::COOKIE, cookie_header);
                        }
                    }
                }
            }

            #[cfg_attr(not(feature = "cookies"), allow(unused_variables))]
            let ctx = ctx;

            let mut response = chain.forward().await?;

            #[cfg(feature = "cookies")]
            {
                if let Some(jar) = ctx.cookie_jar.as_ref() {
                    jar.store_from_response(response.url(), response.headers());
                }
            }

            #[cfg(feature = "gzip")]
            {
                if transparent_gzip {
                    crate::gzip::maybe_decode(&mut response);
                }
            }

            Ok(response)
        })
    }
}
