//! The cache interceptor: the pipeline stage (spec.md §4.6, positioned
//! after the bridge and before the connect interceptor) that consults
//! [`crate::cache::CacheEngine`] before dialing a connection, and writes
//! cacheable responses back after the network answers. Grounded on
//! OkHttp's `CacheInterceptor`.

use std::time::SystemTime;

use bytes::Bytes;
use http::{HeaderMap, StatusCode, Version};

use super::{BoxFuture, Chain, Interceptor};
use crate::cache::{CacheEngine, CacheEntry, Strategy};
use crate::request::Request;
use crate::response::{Response, ResponseBodyStream};
use crate::Result;

pub(crate) struct CacheInterceptor;

impl Interceptor for CacheInterceptor {
    fn intercept<'a>(&'a self, chain: Chain<'a>) -> BoxFuture<'a, Result<Response>> {
        Box::pin(async move {
            let Some(cache) = chain.context().cache.clone() else {
                return chain.forward().await;
            };

            let request = chain.request().clone();
            match cache.strategy(&request) {
                Strategy::GatewayTimeout => Ok(gateway_timeout_response(request.url().clone())),
                Strategy::Hit(entry) => Ok(response_from_entry(&entry)),
                Strategy::Network { request: net_request, validate } => {
                    let network_response = chain.proceed(net_request).await?;
                    handle_network_response(&cache, &request, network_response, validate).await
                }
            }
        })
    }
}

async fn handle_network_response(
    cache: &CacheEngine,
    request: &Request,
    network_response: Response,
    validate: Option<CacheEntry>,
) -> Result<Response> {
    if network_response.status() == StatusCode::NOT_MODIFIED {
        let Some(entry) = validate else {
            // Nothing to merge against (evicted between the strategy
            // decision and the round trip): hand back the bare 304.
            return Ok(network_response);
        };
        let not_modified_headers = network_response.headers().clone();
        let merged_entry = cache.merge_and_store(entry, &not_modified_headers);
        let mut response = response_from_entry(&merged_entry);
        response.set_network_response(bodyless_clone(&network_response));
        response.set_cache_response(response_from_entry(&merged_entry));
        return Ok(response);
    }

    if let Some(entry) = &validate {
        // The network answered the conditional GET with a full response
        // rather than 304: the old entry no longer applies.
        cache.remove(&entry.url);
    }

    let status = network_response.status();
    let headers = network_response.headers().clone();
    if !cache.is_cacheable(request, status, &headers) {
        return Ok(network_response);
    }

    let version = network_response.version();
    let handshake = network_response.handshake().cloned();
    let sent_at = network_response.sent_at();
    let received_at = network_response.received_at();
    let url = network_response.url().clone();
    let body = network_response.bytes().await?;

    let entry = CacheEntry {
        url: url.clone(),
        request_method: request.method().clone(),
        varying_request_headers: crate::cache::varying_headers(request.headers(), &headers),
        status,
        version,
        response_headers: headers.clone(),
        handshake: handshake.clone(),
        sent_at,
        received_at,
        body: body.clone(),
    };
    cache.put(entry);

    let stream: ResponseBodyStream = Box::pin(futures_util::stream::once(async move { Ok(body) }));
    let mut rebuilt = Response::new(url, status, version, headers, stream, sent_at, received_at);
    if let Some(handshake) = handshake {
        rebuilt.set_handshake(handshake);
    }
    Ok(rebuilt)
}

fn gateway_timeout_response(url: url::Url) -> Response {
    let body: ResponseBodyStream = Box::pin(futures_util::stream::empty());
    Response::new(url, StatusCode::GATEWAY_TIMEOUT, Version::HTTP_11, HeaderMap::new(), body, SystemTime::now(), SystemTime::now())
}

fn response_from_entry(entry: &CacheEntry) -> Response {
    let body_bytes = entry.body.clone();
    let stream: ResponseBodyStream = Box::pin(futures_util::stream::once(async move { Ok::<Bytes, crate::error::BoxError>(body_bytes) }));
    let mut response = Response::new(
        entry.url.clone(),
        entry.status,
        entry.version,
        entry.response_headers.clone(),
        stream,
        entry.sent_at,
        entry.received_at,
    );
    if let Some(handshake) = entry.handshake.clone() {
        response.set_handshake(handshake);
    }
    response
}

fn bodyless_clone(response: &Response) -> Response {
    let body: ResponseBodyStream = Box::pin(futures_util::stream::empty());
    Response::new(
        response.url().clone(),
        response.status(),
        response.version(),
        response.headers().clone(),
        body,
        response.sent_at(),
        response.received_at(),
    )
}
