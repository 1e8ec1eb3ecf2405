//! The system resolver: `getaddrinfo` via a blocking-pool thread, the
//! default every `Address` uses unless a custom [`super::Resolve`] is
//! configured. Grounded on `penumbra-x-rquest/src/dns/gai.rs`, which wraps
//! hyper's internal `GaiResolver`; we call `tokio::net::lookup_host`
//! directly instead since this crate does not depend on hyper's connector
//! internals.

use std::net::SocketAddr;

use super::{Addrs, Name, Resolve, Resolving};
use crate::error::BoxError;

/// Resolves hostnames using the OS stub resolver, offloaded to Tokio's
/// blocking thread pool the way `getaddrinfo` calls always are.
#[derive(Debug, Default, Clone, Copy)]
pub struct GaiResolver;

impl GaiResolver {
    pub fn new() -> Self {
        GaiResolver
    }
}

impl Resolve for GaiResolver {
    fn resolve(&self, name: Name) -> Resolving {
        Box::pin(async move {
            // `lookup_host` requires a `host:port` pair; the port is
            // irrelevant to the address set the route planner wants, so we
            // use a dummy port and strip it back out is unnecessary since
            // `SocketAddr`s already carry whichever port we ask for here —
            // the route planner overwrites it with the real destination
            // port when building a `Route`.
            let target = format!("{}:0", name.as_str());
            let addrs: Vec<SocketAddr> = tokio::net::lookup_host(target)
                .await
                .map_err(|e| Box::new(e) as BoxError)?
                .collect();
            if addrs.is_empty() {
                return Err(Box::<dyn std::error::Error + Send + Sync>::from(format!(
                    "no addresses found for {}",
                    name.as_str()
                )) as BoxError);
            }
            Ok(addrs as Addrs)
        })
    }
}
