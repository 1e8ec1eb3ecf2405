//! DNS resolution, the part of the route planner (C2) that turns a
//! hostname into candidate addresses (spec.md §4.1 step 2).
//!
//! Grounded on `penumbra-x-rquest/src/dns.rs`/`dns/resolve.rs`: a `Resolve`
//! trait plus a system resolver. The teacher adapts `tower::Service`;
//! `linkreq` exposes a plain async trait instead since the route planner
//! calls it directly rather than through a `tower` stack (`tower-service`
//! stays a dependency for the cache/retry interceptor layer, not for DNS).

mod gai;
pub use gai::GaiResolver;

#[cfg(feature = "hickory-dns")]
mod hickory;
#[cfg(feature = "hickory-dns")]
pub use hickory::HickoryResolver;

use std::{fmt, future::Future, net::SocketAddr, pin::Pin, sync::Arc};

use crate::error::BoxError;

/// A domain name to resolve into addresses.
#[derive(Clone, Hash, Eq, PartialEq)]
pub struct Name(Box<str>);

impl Name {
    pub fn new(host: impl Into<Box<str>>) -> Name {
        Name(host.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<&str> for Name {
    fn from(value: &str) -> Self {
        Name::new(value)
    }
}

pub type Addrs = Vec<SocketAddr>;
pub type Resolving = Pin<Box<dyn Future<Output = Result<Addrs, BoxError>> + Send>>;

/// A pluggable DNS resolver. The `dns` field of an [`Address`](crate::Address)
/// is one of these, compared by `Arc::ptr_eq` for pool equality (§4.2's
/// invariant that two equal addresses must pool together no matter which
/// client constructed them).
pub trait Resolve: Send + Sync + fmt::Debug {
    /// Resolves `name` to a non-empty set of addresses, or fails with
    /// `no-addresses` (surfaced to the route planner as a failed-route
    /// record, not a fatal error — the next proxy/route in the cross
    /// product is still tried).
    fn resolve(&self, name: Name) -> Resolving;
}

pub(crate) fn resolver_eq(a: &Arc<dyn Resolve>, b: &Arc<dyn Resolve>) -> bool {
    Arc::ptr_eq(a, b)
}

/// Resolves to a fixed, pre-supplied set of addresses regardless of the
/// name asked for. Useful for tests and for pinning a hostname to a
/// specific address (`Client::resolve`).
#[derive(Debug)]
pub struct StaticResolver(Addrs);

impl StaticResolver {
    pub fn new(addrs: Addrs) -> Self {
        StaticResolver(addrs)
    }
}

impl Resolve for StaticResolver {
    fn resolve(&self, _name: Name) -> Resolving {
        let addrs = self.0.clone();
        Box::pin(async move {
            if addrs.is_empty() {
                Err(Box::<dyn std::error::Error + Send + Sync>::from("no addresses") as BoxError)
            } else {
                Ok(addrs)
            }
        })
    }
}

/// Resolves via `overrides` first (exact hostname match), falling back to
/// `base` — the mechanism backing `ClientBuilder::resolve`/`resolve_to_addrs`.
#[derive(Debug)]
pub struct WithOverrides {
    base: Arc<dyn Resolve>,
    overrides: std::collections::HashMap<String, Addrs>,
}

impl WithOverrides {
    pub fn new(base: Arc<dyn Resolve>, overrides: std::collections::HashMap<String, Addrs>) -> Self {
        WithOverrides { base, overrides }
    }
}

impl Resolve for WithOverrides {
    fn resolve(&self, name: Name) -> Resolving {
        if let Some(addrs) = self.overrides.get(name.as_str()) {
            let addrs = addrs.clone();
            return Box::pin(async move { Ok(addrs) });
        }
        self.base.resolve(name)
    }
}
