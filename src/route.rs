//! The route planner (C2, spec.md §4.1): turns an [`Address`] into an
//! ordered sequence of concrete [`Route`]s to try, and remembers which
//! ones have recently failed so they sink to the back of the list next
//! time. Grounded on OkHttp's `RouteSelector`/`RouteDatabase` pair.

use std::{collections::HashSet, net::SocketAddr};

use parking_lot::Mutex;

use crate::address::Address;
use crate::proxy::ProxyChoice;
use crate::tls::ConnectionSpec;

/// One fully-resolved path to a destination: a proxy choice, a concrete
/// socket address (one of possibly several the DNS step returned), and
/// the TLS connection spec to attempt first.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Route {
    proxy: ProxyChoice,
    socket_addr: SocketAddr,
    spec: ConnectionSpec,
}

impl Route {
    pub fn proxy(&self) -> &ProxyChoice {
        &self.proxy
    }

    pub fn socket_addr(&self) -> SocketAddr {
        self.socket_addr
    }

    pub fn spec(&self) -> &ConnectionSpec {
        &self.spec
    }
}

/// Builds the ordered candidate list for an [`Address`] (§4.1 step 3: the
/// cross product of proxy choices × resolved addresses × connection
/// specs), consulting a [`RouteDatabase`] to push previously-failed
/// routes to the back.
pub struct RoutePlanner<'a> {
    address: &'a Address,
    database: &'a RouteDatabase,
}

impl<'a> RoutePlanner<'a> {
    pub fn new(address: &'a Address, database: &'a RouteDatabase) -> Self {
        RoutePlanner { address, database }
    }

    /// Resolves `host` via the address's DNS policy and builds the full
    /// candidate list for one proxy choice, in stable order with
    /// previously-failed routes moved to the end.
    pub async fn plan_for_proxy(&self, proxy: ProxyChoice) -> Result<Vec<Route>, crate::error::BoxError> {
        let target_host = match &proxy {
            ProxyChoice::Direct => self.address.host().to_string(),
            ProxyChoice::Via(p) => p.uri().host().unwrap_or(self.address.host()).to_string(),
        };
        let name = crate::dns::Name::new(target_host.as_str());
        let addrs = self.address.dns().resolve(name).await?;

        let specs: Vec<ConnectionSpec> = if self.address.is_https() {
            self.address
                .tls()
                .map(|t| t.specs().to_vec())
                .unwrap_or_else(|| vec![ConnectionSpec::Modern, ConnectionSpec::Compatible])
        } else {
            vec![ConnectionSpec::Cleartext]
        };

        let mut routes = Vec::with_capacity(addrs.len() * specs.len());
        for addr in addrs {
            for spec in &specs {
                let socket_addr = SocketAddr::new(addr.ip(), if addr.port() != 0 { addr.port() } else { self.address.port() });
                routes.push(Route { proxy: proxy.clone(), socket_addr, spec: spec.clone() });
            }
        }

        let (good, bad): (Vec<_>, Vec<_>) = routes.into_iter().partition(|r| !self.database.has_failed(r));
        Ok(good.into_iter().chain(bad).collect())
    }
}

impl<'a> std::fmt::Debug for RoutePlanner<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutePlanner").field("address", &self.address).field("database", &self.database).finish()
    }
}

/// Tracks routes that recently failed to connect, so the planner tries
/// them last on the next call rather than repeating a doomed attempt
/// first (§4.1's failed-route memory, mirroring OkHttp's
/// `RouteDatabase`).
#[derive(Default)]
pub struct RouteDatabase {
    failed: Mutex<HashSet<Route>>,
}

impl RouteDatabase {
    pub fn new() -> Self {
        RouteDatabase::default()
    }

    pub fn has_failed(&self, route: &Route) -> bool {
        self.failed.lock().contains(route)
    }

    pub fn record_failure(&self, route: Route) {
        self.failed.lock().insert(route);
    }

    pub fn record_success(&self, route: &Route) {
        self.failed.lock().remove(route);
    }
}

impl std::fmt::Debug for RouteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteDatabase").field("failed_count", &self.failed.lock().len()).finish()
    }
}
