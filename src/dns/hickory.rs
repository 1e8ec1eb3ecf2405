//! An async, cache-aware resolver backed by `hickory-resolver`, selected
//! with the `hickory-dns` feature in place of [`super::GaiResolver`] — the
//! same trade-off the teacher's `dns/hickory.rs` documents: avoids
//! thread-pool exhaustion under many concurrent lookups, at the cost of
//! not honoring `/etc/hosts` on every platform.

use std::net::SocketAddr;

use hickory_resolver::{TokioAsyncResolver, system_conf};

use super::{Addrs, Name, Resolve, Resolving};
use crate::error::BoxError;

pub struct HickoryResolver(once_cell::sync::OnceCell<TokioAsyncResolver>);

impl std::fmt::Debug for HickoryResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HickoryResolver").finish()
    }
}

impl Default for HickoryResolver {
    fn default() -> Self {
        HickoryResolver(once_cell::sync::OnceCell::new())
    }
}

impl HickoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    fn resolver(&self) -> Result<&TokioAsyncResolver, BoxError> {
        self.0.get_or_try_init(|| {
            let (config, opts) = system_conf::read_system_conf()?;
            Ok(TokioAsyncResolver::tokio(config, opts))
        })
    }
}

impl Resolve for HickoryResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let resolver = self.resolver().map(Clone::clone);
        Box::pin(async move {
            let resolver = resolver?;
            let lookup = resolver.lookup_ip(name.as_str()).await?;
            let addrs: Vec<SocketAddr> = lookup.iter().map(|ip| SocketAddr::new(ip, 0)).collect();
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
