//! The connection pool (C3, spec.md §4.2): reuses idle connections keyed
//! by [`Address`] equality, evicts connections that have exceeded their
//! idle budget, and caps how many idle connections are kept around.
//! Grounded on OkHttp's `RealConnectionPool` and, for the
//! background-cleanup-thread shape, on `penumbra-x-rquest/src/pool.rs`.

use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use tracing::trace;

use crate::address::Address;
use crate::connection::Connection;

struct Bucket {
    address: Address,
    connections: Vec<Arc<Connection>>,
}

/// Keeps idle connections around for reuse and retires the ones that have
/// aged out. One pool is shared by every request made through a `Client`
/// (`Client` is cheaply `Clone`, and clones share the same pool instance).
pub struct ConnectionPool {
    max_idle_per_address: usize,
    keep_alive: Duration,
    buckets: Mutex<Vec<Bucket>>,
}

impl ConnectionPool {
    pub fn new(max_idle_per_address: usize, keep_alive: Duration) -> Self {
        ConnectionPool { max_idle_per_address, keep_alive, buckets: Mutex::new(Vec::new()) }
    }

    /// Finds an idle, still-available connection for `address`, removing
    /// it from the idle set (the caller is responsible for calling
    /// [`Connection::release`] or [`ConnectionPool::put`] when done, via
    /// the acquire/release accounting on `Connection` itself).
    pub fn acquire(&self, address: &Address) -> Option<Arc<Connection>> {
        let buckets = self.buckets.lock();
        let bucket = buckets.iter().find(|b| &b.address == address)?;
        bucket.connections.iter().find(|c| c.is_available() && !self.is_expired(c)).cloned()
    }

    /// Returns `connection` to the idle set under `address`, evicting the
    /// oldest idle entry first if the per-address cap would be exceeded.
    pub fn put(&self, address: Address, connection: Arc<Connection>) {
        connection.mark_idle_now();
        let mut buckets = self.buckets.lock();
        let bucket = match buckets.iter_mut().find(|b| b.address == address) {
            Some(b) => b,
            None => {
                buckets.push(Bucket { address, connections: Vec::new() });
                buckets.last_mut().unwrap()
            }
        };
        bucket.connections.push(connection);
        if bucket.connections.len() > self.max_idle_per_address {
            bucket.connections.sort_by_key(|c| c.idle_at());
            let excess = bucket.connections.len() - self.max_idle_per_address;
            for evicted in bucket.connections.drain(0..excess) {
                evicted.set_no_new_exchanges();
            }
        }
    }

    fn is_expired(&self, connection: &Connection) -> bool {
        connection.allocation_count() == 0 && connection.idle_at().elapsed() > self.keep_alive
    }

    /// Called by the pool's own maintenance loop (or directly in tests):
    /// drops connections that are idle, expired, or flagged
    /// `no_new_exchanges`, and prunes address buckets left empty.
    pub fn evict_expired(&self) {
        let mut buckets = self.buckets.lock();
        for bucket in buckets.iter_mut() {
            bucket.connections.retain(|c| {
                let keep = c.is_available() && !self.is_expired(c);
                if !keep {
                    trace!(address = ?bucket.address, "evicting idle connection");
                }
                keep
            });
        }
        buckets.retain(|b| !b.connections.is_empty());
    }

    /// Drops every connection regardless of age, marking each
    /// `no_new_exchanges` first so in-flight exchanges on them finish but
    /// no new ones start. Used by `Client::shutdown` / test teardown.
    pub fn evict_all(&self) {
        let mut buckets = self.buckets.lock();
        for bucket in buckets.drain(..) {
            for conn in bucket.connections {
                conn.set_no_new_exchanges();
            }
        }
    }

    pub fn idle_count(&self) -> usize {
        self.buckets.lock().iter().map(|b| b.connections.len()).sum()
    }

    /// Spawns the periodic cleanup task on the given runtime handle,
    /// running until the pool itself is dropped (`Weak` upgrade fails).
    pub fn spawn_cleanup(self: &Arc<Self>, interval: Duration) {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match weak.upgrade() {
                    Some(pool) => pool.evict_expired(),
                    None => break,
                }
            }
        });
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool").field("idle_count", &self.idle_count()).finish()
    }
}
