//! A single pooled connection (C3, spec.md §4.2): the socket/TLS session
//! plus the bookkeeping the pool needs to decide whether it can still
//! accept new exchanges. Grounded on OkHttp's `RealConnection`.

use std::{
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    time::Instant,
};

pub use crate::tls::Handshake;
use crate::exchange::Codec;
use crate::route::Route;

/// The wire protocol negotiated on a connection, decided either by ALPN
/// (TLS) or, for cleartext, by configuration (§4.3/§4.4).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Protocol {
    Http1,
    Http2,
}

impl Protocol {
    pub fn multiplexed(&self) -> bool {
        matches!(self, Protocol::Http2)
    }
}

/// Holds the codec handle(s) needed to open an exchange on this
/// connection. HTTP/1.1 allows exactly one live exchange at a time, so its
/// codec is taken out of the slot for the exchange's duration and put back
/// when it finishes; HTTP/2's codec is cheaply `Clone` (it's a handle onto
/// the shared connection state `h2` already serializes internally), so it
/// is simply cloned out per exchange.
enum ConnSlot {
    Http1(parking_lot::Mutex<Option<crate::proto::Http1Codec>>),
    Http2(crate::proto::Http2Codec),
}

/// A connection to a single route, either idle in the pool or carrying
/// one or more live exchanges.
pub struct Connection {
    route: Route,
    protocol: Protocol,
    handshake: Option<Handshake>,
    codec: ConnSlot,
    opened_at: Instant,
    idle_at: parking_lot::Mutex<Instant>,
    allocations: AtomicUsize,
    no_new_exchanges: AtomicBool,
}

impl Connection {
    pub fn new_http1(route: Route, handshake: Option<Handshake>, codec: crate::proto::Http1Codec) -> Self {
        Connection::build(route, Protocol::Http1, handshake, ConnSlot::Http1(parking_lot::Mutex::new(Some(codec))))
    }

    pub fn new_http2(route: Route, handshake: Option<Handshake>, codec: crate::proto::Http2Codec) -> Self {
        Connection::build(route, Protocol::Http2, handshake, ConnSlot::Http2(codec))
    }

    fn build(route: Route, protocol: Protocol, handshake: Option<Handshake>, codec: ConnSlot) -> Self {
        let now = Instant::now();
        Connection {
            route,
            protocol,
            handshake,
            codec,
            opened_at: now,
            idle_at: parking_lot::Mutex::new(now),
            allocations: AtomicUsize::new(0),
            no_new_exchanges: AtomicBool::new(false),
        }
    }

    /// Takes this connection's codec handle for one exchange. `None` for
    /// an HTTP/1.1 connection whose single slot is already checked out —
    /// the pool should not have handed out such a connection as available,
    /// but callers still treat `None` as "dial fresh" defensively.
    pub(crate) fn take_codec(&self) -> Option<Codec> {
        match &self.codec {
            ConnSlot::Http1(slot) => slot.lock().take().map(Codec::Http1),
            ConnSlot::Http2(codec) => Some(Codec::Http2(codec.clone())),
        }
    }

    /// Returns an HTTP/1.1 codec to its slot once the exchange using it has
    /// finished; a no-op for HTTP/2, whose codec handle was only ever
    /// cloned out.
    pub(crate) fn return_codec(&self, codec: Codec) {
        if let (ConnSlot::Http1(slot), Codec::Http1(codec)) = (&self.codec, codec) {
            *slot.lock() = Some(codec);
        }
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn handshake(&self) -> Option<&Handshake> {
        self.handshake.as_ref()
    }

    pub fn opened_at(&self) -> Instant {
        self.opened_at
    }

    pub fn idle_at(&self) -> Instant {
        *self.idle_at.lock()
    }

    pub fn mark_idle_now(&self) {
        *self.idle_at.lock() = Instant::now();
    }

    /// Live exchange count. HTTP/1.1 connections never exceed 1; HTTP/2
    /// connections may carry many concurrently (bounded by the peer's
    /// `SETTINGS_MAX_CONCURRENT_STREAMS`, enforced by the `h2` crate
    /// itself).
    pub fn allocation_count(&self) -> usize {
        self.allocations.load(Ordering::Acquire)
    }

    pub fn acquire(&self) {
        self.allocations.fetch_add(1, Ordering::AcqRel);
    }

    pub fn release(&self) {
        self.allocations.fetch_sub(1, Ordering::AcqRel);
        if self.allocation_count() == 0 {
            self.mark_idle_now();
        }
    }

    /// Whether this connection may still accept a new exchange. A
    /// connection stops accepting new work once it has been flagged
    /// (`noNewExchanges`, e.g. after a GOAWAY frame or an I/O error on
    /// another stream) even if it still has capacity by stream count.
    pub fn is_available(&self) -> bool {
        !self.no_new_exchanges.load(Ordering::Acquire)
            && (self.protocol.multiplexed() || self.allocation_count() == 0)
    }

    pub fn no_new_exchanges(&self) -> bool {
        self.no_new_exchanges.load(Ordering::Acquire)
    }

    pub fn set_no_new_exchanges(&self) {
        self.no_new_exchanges.store(true, Ordering::Release);
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("route", &self.route)
            .field("protocol", &self.protocol)
            .field("allocations", &self.allocation_count())
            .field("no_new_exchanges", &self.no_new_exchanges())
            .finish()
    }
}
