//! Wire codecs (C4/C5, spec.md §4.3/§4.4): turn a [`crate::Request`] plus a
//! live socket into a [`crate::Response`]. One codec per negotiated
//! protocol; the exchange layer (C6) picks which to drive based on
//! [`crate::connection::Protocol`].

pub(crate) mod h1;
pub(crate) mod h2;

pub use h1::Http1Codec;
pub use h2::Http2Codec;
