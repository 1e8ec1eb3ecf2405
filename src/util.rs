//! Small free functions shared across modules.
//!
//! Grounded on `penumbra-x-rquest/src/util.rs`: `fast_random` is lifted
//! near-verbatim (a thread-local xorshift, used for jittering the pool's
//! background cleaner and for multiplexed-stream tie-breaks, not for
//! anything security sensitive).

use http::HeaderMap;

/// Appends every header in `from` onto `into`, preserving duplicates and
/// insertion order (spec.md §3's header invariant).
pub(crate) fn extend_headers(into: &mut HeaderMap, from: HeaderMap) {
    let mut prev_name = None;
    for (name, value) in from {
        let name = name.or(prev_name.clone());
        if let Some(name) = name.clone() {
            into.append(name, value);
        }
        prev_name = name;
    }
}

/// A fast, non-cryptographic xorshift PRNG seeded once per thread. Used to
/// add jitter to the connection pool's periodic cleaner and to pick among
/// equally-eligible idle connections when ties need breaking.
pub(crate) fn fast_random() -> u64 {
    use std::cell::Cell;
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};
    use std::num::Wrapping;

    thread_local! {
        static RNG: Cell<Wrapping<u64>> = Cell::new(Wrapping(seed()));
    }

    fn seed() -> u64 {
        let seed = RandomState::new();
        let mut out = 0;
        let mut cnt = 0;
        while out == 0 {
            cnt += 1;
            let mut hasher = seed.build_hasher();
            hasher.write_usize(cnt);
            out = hasher.finish();
        }
        out
    }

    RNG.with(|rng| {
        let mut x = rng.get();
        debug_assert_ne!(x.0, 0);
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        rng.set(x);
        x.0
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fast_random_is_nonzero_and_varies() {
        let a = fast_random();
        let b = fast_random();
        assert_ne!(a, 0);
        assert_ne!(b, 0);
    }

    #[test]
    fn extend_headers_preserves_duplicates() {
        let mut into = HeaderMap::new();
        into.append("x-a", "1".parse().unwrap());
        let mut from = HeaderMap::new();
        from.append("x-a", "2".parse().unwrap());
        from.append("x-b", "3".parse().unwrap());
        extend_headers(&mut into, from);
        let values: Vec<_> = into.get_all("x-a").iter().collect();
        assert_eq!(values.len(), 2);
        assert!(into.get("x-b").is_some());
    }
}
