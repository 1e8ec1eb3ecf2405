//! Connection-spec fallback: if a handshake using `ConnectionSpec::Modern`
//! fails in a way consistent with a misbehaving TLS-terminating
//! middlebox, retry once with `ConnectionSpec::Compatible` and append
//! `TLS_FALLBACK_SCSV` so a legitimate server can detect the downgrade
//! attempt and refuse it (protects against a MITM forcing every
//! connection through the weaker spec). Grounded on OkHttp's
//! `ConnectionSpecSelector.connectionFailed`.

use super::ConnectionSpec;

/// Per-route state tracking which `ConnectionSpec`s have already been
/// tried, so a fallback is attempted at most once per spec and never
/// loops.
#[derive(Debug, Clone)]
pub struct FallbackState {
    remaining: Vec<ConnectionSpec>,
    attempted: Vec<ConnectionSpec>,
}

/// What the fallback policy decided to do after a handshake failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackPolicy {
    /// Retry the connection with this spec, setting `TLS_FALLBACK_SCSV` if
    /// any earlier spec was already attempted on this route.
    Retry { spec: ConnectionSpec, is_fallback: bool },
    /// No specs remain; propagate the original failure.
    Exhausted,
}

impl FallbackState {
    pub fn new(specs: Vec<ConnectionSpec>) -> Self {
        FallbackState { remaining: specs, attempted: Vec::new() }
    }

    /// Returns the next spec to attempt, recording it as attempted.
    pub fn next(&mut self) -> Option<ConnectionSpec> {
        if self.remaining.is_empty() {
            return None;
        }
        let spec = self.remaining.remove(0);
        self.attempted.push(spec.clone());
        Some(spec)
    }

    /// Decides whether a handshake failure on `failed_spec` is eligible
    /// for fallback. Only errors recognized as protocol-negotiation
    /// failures (caller passes `is_fallback_eligible`, derived from the
    /// underlying TLS error kind) trigger a retry; otherwise the error is
    /// fatal and no further specs are tried even if some remain, matching
    /// OkHttp's rule that only a specific set of `SSLHandshakeException`s
    /// are retried.
    pub fn on_failure(&mut self, is_fallback_eligible: bool) -> FallbackPolicy {
        if !is_fallback_eligible {
            self.remaining.clear();
            return FallbackPolicy::Exhausted;
        }
        match self.next() {
            Some(spec) => FallbackPolicy::Retry { spec, is_fallback: self.attempted.len() > 1 },
            None => FallbackPolicy::Exhausted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_attempt_is_not_marked_as_fallback() {
        let mut state = FallbackState::new(vec![ConnectionSpec::Modern, ConnectionSpec::Compatible]);
        assert_eq!(state.next(), Some(ConnectionSpec::Modern));
    }

    #[test]
    fn retry_after_eligible_failure_uses_next_spec_and_sets_scsv() {
        let mut state = FallbackState::new(vec![ConnectionSpec::Modern, ConnectionSpec::Compatible]);
        state.next();
        let decision = state.on_failure(true);
        assert_eq!(decision, FallbackPolicy::Retry { spec: ConnectionSpec::Compatible, is_fallback: true });
    }

    #[test]
    fn ineligible_failure_is_immediately_exhausted() {
        let mut state = FallbackState::new(vec![ConnectionSpec::Modern, ConnectionSpec::Compatible]);
        state.next();
        assert_eq!(state.on_failure(false), FallbackPolicy::Exhausted);
        assert_eq!(state.next(), None);
    }

    #[test]
    fn exhausted_once_all_specs_tried() {
        let mut state = FallbackState::new(vec![ConnectionSpec::Modern]);
        state.next();
        assert_eq!(state.on_failure(true), FallbackPolicy::Exhausted);
    }
}
