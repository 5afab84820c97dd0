//! Error taxonomy for the Fast Peer Router.
//!
//! A single `thiserror`-derived enum covers every application-facing
//! operation. Receive-path failures (replay, malformed frames, handshake
//! verification) are never surfaced this way — they are counted in
//! [`crate::stats::NetworkStats`] instead, per the propagation policy.

use std::time::Duration;

use fpr_proto::{MacAddr, ProtocolVersion};
use thiserror::Error;

use crate::lifecycle::LifecycleState;

/// Errors returned by application-facing `Router` operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouterError {
    /// A required argument was malformed: an out-of-range channel, a name
    /// too long, an unsupported role transition, and so on.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation is disallowed in the router's current lifecycle state.
    #[error("cannot {operation} while {state:?}")]
    InvalidState {
        /// Current lifecycle state.
        state: LifecycleState,
        /// The operation that was attempted.
        operation: &'static str,
    },

    /// Lookup for an unknown peer.
    #[error("no such peer: {mac}")]
    NotFound {
        /// The MAC address that was not found.
        mac: MacAddr,
    },

    /// Allocation failed while adding a peer or creating its queue.
    #[error("out of memory")]
    OutOfMemory,

    /// A waiting operation exceeded its timeout.
    #[error("timed out after {elapsed:?}")]
    Timeout {
        /// How long the operation waited before giving up.
        elapsed: Duration,
    },

    /// The underlying link layer reported a send failure.
    #[error("link failure: {0}")]
    LinkFailure(String),

    /// Version routing rejected the packet (major version mismatch).
    #[error("incompatible protocol version {version}")]
    ProtocolIncompatible {
        /// The version that could not be routed.
        version: ProtocolVersion,
    },

    /// Handshake key verification failed.
    ///
    /// Constructed internally for receive-path bookkeeping, but per the
    /// propagation policy this variant is never returned from a public
    /// `Router` method — it is observed only via statistics and the peer's
    /// unchanged `sec_state`.
    #[error("security verification failed")]
    SecurityFailure,
}

impl RouterError {
    /// True if retrying the same operation later may succeed.
    ///
    /// Only [`RouterError::Timeout`] is transient; every other variant
    /// indicates a protocol violation, a bad argument, or a permanent
    /// resource failure that retrying will not fix.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

impl From<fpr_proto::ProtocolError> for RouterError {
    fn from(err: fpr_proto::ProtocolError) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_timeout_is_transient() {
        assert!(RouterError::Timeout { elapsed: Duration::from_secs(1) }.is_transient());
        assert!(!RouterError::OutOfMemory.is_transient());
        assert!(!RouterError::SecurityFailure.is_transient());
        assert!(
            !RouterError::NotFound { mac: MacAddr::BROADCAST }.is_transient()
        );
    }
}
