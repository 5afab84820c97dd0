//! The link-layer driver abstraction the router sends through.
//!
//! Grounded on the teacher's preference for `async-trait` wherever an async
//! trait method is needed. Two implementations exist in this workspace:
//! `fpr-node`'s `UdpBroadcastLink` (a concrete demonstration medium standing
//! in for the real radio driver) and `fpr-harness`'s `SimLink` (an in-process
//! loopback medium wiring multiple `Router`s together in one test process).

use async_trait::async_trait;
use fpr_proto::MacAddr;
use thiserror::Error;

/// Failure reported by a [`LinkLayer`] operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// The underlying medium rejected or failed to deliver the datagram.
    #[error("send failed: {0}")]
    SendFailed(String),
    /// Peer registration failed (e.g. the medium has no more slots).
    #[error("registration failed: {0}")]
    RegistrationFailed(String),
}

/// The radio/medium driver consumed by `fpr-router`.
///
/// `send` reports success/failure synchronously from the caller's point of
/// view — any asynchronous delivery confirmation from the real hardware is
/// advisory only and not modeled here.
#[async_trait]
pub trait LinkLayer: Send + Sync {
    /// Registers `mac` as a peer this node may address directly.
    async fn register_peer(&self, mac: MacAddr) -> Result<(), LinkError>;

    /// Removes a previously registered peer.
    async fn unregister_peer(&self, mac: MacAddr) -> Result<(), LinkError>;

    /// Sends one already-encoded frame to `mac` (or the broadcast address).
    async fn send(&self, mac: MacAddr, bytes: &[u8]) -> Result<(), LinkError>;
}
