//! Invariant checking over a [`crate::cluster::SimCluster`]'s state.
//!
//! Grounded on `lockframe-harness/src/invariants/mod.rs`'s `Invariant`/
//! `InvariantRegistry`/`Violation` trio: invariants verify WHAT must hold
//! across every execution path (here, the spec's universal properties
//! P7/P8/P10), not one scenario's specific sequence of events. Unlike the
//! teacher's registry, which re-derives a `SystemSnapshot` from App/Bridge
//! state, [`PeerTableSnapshot`] is built directly from `Router::list_all_peers`
//! since that is already the router's own public introspection surface.

use fpr_core::ConnectionState;
use fpr_proto::MacAddr;
use fpr_router::PeerInfo;

/// Invariant check result.
pub type InvariantResult = Result<(), Violation>;

/// Invariant violation with context.
#[derive(Debug, Clone)]
pub struct Violation {
    /// Name of the violated invariant.
    pub invariant: &'static str,
    /// Description of what went wrong.
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// One node's peer-table state, as seen by [`crate::invariants`] checks.
#[derive(Debug, Clone)]
pub struct PeerTableSnapshot {
    /// The node this snapshot was taken from.
    pub mac: MacAddr,
    /// Every peer this node currently knows about.
    pub peers: Vec<PeerInfo>,
}

/// An invariant checkable against one node's peer-table snapshot.
pub trait Invariant {
    /// Invariant name for error reporting.
    fn name(&self) -> &'static str;

    /// Checks the invariant against one node's snapshot.
    fn check(&self, snapshot: &PeerTableSnapshot) -> InvariantResult;
}

/// P7: a client never has more than one peer with `state == Connected`.
pub struct AtMostOneHost;

impl Invariant for AtMostOneHost {
    fn name(&self) -> &'static str {
        "at_most_one_host"
    }

    fn check(&self, snapshot: &PeerTableSnapshot) -> InvariantResult {
        let connected: Vec<_> =
            snapshot.peers.iter().filter(|p| p.state == ConnectionState::Connected).collect();
        if connected.len() > 1 {
            return Err(Violation {
                invariant: self.name(),
                message: format!(
                    "node {} has {} connected peers: {:?}",
                    snapshot.mac,
                    connected.len(),
                    connected.iter().map(|p| p.mac).collect::<Vec<_>>()
                ),
            });
        }
        Ok(())
    }
}

/// P8: hop count to any peer, once learned, never exceeds `u8::MAX` and
/// is `Some` only when a next hop is also known (a route with a hop count
/// but no carrier is not a route).
pub struct RouteHopCountConsistency;

impl Invariant for RouteHopCountConsistency {
    fn name(&self) -> &'static str {
        "route_hop_count_consistency"
    }

    fn check(&self, snapshot: &PeerTableSnapshot) -> InvariantResult {
        for peer in &snapshot.peers {
            if peer.hop_count.is_some() != peer.next_hop_mac.is_some() {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "node {} peer {}: hop_count={:?} next_hop_mac={:?} (must both be set or both unset)",
                        snapshot.mac, peer.mac, peer.hop_count, peer.next_hop_mac
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Collects invariants and runs them all against a snapshot.
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl Default for InvariantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { invariants: Vec::new() }
    }

    /// The standard set of peer-table invariants (P7, P8).
    #[must_use]
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(AtMostOneHost);
        registry.add(RouteHopCountConsistency);
        registry
    }

    /// Adds an invariant to the registry.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Checks every invariant, collecting all violations rather than
    /// stopping at the first.
    pub fn check_all(&self, snapshot: &PeerTableSnapshot) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> =
            self.invariants.iter().filter_map(|inv| inv.check(snapshot).err()).collect();
        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Checks every invariant, panicking with full context on the first
    /// failure. Intended for test assertions.
    pub fn assert_all(&self, snapshot: &PeerTableSnapshot, context: &str) {
        if let Err(violations) = self.check_all(snapshot) {
            let messages: Vec<_> = violations.iter().map(std::string::ToString::to_string).collect();
            panic!("invariant violation {context}:\n  {}", messages.join("\n  "));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mac(n: u8) -> MacAddr {
        MacAddr::new([2, 0, 0, 0, 0, n])
    }

    fn peer(mac: MacAddr, state: ConnectionState) -> PeerInfo {
        PeerInfo {
            mac,
            name: String::new(),
            state,
            sec_state: fpr_core::SecurityState::None,
            rssi: 0,
            packets_received: 0,
            hop_count: None,
            next_hop_mac: None,
        }
    }

    #[test]
    fn two_connected_peers_violates_at_most_one_host() {
        let snapshot = PeerTableSnapshot {
            mac: mac(1),
            peers: vec![
                peer(mac(2), ConnectionState::Connected),
                peer(mac(3), ConnectionState::Connected),
            ],
        };
        assert!(AtMostOneHost.check(&snapshot).is_err());
    }

    #[test]
    fn one_connected_peer_is_fine() {
        let snapshot = PeerTableSnapshot {
            mac: mac(1),
            peers: vec![
                peer(mac(2), ConnectionState::Connected),
                peer(mac(3), ConnectionState::Discovered),
            ],
        };
        assert!(AtMostOneHost.check(&snapshot).is_ok());
    }

    #[test]
    fn mismatched_hop_count_and_next_hop_is_flagged() {
        let mut bad = peer(mac(2), ConnectionState::Discovered);
        bad.hop_count = Some(2);
        bad.next_hop_mac = None;
        let snapshot = PeerTableSnapshot { mac: mac(1), peers: vec![bad] };
        assert!(RouteHopCountConsistency.check(&snapshot).is_err());
    }
}
