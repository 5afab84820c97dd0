//! Pure decision functions for version routing and extender forwarding
//! (§5.E step 3, §5.F EXTENDER).
//!
//! Kept separate from `router.rs` the way `transmit.rs`/`receive.rs` keep
//! their policy pure and testable without an `Environment`/`LinkLayer`: the
//! `Router` driver calls these and executes whatever they decide.

use fpr_proto::{MacAddr, ProtocolVersion};

/// The role a `Router` is currently operating under. Exactly one is active
/// at a time; changing it re-registers the broadcast-peer entry with the
/// link layer (see `Router::set_mode`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    /// Discovers and connects to a single HOST.
    #[default]
    Client,
    /// Accepts connections from multiple CLIENTs.
    Host,
    /// Forwards frames it is not the final destination of, and learns
    /// routes from what it observes.
    Extender,
}

/// Outcome of version-routing an inbound frame (§5.E step 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionDecision {
    /// Same major version as local: accept normally.
    Accept,
    /// Version 0: accept as a legacy peer, replay protection disabled.
    Legacy,
    /// Sender's major version is newer than local: accept on a
    /// best-effort basis (every field this version understands still
    /// decodes, since the wire layout is fixed-size).
    BestEffort,
    /// Sender's major version is older than local: drop and count.
    Incompatible,
}

/// Decides how to route an inbound frame by protocol version.
#[must_use]
pub fn route_version(local: ProtocolVersion, incoming: ProtocolVersion) -> VersionDecision {
    if incoming.is_legacy() {
        VersionDecision::Legacy
    } else if incoming.major() == local.major() {
        VersionDecision::Accept
    } else if incoming.major() > local.major() {
        VersionDecision::BestEffort
    } else {
        VersionDecision::Incompatible
    }
}

/// What an EXTENDER should do with one inbound frame, after route learning
/// has already been recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardDecision {
    /// Addressed to this node; process locally, do not forward.
    DeliverLocal,
    /// A broadcast frame from elsewhere: process locally and rebroadcast.
    DeliverAndForward,
    /// Not addressed to this node: forward only, to the given next hop.
    ForwardOnly {
        /// The peer to retransmit to.
        next_hop: MacAddr,
    },
    /// Not addressed to this node and no route/TTL budget to forward it.
    Drop,
}

/// Decides what an EXTENDER does with a frame it just received.
///
/// `route` is the next-hop MAC already known for `dest` (irrelevant for
/// broadcast, where the frame is simply re-sent to the broadcast address).
#[must_use]
pub fn decide_forward(
    local: MacAddr,
    dest: MacAddr,
    origin: MacAddr,
    hop_count: u8,
    max_hops: u8,
    route: Option<MacAddr>,
) -> ForwardDecision {
    if dest == local {
        return ForwardDecision::DeliverLocal;
    }

    let within_ttl = origin != local && hop_count < max_hops;

    if dest.is_broadcast() {
        return if within_ttl { ForwardDecision::DeliverAndForward } else { ForwardDecision::DeliverLocal };
    }

    match (within_ttl, route) {
        (true, Some(next_hop)) => ForwardDecision::ForwardOnly { next_hop },
        _ => ForwardDecision::Drop,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(major: u8) -> ProtocolVersion {
        ProtocolVersion::new(major, 0, 0)
    }

    fn mac(n: u8) -> MacAddr {
        MacAddr::new([2, 0, 0, 0, 0, n])
    }

    #[test]
    fn same_major_is_accepted() {
        assert_eq!(route_version(v(1), v(1)), VersionDecision::Accept);
    }

    #[test]
    fn legacy_is_routed_as_legacy_regardless_of_local() {
        assert_eq!(route_version(v(1), ProtocolVersion::LEGACY), VersionDecision::Legacy);
    }

    #[test]
    fn newer_major_is_best_effort() {
        assert_eq!(route_version(v(1), v(2)), VersionDecision::BestEffort);
    }

    #[test]
    fn older_major_is_incompatible() {
        assert_eq!(route_version(v(2), v(1)), VersionDecision::Incompatible);
    }

    #[test]
    fn frame_addressed_to_self_is_delivered_not_forwarded() {
        let decision = decide_forward(mac(1), mac(1), mac(9), 0, 10, Some(mac(9)));
        assert_eq!(decision, ForwardDecision::DeliverLocal);
    }

    #[test]
    fn broadcast_from_elsewhere_is_delivered_and_forwarded() {
        let decision = decide_forward(mac(1), MacAddr::BROADCAST, mac(9), 1, 10, None);
        assert_eq!(decision, ForwardDecision::DeliverAndForward);
    }

    #[test]
    fn own_broadcast_echo_is_not_reforwarded() {
        let decision = decide_forward(mac(1), MacAddr::BROADCAST, mac(1), 0, 10, None);
        assert_eq!(decision, ForwardDecision::DeliverLocal);
    }

    #[test]
    fn unicast_for_someone_else_forwards_via_known_route() {
        let decision = decide_forward(mac(1), mac(2), mac(9), 1, 10, Some(mac(3)));
        assert_eq!(decision, ForwardDecision::ForwardOnly { next_hop: mac(3) });
    }

    #[test]
    fn unicast_with_no_route_is_dropped() {
        let decision = decide_forward(mac(1), mac(2), mac(9), 1, 10, None);
        assert_eq!(decision, ForwardDecision::Drop);
    }

    #[test]
    fn ttl_exhausted_is_dropped() {
        let decision = decide_forward(mac(1), mac(2), mac(9), 10, 10, Some(mac(3)));
        assert_eq!(decision, ForwardDecision::Drop);
    }
}
